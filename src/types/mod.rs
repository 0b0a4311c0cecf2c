pub mod game;
pub mod metrics;

pub use game::*;
pub use metrics::*;
