//! Team name normalization. The prediction cache and the results feed were
//! written by different systems and disagree on club naming ("Yankees",
//! "NY Yankees", "New York Yankees"). Everything is mapped onto the full
//! franchise name before matching.

/// Full franchise names used as the canonical form.
pub const CANONICAL_TEAMS: [&str; 30] = [
    "Arizona Diamondbacks",
    "Atlanta Braves",
    "Baltimore Orioles",
    "Boston Red Sox",
    "Chicago Cubs",
    "Chicago White Sox",
    "Cincinnati Reds",
    "Cleveland Guardians",
    "Colorado Rockies",
    "Detroit Tigers",
    "Houston Astros",
    "Kansas City Royals",
    "Los Angeles Angels",
    "Los Angeles Dodgers",
    "Miami Marlins",
    "Milwaukee Brewers",
    "Minnesota Twins",
    "New York Mets",
    "New York Yankees",
    "Oakland Athletics",
    "Philadelphia Phillies",
    "Pittsburgh Pirates",
    "San Diego Padres",
    "San Francisco Giants",
    "Seattle Mariners",
    "St. Louis Cardinals",
    "Tampa Bay Rays",
    "Texas Rangers",
    "Toronto Blue Jays",
    "Washington Nationals",
];

/// Nicknames and scoreboard abbreviations seen in the feeds, lowercased.
/// Ambiguous fragments ("Sox", "New York") are intentionally absent; those
/// fall through to the substring pass and stay unresolved when ambiguous.
const ALIASES: &[(&str, &str)] = &[
    ("diamondbacks", "Arizona Diamondbacks"),
    ("d-backs", "Arizona Diamondbacks"),
    ("dbacks", "Arizona Diamondbacks"),
    ("ari", "Arizona Diamondbacks"),
    ("braves", "Atlanta Braves"),
    ("atl", "Atlanta Braves"),
    ("orioles", "Baltimore Orioles"),
    ("o's", "Baltimore Orioles"),
    ("bal", "Baltimore Orioles"),
    ("red sox", "Boston Red Sox"),
    ("bos", "Boston Red Sox"),
    ("cubs", "Chicago Cubs"),
    ("chc", "Chicago Cubs"),
    ("white sox", "Chicago White Sox"),
    ("cws", "Chicago White Sox"),
    ("chw", "Chicago White Sox"),
    ("reds", "Cincinnati Reds"),
    ("cin", "Cincinnati Reds"),
    ("guardians", "Cleveland Guardians"),
    ("cle", "Cleveland Guardians"),
    ("rockies", "Colorado Rockies"),
    ("col", "Colorado Rockies"),
    ("tigers", "Detroit Tigers"),
    ("det", "Detroit Tigers"),
    ("astros", "Houston Astros"),
    ("hou", "Houston Astros"),
    ("royals", "Kansas City Royals"),
    ("kc", "Kansas City Royals"),
    ("kcr", "Kansas City Royals"),
    ("angels", "Los Angeles Angels"),
    ("laa", "Los Angeles Angels"),
    ("dodgers", "Los Angeles Dodgers"),
    ("lad", "Los Angeles Dodgers"),
    ("marlins", "Miami Marlins"),
    ("mia", "Miami Marlins"),
    ("brewers", "Milwaukee Brewers"),
    ("mil", "Milwaukee Brewers"),
    ("twins", "Minnesota Twins"),
    ("min", "Minnesota Twins"),
    ("mets", "New York Mets"),
    ("nym", "New York Mets"),
    ("yankees", "New York Yankees"),
    ("nyy", "New York Yankees"),
    ("athletics", "Oakland Athletics"),
    ("a's", "Oakland Athletics"),
    ("oakland a's", "Oakland Athletics"),
    ("oak", "Oakland Athletics"),
    ("phillies", "Philadelphia Phillies"),
    ("phi", "Philadelphia Phillies"),
    ("pirates", "Pittsburgh Pirates"),
    ("pit", "Pittsburgh Pirates"),
    ("padres", "San Diego Padres"),
    ("sd", "San Diego Padres"),
    ("sdp", "San Diego Padres"),
    ("giants", "San Francisco Giants"),
    ("sf", "San Francisco Giants"),
    ("sfg", "San Francisco Giants"),
    ("mariners", "Seattle Mariners"),
    ("sea", "Seattle Mariners"),
    ("cardinals", "St. Louis Cardinals"),
    ("cards", "St. Louis Cardinals"),
    ("stl", "St. Louis Cardinals"),
    ("st louis cardinals", "St. Louis Cardinals"),
    ("rays", "Tampa Bay Rays"),
    ("tb", "Tampa Bay Rays"),
    ("tbr", "Tampa Bay Rays"),
    ("rangers", "Texas Rangers"),
    ("tex", "Texas Rangers"),
    ("blue jays", "Toronto Blue Jays"),
    ("jays", "Toronto Blue Jays"),
    ("tor", "Toronto Blue Jays"),
    ("nationals", "Washington Nationals"),
    ("nats", "Washington Nationals"),
    ("wsh", "Washington Nationals"),
    ("wsn", "Washington Nationals"),
];

/// Outcome of normalizing one raw team name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedTeam {
    /// Mapped onto a canonical franchise name.
    Canonical(&'static str),
    /// No unambiguous mapping; the raw value passes through unchanged.
    Unresolved(String),
}

impl ResolvedTeam {
    pub fn name(&self) -> &str {
        match self {
            ResolvedTeam::Canonical(name) => name,
            ResolvedTeam::Unresolved(raw) => raw,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, ResolvedTeam::Canonical(_))
    }
}

/// Resolve a raw team name against the canonical set.
///
/// Lookup order: exact canonical match, alias table, then case-insensitive
/// substring containment in either direction. A substring hit is only
/// accepted when exactly one canonical name matches.
pub fn resolve_team_name(raw: &str) -> ResolvedTeam {
    let cleaned = raw.replace('_', " ");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return ResolvedTeam::Unresolved(raw.to_string());
    }
    let lower = cleaned.to_lowercase();

    for canonical in CANONICAL_TEAMS {
        if canonical.to_lowercase() == lower {
            return ResolvedTeam::Canonical(canonical);
        }
    }

    for (alias, canonical) in ALIASES {
        if *alias == lower {
            return ResolvedTeam::Canonical(canonical);
        }
    }

    let mut candidates = CANONICAL_TEAMS.iter().filter(|canonical| {
        let canonical_lower = canonical.to_lowercase();
        canonical_lower.contains(&lower) || lower.contains(&canonical_lower)
    });

    match (candidates.next(), candidates.next()) {
        (Some(only), None) => ResolvedTeam::Canonical(only),
        _ => ResolvedTeam::Unresolved(raw.to_string()),
    }
}

/// Convenience form returning the normalized name, resolved or not.
pub fn normalize_team_name(raw: &str) -> String {
    resolve_team_name(raw).name().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_passthrough() {
        assert_eq!(
            normalize_team_name("New York Yankees"),
            "New York Yankees"
        );
    }

    #[test]
    fn test_alias_lookup() {
        assert_eq!(normalize_team_name("Yankees"), "New York Yankees");
        assert_eq!(normalize_team_name("A's"), "Oakland Athletics");
        assert_eq!(normalize_team_name("LAD"), "Los Angeles Dodgers");
        assert_eq!(normalize_team_name("Padres"), "San Diego Padres");
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(
            normalize_team_name("ANGELS"),
            normalize_team_name("Angels")
        );
        assert_eq!(normalize_team_name("yankees"), "New York Yankees");
    }

    #[test]
    fn test_underscores_normalized() {
        assert_eq!(normalize_team_name("Boston_Red_Sox"), "Boston Red Sox");
    }

    #[test]
    fn test_substring_fallback() {
        // Unique fragment resolves through containment, not the alias table.
        assert_eq!(
            normalize_team_name("the Colorado Rockies baseball club"),
            "Colorado Rockies"
        );
    }

    #[test]
    fn test_ambiguous_stays_unresolved() {
        // "New York" contains both the Mets and the Yankees.
        let resolved = resolve_team_name("New York");
        assert!(!resolved.is_resolved());
        assert_eq!(resolved.name(), "New York");

        let resolved = resolve_team_name("Sox");
        assert!(!resolved.is_resolved());
    }

    #[test]
    fn test_idempotent() {
        for raw in ["Yankees", "ANGELS", "Sox", "Oakland A's", "CHC"] {
            let once = normalize_team_name(raw);
            assert_eq!(normalize_team_name(&once), once);
        }
        for canonical in CANONICAL_TEAMS {
            assert_eq!(normalize_team_name(canonical), canonical);
        }
    }
}
