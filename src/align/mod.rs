pub mod teams;

pub use teams::{normalize_team_name, resolve_team_name, ResolvedTeam};

use std::collections::HashMap;
use tracing::{debug, warn};

use crate::types::{ActualResult, AlignedGame, DateRange, PredictionRecord};

/// Output of one alignment pass. Unmatched entries are diagnostics and are
/// returned to the caller, never silently dropped.
#[derive(Debug, Clone, Default)]
pub struct Alignment {
    pub games: Vec<AlignedGame>,
    pub unmatched_predictions: Vec<String>,
    pub unmatched_results: Vec<String>,
    /// Raw team names that could not be mapped onto the canonical set.
    pub unresolved_teams: Vec<String>,
}

impl Alignment {
    pub fn matched_count(&self) -> usize {
        self.games.iter().filter(|g| g.result.is_some()).count()
    }

    pub fn completed_count(&self) -> usize {
        self.games.iter().filter(|g| g.is_complete()).count()
    }
}

/// Joins independently keyed prediction and result sets into matched pairs.
pub struct DataAligner;

impl DataAligner {
    /// Align predictions to results across the date range.
    ///
    /// Per date, results are keyed by normalized (away, home). Each
    /// prediction tries an exact key match first, then a bidirectional
    /// substring match. A date with predictions but no results produces
    /// zero alignments for that date and a log line, nothing fatal.
    ///
    /// Known limitation: doubleheaders share a key, and predictions carry
    /// no game id to disambiguate them. The first unconsumed result wins
    /// and a warning is emitted.
    pub fn align(
        range: &DateRange,
        predictions: &[PredictionRecord],
        results: &[ActualResult],
    ) -> Alignment {
        let mut alignment = Alignment::default();

        let mut predictions_by_date: HashMap<_, Vec<&PredictionRecord>> = HashMap::new();
        for p in predictions.iter().filter(|p| range.contains(p.date)) {
            predictions_by_date.entry(p.date).or_default().push(p);
        }
        let mut results_by_date: HashMap<_, Vec<&ActualResult>> = HashMap::new();
        for r in results.iter().filter(|r| range.contains(r.date)) {
            results_by_date.entry(r.date).or_default().push(r);
        }

        for date in range.days() {
            let day_predictions = match predictions_by_date.get(&date) {
                Some(p) => p,
                None => continue,
            };
            let day_results = results_by_date.remove(&date).unwrap_or_default();
            if day_results.is_empty() {
                debug!("no results available for {}, skipping {} predictions",
                    date, day_predictions.len());
            }

            Self::align_date(day_predictions, day_results, &mut alignment);
        }

        // Result dates the predictions never covered.
        for (date, leftover) in results_by_date {
            for r in leftover {
                alignment
                    .unmatched_results
                    .push(format!("{} @ {} on {}", r.away_team, r.home_team, date));
            }
        }

        debug!(
            "alignment: {} games ({} with final results), {} unmatched predictions, {} unmatched results",
            alignment.games.len(),
            alignment.completed_count(),
            alignment.unmatched_predictions.len(),
            alignment.unmatched_results.len()
        );

        alignment
    }

    fn align_date(
        predictions: &[&PredictionRecord],
        results: Vec<&ActualResult>,
        alignment: &mut Alignment,
    ) {
        // Key results by normalized matchup; a Vec per key absorbs
        // doubleheaders.
        let mut lookup: HashMap<(String, String), Vec<&ActualResult>> = HashMap::new();
        for &r in &results {
            let away = Self::resolve_and_flag(&r.away_team, alignment);
            let home = Self::resolve_and_flag(&r.home_team, alignment);
            lookup.entry((away, home)).or_default().push(r);
        }

        let mut consumed: Vec<*const ActualResult> = Vec::new();

        for prediction in predictions {
            let away = Self::resolve_and_flag(&prediction.away_team, alignment);
            let home = Self::resolve_and_flag(&prediction.home_team, alignment);
            let key = (away.clone(), home.clone());

            let matched = Self::take_exact(&mut lookup, &key)
                .or_else(|| Self::take_substring(&mut lookup, &away, &home));

            match matched {
                Some(result) => {
                    consumed.push(result as *const ActualResult);
                    alignment
                        .games
                        .push(AlignedGame::new((*prediction).clone(), Some(result.clone())));
                }
                None => {
                    alignment.unmatched_predictions.push(format!(
                        "{} on {}",
                        prediction.matchup(),
                        prediction.date
                    ));
                    alignment
                        .games
                        .push(AlignedGame::new((*prediction).clone(), None));
                }
            }
        }

        for r in results {
            if !consumed.contains(&(r as *const ActualResult)) {
                alignment
                    .unmatched_results
                    .push(format!("{} @ {} on {}", r.away_team, r.home_team, r.date));
            }
        }
    }

    fn resolve_and_flag(raw: &str, alignment: &mut Alignment) -> String {
        let resolved = resolve_team_name(raw);
        if !resolved.is_resolved() && !alignment.unresolved_teams.iter().any(|t| t == raw) {
            warn!("unresolved team name: {:?}", raw);
            alignment.unresolved_teams.push(raw.to_string());
        }
        resolved.name().to_lowercase()
    }

    fn take_exact<'a>(
        lookup: &mut HashMap<(String, String), Vec<&'a ActualResult>>,
        key: &(String, String),
    ) -> Option<&'a ActualResult> {
        let bucket = lookup.get_mut(key)?;
        // Predictions carry no game id, so any multi-result bucket is
        // matched ambiguously even when the results side has ids.
        if bucket.len() > 1 {
            warn!(
                "doubleheader for {} @ {} matched in feed order without id agreement",
                key.0, key.1
            );
        }
        if bucket.is_empty() {
            None
        } else {
            Some(bucket.remove(0))
        }
    }

    fn take_substring<'a>(
        lookup: &mut HashMap<(String, String), Vec<&'a ActualResult>>,
        away: &str,
        home: &str,
    ) -> Option<&'a ActualResult> {
        let key = lookup
            .iter()
            .find(|((k_away, k_home), bucket)| {
                !bucket.is_empty()
                    && Self::contains_either(k_away, away)
                    && Self::contains_either(k_home, home)
            })
            .map(|(k, _)| k.clone())?;
        Some(lookup.get_mut(&key)?.remove(0))
    }

    fn contains_either(a: &str, b: &str) -> bool {
        a.contains(b) || b.contains(a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Confidence;
    use chrono::NaiveDate;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn prediction(d: &str, away: &str, home: &str) -> PredictionRecord {
        PredictionRecord {
            date: date(d),
            away_team: away.into(),
            home_team: home.into(),
            predicted_away_score: Some(5.2),
            predicted_home_score: Some(4.1),
            predicted_total: Some(9.3),
            home_win_probability: Some(0.42),
            away_pitcher: None,
            home_pitcher: None,
            confidence: Confidence::Medium,
            recommendations: vec![],
            source: "test".into(),
        }
    }

    fn result(d: &str, away: &str, home: &str, away_score: u32, home_score: u32) -> ActualResult {
        ActualResult {
            date: date(d),
            away_team: away.into(),
            home_team: home.into(),
            away_score,
            home_score,
            is_final: true,
            game_id: None,
        }
    }

    fn august() -> DateRange {
        DateRange::new(date("2025-08-01"), date("2025-08-31")).unwrap()
    }

    #[test]
    fn test_aligns_across_naming_variants() {
        // Scenario A from the system's acceptance checks: short names on
        // the prediction side, full names on the results side.
        let predictions = vec![prediction("2025-08-14", "Yankees", "Red Sox")];
        let results = vec![result(
            "2025-08-14",
            "New York Yankees",
            "Boston Red Sox",
            6,
            3,
        )];

        let alignment = DataAligner::align(&august(), &predictions, &results);
        assert_eq!(alignment.games.len(), 1);
        assert_eq!(alignment.matched_count(), 1);
        assert!(alignment.unmatched_predictions.is_empty());
        assert!(alignment.unmatched_results.is_empty());

        let matched = alignment.games[0].final_result().unwrap();
        assert_eq!(matched.away_score, 6);
    }

    #[test]
    fn test_unmatched_are_reported_not_dropped() {
        let predictions = vec![
            prediction("2025-08-14", "Yankees", "Red Sox"),
            prediction("2025-08-14", "Cubs", "Cardinals"),
        ];
        let results = vec![result(
            "2025-08-14",
            "New York Yankees",
            "Boston Red Sox",
            6,
            3,
        )];

        let alignment = DataAligner::align(&august(), &predictions, &results);
        assert_eq!(alignment.games.len(), 2);
        assert_eq!(alignment.matched_count(), 1);
        assert_eq!(alignment.unmatched_predictions.len(), 1);
        assert!(alignment.unmatched_predictions[0].contains("Cubs"));
    }

    #[test]
    fn test_missing_date_is_nonfatal() {
        let predictions = vec![prediction("2025-08-14", "Yankees", "Red Sox")];
        let alignment = DataAligner::align(&august(), &predictions, &[]);
        assert_eq!(alignment.games.len(), 1);
        assert_eq!(alignment.matched_count(), 0);
        assert_eq!(alignment.unmatched_predictions.len(), 1);
    }

    #[test]
    fn test_leftover_results_are_diagnostics() {
        let predictions = vec![prediction("2025-08-14", "Yankees", "Red Sox")];
        let results = vec![
            result("2025-08-14", "New York Yankees", "Boston Red Sox", 6, 3),
            result("2025-08-14", "Chicago Cubs", "St. Louis Cardinals", 2, 4),
            result("2025-08-15", "Seattle Mariners", "Baltimore Orioles", 1, 0),
        ];

        let alignment = DataAligner::align(&august(), &predictions, &results);
        assert_eq!(alignment.matched_count(), 1);
        assert_eq!(alignment.unmatched_results.len(), 2);
    }

    #[test]
    fn test_doubleheader_consumes_both_results() {
        let predictions = vec![
            prediction("2025-08-14", "Yankees", "Red Sox"),
            prediction("2025-08-14", "Yankees", "Red Sox"),
        ];
        let results = vec![
            result("2025-08-14", "New York Yankees", "Boston Red Sox", 6, 3),
            result("2025-08-14", "New York Yankees", "Boston Red Sox", 2, 5),
        ];

        let alignment = DataAligner::align(&august(), &predictions, &results);
        assert_eq!(alignment.matched_count(), 2);
        assert!(alignment.unmatched_results.is_empty());
        // Feed order is preserved when no game_id disambiguates.
        assert_eq!(
            alignment.games[0].result.as_ref().unwrap().away_score,
            6
        );
        assert_eq!(
            alignment.games[1].result.as_ref().unwrap().away_score,
            2
        );
    }

    #[test]
    fn test_doubleheader_with_ids_still_feed_ordered() {
        // Result-side ids cannot disambiguate because predictions carry
        // none; both games still pair up in feed order.
        let predictions = vec![
            prediction("2025-08-14", "Yankees", "Red Sox"),
            prediction("2025-08-14", "Yankees", "Red Sox"),
        ];
        let mut first = result("2025-08-14", "New York Yankees", "Boston Red Sox", 6, 3);
        first.game_id = Some("776001".into());
        let mut second = result("2025-08-14", "New York Yankees", "Boston Red Sox", 2, 5);
        second.game_id = Some("776002".into());

        let alignment = DataAligner::align(&august(), &predictions, &[first, second]);
        assert_eq!(alignment.matched_count(), 2);
        assert!(alignment.unmatched_results.is_empty());
        assert_eq!(alignment.games[0].result.as_ref().unwrap().away_score, 6);
        assert_eq!(alignment.games[1].result.as_ref().unwrap().away_score, 2);
    }

    #[test]
    fn test_unresolved_names_flagged() {
        let predictions = vec![prediction("2025-08-14", "Space Cowboys", "Red Sox")];
        let results = vec![result(
            "2025-08-14",
            "Space Cowboys",
            "Boston Red Sox",
            1,
            2,
        )];

        let alignment = DataAligner::align(&august(), &predictions, &results);
        // Unresolved on both sides still matches through the raw name.
        assert_eq!(alignment.matched_count(), 1);
        assert_eq!(alignment.unresolved_teams, vec!["Space Cowboys"]);
    }

    #[test]
    fn test_out_of_range_dates_ignored() {
        let predictions = vec![prediction("2025-07-14", "Yankees", "Red Sox")];
        let results = vec![result(
            "2025-07-14",
            "New York Yankees",
            "Boston Red Sox",
            6,
            3,
        )];
        let alignment = DataAligner::align(&august(), &predictions, &results);
        assert!(alignment.games.is_empty());
    }
}
