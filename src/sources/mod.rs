use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::align::normalize_team_name;
use crate::error::{Result, TunerError};
use crate::types::{
    ActualResult, BetSide, Confidence, DateRange, PredictionRecord, Recommendation, TotalPick,
};

/// Supplies historical predictions for a date range.
pub trait PredictionSource {
    fn fetch(&self, range: &DateRange) -> Result<Vec<PredictionRecord>>;
}

/// Supplies realized game results for a date range.
pub trait ResultSource {
    fn fetch(&self, range: &DateRange) -> Result<Vec<ActualResult>>;
}

// Raw cache shapes. The upstream engine writes loosely typed JSON, so
// everything optional here is defaulted or skipped during conversion.

#[derive(Debug, Deserialize)]
struct PredictionsCache {
    #[serde(default)]
    predictions_by_date: HashMap<String, PredictionDateEntry>,
}

#[derive(Debug, Deserialize)]
struct PredictionDateEntry {
    #[serde(default)]
    games: HashMap<String, RawPrediction>,
}

#[derive(Debug, Deserialize)]
struct RawPrediction {
    #[serde(default)]
    away_team: String,
    #[serde(default)]
    home_team: String,
    predicted_away_score: Option<f64>,
    predicted_home_score: Option<f64>,
    predicted_total_runs: Option<f64>,
    home_win_probability: Option<f64>,
    away_pitcher: Option<String>,
    home_pitcher: Option<String>,
    confidence_level: Option<String>,
    #[serde(default)]
    comprehensive_details: RawDetails,
    source: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawDetails {
    #[serde(default)]
    betting_recommendations: Vec<RawRecommendation>,
}

#[derive(Debug, Deserialize)]
struct RawRecommendation {
    #[serde(rename = "type")]
    bet_type: Option<String>,
    recommendation: Option<String>,
    line: Option<f64>,
    confidence: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResultDateEntry {
    #[serde(default)]
    games: Vec<RawResult>,
}

#[derive(Debug, Deserialize)]
struct RawResult {
    #[serde(default)]
    away_team: String,
    #[serde(default)]
    home_team: String,
    away_score: Option<u32>,
    home_score: Option<u32>,
    #[serde(default)]
    is_final: bool,
    game_id: Option<String>,
}

impl RawRecommendation {
    /// Best-effort conversion. The engine writes free-text picks like
    /// "Bet Home ML" or "Over 8.5"; anything unrecognizable is dropped.
    fn into_typed(self) -> Option<Recommendation> {
        let confidence = self
            .confidence
            .as_deref()
            .and_then(|c| c.parse::<Confidence>().ok())
            .unwrap_or(Confidence::Medium);
        let text = self.recommendation.unwrap_or_default().to_lowercase();
        let bet_type = self.bet_type.as_deref().unwrap_or("moneyline");

        match bet_type {
            "moneyline" => {
                let side = if text.contains("home") {
                    BetSide::Home
                } else {
                    BetSide::Away
                };
                Some(Recommendation::moneyline(side, confidence))
            }
            "over" | "under" | "total" => {
                let line = self.line.unwrap_or(8.5);
                let pick = if bet_type == "under" || text.contains("under") {
                    TotalPick::Under
                } else {
                    TotalPick::Over
                };
                Some(Recommendation::total(pick, line, confidence))
            }
            _ => None,
        }
    }
}

/// Reads predictions from the engine's unified predictions cache file.
pub struct JsonPredictionSource {
    path: PathBuf,
}

impl JsonPredictionSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl PredictionSource for JsonPredictionSource {
    fn fetch(&self, range: &DateRange) -> Result<Vec<PredictionRecord>> {
        let raw = std::fs::read_to_string(&self.path).map_err(|e| {
            TunerError::DataUnavailable {
                date: range.start,
                origin: format!("{}: {}", self.path.display(), e),
            }
        })?;
        let cache: PredictionsCache =
            serde_json::from_str(&raw).map_err(|e| TunerError::DataUnavailable {
                date: range.start,
                origin: format!("{}: {}", self.path.display(), e),
            })?;

        let mut records = Vec::new();
        for (date_key, entry) in cache.predictions_by_date {
            let date = match date_key.parse::<NaiveDate>() {
                Ok(d) => d,
                Err(_) => {
                    // Metadata keys live alongside dates in this cache.
                    debug!("skipping non-date key in predictions cache: {}", date_key);
                    continue;
                }
            };
            if !range.contains(date) {
                continue;
            }
            for (game_key, raw) in entry.games {
                if raw.away_team.is_empty() || raw.home_team.is_empty() {
                    warn!("prediction {} on {} missing team names, skipped", game_key, date);
                    continue;
                }
                let confidence = raw
                    .confidence_level
                    .as_deref()
                    .and_then(|c| c.parse::<Confidence>().ok())
                    .unwrap_or(Confidence::Medium);
                let recommendations = raw
                    .comprehensive_details
                    .betting_recommendations
                    .into_iter()
                    .filter_map(RawRecommendation::into_typed)
                    .collect();
                // Older cache entries predate the explicit total field.
                let predicted_total = raw.predicted_total_runs.or_else(|| {
                    match (raw.predicted_away_score, raw.predicted_home_score) {
                        (Some(a), Some(h)) => Some(a + h),
                        _ => None,
                    }
                });
                records.push(PredictionRecord {
                    date,
                    away_team: normalize_team_name(&raw.away_team),
                    home_team: normalize_team_name(&raw.home_team),
                    predicted_away_score: raw.predicted_away_score,
                    predicted_home_score: raw.predicted_home_score,
                    predicted_total,
                    home_win_probability: raw.home_win_probability,
                    away_pitcher: raw.away_pitcher.filter(|p| p != "TBD"),
                    home_pitcher: raw.home_pitcher.filter(|p| p != "TBD"),
                    confidence,
                    recommendations,
                    source: raw.source.unwrap_or_else(|| "unified_cache".to_string()),
                });
            }
        }
        debug!("loaded {} predictions for {}", records.len(), range);
        Ok(records)
    }
}

/// Reads realized scores from the engine's game scores cache file, a map
/// of date to a list of games.
pub struct JsonResultSource {
    path: PathBuf,
}

impl JsonResultSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ResultSource for JsonResultSource {
    fn fetch(&self, range: &DateRange) -> Result<Vec<ActualResult>> {
        let raw = std::fs::read_to_string(&self.path).map_err(|e| {
            TunerError::DataUnavailable {
                date: range.start,
                origin: format!("{}: {}", self.path.display(), e),
            }
        })?;
        let cache: HashMap<String, ResultDateEntry> =
            serde_json::from_str(&raw).map_err(|e| TunerError::DataUnavailable {
                date: range.start,
                origin: format!("{}: {}", self.path.display(), e),
            })?;

        let mut results = Vec::new();
        for (date_key, entry) in cache {
            let date = match date_key.parse::<NaiveDate>() {
                Ok(d) => d,
                Err(_) => continue,
            };
            if !range.contains(date) {
                continue;
            }
            for raw in entry.games {
                let (away_score, home_score) = match (raw.away_score, raw.home_score) {
                    (Some(a), Some(h)) => (a, h),
                    _ => {
                        debug!(
                            "result {} @ {} on {} has no score yet, skipped",
                            raw.away_team, raw.home_team, date
                        );
                        continue;
                    }
                };
                results.push(ActualResult {
                    date,
                    away_team: normalize_team_name(&raw.away_team),
                    home_team: normalize_team_name(&raw.home_team),
                    away_score,
                    home_score,
                    is_final: raw.is_final,
                    game_id: raw.game_id,
                });
            }
        }
        debug!("loaded {} results for {}", results.len(), range);
        Ok(results)
    }
}

/// Fixed in-memory sources, used by tests and the workflow's dry runs.
pub struct MemoryPredictionSource(pub Vec<PredictionRecord>);

impl PredictionSource for MemoryPredictionSource {
    fn fetch(&self, range: &DateRange) -> Result<Vec<PredictionRecord>> {
        Ok(self
            .0
            .iter()
            .filter(|p| range.contains(p.date))
            .cloned()
            .collect())
    }
}

pub struct MemoryResultSource(pub Vec<ActualResult>);

impl ResultSource for MemoryResultSource {
    fn fetch(&self, range: &DateRange) -> Result<Vec<ActualResult>> {
        Ok(self
            .0
            .iter()
            .filter(|r| range.contains(r.date))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn range(start: &str, end: &str) -> DateRange {
        DateRange::new(date(start), date(end)).unwrap()
    }

    const PREDICTIONS_JSON: &str = r#"{
        "metadata": {"version": "1.0"},
        "predictions_by_date": {
            "2025-08-14": {
                "games": {
                    "New York Yankees @ Boston Red Sox": {
                        "away_team": "New York Yankees",
                        "home_team": "Boston Red Sox",
                        "predicted_away_score": 5.2,
                        "predicted_home_score": 4.1,
                        "predicted_total_runs": 9.3,
                        "home_win_probability": 0.42,
                        "away_pitcher": "Gerrit Cole",
                        "home_pitcher": "TBD",
                        "confidence_level": "HIGH",
                        "comprehensive_details": {
                            "betting_recommendations": [
                                {"type": "moneyline", "recommendation": "Bet Away ML", "confidence": "HIGH"},
                                {"type": "over", "recommendation": "Over 8.5", "line": 8.5, "confidence": "MEDIUM"},
                                {"type": "parlay", "recommendation": "exotic", "confidence": "LOW"}
                            ]
                        }
                    }
                }
            },
            "2025-09-01": {
                "games": {
                    "Cubs @ Cardinals": {
                        "away_team": "Chicago Cubs",
                        "home_team": "St. Louis Cardinals"
                    }
                }
            }
        }
    }"#;

    const RESULTS_JSON: &str = r#"{
        "2025-08-14": {
            "games": [
                {
                    "away_team": "New York Yankees",
                    "home_team": "Boston Red Sox",
                    "away_score": 6,
                    "home_score": 3,
                    "is_final": true
                },
                {
                    "away_team": "Chicago Cubs",
                    "home_team": "Milwaukee Brewers",
                    "is_final": false
                }
            ]
        }
    }"#;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_prediction_cache_parsing() {
        let file = write_temp(PREDICTIONS_JSON);
        let source = JsonPredictionSource::new(file.path());
        let records = source.fetch(&range("2025-08-01", "2025-08-31")).unwrap();

        assert_eq!(records.len(), 1);
        let p = &records[0];
        assert_eq!(p.away_team, "New York Yankees");
        assert_eq!(p.predicted_away_score, Some(5.2));
        assert_eq!(p.confidence, Confidence::High);
        assert_eq!(p.away_pitcher.as_deref(), Some("Gerrit Cole"));
        // TBD pitcher normalizes to absent.
        assert!(p.home_pitcher.is_none());
        // The unknown parlay type is dropped; the two known kinds survive.
        assert_eq!(p.recommendations.len(), 2);
    }

    #[test]
    fn test_date_range_filters_predictions() {
        let file = write_temp(PREDICTIONS_JSON);
        let source = JsonPredictionSource::new(file.path());
        let records = source.fetch(&range("2025-09-01", "2025-09-30")).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].away_team, "Chicago Cubs");
        // Sparse records default to MEDIUM with no score fields.
        assert_eq!(records[0].confidence, Confidence::Medium);
        assert!(records[0].predicted_away_score.is_none());
    }

    #[test]
    fn test_result_cache_parsing() {
        let file = write_temp(RESULTS_JSON);
        let source = JsonResultSource::new(file.path());
        let results = source.fetch(&range("2025-08-01", "2025-08-31")).unwrap();

        // The scoreless in-progress game is skipped.
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].away_score, 6);
        assert!(results[0].is_final);
    }

    #[test]
    fn test_missing_file_is_data_unavailable() {
        let source = JsonPredictionSource::new("/nonexistent/cache.json");
        let err = source.fetch(&range("2025-08-01", "2025-08-31")).unwrap_err();
        assert!(matches!(err, TunerError::DataUnavailable { .. }));
    }

    #[test]
    fn test_memory_sources_filter_by_range() {
        let result = ActualResult {
            date: date("2025-08-14"),
            away_team: "A".into(),
            home_team: "B".into(),
            away_score: 1,
            home_score: 2,
            is_final: true,
            game_id: None,
        };
        let source = MemoryResultSource(vec![result]);
        assert_eq!(source.fetch(&range("2025-08-01", "2025-08-31")).unwrap().len(), 1);
        assert_eq!(source.fetch(&range("2025-09-01", "2025-09-30")).unwrap().len(), 0);
    }
}
