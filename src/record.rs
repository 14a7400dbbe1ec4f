use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::error::IngestError;

/// One match document as published in the ball-by-ball corpus.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchRecord {
    #[serde(default)]
    pub meta: Meta,
    #[serde(default)]
    pub info: Info,
    // Kept raw: innings come in two shapes and are normalized by the transformer.
    #[serde(default)]
    pub innings: Vec<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Meta {
    pub data_version: Option<String>,
    pub created: Option<String>,
    pub revision: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Info {
    pub gender: Option<String>,
    pub season: Option<TextOrNumber>,
    pub match_type: Option<String>,
    pub overs: Option<u32>,
    pub balls_per_over: Option<u32>,
    #[serde(default)]
    pub teams: Vec<String>,
    #[serde(default)]
    pub toss: Toss,
    #[serde(default)]
    pub outcome: Outcome,
    #[serde(default)]
    pub officials: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub players: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub registry: Registry,
    pub player_of_match: Option<OneOrMany>,
    #[serde(default)]
    pub event: Event,
    #[serde(default)]
    pub dates: Vec<String>,
    pub venue: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Toss {
    pub winner: Option<String>,
    pub decision: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Outcome {
    pub winner: Option<String>,
    pub eliminator: Option<String>,
    #[serde(default)]
    pub by: Margin,
    pub method: Option<String>,
    pub result: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Margin {
    pub runs: Option<u32>,
    pub wickets: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub people: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Event {
    pub name: Option<String>,
    pub stage: Option<String>,
    pub match_number: Option<TextOrNumber>,
}

/// Scalars the corpus writes either as JSON strings or numbers (`"2007/08"`, `2008`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TextOrNumber {
    Int(i64),
    Float(f64),
    Text(String),
}

impl TextOrNumber {
    fn non_empty(&self) -> Option<String> {
        let text = self.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed == "0" {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

impl fmt::Display for TextOrNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextOrNumber::Int(n) => write!(f, "{n}"),
            TextOrNumber::Float(n) => write!(f, "{n}"),
            TextOrNumber::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(name) => vec![name],
            OneOrMany::Many(names) => names,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawInnings {
    pub team: Option<String>,
    #[serde(default)]
    pub super_over: bool,
    #[serde(default)]
    pub overs: Vec<RawOver>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawOver {
    pub over: Option<u32>,
    #[serde(default)]
    pub deliveries: Vec<RawDelivery>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDelivery {
    #[serde(default, alias = "batsman")]
    pub batter: String,
    #[serde(default)]
    pub bowler: String,
    #[serde(default)]
    pub non_striker: String,
    #[serde(default)]
    pub runs: RawRuns,
    #[serde(default)]
    pub extras: RawExtras,
    #[serde(default)]
    pub wickets: Vec<RawWicket>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRuns {
    #[serde(default, alias = "batsman")]
    pub batter: u32,
    #[serde(default)]
    pub extras: u32,
    #[serde(default)]
    pub total: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawExtras {
    pub wides: Option<u32>,
    pub noballs: Option<u32>,
    pub legbyes: Option<u32>,
    pub byes: Option<u32>,
    pub penalty: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawWicket {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub player_out: String,
    #[serde(default)]
    pub fielders: Vec<RawFielder>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFielder {
    pub name: Option<String>,
}

/// A record that passed structural validation, with its identity fields pulled out.
#[derive(Debug, Clone)]
pub struct ValidatedMatch {
    pub match_number: String,
    pub date: String,
    pub season: String,
    pub teams: [String; 2],
    pub record: MatchRecord,
}

impl ValidatedMatch {
    pub fn match_id(&self) -> String {
        format!("{}_{}", self.match_number, self.date)
    }
}

pub fn load_match(path: &Path) -> Result<ValidatedMatch, IngestError> {
    let raw = fs::read_to_string(path).map_err(|source| IngestError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_match(&raw, path)
}

pub fn parse_match(raw: &str, path: &Path) -> Result<ValidatedMatch, IngestError> {
    let record =
        serde_json::from_str::<MatchRecord>(raw).map_err(|source| IngestError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
    validate(record, path)
}

pub fn validate(record: MatchRecord, path: &Path) -> Result<ValidatedMatch, IngestError> {
    let missing = |field| IngestError::MissingField {
        path: path.to_path_buf(),
        field,
    };

    let match_number = record
        .info
        .event
        .match_number
        .as_ref()
        .and_then(TextOrNumber::non_empty)
        .ok_or_else(|| missing("event.match_number"))?;
    let date = record
        .info
        .dates
        .first()
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .ok_or_else(|| missing("dates"))?;
    let season = record
        .info
        .season
        .as_ref()
        .and_then(TextOrNumber::non_empty)
        .ok_or_else(|| missing("season"))?;

    let teams = match record.info.teams.as_slice() {
        [a, b] => [a.clone(), b.clone()],
        other => {
            return Err(IngestError::InvalidTeams {
                path: path.to_path_buf(),
                found: other.len(),
            });
        }
    };

    Ok(ValidatedMatch {
        match_number,
        date,
        season,
        teams,
        record,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal(info: &str) -> String {
        format!(r#"{{"meta":{{"data_version":"1.1.0"}},"info":{info},"innings":[]}}"#)
    }

    #[test]
    fn accepts_numeric_and_text_identity_fields() {
        let raw = minimal(
            r#"{"season":"2007/08","teams":["A","B"],"dates":["2008-04-18"],"event":{"match_number":1}}"#,
        );
        let m = parse_match(&raw, Path::new("m.json")).expect("valid match");
        assert_eq!(m.season, "2007/08");
        assert_eq!(m.match_id(), "1_2008-04-18");

        let raw = minimal(
            r#"{"season":2008,"teams":["A","B"],"dates":["2008-04-19"],"event":{"match_number":"2"}}"#,
        );
        let m = parse_match(&raw, Path::new("m.json")).expect("valid match");
        assert_eq!(m.season, "2008");
        assert_eq!(m.match_id(), "2_2008-04-19");
    }

    #[test]
    fn missing_identity_fields_are_rejected() {
        let raw = minimal(r#"{"season":2008,"teams":["A","B"],"dates":["2008-04-19"]}"#);
        let err = parse_match(&raw, Path::new("m.json")).unwrap_err();
        assert!(matches!(
            err,
            IngestError::MissingField {
                field: "event.match_number",
                ..
            }
        ));

        let raw = minimal(r#"{"season":2008,"teams":["A","B"],"event":{"match_number":3}}"#);
        let err = parse_match(&raw, Path::new("m.json")).unwrap_err();
        assert!(matches!(err, IngestError::MissingField { field: "dates", .. }));

        let raw = minimal(
            r#"{"teams":["A","B"],"dates":["2008-04-19"],"event":{"match_number":3}}"#,
        );
        let err = parse_match(&raw, Path::new("m.json")).unwrap_err();
        assert!(matches!(err, IngestError::MissingField { field: "season", .. }));
    }

    #[test]
    fn team_count_must_be_two() {
        let raw = minimal(
            r#"{"season":2008,"teams":["A"],"dates":["2008-04-19"],"event":{"match_number":3}}"#,
        );
        let err = parse_match(&raw, Path::new("m.json")).unwrap_err();
        assert!(matches!(err, IngestError::InvalidTeams { found: 1, .. }));
    }

    #[test]
    fn undecodable_content_is_a_decode_error() {
        let err = parse_match("{not json", Path::new("bad.json")).unwrap_err();
        assert_eq!(err.kind(), "DecodeError");
    }

    #[test]
    fn delivery_accepts_legacy_batsman_field() {
        let delivery: RawDelivery = serde_json::from_str(
            r#"{"batsman":"X","bowler":"Y","non_striker":"Z","runs":{"batsman":4,"extras":0,"total":4}}"#,
        )
        .expect("legacy delivery");
        assert_eq!(delivery.batter, "X");
        assert_eq!(delivery.runs.batter, 4);
        assert!(delivery.wickets.is_empty());
    }

    #[test]
    fn player_of_match_accepts_string_or_list() {
        let one: OneOrMany = serde_json::from_str(r#""P""#).unwrap();
        assert_eq!(one.into_vec(), vec!["P".to_string()]);
        let many: OneOrMany = serde_json::from_str(r#"["P","Q"]"#).unwrap();
        assert_eq!(many.into_vec().len(), 2);
    }
}
