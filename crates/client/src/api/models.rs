//! Typed views of Sejm API responses.
//!
//! Only the fields the scraper reads are typed; everything else is kept in
//! `extra` so that persisted JSON loses nothing.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A parliamentary term (`/sejm/term`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Term {
    pub num: u32,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub current: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A proceeding (sitting) of the Sejm with its calendar days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proceeding {
    pub number: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub dates: Vec<String>,
    #[serde(default)]
    pub current: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Proceeding {
    /// First sitting day, used in directory names.
    pub fn first_date(&self) -> Option<&str> {
        self.dates.iter().map(String::as_str).min()
    }
}

/// Statement list of one sitting day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementList {
    #[serde(default)]
    pub proceeding_num: Option<u32>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub statements: Vec<StatementRecord>,
}

/// One speech in a sitting day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementRecord {
    pub num: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub function: Option<String>,
    #[serde(default, rename = "memberID")]
    pub member_id: Option<u32>,
    #[serde(default)]
    pub start_date_time: Option<String>,
    #[serde(default)]
    pub end_date_time: Option<String>,
    #[serde(default)]
    pub unspoken: bool,
    #[serde(default)]
    pub rapporteur: bool,
    #[serde(default)]
    pub secretary: bool,
}

impl StatementRecord {
    /// Length of the speech in seconds, when both timestamps parse.
    pub fn duration_seconds(&self) -> Option<i64> {
        let start = parse_timestamp(self.start_date_time.as_deref()?)?;
        let end = parse_timestamp(self.end_date_time.as_deref()?)?;
        let seconds = (end - start).num_seconds();
        (seconds >= 0).then_some(seconds)
    }
}

fn parse_timestamp(raw: &str) -> Option<chrono::NaiveDateTime> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.naive_utc())
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

/// A member of parliament (`/sejm/term{t}/MP`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: u32,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub club: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Member {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

/// A parliamentary club (`/sejm/term{t}/clubs`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Club {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub members_count: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_proceeding_keeps_unknown_fields() {
        let raw = json!({
            "number": 12,
            "title": "12. Posiedzenie Sejmu RP",
            "dates": ["2024-05-15", "2024-05-14"],
            "current": false,
            "agenda": "<ul></ul>"
        });
        let proceeding: Proceeding = serde_json::from_value(raw).unwrap();
        assert_eq!(proceeding.first_date(), Some("2024-05-14"));
        assert_eq!(proceeding.extra["agenda"], "<ul></ul>");
        assert_eq!(serde_json::to_value(&proceeding).unwrap()["agenda"], "<ul></ul>");
    }

    #[test]
    fn test_statement_record() {
        let raw = json!({
            "num": 3,
            "name": "Szymon Hołownia",
            "function": "Marszałek Sejmu",
            "memberID": 134,
            "startDateTime": "2024-05-14T10:00:00",
            "endDateTime": "2024-05-14T10:02:30",
            "unspoken": false
        });
        let statement: StatementRecord = serde_json::from_value(raw).unwrap();
        assert_eq!(statement.member_id, Some(134));
        assert_eq!(statement.duration_seconds(), Some(150));
    }

    #[test]
    fn test_statement_duration_missing() {
        let statement: StatementRecord = serde_json::from_value(json!({"num": 0, "name": "x"})).unwrap();
        assert_eq!(statement.duration_seconds(), None);
    }

    #[test]
    fn test_member_full_name() {
        let member: Member = serde_json::from_value(json!({
            "id": 1, "firstName": "Anna", "lastName": "Nowak", "club": "KO", "districtName": "Kraków"
        }))
        .unwrap();
        assert_eq!(member.full_name(), "Anna Nowak");
        assert_eq!(member.extra["districtName"], "Kraków");
    }
}
