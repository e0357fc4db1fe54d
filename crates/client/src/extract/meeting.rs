//! Best-effort meeting number and date recovery for documents without API metadata.

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// Where a meeting number came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingSource {
    Text,
    Url,
    DateEstimate,
    Default,
}

/// A guessed meeting number with its provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MeetingNumber {
    pub number: u32,
    pub source: MeetingSource,
}

impl MeetingNumber {
    /// Only text and URL matches are trusted.
    pub fn is_reliable(&self) -> bool {
        matches!(self.source, MeetingSource::Text | MeetingSource::Url)
    }
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().map(|p| Regex::new(p).expect("invalid meeting pattern")).collect()
}

static TEXT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"posiedzenie\s+nr\s*(\d+)",
        r"posiedzenie\s+(\d+)",
        r"sesja\s+(\d+)",
        r"nr\s*(\d+)",
        r"(\d+)\s*posiedzenie",
    ])
});

static URL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[r"/(\d+)_[a-z]_[^/]*\.pdf$", r"/(\d+)_[^/]*\.pdf$", r"_(\d+)_[^/]*\.pdf$", r"/(\d+)[^/]*\.pdf$"])
});

const POLISH_MONTHS: &[&str] = &[
    "stycznia",
    "lutego",
    "marca",
    "kwietnia",
    "maja",
    "czerwca",
    "lipca",
    "sierpnia",
    "września",
    "października",
    "listopada",
    "grudnia",
];

static POLISH_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(\d{{1,2}})\s+({})\s+(\d{{4}})", POLISH_MONTHS.join("|"))).expect("invalid date regex")
});
static DOTTED_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})\.(\d{1,2})\.(\d{4})").expect("invalid date regex"));
static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})-(\d{1,2})-(\d{1,2})").expect("invalid date regex"));

static DAY_LETTER: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(&[r"\(([a-h])\)", r",\s*([a-h])\s*$", r"\s([a-h])\s*$"]));

const MAX_URL_MEETING: u32 = 200;

fn first_number(patterns: &[Regex], haystack: &str) -> Option<u32> {
    patterns
        .iter()
        .find_map(|re| re.captures(haystack).and_then(|caps| caps.get(1)?.as_str().parse().ok()))
}

/// Find a date in free text: `22 lipca 2025`, `22.07.2025` or `2025-07-22`.
pub fn find_date(text: &str) -> Option<NaiveDate> {
    let lowered = text.to_lowercase();

    if let Some(caps) = POLISH_DATE.captures(&lowered) {
        let day: u32 = caps[1].parse().ok()?;
        let month = POLISH_MONTHS.iter().position(|m| *m == &caps[2])? as u32 + 1;
        let year: i32 = caps[3].parse().ok()?;
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(date);
        }
    }

    if let Some(caps) = DOTTED_DATE.captures(&lowered)
        && let Some(date) = ymd(&caps[3], &caps[2], &caps[1])
    {
        return Some(date);
    }

    let caps = ISO_DATE.captures(&lowered)?;
    ymd(&caps[1], &caps[2], &caps[3])
}

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

/// Guess the meeting number of a document from its link text and URL.
///
/// Falls back to a rough estimate from a date in the text (about three sittings
/// per month, capped at 50), then to 1.
pub fn guess_meeting_number(text: &str, url: Option<&str>) -> MeetingNumber {
    let lowered = text.to_lowercase();
    if let Some(number) = first_number(&TEXT_PATTERNS, &lowered) {
        return MeetingNumber { number, source: MeetingSource::Text };
    }

    if let Some(url) = url {
        let lowered_url = url.to_lowercase();
        let from_url = URL_PATTERNS.iter().find_map(|re| {
            let number: u32 = re.captures(&lowered_url)?.get(1)?.as_str().parse().ok()?;
            (1..=MAX_URL_MEETING).contains(&number).then_some(number)
        });
        if let Some(number) = from_url {
            return MeetingNumber { number, source: MeetingSource::Url };
        }
    }

    if let Some(date) = find_date(text) {
        let number = ((date.month() - 1) * 3 + 1).min(50);
        tracing::debug!(%date, number, "Estimated meeting number from date");
        return MeetingNumber { number, source: MeetingSource::DateEstimate };
    }

    MeetingNumber { number: 1, source: MeetingSource::Default }
}

/// Letter of a sitting day (`a` for the first day, `b` for the second, ...).
pub fn day_letter(text: &str) -> Option<char> {
    let lowered = text.to_lowercase();
    for re in DAY_LETTER.iter() {
        if let Some(letter) = re.captures(&lowered).and_then(|caps| caps[1].chars().next()) {
            return Some(letter);
        }
    }

    const WEEKDAYS: &[(&str, char)] = &[
        ("poniedziałek", 'a'),
        ("wtorek", 'b'),
        ("środa", 'c'),
        ("czwartek", 'd'),
        ("piątek", 'e'),
        ("sobota", 'f'),
        ("niedziela", 'g'),
    ];
    WEEKDAYS.iter().find(|(name, _)| lowered.contains(name)).map(|(_, letter)| *letter)
}
