//! Output directory layout.
//!
//! ```text
//! <out>/kadencja_10/
//!     index.json
//!     posiedzenie_042_2025-07-22/
//!         info_posiedzenia.json
//!         transcripts/transkrypty_2025-07-22.json
//!         transcripts/transkrypt_2025-07-22.txt
//!     poslowie/...
//! ```

use chrono::{NaiveDate, Utc};
use sejmbot_core::Error;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

const TRANSCRIPT_PREFIX: &str = "transkrypty_";

/// Paths and atomic writes under the output root.
#[derive(Debug, Clone)]
pub struct OutputTree {
    root: PathBuf,
}

impl OutputTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn term_dir(&self, term: u32) -> PathBuf {
        self.root.join(format!("kadencja_{term:02}"))
    }

    pub fn proceeding_dir(&self, term: u32, number: u32, first_date: Option<&str>) -> PathBuf {
        let name = match first_date {
            Some(date) => format!("posiedzenie_{number:03}_{date}"),
            None => format!("posiedzenie_{number:03}"),
        };
        self.term_dir(term).join(name)
    }

    pub fn transcripts_dir(&self, term: u32, number: u32, first_date: Option<&str>) -> PathBuf {
        self.proceeding_dir(term, number, first_date).join("transcripts")
    }

    pub fn transcript_json(&self, term: u32, number: u32, first_date: Option<&str>, date: &str) -> PathBuf {
        self.transcripts_dir(term, number, first_date).join(format!("{TRANSCRIPT_PREFIX}{date}.json"))
    }

    pub fn transcript_text(&self, term: u32, number: u32, first_date: Option<&str>, date: &str) -> PathBuf {
        self.transcripts_dir(term, number, first_date).join(format!("transkrypt_{date}.txt"))
    }

    pub fn members_dir(&self, term: u32) -> PathBuf {
        self.term_dir(term).join("poslowie")
    }

    /// Days of a proceeding that already have a transcript file.
    pub fn persisted_dates(&self, term: u32, number: u32, first_date: Option<&str>) -> BTreeSet<NaiveDate> {
        let Ok(entries) = fs::read_dir(self.transcripts_dir(term, number, first_date)) else {
            return BTreeSet::new();
        };

        entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                let date = name.strip_prefix(TRANSCRIPT_PREFIX)?.strip_suffix(".json")?;
                NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
            })
            .collect()
    }

    /// Serialize `value` as pretty JSON and write it atomically.
    pub fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), Error> {
        self.write_bytes(path, &serde_json::to_vec_pretty(value)?)
    }

    /// Write through a temp file and rename.
    pub fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<(), Error> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "Wrote file");
        Ok(())
    }

    /// Rebuild `kadencja_TT/index.json` from the transcript files on disk.
    pub fn write_index(&self, term: u32) -> Result<PathBuf, Error> {
        let term_dir = self.term_dir(term);
        let mut proceedings = Vec::new();
        let mut totals = IndexCounts::default();

        let mut dirs: Vec<PathBuf> = match fs::read_dir(&term_dir) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| {
                    path.is_dir()
                        && path.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.starts_with("posiedzenie_"))
                })
                .collect(),
            Err(_) => Vec::new(),
        };
        dirs.sort();

        for dir in dirs {
            let counts = count_transcripts(&dir.join("transcripts"));
            totals.add(&counts);
            let name = dir.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_string();
            proceedings.push(json!({
                "directory": name,
                "days": counts.days,
                "dates": counts.dates,
                "statements": counts.statements,
                "characters": counts.characters,
                "words": counts.words,
            }));
        }

        let index = json!({
            "term": term,
            "generated_at": Utc::now(),
            "proceedings": proceedings,
            "totals": {
                "proceedings": proceedings.len(),
                "days": totals.days,
                "statements": totals.statements,
                "characters": totals.characters,
                "words": totals.words,
            },
        });

        let path = term_dir.join("index.json");
        self.write_json(&path, &index)?;
        Ok(path)
    }
}

#[derive(Debug, Default)]
struct IndexCounts {
    days: usize,
    dates: Vec<String>,
    statements: usize,
    characters: usize,
    words: usize,
}

impl IndexCounts {
    fn add(&mut self, other: &IndexCounts) {
        self.days += other.days;
        self.statements += other.statements;
        self.characters += other.characters;
        self.words += other.words;
    }
}

fn count_transcripts(dir: &Path) -> IndexCounts {
    let mut counts = IndexCounts::default();
    let Ok(entries) = fs::read_dir(dir) else {
        return counts;
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(TRANSCRIPT_PREFIX) && n.ends_with(".json"))
        })
        .collect();
    files.sort();

    for file in files {
        let parsed = fs::read(&file).ok().and_then(|raw| serde_json::from_slice::<Value>(&raw).ok());
        let Some(day) = parsed else {
            tracing::warn!(path = %file.display(), "Skipping unreadable transcript file");
            continue;
        };

        counts.days += 1;
        if let Some(date) = day.pointer("/metadata/date").and_then(Value::as_str) {
            counts.dates.push(date.to_string());
        }
        for statement in day.get("statements").and_then(Value::as_array).into_iter().flatten() {
            counts.statements += 1;
            let text = statement.pointer("/content/text").and_then(Value::as_str).unwrap_or_default();
            counts.characters += text.chars().count();
            counts.words += text.split_whitespace().count();
        }
    }
    counts
}
