//! Transcript scraping for one term.
//!
//! Proceedings are processed newest first and their days in calendar order.
//! Each proceeding is gated by the [`RefreshPolicy`]; every day runs
//! fetch, extract, clean, validate and persist, then registers the written
//! files in the cache. A failing day or proceeding is counted and skipped.

use crate::cached::CachedApi;
use crate::members::MemberIndex;
use crate::stats::RunStats;
use crate::storage::OutputTree;
use chrono::{Duration, NaiveDate, Utc};
use sejmbot_client::{ContentPipeline, Endpoint, Member, Proceeding, StatementList, StatementRecord, Term};
use sejmbot_core::refresh::{RefreshReason, parse_dates};
use sejmbot_core::{CacheStore, Error, ProceedingStatus, RefreshPolicy, RefreshRequest};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::path::PathBuf;

/// What to scrape and how.
#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    pub term: u32,
    /// Restrict the run to one proceeding.
    pub proceeding: Option<u32>,
    /// Ignore refresh markers.
    pub force: bool,
    pub fetch_full_statements: bool,
    /// Also download the day PDF and store its text.
    pub fetch_pdf: bool,
    /// Cache entries older than this are dropped at the end of a run.
    pub retention: Duration,
}

impl ScrapeOptions {
    pub fn new(term: u32) -> Self {
        Self {
            term,
            proceeding: None,
            force: false,
            fetch_full_statements: true,
            fetch_pdf: false,
            retention: Duration::days(30),
        }
    }
}

/// Result of processing one sitting day.
#[derive(Debug, Clone, PartialEq)]
pub enum DayOutcome {
    Saved { path: PathBuf, statements: usize, low_confidence: bool },
    /// The API has no statements for this day yet.
    Unavailable,
}

/// Text of one statement and where it came from.
struct StatementContent {
    text: String,
    source: &'static str,
}

/// Drop entries without a number and duplicates, newest first.
pub fn unique_proceedings(list: Vec<Proceeding>) -> Vec<Proceeding> {
    let mut seen = HashSet::new();
    let mut unique: Vec<Proceeding> = list
        .into_iter()
        .filter(|p| {
            if p.number == 0 {
                tracing::warn!(title = %p.title, "Skipping proceeding without a number");
                return false;
            }
            seen.insert(p.number)
        })
        .collect();
    unique.sort_by(|a, b| b.number.cmp(&a.number));
    unique
}

fn mp_data(member: &Member) -> Value {
    let pick = |field: &str| member.extra.get(field).cloned().unwrap_or(Value::Null);
    json!({
        "id": member.id,
        "club": member.club,
        "districtName": pick("districtName"),
        "districtNum": pick("districtNum"),
        "educationLevel": pick("educationLevel"),
        "numberOfVotes": pick("numberOfVotes"),
        "profession": pick("profession"),
        "voivodeship": pick("voivodeship"),
    })
}

/// Drives the scrape of a term.
pub struct Scraper<'a> {
    api: CachedApi<'a>,
    store: &'a mut CacheStore,
    tree: &'a OutputTree,
    pipeline: ContentPipeline,
    policy: RefreshPolicy,
    members: Option<MemberIndex>,
    stats: RunStats,
}

impl<'a> Scraper<'a> {
    pub fn new(api: CachedApi<'a>, store: &'a mut CacheStore, tree: &'a OutputTree) -> Self {
        Self {
            api,
            store,
            tree,
            pipeline: ContentPipeline::default(),
            policy: RefreshPolicy::default(),
            members: None,
            stats: RunStats::default(),
        }
    }

    pub fn take_stats(&mut self) -> RunStats {
        std::mem::take(&mut self.stats)
    }

    pub fn store(&mut self) -> &mut CacheStore {
        self.store
    }

    pub fn today(&self) -> NaiveDate {
        self.store.clock().today()
    }

    /// Proceedings of a term, deduplicated, newest first.
    ///
    /// `fresh` skips the response cache.
    pub async fn proceedings(&mut self, term: u32, fresh: bool) -> Result<Vec<Proceeding>, Error> {
        let endpoint = Endpoint::proceedings(term);
        let response = if fresh {
            self.api.refresh(self.store, &endpoint).await?
        } else {
            self.api.fetch(self.store, &endpoint).await?
        };
        let list: Vec<Proceeding> = response.into_json()?.unwrap_or_default();
        Ok(unique_proceedings(list))
    }

    /// Scrape every proceeding of `options.term` (or just `options.proceeding`).
    pub async fn scrape_term(&mut self, options: &ScrapeOptions) -> Result<&RunStats, Error> {
        let term = options.term;
        let Some(info) = self.api.fetch(self.store, &Endpoint::term(term)).await?.into_json::<Term>()? else {
            return Err(Error::InvalidInput(format!("term {term} not found")));
        };
        tracing::info!(term, from = ?info.from, to = ?info.to, "Scraping term");

        let mut proceedings = self.proceedings(term, false).await?;
        if let Some(number) = options.proceeding {
            proceedings.retain(|p| p.number == number);
            if proceedings.is_empty() {
                return Err(Error::InvalidInput(format!("proceeding {number} not found in term {term}")));
            }
        }
        tracing::info!(term, proceedings = proceedings.len(), "Proceedings to check");

        for proceeding in &proceedings {
            if let Err(e) = self.process_proceeding(term, proceeding, options).await {
                tracing::error!(term, proceeding = proceeding.number, error = %e, "Proceeding failed");
                self.stats.errors += 1;
            }
        }

        self.finish(term, options.retention)?;
        self.stats.log_summary();
        Ok(&self.stats)
    }

    /// Write the term index, prune the cache and persist it.
    pub fn finish(&mut self, term: u32, retention: Duration) -> Result<(), Error> {
        let index = self.tree.write_index(term)?;
        tracing::debug!(path = %index.display(), "Index written");

        let expired = self.store.evict_expired();
        let old = self.store.evict_older_than(retention);
        if expired + old > 0 {
            tracing::info!(expired, old, "Pruned cache");
        }
        self.store.flush()
    }

    /// Process one proceeding if the refresh policy asks for it.
    pub async fn process_proceeding(
        &mut self, term: u32, proceeding: &Proceeding, options: &ScrapeOptions,
    ) -> Result<(), Error> {
        let number = proceeding.number;
        let today = self.today();
        let persisted = self.tree.persisted_dates(term, number, proceeding.first_date());

        let request = RefreshRequest {
            term,
            proceeding_id: number,
            dates: &proceeding.dates,
            persisted_dates: &persisted,
            force: options.force,
        };
        let decision = self.policy.should_refresh(self.store, &request, today);
        if !decision.refresh {
            tracing::info!(proceeding = number, status = %decision.status, "Recently checked, skipping");
            self.stats.proceedings_skipped += 1;
            return Ok(());
        }

        let details = self.proceeding_details(term, proceeding).await?;
        self.save_proceeding_info(term, &details)?;

        if decision.status == ProceedingStatus::Future {
            tracing::info!(proceeding = number, dates = ?details.dates, "Proceeding has not started yet");
            self.stats.future_proceedings += 1;
            self.policy.mark_checked(self.store, decision.status, term, number);
            return Ok(());
        }

        let only_missing = matches!(decision.reason, RefreshReason::MissingOutput { .. });
        let mut dates: Vec<NaiveDate> = parse_dates(&details.dates).into_iter().filter(|d| *d <= today).collect();
        dates.sort();
        dates.dedup();

        tracing::info!(proceeding = number, status = %decision.status, days = dates.len(), "Processing proceeding");

        let mut failed = 0;
        for date in dates {
            if only_missing && persisted.contains(&date) {
                continue;
            }
            let date = date.format("%Y-%m-%d").to_string();
            if let Err(e) = self.process_day(term, &details, &date, options).await {
                self.record_day_failure(number, &date, &e);
                failed += 1;
            }
        }

        if failed == 0 {
            self.policy.mark_checked(self.store, decision.status, term, number);
        }
        self.stats.proceedings_processed += 1;
        Ok(())
    }

    /// Log a failed day and count it in the run statistics.
    pub fn record_day_failure(&mut self, proceeding: u32, date: &str, error: &Error) {
        tracing::error!(proceeding, date, error = %error, "Day failed");
        self.stats.errors += 1;
    }

    async fn proceeding_details(&mut self, term: u32, proceeding: &Proceeding) -> Result<Proceeding, Error> {
        let response = self.api.fetch(self.store, &Endpoint::proceeding(term, proceeding.number)).await?;
        let mut details = match response.into_json::<Proceeding>()? {
            Some(details) => details,
            None => {
                tracing::warn!(proceeding = proceeding.number, "No proceeding details, using list entry");
                proceeding.clone()
            }
        };
        if details.dates.is_empty() {
            details.dates = proceeding.dates.clone();
        }
        Ok(details)
    }

    fn save_proceeding_info(&mut self, term: u32, details: &Proceeding) -> Result<(), Error> {
        let path = self.tree.proceeding_dir(term, details.number, details.first_date()).join("info_posiedzenia.json");
        let info = json!({
            "metadata": {
                "term": term,
                "proceeding_id": details.number,
                "generated_at": Utc::now(),
            },
            "proceeding_data": details,
        });
        self.tree.write_json(&path, &info)?;
        self.store.register_file(&path, json!({ "kind": "proceeding_info", "term": term, "proceeding": details.number }))
    }

    async fn ensure_members(&mut self, term: u32) {
        if self.members.is_some() {
            return;
        }
        let index = match MemberIndex::load(&self.api, self.store, term).await {
            Ok(index) => index,
            Err(e) => {
                tracing::warn!(term, error = %e, "Could not load MP list");
                MemberIndex::default()
            }
        };
        tracing::debug!(term, names = index.len(), "MP index ready");
        self.members = Some(index);
    }

    async fn statement_content(&self, term: u32, number: u32, date: &str, statement: u32) -> Result<StatementContent, Error> {
        let endpoint = Endpoint::statement(term, number, date, statement);
        let Some((bytes, content_type)) = self.api.fetch_fresh(&endpoint).await?.into_bytes() else {
            return Ok(StatementContent { text: String::new(), source: "not_available" });
        };
        let (_, text) = self.pipeline.extract_text(&bytes, Some(&endpoint.path), content_type.as_deref());
        Ok(StatementContent { text, source: "api_html" })
    }

    /// Fetch, enrich and persist the statements of one sitting day.
    pub async fn process_day(
        &mut self, term: u32, proceeding: &Proceeding, date: &str, options: &ScrapeOptions,
    ) -> Result<DayOutcome, Error> {
        let number = proceeding.number;
        let response = self.api.fetch_fresh(&Endpoint::transcripts(term, number, date)).await?;
        let statements = match response.into_json::<StatementList>()? {
            Some(list) if !list.statements.is_empty() => list.statements,
            _ => {
                tracing::debug!(proceeding = number, date, "No statements available yet");
                self.stats.days_unavailable += 1;
                return Ok(DayOutcome::Unavailable);
            }
        };
        tracing::info!(proceeding = number, date, statements = statements.len(), "Processing day");

        self.ensure_members(term).await;

        let mut statements = statements;
        statements.sort_by_key(|s| s.num);

        let mut records = Vec::with_capacity(statements.len());
        let mut texts = Vec::new();
        for statement in &statements {
            let content = if options.fetch_full_statements {
                match self.statement_content(term, number, date, statement.num).await {
                    Ok(content) => content,
                    Err(e) => {
                        tracing::warn!(proceeding = number, date, num = statement.num, error = %e, "Statement failed");
                        self.stats.errors += 1;
                        StatementContent { text: String::new(), source: "error" }
                    }
                }
            } else {
                StatementContent { text: String::new(), source: "not_fetched" }
            };

            if !content.text.is_empty() {
                self.stats.statements_with_full_content += 1;
                texts.push(content.text.clone());
            }
            records.push(self.statement_record(term, number, date, statement, content, options));
        }

        let validation = options.fetch_full_statements.then(|| {
            let source = format!("/sejm/term{term}/proceedings/{number}/{date}");
            self.pipeline.validate(&texts.join("\n\n"), Some(&source))
        });
        let low_confidence = validation.as_ref().is_some_and(|v| !v.passed);

        let pdf = if options.fetch_pdf { self.process_pdf(term, proceeding, date).await } else { Value::Null };

        let day = json!({
            "metadata": {
                "term": term,
                "proceeding_id": number,
                "date": date,
                "generated_at": Utc::now(),
                "proceeding_info": {
                    "title": proceeding.title,
                    "dates": proceeding.dates,
                    "number": number,
                },
                "statements_count": records.len(),
                "validation": validation,
                "low_confidence": low_confidence,
                "pdf": pdf,
            },
            "statements": records,
        });

        let path = self.tree.transcript_json(term, number, proceeding.first_date(), date);
        self.tree.write_json(&path, &day)?;
        self.store.register_file(
            &path,
            json!({ "kind": "transcripts", "term": term, "proceeding": number, "date": date }),
        )?;

        self.stats.days_processed += 1;
        self.stats.statements_processed += statements.len();
        if low_confidence {
            self.stats.low_confidence_days += 1;
        }
        tracing::info!(path = %path.display(), statements = statements.len(), low_confidence, "Saved day");

        Ok(DayOutcome::Saved { path, statements: statements.len(), low_confidence })
    }

    fn statement_record(
        &mut self, term: u32, number: u32, date: &str, statement: &StatementRecord, content: StatementContent,
        options: &ScrapeOptions,
    ) -> Value {
        let member = self.members.as_ref().and_then(|index| index.lookup(&statement.name));
        if member.is_some() {
            self.stats.mp_enrichments += 1;
        }
        let has_text = !content.text.is_empty();
        let speaker = if statement.name.is_empty() { "Nieznany" } else { statement.name.as_str() };

        json!({
            "num": statement.num,
            "speaker": {
                "name": speaker,
                "function": statement.function,
                "is_mp": member.is_some(),
                "mp_data": member.map(mp_data),
            },
            "timing": {
                "start_datetime": statement.start_date_time,
                "end_datetime": statement.end_date_time,
                "duration_seconds": statement.duration_seconds(),
            },
            "content": {
                "text": content.text,
                "has_full_content": has_text,
                "content_source": content.source,
                "low_confidence": options.fetch_full_statements && !has_text,
            },
            "technical": {
                "api_url": format!("/sejm/term{term}/proceedings/{number}/{date}/transcripts/{}", statement.num),
                "original_data": statement,
            },
        })
    }

    /// Download the day PDF, store its text and describe the result.
    async fn process_pdf(&mut self, term: u32, proceeding: &Proceeding, date: &str) -> Value {
        let endpoint = Endpoint::transcript_pdf(term, proceeding.number, date);
        let (bytes, content_type) = match self.api.fetch_fresh(&endpoint).await.map(|r| r.into_bytes()) {
            Ok(Some(body)) => body,
            Ok(None) => return Value::Null,
            Err(e) => {
                tracing::warn!(proceeding = proceeding.number, date, error = %e, "PDF download failed");
                self.stats.errors += 1;
                return Value::Null;
            }
        };

        let document = self.pipeline.process(bytes, Some(&endpoint.path), content_type.as_deref());
        let path = self.tree.transcript_text(term, proceeding.number, proceeding.first_date(), date);
        let written = self
            .tree
            .write_bytes(&path, document.text().as_bytes())
            .and_then(|_| self.store.register_file(&path, json!({ "kind": "pdf_text", "date": date })));
        if let Err(e) = written {
            tracing::warn!(path = %path.display(), error = %e, "Could not save PDF text");
            self.stats.errors += 1;
            return Value::Null;
        }

        self.stats.pdf_transcripts += 1;
        json!({
            "file": path.file_name().map(|n| n.to_string_lossy().into_owned()),
            "detected_type": document.detected_type(),
            "validation": document.validation(),
            "low_confidence": document.is_low_confidence(),
        })
    }
}
