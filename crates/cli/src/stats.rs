//! Per-run counters.

use serde::Serialize;

/// What a scrape, members or scheduler run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub proceedings_processed: usize,
    pub proceedings_skipped: usize,
    pub future_proceedings: usize,
    pub days_processed: usize,
    pub days_unavailable: usize,
    pub statements_processed: usize,
    pub statements_with_full_content: usize,
    pub low_confidence_days: usize,
    pub mp_enrichments: usize,
    pub pdf_transcripts: usize,
    pub mps_downloaded: usize,
    pub photos_downloaded: usize,
    pub voting_stats_downloaded: usize,
    pub clubs_downloaded: usize,
    pub logos_downloaded: usize,
    pub errors: usize,
}

impl RunStats {
    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    pub fn merge(&mut self, other: &RunStats) {
        self.proceedings_processed += other.proceedings_processed;
        self.proceedings_skipped += other.proceedings_skipped;
        self.future_proceedings += other.future_proceedings;
        self.days_processed += other.days_processed;
        self.days_unavailable += other.days_unavailable;
        self.statements_processed += other.statements_processed;
        self.statements_with_full_content += other.statements_with_full_content;
        self.low_confidence_days += other.low_confidence_days;
        self.mp_enrichments += other.mp_enrichments;
        self.pdf_transcripts += other.pdf_transcripts;
        self.mps_downloaded += other.mps_downloaded;
        self.photos_downloaded += other.photos_downloaded;
        self.voting_stats_downloaded += other.voting_stats_downloaded;
        self.clubs_downloaded += other.clubs_downloaded;
        self.logos_downloaded += other.logos_downloaded;
        self.errors += other.errors;
    }

    pub fn log_summary(&self) {
        tracing::info!(
            proceedings = self.proceedings_processed,
            skipped = self.proceedings_skipped,
            future = self.future_proceedings,
            days = self.days_processed,
            unavailable = self.days_unavailable,
            statements = self.statements_processed,
            full_content = self.statements_with_full_content,
            low_confidence = self.low_confidence_days,
            enrichments = self.mp_enrichments,
            errors = self.errors,
            "Scrape finished"
        );
    }
}
