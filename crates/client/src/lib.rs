//! Client code for SejmBot.
//!
//! This crate provides the Sejm API client, the transcript content pipeline
//! and webhook notifications used by the CLI.

pub mod api;
pub mod extract;
pub mod notify;

pub use api::{
    ApiResponse, ClientConfig, Club, Endpoint, Member, MockSejmApi, Proceeding, ResponseKind, RetryDecision,
    RetryPolicy, SejmApi, SejmClient, StatementList, StatementRecord, Term,
};
pub use extract::{
    ContentPipeline, DocumentType, ExtractedDocument, Extractor, HtmlExtractor, MeetingNumber, MeetingSource,
    PdfExtractor, TextValidator, ValidationReport, clean, detect, guess_meeting_number,
};
pub use notify::Notifier;
