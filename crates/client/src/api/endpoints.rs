//! Sejm API endpoint descriptors.
//!
//! Every call the scraper makes is described by an [`Endpoint`]: its path under
//! the API base URL, query parameters and the kind of body it returns.

use sejmbot_core::{CacheKey, Error};
use url::Url;

/// Expected body of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Json,
    Html,
    Binary,
}

/// A single API call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub path: String,
    pub params: Vec<(&'static str, String)>,
    pub kind: ResponseKind,
}

impl Endpoint {
    fn json(path: String) -> Self {
        Self { path, params: Vec::new(), kind: ResponseKind::Json }
    }

    pub fn terms() -> Self {
        Self::json("/sejm/term".into())
    }

    pub fn term(term: u32) -> Self {
        Self::json(format!("/sejm/term{term}"))
    }

    pub fn proceedings(term: u32) -> Self {
        Self::json(format!("/sejm/term{term}/proceedings"))
    }

    pub fn proceeding(term: u32, number: u32) -> Self {
        Self::json(format!("/sejm/term{term}/proceedings/{number}"))
    }

    /// Statement list of one sitting day.
    pub fn transcripts(term: u32, number: u32, date: &str) -> Self {
        Self::json(format!("/sejm/term{term}/proceedings/{number}/{date}/transcripts"))
    }

    /// HTML text of a single statement.
    pub fn statement(term: u32, number: u32, date: &str, statement: u32) -> Self {
        Self {
            path: format!("/sejm/term{term}/proceedings/{number}/{date}/transcripts/{statement}"),
            params: Vec::new(),
            kind: ResponseKind::Html,
        }
    }

    /// Full transcript of a sitting day as PDF.
    pub fn transcript_pdf(term: u32, number: u32, date: &str) -> Self {
        Self {
            path: format!("/sejm/term{term}/proceedings/{number}/{date}/transcripts/pdf"),
            params: Vec::new(),
            kind: ResponseKind::Binary,
        }
    }

    pub fn members(term: u32) -> Self {
        Self::json(format!("/sejm/term{term}/MP"))
    }

    pub fn member(term: u32, id: u32) -> Self {
        Self::json(format!("/sejm/term{term}/MP/{id}"))
    }

    pub fn member_photo(term: u32, id: u32) -> Self {
        Self { path: format!("/sejm/term{term}/MP/{id}/photo"), params: Vec::new(), kind: ResponseKind::Binary }
    }

    pub fn member_voting_stats(term: u32, id: u32) -> Self {
        Self::json(format!("/sejm/term{term}/MP/{id}/votings/stats"))
    }

    pub fn clubs(term: u32) -> Self {
        Self::json(format!("/sejm/term{term}/clubs"))
    }

    pub fn club(term: u32, id: &str) -> Self {
        Self::json(format!("/sejm/term{term}/clubs/{id}"))
    }

    pub fn club_logo(term: u32, id: &str) -> Self {
        Self { path: format!("/sejm/term{term}/clubs/{id}/logo"), params: Vec::new(), kind: ResponseKind::Binary }
    }

    /// Add a query parameter.
    pub fn with_param(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.params.push((key, value.into()));
        self
    }

    /// Cache key for this call. Parameter order does not matter.
    pub fn cache_key(&self) -> CacheKey {
        let params: Vec<(&str, &str)> = self.params.iter().map(|(k, v)| (*k, v.as_str())).collect();
        CacheKey::api(&self.path, &params)
    }

    /// Absolute URL under `base`.
    pub fn url(&self, base: &str) -> Result<Url, Error> {
        let joined = format!("{}{}", base.trim_end_matches('/'), self.path);
        let mut url = Url::parse(&joined).map_err(|e| Error::InvalidInput(format!("bad URL {joined}: {e}")))?;
        if !self.params.is_empty() {
            url.query_pairs_mut().extend_pairs(self.params.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }

    /// Value for the `Accept` header.
    pub fn accept(&self) -> &'static str {
        match self.kind {
            ResponseKind::Json => "application/json",
            ResponseKind::Html => "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8",
            ResponseKind::Binary => "*/*",
        }
    }
}
