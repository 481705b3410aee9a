/// Common structures and utilities for email processing
use chrono::NaiveDate;

use crate::config::SearchConfig;

/// Mailbox filter for one run: a single sender over a date range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub sender: String,
    /// Inclusive
    pub since: NaiveDate,
    /// Exclusive
    pub before: NaiveDate,
}

impl SearchQuery {
    pub fn new(sender: impl Into<String>, since: NaiveDate, before: NaiveDate) -> Self {
        SearchQuery {
            sender: sender.into(),
            since,
            before,
        }
    }

    pub fn from_config(search: &SearchConfig) -> Self {
        Self::new(search.sender.clone(), search.start_date, search.end_date_or_tomorrow())
    }

    /// IMAP SEARCH criteria, e.g. `FROM "a@b.c" SINCE 01-Jan-2024 BEFORE 01-Feb-2024`
    pub fn to_imap_criteria(&self) -> String {
        format!(
            "FROM \"{}\" SINCE {} BEFORE {}",
            self.sender.replace('\\', "\\\\").replace('"', "\\\""),
            self.since.format("%d-%b-%Y"),
            self.before.format("%d-%b-%Y")
        )
    }
}

/// Result of email processing
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProcessingResult {
    pub emails_found: usize,
    pub emails_processed: usize,
    pub emails_failed: usize,
    pub attachments_saved: usize,
    pub totals_saved: usize,
    /// Recoverable extraction problems across all processed emails
    pub extraction_errors: usize,
}

impl ProcessingResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn success(&mut self) {
        self.emails_processed += 1;
    }

    pub fn failure(&mut self) {
        self.emails_failed += 1;
    }

    pub fn records(&self) -> usize {
        self.attachments_saved + self.totals_saved
    }
}
