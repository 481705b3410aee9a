use log::{debug, error, info, warn};
use std::path::PathBuf;

use super::subject::{self, Category};
use super::{attachment, total};
use crate::config::OutputDirs;
use crate::email::{EmailMessage, ExtractError};

/// What happened to one message
#[derive(Debug)]
pub struct MessageOutcome {
    pub subject: String,
    pub category: Category,
    pub saved_attachments: Vec<PathBuf>,
    pub total: Option<String>,
    /// Recoverable problems, already logged
    pub errors: Vec<ExtractError>,
}

impl MessageOutcome {
    fn new(subject: String, category: Category) -> Self {
        MessageOutcome {
            subject,
            category,
            saved_attachments: Vec::new(),
            total: None,
            errors: Vec::new(),
        }
    }

    /// Number of artifacts written to disk
    pub fn records(&self) -> usize {
        self.saved_attachments.len() + usize::from(self.total.is_some())
    }

    fn record_error(&mut self, err: ExtractError) {
        if err.is_warning() {
            warn!("{}", err);
        } else {
            error!("{}", err);
        }
        self.errors.push(err);
    }
}

/// Classifies one message and dispatches it to the extractors
pub struct MessageProcessor {
    dirs: OutputDirs,
}

impl MessageProcessor {
    pub fn new(dirs: OutputDirs) -> Self {
        MessageProcessor { dirs }
    }

    /// Decoded subject and category, without touching the filesystem
    pub fn preview(message: &EmailMessage) -> (String, Category) {
        let subject = message
            .raw_subject
            .as_deref()
            .map(subject::decode)
            .unwrap_or_default();
        let category = subject::classify(&subject);
        (subject, category)
    }

    pub fn process(&self, message: &EmailMessage) -> MessageOutcome {
        let (subject, category) = Self::preview(message);
        info!("Email subject: {}", subject);

        let mut outcome = MessageOutcome::new(subject, category);
        if category == Category::Unclassified {
            debug!("Subject does not match any known category, skipping");
            return outcome;
        }

        if let Some(output_dir) = category.output_dir(&self.dirs) {
            for part in &message.parts {
                match attachment::extract(part, category, output_dir) {
                    Ok(Some(path)) => outcome.saved_attachments.push(path),
                    Ok(None) => {}
                    Err(e) => outcome.record_error(e),
                }
            }
        }

        if category == Category::OrderConfirmation {
            match total::extract(message, &self.dirs.gomme) {
                Ok(value) => outcome.total = Some(value),
                Err(e) => outcome.record_error(e),
            }
        }

        debug!(
            "Processed {} email: {} attachment(s), total: {:?}",
            category.label(),
            outcome.saved_attachments.len(),
            outcome.total
        );
        outcome
    }
}
