use anyhow::{Result, Context};
use log::{info, error, warn};
use std::future::Future;
use std::pin::Pin;

use super::common::{ProcessingResult, SearchQuery};
use super::error::ExtractError;
use super::message::EmailMessage;
use crate::config::Config;
use crate::imap_client::ImapClient;
use crate::orders::{Category, MessageProcessor};

/// Source of raw order emails
pub trait Mailbox: Send {
    /// Ids of the messages matching the query, in the order they must be processed
    fn search<'a>(
        &'a mut self,
        query: &'a SearchQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u32>>> + Send + 'a>>;

    /// Raw RFC 822 bytes of one message
    fn fetch_raw<'a>(
        &'a mut self,
        message_id: u32,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send + 'a>>;
}

/// Drives one run: search, then fetch and process every matching email in order
pub struct OrderMailProcessor {
    config: Config,
    processor: MessageProcessor,
}

impl OrderMailProcessor {
    pub fn new(config: Config) -> Self {
        info!("Initializing order email processor");
        let processor = MessageProcessor::new(config.output.clone());
        OrderMailProcessor { config, processor }
    }

    pub async fn process_emails(&self, limit: Option<usize>) -> Result<ProcessingResult> {
        info!("Starting order email processing");
        self.process_emails_common(limit, false).await
    }

    pub async fn process_emails_dry_run(&self, limit: Option<usize>) -> Result<ProcessingResult> {
        println!("\n{}", "=".repeat(80));
        println!("🧪 MODE DRY-RUN - ORDER EMAIL ANALYSIS");
        println!("{}", "=".repeat(80));

        self.process_emails_common(limit, true).await
    }

    async fn process_emails_common(&self, limit: Option<usize>, is_dry_run: bool) -> Result<ProcessingResult> {
        let mut imap_client = ImapClient::new(&self.config.imap).await
            .context("Unable to connect to the IMAP server")?;

        let query = SearchQuery::from_config(&self.config.search);
        let result = self.run(&mut imap_client, &query, limit, is_dry_run).await;

        if let Err(e) = imap_client.logout().await {
            warn!("⚠️  {}", e);
        }

        result
    }

    /// Process every message the mailbox returns for `query`.
    ///
    /// Only the search itself is fatal; a message that cannot be fetched or
    /// parsed is logged, counted as failed and skipped.
    pub async fn run<M: Mailbox>(
        &self,
        mailbox: &mut M,
        query: &SearchQuery,
        limit: Option<usize>,
        is_dry_run: bool,
    ) -> Result<ProcessingResult> {
        let message_ids = mailbox.search(query).await
            .context("Error searching for emails")?;

        let mut result = ProcessingResult::new();
        result.emails_found = message_ids.len();

        if message_ids.is_empty() {
            if is_dry_run {
                println!("❌ No emails found from '{}' between {} and {}", query.sender, query.since, query.before);
            } else {
                info!("No emails found from '{}'", query.sender);
            }
            return Ok(result);
        }

        if is_dry_run {
            println!("✅ Found {} email(s) matching criteria\n", message_ids.len());
        }

        let emails_to_process: Vec<u32> = match limit {
            Some(limit) => message_ids.into_iter().take(limit).collect(),
            None => message_ids,
        };

        for (index, message_id) in emails_to_process.iter().copied().enumerate() {
            if is_dry_run {
                println!("📧 Email {}/{} (ID: {})", index + 1, emails_to_process.len(), message_id);
                println!("{}", "-".repeat(60));
            }

            let raw = match mailbox.fetch_raw(message_id).await {
                Ok(raw) => raw,
                Err(e) => {
                    let err = ExtractError::UpstreamFetchFailure { id: message_id, reason: format!("{:#}", e) };
                    error!("❌ {}", err);
                    result.failure();
                    continue;
                }
            };

            let message = match EmailMessage::parse(&raw) {
                Ok(message) => message,
                Err(e) => {
                    error!("❌ Email {}: {}", message_id, e);
                    result.failure();
                    continue;
                }
            };

            if is_dry_run {
                Self::describe(&message);
                result.success();
                continue;
            }

            let outcome = self.processor.process(&message);
            result.success();
            result.attachments_saved += outcome.saved_attachments.len();
            result.totals_saved += usize::from(outcome.total.is_some());
            result.extraction_errors += outcome.errors.len();

            if outcome.category != Category::Unclassified {
                info!(
                    "Email {} processed ({}): {} record(s) saved",
                    message_id,
                    outcome.category.label(),
                    outcome.records()
                );
            }
        }

        if is_dry_run {
            println!("{}", "=".repeat(80));
            println!("🏁 Analysis completed: {} emails analyzed out of {}", result.emails_processed, emails_to_process.len());
            println!("{}", "=".repeat(80));
        } else {
            info!(
                "Processing completed: {} emails processed, {} failed, {} attachment(s) and {} total(s) saved",
                result.emails_processed, result.emails_failed, result.attachments_saved, result.totals_saved
            );
        }

        Ok(result)
    }

    fn describe(message: &EmailMessage) {
        let (subject, category) = MessageProcessor::preview(message);
        println!("📋 Subject: {}", subject);
        println!("🏷️  Category: {}", category.label());

        let attachments: Vec<&str> = message
            .parts
            .iter()
            .filter(|part| part.content_type == crate::orders::attachment::ATTACHMENT_CONTENT_TYPE)
            .filter_map(|part| part.filename.as_deref())
            .collect();
        if !attachments.is_empty() {
            println!("📎 Attachments: {}", attachments.join(", "));
        }
        if category == Category::OrderConfirmation && message.html_part().is_none() {
            println!("⚠️  No HTML body found in this email");
        }
        println!();
    }
}
