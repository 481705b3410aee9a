use anyhow::Result;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::fs;
use std::future::Future;
use std::pin::Pin;

use ordermail::config::Config;
use ordermail::email::{Mailbox, OrderMailProcessor, SearchQuery};
use ordermail::orders::total::TOTALS_FILE;

/// Mailbox serving messages from memory; ids without content fail to fetch
struct FakeMailbox {
    ids: Vec<u32>,
    messages: HashMap<u32, Vec<u8>>,
    fetched: Vec<u32>,
    queries: Vec<String>,
}

impl FakeMailbox {
    fn new(messages: Vec<(u32, Option<Vec<u8>>)>) -> Self {
        FakeMailbox {
            ids: messages.iter().map(|(id, _)| *id).collect(),
            messages: messages
                .into_iter()
                .filter_map(|(id, raw)| raw.map(|raw| (id, raw)))
                .collect(),
            fetched: Vec::new(),
            queries: Vec::new(),
        }
    }
}

impl Mailbox for FakeMailbox {
    fn search<'a>(
        &'a mut self,
        query: &'a SearchQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u32>>> + Send + 'a>> {
        Box::pin(async move {
            self.queries.push(query.to_imap_criteria());
            Ok(self.ids.clone())
        })
    }

    fn fetch_raw<'a>(
        &'a mut self,
        message_id: u32,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send + 'a>> {
        Box::pin(async move {
            self.fetched.push(message_id);
            self.messages
                .get(&message_id)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("connection reset"))
        })
    }
}

struct FailingMailbox;

impl Mailbox for FailingMailbox {
    fn search<'a>(
        &'a mut self,
        _query: &'a SearchQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u32>>> + Send + 'a>> {
        Box::pin(async { Err::<Vec<u32>, _>(anyhow::anyhow!("SEARCH rejected")) })
    }

    fn fetch_raw<'a>(
        &'a mut self,
        _message_id: u32,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send + 'a>> {
        Box::pin(async { Err::<Vec<u8>, _>(anyhow::anyhow!("not connected")) })
    }
}

fn config(data_dir: &std::path::Path) -> Config {
    let vars: HashMap<&str, &str> = [
        ("IMAP_SERVER", "imap.example.com"),
        ("IMAP_USERNAME", "ordini@officina.it"),
        ("IMAP_PASSWORD", "secret"),
        ("DISPATCHER_EMAIL", "noreply@fornitore.it"),
        ("EMAIL_START_DATE", "01-Jan-2024"),
        ("EMAIL_END_DATE", "01-Feb-2024"),
    ]
    .into_iter()
    .collect();

    Config::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
        .unwrap()
        .with_data_dir(data_dir.to_str().unwrap())
}

fn fixture(name: &str) -> Vec<u8> {
    fs::read(format!("data_test/{}", name)).unwrap()
}

fn query() -> SearchQuery {
    SearchQuery::new(
        "noreply@fornitore.it",
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
    )
}

#[tokio::test]
async fn test_run_processes_every_email_in_order() {
    let root = tempfile::tempdir().unwrap();
    let config = config(root.path());
    config.output.ensure_exist().unwrap();
    let processor = OrderMailProcessor::new(config.clone());

    let mut mailbox = FakeMailbox::new(vec![
        (3, Some(fixture("delivery.eml"))),
        (7, Some(fixture("exchange_credit.eml"))),
        (9, Some(fixture("order_confirmation.eml"))),
        (12, Some(b"From: someone@else.it\r\nSubject: Random subject\r\n\r\nhello".to_vec())),
    ]);

    let result = processor.run(&mut mailbox, &query(), None, false).await.unwrap();

    assert_eq!(mailbox.fetched, vec![3, 7, 9, 12]);
    assert_eq!(
        mailbox.queries,
        vec!["FROM \"noreply@fornitore.it\" SINCE 01-Jan-2024 BEFORE 01-Feb-2024"]
    );
    assert_eq!(result.emails_found, 4);
    assert_eq!(result.emails_processed, 4);
    assert_eq!(result.emails_failed, 0);
    assert_eq!(result.attachments_saved, 2);
    assert_eq!(result.totals_saved, 1);
    assert!(config.output.bolle.join("BL-2024-1.pdf").exists());
    assert!(config.output.xc.join("XC-99.pdf").exists());
    assert_eq!(
        fs::read_to_string(config.output.gomme.join(TOTALS_FILE)).unwrap(),
        "€ 1.234,56\n"
    );
}

#[tokio::test]
async fn test_fetch_failure_skips_only_that_email() {
    let root = tempfile::tempdir().unwrap();
    let config = config(root.path());
    config.output.ensure_exist().unwrap();
    let processor = OrderMailProcessor::new(config.clone());

    let mut mailbox = FakeMailbox::new(vec![
        (1, None),
        (2, Some(fixture("delivery.eml"))),
    ]);

    let result = processor.run(&mut mailbox, &query(), None, false).await.unwrap();

    assert_eq!(mailbox.fetched, vec![1, 2]);
    assert_eq!(result.emails_failed, 1);
    assert_eq!(result.emails_processed, 1);
    assert!(config.output.bolle.join("BL-2024-1.pdf").exists());
}

#[tokio::test]
async fn test_unparsable_email_is_counted_and_skipped() {
    let root = tempfile::tempdir().unwrap();
    let config = config(root.path());
    config.output.ensure_exist().unwrap();
    let processor = OrderMailProcessor::new(config.clone());

    let mut mailbox = FakeMailbox::new(vec![
        (1, Some(Vec::new())),
        (2, Some(fixture("delivery.eml"))),
    ]);

    let result = processor.run(&mut mailbox, &query(), None, false).await.unwrap();

    assert_eq!(mailbox.fetched, vec![1, 2]);
    assert_eq!(result.emails_failed, 1);
    assert_eq!(result.emails_processed, 1);
    assert_eq!(result.attachments_saved, 1);
    assert!(config.output.bolle.join("BL-2024-1.pdf").exists());
}

#[tokio::test]
async fn test_limit_caps_fetched_emails() {
    let root = tempfile::tempdir().unwrap();
    let config = config(root.path());
    config.output.ensure_exist().unwrap();
    let processor = OrderMailProcessor::new(config);

    let mut mailbox = FakeMailbox::new(vec![
        (1, Some(fixture("delivery.eml"))),
        (2, Some(fixture("exchange_credit.eml"))),
    ]);

    let result = processor.run(&mut mailbox, &query(), Some(1), false).await.unwrap();

    assert_eq!(mailbox.fetched, vec![1]);
    assert_eq!(result.emails_found, 2);
    assert_eq!(result.emails_processed, 1);
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let root = tempfile::tempdir().unwrap();
    let config = config(root.path());
    let processor = OrderMailProcessor::new(config.clone());

    let mut mailbox = FakeMailbox::new(vec![
        (1, Some(fixture("delivery.eml"))),
        (2, Some(fixture("order_confirmation.eml"))),
    ]);

    let result = processor.run(&mut mailbox, &query(), None, true).await.unwrap();

    assert_eq!(result.emails_processed, 2);
    assert_eq!(result.records(), 0);
    assert!(!config.output.bolle.exists());
    assert!(!config.output.gomme.exists());
}

#[tokio::test]
async fn test_empty_search_result() {
    let root = tempfile::tempdir().unwrap();
    let processor = OrderMailProcessor::new(config(root.path()));
    let mut mailbox = FakeMailbox::new(Vec::new());

    let result = processor.run(&mut mailbox, &query(), None, false).await.unwrap();

    assert_eq!(result.emails_found, 0);
    assert!(mailbox.fetched.is_empty());
}

#[tokio::test]
async fn test_search_failure_is_fatal() {
    let root = tempfile::tempdir().unwrap();
    let processor = OrderMailProcessor::new(config(root.path()));

    let err = processor.run(&mut FailingMailbox, &query(), None, false).await.unwrap_err();

    assert!(format!("{:#}", err).contains("SEARCH rejected"));
}
