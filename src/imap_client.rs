use anyhow::{Result, Context};
use async_imap::Session;
use async_native_tls::{TlsConnector, TlsStream};
use futures::stream::StreamExt;
use log::{info, debug};
use std::future::Future;
use std::pin::Pin;
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};

use crate::config::ImapConfig;
use crate::email::{Mailbox, SearchQuery};

const INBOX: &str = "INBOX";

pub struct ImapClient {
    session: Session<TlsStream<Compat<TcpStream>>>,
}

impl ImapClient {
    pub async fn new(config: &ImapConfig) -> Result<Self> {
        info!("Connection to IMAP server: {}:{} with user: {}", config.server, config.port, config.username);

        // TCP first, then TLS on top of the futures-compatible stream
        let tcp_stream = TcpStream::connect((config.server.as_str(), config.port))
            .await
            .context("Unable to connect to the IMAP server")?;

        let tcp_stream_compat = tcp_stream.compat();

        let tls = TlsConnector::new();
        let tls_stream = tls.connect(&config.server, tcp_stream_compat)
            .await
            .context("Unable to establish the TLS connection")?;

        let client = async_imap::Client::new(tls_stream);

        let session = client
            .login(&config.username, &config.password)
            .await
            .map_err(|e| anyhow::anyhow!("Authentication failed: {:?}", e.0))?;

        info!("✅ IMAP connection established");

        Ok(ImapClient { session })
    }

    /// Message sequence numbers matching the query, in mailbox order
    pub async fn search_order_emails(&mut self, query: &SearchQuery) -> Result<Vec<u32>> {
        info!("Selecting {}", INBOX);

        self.session.select(INBOX)
            .await
            .with_context(|| format!("Unable to select {}", INBOX))?;

        let search_criteria = query.to_imap_criteria();
        debug!("Search criteria: {}", search_criteria);

        let message_ids = self.session
            .search(&search_criteria)
            .await
            .context("Failed to search emails")?;

        // The server answers with a set; restore mailbox order
        let mut ids_vec: Vec<u32> = message_ids.into_iter().collect();
        ids_vec.sort_unstable();
        info!("Found {} email(s) from {}", ids_vec.len(), query.sender);

        Ok(ids_vec)
    }

    /// Full RFC 822 source of one message
    pub async fn fetch_email_raw(&mut self, message_id: u32) -> Result<Vec<u8>> {
        debug!("Fetching email ID: {}", message_id);

        let messages_stream = self.session
            .fetch(message_id.to_string(), "RFC822")
            .await
            .context("Unable to fetch the email")?;

        let messages: Vec<_> = messages_stream
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<_, _>>()
            .context("Invalid FETCH response")?;

        for message in &messages {
            if let Some(body) = message.body() {
                debug!("Email fetched, size: {} bytes", body.len());
                return Ok(body.to_vec());
            }
        }

        anyhow::bail!("Email not found or empty for ID: {}", message_id);
    }

    pub async fn logout(mut self) -> Result<()> {
        info!("Logging out from the IMAP server");
        self.session.logout()
            .await
            .context("Error while logging out")?;
        Ok(())
    }
}

impl Mailbox for ImapClient {
    fn search<'a>(
        &'a mut self,
        query: &'a SearchQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u32>>> + Send + 'a>> {
        Box::pin(self.search_order_emails(query))
    }

    fn fetch_raw<'a>(
        &'a mut self,
        message_id: u32,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send + 'a>> {
        Box::pin(self.fetch_email_raw(message_id))
    }
}
