use std::path::PathBuf;
use thiserror::Error;

/// Recoverable conditions reported by the extraction core.
///
/// None of these abort a run: the message processor logs them and moves on
/// to the next part or message.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Unable to decode message: {0}")]
    DecodeFailure(String),

    #[error("No HTML body found in this email")]
    MissingHtmlBody,

    #[error("No table data found")]
    MissingTableData,

    #[error("Totale ordine not found")]
    TotalNotFound,

    #[error("Error while saving attachment {path:?}: {source}")]
    AttachmentWriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error while appending total to {path:?}: {source}")]
    TotalWriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to fetch email ID {id}: {reason}")]
    UpstreamFetchFailure { id: u32, reason: String },
}

impl ExtractError {
    /// Warnings are expected outcomes for some mails; the rest are errors.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            ExtractError::MissingHtmlBody | ExtractError::MissingTableData | ExtractError::TotalNotFound
        )
    }
}
