pub mod common;
pub mod error;
pub mod message;
pub mod processor_base;

// Re-export commonly used items
pub use common::{ProcessingResult, SearchQuery};
pub use error::ExtractError;
pub use message::{EmailMessage, MessagePart};
pub use processor_base::{Mailbox, OrderMailProcessor};
