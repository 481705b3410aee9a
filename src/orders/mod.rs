/// Classification and extraction of supplier order emails
pub mod attachment;
pub mod processor;
pub mod subject;
pub mod total;

pub use processor::{MessageOutcome, MessageProcessor};
pub use subject::{classify, decode, Category};
