// Library exports for ordermail crate
// This allows tests and the binary to use the modules

pub mod config;
pub mod email;
pub mod imap_client;

// Delivery notes, exchange credits and order totals
pub mod orders;
