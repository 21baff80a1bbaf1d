//! CLI command implementations.

pub mod chat;
pub mod docs;
pub mod history;
pub mod memory;
pub mod onboard;
pub mod status;
