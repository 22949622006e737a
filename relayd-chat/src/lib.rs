//! Shared application protocol for the chat binaries.

pub mod config;
pub mod protocol;
