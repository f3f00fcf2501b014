//! Shared chain types and the controller seam for the scribe plugins.
//!
//! This crate provides:
//! - Account names and the chain event payloads ([`chain`])
//! - ABI descriptors and binary payload decoding ([`abi`])
//! - The controller seam: signal subscriptions and read-only queries
//!   ([`controller`])
//! - Shared error types

pub mod abi;
pub mod chain;
pub mod controller;
mod error;
mod name;

pub use error::{Error, Result};
pub use name::{NEWACCOUNT_ACTION, Name, SETABI_ACTION, SYSTEM_ACCOUNT};
