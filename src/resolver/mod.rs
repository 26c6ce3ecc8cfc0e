//! # Status Resolver
//!
//! Queries every configured account, reconciles the records for each plate
//! and derives the permit state.

pub mod accounts;
pub mod derive;
pub mod parse;
pub mod service;
pub mod types;

pub use accounts::{AccountSource, StaticAccountSource};
pub use derive::derive_status;
pub use parse::parse_account_response;
pub use service::{ResolverSettings, StatusResolver, NO_ACCOUNTS, NO_MATCHING_RECORD};
pub use types::{Account, AccountRecord, DataSource, PermitState, PermitStatus};
