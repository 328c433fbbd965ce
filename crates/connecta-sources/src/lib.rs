//! Connecta-Sources: data-source collaborators for the admin reporting engine
//!
//! Every backend collection the admin console reads from (users, jobs,
//! projects, proposals, payments, contracts, subscriptions, profiles) is
//! reached through the [`DataSource`] trait. Responses are handed back as raw
//! JSON envelopes; deciding what shape they have is the job of the reporting
//! engine, not of this crate.
//!
//! ## Layer 0 - Data Access
//!
//! Focus: reaching the sources and reporting failures faithfully.
//!
//! ## Key Components
//!
//! - `HttpDataSource`: reqwest-backed client for the admin REST API
//! - `MemoryDataSource`: in-memory fake with injectable failures and latency
//! - `Collection` / `FilterParams`: what to fetch and how to narrow it

pub mod client;
pub mod collection;
pub mod config;
mod error;
pub mod fakes;
pub mod source;

pub use client::HttpDataSource;
pub use collection::{Collection, FilterParams};
pub use config::ApiConfig;
pub use error::SourceError;
pub use fakes::{InjectedFailure, MemoryDataSource};
pub use source::DataSource;

/// Result type for data-source operations
pub type SourceResult<T> = std::result::Result<T, SourceError>;
