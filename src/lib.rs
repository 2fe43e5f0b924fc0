#![forbid(unsafe_code)]

//! Library behind the tubescribe binaries: ingest YouTube video metadata and
//! caption tracks, normalize them, and persist them into a local SQLite
//! database with idempotent upserts.

pub mod config;
pub mod ids;
pub mod ingest;
pub mod resolver;
pub mod search;
pub mod store;
#[cfg(test)]
pub(crate) mod testutil;
pub mod transcripts;
