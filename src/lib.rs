//! sitewatch — website-visit monitoring & blocking simulation agent.
//!
//! Simulates many concurrent users browsing a fixed site catalog, classifies
//! each visit as allowed or blocked against a `blocked_sites` table, and
//! persists every visit to SQLite through a bounded connection pool.

pub mod agent;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod init;
pub mod pool;
pub mod simulator;
pub mod stats;
pub mod store;
