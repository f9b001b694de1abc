//! Database module for SQLite operations.
//!
//! This module provides:
//! - Database initialization and migrations
//! - SQLite pragma configuration
//! - Repository layer with the atomic conditional-update primitives the
//!   orchestration layer relies on

pub mod migrations;
pub mod repo;

pub use migrations::init_db;
pub use repo::{DepositCommit, Repository};
