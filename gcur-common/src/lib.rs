//! # Gene Curation Common Library
//!
//! Shared code for the gene curation workspace:
//! - Error and result types
//! - Configuration loading and root folder resolution
//! - Shared data model (scopes, users, memberships, curations, stages)
//! - Audit event types and the broadcast `EventBus`
//! - SQLite initialisation and schema migrations
//! - Time and UUID utilities

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, Result};
pub use models::{Actor, AppRole, Curation, Membership, Scope, ScopeRole, Visibility, WorkflowStage};
