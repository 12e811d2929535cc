//! # AIdea Common Library
//!
//! Shared code for the AIdea activity tracker including:
//! - Record types (Activity, Rule, Project)
//! - Declarative record-to-column mapping (Schema Reflector)
//! - Timestamp and human duration helpers
//! - Configuration file and data folder resolution
//! - Common error type

pub mod config;
pub mod error;
pub mod human_time;
pub mod models;
pub mod record;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, Result};
pub use models::{Activity, Project, Rule};
