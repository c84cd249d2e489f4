//! # Exam-Prep Common Library
//!
//! Shared code for the exam-prep backend services:
//! - Bootstrap configuration loading (TOML, environment, compiled defaults)
//! - SQLite database initialization for the RBAC tables
//! - Common error type

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
