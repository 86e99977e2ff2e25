//! Infrastructure layer module
//!
//! This module contains the adapters and ambient integrations:
//! - Configuration management
//! - Logging infrastructure
//! - Scripted in-memory implementations of the domain ports
//!
//! Infrastructure implementations satisfy the port traits defined in the domain layer.

pub mod config;
pub mod logging;
pub mod simulation;
