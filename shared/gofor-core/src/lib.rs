//! GoFor360 Core - Shared domain types and service infrastructure
//!
//! This crate provides:
//! - Standard service trait every GoFor360 service implements
//! - Common domain types (PhoneNumber, record identifiers)
//! - Error handling utilities
//! - Configuration management

pub mod config;
pub mod domain;
pub mod error;
pub mod service;

pub use config::ServiceConfig;
pub use domain::*;
pub use error::{GoforError, Result};
pub use service::{
    DependencyStatus, GoforService, HealthStatus, MicroserviceRuntime, ReadinessStatus,
};
