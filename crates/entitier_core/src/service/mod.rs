//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate collaborator calls into typed stored-procedure operations.
//! - Keep callers decoupled from storage details.

pub mod procedure_service;

pub use procedure_service::{ExecuteOptions, ProcedureService};
