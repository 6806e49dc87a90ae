//! Core pipeline orchestration and domain logic for Dossier.
//!
//! This crate ties the source adapters, reliability grading, and the
//! persistence ports together into one intake run per subject.

pub mod orchestrator;
pub mod scoring;

pub use orchestrator::{Orchestrator, RunReport};
pub use scoring::{Assessment, assess, grade};
