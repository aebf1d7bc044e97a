// src/review/mod.rs

pub mod aggregate;
pub mod comments;
pub mod detector;
pub mod orchestrator;
pub mod patterns;
pub mod types;

pub use detector::ViolationDetector;
pub use orchestrator::{ReviewOrchestrator, RunFailure, RunOutcome};
