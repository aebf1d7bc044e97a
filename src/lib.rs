// src/lib.rs

pub mod config;
pub mod diff;
pub mod error;
pub mod github;
pub mod llm;
pub mod rag;
pub mod review;
pub mod store;
pub mod vector;
