//! Core of the hindsight review assistant: diff parsing, the learned
//! feedback store, LLM-backed suggestion generation, and review
//! orchestration. The HTTP surface lives in `hindsight-server`.

pub mod diff;
pub mod engine;
pub mod generator;
pub mod github;
pub mod json_store;
pub mod memory;
pub mod model;
pub mod parser;
pub mod review;
pub mod stats;
pub mod store;
