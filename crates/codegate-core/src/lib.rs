//! codegate-core — submission evaluation and progress analytics.
//!
//! This crate defines the score record data model, the response validator,
//! the pass/fail decision rules, the bounded evaluator that ties them to an
//! LLM provider, and the aggregation of attempt history into statistics.

pub mod catalog;
pub mod decision;
pub mod engine;
pub mod error;
pub mod model;
pub mod prompt;
pub mod session;
pub mod statistics;
pub mod store;
pub mod traits;
pub mod validator;
