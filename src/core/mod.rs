//! Core domain types and the reconciliation engine

pub mod engine;
pub mod models;
