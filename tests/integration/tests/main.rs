//! End-to-End Integration Tests
//!
//! These tests drive the metadata resolver through its whole pipeline:
//! source, parser, filter chain, trust evaluation, index and refresh.

mod common;
mod filter_pipeline;
mod resolver_lifecycle;
mod signature_validation;
