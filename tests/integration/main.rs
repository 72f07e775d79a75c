//! Integration tests for xbrl-filings
//!
//! These tests use wiremock to create mock HTTP servers for the filings API
//! and for artifact downloads.

mod download_tests;
mod query_tests;
