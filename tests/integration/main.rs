//! Integration tests for Rent-Trawl
//!
//! Every test runs the real HTTP stack against a wiremock server standing in
//! for the listing site, with a temporary SQLite database.

mod crawl_tests;
