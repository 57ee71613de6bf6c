//! End-to-end crawl tests

mod crawl_tests;
mod rendered_tests;
