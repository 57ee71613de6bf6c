//! Crawl lifecycle state
//!
//! A crawl moves through `Idle → Running → Completed | Aborted`. `Aborted` is
//! reserved for failures before traversal really starts (invalid
//! configuration, unreachable seed, no browser in rendered mode). Per-page
//! failures never abort a crawl.

mod crawl_state;

pub use crawl_state::CrawlState;
