pub mod admin;
pub mod crawl;

// Re-export command functions for convenience
pub use admin::{configure, seed, stats};
pub use crawl::{crawl, run};
