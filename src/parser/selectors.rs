//! CSS selectors for arXiv-style pages
//!
//! Class selectors match the `class` attribute exactly, so
//! `class="title mathjax"` matches while `class="mathjax title"` does not.

use lazy_static::lazy_static;
use scraper::Selector;

// Helper macro to parse selectors safely at compile time
macro_rules! parse_selector {
    ($s:expr) => {
        Selector::parse($s).expect(concat!("Invalid CSS selector: ", $s))
    };
}

lazy_static! {
    /// Every anchor; those without an href are skipped one by one
    pub static ref ANCHOR: Selector = parse_selector!("a");

    pub static ref TITLE: Selector = parse_selector!(r#"[class="title mathjax"]"#);

    pub static ref AUTHORS: Selector = parse_selector!(r#"[class="authors"]"#);

    pub static ref ABSTRACT: Selector = parse_selector!(r#"[class="abstract mathjax"]"#);
}
