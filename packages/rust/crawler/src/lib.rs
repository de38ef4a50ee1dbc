//! News site crawling.
//!
//! - [`SelectorCrawler`]: a [`newsreader_core::Crawler`] driven by the CSS
//!   selectors of one configured source
//! - `extract`: the synchronous HTML extraction it is built on

mod extract;
pub mod selector;

pub use selector::SelectorCrawler;
