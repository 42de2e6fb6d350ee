//! Post feed, search and publishing.

pub mod handlers;
pub mod markdown;

pub use markdown::convert_to_html;
