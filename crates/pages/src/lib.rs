//! Generated site furniture around the streamed paragraph: page layout,
//! metadata, plausible internal links, `robots.txt` and `sitemap.xml`.
//!
//! Every link points back into the tarpit, so a crawler that follows them
//! never runs out of pages.

pub mod layout;
pub mod links;
pub mod meta;
pub mod page;
pub mod robots;
pub mod sitemap;

pub use links::{generate_links, slugify, Link, CATEGORIES};
pub use meta::PageMeta;
pub use page::TarpitPage;
pub use robots::robots_txt;
pub use sitemap::{sitemap_entries, sitemap_xml, SitemapEntry};
