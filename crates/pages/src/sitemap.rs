use chrono::NaiveDate;
use quagmire_common::escape_html;
use quagmire_text_model::TextModel;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::links::{generate_link, CATEGORIES};
use crate::meta::recent_date;

const CHANGE_FREQS: [&str; 3] = ["daily", "weekly", "monthly"];

#[derive(Debug, Clone, PartialEq)]
pub struct SitemapEntry {
    pub loc: String,
    pub lastmod: NaiveDate,
    pub changefreq: &'static str,
    pub priority: f64,
}

/// Homepage, every category index, then generated article URLs up to a
/// random total of 50 to 100 entries. Different on every call.
pub fn sitemap_entries<R: Rng + ?Sized>(
    model: &TextModel,
    rng: &mut R,
    base_url: &str,
    today: NaiveDate,
) -> Vec<SitemapEntry> {
    let base_url = base_url.trim_end_matches('/');
    let total = rng.gen_range(50..=100);
    let mut entries = Vec::with_capacity(total);

    entries.push(SitemapEntry {
        loc: format!("{}/", base_url),
        lastmod: today,
        changefreq: "daily",
        priority: 1.0,
    });
    for category in CATEGORIES {
        entries.push(SitemapEntry {
            loc: format!("{}/{}", base_url, category),
            lastmod: recent_date(rng, today),
            changefreq: "weekly",
            priority: 0.9,
        });
    }

    while entries.len() < total {
        let link = generate_link(model, rng);
        let priority = (rng.gen_range(0.5..0.9f64) * 10.0).round() / 10.0;
        entries.push(SitemapEntry {
            loc: format!("{}{}", base_url, link.url),
            lastmod: recent_date(rng, today),
            changefreq: CHANGE_FREQS.choose(rng).copied().unwrap_or("weekly"),
            priority,
        });
    }
    entries
}

pub fn render_sitemap(entries: &[SitemapEntry]) -> String {
    let mut out = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );
    for entry in entries {
        out.push_str(&format!(
            "  <url>\n    <loc>{}</loc>\n    <lastmod>{}</lastmod>\n    <changefreq>{}</changefreq>\n    <priority>{:.1}</priority>\n  </url>\n",
            escape_html(&entry.loc),
            entry.lastmod.format("%Y-%m-%d"),
            entry.changefreq,
            entry.priority
        ));
    }
    out.push_str("</urlset>\n");
    out
}

pub fn sitemap_xml<R: Rng + ?Sized>(
    model: &TextModel,
    rng: &mut R,
    base_url: &str,
    today: NaiveDate,
) -> String {
    render_sitemap(&sitemap_entries(model, rng, base_url, today))
}
