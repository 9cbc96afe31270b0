use chrono::{Duration, NaiveDate};
use quagmire_common::escape_html;
use rand::Rng;

use crate::links::{author_name, is_stop_word, letters_only};

const DESCRIPTION_CHARS: usize = 160;
const MAX_KEYWORDS: usize = 8;

/// SEO metadata for a generated page. Fields are unescaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMeta {
    pub title: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub author: String,
    pub published: NaiveDate,
    pub path: String,
}

/// A date within the 60 days up to and including `today`.
pub fn recent_date<R: Rng + ?Sized>(rng: &mut R, today: NaiveDate) -> NaiveDate {
    today - Duration::days(rng.gen_range(0..60))
}

fn truncate_description(content: &str) -> String {
    if content.chars().count() <= DESCRIPTION_CHARS {
        return content.to_string();
    }
    let mut desc: String = content.chars().take(DESCRIPTION_CHARS - 3).collect();
    desc.push_str("...");
    desc
}

fn extract_keywords(content: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for word in content.split_whitespace() {
        let word = letters_only(word);
        if word.chars().count() < 4 || is_stop_word(&word) || keywords.contains(&word) {
            continue;
        }
        keywords.push(word);
        if keywords.len() >= MAX_KEYWORDS {
            break;
        }
    }
    keywords
}

impl PageMeta {
    pub fn generate<R: Rng + ?Sized>(
        title: &str,
        content: &str,
        path: &str,
        rng: &mut R,
        today: NaiveDate,
    ) -> Self {
        Self {
            title: title.to_string(),
            description: truncate_description(content),
            keywords: extract_keywords(content),
            author: author_name(rng),
            published: recent_date(rng, today),
            path: path.to_string(),
        }
    }

    pub fn date_str(&self) -> String {
        self.published.format("%Y-%m-%d").to_string()
    }

    /// `<meta>`, Open Graph and JSON-LD markup for the document head.
    pub fn render_head(&self) -> String {
        let title = escape_html(&self.title);
        let desc = escape_html(&self.description);
        let keywords = escape_html(&self.keywords.join(", "));
        let author = escape_html(&self.author);
        let path = escape_html(&self.path);

        let ld = serde_json::json!({
            "@context": "https://schema.org",
            "@type": "Article",
            "headline": self.title,
            "description": self.description,
            "datePublished": self.date_str(),
            "dateModified": self.date_str(),
            "author": { "@type": "Person", "name": self.author },
        });
        // A literal "</" would close the script element early.
        let ld = ld.to_string().replace("</", "<\\/");

        format!(
            concat!(
                r#"<meta name="description" content="{desc}">"#,
                r#"<meta name="keywords" content="{keywords}">"#,
                r#"<meta name="author" content="{author}">"#,
                r#"<meta property="og:title" content="{title}">"#,
                r#"<meta property="og:description" content="{desc}">"#,
                r#"<meta property="og:type" content="article">"#,
                r#"<meta property="og:url" content="{path}">"#,
                r#"<script type="application/ld+json">{ld}</script>"#,
            ),
            desc = desc,
            keywords = keywords,
            author = author,
            title = title,
            path = path,
            ld = ld,
        )
    }
}
