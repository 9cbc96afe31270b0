use std::fmt::Write;

use quagmire_common::escape_html;
use quagmire_text_model::TextModel;
use rand::Rng;

use crate::links::{author_slug, title_case, Link};
use crate::meta::PageMeta;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breadcrumb {
    pub text: String,
    pub url: String,
}

/// A sub-section: heading, paragraph and an optional list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub heading: String,
    pub content: String,
    pub items: Vec<String>,
}

const STYLE: &str = "body{font-family:Georgia,serif;margin:0;color:#222}\
.layout{display:flex;max-width:1100px;margin:0 auto}\
.content{flex:3;padding:1em 2em}.sidebar{flex:1;padding:1em}\
.main-nav ul{display:flex;gap:1em;list-style:none}\
.byline,.breadcrumb{color:#666;font-size:.9em}\
.site-footer{border-top:1px solid #ddd;padding:1em 2em}";

/// Breadcrumb trail from a URL path, always starting at Home.
pub fn breadcrumbs(path: &str) -> Vec<Breadcrumb> {
    let mut crumbs = vec![Breadcrumb {
        text: "Home".to_string(),
        url: "/".to_string(),
    }];

    let mut accumulated = String::new();
    for part in path.split('/').filter(|p| !p.is_empty()) {
        accumulated.push('/');
        accumulated.push_str(part);
        crumbs.push(Breadcrumb {
            text: title_case(&part.replace('-', " ")),
            url: accumulated.clone(),
        });
    }
    crumbs
}

pub fn render_breadcrumbs(crumbs: &[Breadcrumb]) -> String {
    let mut out = String::from(r#"<nav class="breadcrumb" aria-label="breadcrumb">"#);
    for (i, crumb) in crumbs.iter().enumerate() {
        if i > 0 {
            out.push_str(r#" <span class="sep">/</span> "#);
        }
        if i == crumbs.len() - 1 {
            let _ = write!(out, r#"<span class="current">{}</span>"#, escape_html(&crumb.text));
        } else {
            let _ = write!(
                out,
                r#"<a href="{}">{}</a>"#,
                escape_html(&crumb.url),
                escape_html(&crumb.text)
            );
        }
    }
    out.push_str("</nav>");
    out
}

fn render_link_items(out: &mut String, links: &[Link]) {
    for link in links {
        let _ = write!(
            out,
            r#"<li><a href="{}">{}</a></li>"#,
            escape_html(&link.url),
            escape_html(&link.text)
        );
    }
}

pub fn render_nav(links: &[Link]) -> String {
    let mut out = String::from(r#"<nav class="main-nav"><ul>"#);
    render_link_items(&mut out, links);
    out.push_str("</ul></nav>");
    out
}

pub fn render_byline(meta: &PageMeta) -> String {
    format!(
        r#"<div class="byline">By <a href="/author/{}">{}</a> | Published {}</div>"#,
        escape_html(&author_slug(&meta.author)),
        escape_html(&meta.author),
        meta.date_str()
    )
}

/// Sections with headings of at most six words and a 30% chance of a
/// three to six item list.
pub fn generate_sections<R: Rng + ?Sized>(model: &TextModel, rng: &mut R, count: usize) -> Vec<Section> {
    (0..count)
        .map(|_| {
            let heading = model
                .generate_prose_with(1, rng)
                .trim_end_matches('.')
                .split_whitespace()
                .take(6)
                .collect::<Vec<_>>()
                .join(" ");
            let content_sentences = rng.gen_range(3..=7);
            let content = model.generate_prose_with(content_sentences, rng);

            let items = if rng.gen_bool(0.3) {
                let len = rng.gen_range(3..=6);
                (0..len).map(|_| model.generate_prose_with(1, rng)).collect()
            } else {
                Vec::new()
            };

            Section {
                heading,
                content,
                items,
            }
        })
        .collect()
}

pub fn render_sections(sections: &[Section]) -> String {
    let mut out = String::new();
    for section in sections {
        let _ = write!(out, "<h2>{}</h2>", escape_html(&section.heading));
        let _ = write!(out, "<p>{}</p>", escape_html(&section.content));
        if !section.items.is_empty() {
            out.push_str(r#"<ul class="content-list">"#);
            for item in &section.items {
                let _ = write!(out, "<li>{}</li>", escape_html(item));
            }
            out.push_str("</ul>");
        }
    }
    out
}

pub fn render_article_links(links: &[Link]) -> String {
    let mut out = String::from(r#"<ul class="article-links">"#);
    render_link_items(&mut out, links);
    out.push_str("</ul>");
    out
}

pub fn render_pagination(links: &[Link]) -> String {
    let mut out = String::from(r#"<nav class="pagination">"#);
    for link in links {
        let _ = write!(
            out,
            r#"<a href="{}">{}</a>"#,
            escape_html(&link.url),
            escape_html(&link.text)
        );
    }
    out.push_str("</nav>");
    out
}

pub fn render_sidebar(links: &[Link]) -> String {
    let mut out = String::from(r#"<aside class="sidebar"><h3>Related Articles</h3><ul>"#);
    render_link_items(&mut out, links);
    out.push_str("</ul></aside>");
    out
}

pub fn render_footer(links: &[Link], copyright_holder: &str) -> String {
    let mut out =
        String::from(r#"<footer class="site-footer"><div class="footer-links"><h4>Popular Topics</h4><ul>"#);
    render_link_items(&mut out, links);
    out.push_str("</ul></div>");
    let _ = write!(
        out,
        r#"<p class="copyright">{}. All rights reserved.</p>"#,
        escape_html(copyright_holder)
    );
    out.push_str("</footer>");
    out
}

/// Everything up to and including the opening tag of the streamed paragraph.
pub fn render_opening(meta: &PageMeta, nav: &str, breadcrumbs: &str) -> String {
    let title = escape_html(&meta.title);
    format!(
        concat!(
            "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\">",
            "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">",
            "<title>{title}</title>{head}<style>{style}</style></head><body>",
            "{nav}<div class=\"layout\"><div class=\"content\">{breadcrumbs}",
            "<h1>{title}</h1>{byline}<div class=\"text\"><p>",
        ),
        title = title,
        head = meta.render_head(),
        style = STYLE,
        nav = nav,
        breadcrumbs = breadcrumbs,
        byline = render_byline(meta),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use quagmire_text_model::DEFAULT_CORPUS;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_breadcrumbs_from_path() {
        let crumbs = breadcrumbs("/research/deep-water-survey/");
        assert_eq!(crumbs.len(), 3);
        assert_eq!(crumbs[1].text, "Research");
        assert_eq!(crumbs[1].url, "/research");
        assert_eq!(crumbs[2].text, "Deep Water Survey");
        assert_eq!(crumbs[2].url, "/research/deep-water-survey");
    }

    #[test]
    fn test_root_has_only_home() {
        assert_eq!(breadcrumbs("/").len(), 1);
        assert_eq!(breadcrumbs("").len(), 1);
    }

    #[test]
    fn test_breadcrumb_markup_escapes_path() {
        let html = render_breadcrumbs(&breadcrumbs("/<x>/y"));
        assert!(html.contains(r#"<a href="/&lt;x&gt;">&lt;x&gt;</a>"#));
        assert!(html.ends_with(r#"<span class="current">Y</span></nav>"#));
    }

    #[test]
    fn test_sections() {
        let model = TextModel::build(DEFAULT_CORPUS, 2);
        let mut rng = StdRng::seed_from_u64(8);
        let sections = generate_sections(&model, &mut rng, 50);
        assert_eq!(sections.len(), 50);
        for section in &sections {
            assert!(section.heading.split_whitespace().count() <= 6);
            assert!(section.items.is_empty() || (3..=6).contains(&section.items.len()));
        }
        assert!(sections.iter().any(|s| !s.items.is_empty()));

        let html = render_sections(&sections);
        assert_eq!(html.matches("<h2>").count(), 50);
    }

    #[test]
    fn test_footer_copyright() {
        let html = render_footer(&[Link::new("/tag/x", "X & Y")], "Mary Smith");
        assert!(html.contains("X &amp; Y"));
        assert!(html.contains("Mary Smith. All rights reserved."));
    }
}
