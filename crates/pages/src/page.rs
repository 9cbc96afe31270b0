use chrono::NaiveDate;
use quagmire_common::PageConfig;
use quagmire_text_model::TextModel;
use rand::Rng;

use crate::layout::{
    breadcrumbs, generate_sections, render_article_links, render_breadcrumbs, render_footer,
    render_nav, render_opening, render_pagination, render_sections, render_sidebar,
};
use crate::links::{author_name, generate_links, nav_links, pagination_links};
use crate::meta::PageMeta;

/// A tarpit page split around its streamed paragraph.
///
/// The caller writes `opening` in one flush, streams `words` slowly, then
/// writes each `closing` fragment with its own flush. Everything is
/// already escaped except `words`, which the streamer escapes per chunk.
#[derive(Debug, Clone)]
pub struct TarpitPage {
    pub title: String,
    pub opening: String,
    pub words: Vec<String>,
    pub closing: Vec<String>,
}

impl TarpitPage {
    pub fn generate<R: Rng + ?Sized>(
        model: &TextModel,
        rng: &mut R,
        path: &str,
        config: &PageConfig,
        today: NaiveDate,
    ) -> Self {
        let text = model.generate_prose_with(config.sentences, rng);
        let words: Vec<String> = text.split_whitespace().map(str::to_string).collect();

        let title_len = rng.gen_range(3..=6usize).min(words.len());
        let title = words[..title_len].join(" ");

        let meta = PageMeta::generate(&title, &text, path, rng, today);
        let opening = render_opening(
            &meta,
            &render_nav(&nav_links()),
            &render_breadcrumbs(&breadcrumbs(path)),
        );

        let (min_sections, max_sections) = (
            config.min_sections.min(config.max_sections),
            config.max_sections,
        );
        let section_count = rng.gen_range(min_sections..=max_sections);
        let sections = generate_sections(model, rng, section_count);

        let article_count = rng.gen_range(8..=12);
        let articles = generate_links(model, rng, article_count);

        let base_path = if path == "/" || path.is_empty() { "/articles" } else { path };
        let pagination = pagination_links(base_path, rng);

        let sidebar_count = rng.gen_range(5..=7);
        let sidebar = generate_links(model, rng, sidebar_count);
        let footer_count = rng.gen_range(8..=11);
        let footer = generate_links(model, rng, footer_count);

        let closing = vec![
            "</p></div>".to_string(),
            render_sections(&sections),
            render_article_links(&articles),
            format!("{}</div>", render_pagination(&pagination)),
            format!("{}</div>", render_sidebar(&sidebar)),
            format!("{}</body></html>", render_footer(&footer, &author_name(rng))),
        ];

        Self {
            title,
            opening,
            words,
            closing,
        }
    }

    /// The whole document as one string, with the paragraph escaped.
    pub fn render(&self) -> String {
        let paragraph = quagmire_common::escape_html(&self.words.join(" "));
        let mut out = self.opening.clone();
        out.push_str(&paragraph);
        for fragment in &self.closing {
            out.push_str(fragment);
        }
        out
    }
}
