use quagmire_text_model::TextModel;
use rand::seq::SliceRandom;
use rand::Rng;

/// A hyperlink on a generated page. `text` is unescaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub url: String,
    pub text: String,
}

impl Link {
    pub fn new(url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            text: text.into(),
        }
    }
}

pub const CATEGORIES: [&str; 8] = [
    "articles", "blog", "news", "analysis", "research", "reports", "archive", "documents",
];

const MONTHS: [&str; 12] = [
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december",
];

const FIRST_NAMES: [&str; 20] = [
    "james", "mary", "robert", "patricia", "john", "jennifer", "michael", "linda", "david",
    "elizabeth", "william", "barbara", "richard", "susan", "joseph", "thomas", "margaret",
    "charles", "dorothy", "daniel",
];

const LAST_NAMES: [&str; 20] = [
    "smith", "johnson", "williams", "brown", "jones", "garcia", "miller", "davis", "rodriguez",
    "martinez", "wilson", "anderson", "taylor", "thomas", "moore", "jackson", "martin", "lee",
    "thompson", "white",
];

const STOP_WORDS: [&str; 30] = [
    "the", "a", "an", "and", "or", "of", "in", "to", "for", "is", "it", "by", "on", "at", "as",
    "its", "was", "are", "be", "has", "had", "have", "with", "from", "this", "that", "which",
    "but", "not", "all",
];

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// Lowercase letters only.
pub(crate) fn letters_only(word: &str) -> String {
    word.chars()
        .filter(|c| c.is_alphabetic())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Capitalise the first letter of each whitespace-separated word.
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Build a slug from up to `max_words` words of `text`, skipping stop words.
///
/// Falls back to `"page"` when nothing usable remains.
pub fn slugify(text: &str, max_words: usize) -> String {
    let kept: Vec<String> = text
        .split_whitespace()
        .map(letters_only)
        .filter(|w| !w.is_empty() && !is_stop_word(w))
        .take(max_words)
        .collect();

    if kept.is_empty() {
        "page".to_string()
    } else {
        kept.join("-")
    }
}

pub fn generate_slug<R: Rng + ?Sized>(model: &TextModel, rng: &mut R, max_words: usize) -> String {
    slugify(&model.generate_sentence_with(rng), max_words)
}

pub fn author_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    let first = FIRST_NAMES.choose(rng).copied().unwrap_or("jane");
    let last = LAST_NAMES.choose(rng).copied().unwrap_or("doe");
    title_case(&format!("{} {}", first, last))
}

/// `"Mary Smith"` -> `"mary-smith"`.
pub fn author_slug(name: &str) -> String {
    name.to_lowercase().split_whitespace().collect::<Vec<_>>().join("-")
}

pub fn random_category<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    CATEGORIES.choose(rng).copied().unwrap_or(CATEGORIES[0])
}

fn random_month<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    MONTHS.choose(rng).copied().unwrap_or(MONTHS[0])
}

/// One link following one of six site-like URL patterns.
pub fn generate_link<R: Rng + ?Sized>(model: &TextModel, rng: &mut R) -> Link {
    let slug_words = rng.gen_range(3..=4);
    let slug = generate_slug(model, rng, slug_words);
    let text = model.generate_prose_with(1, rng);
    let year = rng.gen_range(2023..=2025);

    let url = match rng.gen_range(0..6) {
        0 => format!("/{}/{}", random_category(rng), slug),
        1 => format!("/articles/{}/{:02}/{}", year, rng.gen_range(1..=12), slug),
        2 => format!("/blog/post/{}", slug),
        3 => format!("/tag/{}", generate_slug(model, rng, 1)),
        4 => format!("/author/{}", author_slug(&author_name(rng))),
        _ => format!("/archive/{}/{}", year, random_month(rng)),
    };
    Link::new(url, text)
}

pub fn generate_links<R: Rng + ?Sized>(model: &TextModel, rng: &mut R, count: usize) -> Vec<Link> {
    (0..count).map(|_| generate_link(model, rng)).collect()
}

/// Fixed category menu.
pub fn nav_links() -> Vec<Link> {
    CATEGORIES
        .iter()
        .map(|cat| Link::new(format!("/{}", cat), title_case(cat)))
        .collect()
}

/// Previous/next plus a window of page numbers around a random current page.
pub fn pagination_links<R: Rng + ?Sized>(base_path: &str, rng: &mut R) -> Vec<Link> {
    let total = rng.gen_range(5..25);
    let current = rng.gen_range(1..=total);
    let url = |page: usize| format!("{}?page={}", base_path, page);

    let mut links = Vec::new();
    if current > 1 {
        links.push(Link::new(url(current - 1), "Previous"));
    }
    let start = current.saturating_sub(2).max(1);
    let end = (current + 2).min(total);
    for page in start..=end {
        links.push(Link::new(url(page), page.to_string()));
    }
    if current < total {
        links.push(Link::new(url(current + 1), "Next"));
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use quagmire_text_model::DEFAULT_CORPUS;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_slugify_drops_stop_words_and_symbols() {
        assert_eq!(slugify("The map of the River's edge, drawn", 3), "map-rivers-edge");
        assert_eq!(slugify("the and of", 3), "page");
        assert_eq!(slugify("", 2), "page");
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("internal documents"), "Internal Documents");
        assert_eq!(title_case("  spaced   out "), "Spaced Out");
    }

    #[test]
    fn test_author_slug() {
        assert_eq!(author_slug("Mary Smith"), "mary-smith");
    }

    #[test]
    fn test_nav_covers_categories() {
        let nav = nav_links();
        assert_eq!(nav.len(), CATEGORIES.len());
        assert_eq!(nav[0], Link::new("/articles", "Articles"));
    }

    #[test]
    fn test_generated_links_follow_known_patterns() {
        let model = TextModel::build(DEFAULT_CORPUS, 2);
        let mut rng = StdRng::seed_from_u64(21);
        let prefixes = ["/articles/", "/blog/post/", "/tag/", "/author/", "/archive/"];

        for link in generate_links(&model, &mut rng, 200) {
            let known = prefixes.iter().any(|p| link.url.starts_with(p))
                || CATEGORIES.iter().any(|c| link.url.starts_with(&format!("/{}/", c)));
            assert!(known, "unexpected url {}", link.url);
            assert!(!link.url.contains(' '));
        }
    }

    #[test]
    fn test_pagination_window() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..100 {
            let links = pagination_links("/news", &mut rng);
            let numbered: Vec<&Link> = links
                .iter()
                .filter(|l| l.text.parse::<usize>().is_ok())
                .collect();
            assert!(!numbered.is_empty() && numbered.len() <= 5);
            assert!(links.iter().all(|l| l.url.starts_with("/news?page=")));
        }
    }
}
