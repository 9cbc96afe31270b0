use serde::Serialize;

/// Coarse User-Agent category, used only to tag request logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BotTag {
    /// LLM training or retrieval crawler.
    AiCrawler,
    /// Search engine or link-preview bot.
    SearchEngine,
    /// Scripting library or command-line client.
    Tool,
    /// Empty UA, or bot-like keywords without a browser signature.
    Suspicious,
    Browser,
}

impl BotTag {
    pub const ALL: [BotTag; 5] = [
        BotTag::AiCrawler,
        BotTag::SearchEngine,
        BotTag::Tool,
        BotTag::Suspicious,
        BotTag::Browser,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BotTag::AiCrawler => "ai-crawler",
            BotTag::SearchEngine => "search-engine",
            BotTag::Tool => "tool",
            BotTag::Suspicious => "suspicious",
            BotTag::Browser => "browser",
        }
    }
}

impl std::fmt::Display for BotTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const AI_CRAWLERS: &[&str] = &[
    "gptbot",
    "chatgpt-user",
    "oai-searchbot",
    "claudebot",
    "claude-web",
    "anthropic-ai",
    "ccbot",
    "google-extended",
    "perplexitybot",
    "bytespider",
    "amazonbot",
    "cohere-ai",
    "diffbot",
    "meta-externalagent",
    "imagesiftbot",
    "omgili",
    "youbot",
];

const SEARCH_ENGINES: &[&str] = &[
    "googlebot",
    "bingbot",
    "yandexbot",
    "duckduckbot",
    "baiduspider",
    "slurp", // Yahoo
    "applebot",
    "facebookexternalhit",
    "twitterbot",
    "linkedinbot",
];

const TOOLS: &[&str] = &[
    "curl",
    "wget",
    "python-requests",
    "python-urllib",
    "aiohttp",
    "httpx",
    "scrapy",
    "httpclient",
    "go-http-client",
    "java/",
    "okhttp",
    "libwww-perl",
    "node-fetch",
    "axios",
    "mechanize",
    "phantom",
    "headlesschrome",
    "selenium",
];

const SUSPICIOUS_PATTERNS: &[&str] = &["bot", "crawler", "spider", "scraper", "fetch", "scan"];

/// Classify a User-Agent string.
pub fn classify_user_agent(ua: &str) -> BotTag {
    let ua = ua.trim();
    if ua.is_empty() {
        return BotTag::Suspicious;
    }
    let ua_lower = ua.to_lowercase();

    if AI_CRAWLERS.iter().any(|p| ua_lower.contains(p)) {
        return BotTag::AiCrawler;
    }
    if SEARCH_ENGINES.iter().any(|p| ua_lower.contains(p)) {
        return BotTag::SearchEngine;
    }
    if TOOLS.iter().any(|p| ua_lower.contains(p)) {
        return BotTag::Tool;
    }

    let looks_like_browser = ua_lower.contains("mozilla")
        && (ua_lower.contains("chrome")
            || ua_lower.contains("firefox")
            || ua_lower.contains("safari")
            || ua_lower.contains("edge"));

    if !looks_like_browser && SUSPICIOUS_PATTERNS.iter().any(|p| ua_lower.contains(p)) {
        return BotTag::Suspicious;
    }

    BotTag::Browser
}
