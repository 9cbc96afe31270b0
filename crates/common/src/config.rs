use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level tarpit configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub page: PageConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: Vec<String>,
    /// Header carrying the real client address when running behind a CDN.
    #[serde(default = "default_client_ip_header")]
    pub client_ip_header: String,
    /// Upper bound on a single chunk send before the client is considered gone.
    #[serde(default = "default_write_timeout")]
    pub write_timeout_secs: u64,
    #[serde(default)]
    pub admin: AdminConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            client_ip_header: default_client_ip_header(),
            write_timeout_secs: default_write_timeout(),
            admin: AdminConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_admin_listen")]
    pub listen: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: default_admin_listen(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Training corpus. `None` selects the corpus embedded in the binary.
    #[serde(default)]
    pub corpus_path: Option<PathBuf>,
    #[serde(default = "default_order")]
    pub order: usize,
    #[serde(default = "default_max_sentence_tokens")]
    pub max_sentence_tokens: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            corpus_path: None,
            order: default_order(),
            max_sentence_tokens: default_max_sentence_tokens(),
        }
    }
}

/// Chunking and pacing of the streamed paragraph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_min_chunk_words")]
    pub min_chunk_words: usize,
    #[serde(default = "default_max_chunk_words")]
    pub max_chunk_words: usize,
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_congestion_probability")]
    pub congestion_probability: f64,
    #[serde(default = "default_congestion_min_ms")]
    pub congestion_min_ms: u64,
    #[serde(default = "default_congestion_max_ms")]
    pub congestion_max_ms: u64,
    /// When set, every inter-chunk delay is exactly this long.
    #[serde(default)]
    pub fixed_interval_ms: Option<u64>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            min_chunk_words: default_min_chunk_words(),
            max_chunk_words: default_max_chunk_words(),
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            congestion_probability: default_congestion_probability(),
            congestion_min_ms: default_congestion_min_ms(),
            congestion_max_ms: default_congestion_max_ms(),
            fixed_interval_ms: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageConfig {
    /// Sentences generated for the streamed paragraph.
    #[serde(default = "default_page_sentences")]
    pub sentences: usize,
    #[serde(default = "default_min_sections")]
    pub min_sections: usize,
    #[serde(default = "default_max_sections")]
    pub max_sections: usize,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            sentences: default_page_sentences(),
            min_sections: default_min_sections(),
            max_sections: default_max_sections(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Redis,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_store_backend")]
    pub backend: StoreBackend,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Idle time after which a trapped address counts as gone.
    #[serde(default = "default_active_ttl")]
    pub active_ttl_secs: u64,
    /// How long first/last-seen timestamps outlive the active marker.
    #[serde(default = "default_history_ttl")]
    pub history_ttl_secs: u64,
    #[serde(default = "default_scan_count")]
    pub scan_count: usize,
    #[serde(default = "default_connect_retries")]
    pub connect_retries: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            key_prefix: default_key_prefix(),
            active_ttl_secs: default_active_ttl(),
            history_ttl_secs: default_history_ttl(),
            scan_count: default_scan_count(),
            connect_retries: default_connect_retries(),
            retry_delay_secs: default_retry_delay(),
        }
    }
}

/// Address and credential of the Redis session store.
///
/// The password is kept apart from the address so that any character is
/// accepted in it.
#[derive(Clone, PartialEq, Eq)]
pub struct RedisEndpoint {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: i64,
}

impl std::fmt::Debug for RedisEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisEndpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("db", &self.db)
            .finish()
    }
}

impl std::fmt::Display for RedisEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}/{}", self.host, self.port, self.db)
    }
}

impl SessionConfig {
    /// Read the Redis endpoint from `REDIS_HOST`, `REDIS_PORT` and
    /// `REDIS_PASSWORD`. Empty variables count as unset.
    pub fn redis_endpoint_from_env(&self) -> anyhow::Result<RedisEndpoint> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        redis_endpoint(var("REDIS_HOST"), var("REDIS_PORT"), var("REDIS_PASSWORD"))
    }
}

fn redis_endpoint(
    host: Option<String>,
    port: Option<String>,
    password: Option<String>,
) -> anyhow::Result<RedisEndpoint> {
    let port = match port {
        Some(raw) => raw
            .trim()
            .parse::<u16>()
            .map_err(|_| anyhow::anyhow!("REDIS_PORT must be a port number, got {:?}", raw))?,
        None => 6379,
    };
    Ok(RedisEndpoint {
        host: host.unwrap_or_else(|| "127.0.0.1".to_string()),
        port,
        password,
        db: 0,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_true")]
    pub json: bool,
    /// Directory for daily-rotated JSON log files, written alongside stdout.
    #[serde(default)]
    pub file_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json: true,
            file_dir: None,
        }
    }
}

// Default value helpers
fn default_listen() -> Vec<String> {
    vec!["0.0.0.0:8080".to_string()]
}
fn default_client_ip_header() -> String {
    "cf-connecting-ip".to_string()
}
fn default_write_timeout() -> u64 {
    120
}
fn default_admin_listen() -> String {
    "127.0.0.1:9090".to_string()
}
fn default_true() -> bool {
    true
}
fn default_order() -> usize {
    2
}
fn default_max_sentence_tokens() -> usize {
    100
}
fn default_min_chunk_words() -> usize {
    1
}
fn default_max_chunk_words() -> usize {
    8
}
fn default_min_delay_ms() -> u64 {
    20
}
fn default_max_delay_ms() -> u64 {
    200
}
fn default_congestion_probability() -> f64 {
    0.15
}
fn default_congestion_min_ms() -> u64 {
    300
}
fn default_congestion_max_ms() -> u64 {
    500
}
fn default_page_sentences() -> usize {
    50
}
fn default_min_sections() -> usize {
    2
}
fn default_max_sections() -> usize {
    4
}
fn default_store_backend() -> StoreBackend {
    StoreBackend::Redis
}
fn default_key_prefix() -> String {
    "quagmire".to_string()
}
fn default_active_ttl() -> u64 {
    180
}
fn default_history_ttl() -> u64 {
    24 * 60 * 60
}
fn default_scan_count() -> usize {
    100
}
fn default_connect_retries() -> u32 {
    10
}
fn default_retry_delay() -> u64 {
    3
}

impl AppConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for consistency.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.listen.is_empty() {
            anyhow::bail!("server.listen must have at least one address");
        }

        let stream = &self.stream;
        if stream.min_chunk_words == 0 {
            anyhow::bail!("stream.min_chunk_words must be at least 1");
        }
        if stream.min_chunk_words > stream.max_chunk_words {
            anyhow::bail!(
                "stream.min_chunk_words ({}) exceeds stream.max_chunk_words ({})",
                stream.min_chunk_words,
                stream.max_chunk_words
            );
        }
        if stream.min_delay_ms > stream.max_delay_ms {
            anyhow::bail!(
                "stream.min_delay_ms ({}) exceeds stream.max_delay_ms ({})",
                stream.min_delay_ms,
                stream.max_delay_ms
            );
        }
        if stream.congestion_min_ms > stream.congestion_max_ms {
            anyhow::bail!(
                "stream.congestion_min_ms ({}) exceeds stream.congestion_max_ms ({})",
                stream.congestion_min_ms,
                stream.congestion_max_ms
            );
        }
        if !(0.0..=1.0).contains(&stream.congestion_probability) {
            anyhow::bail!(
                "stream.congestion_probability must be within [0, 1], got {}",
                stream.congestion_probability
            );
        }

        if self.page.min_sections > self.page.max_sections {
            anyhow::bail!(
                "page.min_sections ({}) exceeds page.max_sections ({})",
                self.page.min_sections,
                self.page.max_sections
            );
        }

        let session = &self.session;
        if session.active_ttl_secs == 0 {
            anyhow::bail!("session.active_ttl_secs must be positive");
        }
        if session.history_ttl_secs < session.active_ttl_secs {
            anyhow::bail!(
                "session.history_ttl_secs ({}) must not be shorter than session.active_ttl_secs ({})",
                session.history_ttl_secs,
                session.active_ttl_secs
            );
        }
        if session.scan_count == 0 {
            anyhow::bail!("session.scan_count must be positive");
        }
        if session.key_prefix.is_empty() || session.key_prefix.contains(char::is_whitespace) {
            anyhow::bail!("session.key_prefix must be a non-empty token without whitespace");
        }

        Ok(())
    }
}
