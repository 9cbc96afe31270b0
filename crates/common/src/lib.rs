pub mod config;
pub mod error;
pub mod html;

pub use config::{
    AdminConfig, AppConfig, LoggingConfig, ModelConfig, PageConfig, RedisEndpoint, ServerConfig,
    SessionConfig, StoreBackend, StreamConfig,
};
pub use error::{QuagmireError, QuagmireResult};
pub use html::escape_html;
