use std::net::SocketAddr;

use http::{HeaderMap, Method, Uri, Version};
use quagmire_bot_detect::{BotTag, TagCounter};
use tracing::info;

/// Per-request details captured for logging and session tracking.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub request_id: String,
    /// Client address string. May be empty or malformed; the session
    /// tracker validates it.
    pub client_ip: String,
    pub method: String,
    pub path: String,
    pub protocol: String,
    pub host: String,
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
    pub accept_encoding: String,
    pub header_count: usize,
    pub tag: BotTag,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

/// Client address from `ip_header` (first entry of a comma list), else the
/// socket peer address without its port.
pub fn client_ip(headers: &HeaderMap, ip_header: &str, peer: Option<SocketAddr>) -> String {
    let from_header = header_str(headers, ip_header)
        .split(',')
        .next()
        .map(str::trim)
        .unwrap_or("");
    if !from_header.is_empty() {
        return from_header.to_string();
    }
    peer.map(|addr| addr.ip().to_string()).unwrap_or_default()
}

fn protocol_name(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_11 => "HTTP/1.1",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "unknown",
    }
}

impl RequestInfo {
    pub fn new(
        method: &Method,
        uri: &Uri,
        version: Version,
        headers: &HeaderMap,
        peer: Option<SocketAddr>,
        ip_header: &str,
        tags: &TagCounter,
    ) -> Self {
        let user_agent = header_str(headers, "user-agent").to_string();
        let tag = tags.observe(&user_agent);
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            client_ip: client_ip(headers, ip_header, peer),
            method: method.as_str().to_string(),
            path: uri.path().to_string(),
            protocol: protocol_name(version).to_string(),
            host: header_str(headers, "host").to_string(),
            user_agent,
            accept: header_str(headers, "accept").to_string(),
            accept_language: header_str(headers, "accept-language").to_string(),
            accept_encoding: header_str(headers, "accept-encoding").to_string(),
            header_count: headers.len(),
            tag,
        }
    }

    pub fn log(&self) {
        info!(
            request_id = %self.request_id,
            client_ip = %self.client_ip,
            method = %self.method,
            path = %self.path,
            protocol = %self.protocol,
            host = %self.host,
            user_agent = %self.user_agent,
            accept = %self.accept,
            accept_language = %self.accept_language,
            accept_encoding = %self.accept_encoding,
            header_count = self.header_count,
            tag = %self.tag,
            "request"
        );
    }
}
