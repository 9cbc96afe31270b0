use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use quagmire_common::{QuagmireError, QuagmireResult, SessionConfig};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::store::{SessionStore, WriteBatch};

/// Reject addresses that could smuggle extra tokens into a store key.
pub fn validate_ip(ip: &str) -> QuagmireResult<()> {
    if ip.is_empty() || ip.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(QuagmireError::InvalidIp(ip.to_string()));
    }
    Ok(())
}

/// A finished session reconstructed from its surviving timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EndedSession {
    pub first_seen: i64,
    pub last_seen: i64,
    pub dwell_secs: i64,
}

/// What [`SessionTracker::record_visit`] did for an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitOutcome {
    /// The address was already active; its timestamps were refreshed.
    Refreshed,
    /// A new session was started, after the previous one (if any) ended.
    Started { previous: Option<EndedSession> },
}

/// Current store view of one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub ip: String,
    pub active: bool,
    pub first_seen: Option<i64>,
    pub last_seen: Option<i64>,
    pub dwell_secs: Option<i64>,
}

struct KeyLayout {
    prefix: String,
}

impl KeyLayout {
    fn active(&self, ip: &str) -> String {
        format!("{}:active:{}", self.prefix, ip)
    }

    fn first_seen(&self, ip: &str) -> String {
        format!("{}:first-seen:{}", self.prefix, ip)
    }

    fn last_seen(&self, ip: &str) -> String {
        format!("{}:last-seen:{}", self.prefix, ip)
    }

    fn roster(&self, ip: &str) -> String {
        format!("{}:roster:{}", self.prefix, ip)
    }

    fn roster_prefix(&self) -> String {
        format!("{}:roster:", self.prefix)
    }
}

fn parse_timestamp(raw: Option<String>) -> Option<i64> {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
}

fn ended_session(first_seen: Option<i64>, last_seen: Option<i64>) -> Option<EndedSession> {
    match (first_seen, last_seen) {
        (Some(first_seen), Some(last_seen)) if last_seen >= first_seen => Some(EndedSession {
            first_seen,
            last_seen,
            dwell_secs: last_seen - first_seen,
        }),
        _ => None,
    }
}

/// Records visits per source address and reports finished sessions.
///
/// The tracker is cheap to share behind an `Arc`; all state lives in the
/// store. Concurrent visits from the same address may interleave, which
/// can at worst start one extra session or lose one `last_seen` update.
pub struct SessionTracker {
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    keys: KeyLayout,
    active_ttl: Duration,
    history_ttl: Duration,
    scan_count: usize,
}

impl SessionTracker {
    pub fn new(store: Arc<dyn SessionStore>, config: &SessionConfig) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            keys: KeyLayout {
                prefix: config.key_prefix.clone(),
            },
            active_ttl: Duration::from_secs(config.active_ttl_secs),
            history_ttl: Duration::from_secs(config.history_ttl_secs),
            scan_count: config.scan_count,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    pub async fn ping(&self) -> QuagmireResult<()> {
        self.store.ping().await
    }

    /// Record a request from `ip`.
    ///
    /// While the active marker exists the visit refreshes it, along with the
    /// history TTL of `first_seen` so a session longer than the history
    /// window keeps its start. Otherwise
    /// the previous session, if its timestamps survived, is reported as
    /// ended and a new one is started with a single atomic batch of four
    /// writes. Failures are logged here and returned; callers are expected
    /// to ignore them.
    pub async fn record_visit(&self, ip: &str) -> QuagmireResult<VisitOutcome> {
        if let Err(e) = validate_ip(ip) {
            warn!(client_ip = ?ip, "rejecting malformed client ip");
            return Err(e);
        }

        let active_key = self.keys.active(ip);
        let first_seen_key = self.keys.first_seen(ip);
        let last_seen_key = self.keys.last_seen(ip);
        let roster_key = self.keys.roster(ip);
        let now = self.clock.now().to_string();

        let active = self.store.exists(&active_key).await.map_err(|e| {
            error!(client_ip = %ip, error = %e, "failed to check active session");
            e
        })?;

        if active {
            let batch = WriteBatch::new()
                .set_ex(active_key, "1", self.active_ttl)
                .set_ex(last_seen_key, now, self.history_ttl)
                .expire(first_seen_key, self.history_ttl)
                .set_ex(roster_key, "1", self.active_ttl);
            self.store.write_batch(&batch).await.map_err(|e| {
                error!(client_ip = %ip, error = %e, "failed to refresh session");
                e
            })?;
            debug!(client_ip = %ip, "session refreshed");
            return Ok(VisitOutcome::Refreshed);
        }

        let first_seen = match self.store.get(&first_seen_key).await {
            Ok(v) => parse_timestamp(v),
            Err(e) => {
                error!(client_ip = %ip, error = %e, "failed to read first_seen");
                None
            }
        };
        let last_seen = match self.store.get(&last_seen_key).await {
            Ok(v) => parse_timestamp(v),
            Err(e) => {
                error!(client_ip = %ip, error = %e, "failed to read last_seen");
                None
            }
        };

        let previous = ended_session(first_seen, last_seen);
        if let Some(ended) = previous {
            info!(
                client_ip = %ip,
                dwell_secs = ended.dwell_secs,
                first_seen = ended.first_seen,
                last_seen = ended.last_seen,
                "session ended"
            );
        }

        let batch = WriteBatch::new()
            .set_ex(first_seen_key, now.clone(), self.history_ttl)
            .set_ex(last_seen_key, now, self.history_ttl)
            .set_ex(active_key, "1", self.active_ttl)
            .set_ex(roster_key, "1", self.active_ttl);
        self.store.write_batch(&batch).await.map_err(|e| {
            error!(client_ip = %ip, error = %e, "failed to start new session");
            e
        })?;

        debug!(client_ip = %ip, "session started");
        Ok(VisitOutcome::Started { previous })
    }

    /// Every address whose roster marker is still alive.
    ///
    /// Built from a paged scan, so the result is a best-effort snapshot:
    /// addresses added or expiring during the scan may or may not appear.
    pub async fn list_active_ips(&self) -> QuagmireResult<Vec<String>> {
        let prefix = self.keys.roster_prefix();
        let pattern = format!("{}*", prefix);

        let mut seen = HashSet::new();
        let mut ips = Vec::new();
        let mut cursor = 0u64;
        loop {
            let (next, keys) = self
                .store
                .scan(cursor, &pattern, self.scan_count)
                .await
                .map_err(|e| {
                    error!(error = %e, "failed to scan roster keys");
                    e
                })?;

            for key in keys {
                if let Some(ip) = key.strip_prefix(&prefix) {
                    if !ip.is_empty() && seen.insert(ip.to_string()) {
                        ips.push(ip.to_string());
                    }
                }
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        Ok(ips)
    }

    /// Read a single raw value from the store.
    pub async fn get_key(&self, key: &str) -> QuagmireResult<Option<String>> {
        if key.is_empty() {
            return Err(QuagmireError::InvalidKey(key.to_string()));
        }
        self.store.get(key).await.map_err(|e| {
            error!(key = %key, error = %e, "failed to read key");
            e
        })
    }

    /// Assemble what the store currently knows about `ip`.
    pub async fn session_info(&self, ip: &str) -> QuagmireResult<SessionInfo> {
        validate_ip(ip)?;

        let active = self.get_key(&self.keys.active(ip)).await?.is_some();
        let first_seen = parse_timestamp(self.get_key(&self.keys.first_seen(ip)).await?);
        let last_seen = parse_timestamp(self.get_key(&self.keys.last_seen(ip)).await?);
        let dwell_secs = ended_session(first_seen, last_seen).map(|s| s.dwell_secs);

        Ok(SessionInfo {
            ip: ip.to_string(),
            active,
            first_seen,
            last_seen,
            dwell_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::memory_store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config() -> SessionConfig {
        SessionConfig {
            key_prefix: "trap".to_string(),
            active_ttl_secs: 180,
            history_ttl_secs: 86_400,
            ..SessionConfig::default()
        }
    }

    fn tracker_at(start: i64) -> (Arc<ManualClock>, Arc<MemoryStore>, SessionTracker) {
        let clock = Arc::new(ManualClock::new(start));
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        let tracker = SessionTracker::new(store.clone(), &config()).with_clock(clock.clone());
        (clock, store, tracker)
    }

    /// Counts every call and fails them all when `fail` is set.
    struct CountingStore {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingStore {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail,
            }
        }

        fn hit(&self) -> QuagmireResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(QuagmireError::StoreUnavailable("connection refused".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl SessionStore for CountingStore {
        async fn ping(&self) -> QuagmireResult<()> {
            self.hit()
        }
        async fn get(&self, _key: &str) -> QuagmireResult<Option<String>> {
            self.hit().map(|_| None)
        }
        async fn exists(&self, _key: &str) -> QuagmireResult<bool> {
            self.hit().map(|_| false)
        }
        async fn set_ex(&self, _key: &str, _value: &str, _ttl: Duration) -> QuagmireResult<()> {
            self.hit()
        }
        async fn write_batch(&self, _batch: &WriteBatch) -> QuagmireResult<()> {
            self.hit()
        }
        async fn scan(&self, _cursor: u64, _pattern: &str, _count: usize) -> QuagmireResult<(u64, Vec<String>)> {
            self.hit().map(|_| (0, Vec::new()))
        }
        fn backend_name(&self) -> &'static str {
            "counting"
        }
    }

    #[test]
    fn test_validate_ip() {
        assert!(validate_ip("1.2.3.4").is_ok());
        assert!(validate_ip("2001:db8::1").is_ok());
        assert!(validate_ip("").is_err());
        assert!(validate_ip("1.2.3.4 extra").is_err());
        assert!(validate_ip("1.2.3.4\r\nSET x").is_err());
        assert!(validate_ip("1.2.3.4\t").is_err());
        assert!(validate_ip("1.2\u{0}.3.4").is_err());
    }

    #[test]
    fn test_ended_session_requires_ordered_timestamps() {
        assert_eq!(
            ended_session(Some(10), Some(70)),
            Some(EndedSession {
                first_seen: 10,
                last_seen: 70,
                dwell_secs: 60
            })
        );
        assert_eq!(ended_session(Some(70), Some(10)), None);
        assert_eq!(ended_session(None, Some(10)), None);
        assert_eq!(ended_session(Some(10), None), None);
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp(Some("42".to_string())), Some(42));
        assert_eq!(parse_timestamp(Some("garbage".to_string())), None);
        assert_eq!(parse_timestamp(None), None);
    }

    #[tokio::test]
    async fn test_first_visit_starts_session() {
        let (_, store, tracker) = tracker_at(0);
        let outcome = tracker.record_visit("1.2.3.4").await.unwrap();
        assert_eq!(outcome, VisitOutcome::Started { previous: None });

        assert_eq!(store.get("trap:first-seen:1.2.3.4").await.unwrap(), Some("0".into()));
        assert_eq!(store.get("trap:last-seen:1.2.3.4").await.unwrap(), Some("0".into()));
        assert!(store.exists("trap:active:1.2.3.4").await.unwrap());
        assert!(store.exists("trap:roster:1.2.3.4").await.unwrap());
    }

    #[tokio::test]
    async fn test_visit_within_window_refreshes() {
        let (clock, store, tracker) = tracker_at(0);
        tracker.record_visit("1.2.3.4").await.unwrap();

        clock.set(60);
        let outcome = tracker.record_visit("1.2.3.4").await.unwrap();
        assert_eq!(outcome, VisitOutcome::Refreshed);
        assert_eq!(store.get("trap:first-seen:1.2.3.4").await.unwrap(), Some("0".into()));
        assert_eq!(store.get("trap:last-seen:1.2.3.4").await.unwrap(), Some("60".into()));
    }

    #[tokio::test]
    async fn test_visit_after_lapse_reports_dwell_and_restarts() {
        let (clock, store, tracker) = tracker_at(0);
        tracker.record_visit("1.2.3.4").await.unwrap();
        clock.set(60);
        tracker.record_visit("1.2.3.4").await.unwrap();

        clock.set(300);
        let outcome = tracker.record_visit("1.2.3.4").await.unwrap();
        assert_eq!(
            outcome,
            VisitOutcome::Started {
                previous: Some(EndedSession {
                    first_seen: 0,
                    last_seen: 60,
                    dwell_secs: 60
                })
            }
        );
        assert_eq!(store.get("trap:first-seen:1.2.3.4").await.unwrap(), Some("300".into()));
        assert_eq!(store.get("trap:last-seen:1.2.3.4").await.unwrap(), Some("300".into()));
    }

    #[tokio::test]
    async fn test_history_expiry_forgets_previous_session() {
        let (clock, _, tracker) = tracker_at(0);
        tracker.record_visit("1.2.3.4").await.unwrap();
        clock.set(86_400 + 10);
        let outcome = tracker.record_visit("1.2.3.4").await.unwrap();
        assert_eq!(outcome, VisitOutcome::Started { previous: None });
    }

    #[tokio::test]
    async fn test_session_longer_than_history_window_keeps_start() {
        let (clock, _, tracker) = tracker_at(0);
        let mut now = 0;
        while now <= 25 * 3600 {
            clock.set(now);
            tracker.record_visit("1.2.3.4").await.unwrap();
            now += 60;
        }
        let last = now - 60;

        clock.set(last + 600);
        let outcome = tracker.record_visit("1.2.3.4").await.unwrap();
        assert_eq!(
            outcome,
            VisitOutcome::Started {
                previous: Some(EndedSession {
                    first_seen: 0,
                    last_seen: last,
                    dwell_secs: last
                })
            }
        );
    }

    #[tokio::test]
    async fn test_invalid_ip_touches_nothing() {
        let store = Arc::new(CountingStore::new(false));
        let tracker = SessionTracker::new(store.clone(), &config());

        for ip in ["", "1.2.3.4 5.6.7.8", "1.2.3.4\n"] {
            let err = tracker.record_visit(ip).await.unwrap_err();
            assert!(matches!(err, QuagmireError::InvalidIp(_)));
        }
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_store_failure_is_reported() {
        let tracker = SessionTracker::new(Arc::new(CountingStore::new(true)), &config());
        let err = tracker.record_visit("1.2.3.4").await.unwrap_err();
        assert!(matches!(err, QuagmireError::StoreUnavailable(_)));
        assert!(tracker.list_active_ips().await.is_err());
        assert!(tracker.get_key("anything").await.is_err());
    }

    #[tokio::test]
    async fn test_list_active_ips() {
        let (clock, _, tracker) = tracker_at(0);
        for i in 0..250 {
            tracker.record_visit(&format!("10.0.{}.{}", i / 100, i % 100)).await.unwrap();
        }
        let ips = tracker.list_active_ips().await.unwrap();
        assert_eq!(ips.len(), 250);
        assert!(ips.contains(&"10.0.2.49".to_string()));

        clock.set(181);
        tracker.record_visit("192.0.2.1").await.unwrap();
        assert_eq!(tracker.list_active_ips().await.unwrap(), vec!["192.0.2.1".to_string()]);
    }

    #[tokio::test]
    async fn test_get_key() {
        let (_, _, tracker) = tracker_at(5);
        tracker.record_visit("1.2.3.4").await.unwrap();
        assert_eq!(
            tracker.get_key("trap:first-seen:1.2.3.4").await.unwrap(),
            Some("5".to_string())
        );
        assert_eq!(tracker.get_key("trap:first-seen:9.9.9.9").await.unwrap(), None);
        assert!(matches!(
            tracker.get_key("").await,
            Err(QuagmireError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn test_session_info() {
        let (clock, _, tracker) = tracker_at(100);
        tracker.record_visit("1.2.3.4").await.unwrap();
        clock.set(130);
        tracker.record_visit("1.2.3.4").await.unwrap();

        let info = tracker.session_info("1.2.3.4").await.unwrap();
        assert!(info.active);
        assert_eq!(info.first_seen, Some(100));
        assert_eq!(info.last_seen, Some(130));
        assert_eq!(info.dwell_secs, Some(30));

        let unknown = tracker.session_info("8.8.8.8").await.unwrap();
        assert!(!unknown.active);
        assert_eq!(unknown.dwell_secs, None);
    }
}
