//! Per-address dwell tracking on top of a TTL key-value store.
//!
//! The tracker never keeps session history in process memory. Everything it
//! knows about an address lives in four store keys:
//!
//! - `{prefix}:active:{ip}` -- present while the address keeps requesting
//!   within the active window (short TTL);
//! - `{prefix}:first-seen:{ip}` / `{prefix}:last-seen:{ip}` -- unix
//!   timestamps of the current or most recent session (long TTL);
//! - `{prefix}:roster:{ip}` -- marks the address as currently trapped
//!   (short TTL), enumerated by [`SessionTracker::list_active_ips`].
//!
//! Key expiry is the only deletion mechanism. When a request arrives and
//! the active marker has lapsed, the surviving timestamps describe the
//! session that just ended; its dwell time is reported before a new
//! session is started.

pub mod clock;
pub mod memory_store;
pub mod redis_store;
pub mod store;
pub mod tracker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use memory_store::MemoryStore;
pub use redis_store::RedisStore;
pub use store::{KeyWrite, SessionStore, WriteBatch};
pub use tracker::{validate_ip, EndedSession, SessionInfo, SessionTracker, VisitOutcome};
