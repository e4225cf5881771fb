//! Recognized configuration constants (spec §6 table).
//!
//! These are the defaults every crate in the workspace is built against.
//! `Settings` (see `settings.rs`) lets a handful of them be overridden at
//! runtime; the rest are wire-format invariants and are not configurable.

use std::time::Duration;

/// Smallest capacity a [`PooledBuffer`] may have once it re-enters the pool.
pub const MIN_BUF: usize = 1024;
/// First allocation size for a fresh buffer.
pub const INITIAL_BUF: usize = 4 * 1024;
/// Largest capacity a pooled buffer may have, and the largest frame body
/// accepted on the wire.
pub const MAX_BUF: usize = 1024 * 1024;
/// Alias used at framing call sites, same value as [`MAX_BUF`].
pub const MAX_MESSAGE: usize = MAX_BUF;
/// Buffer growth doubles until the requirement is met, then clamps to MAX_BUF.
pub const BUFFER_GROWTH_FACTOR: usize = 2;
/// Soft cap on buffers held by one size class; advisory, may be briefly exceeded.
pub const MAX_POOL: usize = 10;

/// Upper bound used by callers that want a single "this connection is dead"
/// timeout distinct from the more specific timeouts below.
pub const NETWORK_TIMEOUT: Duration = Duration::from_secs(180);

/// Editor discovery adaptive polling.
pub const POLLING_INITIAL_INTERVAL: Duration = Duration::from_secs(1);
pub const POLLING_EXTENDED_INTERVAL: Duration = Duration::from_secs(10);
pub const POLLING_INITIAL_ATTEMPTS: u32 = 1;
/// Hard per-cycle deadline so a hung probe can't stall subsequent cycles.
pub const POLLING_CYCLE_DEADLINE: Duration = Duration::from_secs(5);

/// MCP keepalive ping cadence, response deadline, and failure budget.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);
pub const KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(5);
pub const KEEPALIVE_MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// How long `connected=false` may persist, with the editor apparently
/// reachable, before a forced reconnect is scheduled.
pub const STUCK_THRESHOLD: Duration = Duration::from_secs(60);
/// Bound on forced reconnects per stuck-detection episode.
pub const STUCK_MAX_FORCED_RECONNECTS: u32 = 3;

/// Default reconnecting-UI timeout; host-overridable, typically 15-60s.
pub const DEFAULT_RECONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Suppresses further `start()` calls for this long after a successful one.
pub const STARTUP_PROTECTION_WINDOW: Duration = Duration::from_millis(5_000);
/// Bound on waiting for a conflicting port to free up during recovery,
/// polled in fixed steps.
pub const START_PORT_WAIT_TIMEOUT: Duration = Duration::from_millis(5_000);
pub const START_PORT_WAIT_STEP: Duration = Duration::from_millis(250);
/// Retries for post-reload recovery, separate from the port-wait loop above.
pub const RELOAD_RECOVERY_MAX_ATTEMPTS: u32 = 3;

/// Default bound on waiting for per-connection tasks to end during
/// `before_reload`/`stop` teardown; host-overridable.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Idle timeout for a push-channel client connection.
pub const PUSH_CLIENT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Probe timeout used by editor-availability checks.
pub const DISCOVERY_PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// Lowest port number a user may configure; anything below is
/// system-reserved and rejected at validation time.
pub const MIN_CONFIGURABLE_PORT: u32 = 1024;
