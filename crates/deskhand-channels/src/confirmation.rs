//! Confirmation codes for destructive actions.
//!
//! Reboot and suspend only run after the user echoes back a short numeric code:
//! - One pending code per principal; issuing again replaces the previous one
//! - Codes are single use and valid for a fixed TTL (five minutes by default)
//! - Wrong guesses leave the code in place until it expires
//!
//! Expiry is enforced twice: a timer keyed to the issuance removes the entry
//! proactively, and every lookup compares `issued_at` against the injected
//! [`Clock`]. A late or missing timer therefore never extends a code's life.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use deskhand_types::{Clock, GuardedAction, PendingConfirmation, SystemClock, Validation};
use rand::Rng;
use tokio::task::AbortHandle;
use tracing::{debug, info};
use uuid::Uuid;

/// How long an issued code stays valid.
pub const DEFAULT_CODE_TTL: Duration = Duration::from_secs(5 * 60);

const CODE_MIN: u16 = 1000;
const CODE_MAX: u16 = 9999;

/// Stored state for one principal.
struct Entry {
    /// Identity of this particular issuance; expiry timers only remove their own.
    issuance: Uuid,
    confirmation: PendingConfirmation,
    expiry_timer: Option<AbortHandle>,
}

impl Entry {
    fn cancel_timer(&self) {
        if let Some(timer) = &self.expiry_timer {
            timer.abort();
        }
    }
}

type EntryMap = HashMap<String, Entry>;

/// Issues, validates and expires single-use confirmation codes.
///
/// The principal → entry map is owned exclusively by the gate and every
/// operation runs inside one critical section, so an `issue` followed by a
/// `validate` for the same principal always observes the freshly issued code.
pub struct ConfirmationGate {
    entries: Arc<Mutex<EntryMap>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl ConfirmationGate {
    /// Create a gate with the given code lifetime and time source.
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            clock,
            ttl,
        }
    }

    /// Create a gate with the given lifetime backed by the system clock.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self::new(ttl, Arc::new(SystemClock))
    }

    /// Lifetime of an issued code.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a fresh code for `principal`, replacing any pending one.
    ///
    /// When called inside a tokio runtime, an expiry task is scheduled for
    /// exactly the TTL. Outside a runtime the timestamp check alone applies.
    pub fn issue(&self, principal: &str, channel: &str, action: GuardedAction) -> String {
        let code = generate_code();
        let issuance = Uuid::new_v4();
        let confirmation = PendingConfirmation {
            principal: principal.to_string(),
            code: code.clone(),
            channel: channel.to_string(),
            action,
            issued_at: self.clock.now(),
        };
        let expiry_timer = self.schedule_expiry(principal.to_string(), issuance);

        let replaced = lock(&self.entries).insert(
            principal.to_string(),
            Entry {
                issuance,
                confirmation,
                expiry_timer,
            },
        );

        if let Some(previous) = replaced {
            previous.cancel_timer();
            debug!(
                principal,
                previous_action = %previous.confirmation.action,
                "pending confirmation replaced"
            );
        }
        info!(principal, action = %action, %issuance, "confirmation code issued");
        code
    }

    /// Check `input_code` against the pending entry for `principal`.
    ///
    /// Only an exact match on a live entry succeeds, and consumes the entry.
    /// A mismatch leaves the entry untouched. An expired entry is removed.
    pub fn validate(&self, principal: &str, input_code: &str) -> Validation {
        let now = self.clock.now();
        let mut entries = lock(&self.entries);

        let Some(entry) = entries.get(principal) else {
            debug!(principal, "no pending confirmation");
            return Validation::rejected();
        };

        if is_expired(entry.confirmation.issued_at, now, self.ttl) {
            if let Some(stale) = entries.remove(principal) {
                stale.cancel_timer();
            }
            info!(principal, "confirmation code expired before use");
            return Validation::rejected();
        }

        if entry.confirmation.code != input_code {
            info!(principal, action = %entry.confirmation.action, "confirmation code mismatch");
            return Validation::rejected();
        }

        match entries.remove(principal) {
            Some(consumed) => {
                consumed.cancel_timer();
                info!(principal, action = %consumed.confirmation.action, "confirmation code accepted");
                Validation::accepted(consumed.confirmation)
            }
            None => Validation::rejected(),
        }
    }

    /// Whether `principal` has a live (issued, unconsumed, unexpired) code.
    pub fn has_pending(&self, principal: &str) -> bool {
        let now = self.clock.now();
        lock(&self.entries)
            .get(principal)
            .is_some_and(|entry| !is_expired(entry.confirmation.issued_at, now, self.ttl))
    }

    /// Remove every entry past its TTL. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = lock(&self.entries);
        let before = entries.len();
        entries.retain(|_, entry| {
            let live = !is_expired(entry.confirmation.issued_at, now, self.ttl);
            if !live {
                entry.cancel_timer();
            }
            live
        });
        let purged = before - entries.len();
        if purged > 0 {
            debug!(purged, "expired confirmations purged");
        }
        purged
    }

    /// Number of live pending codes.
    pub fn pending_count(&self) -> usize {
        let now = self.clock.now();
        lock(&self.entries)
            .values()
            .filter(|entry| !is_expired(entry.confirmation.issued_at, now, self.ttl))
            .count()
    }

    fn schedule_expiry(&self, principal: String, issuance: Uuid) -> Option<AbortHandle> {
        let runtime = tokio::runtime::Handle::try_current().ok()?;
        let entries = Arc::downgrade(&self.entries);
        let ttl = self.ttl;
        let task = runtime.spawn(async move {
            tokio::time::sleep(ttl).await;
            if remove_if_current(&entries, &principal, issuance) {
                info!(principal = %principal, %issuance, "confirmation code expired");
            }
        });
        Some(task.abort_handle())
    }
}

impl Default for ConfirmationGate {
    fn default() -> Self {
        Self::with_ttl(DEFAULT_CODE_TTL)
    }
}

impl Drop for ConfirmationGate {
    fn drop(&mut self) {
        for entry in lock(&self.entries).values() {
            entry.cancel_timer();
        }
    }
}

/// Remove `principal`'s entry only if it still belongs to `issuance`.
fn remove_if_current(entries: &Weak<Mutex<EntryMap>>, principal: &str, issuance: Uuid) -> bool {
    let Some(entries) = entries.upgrade() else {
        return false;
    };
    let mut entries = lock(&entries);
    match entries.get(principal) {
        Some(entry) if entry.issuance == issuance => {
            entries.remove(principal);
            true
        }
        _ => false,
    }
}

fn is_expired(issued_at: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> bool {
    let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    now.signed_duration_since(issued_at).num_milliseconds() >= ttl_ms
}

/// Uniform four-digit code without a leading zero.
fn generate_code() -> String {
    rand::thread_rng()
        .gen_range(CODE_MIN..=CODE_MAX)
        .to_string()
}

/// The map holds plain data, so a poisoned lock is still consistent.
fn lock(entries: &Mutex<EntryMap>) -> MutexGuard<'_, EntryMap> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}
