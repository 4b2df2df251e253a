//! Expiration tracking shared by credential providers.

use std::{
    sync::{PoisonError, RwLock},
    time::{Duration, SystemTime},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ExpiryState {
    expiration: SystemTime,
    window: Duration,
}

/// Tracks when a provider's most recently retrieved credentials stop being valid.
///
/// Providers write into it after each successful retrieval; whoever caches the
/// credentials reads it back to decide when to retrieve again.
#[derive(Debug)]
pub struct Expiry {
    state: RwLock<Option<ExpiryState>>,
    current_time: fn() -> SystemTime,
}

impl Default for Expiry {
    fn default() -> Self {
        Self::new()
    }
}

impl Expiry {
    pub fn new() -> Self {
        Self::with_clock(SystemTime::now)
    }

    /// Uses `current_time` instead of the system clock when checking expiry.
    pub fn with_clock(current_time: fn() -> SystemTime) -> Self {
        Self {
            state: RwLock::new(None),
            current_time,
        }
    }

    /// Records `expiration`. Credentials count as expired `window` before it.
    pub fn set_expiration(&self, expiration: SystemTime, window: Duration) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *state = Some(ExpiryState { expiration, window });
    }

    /// The expiration last recorded, without the window applied.
    pub fn expires_at(&self) -> Option<SystemTime> {
        self.read_state().map(|state| state.expiration)
    }

    pub fn window(&self) -> Duration {
        self.read_state()
            .map(|state| state.window)
            .unwrap_or(Duration::ZERO)
    }

    /// Forgets any recorded expiration, so the credentials read as expired.
    pub fn clear(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *state = None;
    }

    /// Nothing recorded counts as expired. Credentials are still valid at the
    /// exact instant of `expiration - window`.
    pub fn is_expired(&self) -> bool {
        match self.read_state() {
            None => true,
            Some(ExpiryState { expiration, window }) => {
                let now = (self.current_time)();
                expiration
                    .checked_sub(window)
                    .map_or(true, |refresh_at| now > refresh_at)
            }
        }
    }

    fn read_state(&self) -> Option<ExpiryState> {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }
}
