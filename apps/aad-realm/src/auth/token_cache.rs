// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Service token caching for directory queries.
//!
//! Holds one client-credentials access token per bridge instance and
//! refreshes it when it enters the grace window before expiry.
//!
//! ## Concurrency
//!
//! - Fresh tokens are served under a read lock and never wait on a refresh
//! - A stale token causes exactly one in-flight client-credentials request;
//!   concurrent callers await the same shared future and get its outcome
//! - A failed refresh is not cached, the next caller starts a new one

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, warn};

use super::token_endpoint::{ClientCredentialsGrant, TokenEndpoint};
use crate::error::ServiceError;

/// A token is refreshed this long before it actually expires.
pub const GRACE_PERIOD_MS: i64 = 60_000;

/// Wall clock in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Cached access token and its absolute expiry.
#[derive(Clone, PartialEq, Eq)]
pub struct CachedToken {
    pub access_token: String,
    pub expires_at_ms: i64,
}

impl CachedToken {
    /// Usable while `now < expiry - grace period`.
    pub fn is_fresh(&self, now_ms: i64) -> bool {
        now_ms < self.expires_at_ms.saturating_sub(GRACE_PERIOD_MS)
    }
}

impl std::fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedToken")
            .field("access_token", &"<redacted>")
            .field("expires_at_ms", &self.expires_at_ms)
            .finish()
    }
}

type Refresh = Shared<BoxFuture<'static, Result<CachedToken, ServiceError>>>;

#[derive(Default)]
struct Slot {
    token: Option<CachedToken>,
    refresh: Option<Refresh>,
}

/// Single-flight cache of the service (client-credentials) token.
pub struct TokenCache {
    endpoint: Arc<dyn TokenEndpoint>,
    grant: ClientCredentialsGrant,
    clock: Arc<dyn Clock>,
    slot: Arc<RwLock<Slot>>,
}

impl TokenCache {
    pub fn new(endpoint: Arc<dyn TokenEndpoint>, grant: ClientCredentialsGrant) -> Self {
        Self::with_clock(endpoint, grant, Arc::new(SystemClock))
    }

    pub fn with_clock(
        endpoint: Arc<dyn TokenEndpoint>,
        grant: ClientCredentialsGrant,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            endpoint,
            grant,
            clock,
            slot: Arc::new(RwLock::new(Slot::default())),
        }
    }

    /// Return a usable service token, refreshing it first if needed.
    pub async fn service_token(&self) -> Result<String, ServiceError> {
        if let Some(token) = self.fresh_token() {
            return Ok(token);
        }

        let refresh = {
            let mut slot = write_slot(&self.slot);
            let now = self.clock.now_millis();
            if let Some(token) = slot.token.as_ref().filter(|t| t.is_fresh(now)) {
                return Ok(token.access_token.clone());
            }
            match &slot.refresh {
                Some(in_flight) => in_flight.clone(),
                None => {
                    let refresh = self.start_refresh();
                    slot.refresh = Some(refresh.clone());
                    refresh
                }
            }
        };

        refresh.await.map(|token| token.access_token)
    }

    /// Whether a fresh token is currently held.
    pub fn is_cached(&self) -> bool {
        self.fresh_token().is_some()
    }

    /// Replace the cached token.
    pub fn store(&self, token: CachedToken) {
        write_slot(&self.slot).token = Some(token);
    }

    fn fresh_token(&self) -> Option<String> {
        let now = self.clock.now_millis();
        read_slot(&self.slot)
            .token
            .as_ref()
            .filter(|t| t.is_fresh(now))
            .map(|t| t.access_token.clone())
    }

    fn start_refresh(&self) -> Refresh {
        let endpoint = Arc::clone(&self.endpoint);
        let grant = self.grant.clone();
        let clock = Arc::clone(&self.clock);
        let slot = Arc::clone(&self.slot);

        async move {
            debug!(client_id = %grant.client_id, "refreshing service token");
            let outcome = match endpoint.acquire_token_by_client_credentials(&grant).await {
                Ok(issued) => match issued.expires_in_secs {
                    Some(expires_in) => {
                        expiry_ms(clock.now_millis(), expires_in).map(|expires_at_ms| CachedToken {
                            access_token: issued.access_token,
                            expires_at_ms,
                        })
                    }
                    None => Err(ServiceError::TokenEndpoint(
                        "token response did not include expires_in".to_string(),
                    )),
                },
                Err(e) => Err(ServiceError::TokenEndpoint(e.to_string())),
            };

            let mut state = write_slot(&slot);
            state.refresh = None;
            match &outcome {
                Ok(token) => {
                    debug!(expires_at_ms = token.expires_at_ms, "service token refreshed");
                    state.token = Some(token.clone());
                }
                Err(e) => warn!(error = %e, "service token refresh failed"),
            }
            outcome
        }
        .boxed()
        .shared()
    }
}

/// Absolute expiry of a token issued at `now_ms` with `expires_in` seconds
/// of lifetime.
fn expiry_ms(now_ms: i64, expires_in: i64) -> Result<i64, ServiceError> {
    if expires_in < 0 {
        return Err(ServiceError::TokenEndpoint(format!(
            "token response has negative expires_in: {expires_in}"
        )));
    }
    expires_in
        .checked_mul(1000)
        .and_then(|ms| now_ms.checked_add(ms))
        .ok_or_else(|| {
            ServiceError::TokenEndpoint(format!("token response expires_in out of range: {expires_in}"))
        })
}

fn read_slot(slot: &RwLock<Slot>) -> RwLockReadGuard<'_, Slot> {
    slot.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_slot(slot: &RwLock<Slot>) -> RwLockWriteGuard<'_, Slot> {
    slot.write().unwrap_or_else(PoisonError::into_inner)
}
