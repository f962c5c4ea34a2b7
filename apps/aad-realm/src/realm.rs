// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Realm Contract
//!
//! The host security framework drives a realm through three hooks:
//!
//! 1. `init` once at startup. A failure here must abort startup.
//! 2. `authentication_info` per login attempt. `Ok(None)` means "not
//!    handled here": either the token kind is unsupported or the
//!    credentials were rejected.
//! 3. `authorization_info` per permission check, with the principals
//!    collected at login.
//!
//! [`AadRealm`] moves through `Uninitialized → Initialized → Ready`:
//! configuration is validated first, then the HTTP clients are built.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::bridge::{AuthenticationOutcome, IdentityBridge};
use crate::config::{AadConfig, ConfigError};
use crate::error::RealmError;
use crate::models::{AuthenticationInfo, AuthenticationToken, AuthorizationInfo, PrincipalCollection};

/// Default realm name used to tag principals.
pub const DEFAULT_REALM_NAME: &str = "aad";

#[async_trait]
pub trait Realm: Send + Sync {
    fn name(&self) -> &str;

    fn init(&mut self) -> Result<(), RealmError>;

    async fn authentication_info(
        &self,
        token: &AuthenticationToken,
    ) -> Result<Option<AuthenticationInfo>, RealmError>;

    async fn authorization_info(
        &self,
        principals: &PrincipalCollection,
    ) -> Result<AuthorizationInfo, RealmError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RealmState {
    Uninitialized,
    /// Configuration validated, clients not built yet.
    Initialized,
    Ready,
}

/// Realm authenticating and authorizing against Azure Active Directory.
pub struct AadRealm {
    name: String,
    config: Option<AadConfig>,
    state: RealmState,
    bridge: Option<IdentityBridge>,
}

impl AadRealm {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: None,
            state: RealmState::Uninitialized,
            bridge: None,
        }
    }

    pub fn with_config(name: impl Into<String>, config: AadConfig) -> Self {
        let mut realm = Self::new(name);
        realm.set_config(config);
        realm
    }

    /// Replace the configuration. Has no effect once the realm is ready.
    pub fn set_config(&mut self, config: AadConfig) {
        if self.state == RealmState::Ready {
            debug!(realm = %self.name, "ignoring configuration change on ready realm");
            return;
        }
        self.config = Some(config);
    }

    pub fn state(&self) -> RealmState {
        self.state
    }

    pub fn bridge(&self) -> Option<&IdentityBridge> {
        self.bridge.as_ref()
    }

    fn ready_bridge(&self) -> Result<&IdentityBridge, RealmError> {
        self.bridge.as_ref().ok_or(RealmError::NotInitialized)
    }

    /// Validate the configuration, then build the bridge with `build`.
    /// A failed build puts the realm back to `Uninitialized`.
    fn init_with<F>(&mut self, build: F) -> Result<(), RealmError>
    where
        F: FnOnce(String, AadConfig) -> Result<IdentityBridge, ConfigError>,
    {
        if self.state == RealmState::Ready {
            return Ok(());
        }
        let config = self.config.clone().ok_or(ConfigError::NotSet)?;
        config.validate()?;
        self.state = RealmState::Initialized;

        let token_endpoint = config.token_endpoint_url();
        match build(self.name.clone(), config) {
            Ok(bridge) => {
                info!(realm = %self.name, %token_endpoint, "AAD realm ready");
                self.bridge = Some(bridge);
                self.state = RealmState::Ready;
                Ok(())
            }
            Err(e) => {
                self.state = RealmState::Uninitialized;
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl Realm for AadRealm {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self) -> Result<(), RealmError> {
        self.init_with(IdentityBridge::from_validated)
    }

    async fn authentication_info(
        &self,
        token: &AuthenticationToken,
    ) -> Result<Option<AuthenticationInfo>, RealmError> {
        let AuthenticationToken::UsernamePassword(credentials) = token else {
            debug!(realm = %self.name, "token kind not supported by this realm");
            return Ok(None);
        };
        match self.ready_bridge()?.authenticate(credentials).await? {
            AuthenticationOutcome::Authenticated(principal) => {
                Ok(Some(AuthenticationInfo { principal }))
            }
            AuthenticationOutcome::NoMatch => Ok(None),
        }
    }

    async fn authorization_info(
        &self,
        principals: &PrincipalCollection,
    ) -> Result<AuthorizationInfo, RealmError> {
        let roles = self.ready_bridge()?.authorize(principals).await?;
        Ok(AuthorizationInfo { roles })
    }
}
