// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Identity Bridge
//!
//! Runs the two identity provider flows behind the realm:
//!
//! 1. **Authentication**: a resource-owner-password grant with the
//!    authentication (native app) client id. Does not touch the token cache.
//! 2. **Authorization**: a directory membership query per principal,
//!    authorized with the cached client-credentials token of the
//!    authorization (web app) client.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info};

use crate::auth::token_endpoint::{
    build_http_client, ClientCredentialsGrant, HttpTokenEndpoint, PasswordGrant, TokenEndpoint,
    TokenEndpointError,
};
use crate::auth::{Role, TokenCache};
use crate::config::{AadConfig, ConfigError};
use crate::directory::DirectoryClient;
use crate::error::ServiceError;
use crate::models::{Credentials, Principal, PrincipalCollection};

/// Outcome of an authentication attempt that reached the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationOutcome {
    Authenticated(Principal),
    /// Provider rejected the credentials.
    NoMatch,
}

pub struct IdentityBridge {
    realm_name: String,
    config: AadConfig,
    endpoint: Arc<dyn TokenEndpoint>,
    tokens: Arc<TokenCache>,
    directory: DirectoryClient,
}

impl IdentityBridge {
    /// Validate `config` and build the HTTP token endpoint, service token
    /// cache and directory client.
    pub fn new(realm_name: impl Into<String>, config: AadConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Self::from_validated(realm_name.into(), config)
    }

    /// Same as [`IdentityBridge::new`] for a configuration that already
    /// passed [`AadConfig::validate`].
    pub(crate) fn from_validated(realm_name: String, config: AadConfig) -> Result<Self, ConfigError> {
        let http = build_http_client()?;
        let endpoint: Arc<dyn TokenEndpoint> = Arc::new(HttpTokenEndpoint::new(
            config.token_endpoint_url(),
            http.clone(),
        ));
        let tokens = Arc::new(TokenCache::new(
            Arc::clone(&endpoint),
            service_grant(&config),
        ));
        Ok(Self::from_parts(realm_name, config, endpoint, tokens, http))
    }

    /// Build with a caller-supplied token endpoint and token cache.
    pub fn with_endpoint(
        realm_name: impl Into<String>,
        config: AadConfig,
        endpoint: Arc<dyn TokenEndpoint>,
        tokens: Arc<TokenCache>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let http = build_http_client()?;
        Ok(Self::from_parts(realm_name, config, endpoint, tokens, http))
    }

    fn from_parts(
        realm_name: impl Into<String>,
        config: AadConfig,
        endpoint: Arc<dyn TokenEndpoint>,
        tokens: Arc<TokenCache>,
        http: reqwest::Client,
    ) -> Self {
        let directory = DirectoryClient::new(http, Arc::clone(&tokens), &config);
        Self {
            realm_name: realm_name.into(),
            config,
            endpoint,
            tokens,
            directory,
        }
    }

    pub fn realm_name(&self) -> &str {
        &self.realm_name
    }

    pub fn token_cache(&self) -> &Arc<TokenCache> {
        &self.tokens
    }

    /// Verify `credentials` with the password grant.
    pub async fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> Result<AuthenticationOutcome, ServiceError> {
        let identity = format!("{}@{}", credentials.username, self.config.tenant);
        let password = escape(credentials.password());
        let grant = PasswordGrant {
            client_id: &self.config.authentication_client_id,
            resource: &self.config.graph_resource,
            username: &identity,
            password: &password,
        };

        match self.endpoint.acquire_token_by_password(&grant).await {
            Ok(_) => {
                info!(username = %credentials.username, realm = %self.realm_name, "user authenticated");
                Ok(AuthenticationOutcome::Authenticated(Principal::new(
                    credentials.username.clone(),
                    self.realm_name.clone(),
                )))
            }
            Err(TokenEndpointError::InvalidGrant(reason)) => {
                info!(username = %credentials.username, %reason, "credentials rejected");
                Ok(AuthenticationOutcome::NoMatch)
            }
            Err(e) => Err(ServiceError::TokenEndpoint(e.to_string())),
        }
    }

    /// Union of the directory roles of every principal from this realm.
    ///
    /// The first failing lookup fails the whole call.
    pub async fn authorize(
        &self,
        principals: &PrincipalCollection,
    ) -> Result<BTreeSet<Role>, ServiceError> {
        let mut roles = BTreeSet::new();
        for principal in principals.by_realm(&self.realm_name) {
            let ids = self.directory.query_roles(&principal.username).await?;
            roles.extend(ids.into_iter().map(Role::from));
        }
        debug!(realm = %self.realm_name, count = roles.len(), "roles resolved");
        Ok(roles)
    }
}

/// Client-credentials grant of the authorization client.
pub fn service_grant(config: &AadConfig) -> ClientCredentialsGrant {
    ClientCredentialsGrant {
        client_id: config.authorization_client_id.clone(),
        client_secret: config.authorization_client_secret.clone(),
        resource: config.graph_resource.clone(),
    }
}

/// Replace `&`, `<` and `>` with XML entities in one pass.
///
/// Not idempotent: `escape(escape("a&b"))` is `"a&amp;amp;b"`.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
