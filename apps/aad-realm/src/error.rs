// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Error types crossing the realm boundary.
//!
//! Everything that fails below the bridge is folded into one of three
//! outcomes before the host framework sees it:
//!
//! - credentials rejected: not an error, see [`AuthenticationOutcome::NoMatch`](crate::bridge::AuthenticationOutcome)
//! - [`ServiceError`]: the token endpoint or directory API failed this call
//! - [`ConfigError`]: settings were missing or invalid at startup

use crate::config::ConfigError;

/// Failure of a single call against the identity provider.
///
/// `Clone` because a single failed token refresh is handed to every caller
/// that was waiting on it. Messages never contain passwords, client
/// secrets or access tokens.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// Token endpoint rejected the request or returned something unusable.
    #[error("token endpoint request failed: {0}")]
    TokenEndpoint(String),

    /// Directory API could not be reached.
    #[error("directory request failed: {0}")]
    Transport(String),

    /// Directory API answered with anything other than 200.
    #[error("directory returned HTTP {status}: {body}")]
    DirectoryStatus { status: u16, body: String },

    /// Directory API answered 200 with a body we could not map.
    #[error("directory response was invalid: {0}")]
    InvalidResponse(String),
}

impl ServiceError {
    /// HTTP status carried by a directory failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ServiceError::DirectoryStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Response body carried by a directory failure, if any.
    pub fn body(&self) -> Option<&str> {
        match self {
            ServiceError::DirectoryStatus { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// Error returned through the [`Realm`](crate::realm::Realm) contract.
#[derive(Debug, thiserror::Error)]
pub enum RealmError {
    /// `init` has not completed successfully.
    #[error("realm is not initialized")]
    NotInitialized,

    #[error("error initializing realm: {0}")]
    Configuration(#[from] ConfigError),

    #[error("error accessing identity service: {0}")]
    Service(#[from] ServiceError),
}

impl RealmError {
    /// Stable machine-readable code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            RealmError::NotInitialized => "not_initialized",
            RealmError::Configuration(_) => "configuration_error",
            RealmError::Service(_) => "service_error",
        }
    }
}
