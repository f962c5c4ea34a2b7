// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! OAuth2 plumbing against the directory's token endpoint.
//!
//! ## Token Flows
//!
//! 1. End-user login: resource-owner-password grant with the native
//!    (authentication) client id. The issued token is discarded; only the
//!    fact that the provider accepted the credentials matters.
//! 2. Directory access: client-credentials grant with the web
//!    (authorization) client id and secret, cached in [`TokenCache`].
//!
//! ## Security
//!
//! - Passwords, client secrets and access tokens are redacted from `Debug`
//! - The service token is refreshed 60 seconds before it expires
//! - Refreshes are single-flight; concurrent callers share one request

pub mod roles;
pub mod token_cache;
pub mod token_endpoint;

pub use roles::Role;
pub use token_cache::{CachedToken, Clock, SystemClock, TokenCache, GRACE_PERIOD_MS};
pub use token_endpoint::{HttpTokenEndpoint, TokenEndpoint, TokenEndpointError};
