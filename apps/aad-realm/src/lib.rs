// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! AAD Realm - Azure Active Directory bridge for a pluggable security framework
//!
//! This crate verifies user credentials with a resource-owner-password
//! grant and resolves group/role memberships from the directory using a
//! cached client-credentials token.
//!
//! ## Modules
//!
//! - `realm` - Host framework contract and the `AadRealm` state machine
//! - `bridge` - Authentication and authorization flows
//! - `auth` - Token endpoint client and service token cache
//! - `directory` - Graph API membership queries
//! - `config` - Typed settings from properties or environment

pub mod auth;
pub mod bridge;
pub mod config;
pub mod directory;
pub mod error;
pub mod models;
pub mod realm;
pub mod telemetry;

pub use bridge::{AuthenticationOutcome, IdentityBridge};
pub use config::{AadConfig, ConfigError, MemberFunction};
pub use error::{RealmError, ServiceError};
pub use models::{
    AuthenticationInfo, AuthenticationToken, AuthorizationInfo, Credentials, Principal,
    PrincipalCollection,
};
pub use realm::{AadRealm, Realm, RealmState, DEFAULT_REALM_NAME};
