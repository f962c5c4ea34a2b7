// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Values exchanged with the host framework.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;

use crate::auth::Role;

/// Username and password submitted for one authentication attempt.
///
/// The password is only read while building the password grant; `Debug`
/// never prints it.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Credential kinds the host framework may hand to a realm.
///
/// Only [`AuthenticationToken::UsernamePassword`] is handled by the AAD
/// realm; the others pass through as "not handled".
#[derive(Debug, Clone)]
pub enum AuthenticationToken {
    UsernamePassword(Credentials),
    Bearer(String),
    Other { kind: String },
}

impl AuthenticationToken {
    pub fn username_password(
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        AuthenticationToken::UsernamePassword(Credentials::new(username, password))
    }
}

/// Authenticated user name tagged with the realm that produced it.
///
/// Equality and hashing use the username only.
#[derive(Debug, Clone, Serialize)]
pub struct Principal {
    pub username: String,
    pub realm: String,
}

impl Principal {
    pub fn new(username: impl Into<String>, realm: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            realm: realm.into(),
        }
    }
}

impl PartialEq for Principal {
    fn eq(&self, other: &Self) -> bool {
        self.username == other.username
    }
}

impl Eq for Principal {}

impl Hash for Principal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.username.hash(state);
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.username)
    }
}

/// Principals of one subject, possibly collected from several realms.
#[derive(Debug, Clone, Default)]
pub struct PrincipalCollection {
    principals: Vec<Principal>,
}

impl PrincipalCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, principal: Principal) {
        self.principals.push(principal);
    }

    /// Principals originating from the realm called `realm`.
    pub fn by_realm<'a>(&'a self, realm: &'a str) -> impl Iterator<Item = &'a Principal> + 'a {
        self.principals.iter().filter(move |p| p.realm == realm)
    }

    pub fn is_empty(&self) -> bool {
        self.principals.is_empty()
    }

    pub fn len(&self) -> usize {
        self.principals.len()
    }
}

impl FromIterator<Principal> for PrincipalCollection {
    fn from_iter<T: IntoIterator<Item = Principal>>(iter: T) -> Self {
        Self {
            principals: iter.into_iter().collect(),
        }
    }
}

/// Result of a successful authentication. Carries no credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticationInfo {
    pub principal: Principal,
}

impl AuthenticationInfo {
    /// Single-principal collection for later authorization calls.
    pub fn principals(&self) -> PrincipalCollection {
        std::iter::once(self.principal.clone()).collect()
    }
}

/// Roles granted to a subject.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuthorizationInfo {
    pub roles: BTreeSet<Role>,
}

impl AuthorizationInfo {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.as_str() == role)
    }
}
