// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Realm Configuration
//!
//! Typed settings for the AAD realm, loaded from key/value properties (a
//! `.properties` file or any iterator of pairs) or from the environment.
//! Property keys live under [`PROPERTY_PREFIX`] or the fully qualified
//! [`LEGACY_PROPERTY_PREFIX`]; keys outside both are ignored, unknown keys
//! inside them are rejected. When both spell the same setting the short
//! prefix wins.
//!
//! | Property | Environment variable | Description | Default |
//! |----------|----------------------|-------------|---------|
//! | `aad.authority` | `AAD_AUTHORITY` | Token endpoint base URL, ending in `/` | Required |
//! | `aad.tenant` | `AAD_TENANT` | Directory tenant, e.g. `contoso.com` | Required |
//! | `aad.graphResource` | `AAD_GRAPH_RESOURCE` | Graph API base URL, ending in `/` | Required |
//! | `aad.memberFunction` | `AAD_MEMBER_FUNCTION` | `getMemberObjects` or `getMemberGroups` | `getMemberObjects` |
//! | `aad.securityEnabledOnly` | `AAD_SECURITY_ENABLED_ONLY` | Only return security groups | `false` |
//! | `aad.authenticationClientId` | `AAD_AUTHENTICATION_CLIENT_ID` | Native app client id (password grant) | Required |
//! | `aad.authorizationClientId` | `AAD_AUTHORIZATION_CLIENT_ID` | Web app client id (client credentials) | Required |
//! | `aad.authorizationClientSecret` | `AAD_AUTHORIZATION_CLIENT_SECRET` | Web app client secret | Required |
//! | - | `AAD_CONFIG_FILE` | Properties file read by the `aad-realm` binary | Unset |
//! | - | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | - | `RUST_LOG` | Log level filter | `info` |

use std::{fmt, fs, path::Path};

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use url::Url;

/// Prefix shared by every recognized property key.
pub const PROPERTY_PREFIX: &str = "aad.";

/// Fully qualified prefix used by existing deployments' properties files.
pub const LEGACY_PROPERTY_PREFIX: &str = "com.nitorcreations.willow.shiro.aad.";

/// Environment variable naming a properties file for the binary.
pub const CONFIG_FILE_ENV: &str = "AAD_CONFIG_FILE";

/// Environment variables mapped onto property names (without prefix).
const ENV_KEYS: &[(&str, &str)] = &[
    ("AAD_AUTHORITY", "authority"),
    ("AAD_TENANT", "tenant"),
    ("AAD_GRAPH_RESOURCE", "graphResource"),
    ("AAD_MEMBER_FUNCTION", "memberFunction"),
    ("AAD_SECURITY_ENABLED_ONLY", "securityEnabledOnly"),
    ("AAD_AUTHENTICATION_CLIENT_ID", "authenticationClientId"),
    ("AAD_AUTHORIZATION_CLIENT_ID", "authorizationClientId"),
    ("AAD_AUTHORIZATION_CLIENT_SECRET", "authorizationClientSecret"),
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration not set")]
    NotSet,

    #[error("failed to read configuration from {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("missing configuration value: {0}")]
    Missing(&'static str),

    #[error("invalid URL for {key}: {reason}")]
    InvalidUrl { key: &'static str, reason: String },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Directory function used to resolve a user's memberships.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum MemberFunction {
    /// Groups and directory roles the user is a transitive member of.
    #[default]
    #[serde(rename = "getMemberObjects")]
    GetMemberObjects,
    /// Only groups the user is a transitive member of.
    #[serde(rename = "getMemberGroups")]
    GetMemberGroups,
}

impl MemberFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberFunction::GetMemberObjects => "getMemberObjects",
            MemberFunction::GetMemberGroups => "getMemberGroups",
        }
    }
}

impl fmt::Display for MemberFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings for one realm instance (one tenant).
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AadConfig {
    /// Token endpoint base, e.g. `https://login.windows.net/`.
    pub authority: String,
    /// Directory tenant, e.g. `contoso.com`.
    pub tenant: String,
    /// Graph API base, e.g. `https://graph.windows.net/`. Also the
    /// `resource` requested by both grants.
    pub graph_resource: String,
    #[serde(default)]
    pub member_function: MemberFunction,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub security_enabled_only: bool,
    pub authentication_client_id: String,
    pub authorization_client_id: String,
    pub authorization_client_secret: String,
}

impl fmt::Debug for AadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AadConfig")
            .field("authority", &self.authority)
            .field("tenant", &self.tenant)
            .field("graph_resource", &self.graph_resource)
            .field("member_function", &self.member_function)
            .field("security_enabled_only", &self.security_enabled_only)
            .field("authentication_client_id", &self.authentication_client_id)
            .field("authorization_client_id", &self.authorization_client_id)
            .field("authorization_client_secret", &"<redacted>")
            .finish()
    }
}

impl AadConfig {
    /// Build from key/value pairs. Only keys starting with
    /// [`PROPERTY_PREFIX`] or [`LEGACY_PROPERTY_PREFIX`] are considered.
    pub fn from_properties<I, K, V>(properties: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut fields = Map::new();
        let mut legacy = Map::new();
        for (key, value) in properties {
            let key = key.as_ref();
            let value = Value::String(value.as_ref().to_string());
            if let Some(name) = key.strip_prefix(LEGACY_PROPERTY_PREFIX) {
                legacy.insert(name.to_string(), value);
            } else if let Some(name) = key.strip_prefix(PROPERTY_PREFIX) {
                fields.insert(name.to_string(), value);
            }
        }
        for (name, value) in legacy {
            fields.entry(name).or_insert(value);
        }
        serde_json::from_value(Value::Object(fields)).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Parse `.properties` text and build from it.
    pub fn from_properties_str(text: &str) -> Result<Self, ConfigError> {
        Self::from_properties(parse_properties(text))
    }

    /// Read a `.properties` file and build from it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_properties_str(&text)
    }

    /// Build from the `AAD_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let properties = ENV_KEYS.iter().filter_map(|(env, name)| {
            env_optional(env).map(|value| (format!("{PROPERTY_PREFIX}{name}"), value))
        });
        Self::from_properties(properties)
    }

    /// Check that every setting is present and well formed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_url("authority", &self.authority)?;
        require_non_empty("tenant", &self.tenant)?;
        require_url("graphResource", &self.graph_resource)?;
        require_non_empty("authenticationClientId", &self.authentication_client_id)?;
        require_non_empty("authorizationClientId", &self.authorization_client_id)?;
        require_non_empty("authorizationClientSecret", &self.authorization_client_secret)?;
        Ok(())
    }

    /// Token endpoint for this tenant.
    pub fn token_endpoint_url(&self) -> String {
        format!("{}{}/oauth2/token", self.authority, self.tenant)
    }
}

/// Parse Java-style properties: `key=value` or `key: value` per line,
/// `#` and `!` start comments. Line continuations are not supported.
pub fn parse_properties(text: &str) -> Vec<(String, String)> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .map(|line| match line.find(['=', ':']) {
            Some(idx) => (
                line[..idx].trim_end().to_string(),
                line[idx + 1..].trim_start().to_string(),
            ),
            None => (line.to_string(), String::new()),
        })
        .collect()
}

fn require_non_empty(key: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Missing(key));
    }
    Ok(())
}

fn require_url(key: &'static str, value: &str) -> Result<(), ConfigError> {
    require_non_empty(key, value)?;
    let url = Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        key,
        reason: e.to_string(),
    })?;
    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl {
            key,
            reason: format!("unsupported scheme {}", url.scheme()),
        });
    }
    if !value.ends_with('/') {
        return Err(ConfigError::InvalidUrl {
            key,
            reason: "must end with '/'".to_string(),
        });
    }
    Ok(())
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => Ok(value),
        Flag::Text(text) => parse_flag(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid boolean value: {text}"))),
    }
}

fn parse_flag(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn env_optional(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
