// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Directory (Graph API) membership queries.
//!
//! Resolves the groups and roles of a user with
//! `POST {graphResource}{tenant}/users/{username}@{tenant}/{memberFunction}`,
//! authorized with the cached service token.

use std::sync::Arc;

use reqwest::{
    header::{ACCEPT, CONTENT_TYPE},
    Client, StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::TokenCache;
use crate::config::{AadConfig, MemberFunction};
use crate::error::ServiceError;

/// Graph API version sent with every directory query.
pub const API_VERSION: &str = "1.5";

/// One membership lookup, fully determined by configuration and user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryQuery {
    pub tenant: String,
    pub username: String,
    pub member_function: MemberFunction,
    pub security_enabled_only: bool,
}

impl DirectoryQuery {
    /// Request target below the graph resource base URL.
    pub fn url(&self, graph_resource: &str) -> String {
        format!(
            "{graph_resource}{tenant}/users/{username}@{tenant}/{function}?api-version={API_VERSION}",
            tenant = self.tenant,
            username = self.username,
            function = self.member_function,
        )
    }

    pub fn body(&self) -> DirectoryQueryBody {
        DirectoryQueryBody {
            security_enabled_only: self.security_enabled_only,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryQueryBody {
    pub security_enabled_only: bool,
}

/// Membership response: object ids in the order the directory sent them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryResponse {
    #[serde(rename = "value")]
    pub ids: Vec<String>,
}

/// Client for directory membership queries.
pub struct DirectoryClient {
    http: Client,
    tokens: Arc<TokenCache>,
    graph_resource: String,
    tenant: String,
    member_function: MemberFunction,
    security_enabled_only: bool,
}

impl DirectoryClient {
    pub fn new(http: Client, tokens: Arc<TokenCache>, config: &AadConfig) -> Self {
        Self {
            http,
            tokens,
            graph_resource: config.graph_resource.clone(),
            tenant: config.tenant.clone(),
            member_function: config.member_function,
            security_enabled_only: config.security_enabled_only,
        }
    }

    pub fn query_for(&self, username: &str) -> DirectoryQuery {
        DirectoryQuery {
            tenant: self.tenant.clone(),
            username: username.to_string(),
            member_function: self.member_function,
            security_enabled_only: self.security_enabled_only,
        }
    }

    /// Object ids of the groups/roles `username` is a member of.
    pub async fn query_roles(&self, username: &str) -> Result<Vec<String>, ServiceError> {
        let query = self.query_for(username);
        let url = query.url(&self.graph_resource);
        let token = self.tokens.service_token().await?;

        debug!(%username, function = %query.member_function, "querying directory memberships");

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .json(&query.body())
            .send()
            .await
            .map_err(|e| ServiceError::Transport(format!("POST {url} failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ServiceError::Transport(format!("failed to read response: {e}")))?;

        if status != StatusCode::OK {
            warn!(%username, status = status.as_u16(), "directory query rejected");
            return Err(ServiceError::DirectoryStatus {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed = parse_response(&text)?;
        debug!(%username, count = parsed.ids.len(), "directory memberships resolved");
        Ok(parsed.ids)
    }
}

pub fn parse_response(body: &str) -> Result<DirectoryResponse, ServiceError> {
    serde_json::from_str(body).map_err(|e| ServiceError::InvalidResponse(e.to_string()))
}
