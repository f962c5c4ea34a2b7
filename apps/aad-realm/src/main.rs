// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! `aad-realm`: authenticate one user against AAD and print their roles.
//!
//! Configuration comes from the properties file in `AAD_CONFIG_FILE`, or
//! from the `AAD_*` environment variables when unset. The user is read
//! from `AAD_CHECK_USERNAME` / `AAD_CHECK_PASSWORD`.

use std::{env, process::ExitCode};

use aad_realm::{
    config::CONFIG_FILE_ENV, telemetry, AadConfig, AadRealm, AuthenticationToken, ConfigError,
    Realm, DEFAULT_REALM_NAME,
};
use tracing::{error, info, warn};

const USERNAME_ENV: &str = "AAD_CHECK_USERNAME";
const PASSWORD_ENV: &str = "AAD_CHECK_PASSWORD";

const EXIT_REJECTED: u8 = 1;
const EXIT_CONFIG: u8 = 2;
const EXIT_SERVICE: u8 = 3;

fn load_config() -> Result<AadConfig, ConfigError> {
    match env::var(CONFIG_FILE_ENV) {
        Ok(path) if !path.trim().is_empty() => AadConfig::from_file(path.trim()),
        _ => AadConfig::from_env(),
    }
}

fn required_env(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

#[tokio::main]
async fn main() -> ExitCode {
    telemetry::init_tracing();

    let setup = load_config().and_then(|config| {
        let username = required_env(USERNAME_ENV)?;
        let password = required_env(PASSWORD_ENV)?;
        Ok((config, username, password))
    });
    let (config, username, password) = match setup {
        Ok(values) => values,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let mut realm = AadRealm::with_config(DEFAULT_REALM_NAME, config);
    if let Err(e) = realm.init() {
        error!(error = %e, "failed to initialize realm");
        return ExitCode::from(EXIT_CONFIG);
    }

    let token = AuthenticationToken::username_password(username, password);
    let info = match realm.authentication_info(&token).await {
        Ok(Some(info)) => info,
        Ok(None) => {
            warn!("credentials rejected");
            return ExitCode::from(EXIT_REJECTED);
        }
        Err(e) => {
            error!(error = %e, code = e.error_code(), "authentication failed");
            return ExitCode::from(EXIT_SERVICE);
        }
    };

    match realm.authorization_info(&info.principals()).await {
        Ok(authz) => {
            info!(username = %info.principal, roles = authz.roles.len(), "authorization resolved");
            for role in &authz.roles {
                println!("{role}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, code = e.error_code(), "authorization failed");
            ExitCode::from(EXIT_SERVICE)
        }
    }
}
