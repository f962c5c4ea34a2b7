// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! End-to-end realm tests against a mocked token endpoint and directory.

use std::collections::BTreeSet;
use std::time::Duration;

use aad_realm::{
    AadConfig, AadRealm, AuthenticationToken, Principal, PrincipalCollection, Realm, RealmError,
    ServiceError, DEFAULT_REALM_NAME,
};
use futures_util::future::join_all;
use serde_json::json;
use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN_PATH: &str = "/contoso.com/oauth2/token";

fn config_for(server: &MockServer, extra: &[(&str, &str)]) -> AadConfig {
    let base = format!("{}/", server.uri());
    let mut props = vec![
        ("aad.authority".to_string(), base.clone()),
        ("aad.tenant".to_string(), "contoso.com".to_string()),
        ("aad.graphResource".to_string(), base),
        ("aad.authenticationClientId".to_string(), "native-app".to_string()),
        ("aad.authorizationClientId".to_string(), "web-app".to_string()),
        ("aad.authorizationClientSecret".to_string(), "s3cr3t".to_string()),
    ];
    props.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
    AadConfig::from_properties(props).expect("valid test configuration")
}

fn ready_realm(server: &MockServer, extra: &[(&str, &str)]) -> AadRealm {
    let mut realm = AadRealm::with_config(DEFAULT_REALM_NAME, config_for(server, extra));
    realm.init().expect("realm initializes");
    realm
}

fn principals(names: &[&str]) -> PrincipalCollection {
    names
        .iter()
        .map(|name| Principal::new(*name, DEFAULT_REALM_NAME))
        .collect()
}

fn role_ids(info: &aad_realm::AuthorizationInfo) -> BTreeSet<String> {
    info.roles.iter().map(|r| r.as_str().to_string()).collect()
}

async fn mount_service_token(server: &MockServer, expires_in: &str, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=web-app"))
        .and(body_string_contains("client_secret=s3cr3t"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "expires_in": expires_in,
            "access_token": "service-token"
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

async fn mount_memberships(server: &MockServer, username: &str, ids: &[&str]) {
    Mock::given(method("POST"))
        .and(path(format!(
            "/contoso.com/users/{username}@contoso.com/getMemberObjects"
        )))
        .and(query_param("api-version", "1.5"))
        .and(header("authorization", "Bearer service-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": ids })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn valid_credentials_authenticate() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=password"))
        .and(body_string_contains("client_id=native-app"))
        .and(body_string_contains("username=alice%40contoso.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "expires_in": "3599",
            "expires_on": "1700003599",
            "access_token": "user-token"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let realm = ready_realm(&server, &[]);
    let token = AuthenticationToken::username_password("alice", "correct horse");
    let info = realm
        .authentication_info(&token)
        .await
        .unwrap()
        .expect("credentials accepted");

    assert_eq!(info.principal.username, "alice");
    assert_eq!(info.principal.realm, DEFAULT_REALM_NAME);
}

#[tokio::test]
async fn password_is_entity_escaped_before_submission() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("password=a%26amp%3Bb%26lt%3B"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "user-token",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let realm = ready_realm(&server, &[]);
    let token = AuthenticationToken::username_password("alice", "a&b<");
    assert!(realm.authentication_info(&token).await.unwrap().is_some());
}

#[tokio::test]
async fn rejected_credentials_are_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "AADSTS50126: Invalid username or password."
        })))
        .mount(&server)
        .await;

    let realm = ready_realm(&server, &[]);
    let token = AuthenticationToken::username_password("alice", "wrong");
    assert!(realm.authentication_info(&token).await.unwrap().is_none());
}

#[tokio::test]
async fn token_endpoint_outage_fails_authentication() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .mount(&server)
        .await;

    let realm = ready_realm(&server, &[]);
    let token = AuthenticationToken::username_password("alice", "hunter2");
    let err = realm.authentication_info(&token).await.unwrap_err();

    assert!(matches!(err, RealmError::Service(ServiceError::TokenEndpoint(_))));
    assert!(!err.to_string().contains("hunter2"));
}

#[tokio::test]
async fn authorize_single_principal() {
    let server = MockServer::start().await;
    mount_service_token(&server, "3599", 1).await;
    Mock::given(method("POST"))
        .and(path("/contoso.com/users/alice@contoso.com/getMemberObjects"))
        .and(query_param("api-version", "1.5"))
        .and(header("authorization", "Bearer service-token"))
        .and(header("accept", "application/json"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({ "securityEnabledOnly": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": ["g1", "g2"] })))
        .expect(1)
        .mount(&server)
        .await;

    let realm = ready_realm(&server, &[]);
    let info = realm.authorization_info(&principals(&["alice"])).await.unwrap();

    assert_eq!(
        role_ids(&info),
        BTreeSet::from(["g1".to_string(), "g2".to_string()])
    );
}

#[tokio::test]
async fn authorize_merges_roles_and_reuses_service_token() {
    let server = MockServer::start().await;
    mount_service_token(&server, "3599", 1).await;
    mount_memberships(&server, "alice", &["g1", "g2"]).await;
    mount_memberships(&server, "bob", &["g1", "g3"]).await;

    let realm = ready_realm(&server, &[]);
    let info = realm
        .authorization_info(&principals(&["alice", "bob"]))
        .await
        .unwrap();

    assert_eq!(info.roles.len(), 3);
    assert_eq!(info.roles.iter().filter(|r| r.as_str() == "g1").count(), 1);
    assert!(info.has_role("g2"));
    assert!(info.has_role("g3"));
}

#[tokio::test]
async fn authorize_ignores_foreign_principals() {
    let server = MockServer::start().await;
    mount_service_token(&server, "3599", 1).await;
    mount_memberships(&server, "alice", &["g1"]).await;

    let realm = ready_realm(&server, &[]);
    let mut collection = principals(&["alice"]);
    collection.push(Principal::new("mallory", "ldap"));

    let info = realm.authorization_info(&collection).await.unwrap();
    assert_eq!(role_ids(&info), BTreeSet::from(["g1".to_string()]));
}

#[tokio::test]
async fn member_groups_and_security_flag_are_sent() {
    let server = MockServer::start().await;
    mount_service_token(&server, "3599", 1).await;
    Mock::given(method("POST"))
        .and(path("/contoso.com/users/alice@contoso.com/getMemberGroups"))
        .and(body_json(json!({ "securityEnabledOnly": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": ["sg1"] })))
        .expect(1)
        .mount(&server)
        .await;

    let realm = ready_realm(
        &server,
        &[
            ("aad.memberFunction", "getMemberGroups"),
            ("aad.securityEnabledOnly", "true"),
        ],
    );
    let info = realm.authorization_info(&principals(&["alice"])).await.unwrap();
    assert!(info.has_role("sg1"));
}

#[tokio::test]
async fn non_200_directory_response_is_reported_verbatim() {
    let server = MockServer::start().await;
    mount_service_token(&server, "3599", 1).await;
    let body = r#"{"odata.error":{"code":"Request_ResourceNotFound","message":{"lang":"en","value":"Resource 'alice@contoso.com' does not exist."}}}"#;
    Mock::given(method("POST"))
        .and(path("/contoso.com/users/alice@contoso.com/getMemberObjects"))
        .respond_with(ResponseTemplate::new(404).set_body_string(body))
        .mount(&server)
        .await;

    let realm = ready_realm(&server, &[]);
    let err = realm
        .authorization_info(&principals(&["alice"]))
        .await
        .unwrap_err();

    match err {
        RealmError::Service(service) => {
            assert_eq!(service.status(), Some(404));
            assert_eq!(service.body(), Some(body));
        }
        other => panic!("expected service error, got {other:?}"),
    }
}

#[tokio::test]
async fn non_200_success_status_is_still_a_failure() {
    let server = MockServer::start().await;
    mount_service_token(&server, "3599", 1).await;
    Mock::given(method("POST"))
        .and(path("/contoso.com/users/alice@contoso.com/getMemberObjects"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let realm = ready_realm(&server, &[]);
    let err = realm
        .authorization_info(&principals(&["alice"]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RealmError::Service(ServiceError::DirectoryStatus { status: 204, .. })
    ));
}

#[tokio::test]
async fn one_failing_principal_fails_the_whole_call() {
    let server = MockServer::start().await;
    mount_service_token(&server, "3599", 1).await;
    mount_memberships(&server, "alice", &["g1"]).await;
    Mock::given(method("POST"))
        .and(path("/contoso.com/users/bob@contoso.com/getMemberObjects"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let realm = ready_realm(&server, &[]);
    let result = realm.authorization_info(&principals(&["alice", "bob"])).await;
    assert!(matches!(
        result,
        Err(RealmError::Service(ServiceError::DirectoryStatus { status: 500, .. }))
    ));
}

#[tokio::test]
async fn service_token_failure_fails_authorization() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_client",
            "error_description": "AADSTS7000215: Invalid client secret is provided."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let realm = ready_realm(&server, &[]);
    let err = realm
        .authorization_info(&principals(&["alice"]))
        .await
        .unwrap_err();

    assert!(matches!(err, RealmError::Service(ServiceError::TokenEndpoint(_))));
    assert!(!err.to_string().contains("s3cr3t"));
}

#[tokio::test]
async fn stale_service_token_burst_triggers_single_refresh() {
    let server = MockServer::start().await;
    // 30 s lifetime sits inside the 60 s grace period, so every token is
    // stale on arrival: one request to prime, exactly one more for the burst.
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access_token": "service-token", "expires_in": "30" }))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(2)
        .mount(&server)
        .await;

    let realm = ready_realm(&server, &[]);
    let tokens = realm.bridge().expect("ready realm has a bridge").token_cache();

    assert_eq!(tokens.service_token().await.unwrap(), "service-token");
    assert!(!tokens.is_cached());

    let burst = join_all((0..10).map(|_| tokens.service_token())).await;
    for result in burst {
        assert_eq!(result.unwrap(), "service-token");
    }
}

#[tokio::test]
async fn out_of_range_token_lifetime_fails_each_call_without_poisoning() {
    let server = MockServer::start().await;
    mount_service_token(&server, "922337203685477580", 2).await;

    let realm = ready_realm(&server, &[]);
    for _ in 0..2 {
        let err = realm
            .authorization_info(&principals(&["alice"]))
            .await
            .unwrap_err();
        assert!(matches!(err, RealmError::Service(ServiceError::TokenEndpoint(_))));
    }
}
