//! Bot API membership oracle against a local mock server.
//!
//! Covers status mapping, API errors, auth failures, undecodable bodies and
//! the adapter-owned timeout. No real network.

use std::time::Duration;

use gk_oracle::{MembershipOracle, MembershipStatus, OracleError, TelegramMembershipOracle};
use gk_schemas::UserId;
use httpmock::prelude::*;
use serde_json::json;

const TOKEN: &str = "TESTTOKEN";
const PATH: &str = "/botTESTTOKEN/getChatMember";

fn oracle(server: &MockServer, timeout: Duration) -> TelegramMembershipOracle {
    TelegramMembershipOracle::new(TOKEN.to_string(), server.base_url(), timeout).unwrap()
}

#[tokio::test]
async fn member_statuses_map_to_membership() {
    let server = MockServer::start_async().await;

    for (raw, expected) in [
        ("member", MembershipStatus::Member),
        ("administrator", MembershipStatus::Admin),
        ("creator", MembershipStatus::Creator),
        ("left", MembershipStatus::Left),
        ("kicked", MembershipStatus::Kicked),
    ] {
        let user = match raw {
            "member" => 1,
            "administrator" => 2,
            "creator" => 3,
            "left" => 4,
            _ => 5,
        };
        let mut m = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(PATH)
                    .query_param("chat_id", "-1002866596290")
                    .query_param("user_id", user.to_string());
                then.status(200)
                    .json_body(json!({"ok": true, "result": {"status": raw, "user": {"id": user}}}));
            })
            .await;

        let status = oracle(&server, Duration::from_secs(2))
            .check_status(-1002866596290, UserId(user))
            .await
            .unwrap();
        assert_eq!(status, expected, "raw status {raw}");
        m.assert_async().await;
        m.delete_async().await;
    }
}

#[tokio::test]
async fn restricted_member_flag_is_honoured() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(PATH).query_param("user_id", "10");
            then.status(200)
                .json_body(json!({"ok": true, "result": {"status": "restricted", "is_member": true}}));
        })
        .await;

    let status = oracle(&server, Duration::from_secs(2))
        .check_status(-1, UserId(10))
        .await
        .unwrap();
    assert_eq!(status, MembershipStatus::Member);
}

#[tokio::test]
async fn api_error_is_reported_with_code() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(PATH);
            then.status(400).json_body(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: user not found"
            }));
        })
        .await;

    let err = oracle(&server, Duration::from_secs(2))
        .check_status(-1, UserId(99))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        OracleError::Api {
            code: Some(400),
            description: "Bad Request: user not found".to_string()
        }
    );
}

#[tokio::test]
async fn forbidden_maps_to_unauthorized() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(PATH);
            then.status(403).json_body(json!({
                "ok": false,
                "error_code": 403,
                "description": "Forbidden: bot is not a member of the channel chat"
            }));
        })
        .await;

    let err = oracle(&server, Duration::from_secs(2))
        .check_status(-1, UserId(1))
        .await
        .unwrap_err();
    assert!(matches!(err, OracleError::Unauthorized(ref d) if d.contains("not a member")));
}

#[tokio::test]
async fn garbage_body_is_a_decode_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(PATH);
            then.status(200).body("<html>bad gateway</html>");
        })
        .await;

    let err = oracle(&server, Duration::from_secs(2))
        .check_status(-1, UserId(1))
        .await
        .unwrap_err();
    assert!(matches!(err, OracleError::Decode(_)), "{err:?}");
}

#[tokio::test]
async fn slow_upstream_times_out() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(PATH);
            then.status(200)
                .delay(Duration::from_millis(1_500))
                .json_body(json!({"ok": true, "result": {"status": "member"}}));
        })
        .await;

    let err = oracle(&server, Duration::from_millis(200))
        .check_status(-1, UserId(1))
        .await
        .unwrap_err();
    assert_eq!(err, OracleError::Timeout);
}

#[tokio::test]
async fn errors_never_contain_the_token() {
    // Nothing listens on port 9; the connect error must not echo the URL.
    let oracle = TelegramMembershipOracle::new(
        "123456:SECRETPART".to_string(),
        "http://127.0.0.1:9".to_string(),
        Duration::from_millis(500),
    )
    .unwrap();

    let err = oracle.check_status(-1, UserId(1)).await.unwrap_err();
    assert!(!err.to_string().contains("SECRETPART"), "{err}");
    assert!(!format!("{oracle:?}").contains("SECRETPART"));
}
