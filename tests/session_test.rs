//! Session handshake and response-framing tests against an in-process
//! mock ServerQuery server.

mod common;

use common::{ok, server_error, short_timeout, MockServer, CLOSE, HANG};
use std::collections::HashMap;
use std::time::Duration;
use teamspeak_exporter::error::QueryError;
use teamspeak_exporter::query::QuerySession;

fn script(entries: &[(&str, String)]) -> HashMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[tokio::test]
async fn test_connect_logs_in_and_executes() {
    let server = MockServer::spawn(script(&[(
        "whoami",
        ok("virtualserver_status=online client_nickname=serveradmin"),
    )]))
    .await;

    let mut session = QuerySession::connect(&server.target(), short_timeout())
        .await
        .expect("connect failed");

    let body = session.execute("whoami").await.expect("execute failed");
    assert_eq!(body, "virtualserver_status=online client_nickname=serveradmin");
}

#[tokio::test]
async fn test_rejected_login_fails_connect() {
    let server = MockServer::spawn(script(&[(
        "login serveradmin secret",
        server_error(520, "invalid\\sloginname\\sor\\spassword"),
    )]))
    .await;

    let err = QuerySession::connect(&server.target(), short_timeout())
        .await
        .expect_err("connect should fail");
    match err {
        QueryError::Server { id, message } => {
            assert_eq!(id, 520);
            assert_eq!(message, "invalid loginname or password");
        }
        other => panic!("expected server error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_multi_line_body_is_joined() {
    let server = MockServer::spawn(script(&[("channellist", ok("cid=1 channel_name=Lobby\ncid=2 channel_name=AFK"))])).await;

    let mut session = QuerySession::connect(&server.target(), short_timeout())
        .await
        .unwrap();
    let body = session.execute("channellist").await.unwrap();
    assert_eq!(body, "cid=1 channel_name=Lobby\ncid=2 channel_name=AFK");
}

#[tokio::test]
async fn test_empty_body_terminator_is_success() {
    let server = MockServer::spawn(script(&[("use 1", ok(""))])).await;

    let mut session = QuerySession::connect(&server.target(), short_timeout())
        .await
        .unwrap();
    let body = session.execute("use 1").await.unwrap();
    assert_eq!(body, "");
}

#[tokio::test]
async fn test_success_terminator_returns_accumulated_body() {
    let server =
        MockServer::spawn(script(&[("serverinfo", "a=1 b=2\nerror id=0 msg=ok\n".to_string())]))
            .await;

    let mut session = QuerySession::connect(&server.target(), short_timeout())
        .await
        .unwrap();
    // The terminator line itself never reaches the body.
    assert_eq!(session.execute("serverinfo").await.unwrap(), "a=1 b=2");
}

#[tokio::test]
async fn test_nonzero_terminator_is_protocol_error() {
    let server = MockServer::spawn(script(&[(
        "use 99",
        server_error(1281, "invalid\\sserverID"),
    )]))
    .await;

    let mut session = QuerySession::connect(&server.target(), short_timeout())
        .await
        .unwrap();
    let err = session.execute("use 99").await.expect_err("should fail");
    assert!(err.is_server_error());
    match err {
        QueryError::Server { id, message } => {
            assert_eq!(id, 1281);
            assert_eq!(message, "invalid serverID");
        }
        other => panic!("expected server error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_body_before_error_terminator_is_discarded() {
    let server = MockServer::spawn(script(&[(
        "serverinfo",
        format!("partial=1\n{}", server_error(2568, "insufficient\\sclient\\spermissions")),
    )]))
    .await;

    let mut session = QuerySession::connect(&server.target(), short_timeout())
        .await
        .unwrap();
    let err = session.execute("serverinfo").await.expect_err("should fail");
    assert!(matches!(err, QueryError::Server { id: 2568, .. }));
}

#[tokio::test]
async fn test_closed_connection_is_io_error() {
    let server = MockServer::spawn(script(&[("serverlist", CLOSE.to_string())])).await;

    let mut session = QuerySession::connect(&server.target(), short_timeout())
        .await
        .unwrap();
    let err = session.execute("serverlist").await.expect_err("should fail");
    assert!(!err.is_server_error());
    assert!(matches!(err, QueryError::Io(_)));
}

#[tokio::test]
async fn test_read_deadline_surfaces_as_timed_out_io_error() {
    let server = MockServer::spawn(script(&[("serverlist", HANG.to_string())])).await;

    let mut session = QuerySession::connect(&server.target(), Duration::from_millis(300))
        .await
        .unwrap();
    let err = session.execute("serverlist").await.expect_err("should fail");
    match err {
        QueryError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::TimedOut),
        other => panic!("expected i/o error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_tolerates_single_line_greeting() {
    let server = MockServer::spawn_with_banner(
        script(&[("whoami", ok("client_nickname=serveradmin"))]),
        "TS3\n",
    )
    .await;

    let mut session = QuerySession::connect(&server.target(), short_timeout())
        .await
        .unwrap();
    assert_eq!(
        session.execute("whoami").await.unwrap(),
        "client_nickname=serveradmin"
    );
}

#[tokio::test]
async fn test_tolerates_missing_greeting() {
    let server = MockServer::spawn_with_banner(
        script(&[("whoami", ok("client_nickname=serveradmin"))]),
        "",
    )
    .await;

    let mut session = QuerySession::connect(&server.target(), short_timeout())
        .await
        .unwrap();
    assert_eq!(
        session.execute("whoami").await.unwrap(),
        "client_nickname=serveradmin"
    );
}
