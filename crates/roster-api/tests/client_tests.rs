// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use roster_api::Client;
use roster_app::{UserDirectory, UserId, UserUpdate};
use std::io::Read;
use std::thread;
use std::time::Duration;
use tiny_http::{Header, Method, Request, Response, Server};

fn start_server() -> Result<(Server, String)> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let addr = format!("http://{}/api", server.server_addr());
    Ok((server, addr))
}

fn json_response(status: u16, body: &str) -> Response<std::io::Cursor<Vec<u8>>> {
    Response::from_string(body)
        .with_status_code(status)
        .with_header(
            Header::from_bytes("Content-Type", "application/json")
                .expect("valid content type header"),
        )
}

fn header_value(request: &Request, name: &'static str) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|header| header.field.equiv(name))
        .map(|header| header.value.as_str().to_owned())
}

#[test]
fn unreachable_api_reports_network_error_with_base_url() {
    let client = Client::new("http://127.0.0.1:1/api", "k", Duration::from_millis(50))
        .expect("client should initialize");

    let error = client
        .search_users(None)
        .expect_err("search should fail for unreachable endpoint");
    assert_eq!(
        error.message,
        "Network error. Please check your connection and ensure the API is reachable at http://127.0.0.1:1/api."
    );
    assert_eq!(error.status, None);
}

#[test]
fn search_sends_api_key_and_trimmed_name() -> Result<()> {
    let (server, addr) = start_server()?;

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        assert_eq!(request.method(), &Method::Get);
        assert_eq!(request.url(), "/api/users/search?name=ali");
        assert_eq!(header_value(&request, "x-api-key").as_deref(), Some("secret"));
        let body = r#"[{"id":7,"username":"alice","email":"alice@example.com","birthdate":"1990-05-02T00:00:00.000Z"}]"#;
        request
            .respond(json_response(200, body))
            .expect("response should succeed");
    });

    let client = Client::new(&addr, "secret", Duration::from_secs(1))?;
    let users = client.search_users(Some(" ali "))?;
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].id, UserId::new(7));
    assert_eq!(users[0].birthdate_day(), "1990-05-02");

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn enveloped_and_unexpected_payloads() -> Result<()> {
    let (server, addr) = start_server()?;

    let handle = thread::spawn(move || {
        let bodies = [
            r#"{"data":[{"id":1,"username":"a","email":"a@x.io","birthdate":"2000-01-01"}]}"#,
            r#"{"users":"unexpected"}"#,
        ];
        for body in bodies {
            let request = server.recv().expect("request expected");
            assert_eq!(request.url(), "/api/users/search");
            request
                .respond(json_response(200, body))
                .expect("response should succeed");
        }
    });

    let client = Client::new(&addr, "k", Duration::from_secs(1))?;
    assert_eq!(client.search_users(None)?.len(), 1);
    assert!(client.search_users(Some("   "))?.is_empty());

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn batch_update_posts_json_array() -> Result<()> {
    let (server, addr) = start_server()?;

    let handle = thread::spawn(move || {
        let mut request = server.recv().expect("request expected");
        assert_eq!(request.method(), &Method::Post);
        assert_eq!(request.url(), "/api/users/update");
        assert_eq!(
            header_value(&request, "Content-Type").as_deref(),
            Some("application/json")
        );
        let mut body = String::new();
        request
            .as_reader()
            .read_to_string(&mut body)
            .expect("read request body");
        let parsed: serde_json::Value = serde_json::from_str(&body).expect("json body");
        assert_eq!(parsed[0]["id"], 3);
        assert_eq!(parsed[0]["username"], "caroline");
        assert!(parsed[1].get("id").is_none());

        let reply = r#"[{"id":3,"username":"caroline","email":"c@x.io","birthdate":"1985-01-20"},{"id":11,"username":"zed","email":"z@x.io","birthdate":"2000-01-01"}]"#;
        request
            .respond(json_response(200, reply))
            .expect("response should succeed");
    });

    let client = Client::new(&addr, "k", Duration::from_secs(1))?;
    let batch = vec![
        UserUpdate {
            id: Some(UserId::new(3)),
            username: Some("caroline".to_owned()),
            ..UserUpdate::default()
        },
        UserUpdate {
            username: Some("zed".to_owned()),
            ..UserUpdate::default()
        },
    ];
    let updated = client.update_users(&batch)?;
    assert_eq!(updated.len(), 2);
    assert_eq!(updated[1].id, UserId::new(11));

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn error_statuses_become_readable_messages() -> Result<()> {
    let (server, addr) = start_server()?;

    let handle = thread::spawn(move || {
        let replies = [
            (403, r#"{"message":"nope"}"#),
            (422, r#"{"message":"[0].email must be a valid email"}"#),
            (418, ""),
        ];
        for (status, body) in replies {
            let request = server.recv().expect("request expected");
            request
                .respond(json_response(status, body))
                .expect("response should succeed");
        }
    });

    let client = Client::new(&addr, "wrong", Duration::from_secs(1))?;

    let forbidden = client.search_users(None).expect_err("403 expected");
    assert_eq!(forbidden.message, "Access forbidden. Invalid API key.");
    assert_eq!(forbidden.status, Some(403));

    let invalid = client
        .update_user(&UserUpdate::default())
        .expect_err("422 expected");
    assert_eq!(invalid.message, "[0].email must be a valid email");

    let teapot = client.search_users(None).expect_err("418 expected");
    assert_eq!(teapot.message, "HTTP 418: I'm a teapot");

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn truncated_success_body_reports_read_failure() -> Result<()> {
    let (server, addr) = start_server()?;

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        let body = br#"[{"id":1"#.to_vec();
        let response = Response::new(
            tiny_http::StatusCode(200),
            vec![
                Header::from_bytes("Content-Type", "application/json")
                    .expect("valid content type header"),
            ],
            std::io::Cursor::new(body),
            Some(4096),
            None,
        );
        let _ = request.respond(response);
    });

    let client = Client::new(&addr, "k", Duration::from_millis(500))?;
    let error = client
        .search_users(None)
        .expect_err("short body should fail");
    assert!(
        error.message.starts_with("Failed to read response from server:"),
        "unexpected message: {}",
        error.message
    );
    assert_eq!(error.status, None);

    handle.join().expect("server thread should join");
    Ok(())
}
