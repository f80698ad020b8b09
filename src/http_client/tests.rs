use super::reqwest::ReqwestHttpClient;
use super::*;
use httpmock::MockServer;

fn get(url: String) -> OutgoingRequest {
    OutgoingRequest {
        method: "GET".to_string(),
        url,
        headers: vec![],
        body: None,
        follow_redirects: true,
        use_cookie_jar: true,
    }
}

#[test]
fn test_execute() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(httpmock::Method::POST)
            .path("/defaults")
            .header("x-token", "second")
            .body("payload");
        then.status(201).header("x-reply", "yes").body("done");
    });

    let client = ReqwestHttpClient::create(ClientConfig::default()).unwrap();
    let request = OutgoingRequest {
        method: "POST".to_string(),
        headers: vec![
            ("X-Token".to_string(), "first".to_string()),
            ("X-Token".to_string(), "second".to_string()),
        ],
        body: Some(b"payload".to_vec()),
        ..get(server.url("/defaults"))
    };
    let exchange = client.execute(&request).unwrap();

    mock.assert();
    let response = exchange.response;
    assert_eq!(response.status_code, 201);
    assert_eq!(response.status, "201 Created");
    assert_eq!(response.version.to_string(), "HTTP/1.1");
    assert_eq!(response.header_values("X-Reply").collect::<Vec<_>>(), vec!["yes"]);
    assert_eq!(response.body, b"done");
}

#[test]
fn redirects_follow_policy() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.path("/old");
        then.status(301).header("location", "/new");
    });
    let target = server.mock(|when, then| {
        when.path("/new");
        then.status(200);
    });

    let client = ReqwestHttpClient::create(ClientConfig::default()).unwrap();

    let followed = client.execute(&get(server.url("/old"))).unwrap();
    assert_eq!(followed.response.status_code, 200);
    assert_eq!(target.hits(), 1);

    let kept = client
        .execute(&OutgoingRequest {
            follow_redirects: false,
            ..get(server.url("/old"))
        })
        .unwrap();
    assert_eq!(kept.response.status_code, 301);
    assert_eq!(target.hits(), 1);
}

#[test]
fn cookies_are_shared_unless_disabled() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.path("/login");
        then.status(200).header("set-cookie", "session=abc; Path=/");
    });
    let with_cookie = server.mock(|when, then| {
        when.path("/me").cookie("session", "abc");
        then.status(200);
    });

    let client = ReqwestHttpClient::create(ClientConfig::default()).unwrap();
    client.execute(&get(server.url("/login"))).unwrap();

    let without = client
        .execute(&OutgoingRequest {
            use_cookie_jar: false,
            ..get(server.url("/me"))
        })
        .unwrap();
    assert_eq!(without.response.status_code, 404);

    let with = client.execute(&get(server.url("/me"))).unwrap();
    assert_eq!(with.response.status_code, 200);
    assert_eq!(with_cookie.hits(), 1);
}

#[test]
fn unreachable_host_is_an_error() {
    let client = ReqwestHttpClient::create(ClientConfig::default()).unwrap();

    assert!(client.execute(&get("http://127.0.0.1:1/".to_string())).is_err());
}
