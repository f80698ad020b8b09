use crate::common::Workspace;
use dot_http_check::output::{logger::LoggerSink, write_records};
use dot_http_check::{parse, Report, RunOptions};
use httpmock::MockServer;

mod common;

fn run_spec(spec: &str, options: &RunOptions) -> Report {
    let requests = parse(spec).unwrap();
    dot_http_check::run(&requests, options, LoggerSink::new())
        .unwrap()
        .into_report()
}

fn errors(report: &Report) -> Vec<&str> {
    report.failures.iter().map(|f| f.error.as_str()).collect()
}

#[test]
fn identical_responses_match() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(httpmock::Method::GET).path("/v1/users");
        then.status(200)
            .header("date", "")
            .header("content-type", "application/json")
            .body(r#"{"users": ["a", "b"], "n": 1}"#);
    });
    server.mock(|when, then| {
        when.method(httpmock::Method::GET).path("/v2/users");
        then.status(200)
            .header("date", "")
            .header("content-type", "application/json")
            .body(r#"{"n": 1, "users": ["a", "b"]}"#);
    });

    let report = run_spec(
        &format!(
            "\
### first-id
GET {base}/v1/users

###
GET {base}/v2/users

<> first-id
",
            base = server.base_url()
        ),
        &RunOptions::default(),
    );

    assert!(report.failures.is_empty(), "{:?}", errors(&report));
    assert_eq!(report.successes.len(), 2);
}

#[test]
fn differing_body_fails_the_referring_request() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.path("/v1/users");
        then.status(200).header("date", "").body(r#"{"users": ["a"]}"#);
    });
    server.mock(|when, then| {
        when.path("/v2/users");
        then.status(200).header("date", "").body(r#"{"users": ["b"]}"#);
    });

    let report = run_spec(
        &format!(
            "\
### first-id
GET {base}/v1/users

###
GET {base}/v2/users

<> first-id
",
            base = server.base_url()
        ),
        &RunOptions::default(),
    );

    assert_eq!(errors(&report), vec!["Response body mismatch."]);
    assert!(report.failures[0].request.target.ends_with("/v2/users"));
}

#[test]
fn status_assertion_halts_the_run() {
    let server = MockServer::start();
    let first = server.mock(|when, then| {
        when.path("/moved");
        then.status(200);
    });
    let later = server.mock(|when, then| {
        when.path("/later");
        then.status(200);
    });

    let report = run_spec(
        &format!(
            "\
GET {base}/moved

> STATUS 301

###
GET {base}/later
",
            base = server.base_url()
        ),
        &RunOptions::default(),
    );

    first.assert();
    assert_eq!(later.hits(), 0);
    assert!(report.successes.is_empty());
    assert_eq!(errors(&report), vec!["Expected status code 301, but got 200"]);
}

#[test]
fn no_redirect_option_sees_the_redirect() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.path("/old");
        then.status(301).header("location", "/new");
    });
    let target = server.mock(|when, then| {
        when.path("/new");
        then.status(200);
    });

    let report = run_spec(
        &format!(
            "\
// @no-redirect
GET {base}/old

> STATUS 301
",
            base = server.base_url()
        ),
        &RunOptions::default(),
    );

    assert!(report.failures.is_empty(), "{:?}", errors(&report));
    assert_eq!(target.hits(), 0);
}

#[cfg(feature = "boa")]
#[test]
fn script_assertion_message_is_the_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.path("/missing");
        then.status(404);
    });

    let report = run_spec(
        &format!(
            "\
GET {base}/missing

> {{%
    client.assert(response.status === 200, \"bad status\");
%}}
",
            base = server.base_url()
        ),
        &RunOptions::default(),
    );

    assert_eq!(errors(&report), vec!["bad status"]);
}

#[cfg(feature = "boa")]
#[test]
fn handlers_read_headers_by_their_usual_names() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.path("/typed");
        then.status(200)
            .header("Content-Type", "application/json")
            .body("{}");
    });

    let report = run_spec(
        &format!(
            "\
GET {base}/typed

> {{%
    client.assert(response.headers[\"Content-Type\"] === \"application/json\", \"no content type\");
    client.assert(response.headers.valueOf(\"content-TYPE\") === \"application/json\", \"no valueOf\");
%}}
",
            base = server.base_url()
        ),
        &RunOptions::default(),
    );

    assert!(report.failures.is_empty(), "{:?}", errors(&report));
}

#[cfg(feature = "boa")]
#[test]
fn token_flows_into_later_handlers_and_cookies_are_kept() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(httpmock::Method::POST).path("/login");
        then.status(200)
            .header("set-cookie", "session=abc; Path=/")
            .header("content-type", "application/json")
            .body(r#"{"token": "t1"}"#);
    });
    server.mock(|when, then| {
        when.path("/me").cookie("session", "abc");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"token": "t1"}"#);
    });

    let report = run_spec(
        &format!(
            "\
POST {base}/login

> {{%
    client.global.set(\"token\", response.body.token);
%}}

###
GET {base}/me

> {{%
    client.test(\"same token\", function () {{
        client.assert(response.body.token === client.global.get(\"token\"), \"token differs\");
    }});
%}}
",
            base = server.base_url()
        ),
        &RunOptions::default(),
    );

    assert!(report.failures.is_empty(), "{:?}", errors(&report));
    assert_eq!(report.successes.len(), 2);
}

#[test]
fn multipart_upload_reaches_the_server() {
    let workspace = Workspace::new();
    workspace.create_file("data.json", r#"{"k": "v"}"#);
    let server = MockServer::start();
    let upload = server.mock(|when, then| {
        when.method(httpmock::Method::POST)
            .path("/upload")
            .header("content-type", "multipart/form-data; boundary=b0undary")
            .body(
                "--b0undary\r\n\
Content-Disposition: form-data; name=\"meta\"\r\n\
\r\n\
hello\r\n\
--b0undary\r\n\
Content-Disposition: form-data; name=\"data\"; filename=\"data.json\"\r\n\
Content-Type: application/json\r\n\
\r\n\
{\"k\": \"v\"}\r\n\
--b0undary--\r\n",
            );
        then.status(201);
    });

    let report = run_spec(
        &format!(
            "\
POST {base}/upload
Content-Type: multipart/form-data; boundary=b0undary

--b0undary
Content-Disposition: form-data; name=\"meta\"

hello
--b0undary
Content-Disposition: form-data; name=\"data\"; filename=\"data.json\"
Content-Type: application/json

< ./data.json
--b0undary--

> STATUS 201
",
            base = server.base_url()
        ),
        &RunOptions {
            base_dir: workspace.path().to_path_buf(),
            ..RunOptions::default()
        },
    );

    upload.assert();
    assert!(report.failures.is_empty(), "{:?}", errors(&report));
}

#[test]
fn unreachable_server_is_reported_and_the_run_continues() {
    let server = MockServer::start();
    let reached = server.mock(|when, then| {
        when.path("/up");
        then.status(200);
    });

    let report = run_spec(
        &format!(
            "GET http://127.0.0.1:1/down\n\n###\nGET {base}/up\n",
            base = server.base_url()
        ),
        &RunOptions::default(),
    );

    reached.assert();
    assert_eq!(report.successes.len(), 1);
    assert!(report.failures[0]
        .error
        .starts_with("Error issuing the request, root cause: "));
}

#[test]
fn report_lines() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.path("/ok");
        then.status(200);
    });

    let report = run_spec(
        &format!("GET {base}/ok\n\n> STATUS 200\n", base = server.base_url()),
        &RunOptions::default(),
    );
    let mut buffer = Vec::new();
    write_records(&mut buffer, &report).unwrap();

    let record: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
    assert_eq!(record["method"], "GET");
    assert_eq!(record["success"], true);
    assert_eq!(record["host"], "127.0.0.1");
    assert!(record["latency"].as_f64().unwrap() >= 0.0);
}
