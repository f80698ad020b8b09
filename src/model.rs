use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use serde_json::Value;
use url::Url;

/// A `###` line. Its trimmed comment, when present, identifies the request
/// that follows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Separator {
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub field: String,
    pub value: String,
}

impl Header {
    pub fn new(field: &str, value: &str) -> Header {
        Header {
            field: field.to_string(),
            value: value.to_string(),
        }
    }
}

/// Per-request switches written as `// @name` or `# @name` comment lines
/// right before a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOption {
    NoRedirect,
    NoCookieJar,
    Other(String),
}

impl RequestOption {
    /// Reads an option out of a comment's text, if it holds one.
    pub fn from_comment(text: &str) -> Option<RequestOption> {
        let name = text.trim().strip_prefix('@')?;
        let name = name.split_whitespace().next()?;
        Some(match name {
            "no-redirect" => RequestOption::NoRedirect,
            "no-cookie-jar" => RequestOption::NoCookieJar,
            other => RequestOption::Other(other.to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Option<String>,
    pub target: String,
    pub headers: Vec<Header>,
    pub options: Vec<RequestOption>,
    pub separators: Vec<Separator>,
    /// Tail text as it appeared in the document.
    pub tail_raw: Option<String>,
    /// Parsed tail. Filled in by the second parsing stage.
    pub tail: Option<RequestTail>,
}

impl Request {
    pub fn new(method: Option<&str>, target: &str) -> Request {
        Request {
            method: method.map(str::to_string),
            target: target.to_string(),
            headers: vec![],
            options: vec![],
            separators: vec![],
            tail_raw: None,
            tail: None,
        }
    }

    /// The comment of the last separator before this request.
    pub fn id(&self) -> Option<&str> {
        self.separators
            .last()
            .and_then(|separator| separator.comment.as_deref())
    }

    pub fn method(&self) -> &str {
        self.method.as_deref().unwrap_or("GET")
    }

    /// First header with the given name, compared case-insensitively.
    pub fn header(&self, field: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|header| header.field.eq_ignore_ascii_case(field))
            .map(|header| header.value.as_str())
    }

    pub fn has_option(&self, option: &RequestOption) -> bool {
        self.options.contains(option)
    }

    /// The absolute URL this request is sent to.
    ///
    /// When the `Host` header holds an absolute URL, the target is resolved
    /// against it. Otherwise the target is used as written.
    pub fn resolved_target(&self) -> String {
        self.host_base()
            .and_then(|base| base.join(&self.target).ok())
            .map(|url| url.to_string())
            .unwrap_or_else(|| self.target.clone())
    }

    pub(crate) fn host_base(&self) -> Option<Url> {
        self.header("Host")
            .and_then(|host| Url::parse(host).ok())
            .filter(|url| !url.cannot_be_a_base())
    }

    /// Host part of the resolved target.
    pub fn host(&self) -> Option<String> {
        Url::parse(&self.resolved_target())
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
    }

    /// `charset` parameter of the `Content-Type` header.
    pub fn charset(&self) -> Option<String> {
        self.content_type_param("charset")
    }

    /// `boundary` parameter of the `Content-Type` header.
    pub fn multipart_boundary(&self) -> Option<String> {
        self.content_type_param("boundary")
    }

    fn content_type_param(&self, name: &str) -> Option<String> {
        header_param(self.header("Content-Type")?, name)
    }

    pub fn message_body(&self) -> Option<&[BodyPart]> {
        self.tail.as_ref()?.message_body.as_deref()
    }

    pub fn response_handler(&self) -> Option<&ResponseHandler> {
        self.tail.as_ref()?.response_handler.as_ref()
    }

    pub fn response_ref(&self) -> Option<&str> {
        self.tail.as_ref()?.response_ref.as_deref()
    }
}

impl Display for Request {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method(), self.resolved_target())
    }
}

/// Looks up a `;`-separated parameter of a header value. Parameter names are
/// compared case-insensitively and surrounding quotes are dropped.
pub fn header_param(value: &str, name: &str) -> Option<String> {
    value.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case(name) {
            Some(value.trim().trim_matches('"').to_string())
        } else {
            None
        }
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequestTail {
    pub message_body: Option<Vec<BodyPart>>,
    pub response_handler: Option<ResponseHandler>,
    /// Id of an earlier request whose response this one must match.
    pub response_ref: Option<String>,
}

/// One piece of a request body. A body is either all `MultipartField`s or
/// has none of them, and a field only ever holds the other two kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyPart {
    ContentLine(String),
    InputFileRef(String),
    MultipartField(MultipartField),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MultipartField {
    pub headers: Vec<Header>,
    pub parts: Vec<BodyPart>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseHandler {
    Script(String),
    ScriptPath(String),
    ExpectedStatus(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Http09,
    Http2,
    Http10,
    Http11,
    Http3,
}

impl Display for Version {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let version = match *self {
            Version::Http09 => "HTTP/0.9",
            Version::Http2 => "HTTP/2.0",
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
            Version::Http3 => "HTTP/3.0",
        };
        f.write_str(version)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub version: Version,
    pub status_code: u16,
    pub status: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    /// Values of every header with the given name, in arrival order.
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header_values("Content-Type").next()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// The body as JSON, if it is JSON.
    pub fn json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Success {
    pub request: Request,
    /// Time until the response head arrived.
    pub latency: Duration,
    /// Time until the whole response was read.
    pub response_time: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub request: Request,
    pub error: String,
    pub response_time: Option<Duration>,
}
