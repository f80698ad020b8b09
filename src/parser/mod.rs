
mod tail;

pub use tail::TailParser;

use crate::model::*;
use crate::parser::ErrorKind::{Grammar, InvalidPair, Tail};
use pest::iterators::Pair;
use pest::Parser;
use std::convert::TryFrom;
use std::fmt;
use std::mem;
use tracing::debug;

#[derive(Parser)]
#[grammar = "grammar/shared.pest"]
#[grammar = "grammar/main.pest"]
struct DocumentParser;

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    Tail,
    Grammar,
    InvalidPair,
}

impl Error {
    fn invalid_pair(expected: &str, got: impl fmt::Debug) -> Error {
        Error {
            kind: InvalidPair,
            message: format!("Wrong pair. Expected: {}, Got: {:?}", expected, got),
        }
    }

    fn tail(message: String) -> Error {
        Error {
            kind: Tail,
            message,
        }
    }

    fn in_request(self, request: &Request) -> Error {
        Error {
            kind: self.kind,
            message: format!(
                "Failed parsing the tail of {}:\n{}",
                request.target, self.message
            ),
        }
    }
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<pest::error::Error<Rule>> for Error {
    fn from(e: pest::error::Error<Rule>) -> Self {
        Error {
            message: e.to_string(),
            kind: ErrorKind::Parse,
        }
    }
}

impl<'a> From<pest::error::Error<&'a str>> for Error {
    fn from(e: pest::error::Error<&'a str>) -> Self {
        Error::tail(e.to_string())
    }
}

impl From<Vec<pest::error::Error<pest_meta::parser::Rule>>> for Error {
    fn from(errors: Vec<pest::error::Error<pest_meta::parser::Rule>>) -> Self {
        Error {
            kind: Grammar,
            message: errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Two-stage parser for request spec documents.
///
/// The first stage splits the document into requests, the second parses
/// each request's tail with a grammar specialized for its multipart
/// boundary. Specialized grammars are cached, so reuse one parser when
/// parsing many documents.
#[derive(Default)]
pub struct SpecParser {
    tail: TailParser,
}

impl SpecParser {
    pub fn new() -> SpecParser {
        SpecParser::default()
    }

    pub fn parse(&mut self, source: &str) -> Result<Vec<Request>, Error> {
        let mut requests = parse_document(source)?;
        for request in &mut requests {
            let tail = match &request.tail_raw {
                Some(raw) => self
                    .tail
                    .parse(raw, request.multipart_boundary().as_deref())
                    .map_err(|e| e.in_request(request))?,
                None => RequestTail::default(),
            };
            request.tail = Some(tail);
        }
        debug!("Parsed {} requests", requests.len());
        Ok(requests)
    }
}

/// Parses a whole spec document.
pub fn parse(source: &str) -> Result<Vec<Request>, Error> {
    SpecParser::new().parse(source)
}

/// First stage only: requests keep their raw tail and `tail` stays unset.
pub fn parse_document(source: &str) -> Result<Vec<Request>, Error> {
    let mut source = source.to_string();
    if !source.ends_with('\n') {
        source.push('\n');
    }
    let file = DocumentParser::parse(Rule::requests_file, &source)?
        .next()
        .ok_or_else(|| Error::invalid_pair("requests_file", "nothing"))?;
    requests_file(file)
}

fn requests_file(pair: Pair<'_, Rule>) -> Result<Vec<Request>, Error> {
    let mut separators = vec![];
    let mut options = vec![];
    let mut requests = vec![];
    for pair in pair.into_inner() {
        match pair.as_rule() {
            Rule::request_separator => separators.push(Separator::try_from(pair)?),
            Rule::comment_line => options.extend(comment_option(pair)),
            Rule::request => {
                let mut request = Request::try_from(pair)?;
                request.separators = mem::take(&mut separators);
                request.options = mem::take(&mut options);
                requests.push(request);
            }
            Rule::EOI => {}
            rule => return Err(Error::invalid_pair("requests_file", rule)),
        }
    }
    Ok(requests)
}

fn comment_option(pair: Pair<'_, Rule>) -> Option<RequestOption> {
    pair.into_inner()
        .find(|pair| pair.as_rule() == Rule::comment_text)
        .and_then(|text| RequestOption::from_comment(text.as_str()))
}

impl TryFrom<Pair<'_, Rule>> for Separator {
    type Error = Error;

    fn try_from(pair: Pair<'_, Rule>) -> Result<Self, Self::Error> {
        match pair.as_rule() {
            Rule::request_separator => {
                let comment = pair
                    .into_inner()
                    .find(|pair| pair.as_rule() == Rule::separator_comment)
                    .map(|pair| pair.as_str().trim())
                    .filter(|comment| !comment.is_empty())
                    .map(str::to_string);
                Ok(Separator { comment })
            }
            rule => Err(Error::invalid_pair("request_separator", rule)),
        }
    }
}

impl TryFrom<Pair<'_, Rule>> for Header {
    type Error = Error;

    fn try_from(pair: Pair<'_, Rule>) -> Result<Self, Self::Error> {
        match pair.as_rule() {
            Rule::header_field => {
                let mut field = None;
                let mut value = String::new();
                for pair in pair.into_inner() {
                    match pair.as_rule() {
                        Rule::field_name => field = Some(pair.as_str().to_string()),
                        Rule::field_value => value = fold_header_value(pair.as_str()),
                        rule => return Err(Error::invalid_pair("header_field", rule)),
                    }
                }
                let field = field.ok_or_else(|| Error::invalid_pair("field_name", "nothing"))?;
                Ok(Header { field, value })
            }
            rule => Err(Error::invalid_pair("header_field", rule)),
        }
    }
}

fn headers(pair: Pair<'_, Rule>) -> Result<Vec<Header>, Error> {
    pair.into_inner()
        .filter(|pair| pair.as_rule() == Rule::header_field)
        .map(Header::try_from)
        .collect()
}

impl TryFrom<Pair<'_, Rule>> for Request {
    type Error = Error;

    fn try_from(pair: Pair<'_, Rule>) -> Result<Self, Self::Error> {
        match pair.as_rule() {
            Rule::request => {
                let mut request = Request::new(None, "");
                for pair in pair.into_inner() {
                    match pair.as_rule() {
                        Rule::request_line => {
                            for pair in pair.into_inner() {
                                match pair.as_rule() {
                                    Rule::method => request.method = Some(pair.as_str().to_string()),
                                    Rule::request_target => request.target = request_target(pair),
                                    Rule::http_version => {}
                                    rule => return Err(Error::invalid_pair("request_line", rule)),
                                }
                            }
                        }
                        Rule::headers => request.headers = headers(pair)?,
                        Rule::request_tail => request.tail_raw = Some(pair.as_str().to_string()),
                        rule => return Err(Error::invalid_pair("request", rule)),
                    }
                }
                Ok(request)
            }
            rule => Err(Error::invalid_pair("request", rule)),
        }
    }
}

/// Joins the tokens of a target. Queries and fragments may have been
/// wrapped onto several lines, all whitespace inside them is dropped.
fn request_target(pair: Pair<'_, Rule>) -> String {
    fn collect(pair: Pair<'_, Rule>, target: &mut String) {
        match pair.as_rule() {
            Rule::query | Rule::fragment => target.push_str(&strip_whitespace(pair.as_str())),
            Rule::request_target | Rule::absolute_form | Rule::origin_form => {
                for inner in pair.into_inner() {
                    collect(inner, target);
                }
            }
            _ => target.push_str(pair.as_str()),
        }
    }

    let mut target = String::new();
    collect(pair, &mut target);
    target
}

pub(crate) fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Unfolds a header value: continuation lines lose their leading whitespace
/// and are joined to the first line.
pub(crate) fn fold_header_value(raw: &str) -> String {
    raw.lines()
        .enumerate()
        .map(|(index, line)| if index == 0 { line } else { line.trim_start() })
        .collect::<String>()
        .trim()
        .to_string()
}
