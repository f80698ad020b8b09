use super::{fold_header_value, Error};
use crate::grammar::{self, TAIL_ENTRY};
use crate::model::{BodyPart, Header, MultipartField, RequestTail, ResponseHandler};
use pest::iterators::Pair;
use pest_vm::Vm;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::debug;

type TailPair<'i> = Pair<'i, &'i str>;

/// Parses request tails, compiling one grammar per multipart boundary.
#[derive(Default)]
pub struct TailParser {
    grammars: HashMap<Option<String>, Vm>,
}

impl TailParser {
    pub fn new() -> TailParser {
        TailParser::default()
    }

    pub fn parse(&mut self, source: &str, boundary: Option<&str>) -> Result<RequestTail, Error> {
        let vm = match self.grammars.entry(boundary.map(str::to_string)) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                debug!("Compiling tail grammar for boundary {:?}", boundary);
                entry.insert(grammar::compile(&grammar::tail_grammar(boundary))?)
            }
        };
        let mut pairs = vm.parse(TAIL_ENTRY, source)?;
        let pair = pairs
            .next()
            .ok_or_else(|| Error::invalid_pair(TAIL_ENTRY, "nothing"))?;
        request_tail(pair)
    }

    /// Number of grammars compiled so far.
    pub fn compiled(&self) -> usize {
        self.grammars.len()
    }
}

fn request_tail(pair: TailPair<'_>) -> Result<RequestTail, Error> {
    let mut tail = RequestTail::default();
    for pair in pair.into_inner() {
        match pair.as_rule() {
            "message_body" => tail.message_body = Some(message_body(pair)?),
            "response_handler" => tail.response_handler = Some(response_handler(pair)?),
            "response_ref" => tail.response_ref = Some(file_path(pair)?),
            "EOI" => {}
            rule => return Err(Error::invalid_pair(TAIL_ENTRY, rule)),
        }
    }
    Ok(tail)
}

fn message_body(pair: TailPair<'_>) -> Result<Vec<BodyPart>, Error> {
    let mut parts = vec![];
    for pair in pair.into_inner() {
        match pair.as_rule() {
            "messages" => parts.extend(messages(pair)?),
            "multipart_form_data" => {
                for field in pair.into_inner() {
                    match field.as_rule() {
                        "multipart_field" => {
                            parts.push(BodyPart::MultipartField(multipart_field(field)?))
                        }
                        "BOUNDARY" => {}
                        rule => return Err(Error::invalid_pair("multipart_form_data", rule)),
                    }
                }
            }
            rule => return Err(Error::invalid_pair("message_body", rule)),
        }
    }
    Ok(parts)
}

fn messages(pair: TailPair<'_>) -> Result<Vec<BodyPart>, Error> {
    pair.into_inner()
        .map(|pair| match pair.as_rule() {
            "content_line" => pair
                .into_inner()
                .find(|pair| pair.as_rule() == "CONTENT_LINE")
                .map(|line| BodyPart::ContentLine(line.as_str().to_string()))
                .ok_or_else(|| Error::invalid_pair("CONTENT_LINE", "nothing")),
            "input_file_ref" => file_path(pair).map(BodyPart::InputFileRef),
            rule => Err(Error::invalid_pair("messages", rule)),
        })
        .collect()
}

fn multipart_field(pair: TailPair<'_>) -> Result<MultipartField, Error> {
    let mut field = MultipartField::default();
    for pair in pair.into_inner() {
        match pair.as_rule() {
            "headers" => field.headers = headers(pair)?,
            "messages" => field.parts = messages(pair)?,
            "BOUNDARY" => {}
            rule => return Err(Error::invalid_pair("multipart_field", rule)),
        }
    }
    Ok(field)
}

fn headers(pair: TailPair<'_>) -> Result<Vec<Header>, Error> {
    pair.into_inner()
        .filter(|pair| pair.as_rule() == "header_field")
        .map(|pair| {
            let mut field = None;
            let mut value = String::new();
            for pair in pair.into_inner() {
                match pair.as_rule() {
                    "field_name" => field = Some(pair.as_str().to_string()),
                    "field_value" => value = fold_header_value(pair.as_str()),
                    rule => return Err(Error::invalid_pair("header_field", rule)),
                }
            }
            let field = field.ok_or_else(|| Error::invalid_pair("field_name", "nothing"))?;
            Ok(Header { field, value })
        })
        .collect()
}

fn response_handler(pair: TailPair<'_>) -> Result<ResponseHandler, Error> {
    let handler = pair
        .into_inner()
        .next()
        .ok_or_else(|| Error::invalid_pair("response_handler", "nothing"))?;
    match handler.as_rule() {
        "expected_status" => {
            let code = inner_str(handler, "status_code")?;
            code.parse::<u16>()
                .map(ResponseHandler::ExpectedStatus)
                .map_err(|_| Error::tail(format!("Invalid status code: {}", code)))
        }
        "handler_script" => {
            inner_str(handler, "HANDLER_SCRIPT").map(|script| ResponseHandler::Script(script.trim().to_string()))
        }
        "handler_path" => file_path(handler).map(ResponseHandler::ScriptPath),
        rule => Err(Error::invalid_pair("response_handler", rule)),
    }
}

fn file_path(pair: TailPair<'_>) -> Result<String, Error> {
    inner_str(pair, "file_path").map(|path| path.trim().to_string())
}

fn inner_str<'i>(pair: TailPair<'i>, rule: &str) -> Result<&'i str, Error> {
    let parent = pair.as_rule();
    pair.into_inner()
        .find(|pair| pair.as_rule() == rule)
        .map(|pair| pair.as_str())
        .ok_or_else(|| Error::invalid_pair(rule, parent))
}
