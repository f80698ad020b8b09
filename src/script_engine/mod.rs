use crate::model::{header_param, Response};
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[cfg(feature = "boa")]
pub mod boa;


/// Defines `client` on top of a `_snapshot` object holding the globals.
pub const INIT_SCRIPT: &str = include_str!("init.js");

pub struct Script<'a> {
    pub src: &'a str,
}

impl<'a> Script<'a> {
    pub fn internal_script(src: &'a str) -> Script<'a> {
        Script { src }
    }
}

/// Named values that outlive a single handler run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Globals(Map<String, Value>);

impl Globals {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Setting `null` is the same as clearing the name.
    pub fn set(&mut self, name: &str, value: Value) {
        if value.is_null() {
            self.0.remove(name);
        } else {
            self.0.insert(name.to_string(), value);
        }
    }

    pub fn clear(&mut self, name: &str) {
        self.0.remove(name);
    }

    pub fn clear_all(&mut self) {
        self.0.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Reads the store back out of a script's JSON snapshot.
    pub fn from_snapshot(snapshot: &str) -> Result<Globals> {
        let values: Map<String, Value> = serde_json::from_str(snapshot)?;
        Ok(Globals(
            values.into_iter().filter(|(_, value)| !value.is_null()).collect(),
        ))
    }
}

/// The `response` object handed to scripts.
#[derive(Debug, Serialize)]
pub struct ScriptResponse {
    pub status: u16,
    pub headers: Map<String, Value>,
    pub body: Value,
    #[serde(rename = "contentType")]
    pub content_type: ContentType,
}

#[derive(Debug, Serialize)]
pub struct ContentType {
    #[serde(rename = "mimeType")]
    pub mime_type: Option<String>,
    pub charset: Option<String>,
}

impl From<&Response> for ScriptResponse {
    fn from(response: &Response) -> Self {
        let mut headers = Map::new();
        for (name, value) in &response.headers {
            let joined = match headers.get(name.as_str()).and_then(Value::as_str) {
                Some(previous) => format!("{}, {}", previous, value),
                None => value.clone(),
            };
            headers.insert(name.clone(), Value::String(joined));
        }

        ScriptResponse {
            status: response.status_code,
            headers,
            body: response.json().unwrap_or(Value::Null),
            content_type: ContentType::from(response.content_type()),
        }
    }
}

impl From<Option<&str>> for ContentType {
    fn from(header: Option<&str>) -> Self {
        let header = match header {
            Some(header) => header,
            None => {
                return ContentType {
                    mime_type: None,
                    charset: None,
                }
            }
        };
        let mime_type = header
            .split(';')
            .map(str::trim)
            .filter(|part| {
                !part
                    .split('=')
                    .next()
                    .map_or(false, |key| key.trim().eq_ignore_ascii_case("charset"))
            })
            .collect::<Vec<_>>()
            .join("; ");
        ContentType {
            mime_type: Some(mime_type),
            charset: header_param(header, "charset"),
        }
    }
}

/// Source that binds `response` in a sandbox.
///
/// `response.headers` answers to any casing of a header name, and carries
/// `valueOf(name)` and `valuesOf(name)` for repeated headers.
pub fn response_script(response: &Response) -> Result<String> {
    let mut values: Map<String, Value> = Map::new();
    for (name, value) in &response.headers {
        let entry = values
            .entry(name.to_lowercase())
            .or_insert_with(|| Value::Array(vec![]));
        if let Value::Array(list) = entry {
            list.push(Value::String(value.clone()));
        }
    }
    Ok(format!(
        "var response = {};\nresponse.headers = _caseless(response.headers, {});",
        serde_json::to_string(&ScriptResponse::from(response))?,
        serde_json::to_string(&values)?
    ))
}

/// Source that seeds the global store of a sandbox.
pub fn globals_script(globals: &Globals) -> Result<String> {
    Ok(format!("var _snapshot = {};", serde_json::to_string(globals)?))
}

pub trait ScriptEngine {
    /// Runs `script` in a fresh sandbox seeded with `globals`, with
    /// `response` bound when given. The store is copied back into
    /// `globals` even when the script throws.
    fn execute_script(
        &mut self,
        script: &Script,
        response: Option<&Response>,
        globals: &mut Globals,
    ) -> Result<String>;

    /// Runs a response handler. Errors carry the script's own message.
    fn handle(&mut self, script: &Script, response: &Response, globals: &mut Globals) -> Result<()> {
        self.execute_script(script, Some(response), globals)
            .map(|_| ())
    }
}

#[cfg(feature = "boa")]
pub fn create_script_engine() -> Result<Box<dyn ScriptEngine>> {
    Ok(Box::new(boa::BoaScriptEngine::new()))
}

#[cfg(not(feature = "boa"))]
pub fn create_script_engine() -> Result<Box<dyn ScriptEngine>> {
    Err(anyhow!(
        "No script engine compiled in, rebuild with the `boa` feature to run response handlers"
    ))
}
