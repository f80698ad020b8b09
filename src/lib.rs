//! # dot-http-check
//!
//! dot-http-check runs plain-text HTTP request specs against a live server and checks what comes
//! back. Specs use the same `.http` format as the IntelliJ HTTP client: requests separated by
//! `###`, an optional body, and an optional response handler.
//!
//! ### The request
//!
//! ```text,no_run
//! ### login
//! POST http://localhost:3000/login
//! Content-Type: application/json
//!
//! {
//!     "user": "admin"
//! }
//!
//! > {%
//!    client.global.set("token", response.body.token);
//! %}
//! ```
//!
//! The comment on the `###` line names the request that follows. `Host` may hold an absolute URL,
//! in which case targets such as `/items` are resolved against it.
//!
//! ### Checks
//!
//! A request may end with one of
//!
//! * `> STATUS 200`: the run stops if another status comes back
//! * `> {% ... %}`: an inline JavaScript response handler
//! * `> ./check.js`: a response handler read from a file
//!
//! and with a reference to an earlier (or later) request whose response must be the same:
//!
//! ```text,no_run
//! GET http://localhost:3000/v2/users
//!
//! <> users-v1
//! ```
//!
//! Handlers see `response` (`status`, `headers`, `body`, `contentType`) and `client`
//! (`global`, `test`, `assert`, `log`). Values put in `client.global` are visible to every later
//! handler of the same run. Header lookups ignore case, and `response.headers.valuesOf(name)`
//! lists every value of a repeated header.
//!
//! ### Bodies
//!
//! Body lines are sent joined together, `< ./file` includes a file, and a
//! `multipart/form-data` request lists its fields after `--<boundary>` lines.
//!
//! ### Options
//!
//! `// @no-redirect` and `// @no-cookie-jar` right before a request turn off redirect following
//! and the shared cookie jar for that request.

#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate pest_derive;

pub mod diff;
pub mod grammar;
pub mod http_client;
pub mod model;
pub mod output;
pub mod parser;
pub mod runner;
pub mod script_engine;

pub type Result<T> = anyhow::Result<T>;

pub use http_client::ClientConfig;
pub use model::{BodyPart, Failure, Header, Request, RequestOption, RequestTail, Response, ResponseHandler, Success};
pub use output::{Report, Sink};
pub use parser::{parse, SpecParser};
pub use runner::{run, RunOptions, Runner};
