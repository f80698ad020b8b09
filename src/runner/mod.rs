use crate::diff::diff;
use crate::http_client::reqwest::ReqwestHttpClient;
use crate::http_client::{ClientConfig, Exchange, HttpClient, OutgoingRequest};
use crate::model::{Failure, Request, RequestOption, Response, ResponseHandler, Success};
use crate::output::Sink;
use crate::script_engine::{create_script_engine, Globals, Script, ScriptEngine};
use crate::Result;
use std::collections::HashMap;
use std::fs;
use std::mem;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub use payload::{encoding, payload};

mod payload;


#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Skip headers when comparing responses.
    pub ignore_headers: bool,
    /// Directory that relative file references are resolved against.
    pub base_dir: PathBuf,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            ignore_headers: false,
            base_dir: PathBuf::from("."),
        }
    }
}

#[derive(Default)]
pub struct Runner {
    config: ClientConfig,
}

impl Runner {
    pub fn new(config: ClientConfig) -> Runner {
        Runner { config }
    }

    /// Executes `requests` in order with a fresh client, cookie jar and
    /// global store, reporting every outcome to `sink`.
    pub fn run<S: Sink>(&self, requests: &[Request], options: &RunOptions, sink: S) -> Result<S> {
        let client = ReqwestHttpClient::create(self.config.clone())?;
        Ok(run_with(&client, requests, options, sink))
    }
}

/// Runs `requests` with the default client configuration.
pub fn run<S: Sink>(requests: &[Request], options: &RunOptions, sink: S) -> Result<S> {
    Runner::default().run(requests, options, sink)
}

/// Runs `requests` through `client`.
///
/// A failed status assertion stops the run, but comparisons collected up
/// to that point are still carried out.
pub fn run_with<C: HttpClient, S: Sink>(
    client: &C,
    requests: &[Request],
    options: &RunOptions,
    mut sink: S,
) -> S {
    let mut run = Run::new(client, options);
    for request in requests {
        if run.execute(request, &mut sink).is_break() {
            break;
        }
    }
    run.compare(&mut sink);
    sink
}

struct Comparison<'a> {
    request: &'a Request,
    response: Response,
    response_time: Duration,
    request_id: String,
}

struct Run<'a, C> {
    client: &'a C,
    options: &'a RunOptions,
    engine: Option<Box<dyn ScriptEngine>>,
    scripts: HashMap<PathBuf, String>,
    globals: Globals,
    responses: HashMap<String, Response>,
    ids: Vec<String>,
    comparisons: Vec<Comparison<'a>>,
}

impl<'a, C: HttpClient> Run<'a, C> {
    fn new(client: &'a C, options: &'a RunOptions) -> Self {
        Run {
            client,
            options,
            engine: None,
            scripts: HashMap::new(),
            globals: Globals::default(),
            responses: HashMap::new(),
            ids: vec![],
            comparisons: vec![],
        }
    }

    fn execute<S: Sink>(&mut self, request: &'a Request, sink: &mut S) -> ControlFlow<()> {
        debug!("Executing {}", request);
        let outgoing = match self.outgoing(request) {
            Ok(outgoing) => outgoing,
            Err(e) => {
                sink.failure(failure(
                    request,
                    format!("Failed building request body: {:#}", e),
                    None,
                ));
                return ControlFlow::Continue(());
            }
        };

        let started = Instant::now();
        let Exchange { response, latency } = match self.client.execute(&outgoing) {
            Ok(exchange) => exchange,
            Err(e) => {
                sink.failure(failure(
                    request,
                    format!("Error issuing the request, root cause: {:#}", e),
                    None,
                ));
                return ControlFlow::Continue(());
            }
        };
        let response_time = started.elapsed();
        debug!("{} returned {} over {}", request, response.status, response.version);

        if let Some(id) = request.id() {
            if self.responses.insert(id.to_string(), response.clone()).is_none() {
                self.ids.push(id.to_string());
            }
        }

        let handled = match request.response_handler() {
            Some(ResponseHandler::ExpectedStatus(expected)) if *expected != response.status_code => {
                warn!("Stopping the run, {} returned {}", request, response.status_code);
                sink.failure(failure(
                    request,
                    format!(
                        "Expected status code {}, but got {}",
                        expected, response.status_code
                    ),
                    Some(response_time),
                ));
                return ControlFlow::Break(());
            }
            Some(ResponseHandler::Script(src)) => self.handle(src, &response),
            Some(ResponseHandler::ScriptPath(path)) => self
                .load_script(path)
                .and_then(|src| self.handle(&src, &response)),
            Some(ResponseHandler::ExpectedStatus(_)) | None => Ok(()),
        };

        if let Some(request_id) = request.response_ref() {
            self.comparisons.push(Comparison {
                request,
                response,
                response_time,
                request_id: request_id.to_string(),
            });
        }

        match handled {
            Ok(()) => sink.success(Success {
                request: request.clone(),
                latency,
                response_time,
            }),
            Err(e) => sink.failure(failure(request, e.to_string(), Some(response_time))),
        }
        ControlFlow::Continue(())
    }

    fn outgoing(&self, request: &Request) -> Result<OutgoingRequest> {
        let body = payload(request, &self.options.base_dir)?;
        // A Host holding a URL only serves to resolve the target.
        let forward_host = request.host_base().is_none();
        let headers = request
            .headers
            .iter()
            .filter(|header| forward_host || !header.field.eq_ignore_ascii_case("Host"))
            .map(|header| (header.field.clone(), header.value.clone()))
            .collect();

        Ok(OutgoingRequest {
            method: request.method().to_string(),
            url: request.resolved_target(),
            headers,
            body,
            follow_redirects: !request.has_option(&RequestOption::NoRedirect),
            use_cookie_jar: !request.has_option(&RequestOption::NoCookieJar),
        })
    }

    fn load_script(&mut self, path: &str) -> Result<String> {
        let path = self.options.base_dir.join(path);
        if let Some(src) = self.scripts.get(&path) {
            return Ok(src.clone());
        }
        let src = fs::read_to_string(&path).map_err(|e| {
            anyhow!(
                "Failed reading response handler script {}: {}",
                path.display(),
                e
            )
        })?;
        self.scripts.insert(path, src.clone());
        Ok(src)
    }

    fn handle(&mut self, src: &str, response: &Response) -> Result<()> {
        if self.engine.is_none() {
            self.engine = Some(create_script_engine()?);
        }
        let engine = self
            .engine
            .as_mut()
            .ok_or_else(|| anyhow!("No script engine available"))?;
        engine.handle(&Script::internal_script(src), response, &mut self.globals)
    }

    fn compare<S: Sink>(&mut self, sink: &mut S) {
        for comparison in mem::take(&mut self.comparisons) {
            let error = match self.responses.get(&comparison.request_id) {
                Some(other) => diff(&comparison.response, other, self.options.ignore_headers),
                None => Some(format!(
                    "Request with id \"{}\" not found. Defined requests: {:?}",
                    comparison.request_id, self.ids
                )),
            };
            if let Some(error) = error {
                sink.failure(failure(
                    comparison.request,
                    error,
                    Some(comparison.response_time),
                ));
            }
        }
    }
}

fn failure(request: &Request, error: String, response_time: Option<Duration>) -> Failure {
    Failure {
        request: request.clone(),
        error,
        response_time,
    }
}
