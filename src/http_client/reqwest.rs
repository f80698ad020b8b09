use crate::http_client::{ClientConfig, Exchange, HttpClient, OutgoingRequest};
use crate::model::{Response, Version};
use crate::Result;
use reqwest::blocking::Client;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect::Policy;
use std::convert::{TryFrom, TryInto};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Blocking client set for one run.
///
/// Requests that keep cookies share one jar, requests marked
/// `@no-cookie-jar` go through clients without one.
pub struct ReqwestHttpClient {
    with_jar: Clients,
    without_jar: Clients,
}

struct Clients {
    follow: Client,
    no_follow: Client,
}

impl Clients {
    fn build(config: &ClientConfig, jar: Option<&Arc<Jar>>) -> Result<Clients> {
        Ok(Clients {
            follow: build_client(config, Policy::default(), jar)?,
            no_follow: build_client(config, Policy::none(), jar)?,
        })
    }

    fn pick(&self, follow_redirects: bool) -> &Client {
        if follow_redirects {
            &self.follow
        } else {
            &self.no_follow
        }
    }
}

fn build_client(config: &ClientConfig, redirect: Policy, jar: Option<&Arc<Jar>>) -> Result<Client> {
    let mut builder = Client::builder()
        .danger_accept_invalid_certs(!config.ssl_check)
        .redirect(redirect)
        .timeout(config.timeout);
    if let Some(jar) = jar {
        builder = builder.cookie_provider(Arc::clone(jar));
    }
    Ok(builder.build()?)
}

impl HttpClient for ReqwestHttpClient {
    fn create(config: ClientConfig) -> Result<ReqwestHttpClient>
    where
        Self: Sized,
    {
        let jar = Arc::new(Jar::default());
        Ok(ReqwestHttpClient {
            with_jar: Clients::build(&config, Some(&jar))?,
            without_jar: Clients::build(&config, None)?,
        })
    }

    fn execute(&self, request: &OutgoingRequest) -> Result<Exchange> {
        let clients = if request.use_cookie_jar {
            &self.with_jar
        } else {
            &self.without_jar
        };
        let client = clients.pick(request.follow_redirects);

        let method = reqwest::Method::from_bytes(request.method.as_bytes())?;
        let mut request_builder = client
            .request(method, request.url.as_str())
            .headers(header_map(&request.headers)?);
        if let Some(body) = &request.body {
            request_builder = request_builder.body(body.clone());
        }

        debug!("Sending {} {}", request.method, request.url);
        let started = Instant::now();
        let response = request_builder.send()?;
        let latency = started.elapsed();

        Ok(Exchange {
            response: response.try_into()?,
            latency,
        })
    }
}

/// Later headers replace earlier ones with the same name.
fn header_map(headers: &[(String, String)]) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    for (key, value) in headers {
        map.insert(
            HeaderName::from_bytes(key.as_bytes())?,
            HeaderValue::from_str(value)?,
        );
    }
    Ok(map)
}

impl From<reqwest::Version> for Version {
    fn from(version: reqwest::Version) -> Self {
        match version {
            reqwest::Version::HTTP_09 => Version::Http09,
            reqwest::Version::HTTP_10 => Version::Http10,
            reqwest::Version::HTTP_2 => Version::Http2,
            reqwest::Version::HTTP_3 => Version::Http3,
            _ => Version::Http11,
        }
    }
}

impl TryFrom<reqwest::blocking::Response> for Response {
    type Error = anyhow::Error;

    fn try_from(response: reqwest::blocking::Response) -> Result<Self> {
        let version = response.version().into();
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        Ok(Response {
            version,
            status_code: status.as_u16(),
            status: status.to_string(),
            headers,
            body: response.bytes()?.to_vec(),
        })
    }
}
