//! HTTP client for a running OpenViking server.

use std::path::Path;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::client::{AddResult, ClientError, Entry, FindResult, Tier, VikingClient};

/// Time allowed to open a TCP connection to the server.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for the `/health` probe used by `info`.
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Header carrying the optional API key.
const API_KEY_HEADER: &str = "X-API-Key";

/// Response envelope shared by every API route.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    status: String,
    result: Option<T>,
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct Health {
    version: Option<String>,
}

/// What a `/health` probe found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerProbe {
    Version(String),
    VersionUnknown,
    Unreachable(String),
}

/// `VikingClient` backed by the OpenViking HTTP API.
pub struct HttpClient {
    base_url: String,
    api_key: Option<String>,
    http: Option<Client>,
}

impl HttpClient {
    /// Create a client for the server at `base_url`.
    ///
    /// Requests carry no overall timeout: `wait_processed` blocks for as
    /// long as the server keeps processing.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Transport` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self, ClientError> {
        let no_timeout: Option<Duration> = None;
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(no_timeout)
            .build()?;

        Ok(Self {
            base_url: base_url.into(),
            api_key,
            http: Some(http),
        })
    }

    fn http(&self) -> Result<&Client, ClientError> {
        self.http
            .as_ref()
            .ok_or_else(|| ClientError::Decode("client already closed".to_string()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        }
    }

    fn get<T: DeserializeOwned>(&self, path: &str, uri: &str) -> Result<Option<T>, ClientError> {
        tracing::debug!(path, uri, "GET");
        let request = self.http()?.get(self.url(path)).query(&[("uri", uri)]);
        call(self.authorize(request))
    }

    fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<Option<T>, ClientError> {
        tracing::debug!(path, "POST");
        let request = self.http()?.post(self.url(path)).json(body);
        call(self.authorize(request))
    }
}

impl VikingClient for HttpClient {
    fn initialize(&mut self) -> Result<(), ClientError> {
        let request = self.http()?.get(self.url("/health"));
        let response = self.authorize(request).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Http {
                status: status.as_u16(),
                message: format!("health check failed at {}", self.base_url),
            });
        }
        tracing::debug!(url = %self.base_url, "server healthy");
        Ok(())
    }

    fn add_resource(&mut self, path: &Path) -> Result<AddResult, ClientError> {
        let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        let body = json!({ "path": path.to_string_lossy() });

        match self.post::<AddResult>("/api/v1/resources", &body) {
            Ok(Some(result)) => Ok(result),
            Ok(None) => Ok(AddResult {
                status: super::unknown_status(),
                ..AddResult::default()
            }),
            Err(ClientError::Api { message, .. } | ClientError::NotFound(message)) => {
                Ok(AddResult::failed(vec![message]))
            }
            Err(e) => Err(e),
        }
    }

    fn wait_processed(&mut self) -> Result<(), ClientError> {
        self.post::<serde_json::Value>("/api/v1/system/wait", &json!({}))?;
        Ok(())
    }

    fn find(&mut self, query: &str, limit: usize) -> Result<FindResult, ClientError> {
        let body = json!({ "query": query, "limit": limit });
        Ok(self
            .post::<FindResult>("/api/v1/search/find", &body)?
            .unwrap_or_default())
    }

    fn ls(&mut self, uri: &str) -> Result<Vec<Entry>, ClientError> {
        Ok(self.get("/api/v1/fs/ls", uri)?.unwrap_or_default())
    }

    fn content(&mut self, uri: &str, tier: Tier) -> Result<String, ClientError> {
        let path = format!("/api/v1/content/{}", tier.as_str());
        Ok(self.get(&path, uri)?.unwrap_or_default())
    }

    fn close(&mut self) -> Result<(), ClientError> {
        if self.http.take().is_some() {
            tracing::debug!(url = %self.base_url, "session closed");
        }
        Ok(())
    }
}

/// Send a request and unwrap the response envelope.
fn call<T: DeserializeOwned>(request: RequestBuilder) -> Result<Option<T>, ClientError> {
    let response = request.send()?;
    let status = response.status();
    let body = response.text()?;
    decode_envelope(status, &body)
}

fn decode_envelope<T: DeserializeOwned>(
    status: StatusCode,
    body: &str,
) -> Result<Option<T>, ClientError> {
    let envelope: Envelope<T> = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(_) if status == StatusCode::NOT_FOUND => {
            return Err(ClientError::NotFound(body.trim().to_string()));
        }
        Err(e) if status.is_success() => return Err(ClientError::Decode(e.to_string())),
        Err(_) => {
            return Err(ClientError::Http {
                status: status.as_u16(),
                message: body.trim().to_string(),
            });
        }
    };

    if let Some(error) = envelope.error
        && (envelope.status == "error" || !status.is_success())
    {
        if status == StatusCode::NOT_FOUND || error.code == "NOT_FOUND" {
            return Err(ClientError::NotFound(error.message));
        }
        return Err(ClientError::Api {
            code: error.code,
            message: error.message,
        });
    }

    if status == StatusCode::NOT_FOUND {
        return Err(ClientError::NotFound(String::new()));
    }
    if !status.is_success() {
        return Err(ClientError::Http {
            status: status.as_u16(),
            message: body.trim().to_string(),
        });
    }

    Ok(envelope.result)
}

/// Ask the server at `base_url` for its version without opening a session.
#[must_use]
pub fn probe(base_url: &str) -> ServerProbe {
    let client = match Client::builder()
        .connect_timeout(PROBE_TIMEOUT)
        .timeout(PROBE_TIMEOUT)
        .build()
    {
        Ok(client) => client,
        Err(e) => return ServerProbe::Unreachable(e.to_string()),
    };

    let response = match client.get(format!("{base_url}/health")).send() {
        Ok(response) if response.status().is_success() => response,
        Ok(response) => return ServerProbe::Unreachable(format!("HTTP {}", response.status())),
        Err(e) => return ServerProbe::Unreachable(e.to_string()),
    };

    match response.json::<Health>() {
        Ok(Health {
            version: Some(version),
        }) => ServerProbe::Version(version),
        _ => ServerProbe::VersionUnknown,
    }
}
