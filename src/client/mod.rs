//! Client trait and types for talking to an OpenViking server.
//!
//! Command handlers only see [`VikingClient`]; the HTTP transport lives in
//! [`http`]. A [`Session`] owns a client for the length of one command and
//! closes it when dropped.

pub mod http;

use std::path::Path;

use serde::Deserialize;

/// Errors returned by client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The requested resource or tier does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Server error ({code}): {message}")]
    Api { code: String, message: String },

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Malformed response: {0}")]
    Decode(String),
}

/// Outcome of submitting one resource for indexing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AddResult {
    #[serde(default = "unknown_status")]
    pub status: String,
    #[serde(default)]
    pub root_uri: Option<String>,
    #[serde(default)]
    pub errors: Vec<String>,
}

fn unknown_status() -> String {
    "unknown".to_string()
}

impl AddResult {
    #[must_use]
    pub fn success(root_uri: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            root_uri: Some(root_uri.into()),
            errors: vec![],
        }
    }

    #[must_use]
    pub fn failed(errors: Vec<String>) -> Self {
        Self {
            status: "error".to_string(),
            root_uri: None,
            errors,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Entry {
    #[serde(default = "unknown_name")]
    pub name: String,
    #[serde(default, rename = "isDir")]
    pub is_dir: bool,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub uri: String,
}

fn unknown_name() -> String {
    "?".to_string()
}

impl Entry {
    /// Names starting with `.` are internal to the service.
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.name.starts_with('.')
    }
}

/// A single ranked search hit.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Hit {
    pub uri: String,
    #[serde(default)]
    pub score: f64,
}

/// Result of a `find` call. Only resources are displayed.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FindResult {
    #[serde(default)]
    pub resources: Vec<Hit>,
}

/// Content tier of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// L0: one-line summary.
    Abstract,
    /// L1: medium-length overview.
    Overview,
    /// L2: full content.
    Read,
}

impl Tier {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Abstract => "abstract",
            Tier::Overview => "overview",
            Tier::Read => "read",
        }
    }
}

/// Operations the CLI needs from an OpenViking service.
pub trait VikingClient: Send {
    /// Prepare the client for use. Called once before any other operation.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the service cannot be reached.
    fn initialize(&mut self) -> Result<(), ClientError>;

    /// Submit a file for indexing.
    ///
    /// A rejected file is reported through [`AddResult::status`], not as an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` on transport failure.
    fn add_resource(&mut self, path: &Path) -> Result<AddResult, ClientError>;

    /// Block until background embedding and summarization finish.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` on transport failure.
    fn wait_processed(&mut self) -> Result<(), ClientError>;

    /// Semantic search, best match first.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the search fails.
    fn find(&mut self, query: &str, limit: usize) -> Result<FindResult, ClientError>;

    /// List the entries under a URI.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NotFound` for unknown URIs.
    fn ls(&mut self, uri: &str) -> Result<Vec<Entry>, ClientError>;

    /// Fetch one content tier of a resource.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NotFound` if the tier does not exist.
    fn content(&mut self, uri: &str, tier: Tier) -> Result<String, ClientError>;

    /// Release the client.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the release itself fails.
    fn close(&mut self) -> Result<(), ClientError>;

    /// Fetch the full (L2) content of a resource.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NotFound` if the resource has no content.
    fn read(&mut self, uri: &str) -> Result<String, ClientError> {
        self.content(uri, Tier::Read)
    }
}

/// Scoped ownership of an initialized client.
///
/// The client is closed exactly once, when the session is dropped, whether
/// the command succeeded or bailed out early with `?`.
pub struct Session {
    client: Box<dyn VikingClient>,
}

impl Session {
    #[must_use]
    pub fn new(client: Box<dyn VikingClient>) -> Self {
        Self { client }
    }

    pub fn client(&mut self) -> &mut dyn VikingClient {
        self.client.as_mut()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.client.close() {
            tracing::warn!(error = %e, "failed to close client");
        }
    }
}

/// Treat an absent or empty tier as `None`; pass other errors through.
///
/// # Errors
///
/// Returns any `ClientError` other than `NotFound`.
pub fn optional_content(result: Result<String, ClientError>) -> Result<Option<String>, ClientError> {
    match result {
        Ok(text) if text.is_empty() => Ok(None),
        Ok(text) => Ok(Some(text)),
        Err(ClientError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}
