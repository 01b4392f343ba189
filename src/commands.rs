//! Command implementations.
//!
//! Each handler writes its report to `out` and borrows an already
//! initialized client. [`run_with`] owns the client lifecycle so a handler
//! never has to close anything itself.

use std::io::Write;
use std::path::{Path, PathBuf};

use glob::MatchOptions;

use crate::cli::Commands;
use crate::client::http::{self, HttpClient, ServerProbe};
use crate::client::{ClientError, Session, Tier, VikingClient, optional_content};
use crate::config::{self, OvConfig};

/// Characters of content shown under each search hit.
pub const PREVIEW_CHARS: usize = 150;

/// Fatal conditions hit while opening a client.
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error("Config not found at {0}")]
    ConfigNotFound(PathBuf),

    #[error("Invalid config {path}: {source}")]
    InvalidConfig {
        path: PathBuf,
        source: config::ConfigError,
    },

    #[error("Cannot create data dir {path}: {source}")]
    DataDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("OpenViking server not reachable at {url}: {source}")]
    Unreachable { url: String, source: ClientError },
}

impl OpenError {
    /// A follow-up line telling the user how to fix the problem.
    #[must_use]
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            OpenError::ConfigNotFound(_) => {
                Some("Create ~/.openviking/ov.conf or set OPENVIKING_CONFIG_FILE")
            }
            OpenError::Unreachable { .. } => {
                Some("Start the server with `openviking-server` or set OPENVIKING_URL")
            }
            _ => None,
        }
    }
}

/// Open an initialized client for `data_dir` using the configured server.
///
/// The config file is checked before the data directory is touched. The
/// directory is created so it exists for the session, as it would in
/// embedded mode; the HTTP transport itself never reads it, since storage
/// belongs to the server.
///
/// # Errors
///
/// Returns `OpenError` if the config is missing or invalid, the data
/// directory cannot be created, or the server does not answer.
pub fn open_client(data_dir: &Path) -> Result<Box<dyn VikingClient>, OpenError> {
    let config_path = config::config_path();
    if !config_path.exists() {
        return Err(OpenError::ConfigNotFound(config_path));
    }

    let cfg = OvConfig::load(&config_path).map_err(|source| OpenError::InvalidConfig {
        path: config_path.clone(),
        source,
    })?;

    std::fs::create_dir_all(data_dir).map_err(|source| OpenError::DataDir {
        path: data_dir.to_path_buf(),
        source,
    })?;

    let url = config::server_url(Some(&cfg));
    let unreachable = |source| OpenError::Unreachable {
        url: url.clone(),
        source,
    };

    let mut client =
        HttpClient::new(url.clone(), cfg.server.api_key.clone()).map_err(unreachable)?;
    client.initialize().map_err(unreachable)?;

    tracing::debug!(url = %url, data_dir = %data_dir.display(), "client ready");
    Ok(Box::new(client))
}

/// Run a command against the configured OpenViking server.
///
/// # Errors
///
/// Returns an error if the client cannot be opened or the command fails.
/// Soft outcomes (no results, empty listing, missing tier) are not errors.
pub fn run(command: Commands, data_dir: &Path, out: &mut dyn Write) -> anyhow::Result<()> {
    run_with(command, data_dir, out, open_client)
}

/// Run a command, obtaining the client from `connect`.
///
/// `connect` is only called for commands that need a client, and the
/// client is closed before this returns, whatever the outcome.
///
/// # Errors
///
/// Returns an error if `connect` fails or the command fails.
pub fn run_with<F>(
    command: Commands,
    data_dir: &Path,
    out: &mut dyn Write,
    connect: F,
) -> anyhow::Result<()>
where
    F: FnOnce(&Path) -> Result<Box<dyn VikingClient>, OpenError>,
{
    let mut session = match command {
        Commands::Info => return info(data_dir, out),
        Commands::AddDir {
            ref dir_path,
            ref pattern,
        } => {
            let files = collect_files(dir_path, pattern)?;
            if files.is_empty() {
                writeln!(
                    out,
                    "No files matching '{pattern}' found in {}",
                    dir_path.display()
                )?;
                return Ok(());
            }
            let mut session = Session::new(connect(data_dir)?);
            return add_dir(session.client(), &files, out);
        }
        _ => Session::new(connect(data_dir)?),
    };
    let client = session.client();

    match command {
        Commands::Add { file_path } => add(client, &file_path, out),
        Commands::Search { query, limit } => search(client, &query, limit, out),
        Commands::Ls { uri } => ls(client, &uri, out),
        Commands::Abstract { uri } => show_abstract(client, &uri, out),
        Commands::Overview { uri } => show_overview(client, &uri, out),
        Commands::Read { uri } => read(client, &uri, out),
        Commands::AddDir { .. } | Commands::Info => Ok(()),
    }
}

/// Add a single file and wait for it to be processed.
///
/// # Errors
///
/// Returns an error on transport failure or if `out` cannot be written.
/// A file the server rejects is reported, not returned as an error.
pub fn add(client: &mut dyn VikingClient, file_path: &Path, out: &mut dyn Write) -> anyhow::Result<()> {
    let result = client.add_resource(file_path)?;

    if result.is_success() {
        writeln!(out, "✅ Added: {}", file_path.display())?;
        writeln!(out, "   URI: {}", result.root_uri.unwrap_or_default())?;
        writeln!(out, "⏳ Processing embeddings and summaries...")?;
        client.wait_processed()?;
        writeln!(out, "✅ Processing complete.")?;
    } else {
        writeln!(out, "❌ Failed: {}", file_path.display())?;
        for error in &result.errors {
            writeln!(out, "   Error: {error}")?;
        }
    }

    Ok(())
}

/// Tally of an `add-dir` batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddSummary {
    pub succeeded: usize,
    pub failed: usize,
}

/// Add each file in order, then wait once for the whole batch.
///
/// # Errors
///
/// Returns an error on transport failure or if `out` cannot be written.
pub fn add_dir(
    client: &mut dyn VikingClient,
    files: &[PathBuf],
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let mut summary = AddSummary::default();

    for file in files {
        let result = client.add_resource(file)?;
        if result.is_success() {
            writeln!(out, "  ✅ {}", file.display())?;
            summary.succeeded += 1;
        } else {
            let reason = result.errors.first().map_or("unknown error", String::as_str);
            writeln!(out, "  ❌ {}: {reason}", file.display())?;
            summary.failed += 1;
        }
    }

    writeln!(out, "\n⏳ Processing {} files...", summary.succeeded)?;
    client.wait_processed()?;
    writeln!(
        out,
        "✅ Done. Success: {}, Failed: {}",
        summary.succeeded, summary.failed
    )?;

    Ok(())
}

/// Find files under `dir` matching `pattern` at any depth, sorted.
///
/// Hidden files and directories are skipped unless the pattern names them.
///
/// # Errors
///
/// Returns an error if the pattern is invalid.
pub fn collect_files(dir: &Path, pattern: &str) -> anyhow::Result<Vec<PathBuf>> {
    let full = dir.join("**").join(pattern);
    let options = MatchOptions {
        require_literal_leading_dot: true,
        ..MatchOptions::new()
    };

    let mut files: Vec<PathBuf> = glob::glob_with(&full.to_string_lossy(), options)
        .map_err(|e| anyhow::anyhow!("Invalid pattern '{pattern}': {e}"))?
        .filter_map(Result::ok)
        .filter(|path| path.is_file() && !in_hidden_dir(dir, path))
        .collect();

    files.sort();
    files.dedup();
    Ok(files)
}

fn in_hidden_dir(root: &Path, path: &Path) -> bool {
    let Ok(relative) = path.strip_prefix(root) else {
        return false;
    };
    relative
        .parent()
        .into_iter()
        .flat_map(Path::components)
        .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
}

/// Semantic search with a best-effort content preview per hit.
///
/// # Errors
///
/// Returns an error if the search itself fails. Preview failures are
/// ignored.
pub fn search(
    client: &mut dyn VikingClient,
    query: &str,
    limit: usize,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let results = client.find(query, limit)?;

    if results.resources.is_empty() {
        writeln!(out, "No results for '{query}'")?;
        return Ok(());
    }

    writeln!(out, "🔍 Results for '{query}':\n")?;
    for (i, hit) in results.resources.iter().enumerate() {
        writeln!(out, "  {}. {}", i + 1, hit.uri)?;
        writeln!(out, "     Score: {:.4}", hit.score)?;
        if let Ok(content) = client.read(&hit.uri)
            && !content.is_empty()
        {
            writeln!(out, "     Preview: {}...", preview(&content))?;
        }
        writeln!(out)?;
    }

    Ok(())
}

/// First [`PREVIEW_CHARS`] characters on one line.
#[must_use]
pub fn preview(content: &str) -> String {
    content
        .chars()
        .take(PREVIEW_CHARS)
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

/// List the visible entries under a URI.
///
/// # Errors
///
/// Returns an error if the listing fails for a reason other than the URI
/// not existing.
pub fn ls(client: &mut dyn VikingClient, uri: &str, out: &mut dyn Write) -> anyhow::Result<()> {
    let entries = match client.ls(uri) {
        Ok(entries) => entries,
        Err(ClientError::NotFound(_)) => vec![],
        Err(e) => return Err(e.into()),
    };

    if entries.is_empty() {
        writeln!(out, "Empty: {uri}")?;
        return Ok(());
    }

    writeln!(out, "📁 {uri}\n")?;
    for entry in entries.iter().filter(|e| !e.is_hidden()) {
        let icon = if entry.is_dir { "📁" } else { "📄" };
        let size = if entry.is_dir {
            String::new()
        } else {
            format!(" ({}B)", entry.size)
        };
        writeln!(out, "  {icon} {}{size}", entry.name)?;
        writeln!(out, "     {}", entry.uri)?;
    }

    Ok(())
}

/// Print the L0 abstract of a resource.
///
/// # Errors
///
/// Returns an error if the fetch fails for a reason other than absence.
pub fn show_abstract(
    client: &mut dyn VikingClient,
    uri: &str,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    match optional_content(client.content(uri, Tier::Abstract))? {
        Some(text) => writeln!(out, "📝 Abstract for {uri}:\n\n{text}")?,
        None => writeln!(out, "No abstract available for {uri}")?,
    }
    Ok(())
}

/// Print the L1 overview of a resource.
///
/// # Errors
///
/// Returns an error if the fetch fails for a reason other than absence.
pub fn show_overview(
    client: &mut dyn VikingClient,
    uri: &str,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    match optional_content(client.content(uri, Tier::Overview))? {
        Some(text) => writeln!(out, "📖 Overview for {uri}:\n\n{text}")?,
        None => writeln!(out, "No overview available for {uri}")?,
    }
    Ok(())
}

/// Print the full content of a resource, verbatim.
///
/// # Errors
///
/// Returns an error if the fetch fails for a reason other than absence.
pub fn read(client: &mut dyn VikingClient, uri: &str, out: &mut dyn Write) -> anyhow::Result<()> {
    match optional_content(client.read(uri))? {
        Some(text) => writeln!(out, "{text}")?,
        None => writeln!(out, "No content at {uri}")?,
    }
    Ok(())
}

/// Show config and server status. Never opens a client.
///
/// # Errors
///
/// Returns an error only if `out` cannot be written.
pub fn info(data_dir: &Path, out: &mut dyn Write) -> anyhow::Result<()> {
    let config_path = config::config_path();
    let config_exists = config_path.exists();
    let data_dir_abs = std::path::absolute(data_dir).unwrap_or_else(|_| data_dir.to_path_buf());

    writeln!(out, "OpenViking Status\n")?;
    writeln!(out, "  Config: {}", config_path.display())?;
    writeln!(out, "  Config exists: {config_exists}")?;
    writeln!(out, "  Data dir: {}", data_dir_abs.display())?;
    writeln!(out, "  Data exists: {}", data_dir.exists())?;

    let mut cfg = None;
    if config_exists {
        match OvConfig::load(&config_path) {
            Ok(loaded) => {
                let summary = loaded.summary();
                writeln!(out, "\n  Embedding model: {}", summary.embedding_model)?;
                writeln!(out, "  Embedding dim: {}", summary.embedding_dimension)?;
                writeln!(out, "  VLM model: {}", summary.vlm_model)?;
                writeln!(out, "  API base: {}", summary.api_base)?;
                cfg = Some(loaded);
            }
            Err(e) => writeln!(out, "\n  Config parse error: {e}")?,
        }
    }

    let url = config::server_url(cfg.as_ref());
    writeln!(out, "\n  Server: {url}")?;
    match http::probe(&url) {
        ServerProbe::Version(version) => writeln!(out, "  openviking version: {version}")?,
        ServerProbe::VersionUnknown => writeln!(out, "  openviking server running (version unknown)")?,
        ServerProbe::Unreachable(reason) => {
            tracing::debug!(%reason, "health probe failed");
            writeln!(out, "  ❌ openviking server not reachable")?;
        }
    }

    Ok(())
}
