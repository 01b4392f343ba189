//! Integration tests for viking command handlers.
//!
//! Commands run through `commands::run_with` against an in-memory fake
//! client, so the full dispatch and client lifecycle is exercised without a
//! server.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use viking::cli::Commands;
use viking::client::{AddResult, ClientError, Entry, FindResult, Hit, Tier, VikingClient};
use viking::commands::{self, OpenError};

// =============================================================================
// Fake client
// =============================================================================

/// Calls observed by a fake client, shared with the test after the client
/// has been handed to the command.
#[derive(Debug, Default)]
struct Log {
    added: Vec<PathBuf>,
    waits: usize,
    reads: Vec<String>,
    closes: usize,
}

#[derive(Default)]
struct FakeClient {
    log: Arc<Mutex<Log>>,
    /// Add results keyed by file name; unlisted files succeed.
    add_results: HashMap<String, AddResult>,
    hits: Vec<Hit>,
    find_error: bool,
    listings: HashMap<String, Vec<Entry>>,
    content: HashMap<(String, &'static str), String>,
    failing_reads: Vec<String>,
}

impl FakeClient {
    fn new() -> Self {
        Self::default()
    }

    fn log(&self) -> Arc<Mutex<Log>> {
        Arc::clone(&self.log)
    }

    fn reject(mut self, file_name: &str, errors: &[&str]) -> Self {
        self.add_results.insert(
            file_name.to_string(),
            AddResult::failed(errors.iter().map(ToString::to_string).collect()),
        );
        self
    }

    fn hit(mut self, uri: &str, score: f64) -> Self {
        self.hits.push(Hit {
            uri: uri.to_string(),
            score,
        });
        self
    }

    fn listing(mut self, uri: &str, entries: Vec<Entry>) -> Self {
        self.listings.insert(uri.to_string(), entries);
        self
    }

    fn tier(mut self, uri: &str, tier: Tier, text: &str) -> Self {
        self.content
            .insert((uri.to_string(), tier.as_str()), text.to_string());
        self
    }

    fn failing_read(mut self, uri: &str) -> Self {
        self.failing_reads.push(uri.to_string());
        self
    }
}

impl VikingClient for FakeClient {
    fn initialize(&mut self) -> Result<(), ClientError> {
        Ok(())
    }

    fn add_resource(&mut self, path: &Path) -> Result<AddResult, ClientError> {
        self.log.lock().unwrap().added.push(path.to_path_buf());
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(self
            .add_results
            .get(&name)
            .cloned()
            .unwrap_or_else(|| AddResult::success(format!("viking://resources/{name}"))))
    }

    fn wait_processed(&mut self) -> Result<(), ClientError> {
        self.log.lock().unwrap().waits += 1;
        Ok(())
    }

    fn find(&mut self, _query: &str, limit: usize) -> Result<FindResult, ClientError> {
        if self.find_error {
            return Err(ClientError::Api {
                code: "INTERNAL".to_string(),
                message: "vector index unavailable".to_string(),
            });
        }
        Ok(FindResult {
            resources: self.hits.iter().take(limit).cloned().collect(),
        })
    }

    fn ls(&mut self, uri: &str) -> Result<Vec<Entry>, ClientError> {
        self.listings
            .get(uri)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(uri.to_string()))
    }

    fn content(&mut self, uri: &str, tier: Tier) -> Result<String, ClientError> {
        if tier == Tier::Read {
            self.log.lock().unwrap().reads.push(uri.to_string());
            if self.failing_reads.iter().any(|u| u == uri) {
                return Err(ClientError::Http {
                    status: 500,
                    message: "parser crashed".to_string(),
                });
            }
        }
        self.content
            .get(&(uri.to_string(), tier.as_str()))
            .cloned()
            .ok_or_else(|| ClientError::NotFound(uri.to_string()))
    }

    fn close(&mut self) -> Result<(), ClientError> {
        self.log.lock().unwrap().closes += 1;
        Ok(())
    }
}

fn entry(name: &str, is_dir: bool, size: u64) -> Entry {
    Entry {
        name: name.to_string(),
        is_dir,
        size,
        uri: format!("viking://resources/{name}"),
    }
}

/// Run a command against `client`, returning (result, stdout, log).
fn run(
    command: Commands,
    client: FakeClient,
) -> (anyhow::Result<()>, String, Arc<Mutex<Log>>) {
    let log = client.log();
    let mut out = Vec::new();
    let result = commands::run_with(command, Path::new("./unused"), &mut out, move |_| {
        Ok(Box::new(client) as Box<dyn VikingClient>)
    });
    (result, String::from_utf8(out).unwrap(), log)
}

/// Create a directory with the given files (relative path, content).
fn docs_dir(files: &[&str]) -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    for file in files {
        let path = dir.path().join(file);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create dir");
        }
        fs::write(&path, "content").expect("Failed to write file");
    }
    dir
}

// =============================================================================
// add
// =============================================================================

mod add_tests {
    use super::*;

    #[test]
    fn success_waits_for_processing() {
        let (result, out, log) = run(
            Commands::Add {
                file_path: PathBuf::from("notes.md"),
            },
            FakeClient::new(),
        );

        assert!(result.is_ok());
        assert_eq!(
            out,
            "✅ Added: notes.md\n   URI: viking://resources/notes.md\n\
             ⏳ Processing embeddings and summaries...\n✅ Processing complete.\n"
        );
        let log = log.lock().unwrap();
        assert_eq!(log.waits, 1);
        assert_eq!(log.closes, 1);
    }

    #[test]
    fn failure_lists_every_error_and_skips_wait() {
        let client = FakeClient::new().reject("bad.bin", &["unsupported type", "empty file"]);
        let (result, out, log) = run(
            Commands::Add {
                file_path: PathBuf::from("bad.bin"),
            },
            client,
        );

        assert!(result.is_ok());
        assert_eq!(
            out,
            "❌ Failed: bad.bin\n   Error: unsupported type\n   Error: empty file\n"
        );
        let log = log.lock().unwrap();
        assert_eq!(log.waits, 0);
        assert_eq!(log.closes, 1);
    }
}

// =============================================================================
// add-dir
// =============================================================================

mod add_dir_tests {
    use super::*;

    #[test]
    fn mixed_batch_reports_counts_after_wait() {
        let dir = docs_dir(&["a.txt", "b.txt", "sub/c.txt", "skip.md"]);
        let client = FakeClient::new().reject("b.txt", &["parse failed"]);
        let (result, out, log) = run(
            Commands::AddDir {
                dir_path: dir.path().to_path_buf(),
                pattern: "*.txt".to_string(),
            },
            client,
        );

        assert!(result.is_ok());
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        let c = dir.path().join("sub/c.txt");
        assert_eq!(
            out,
            format!(
                "  ✅ {}\n  ❌ {}: parse failed\n  ✅ {}\n\n⏳ Processing 2 files...\n\
                 ✅ Done. Success: 2, Failed: 1\n",
                a.display(),
                b.display(),
                c.display()
            )
        );

        let log = log.lock().unwrap();
        assert_eq!(log.added, vec![a, b, c]);
        assert_eq!(log.waits, 1);
        assert_eq!(log.closes, 1);
    }

    #[test]
    fn failure_without_message_says_unknown_error() {
        let dir = docs_dir(&["x.md"]);
        let client = FakeClient::new().reject("x.md", &[]);
        let (_, out, _) = run(
            Commands::AddDir {
                dir_path: dir.path().to_path_buf(),
                pattern: "*.md".to_string(),
            },
            client,
        );

        assert!(out.contains(": unknown error"));
        assert!(out.contains("Success: 0, Failed: 1"));
    }

    #[test]
    fn no_matches_never_connects() {
        let dir = docs_dir(&["readme.txt"]);
        let mut out = Vec::new();
        let mut connected = false;

        let result = commands::run_with(
            Commands::AddDir {
                dir_path: dir.path().to_path_buf(),
                pattern: "*.md".to_string(),
            },
            Path::new("./unused"),
            &mut out,
            |_| {
                connected = true;
                Err(OpenError::ConfigNotFound(PathBuf::from("/nowhere")))
            },
        );

        assert!(result.is_ok());
        assert!(!connected);
        let out = String::from_utf8(out).unwrap();
        assert_eq!(
            out,
            format!("No files matching '*.md' found in {}\n", dir.path().display())
        );
    }
}

// =============================================================================
// search
// =============================================================================

mod search_tests {
    use super::*;

    #[test]
    fn empty_results_are_not_an_error() {
        let (result, out, _) = run(
            Commands::Search {
                query: "quantum".to_string(),
                limit: 5,
            },
            FakeClient::new(),
        );

        assert!(result.is_ok());
        assert_eq!(out, "No results for 'quantum'\n");
    }

    #[test]
    fn hits_keep_rank_order_with_previews() {
        let client = FakeClient::new()
            .hit("viking://resources/b.md", 0.91234)
            .hit("viking://resources/a.md", 0.5)
            .tier("viking://resources/b.md", Tier::Read, "# B\nsecond line")
            .tier("viking://resources/a.md", Tier::Read, "alpha");
        let (result, out, _) = run(
            Commands::Search {
                query: "docs".to_string(),
                limit: 5,
            },
            client,
        );

        assert!(result.is_ok());
        assert_eq!(
            out,
            "🔍 Results for 'docs':\n\n\
             \x20 1. viking://resources/b.md\n     Score: 0.9123\n     Preview: # B second line...\n\n\
             \x20 2. viking://resources/a.md\n     Score: 0.5000\n     Preview: alpha...\n\n"
        );
    }

    #[test]
    fn preview_is_truncated() {
        let long = format!("{}\n{}", "a".repeat(100), "b".repeat(100));
        let client = FakeClient::new()
            .hit("viking://resources/long.md", 1.0)
            .tier("viking://resources/long.md", Tier::Read, &long);
        let (_, out, _) = run(
            Commands::Search {
                query: "long".to_string(),
                limit: 5,
            },
            client,
        );

        let expected = format!("{} {}", "a".repeat(100), "b".repeat(49));
        assert!(out.contains(&format!("     Preview: {expected}...\n")));
    }

    #[test]
    fn preview_failure_only_drops_the_preview() {
        let client = FakeClient::new()
            .hit("viking://resources/broken.pdf", 0.7)
            .failing_read("viking://resources/broken.pdf");
        let (result, out, log) = run(
            Commands::Search {
                query: "pdf".to_string(),
                limit: 5,
            },
            client,
        );

        assert!(result.is_ok());
        assert!(out.contains("  1. viking://resources/broken.pdf\n     Score: 0.7000\n\n"));
        assert!(!out.contains("Preview"));
        assert_eq!(log.lock().unwrap().reads.len(), 1);
    }

    #[test]
    fn limit_is_passed_through() {
        let client = FakeClient::new()
            .hit("viking://resources/1", 0.9)
            .hit("viking://resources/2", 0.8)
            .hit("viking://resources/3", 0.7);
        let (_, out, _) = run(
            Commands::Search {
                query: "q".to_string(),
                limit: 2,
            },
            client,
        );

        assert!(out.contains("2. viking://resources/2"));
        assert!(!out.contains("viking://resources/3"));
    }

    #[test]
    fn search_error_still_closes_client() {
        let client = FakeClient {
            find_error: true,
            ..FakeClient::new()
        };
        let (result, _, log) = run(
            Commands::Search {
                query: "q".to_string(),
                limit: 5,
            },
            client,
        );

        let err = result.unwrap_err();
        assert!(err.to_string().contains("vector index unavailable"));
        assert_eq!(log.lock().unwrap().closes, 1);
    }
}

// =============================================================================
// ls
// =============================================================================

mod ls_tests {
    use super::*;

    #[test]
    fn hidden_entries_are_skipped() {
        let client = FakeClient::new().listing(
            "viking://resources",
            vec![
                entry("guides", true, 0),
                entry(".abstract.md", false, 40),
                entry(".cache", true, 0),
                entry("intro.md", false, 1234),
            ],
        );
        let (result, out, _) = run(
            Commands::Ls {
                uri: "viking://resources".to_string(),
            },
            client,
        );

        assert!(result.is_ok());
        assert_eq!(
            out,
            "📁 viking://resources\n\n\
             \x20 📁 guides\n     viking://resources/guides\n\
             \x20 📄 intro.md (1234B)\n     viking://resources/intro.md\n"
        );
    }

    #[test]
    fn empty_listing() {
        let client = FakeClient::new().listing("viking://resources", vec![]);
        let (result, out, _) = run(
            Commands::Ls {
                uri: "viking://resources".to_string(),
            },
            client,
        );

        assert!(result.is_ok());
        assert_eq!(out, "Empty: viking://resources\n");
    }

    #[test]
    fn unknown_uri_is_empty() {
        let (result, out, log) = run(
            Commands::Ls {
                uri: "viking://resources/missing".to_string(),
            },
            FakeClient::new(),
        );

        assert!(result.is_ok());
        assert_eq!(out, "Empty: viking://resources/missing\n");
        assert_eq!(log.lock().unwrap().closes, 1);
    }
}

// =============================================================================
// abstract / overview / read
// =============================================================================

mod tier_tests {
    use super::*;

    const URI: &str = "viking://resources/guide.md";

    #[test]
    fn abstract_is_printed_with_header() {
        let client = FakeClient::new().tier(URI, Tier::Abstract, "A guide to setup.");
        let (result, out, _) = run(Commands::Abstract { uri: URI.to_string() }, client);

        assert!(result.is_ok());
        assert_eq!(out, format!("📝 Abstract for {URI}:\n\nA guide to setup.\n"));
    }

    #[test]
    fn missing_abstract_is_soft() {
        let (result, out, _) = run(Commands::Abstract { uri: URI.to_string() }, FakeClient::new());

        assert!(result.is_ok());
        assert_eq!(out, format!("No abstract available for {URI}\n"));
    }

    #[test]
    fn overview_is_printed_with_header() {
        let client = FakeClient::new().tier(URI, Tier::Overview, "## Setup\nSteps.");
        let (result, out, _) = run(Commands::Overview { uri: URI.to_string() }, client);

        assert!(result.is_ok());
        assert_eq!(out, format!("📖 Overview for {URI}:\n\n## Setup\nSteps.\n"));
    }

    #[test]
    fn empty_overview_is_soft() {
        let client = FakeClient::new().tier(URI, Tier::Overview, "");
        let (result, out, _) = run(Commands::Overview { uri: URI.to_string() }, client);

        assert!(result.is_ok());
        assert_eq!(out, format!("No overview available for {URI}\n"));
    }

    #[test]
    fn read_prints_verbatim() {
        let client = FakeClient::new().tier(URI, Tier::Read, "line one\nline two");
        let (result, out, _) = run(Commands::Read { uri: URI.to_string() }, client);

        assert!(result.is_ok());
        assert_eq!(out, "line one\nline two\n");
    }

    #[test]
    fn missing_content_is_soft() {
        let (result, out, log) = run(Commands::Read { uri: URI.to_string() }, FakeClient::new());

        assert!(result.is_ok());
        assert_eq!(out, format!("No content at {URI}\n"));
        assert_eq!(log.lock().unwrap().closes, 1);
    }

    #[test]
    fn server_failure_is_an_error() {
        let client = FakeClient::new().failing_read(URI);
        let (result, _, log) = run(Commands::Read { uri: URI.to_string() }, client);

        assert!(result.is_err());
        assert_eq!(log.lock().unwrap().closes, 1);
    }
}

// =============================================================================
// Client factory failures
// =============================================================================

#[test]
fn connect_failure_propagates_as_open_error() {
    let mut out = Vec::new();
    let result = commands::run_with(
        Commands::Ls {
            uri: "viking://resources".to_string(),
        },
        Path::new("./unused"),
        &mut out,
        |_| Err(OpenError::ConfigNotFound(PathBuf::from("/etc/ov.conf"))),
    );

    let err = result.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<OpenError>(),
        Some(OpenError::ConfigNotFound(_))
    ));
    assert!(out.is_empty());
}
