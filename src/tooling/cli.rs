//! CLI Tooling
//!
//! Command-line interface for repository imports: trigger an import into a
//! workspace room, inspect what a room holds, and translate between paths and
//! node ids.

use crate::concurrency::CancelToken;
use crate::config::{ConfigLoader, SyncspaceConfig};
use crate::document::RoomStorage;
use crate::error::{CliError, ImportError};
use crate::import::{parse_repo_url, ImportOutcome, ImportReport, ImportRequest, Importer};
use crate::source::github::GitHubSource;
use crate::store::{DocumentStore, HttpDocumentStore};
use crate::tree::identity::{decode, encode, NodeId, RepoPath};
use crate::types::WorkspaceId;
use clap::{Parser, Subcommand};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

const REDACTED: &str = "********";

/// Syncspace CLI - import GitHub repositories into collaborative workspaces
#[derive(Parser)]
#[command(name = "syncspace")]
#[command(about = "Import GitHub repositories into collaborative workspace documents")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Import a repository into a workspace room
    Import {
        /// Workspace id (also the document room id)
        #[arg(long)]
        workspace: String,
        /// Repository as owner/repo or a GitHub URL
        #[arg(long)]
        repo: String,
        /// Branch to import
        #[arg(long, default_value = crate::import::DEFAULT_BRANCH)]
        branch: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show the file tree published to a workspace room
    Inspect {
        /// Workspace id
        #[arg(long)]
        workspace: String,
        /// Print the content of one file instead of the tree
        #[arg(long)]
        file: Option<String>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Print the node id of a repository path
    EncodePath {
        /// Repository-relative path (empty for the root)
        path: String,
    },
    /// Print the repository path a node id stands for
    DecodeId {
        /// Node id
        id: String,
    },
    /// Print the resolved configuration (secrets redacted)
    Config {
        /// Output format (toml or json)
        #[arg(long, default_value = "toml")]
        format: String,
    },
}

/// CLI context for executing commands
pub struct CliContext {
    config: SyncspaceConfig,
}

impl CliContext {
    /// Create a new CLI context, loading configuration from disk and environment
    pub fn new(config_path: Option<PathBuf>) -> Result<Self, CliError> {
        let config = match &config_path {
            Some(path) => ConfigLoader::load_with_file(path)?,
            None => ConfigLoader::load()?,
        };
        Ok(Self::with_config(config))
    }

    pub fn with_config(config: SyncspaceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SyncspaceConfig {
        &self.config
    }

    /// Execute a CLI command
    pub async fn execute(&self, command: &Commands) -> Result<String, CliError> {
        let started = Instant::now();
        let result = self.execute_inner(command).await;
        match &result {
            Ok(_) => info!(
                command = command_name(command),
                duration_ms = started.elapsed().as_millis() as u64,
                "Command finished"
            ),
            Err(e) => warn!(command = command_name(command), error = %e, "Command failed"),
        }
        result
    }

    async fn execute_inner(&self, command: &Commands) -> Result<String, CliError> {
        match command {
            Commands::Import {
                workspace,
                repo,
                branch,
                format,
            } => {
                check_format(format, &["text", "json"])?;
                let (owner, name) = parse_repo_url(repo).ok_or_else(|| {
                    ImportError::InvalidRequest(format!("unrecognized repository {:?}", repo))
                })?;
                let request = ImportRequest::new(workspace.as_str(), owner, name, branch.as_str());
                let outcome = self.run_import(&request).await?;
                if format == "json" {
                    to_json(&ImportReport::from_result(&Ok(outcome)))
                } else {
                    Ok(format_import_outcome_text(&request, &outcome))
                }
            }
            Commands::Inspect {
                workspace,
                file,
                format,
            } => {
                check_format(format, &["text", "json"])?;
                let store = HttpDocumentStore::new(&self.config.store)?;
                let room = WorkspaceId::from(workspace.as_str());
                let document = store.get_document(&room).await?;
                if let Some(file) = file {
                    let id = encode(&RepoPath::parse(file.as_str())?);
                    return document.reader()?.text(&id)?.ok_or_else(|| {
                        CliError::Output(format!("{} has no content in workspace {}", file, room))
                    });
                }
                if format == "json" {
                    to_json(&document.storage)
                } else {
                    Ok(format_room_text(&room, &document.storage))
                }
            }
            Commands::EncodePath { path } => {
                let path = RepoPath::parse(path.as_str())?;
                Ok(encode(&path).to_string())
            }
            Commands::DecodeId { id } => {
                let path = decode(&NodeId::parse(id.as_str())?)?;
                Ok(display_path(&path))
            }
            Commands::Config { format } => {
                check_format(format, &["toml", "json"])?;
                let redacted = redact(&self.config);
                if format == "json" {
                    to_json(&redacted)
                } else {
                    toml::to_string_pretty(&redacted).map_err(|e| CliError::Output(e.to_string()))
                }
            }
        }
    }

    /// Run one import against GitHub and the configured store; Ctrl-C cancels it.
    async fn run_import(&self, request: &ImportRequest) -> Result<ImportOutcome, CliError> {
        let source = GitHubSource::new(&self.config.github, self.config.github.resolved_token())?;
        let store = HttpDocumentStore::new(&self.config.store)?;
        let importer = Importer::new(
            Arc::new(source),
            Arc::new(store),
            self.config.import.clone(),
        );

        let cancel = CancelToken::new();
        let interrupt = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, cancelling import");
                    cancel.cancel();
                }
            })
        };
        let result = importer.import(request, &cancel).await;
        interrupt.abort();
        Ok(result?)
    }
}

fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Import { .. } => "import",
        Commands::Inspect { .. } => "inspect",
        Commands::EncodePath { .. } => "encode-path",
        Commands::DecodeId { .. } => "decode-id",
        Commands::Config { .. } => "config",
    }
}

fn check_format(format: &str, allowed: &[&str]) -> Result<(), CliError> {
    if allowed.contains(&format) {
        Ok(())
    } else {
        Err(CliError::Output(format!(
            "unknown format {:?} (expected one of: {})",
            format,
            allowed.join(", ")
        )))
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(value).map_err(|e| CliError::Output(e.to_string()))
}

fn display_path(path: &RepoPath) -> String {
    if path.is_root() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

fn redact(config: &SyncspaceConfig) -> SyncspaceConfig {
    let mut config = config.clone();
    if config.github.token.is_some() {
        config.github.token = Some(REDACTED.to_string());
    }
    if config.store.secret.is_some() {
        config.store.secret = Some(REDACTED.to_string());
    }
    config
}

fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

fn format_import_outcome_text(request: &ImportRequest, outcome: &ImportOutcome) -> String {
    let mut out = format!(
        "{} Imported {} into workspace {}\n",
        "✓".green(),
        request.repo_ref(),
        outcome.workspace_id
    );
    out.push_str(&format!(
        "  Files: {}\n  Directories: {}\n",
        outcome.imported_file_count, outcome.directory_count
    ));
    if !outcome.warnings.is_empty() {
        out.push_str(&format!(
            "\n{} {} file(s) imported without content\n",
            "!".yellow(),
            outcome.warnings.len()
        ));
        for warning in &outcome.warnings {
            out.push_str(&format!("  {}: {}\n", warning.path, warning.reason));
        }
    }
    out
}

fn format_room_text(room: &WorkspaceId, storage: &RoomStorage) -> String {
    let mut out = format!("{}\n\n", format_section_heading(&format!("Workspace {}", room)));
    if let Some(meta) = &storage.repo_meta {
        out.push_str(&format!(
            "  Repository: {}/{} ({})\n",
            meta.owner, meta.name, meta.default_branch
        ));
    }
    let Some(tree) = &storage.file_tree else {
        out.push_str("  Initialized: no\n  No file tree published.\n");
        return out;
    };
    out.push_str(&format!(
        "  Initialized: {}\n  Files: {}\n  Directories: {}\n\n",
        if tree.is_initialized { "yes" } else { "no" },
        tree.file_count(),
        tree.directory_count()
    ));

    let mut nodes: Vec<_> = tree.files.values().collect();
    nodes.sort_by(|a, b| a.path.cmp(&b.path));
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Path", "Type", "Language", "Id"]);
    for node in nodes {
        table.add_row(vec![
            display_path(&node.path),
            node.kind.as_str().to_string(),
            node.language.clone().unwrap_or_else(|| "-".to_string()),
            node.id.to_string(),
        ]);
    }
    out.push_str(&format!("{}\n", table));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentBuilder;
    use crate::document::RepoMeta;
    use crate::tree::walker::ContentWarning;

    fn context() -> CliContext {
        CliContext::with_config(SyncspaceConfig::default())
    }

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("syncspace").chain(args.iter().copied()))
    }

    #[test]
    fn test_parse_import_defaults_branch() {
        let cli = parse(&["import", "--workspace", "ws", "--repo", "acme/demo"]).unwrap();
        assert_eq!(
            cli.command,
            Commands::Import {
                workspace: "ws".to_string(),
                repo: "acme/demo".to_string(),
                branch: "main".to_string(),
                format: "text".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_global_options() {
        let cli = parse(&[
            "--log-level",
            "debug",
            "--config",
            "/tmp/syncspace.toml",
            "decode-id",
            "root",
        ])
        .unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/syncspace.toml")));
    }

    #[tokio::test]
    async fn test_encode_and_decode_commands() {
        let ctx = context();
        let id = ctx
            .execute(&Commands::EncodePath {
                path: "src/index.ts".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(id, "c3JjL2luZGV4LnRz");

        let path = ctx.execute(&Commands::DecodeId { id }).await.unwrap();
        assert_eq!(path, "src/index.ts");

        let root = ctx
            .execute(&Commands::DecodeId {
                id: "root".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(root, "/");
    }

    #[tokio::test]
    async fn test_decode_rejects_garbage() {
        let err = context()
            .execute(&Commands::DecodeId {
                id: "***".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Identity(_)));
    }

    #[tokio::test]
    async fn test_config_output_redacts_secrets() {
        let mut config = SyncspaceConfig::default();
        config.github.token = Some("ghp_secret".to_string());
        config.store.secret = Some("store-secret".to_string());
        let out = CliContext::with_config(config)
            .execute(&Commands::Config {
                format: "toml".to_string(),
            })
            .await
            .unwrap();
        assert!(!out.contains("ghp_secret"));
        assert!(!out.contains("store-secret"));
        assert!(out.contains("[import]"));
    }

    #[tokio::test]
    async fn test_import_rejects_bad_format_before_network() {
        let err = context()
            .execute(&Commands::Import {
                workspace: "ws".to_string(),
                repo: "acme/demo".to_string(),
                branch: "main".to_string(),
                format: "yaml".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Output(_)));
    }

    #[test]
    fn test_format_room_text_lists_nodes() {
        let builder = DocumentBuilder::with_timestamp(0);
        let readme = builder.register_file(&RepoPath::parse("README.md").unwrap(), None);
        builder.set_children(&NodeId::root(), vec![readme]).unwrap();
        let built = builder.finish().unwrap();
        let storage = RoomStorage {
            file_tree: Some(built.snapshot),
            repo_meta: Some(RepoMeta {
                owner: "acme".to_string(),
                name: "demo".to_string(),
                default_branch: "main".to_string(),
            }),
        };

        let out = format_room_text(&WorkspaceId::from("ws"), &storage);
        assert!(out.contains("acme/demo (main)"));
        assert!(out.contains("README.md"));
        assert!(out.contains("UkVBRE1FLm1k"));
        assert!(out.contains("Files: 1"));
    }

    #[test]
    fn test_format_import_outcome_lists_warnings() {
        let request = ImportRequest::new("ws", "acme", "demo", "main");
        let outcome = ImportOutcome {
            workspace_id: WorkspaceId::from("ws"),
            imported_file_count: 2,
            directory_count: 1,
            warnings: vec![ContentWarning {
                path: RepoPath::parse("src/broken.ts").unwrap(),
                reason: "read failed".to_string(),
            }],
        };
        let out = format_import_outcome_text(&request, &outcome);
        assert!(out.contains("Files: 2"));
        assert!(out.contains("src/broken.ts: read failed"));
    }
}
