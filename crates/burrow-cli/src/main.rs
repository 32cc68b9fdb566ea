#![deny(unsafe_code)]

//! burrow CLI: runs the daemon and talks to it over its socket.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use burrow_config::AppConfig;
use burrow_core::ipc::{
    DepGraphRequest, IpcClient, RepoListRequest, RepoReadRequest, RepoSearchRequest,
    SymbolsIndexRequest, SymbolsSearchRequest, socket_path_from_config,
};

/// burrow: sandboxed workspace indexing and search.
#[derive(Debug, Parser)]
#[command(name = "burrow", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "burrow.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the daemon in the foreground.
    Serve,

    /// Ask a running daemon to shut down.
    Stop,

    /// Show daemon health.
    Health,

    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,
    },

    /// List workspace files.
    List {
        /// Subdirectory to walk instead of the workspace root.
        root: Option<String>,
        /// Include glob (repeatable).
        #[arg(short, long)]
        include: Vec<String>,
        /// Exclude glob (repeatable).
        #[arg(short, long)]
        exclude: Vec<String>,
        #[arg(short, long, default_value_t = 1000)]
        limit: i64,
    },

    /// Read a file, optionally a 1-based inclusive line range.
    Read {
        path: String,
        #[arg(long)]
        start: Option<i64>,
        #[arg(long)]
        end: Option<i64>,
    },

    /// Search file contents.
    Search {
        query: String,
        /// Treat the query as a regular expression.
        #[arg(short = 'r', long)]
        regex: bool,
        #[arg(short = 's', long)]
        case_sensitive: bool,
        #[arg(short, long)]
        include: Vec<String>,
        #[arg(short, long)]
        exclude: Vec<String>,
        #[arg(short, long, default_value_t = 200)]
        limit: i64,
    },

    /// Rebuild the symbol index.
    Index {
        /// Paths to index; defaults to the whole workspace.
        paths: Vec<String>,
        #[arg(short = 'L', long = "language")]
        languages: Vec<String>,
    },

    /// Query the symbol index.
    Symbols {
        /// Case-insensitive name fragment.
        name: Option<String>,
        /// `function` or `class`.
        #[arg(short, long)]
        kind: Option<String>,
        #[arg(short = 'L', long)]
        language: Option<String>,
    },

    /// Build the import dependency graph.
    Deps {
        root: Option<String>,
        #[arg(short, long)]
        include: Vec<String>,
        #[arg(short, long)]
        exclude: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli.config).await?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(filter_for(cli.verbose, &config))),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Serve => cmd_serve(config).await?,
        Commands::Config { show } => cmd_config(&cli.config, &config, show)?,
        command => cmd_remote(&config, command).await?,
    }

    Ok(())
}

/// Log filter: `-v` flags win over the configured level.
fn filter_for(verbose: u8, config: &AppConfig) -> String {
    match verbose {
        0 => config.logging.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

async fn cmd_serve(config: AppConfig) -> Result<()> {
    info!(root = %config.workspace.root.display(), "Starting burrow daemon");
    let daemon = burrow_core::Daemon::new(config);
    daemon.run().await.context("daemon exited with an error")?;
    Ok(())
}

fn cmd_config(config_path: &Path, config: &AppConfig, show: bool) -> Result<()> {
    if show {
        let toml_str = toml::to_string_pretty(config).context("failed to render config")?;
        println!("{toml_str}");
    } else {
        println!("Configuration at '{}' is valid.", config_path.display());
    }
    Ok(())
}

async fn cmd_remote(config: &AppConfig, command: Commands) -> Result<()> {
    let client = IpcClient::new(socket_path_from_config(config));

    match command {
        Commands::Stop => print_json(&client.stop().await?),
        Commands::Health => print_json(&client.health().await?),
        Commands::List {
            root,
            include,
            exclude,
            limit,
        } => print_json(
            &client
                .repo_list(&RepoListRequest {
                    root,
                    include_globs: include,
                    exclude_globs: exclude,
                    limit,
                })
                .await?,
        ),
        Commands::Read { path, start, end } => print_json(
            &client
                .repo_read(&RepoReadRequest {
                    path,
                    start_line: start,
                    end_line: end,
                })
                .await?,
        ),
        Commands::Search {
            query,
            regex,
            case_sensitive,
            include,
            exclude,
            limit,
        } => print_json(
            &client
                .repo_search(&RepoSearchRequest {
                    query,
                    include_globs: include,
                    exclude_globs: exclude,
                    regex,
                    case_sensitive,
                    limit,
                })
                .await?,
        ),
        Commands::Index { paths, languages } => print_json(
            &client
                .symbols_index(&SymbolsIndexRequest { paths, languages })
                .await?,
        ),
        Commands::Symbols {
            name,
            kind,
            language,
        } => print_json(
            &client
                .symbols_search(&SymbolsSearchRequest {
                    kind,
                    name,
                    language,
                })
                .await?,
        ),
        Commands::Deps {
            root,
            include,
            exclude,
        } => print_json(
            &client
                .dep_graph(&DepGraphRequest {
                    root,
                    include_globs: include,
                    exclude_globs: exclude,
                })
                .await?,
        ),
        Commands::Serve | Commands::Config { .. } => {
            anyhow::bail!("command runs locally, not against the daemon")
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn load_config(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        AppConfig::load(path)
            .await
            .with_context(|| format!("invalid configuration at '{}'", path.display()))
    } else {
        info!(path = %path.display(), "Config file not found, using defaults");
        Ok(AppConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burrow_test_utils::TestConfigBuilder;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_search_flags() {
        let cli = Cli::try_parse_from([
            "burrow", "-c", "ws.toml", "search", "fo+", "--regex", "-i", "src/**",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("ws.toml"));
        match cli.command {
            Commands::Search {
                query,
                regex,
                case_sensitive,
                include,
                limit,
                ..
            } => {
                assert_eq!(query, "fo+");
                assert!(regex);
                assert!(!case_sensitive);
                assert_eq!(include, vec!["src/**"]);
                assert_eq!(limit, 200);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_symbols_filters() {
        let cli = Cli::try_parse_from(["burrow", "symbols", "foo", "--kind", "class"]).unwrap();
        match cli.command {
            Commands::Symbols {
                name,
                kind,
                language,
            } => {
                assert_eq!(name.as_deref(), Some("foo"));
                assert_eq!(kind.as_deref(), Some("class"));
                assert_eq!(language, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["burrow"]).is_err());
    }

    #[test]
    fn test_verbosity_overrides_config_level() {
        let config = TestConfigBuilder::new().log_level("warn").build();
        assert_eq!(filter_for(0, &config), "warn");
        assert_eq!(filter_for(1, &config), "debug");
        assert_eq!(filter_for(3, &config), "trace");
    }

    #[tokio::test]
    async fn test_load_config_missing_file_uses_defaults() {
        let config = load_config(Path::new("/nonexistent/burrow.toml"))
            .await
            .unwrap();
        assert_eq!(config.daemon.socket_path, "/tmp/burrow.sock");
    }

    #[tokio::test]
    async fn test_load_config_round_trips_rendered_toml() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = TestConfigBuilder::new()
            .root(tmp.path())
            .name("cli")
            .read_only(true)
            .build();
        let path = tmp.path().join("burrow.toml");
        std::fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = load_config(&path).await.unwrap();
        assert_eq!(loaded.workspace.name, "cli");
        assert!(loaded.workspace.read_only);
    }

    #[tokio::test]
    async fn test_load_config_rejects_invalid() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("burrow.toml");
        std::fs::write(&path, "[limits]\nworker_threads = 0\n").unwrap();
        assert!(load_config(&path).await.is_err());
    }
}
