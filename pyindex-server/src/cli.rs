//! Command-line interface for the `pyindex` binary.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pyindex_core::{normalize, FileEntry, FileStore, IndexEngine};
use tracing::info;

use crate::config::{Config, DuplicatePolicy};
use crate::server::run_server;

const DEFAULT_CONFIG_FILE: &str = "pyindex.json";

#[derive(Parser, Debug)]
#[command(name = "pyindex")]
#[command(about = "Simple Repository API package index (PEP 503 / PEP 691)")]
#[command(version)]
pub struct Cli {
    /// JSON configuration file; built-in defaults are used if it does not exist
    #[arg(long, global = true, env = "PYINDEX_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the package index server
    Serve(ServeArgs),
    /// List stored projects
    List {
        /// Storage root (defaults to the configured root)
        #[arg(long, env = "PYINDEX_ROOT")]
        root: Option<PathBuf>,
    },
    /// Show the ordered file listing of one project
    Files {
        /// Project name, in any spelling
        project: String,
        /// Storage root (defaults to the configured root)
        #[arg(long, env = "PYINDEX_ROOT")]
        root: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Host to bind the server to
    #[arg(long, env = "PYINDEX_HOST")]
    pub host: Option<String>,
    /// Port to run the server on
    #[arg(short, long, env = "PYINDEX_PORT")]
    pub port: Option<u16>,
    /// Storage root directory
    #[arg(long, env = "PYINDEX_ROOT")]
    pub root: Option<PathBuf>,
    /// Path prefix all routes are mounted under (e.g. /pypi)
    #[arg(long, env = "PYINDEX_URL_PREFIX")]
    pub url_prefix: Option<String>,
    /// How to answer an upload whose filename already exists
    #[arg(long, value_enum, env = "PYINDEX_DUPLICATE_POLICY")]
    pub duplicate_policy: Option<DuplicatePolicy>,
    /// Maximum upload size in megabytes
    #[arg(long, env = "PYINDEX_MAX_UPLOAD_SIZE_MB")]
    pub max_upload_size_mb: Option<usize>,
    /// Disable the in-memory listing cache
    #[arg(long, env = "PYINDEX_NO_CACHE")]
    pub no_cache: bool,
}

impl ServeArgs {
    /// Overlay command line values on a loaded configuration.
    pub fn apply(self, config: &mut Config) {
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(root) = self.root {
            config.storage.root = root;
        }
        if let Some(prefix) = self.url_prefix {
            config.routes.url_prefix = prefix;
        }
        if let Some(policy) = self.duplicate_policy {
            config.uploads.duplicate_policy = policy;
        }
        if let Some(size) = self.max_upload_size_mb {
            config.limits.max_upload_size_mb = size;
        }
        if self.no_cache {
            config.storage.listing_cache = false;
        }
    }
}

async fn open_engine(config: &Config, root: Option<PathBuf>) -> Result<IndexEngine> {
    let root = root.unwrap_or_else(|| config.storage.root.clone());
    let store = FileStore::open(&root)
        .await
        .with_context(|| format!("Failed to open storage root {}", root.display()))?;
    Ok(IndexEngine::without_cache(store))
}

fn describe_entry(entry: &FileEntry) -> String {
    let version = match &entry.version {
        Ok(version) => version.to_string(),
        Err(e) => format!("({e})"),
    };
    format!("{}\t{}\t{}", entry.filename, version, entry.sha256)
}

pub async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    match cli.command {
        Commands::Serve(args) => {
            args.apply(&mut config);
            info!(config = %cli.config.display(), "Configuration loaded");
            run_server(config).await
        }
        Commands::List { root } => {
            let engine = open_engine(&config, root).await?;
            for project in engine.list_projects().await? {
                println!("{project}");
            }
            Ok(())
        }
        Commands::Files { project, root } => {
            let engine = open_engine(&config, root).await?;
            let project = normalize(&project);
            let listing = engine
                .list_files(&project)
                .await
                .with_context(|| format!("No files for project '{project}'"))?;
            for entry in listing.iter() {
                println!("{}", describe_entry(entry));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_flags_override_config() {
        let cli = Cli::try_parse_from([
            "pyindex",
            "serve",
            "--host",
            "127.0.0.1",
            "--port",
            "9000",
            "--root",
            "/srv/pypi",
            "--url-prefix",
            "/pypi",
            "--duplicate-policy",
            "allow-identical",
            "--max-upload-size-mb",
            "5",
            "--no-cache",
        ])
        .unwrap();

        let Commands::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        let mut config = Config::default();
        args.apply(&mut config);

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.storage.root, PathBuf::from("/srv/pypi"));
        assert_eq!(config.url_prefix(), "/pypi");
        assert_eq!(config.uploads.duplicate_policy, DuplicatePolicy::AllowIdentical);
        assert_eq!(config.limits.max_upload_size_mb, 5);
        assert!(!config.storage.listing_cache);
    }

    #[test]
    fn test_serve_without_flags_keeps_config() {
        let mut config = Config::default();
        ServeArgs::default().apply(&mut config);
        assert_eq!(config.server.port, 8080);
        assert!(config.storage.listing_cache);
    }

    #[test]
    fn test_files_command_parses() {
        let cli = Cli::try_parse_from(["pyindex", "files", "Foo_Bar", "--root", "/tmp/x"]).unwrap();
        match cli.command {
            Commands::Files { project, root } => {
                assert_eq!(project, "Foo_Bar");
                assert_eq!(root, Some(PathBuf::from("/tmp/x")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_describe_entry() {
        let entry = FileEntry {
            filename: "foo-1.0rc1.tar.gz".to_string(),
            version: pyindex_core::parse_version("foo-1.0rc1.tar.gz"),
            sha256: "abc".to_string(),
            size: 1,
            uploaded_at: chrono::Utc::now(),
        };
        assert_eq!(describe_entry(&entry), "foo-1.0rc1.tar.gz\t1.0rc1\tabc");
    }
}
