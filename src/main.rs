//! Resolve paths and list directories through a cached virtual tree.
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use thiserror::Error;
use tracing::{debug, error};

mod app_config;
mod trc;

use vfs_dircache::fs::{LocalBackend, Lookup, Node, Vfs, VfsError};

use crate::app_config::Config;
use crate::trc::Trc;

#[derive(Parser)]
#[command(
    version,
    long_version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("VERGEN_GIT_SHA"), ")"),
    about = "Directory children cache over a local filesystem."
)]
struct Args {
    #[arg(
        short,
        long,
        value_parser,
        help = "Optional path to a vfs-dircache config TOML."
    )]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve one or more paths, sharing one cache across all of them.
    Lookup {
        /// Directory the tree is rooted at.
        root: PathBuf,

        /// Paths relative to the root.
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// List the children of a directory.
    Ls {
        /// Directory the tree is rooted at.
        root: PathBuf,

        /// Directory relative to the root.
        #[arg(default_value = "")]
        dir: String,

        /// Fetch the full listing from disk instead of printing cached entries only.
        #[arg(short, long)]
        refresh: bool,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Vfs(#[from] VfsError),

    #[error("No such directory: {0}")]
    NoSuchDirectory(String),
}

fn open(root: PathBuf, config: Config) -> Result<Vfs<LocalBackend>, VfsError> {
    let backend = LocalBackend::new(root, config.backend)?;
    Vfs::new(backend, config.tree)
}

fn describe(vfs: &Vfs<LocalBackend>, node: &Node) -> Result<String, VfsError> {
    let kind = if node.is_directory() { "dir " } else { "file" };
    Ok(format!("{kind} {:>8} {}", node.id().to_string(), vfs.path_of(node)?))
}

fn run(command: Command, config: Config) -> Result<(), CliError> {
    match command {
        Command::Lookup { root, paths } => {
            let vfs = open(root, config)?;
            for path in &paths {
                match vfs.lookup_path(vfs.root(), path)? {
                    Lookup::Resolved(node) => println!("{}", describe(&vfs, &node)?),
                    Lookup::Negative => println!("missing  {path}"),
                }
            }
        }
        Command::Ls { root, dir, refresh } => {
            let vfs = open(root, config)?;
            let Some(node) = vfs
                .lookup_path(vfs.root(), &dir)?
                .into_node()
                .filter(|n| n.is_directory())
            else {
                return Err(CliError::NoSuchDirectory(dir));
            };
            // `lookup` alone caches nothing below `dir`, so a listing without
            // refresh is empty on a fresh tree.
            let children = if refresh {
                vfs.refresh_children(&node)?
            } else {
                vfs.children(&node)?
            };
            for child in &children {
                println!("{}", describe(&vfs, child)?);
            }
        }
    }
    Ok(())
}

/// Main entry point for the application.
fn main() -> ExitCode {
    let args = Args::parse();

    // Errors use eprintln since tracing isn't initialized yet.
    let config = Config::load_or_default(args.config_path.as_deref()).unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {e}");
        std::process::exit(1);
    });

    if let Err(e) = Trc::default().init() {
        eprintln!(
            "Failed to initialize logging. Without logging, we can't provide any useful error \
             messages, so we have to exit: {e}"
        );
        std::process::exit(1);
    }
    debug!(config = ?config, "Loaded configuration.");

    match run(args.command, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
