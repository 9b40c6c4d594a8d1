//! Command-line client for the Conduit server.

mod ipc_client;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use conduit_core::protocol::{
    BuildManifestFileRequest, GenerateBuildManifestFileListCommand,
    GetSealedDirectoryContentCommand, LogMessageCommand, MaterializeFileCommand,
    RegisterBuildManifestHashesCommand, ReportStatisticsCommand,
};
use conduit_core::{DirectoryHandle, FileHandle};
use ipc_client::IpcClient;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "conduitctl")]
#[command(about = "Send commands to a running Conduit server")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct ConnectionArgs {
    /// Server socket path
    #[arg(long, env = "CONDUIT_SOCKET", default_value = "/tmp/conduit.sock")]
    socket: PathBuf,

    /// Connection retries while the server is starting
    #[arg(long, default_value_t = 0)]
    connect_retries: u32,
}

#[derive(Subcommand)]
enum Commands {
    /// Place a file's content on local disk
    MaterializeFile {
        /// Declared path of the file
        path: PathBuf,
        /// Rewrite count of the file handle; omit to materialize by path
        #[arg(long)]
        rewrite_count: Option<u32>,
    },
    /// Resolve and record manifest hashes for files of a drop
    RegisterHashes {
        /// Drop name
        #[arg(long)]
        drop_name: String,
        /// JSON file with an array of {relative_path, source_hash, full_path}
        #[arg(long)]
        files: PathBuf,
    },
    /// Print the generated file list of a drop
    GenerateFileList {
        /// Drop name
        drop_name: String,
    },
    /// Merge numeric statistics into the server's table
    ReportStatistics {
        /// Statistics as key=value pairs
        #[arg(value_name = "KEY=VALUE", value_parser = parse_statistic, required = true)]
        stats: Vec<(String, i64)>,
    },
    /// List the members of a sealed directory
    SealedDirectory {
        /// Directory path of the seal
        path: PathBuf,
        /// Seal id of the directory handle
        #[arg(long)]
        seal_id: u32,
        /// Declared path, if different from the handle path
        #[arg(long)]
        full_path: Option<PathBuf>,
    },
    /// Write a message to the server log
    Log {
        message: String,
        /// Log at warning level
        #[arg(long, default_value_t = false)]
        warning: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries command output only
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let Cli {
        connection,
        command,
    } = Cli::parse();
    let mut client =
        IpcClient::connect(&connection.socket, connection.connect_retries).await?;

    match command {
        Commands::MaterializeFile {
            path,
            rewrite_count,
        } => {
            let file = rewrite_count.map(|count| FileHandle::new(&path, count));
            client
                .send(MaterializeFileCommand {
                    file,
                    full_path: path.clone(),
                })
                .await?;
            println!("materialized {}", path.display());
        }
        Commands::RegisterHashes { drop_name, files } => {
            handle_register_hashes(&mut client, drop_name, &files).await?;
        }
        Commands::GenerateFileList { drop_name } => {
            let list = client
                .send(GenerateBuildManifestFileListCommand { drop_name })
                .await?;
            print_json(&list)?;
        }
        Commands::ReportStatistics { stats } => {
            let stats: BTreeMap<String, i64> = stats.into_iter().collect();
            client.send(ReportStatisticsCommand { stats }).await?;
        }
        Commands::SealedDirectory {
            path,
            seal_id,
            full_path,
        } => {
            let full_path = full_path.unwrap_or_else(|| path.clone());
            let files = client
                .send(GetSealedDirectoryContentCommand {
                    directory: DirectoryHandle::new(path, seal_id),
                    full_path,
                })
                .await?;
            print_json(&files)?;
        }
        Commands::Log { message, warning } => {
            client
                .send(LogMessageCommand {
                    message,
                    is_warning: warning,
                })
                .await?;
        }
    }

    Ok(())
}

async fn handle_register_hashes(
    client: &mut IpcClient,
    drop_name: String,
    files_path: &std::path::Path,
) -> Result<()> {
    let content = tokio::fs::read(files_path)
        .await
        .with_context(|| format!("failed to read {}", files_path.display()))?;
    let files: Vec<BuildManifestFileRequest> = serde_json::from_slice(&content)
        .with_context(|| format!("invalid file list in {}", files_path.display()))?;
    let total = files.len();

    let failed = client
        .send(RegisterBuildManifestHashesCommand { drop_name, files })
        .await?;

    if failed.is_empty() {
        println!("registered {total} file(s)");
        return Ok(());
    }

    for entry in &failed {
        eprintln!(
            "  failed: {} ({})",
            entry.relative_path,
            entry.full_file_path.display()
        );
    }
    anyhow::bail!(
        "{} of {total} file(s) could not be resolved",
        failed.len()
    )
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_statistic(s: &str) -> Result<(String, i64), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    let value = value
        .trim()
        .parse::<i64>()
        .map_err(|e| format!("invalid value for '{key}': {e}"))?;
    Ok((key.to_string(), value))
}
