///
/// This module implements the CLI interface for gh-uploader: command parsing,
/// reading the selected files, and printing the run's status feed.
///
/// All upload decisions (change detection, splitting, progress accounting) live in
/// the [`gh-uploader-core`] crate. This module is strictly host glue.
///
/// ## How To Use
/// - From the shell: `gh-uploader upload --config upload.yaml notes.txt big.log`
/// - Programmatically / in tests: call [`run`] with a constructed [`Cli`].
///
/// [`gh-uploader-core`]: ../../gh-uploader-core/
use crate::github::GitHubClient;
use crate::load_config::load_config;
use anyhow::Result;
use clap::{Parser, Subcommand};
use gh_uploader_core::{upload_files, LocalFileUnit, RunState, UploadError, UploadEvent};
use std::path::PathBuf;

/// CLI for gh-uploader: push local files into a GitHub repository.
#[derive(Parser)]
#[clap(
    name = "gh-uploader",
    version,
    about = "Upload local files into a GitHub repository, skipping unchanged files and splitting large ones"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload the given files to the repository named in the config file
    Upload {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Override the branch from the config file
        #[clap(long)]
        branch: Option<String>,
        /// Files to upload, in order
        #[clap(required = true)]
        files: Vec<PathBuf>,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Upload {
            config,
            branch,
            files,
        } => {
            let mut config = load_config(config)?;
            if let Some(branch) = branch {
                tracing::info!(branch = %branch, "Branch overridden from command line");
                config.target.branch = branch;
            }
            tracing::info!(command = "upload", files = files.len(), "Starting upload");

            let client = GitHubClient::new()?.with_api_base(config.api_base.clone());
            let selection = files.into_iter().map(read_local_file);

            println!("Uploading...");
            let report = upload_files(
                config.target,
                config.options,
                &client,
                selection,
                print_event,
            )
            .await?;

            println!(
                "Uploaded: {}, skipped: {}, failed: {}",
                report.uploaded(),
                report.skipped(),
                report.failed()
            );

            if report.state == RunState::Aborted {
                let detail = report.abort_detail.unwrap_or_default();
                tracing::error!(command = "upload", detail = %detail, "Upload aborted");
                anyhow::bail!("Upload aborted: {detail}");
            }
            if report.failed() > 0 {
                tracing::error!(command = "upload", failed = report.failed(), "Upload finished with failures");
                anyhow::bail!("{} file(s) failed to upload", report.failed());
            }
            tracing::info!(command = "upload", ?report, "Upload complete");
            Ok(())
        }
    }
}

/// Read one selected file into an upload unit named after its base name.
fn read_local_file(path: PathBuf) -> Result<LocalFileUnit, UploadError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| UploadError::Selection(format!("{} is not a file", path.display())))?;
    let content = std::fs::read(&path).map_err(|e| {
        tracing::error!(error = ?e, path = %path.display(), "Failed to read selected file");
        UploadError::Selection(format!("{}: {e}", path.display()))
    })?;
    tracing::debug!(path = %path.display(), size = content.len(), "Read selected file");
    Ok(LocalFileUnit::new(name, content))
}

fn print_event(event: &UploadEvent) {
    match event {
        UploadEvent::Status(status) => match status.detail() {
            Some(_) => println!("❌ {status}"),
            None => println!("✅ {status}"),
        },
        UploadEvent::Progress(progress) => println!(
            "Progress: {}% ({}/{})",
            progress.percent(),
            progress.completed_units,
            progress.total_units
        ),
        UploadEvent::Completed(_) => println!("Upload complete."),
        UploadEvent::Aborted { detail } => eprintln!("❌ Error: {detail}"),
    }
}
