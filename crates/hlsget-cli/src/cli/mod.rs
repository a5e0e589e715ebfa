//! CLI for the hlsget download manager.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use hlsget_core::config;
use hlsget_core::state_db::StateDb;

use commands::{run_add, run_cancel, run_downloads, run_pause, run_remove, run_resume, run_status};

/// Top-level CLI for the hlsget download manager.
#[derive(Debug, Parser)]
#[command(name = "hlsget")]
#[command(about = "hlsget: segmented HLS stream downloader", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Queue a new download job for a manifest URL.
    Add {
        /// HTTP/HTTPS URL of the .m3u8 manifest.
        url: String,
        /// Human title used for the output filename.
        #[arg(long)]
        title: Option<String>,
    },

    /// Process queued jobs until the queue is empty.
    Run {
        /// Optionally queue this manifest URL first.
        url: Option<String>,
        /// Human title for the queued URL.
        #[arg(long)]
        title: Option<String>,
        /// Write artifacts here instead of the configured download directory.
        #[arg(long, value_name = "DIR")]
        out: Option<std::path::PathBuf>,
    },

    /// Show status of all jobs.
    Status,

    /// Pause a queued or downloading job by its ID.
    Pause {
        /// Job identifier.
        id: i64,
    },

    /// Resume a paused job by its ID.
    Resume {
        /// Job identifier.
        id: i64,
    },

    /// Cancel a job and discard its partial data.
    Cancel {
        /// Job identifier.
        id: i64,
    },

    /// Remove a job row (and any leftover chunks) by ID.
    Remove {
        /// Job identifier.
        id: i64,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let db = StateDb::open_default().await?;

        match cli.command {
            CliCommand::Add { url, title } => run_add(&db, &url, title.as_deref()).await?,
            CliCommand::Run { url, title, out } => {
                run_downloads(&db, &cfg, url.as_deref(), title.as_deref(), out).await?;
            }
            CliCommand::Status => run_status(&db).await?,
            CliCommand::Pause { id } => run_pause(&db, id).await?,
            CliCommand::Resume { id } => run_resume(&db, id).await?,
            CliCommand::Cancel { id } => run_cancel(&db, id).await?,
            CliCommand::Remove { id } => run_remove(&db, id).await?,
        }

        Ok(())
    }
}
