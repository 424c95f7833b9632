//! CLI command implementations
//!
//! Each command is implemented in its own submodule.

pub mod doctor;
pub mod erase;
pub mod flash;
pub mod info;

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Subcommand;

use crate::core::settings::Settings;
use crate::infra::dirs::OtaflashDirs;

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Flash firmware images onto a board
    Flash {
        /// Serial port of the board (e.g. /dev/ttyUSB0 or COM4)
        #[arg(short, long)]
        port: String,

        /// Application image, written to the first OTA slot
        #[arg(short, long)]
        firmware: PathBuf,

        /// Second-stage bootloader image
        #[arg(long)]
        bootloader: Option<PathBuf>,

        /// Partition table image
        #[arg(long)]
        partitions: Option<PathBuf>,

        /// Filesystem image
        #[arg(long)]
        filesystem: Option<PathBuf>,

        /// Override the configured baud rate
        #[arg(short, long)]
        baud: Option<u32>,

        /// Skip confirmation prompts
        #[arg(short, long)]
        yes: bool,
    },

    /// Erase the entire flash of a board
    Erase {
        /// Serial port of the board
        #[arg(short, long)]
        port: String,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Read chip and flash information from a board
    Info {
        /// Serial port of the board
        #[arg(short, long)]
        port: String,
    },

    /// Check that the flashing tool is installed and settings are valid
    Doctor,
}

impl Commands {
    /// Execute the command
    pub async fn run(self) -> Result<()> {
        match self {
            Self::Flash {
                port,
                firmware,
                bootloader,
                partitions,
                filesystem,
                baud,
                yes,
            } => {
                let args = flash::FlashArgs {
                    port,
                    firmware,
                    bootloader,
                    partitions,
                    filesystem,
                    baud,
                    yes,
                };
                flash::execute(args).await
            }
            Self::Erase { port, yes } => erase::execute(&port, yes).await,
            Self::Info { port } => info::execute(&port).await,
            Self::Doctor => doctor::execute().await,
        }
    }
}

/// Load settings from the config directory
pub(crate) fn load_settings(dirs: &OtaflashDirs) -> Result<Settings> {
    let settings = Settings::load(dirs).context("Failed to load settings")?;
    tracing::debug!("Loaded settings from {}", dirs.settings_path().display());
    Ok(settings)
}

/// Ask the user to confirm `question`
///
/// `--yes` answers for them. Without a terminal there is nobody to ask,
/// so the operation is refused.
pub(crate) fn confirm(question: &str, yes: bool) -> Result<()> {
    if yes {
        return Ok(());
    }

    if !io::stdin().is_terminal() {
        bail!(
            "Cannot prompt for confirmation in non-interactive mode.\n\
             Use --yes to skip confirmation."
        );
    }

    eprint!("   {question} [y/N] ");
    io::stderr().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    let input = input.trim().to_lowercase();
    if input != "y" && input != "yes" {
        bail!("Operation cancelled by user.");
    }

    Ok(())
}
