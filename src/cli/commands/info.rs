//! CLI command implementation for `otaflash info`

use anyhow::{bail, Context, Result};

use crate::cli::commands::load_settings;
use crate::cli::output::{print_info, render_session, report_result};
use crate::core::flasher::Flasher;
use crate::core::observer::ChannelObserver;
use crate::infra::dirs::OtaflashDirs;

/// Execute the info command
pub async fn execute(port: &str) -> Result<()> {
    let dirs = OtaflashDirs::new();
    let settings = load_settings(&dirs)?;

    let flasher = Flasher::from_settings(settings);
    let (observer, rx) = ChannelObserver::new();

    print_info(&format!("Reading board information on {port}..."));
    let (result, ()) = tokio::join!(
        async move { flasher.read_info(port, &observer).await },
        render_session(rx, None)
    );
    let result = result.context("Cannot start read")?;

    report_result(&result, "Board information read");
    if !result.is_success() {
        bail!("Could not read board information");
    }

    Ok(())
}
