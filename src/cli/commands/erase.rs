//! CLI command implementation for `otaflash erase`

use anyhow::{bail, Context, Result};

use crate::cli::commands::{confirm, load_settings};
use crate::cli::output::{print_info, print_warning, render_session, report_result};
use crate::core::flasher::Flasher;
use crate::core::observer::ChannelObserver;
use crate::infra::dirs::OtaflashDirs;

/// Execute the erase command
pub async fn execute(port: &str, yes: bool) -> Result<()> {
    let dirs = OtaflashDirs::new();
    let settings = load_settings(&dirs)?;

    print_warning(&format!(
        "This erases the entire flash of the board on {port}, including stored settings."
    ));
    confirm("Erase the board?", yes)?;

    let flasher = Flasher::from_settings(settings);
    let (observer, rx) = ChannelObserver::new();

    print_info(&format!("Erasing flash on {port}..."));
    let (result, ()) = tokio::join!(
        async move { flasher.erase(port, &observer).await },
        render_session(rx, None)
    );
    let result = result.context("Cannot start erase")?;

    report_result(&result, "Flash erased");
    if !result.is_success() {
        bail!("Erase operation failed");
    }

    Ok(())
}
