//! CLI command implementation for `otaflash flash`

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::cli::commands::{confirm, load_settings};
use crate::cli::output::{
    create_flash_bar, is_json, is_quiet, print_detail, print_info, print_warning, render_session,
    report_result,
};
use crate::core::flasher::Flasher;
use crate::core::observer::ChannelObserver;
use crate::core::plan::{ArtifactPaths, ArtifactSource, FlashPlan, PlanReport};
use crate::infra::dirs::OtaflashDirs;

/// Arguments of the flash command
#[derive(Debug, Clone)]
pub struct FlashArgs {
    pub port: String,
    pub firmware: PathBuf,
    pub bootloader: Option<PathBuf>,
    pub partitions: Option<PathBuf>,
    pub filesystem: Option<PathBuf>,
    pub baud: Option<u32>,
    pub yes: bool,
}

/// Execute the flash command
pub async fn execute(args: FlashArgs) -> Result<()> {
    let dirs = OtaflashDirs::new();
    let mut settings = load_settings(&dirs)?;
    if let Some(baud) = args.baud {
        settings.flash.baud = Some(baud);
    }

    let paths = ArtifactPaths {
        bootloader: args.bootloader,
        partition_table: args.partitions,
        firmware: Some(args.firmware),
        filesystem: args.filesystem,
    };
    let report = FlashPlan::build(&paths).context("Cannot build flash plan")?;

    print_plan(&report);

    if !report.issues.is_empty() {
        for issue in &report.issues {
            print_warning(&issue.message);
        }
        confirm("Some images look wrong. Flash anyway?", args.yes)?;
    }
    confirm(
        &format!(
            "Flash {} image(s) to the board on {}? Keep it connected until done.",
            report.plan.len(),
            args.port
        ),
        args.yes,
    )?;

    let flasher = Arc::new(Flasher::from_settings(settings));
    let (observer, rx) = ChannelObserver::new();
    let session = tokio::spawn({
        let flasher = Arc::clone(&flasher);
        let port = args.port.clone();
        let plan = report.plan;
        async move { flasher.flash(&port, plan, &observer).await }
    });

    let bar = (!is_quiet() && !is_json()).then(create_flash_bar);
    render_session(rx, bar).await;

    let result = session.await.context("Flash session panicked")??;
    report_result(&result, &format!("Board on {} flashed", args.port));

    if !result.is_success() {
        bail!("Flash operation failed");
    }

    Ok(())
}

fn print_plan(report: &PlanReport) {
    print_info("Flash plan:");
    for artifact in report.plan.artifacts() {
        let source = match &artifact.source {
            ArtifactSource::File { path, size } => {
                format!("{} ({size} bytes)", path.display())
            }
            ArtifactSource::Synthesized => "generated".to_string(),
        };
        print_detail(&format!(
            "{:<10} {:<16} {source}",
            artifact.offset_arg(),
            artifact.kind.label()
        ));
    }
}
