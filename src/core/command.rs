//! Flashing tool command lines
//!
//! Builds the argument lists for each operation. The program and its leading
//! arguments (`python -m esptool`) are added by the runner.

use std::path::Path;

use super::plan::{ArtifactSource, FlashPlan};
use super::settings::Settings;

/// Reset performed before the command runs
const BEFORE_RESET: &str = "default_reset";

/// Reboot the device when the command ends
pub const AFTER_HARD_RESET: &str = "hard_reset";

/// Leave the device alone when the command ends
pub const AFTER_NO_RESET: &str = "no_reset";

fn common_args(settings: &Settings, port: &str) -> Vec<String> {
    vec![
        "--chip".to_string(),
        settings.chip().to_string(),
        "--port".to_string(),
        port.to_string(),
    ]
}

fn reset_policy(args: &mut Vec<String>, after: &str) {
    args.extend([
        "--before".to_string(),
        BEFORE_RESET.to_string(),
        "--after".to_string(),
        after.to_string(),
    ]);
}

/// `write_flash` with every planned artifact in ascending offset order
///
/// `boot_selector` is the synthesized sector; it is required when the plan
/// contains one and ignored otherwise.
pub fn flash_args(
    settings: &Settings,
    port: &str,
    plan: &FlashPlan,
    boot_selector: Option<&Path>,
) -> Vec<String> {
    let mut args = common_args(settings, port);
    args.extend(["--baud".to_string(), settings.baud().to_string()]);
    reset_policy(&mut args, AFTER_HARD_RESET);
    args.extend([
        "write_flash".to_string(),
        "-z".to_string(),
        "--flash_mode".to_string(),
        settings.flash_mode().to_string(),
        "--flash_freq".to_string(),
        settings.flash_freq().to_string(),
        "--flash_size".to_string(),
        settings.flash_size().to_string(),
    ]);

    for artifact in plan.artifacts() {
        let path = match &artifact.source {
            ArtifactSource::File { path, .. } => path.as_path(),
            ArtifactSource::Synthesized => match boot_selector {
                Some(path) => path,
                None => continue,
            },
        };
        args.push(artifact.offset_arg());
        args.push(path.display().to_string());
    }
    args
}

/// `erase_flash`, rebooting the device afterwards
pub fn erase_args(settings: &Settings, port: &str) -> Vec<String> {
    let mut args = common_args(settings, port);
    reset_policy(&mut args, AFTER_HARD_RESET);
    args.push("erase_flash".to_string());
    args
}

/// `flash_id`, leaving the device running its current firmware
pub fn read_info_args(settings: &Settings, port: &str) -> Vec<String> {
    let mut args = common_args(settings, port);
    reset_policy(&mut args, AFTER_NO_RESET);
    args.push("flash_id".to_string());
    args
}

/// Lightweight read-only command used to force a reboot after flashing
pub fn reset_args(settings: &Settings, port: &str) -> Vec<String> {
    let mut args = common_args(settings, port);
    args.extend([
        "--after".to_string(),
        AFTER_HARD_RESET.to_string(),
        "read_mac".to_string(),
    ]);
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::plan::ArtifactPaths;
    use std::path::PathBuf;

    fn plan(with_partitions: bool) -> FlashPlan {
        let paths = ArtifactPaths {
            bootloader: Some(PathBuf::from("bootloader.bin")),
            partition_table: with_partitions.then(|| PathBuf::from("partitions.bin")),
            firmware: Some(PathBuf::from("firmware.bin")),
            filesystem: None,
        };
        FlashPlan::build_with(&paths, |_| Ok(20_000)).unwrap().plan
    }

    /// Value following `name` in `args`
    fn flag<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
        args.windows(2)
            .find(|w| w[0] == name)
            .map(|w| w[1].as_str())
    }

    #[test]
    fn test_flash_args() {
        let settings = Settings::default();
        let boot_selector = Path::new("/tmp/ba.bin");
        let args = flash_args(&settings, "/dev/ttyUSB0", &plan(true), Some(boot_selector));

        assert_eq!(flag(&args, "--chip"), Some("esp32s3"));
        assert_eq!(flag(&args, "--port"), Some("/dev/ttyUSB0"));
        assert_eq!(flag(&args, "--baud"), Some("460800"));
        assert_eq!(flag(&args, "--before"), Some("default_reset"));
        assert_eq!(flag(&args, "--after"), Some("hard_reset"));
        assert_eq!(flag(&args, "--flash_mode"), Some("dio"));
        assert_eq!(flag(&args, "--flash_freq"), Some("80m"));
        assert_eq!(flag(&args, "--flash_size"), Some("16MB"));
        assert_eq!(flag(&args, "write_flash"), Some("-z"));

        let tail: Vec<_> = args.iter().skip_while(|a| *a != "16MB").skip(1).collect();
        assert_eq!(
            tail,
            [
                "0x0",
                "bootloader.bin",
                "0x8000",
                "partitions.bin",
                "0xe000",
                "/tmp/ba.bin",
                "0x10000",
                "firmware.bin",
            ]
        );
    }

    #[test]
    fn test_flash_args_without_partitions() {
        let args = flash_args(&Settings::default(), "COM3", &plan(false), None);
        let tail: Vec<_> = args.iter().skip_while(|a| *a != "16MB").skip(1).collect();
        assert_eq!(tail, ["0x0", "bootloader.bin", "0x10000", "firmware.bin"]);
    }

    #[test]
    fn test_erase_args() {
        let args = erase_args(&Settings::default(), "/dev/ttyACM0");
        assert_eq!(flag(&args, "--port"), Some("/dev/ttyACM0"));
        assert_eq!(flag(&args, "--before"), Some("default_reset"));
        assert_eq!(flag(&args, "--after"), Some("hard_reset"));
        assert_eq!(args.last().map(String::as_str), Some("erase_flash"));
        assert!(!args.contains(&"--baud".to_string()));
    }

    #[test]
    fn test_read_info_does_not_reboot() {
        let args = read_info_args(&Settings::default(), "/dev/ttyACM0");
        assert_eq!(flag(&args, "--after"), Some("no_reset"));
        assert_eq!(args.last().map(String::as_str), Some("flash_id"));
    }

    #[test]
    fn test_reset_args() {
        let args = reset_args(&Settings::default(), "/dev/ttyACM0");
        assert_eq!(flag(&args, "--chip"), Some("esp32s3"));
        assert_eq!(flag(&args, "--after"), Some("hard_reset"));
        assert_eq!(args.last().map(String::as_str), Some("read_mac"));
    }
}
