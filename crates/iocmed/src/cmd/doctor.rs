use std::path::Path;

use iocmed_channel::{
    ChannelId, ChannelTable, DevicePathProbe, PlatformProbe, VirtualUart, EARLY_SIGNAL_PATH,
};
use serde::Serialize;

use crate::cmd::{load_config, DoctorArgs};
use crate::exit::{CliResult, HEALTH_CHECK_FAILED, SUCCESS};
use crate::output::OutputFormat;

#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Pass,
    Fail,
    Info,
    Skip,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    name: &'static str,
    status: CheckStatus,
    detail: String,
}

#[derive(Debug, Serialize)]
struct DoctorOutput {
    checks: Vec<CheckResult>,
    overall: &'static str,
}

pub fn run(args: DoctorArgs, format: OutputFormat) -> CliResult<i32> {
    let config = load_config(args.config.as_deref())?;
    let table = ChannelTable::new(&config.channels, &config.virtual_uart);

    let checks = vec![
        platform_probe_check(),
        pty_allocation_check(),
        lifecycle_channel_check(&table),
        native_channels_check(&table),
        compiled_features_check(),
    ];

    let has_fail = checks.iter().any(|c| matches!(c.status, CheckStatus::Fail));
    let output = DoctorOutput {
        checks,
        overall: if has_fail { "fail" } else { "pass" },
    };
    print_doctor(&output, format);

    if has_fail {
        Ok(HEALTH_CHECK_FAILED)
    } else {
        Ok(SUCCESS)
    }
}

fn print_doctor(output: &DoctorOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => crate::output::print_json(output),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("iocmed doctor\n");
            for c in &output.checks {
                println!(
                    "  [{:>4}] {:<20} {}",
                    status_text(c.status),
                    c.name,
                    c.detail
                );
            }
            if output.overall == "pass" {
                println!("\n  Result: all checks passed");
            } else {
                println!("\n  Result: one or more checks failed");
            }
        }
        OutputFormat::Raw => println!("{}", output.overall),
    }
}

fn status_text(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Pass => "PASS",
        CheckStatus::Fail => "FAIL",
        CheckStatus::Info => "INFO",
        CheckStatus::Skip => "SKIP",
    }
}

fn platform_probe_check() -> CheckResult {
    let (status, detail) = if DevicePathProbe::default().is_supported() {
        (CheckStatus::Pass, format!("{EARLY_SIGNAL_PATH} present"))
    } else {
        (
            CheckStatus::Fail,
            format!("{EARLY_SIGNAL_PATH} missing; CBC driver not attached"),
        )
    };
    CheckResult {
        name: "platform_probe",
        status,
        detail,
    }
}

fn pty_allocation_check() -> CheckResult {
    let dir = std::env::temp_dir().join(format!(
        "iocmed-doctor-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default()
    ));
    let result = std::fs::create_dir_all(&dir)
        .map_err(|err| err.to_string())
        .and_then(|()| VirtualUart::open(dir.join("vuart")).map_err(|err| err.to_string()))
        .map(|uart| uart.slave_path().display().to_string());
    let _ = std::fs::remove_dir_all(&dir);

    match result {
        Ok(slave) => CheckResult {
            name: "pty_allocation",
            status: CheckStatus::Pass,
            detail: format!("allocated {slave}"),
        },
        Err(err) => CheckResult {
            name: "pty_allocation",
            status: CheckStatus::Fail,
            detail: err,
        },
    }
}

fn lifecycle_channel_check(table: &ChannelTable) -> CheckResult {
    let id = ChannelId::Lifecycle;
    if !table.is_enabled(id) {
        return CheckResult {
            name: "lifecycle_channel",
            status: CheckStatus::Skip,
            detail: "disabled in configuration".to_string(),
        };
    }
    match table.path(id) {
        Some(path) if path.exists() => CheckResult {
            name: "lifecycle_channel",
            status: CheckStatus::Pass,
            detail: format!("{} present", path.display()),
        },
        Some(path) => CheckResult {
            name: "lifecycle_channel",
            status: CheckStatus::Fail,
            detail: format!("{} missing", path.display()),
        },
        None => CheckResult {
            name: "lifecycle_channel",
            status: CheckStatus::Fail,
            detail: "no device path configured".to_string(),
        },
    }
}

fn native_channels_check(table: &ChannelTable) -> CheckResult {
    let enabled: Vec<&Path> = ChannelId::ALL
        .into_iter()
        .filter(|id| id.is_native() && table.is_enabled(*id))
        .filter_map(|id| table.path(id))
        .collect();
    let present = enabled.iter().filter(|path| path.exists()).count();
    CheckResult {
        name: "native_channels",
        status: CheckStatus::Info,
        detail: format!("{present} of {} enabled devices present", enabled.len()),
    }
}

fn compiled_features_check() -> CheckResult {
    let mut features = Vec::new();
    if cfg!(feature = "mediator") {
        features.push("mediator");
    }
    if cfg!(feature = "cli") {
        features.push("cli");
    }

    CheckResult {
        name: "compiled_features",
        status: CheckStatus::Info,
        detail: features.join(", "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doctor_output_has_overall_status() {
        let output = DoctorOutput {
            checks: vec![CheckResult {
                name: "x",
                status: CheckStatus::Pass,
                detail: "ok".to_string(),
            }],
            overall: "pass",
        };
        let json = serde_json::to_string(&output).unwrap();
        assert!(json.contains("\"overall\":\"pass\""));
        assert!(json.contains("\"status\":\"pass\""));
    }

    #[test]
    fn disabled_lifecycle_is_skipped() {
        let table = ChannelTable::new(&[], "");
        let check = lifecycle_channel_check(&table);
        assert!(matches!(check.status, CheckStatus::Skip));
    }
}
