use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::Serialize;
use whipwire_render::NativeFlappyRenderer;
use whipwire_transport::{UdpReceiver, DEFAULT_PORT};

use crate::cmd::{DoctorArgs, ResourceArgs};
use crate::exit::{CliResult, HEALTH_CHECK_FAILED, SUCCESS};
use crate::output::OutputFormat;

#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Pass,
    Fail,
    Warn,
    Info,
    Skip,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    name: &'static str,
    status: CheckStatus,
    detail: String,
}

impl CheckResult {
    fn new(name: &'static str, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name,
            status,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DoctorOutput {
    checks: Vec<CheckResult>,
    overall: &'static str,
}

pub fn run(args: DoctorArgs, format: OutputFormat) -> CliResult<i32> {
    let checks = vec![
        platform_transport_check(),
        udp_loopback_check(),
        unix_datagram_check(),
        gif_dir_check(&args.resources),
        flappy_lib_check(&args.resources),
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
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(output).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("whipwire doctor\n");
            for c in &output.checks {
                println!(
                    "  [{:>4}] {:<18} {}",
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
        OutputFormat::Raw => {
            println!("{}", output.overall);
        }
    }
}

fn status_text(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Pass => "PASS",
        CheckStatus::Fail => "FAIL",
        CheckStatus::Warn => "WARN",
        CheckStatus::Info => "INFO",
        CheckStatus::Skip => "SKIP",
    }
}

fn platform_transport_check() -> CheckResult {
    if cfg!(unix) {
        CheckResult::new(
            "platform_transport",
            CheckStatus::Pass,
            "udp and unix datagram endpoints available",
        )
    } else {
        CheckResult::new(
            "platform_transport",
            CheckStatus::Info,
            "udp endpoints only (unix datagram sockets unavailable)",
        )
    }
}

fn udp_loopback_check() -> CheckResult {
    let ephemeral = SocketAddr::from((Ipv4Addr::LOCALHOST, 0));
    if let Err(err) = UdpReceiver::bind(ephemeral) {
        return CheckResult::new(
            "udp_loopback",
            CheckStatus::Fail,
            format!("loopback bind failed: {err}"),
        );
    }

    // The default port being taken usually means a consumer is already up.
    match UdpReceiver::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT))) {
        Ok(_) => CheckResult::new(
            "udp_loopback",
            CheckStatus::Pass,
            format!("loopback bind ok; port {DEFAULT_PORT} free"),
        ),
        Err(err) => CheckResult::new(
            "udp_loopback",
            CheckStatus::Warn,
            format!("port {DEFAULT_PORT} unavailable: {err}"),
        ),
    }
}

fn unix_datagram_check() -> CheckResult {
    #[cfg(unix)]
    {
        use whipwire_transport::UnixDatagramReceiver;

        let dir = std::env::temp_dir().join(format!("whipwire-doctor-{}", std::process::id()));
        if let Err(err) = std::fs::create_dir_all(&dir) {
            return CheckResult::new(
                "unix_datagram",
                CheckStatus::Fail,
                format!("{} not writable: {err}", dir.display()),
            );
        }
        let result = UnixDatagramReceiver::bind(dir.join("doctor.sock"));
        let status = match &result {
            Ok(_) => CheckResult::new(
                "unix_datagram",
                CheckStatus::Pass,
                format!("socket bind in {} succeeded", dir.display()),
            ),
            Err(err) => CheckResult::new(
                "unix_datagram",
                CheckStatus::Fail,
                format!("socket bind in {} failed: {err}", dir.display()),
            ),
        };
        drop(result);
        let _ = std::fs::remove_dir_all(&dir);
        status
    }

    #[cfg(not(unix))]
    {
        CheckResult::new(
            "unix_datagram",
            CheckStatus::Skip,
            "unix datagram sockets not available on this platform",
        )
    }
}

fn gif_dir_check(resources: &ResourceArgs) -> CheckResult {
    let Some(dir) = &resources.gif_dir else {
        return CheckResult::new(
            "gif_dir",
            CheckStatus::Skip,
            "WHIPWIRE_GIF_DIR not set; gif frames will be ignored",
        );
    };
    if !dir.is_dir() {
        return CheckResult::new(
            "gif_dir",
            CheckStatus::Fail,
            format!("{} is not a directory", dir.display()),
        );
    }
    match count_gifs(dir) {
        Ok(0) => CheckResult::new(
            "gif_dir",
            CheckStatus::Warn,
            format!("{} holds no .gif files", dir.display()),
        ),
        Ok(n) => CheckResult::new(
            "gif_dir",
            CheckStatus::Pass,
            format!("{} holds {n} .gif files", dir.display()),
        ),
        Err(err) => CheckResult::new(
            "gif_dir",
            CheckStatus::Fail,
            format!("{} unreadable: {err}", dir.display()),
        ),
    }
}

fn count_gifs(dir: &Path) -> std::io::Result<usize> {
    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("gif")) {
            count += 1;
        }
    }
    Ok(count)
}

fn flappy_lib_check(resources: &ResourceArgs) -> CheckResult {
    if resources.no_flappy {
        return CheckResult::new("flappy_lib", CheckStatus::Skip, "disabled by --no-flappy");
    }
    let path = resources
        .flappy_lib
        .clone()
        .unwrap_or_else(|| PathBuf::from(NativeFlappyRenderer::default_library()));
    match NativeFlappyRenderer::load(&path) {
        Ok(renderer) => CheckResult::new(
            "flappy_lib",
            CheckStatus::Pass,
            format!("{} loaded", renderer.path().display()),
        ),
        // Optional resource: flappy state is ignored without it.
        Err(err) if resources.flappy_lib.is_none() => {
            CheckResult::new("flappy_lib", CheckStatus::Warn, err.to_string())
        }
        Err(err) => CheckResult::new("flappy_lib", CheckStatus::Fail, err.to_string()),
    }
}

fn compiled_features_check() -> CheckResult {
    let mut features = Vec::new();
    if cfg!(feature = "cli") {
        features.push("cli");
    }
    if cfg!(unix) {
        features.push("unix-datagram");
    }

    CheckResult::new("compiled_features", CheckStatus::Info, features.join(", "))
}
