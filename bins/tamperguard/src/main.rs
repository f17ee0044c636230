//! tamperguard CLI
//!
//! Reference host for the debugger guard and the integrity verifier.

mod output;
mod report;

use anyhow::Result;
use clap::{Parser, Subcommand};
use output::{format_count, Status};
use report::SecurityReport;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tamperguard_core::config::{Config, IntegritySettings};
use tamperguard_core::dispatch::MainQueue;
use tamperguard_core::error::{exit_codes, Error};
use tamperguard_debugger::{DebuggerCheckConfig, DebuggerGuard, DebuggerObservation, MonitorState};
use tamperguard_integrity::{checks_from_settings, InstalledBundle, IntegrityVerdict, IntegrityVerifier};
use tamperguard_telemetry::{metrics, Event, TelemetryConfig};

#[derive(Parser)]
#[command(name = "tamperguard")]
#[command(about = "Debugger attachment and package integrity checks")]
#[command(version)]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Application bundle to verify (overrides integrity.bundle_path)
    #[arg(long, global = true)]
    bundle: Option<PathBuf>,

    /// Installed bundle identifier, instead of reading Info.plist
    #[arg(long, global = true)]
    bundle_id: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prevent attachment, probe for a debugger and verify the bundle once
    Check,

    /// Probe for a debugger repeatedly until one attaches or Ctrl-C
    Watch {
        /// Milliseconds between probes (overrides debugger.interval_ms)
        #[arg(long)]
        interval_ms: Option<u64>,
    },

    /// Print the SHA-256 of a file for use as an expected digest
    Digest {
        /// File to hash, usually embedded.mobileprovision
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        owo_colors::set_override(false);
    }

    let exit_code = match &cli.command {
        Commands::Digest { file } => {
            tamperguard_telemetry::init_with_config(
                TelemetryConfig::default()
                    .with_verbosity(cli.verbose)
                    .with_ansi(!cli.no_color),
            )?;
            run_digest(file, cli.json)
        }
        Commands::Check => match load_config(&cli) {
            Ok(config) => {
                init_logging(&config, &cli)?;
                run_check(&config, cli.json)
            }
            Err(e) => fail(&e),
        },
        Commands::Watch { interval_ms } => match load_config(&cli) {
            Ok(config) => {
                init_logging(&config, &cli)?;
                let interval_ms = interval_ms.unwrap_or(config.schema.debugger.interval_ms);
                if interval_ms == 0 {
                    fail(&Error::config_invalid("--interval-ms must be greater than zero"))
                } else {
                    run_watch(&config, Duration::from_millis(interval_ms), cli.json)
                }
            }
            Err(e) => fail(&e),
        },
    };

    tracing::debug!(metrics = %metrics().export_json(), "Session metrics");
    std::process::exit(exit_code);
}

/// Load config and apply command-line overrides
fn load_config(cli: &Cli) -> tamperguard_core::Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;

    if let Some(bundle) = &cli.bundle {
        config.schema.integrity.bundle_path = Some(bundle.clone());
    }
    if let Some(bundle_id) = &cli.bundle_id {
        config.schema.integrity.bundle_id_override = Some(bundle_id.clone());
    }
    Ok(config)
}

fn init_logging(config: &Config, cli: &Cli) -> Result<()> {
    tamperguard_telemetry::init_with_config(
        TelemetryConfig::from(&config.schema.telemetry)
            .with_verbosity(cli.verbose)
            .with_ansi(!cli.no_color),
    )?;
    if let Some(path) = &config.path {
        tracing::debug!(path = %path.display(), "Loaded configuration");
    }
    Ok(())
}

/// Print an error and map it to the process exit status
fn fail(error: &Error) -> i32 {
    Status::error(&error.to_string());
    error.code.exit_code()
}

fn run_digest(file: &Path, json: bool) -> i32 {
    match tamperguard_crypto::sha256_file(file) {
        Ok(digest) => {
            if json {
                let value = serde_json::json!({
                    "file": file.display().to_string(),
                    "sha256": digest,
                });
                println!("{}", value);
            } else {
                println!("{}", digest);
            }
            exit_codes::SUCCESS
        }
        Err(e) => {
            Status::error(&e.to_string());
            exit_codes::FAILURE
        }
    }
}

fn run_check(config: &Config, json: bool) -> i32 {
    let guard = DebuggerGuard::platform(DebuggerCheckConfig::from(&config.schema.debugger));
    let prevention = guard.prevent_attachment();
    let observation = guard.observe();

    let (evaluated, verdict) = match verify_integrity(&config.schema.integrity) {
        Ok(result) => result,
        Err(e) => return fail(&e),
    };

    let report = SecurityReport::new(
        guard.environment(),
        &prevention,
        &observation,
        evaluated,
        verdict,
    );
    emit(&report, json)
}

fn run_watch(config: &Config, interval: Duration, json: bool) -> i32 {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => return fail(&Error::from(e).with_context("starting the async runtime")),
    };
    let _enter = runtime.enter();

    let guard = Arc::new(DebuggerGuard::platform(DebuggerCheckConfig::from(
        &config.schema.debugger,
    )));
    let prevention = guard.prevent_attachment();

    let (evaluated, verdict) = match verify_integrity(&config.schema.integrity) {
        Ok(result) => result,
        Err(e) => return fail(&e),
    };
    if verdict.tampered {
        let report = SecurityReport::new(
            guard.environment(),
            &prevention,
            &guard.observe(),
            evaluated,
            verdict,
        );
        return emit(&report, json);
    }

    let queue = MainQueue::new();
    let interrupted = Arc::new(AtomicBool::new(false));
    let alert_status = Arc::new(OnceLock::new());

    {
        let handle = queue.handle();
        let interrupted = Arc::clone(&interrupted);
        runtime.spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                // Posting wakes the main loop.
                let _ = handle.invoke(move || interrupted.store(true, Ordering::SeqCst));
            }
        });
    }

    let on_detected = {
        let handle = queue.handle();
        let environment = guard.environment();
        let alert_status = Arc::clone(&alert_status);
        move |observation: DebuggerObservation| {
            // Fire and forget; the background context must not block on the main loop.
            let _ = handle.invoke(move || {
                let report =
                    SecurityReport::new(environment, &prevention, &observation, evaluated, verdict);
                let _ = alert_status.set(emit(&report, json));
            });
        }
    };

    let checks = guard.start_continuous_checks(interval, on_detected);
    if !json {
        Status::info(&format!(
            "Watching for debuggers every {}ms (Ctrl-C to stop)",
            interval.as_millis()
        ));
    }

    loop {
        queue.run_next(Duration::from_millis(200));

        if let Some(&status) = alert_status.get() {
            return status;
        }
        if interrupted.load(Ordering::SeqCst) {
            checks.stop();
            if !json {
                Status::success("Stopped, no debugger detected");
            }
            return exit_codes::SUCCESS;
        }
        if checks.state() == MonitorState::Stopped {
            Status::error("Continuous checks ended unexpectedly");
            return exit_codes::FAILURE;
        }
    }
}

/// Run the configured checks; returns how many ran and the verdict.
fn verify_integrity(
    settings: &IntegritySettings,
) -> tamperguard_core::Result<(usize, IntegrityVerdict)> {
    let checks = checks_from_settings(settings);
    if checks.is_empty() {
        tracing::info!("No integrity checks configured");
        return Ok((0, IntegrityVerdict::default()));
    }

    let bundle = InstalledBundle::from_settings(settings)?;
    tracing::debug!(bundle = %bundle.root().display(), checks = checks.len(), "Verifying bundle");
    let verdict = IntegrityVerifier::new(bundle).evaluate(&checks);
    Ok((checks.len(), verdict))
}

fn emit(report: &SecurityReport, json: bool) -> i32 {
    if json {
        match serde_json::to_string_pretty(report) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                Status::error(&format!("Failed to serialize report: {}", e));
                return exit_codes::FAILURE;
            }
        }
    } else {
        print_report(report);
    }

    if report.compromised() {
        if let Ok(data) = serde_json::to_value(report) {
            Event::new("security.alert", data).log();
        }
        exit_codes::SECURITY_ERROR
    } else {
        exit_codes::SUCCESS
    }
}

fn print_report(report: &SecurityReport) {
    Status::header("tamperguard");
    Status::info(&format!("Environment: {}", report.environment));
    if report.prevention_applied {
        Status::success("Debugger attachment prevention applied");
    } else {
        Status::warning(&format!("Debugger attachment prevention {}", report.prevention));
    }
    for error in &report.debugger.probe_errors {
        Status::warning(error);
    }

    if let Some(message) = report.alert_message() {
        output::alert(&message);
        for outcome in &report.integrity.failed_checks {
            eprintln!("- {}: {}", outcome.check.kind(), outcome.check);
        }
        return;
    }

    Status::success("No debugger detected");
    if report.checks_evaluated == 0 {
        Status::info("No integrity checks configured");
    } else {
        Status::success(&format!(
            "Integrity verified ({} passed)",
            format_count(report.checks_evaluated, "check", "checks")
        ));
    }
}
