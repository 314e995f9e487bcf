//! Ambiance deck CLI - declarative environments on Elgato Stream Deck keys.
//!
//! Provides both human-friendly and agent-friendly (robot mode) interfaces.
#![forbid(unsafe_code)]

use std::io::{self, IsTerminal};
use std::time::Duration;

use ambiance::cli::{self, Cli, Commands};
use ambiance::config::load_config;
use ambiance::device::{BackgroundWorkers, DeckTransport, ElgatoTransport, select_device};
use ambiance::dispatch::{
    CapacityPolicy, DispatchEvent, DispatchOptions, Dispatcher, KeyFailurePolicy, SyncReport,
};
use ambiance::error::AmbianceError;
use ambiance::logging::init_logging;
use ambiance::render::{KeyRenderer, LabelFont};
use ambiance::resolve::ImageResolver;
use anyhow::{Context, Result, bail};
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

/// Build information embedded at compile time.
mod build_info {
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");

    pub fn git_sha() -> &'static str {
        option_env!("VERGEN_GIT_SHA").unwrap_or("unknown")
    }

    pub fn git_dirty() -> &'static str {
        option_env!("VERGEN_GIT_DIRTY").unwrap_or("false")
    }

    pub fn build_timestamp() -> &'static str {
        option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("unknown")
    }

    pub fn rustc_semver() -> &'static str {
        option_env!("VERGEN_RUSTC_SEMVER").unwrap_or("unknown")
    }

    pub fn target() -> &'static str {
        option_env!("VERGEN_CARGO_TARGET_TRIPLE").unwrap_or("unknown")
    }
}

fn main() {
    let cli = Cli::parse();

    // Handle no-color flag or non-TTY
    if cli.no_color || !io::stdout().is_terminal() {
        console::set_colors_enabled(false);
    }
    if cli.no_color || !io::stderr().is_terminal() {
        console::set_colors_enabled_stderr(false);
    }

    init_logging(cli.robot, cli.verbose, cli.quiet);

    if let Err(e) = run(&cli) {
        output_error(&cli, &e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Devices => cmd_devices(cli),
        Commands::Run(args) => cmd_run(cli, args),
        Commands::Validate(args) => cmd_validate(cli, args),
        Commands::Version => {
            cmd_version(cli);
            Ok(())
        }
        Commands::Completions(args) => {
            cmd_completions(args);
            Ok(())
        }
    }
}

// === Command Implementations ===

fn cmd_devices(cli: &Cli) -> Result<()> {
    let transport = ElgatoTransport::new().map_err(AmbianceError::from)?;
    let devices = transport.enumerate().map_err(AmbianceError::from)?;

    if cli.use_json() {
        output_json(cli, &devices);
    } else if devices.is_empty() {
        println!("{}", style("No Stream Deck devices found").yellow());
        println!("Ensure the device is connected via USB");
    } else {
        for d in &devices {
            let format = d.image_format.map_or_else(
                || "No visual output".to_string(),
                |f| {
                    format!(
                        "{}x{} px {}, rotated {}°, {}",
                        f.size.0,
                        f.size.1,
                        f.encoding,
                        f.rotation.degrees(),
                        f.mirror.describe()
                    )
                },
            );
            println!(
                "{}: {} ({} keys, {} grid) {}",
                style(&d.id).green(),
                d.type_name,
                d.key_count,
                d.layout,
                style(format).dim()
            );
        }
    }
    Ok(())
}

fn cmd_run(cli: &Cli, args: &cli::RunArgs) -> Result<()> {
    let loaded = load_config(&args.config)?;
    let font = args
        .font
        .as_deref()
        .map(str::parse::<LabelFont>)
        .transpose()
        .map_err(AmbianceError::Font)?
        .unwrap_or_default();

    let transport = ElgatoTransport::new().map_err(AmbianceError::from)?;
    let descriptor = transport
        .enumerate()
        .and_then(|devices| select_device(devices, args.deck.as_deref()))
        .map_err(AmbianceError::from)?;

    let dispatcher = Dispatcher::new(
        ImageResolver::new(&loaded.config_dir),
        KeyRenderer::new(font),
        DispatchOptions {
            brightness: args.brightness,
            capacity: if args.truncate {
                CapacityPolicy::Truncate
            } else {
                CapacityPolicy::Reject
            },
            on_failure: if args.continue_on_error {
                KeyFailurePolicy::Skip
            } else {
                KeyFailurePolicy::Abort
            },
            hold: args.hold.map(Duration::from_secs),
            ..DispatchOptions::default()
        },
    );

    let progress = if cli.use_json() || cli.quiet || !io::stderr().is_terminal() {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(0)
    };
    if let Ok(bar_style) = ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}") {
        progress.set_style(bar_style.progress_chars("=> "));
    }

    let workers = BackgroundWorkers::new();
    let report = dispatcher
        .run_observed(
            &loaded.config,
            &transport,
            &descriptor,
            &workers,
            &mut |event| match event {
                DispatchEvent::Started { total } => {
                    progress.set_length(u64::try_from(*total).unwrap_or(u64::MAX));
                }
                DispatchEvent::KeyUpdated { assignment } => {
                    progress.set_message(assignment.label.clone());
                    progress.inc(1);
                }
                DispatchEvent::KeyFailed { assignment, .. } => {
                    progress.println(format!(
                        "{} key {} ({})",
                        style("skipped").yellow(),
                        assignment.key,
                        assignment.environment
                    ));
                    progress.inc(1);
                }
                DispatchEvent::Finished => progress.finish_and_clear(),
            },
        )
        .with_context(|| format!("Failed to apply {}", loaded.path.display()));
    progress.finish_and_clear();
    let report = report?;

    output_report(cli, &report);
    if !report.failed.is_empty() {
        bail!(
            "{} of {} keys could not be prepared",
            report.failed.len(),
            report.failed.len() + report.assigned.len()
        );
    }
    Ok(())
}

fn cmd_validate(cli: &Cli, args: &cli::ValidateArgs) -> Result<()> {
    let loaded = load_config(&args.config)?;
    let config = &loaded.config;

    if cli.use_json() {
        output_json(
            cli,
            &serde_json::json!({
                "valid": true,
                "path": loaded.path.display().to_string(),
                "title": config.title,
                "environments": config.environments.keys().collect::<Vec<_>>(),
            }),
        );
    } else if !cli.quiet {
        println!(
            "{} {} is valid",
            style("✓").green().bold(),
            loaded.path.display()
        );
        println!(
            "  {} environments, {} actions, {} images",
            config.environments.len(),
            config.actions.len(),
            config.components.images.len()
        );
    }
    Ok(())
}

fn cmd_version(cli: &Cli) {
    if cli.use_json() {
        output_json(
            cli,
            &serde_json::json!({
                "version": build_info::VERSION,
                "git_sha": build_info::git_sha(),
                "git_dirty": build_info::git_dirty() == "true",
                "build_timestamp": build_info::build_timestamp(),
                "rustc_version": build_info::rustc_semver(),
                "target": build_info::target(),
            }),
        );
    } else {
        println!("ambiance {}", build_info::VERSION);
        println!(
            "git: {}{}",
            build_info::git_sha(),
            if build_info::git_dirty() == "true" {
                " (dirty)"
            } else {
                ""
            }
        );
        println!("built: {}", build_info::build_timestamp());
        println!("rustc: {}", build_info::rustc_semver());
        println!("target: {}", build_info::target());
    }
}

fn cmd_completions(args: &cli::CompletionsArgs) {
    use clap::CommandFactory;
    clap_complete::generate(args.shell, &mut Cli::command(), "ambiance", &mut io::stdout());
}

// === Utility Functions ===

fn output_report(cli: &Cli, report: &SyncReport) {
    if cli.use_json() {
        output_json(cli, report);
        return;
    }
    if cli.quiet {
        return;
    }
    for assignment in &report.assigned {
        println!(
            "{} key {:>2}  {}",
            style("✓").green(),
            assignment.key,
            assignment.label
        );
    }
    for failure in &report.failed {
        println!(
            "{} key {:>2}  {}: {}",
            style("✗").red(),
            failure.key,
            failure.environment,
            failure.error
        );
    }
    for skipped in &report.skipped {
        println!("{} {skipped}: no key left", style("-").dim());
    }
    println!(
        "{} environments applied to {}",
        report.assigned.len(),
        style(&report.device_id).bold()
    );
}

fn output_json<T: Serialize>(cli: &Cli, data: &T) {
    let json = if cli.use_compact_json() {
        serde_json::to_string(data)
    } else {
        serde_json::to_string_pretty(data)
    };
    match json {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Failed to serialize output: {e}"),
    }
}

fn output_error(cli: &Cli, error: &anyhow::Error) {
    let known = error.downcast_ref::<AmbianceError>();
    // `validate` has just listed every issue; no need to point back at it.
    let validating = matches!(cli.command, Commands::Validate(_));
    let suggestion = known
        .filter(|e| !(validating && matches!(e, AmbianceError::Validation(_))))
        .and_then(AmbianceError::suggestion);

    if cli.use_json() {
        let mut json = serde_json::json!({
            "error": true,
            "message": format!("{error:#}"),
            "suggestion": suggestion,
            "recoverable": known.is_some_and(AmbianceError::is_user_recoverable),
        });
        if let Some(AmbianceError::Validation(validation)) = known {
            json["issues"] = serde_json::to_value(&validation.issues).unwrap_or_default();
        }
        match serde_json::to_string_pretty(&json) {
            Ok(text) => eprintln!("{text}"),
            Err(_) => eprintln!("{error:#}"),
        }
    } else {
        eprintln!("{}: {error:#}", style("Error").red().bold());
        if let Some(suggestion) = suggestion {
            eprintln!("{}: {}", style("Hint").yellow(), suggestion);
        }
    }
}
