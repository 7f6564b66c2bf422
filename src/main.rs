use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use director::worker::{SimulatedTask, Task};
use director::{Director, DirectorSnapshot, ShiftReport};

mod cli;
mod config;

use cli::Cli;
use cli::commands::{Commands, RunArgs};
use config::Config;

fn setup_logging(default_level: Option<&str>) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("director")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("director.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    // RUST_LOG wins over the configured level
    let env = env_logger::Env::default().default_filter_or(default_level.unwrap_or("info"));
    env_logger::Builder::from_env(env)
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        None => handle_run_command(&RunArgs::default(), config, cli.is_verbose()),
        Some(Commands::Run(args)) => handle_run_command(args, config, cli.is_verbose()),
        Some(Commands::Config) => handle_config_command(config),
    }
}

fn handle_config_command(config: &Config) -> Result<()> {
    info!("Printing effective configuration");
    print!("{}", config.to_yaml()?);
    Ok(())
}

fn handle_run_command(args: &RunArgs, config: &Config, verbose: bool) -> Result<()> {
    let mut director_config = config.director.clone();
    if let Some(seed) = args.seed {
        director_config.seed = Some(seed);
    }
    let shifts = args.shifts.unwrap_or(config.shift.shifts);
    let workers = args.workers.unwrap_or(config.shift.workers);
    let canary_ratio = args.canary_ratio.unwrap_or(config.shift.canary_ratio);
    let description = args.task.clone().unwrap_or_else(|| config.shift.task.clone());
    let simulation = if args.instant {
        config.simulation.clone().instant()
    } else {
        config.simulation.clone()
    };

    info!(
        "Running {} shifts of {} workers (canary ratio {}) on '{}'",
        shifts, workers, canary_ratio, description
    );

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(async {
        let mut director = Director::new(director_config).context("Failed to start director")?;
        let task: Arc<dyn Task> =
            Arc::new(SimulatedTask::new(description, simulation).context("Invalid simulation config")?);

        if !args.json {
            println!("{}", "=".repeat(72));
            println!("{}", "DIRECTOR / WORKER PATTERN".bold());
            println!("One persistent brain. Hundreds of disposable bodies.");
            println!("{}", "=".repeat(72));
            println!("{} online - persistent identity", director.name().cyan());
        }

        if args.experimental {
            director.toggle_experimental(true);
        }

        for shift in 1..=shifts {
            if args.toggle_at.contains(&shift) {
                let enabled = !director.experimental_enabled();
                director.toggle_experimental(enabled);
                if !args.json {
                    println!(
                        "{} experimental knowledge {}",
                        "TOGGLE:".magenta(),
                        if enabled { "enabled" } else { "disabled" }
                    );
                }
            }

            let report = director
                .run_shift(workers, task.clone(), canary_ratio)
                .await
                .context(format!("Shift {} rejected", shift))?;

            if args.json {
                println!("{}", serde_json::to_string(&report)?);
            } else {
                print_report(&report, verbose);
            }
        }

        let snapshot = director.snapshot();
        if args.json {
            println!("{}", serde_json::to_string(&snapshot)?);
        } else {
            print_snapshot(&snapshot);
        }
        Ok::<(), eyre::Report>(())
    })
}

fn print_report(report: &ShiftReport, verbose: bool) {
    if report.aborted {
        println!(
            "{} Shift {} aborted: {}",
            "ABORTED:".red().bold(),
            report.shift_number,
            report.fault.as_deref().unwrap_or("unknown fault")
        );
        return;
    }

    let rate = format!("{:.3}", report.defect_rate_ema);
    let rate = if report.defect_rate_ema > 0.08 { rate.red() } else { rate.green() };
    let gate = if report.experimental_enabled {
        "Experimental knowledge active".red()
    } else {
        "All lessons safe".green()
    };
    println!(
        "Shift {:>3} | {} workers ({} canaries) | defects {} | defect rate {} | +{} lessons | {} | mood: {}",
        report.shift_number,
        report.completed,
        report.canaries,
        report.defects,
        rate,
        report.new_lessons_committed,
        gate,
        report.mood
    );

    if verbose {
        for lesson in &report.committed_lessons {
            println!("    {} {}", "learned:".cyan(), lesson);
        }
        if report.candidates_discarded > 0 {
            println!("    {} {} lesson candidates", "discarded:".yellow(), report.candidates_discarded);
        }
        if report.timed_out > 0 {
            println!("    {} {} workers", "timed out:".yellow(), report.timed_out);
        }
    }

    if report.rollback_triggered {
        println!("{}", "AUTOMATIC ROLLBACK - Defect rate too high!".red().bold());
    }
}

fn print_snapshot(snapshot: &DirectorSnapshot) {
    println!("{}", "=".repeat(72));
    println!(
        "{} after {} shifts | {} workers terminated, memory wiped | mood: {}",
        snapshot.name.cyan(),
        snapshot.shift_count,
        snapshot.total_workers_terminated,
        snapshot.mood
    );
    println!(
        "Defect rate {:.3} | {} lessons learned | {} rollbacks",
        snapshot.defect_rate_ema, snapshot.total_lessons, snapshot.rollback_count
    );
    for lesson in &snapshot.active_lessons {
        println!("  - {}", lesson);
    }
    println!("{}", "=".repeat(72));
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // Setup logging at the configured level
    setup_logging(config.log_level.as_deref()).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).context("Application failed")?;

    Ok(())
}
