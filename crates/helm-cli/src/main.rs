//! `helm-cli` – helm Command Line Interface
//!
//! Runs the control loop against a simulated vehicle.  It:
//!
//! 1. Loads `~/.helm/config.toml` (defaults when absent), then applies
//!    `HELM_*` environment overrides.
//! 2. Restores the persisted state blob; a corrupt blob means a cold start.
//! 3. Drops the user into an **interactive REPL** with slash-commands
//!    (`/tick`, `/run`, `/input`, `/profile`, `/status`, `/help`).
//! 4. Saves state on exit, whether by `/quit`, end of input, or **Ctrl-C**.

mod config;
mod repl;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use helm_runtime::{HelmLoop, init_tracing};

fn main() {
    let _telemetry = init_tracing("helm");

    print_banner();

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – saving state and exiting …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; state is only saved by /save or /quit");
    }

    // ── Configuration ─────────────────────────────────────────────────────
    let mut cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!("  Config loaded from {}", config::config_path().display().to_string().bold());
            cfg
        }
        Ok(None) => {
            let cfg = config::Config::default();
            match config::save(&cfg) {
                Ok(()) => println!(
                    "  {} Demo vehicle written to {}",
                    "✓".green().bold(),
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => println!("{}: {}", "Error saving config".red(), e),
            }
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::Config::default()
        }
    };
    config::apply_env_overrides(&mut cfg);

    let mut helm = HelmLoop::new(cfg.loop_config.clone());
    let state_path = cfg.resolved_state_path();
    match config::read_state(&state_path) {
        Ok(Some(blob)) => match helm.load_state(&blob) {
            Ok(()) => println!(
                "  State restored from {} (profile {})",
                state_path.display().to_string().bold(),
                helm.active_profile().bold()
            ),
            Err(e) => println!("  {}: {} – starting cold.", "State ignored".yellow(), e),
        },
        Ok(None) => info!(path = %state_path.display(), "no saved state; cold start"),
        Err(e) => println!("  {}: {} – starting cold.", "State ignored".yellow(), e),
    }

    let vehicle = cfg.build_vehicle();
    println!(
        "  Vehicle: {} actuator(s), {} controller(s), {} Hz",
        cfg.actuators.len(),
        cfg.controllers.len(),
        1.0 / cfg.tick_seconds()
    );
    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    let mut session = repl::Session::new(helm, vehicle, cfg.tick_seconds(), state_path);

    // ── Interactive REPL ──────────────────────────────────────────────────
    repl::run(&mut session, shutdown.clone());

    match session.save() {
        Ok(path) => println!("  {} State saved to {}", "✓".green(), path.display()),
        Err(e) => println!("{}: {}", "Error saving state".red(), e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   __         __    "#.bold().cyan());
    println!("{}", r#"  / /  ___   / /_ _ "#.bold().cyan());
    println!("{}", r#" / _ \/ -_) / /  ' \"#.bold().cyan());
    println!("{}", r#"/_//_/\__/ /_/_/_/_/"#.bold().cyan());
    println!();
    println!("  {} {}", "helm".bold(), format!("v{}", env!("CARGO_PKG_VERSION")).dimmed());
    println!("  Pilot input to actuator control loop");
    println!();
}
