//! REPL – Read-Eval-Print Loop for the helm interactive shell.
//!
//! Supported slash-commands:
//!   /help                              – show this list
//!   /status [json]                     – print the latest tick report
//!   /tick [n]                          – run n control ticks (default 1)
//!   /run <seconds>                     – run ticks at the configured rate
//!   /input <controller> <axis> <value> – set a pilot input (x y z pitch yaw roll)
//!   /pilot <controller> on|off         – mark a controller as piloted
//!   /speed <controller> <value>        – set the vehicle speed seen by a controller
//!   /profile [arg]                     – show or switch the active profile (`!name` toggles)
//!   /rescan                            – re-read every configuration line next tick
//!   /save                              – write the state file
//!   /quit | /exit                      – exit (state is saved on the way out)

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use helm_hal::SimVehicle;
use helm_runtime::{HelmLoop, TickOutcome, TickReport};
use helm_types::{Severity, Vector2};

use crate::config;

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Pilot input axis addressed by `/input`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
    Pitch,
    Yaw,
    Roll,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Status { json: bool },
    Tick(u32),
    Run(f32),
    Input { controller: String, axis: Axis, value: f32 },
    Pilot { controller: String, on: bool },
    Speed { controller: String, value: f32 },
    Profile(Option<String>),
    Rescan,
    Save,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, String> {
        let mut words = line.split_whitespace();
        let head = words.next().unwrap_or_default();
        let args: Vec<&str> = words.collect();
        let cmd = match (head, args.as_slice()) {
            ("/help", []) => Command::Help,
            ("/status", []) => Command::Status { json: false },
            ("/status", ["json"]) => Command::Status { json: true },
            ("/tick", []) => Command::Tick(1),
            ("/tick", [n]) => Command::Tick(n.parse().map_err(|_| format!("'{n}' is not a tick count"))?),
            ("/run", [s]) => Command::Run(seconds(s)?),
            ("/input", [c, a, v]) => Command::Input {
                controller: c.to_string(),
                axis: axis(a)?,
                value: number(v)?,
            },
            ("/pilot", [c, "on"]) => Command::Pilot { controller: c.to_string(), on: true },
            ("/pilot", [c, "off"]) => Command::Pilot { controller: c.to_string(), on: false },
            ("/speed", [c, v]) => Command::Speed {
                controller: c.to_string(),
                value: number(v)?,
            },
            ("/profile", []) => Command::Profile(None),
            ("/profile", [p]) => Command::Profile(Some(p.to_string())),
            ("/rescan", []) => Command::Rescan,
            ("/save", []) => Command::Save,
            ("/quit" | "/exit", []) => Command::Quit,
            _ => return Err(format!("Unknown command: '{}'", line.trim())),
        };
        Ok(cmd)
    }
}

fn number(raw: &str) -> Result<f32, String> {
    raw.parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("'{raw}' is not a number"))
}

fn seconds(raw: &str) -> Result<f32, String> {
    number(raw).and_then(|s| {
        if s > 0.0 {
            Ok(s)
        } else {
            Err("duration must be positive".to_string())
        }
    })
}

fn axis(raw: &str) -> Result<Axis, String> {
    match raw.to_ascii_lowercase().as_str() {
        "x" => Ok(Axis::X),
        "y" => Ok(Axis::Y),
        "z" => Ok(Axis::Z),
        "pitch" => Ok(Axis::Pitch),
        "yaw" => Ok(Axis::Yaw),
        "roll" => Ok(Axis::Roll),
        other => Err(format!("unknown axis '{other}' (x y z pitch yaw roll)")),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// Everything the REPL drives: the loop, the simulated vehicle, and where to
/// save state.
pub struct Session {
    pub helm: HelmLoop,
    pub vehicle: SimVehicle,
    tick_seconds: f32,
    state_path: PathBuf,
    last: Option<TickReport>,
}

impl Session {
    pub fn new(helm: HelmLoop, vehicle: SimVehicle, tick_seconds: f32, state_path: PathBuf) -> Self {
        Self {
            helm,
            vehicle,
            tick_seconds,
            state_path,
            last: None,
        }
    }

    /// One control tick followed by one physics step.
    pub fn step(&mut self, argument: Option<&str>) -> &TickReport {
        let report = self.helm.tick(&mut self.vehicle.registry, self.tick_seconds, argument);
        self.vehicle.advance(self.tick_seconds);
        self.last.insert(report)
    }

    pub fn save(&self) -> Result<PathBuf, String> {
        config::write_state(&self.state_path, &self.helm.save_state())?;
        Ok(self.state_path.clone())
    }

    /// Run one command.  Returns `false` when the REPL should exit.
    pub fn execute(&mut self, cmd: Command, shutdown: &AtomicBool) -> Result<bool, String> {
        match cmd {
            Command::Help => cmd_help(),
            Command::Status { json } => match &self.last {
                None => println!("  {}", "No ticks yet. Try /tick.".dimmed()),
                Some(r) if json => println!(
                    "{}",
                    serde_json::to_string_pretty(r).map_err(|e| format!("Failed to encode report: {e}"))?
                ),
                Some(r) => print_report(r),
            },
            Command::Tick(n) => {
                for _ in 0..n {
                    if shutdown.load(Ordering::SeqCst) {
                        break;
                    }
                    self.step(None);
                }
                self.print_last();
            }
            Command::Run(secs) => {
                let ticks = (secs / self.tick_seconds).round().max(1.0) as u64;
                let pause = std::time::Duration::from_secs_f32(self.tick_seconds);
                for _ in 0..ticks {
                    if shutdown.load(Ordering::SeqCst) {
                        break;
                    }
                    self.step(None);
                    std::thread::sleep(pause);
                }
                self.print_last();
            }
            Command::Input { controller, axis, value } => {
                let handle = self.controller(&controller)?;
                match axis {
                    Axis::X | Axis::Y | Axis::Z => {
                        let mut m = handle.movement();
                        match axis {
                            Axis::X => m.x = value,
                            Axis::Y => m.y = value,
                            _ => m.z = value,
                        }
                        handle.set_movement(m);
                    }
                    Axis::Pitch => {
                        let r = handle.rotation();
                        handle.set_rotation(Vector2::new(value, r.y));
                    }
                    Axis::Yaw => {
                        let r = handle.rotation();
                        handle.set_rotation(Vector2::new(r.x, value));
                    }
                    Axis::Roll => handle.set_roll(value),
                }
                println!("  {} {controller} {axis:?} = {value}", "✓".green());
            }
            Command::Pilot { controller, on } => {
                self.controller(&controller)?.set_under_control(on);
                println!("  {} {controller} piloted: {on}", "✓".green());
            }
            Command::Speed { controller, value } => {
                self.controller(&controller)?.set_speed(value);
                println!("  {} {controller} speed = {value}", "✓".green());
            }
            Command::Profile(None) => {
                println!("  Active profile: {}", self.helm.active_profile().bold());
            }
            Command::Profile(Some(arg)) => {
                self.step(Some(&arg));
                println!("  Active profile: {}", self.helm.active_profile().bold());
            }
            Command::Rescan => {
                self.helm.request_rescan();
                println!("  {} Configuration will be re-read on the next tick.", "✓".green());
            }
            Command::Save => {
                let path = self.save()?;
                println!("  {} State saved to {}", "✓".green(), path.display().to_string().bold());
            }
            Command::Quit => {
                println!("{}", "Goodbye.".green());
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn controller(&self, id: &str) -> Result<&helm_hal::SimControllerHandle, String> {
        self.vehicle
            .controller(id)
            .ok_or_else(|| format!("no controller with id '{id}'"))
    }

    fn print_last(&self) {
        if let Some(r) = &self.last {
            print_report(r);
        }
    }
}

fn print_report(report: &TickReport) {
    let text = report.to_string();
    let mut lines = text.lines();
    if let Some(header) = lines.next() {
        match report.outcome {
            TickOutcome::Actuated => println!("{}", header.bold()),
            TickOutcome::Skipped => println!("{}", header.dimmed()),
            TickOutcome::NoController => println!("{}", header.yellow().bold()),
        }
    }
    for line in lines {
        let trimmed = line.trim_start();
        if trimmed.starts_with("[error]") {
            println!("{}", line.red());
        } else if trimmed.starts_with("[warn]") {
            println!("{}", line.yellow());
        } else {
            println!("{line}");
        }
    }
    let errors = report
        .diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .count();
    if errors > 0 {
        println!("  {} configuration error(s) this tick", errors.to_string().red().bold());
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Loop
// ─────────────────────────────────────────────────────────────────────────────

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
pub fn run(session: &mut Session, shutdown: Arc<AtomicBool>) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        print!("{} ", format!("helm[{}]>", session.helm.active_profile()).bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        let cmd = line.trim();
        if cmd.is_empty() {
            continue;
        }

        match Command::parse(cmd).and_then(|c| session.execute(c, &shutdown)) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => println!("{} Type {} for available commands.", e.red(), "/help".bold()),
        }
    }
}

fn cmd_help() {
    println!();
    println!("{}", "helm Commands".bold().underline());
    println!("  {}                 – latest tick report", "/status [json]".bold().cyan());
    println!("  {}                      – run n control ticks", "/tick [n]".bold().cyan());
    println!("  {}                – run ticks in real time", "/run <seconds>".bold().cyan());
    println!("  {} – set a pilot input", "/input <ctl> <axis> <value>".bold().cyan());
    println!("  {}         – mark a controller piloted", "/pilot <ctl> on|off".bold().cyan());
    println!("  {}         – set vehicle speed", "/speed <ctl> <value>".bold().cyan());
    println!("  {}                – show or switch profile (!name toggles)", "/profile [arg]".bold().cyan());
    println!("  {}                        – re-read configuration lines", "/rescan".bold().cyan());
    println!("  {}                          – write the state file", "/save".bold().cyan());
    println!("  {}                  – exit, saving state", "/quit  /exit".bold().cyan());
    println!();
}
