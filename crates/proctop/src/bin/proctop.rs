//! proctop: interactive terminal process monitor
//!
//! Run: cargo run -p proctop --bin proctop

use std::fs::File;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use proctop::monitor::{App, MonitorConfig, SysinfoProvider};
use proctop::terminal::{CrosstermBackend, GenericTerminal};
use proctop::{ColorMode, MonitorError};

/// Interactive process monitor: browse, inspect and terminate processes
#[derive(Parser)]
#[command(name = "proctop", version, about, long_about = None)]
struct Cli {
    /// Refresh interval in milliseconds (overrides the config file)
    #[arg(short, long, value_name = "MS")]
    refresh: Option<u64>,

    /// Path to custom config file (YAML)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Dump default configuration to stdout and exit
    #[arg(long)]
    dump_config: bool,

    /// Force-kill processes that ignore the terminate request
    #[arg(long)]
    escalate: bool,

    /// Disable colors (use plain text)
    #[arg(long)]
    no_color: bool,

    /// Write logs to this file (filter with PROCTOP_LOG)
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Render once to stdout and exit
    #[arg(long)]
    render_once: bool,

    /// Terminal width for render-once mode
    #[arg(long, default_value = "120")]
    width: u16,

    /// Terminal height for render-once mode
    #[arg(long, default_value = "40")]
    height: u16,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.dump_config {
        print!("{}", MonitorConfig::default_yaml());
        return ExitCode::SUCCESS;
    }

    if let Err(err) = init_logging(cli.log_file.as_deref()) {
        eprintln!("proctop: cannot open log file: {err}");
        return ExitCode::FAILURE;
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "proctop exited with an error");
            eprintln!("proctop: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Logs go to a file or nowhere; stdout belongs to the UI.
fn init_logging(log_file: Option<&std::path::Path>) -> io::Result<()> {
    let filter = EnvFilter::try_from_env("PROCTOP_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    match log_file {
        Some(path) => {
            let file = File::create(path)?;
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .try_init();
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::sink)
                .try_init();
        }
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<(), MonitorError> {
    let mut config = MonitorConfig::load(cli.config.as_deref())?;
    if let Some(refresh) = cli.refresh {
        config.refresh_ms = refresh.max(1);
    }
    if cli.escalate {
        config.termination.escalate = true;
    }

    let color_mode = if cli.no_color {
        ColorMode::Mono
    } else {
        ColorMode::detect()
    };
    let mut app = App::new(SysinfoProvider::new(), config).with_color_mode(color_mode);

    if cli.render_once {
        // CPU usage needs two samples
        app.refresh()?;
        std::thread::sleep(Duration::from_millis(200));
        let buffer = app.render_once(cli.width, cli.height)?;
        let mut stdout = io::stdout().lock();
        for y in 0..buffer.height() {
            writeln!(stdout, "{}", buffer.row_text(y))?;
        }
        stdout.flush()?;
        return Ok(());
    }

    if !io::stdout().is_terminal() {
        return Err(MonitorError::TerminalNotAvailable);
    }

    tracing::info!(
        refresh_ms = app.config().refresh_ms,
        escalate = app.config().termination.escalate,
        "starting monitor"
    );
    let mut terminal = GenericTerminal::new(CrosstermBackend::new());
    app.run(&mut terminal)
}
