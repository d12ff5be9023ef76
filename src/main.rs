use std::fs::File;
use std::io::stdout;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use log::{error, info};
use ratatui::{Terminal, backend::CrosstermBackend};
use simplelog::{Config, LevelFilter, WriteLogger};

use panels::app::{App, run_app_with_event_source};
use panels::event_source::KeyboardEventSource;
use panels::panic_handler;
use panels::reader::{Reader, SessionStatus};
use panels::settings;

/// How long headless mode waits for an archive to finish decoding
const HEADLESS_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Parser)]
#[command(name = "panels")]
#[command(about = "Read .cbz, .cbr and .cbt comic archives in the terminal")]
#[command(version)]
struct Cli {
    /// Comic archive to open
    file: Option<PathBuf>,

    /// Decode without a UI and print a page summary
    #[arg(long)]
    headless: bool,

    /// With --headless, print every worker message as a JSON line
    #[arg(long, requires = "headless")]
    events: bool,

    /// Log file path
    #[arg(long, default_value = "panels.log")]
    log_file: PathBuf,

    /// Log level: error, warn, info, debug, trace
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = cli.log_level.parse().unwrap_or(LevelFilter::Info);
    WriteLogger::init(
        level,
        Config::default(),
        File::create(&cli.log_file)
            .with_context(|| format!("cannot create log file {:?}", cli.log_file))?,
    )?;
    info!("Starting panels");

    if cli.headless {
        let Some(path) = cli.file else {
            bail!("--headless needs a FILE");
        };
        return run_headless(path, cli.events);
    }

    panic_handler::initialize_panic_handler();
    settings::load_settings();

    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new();
    if let Some(path) = cli.file {
        app.open(path);
    }
    let res = run_app_with_event_source(&mut terminal, &mut app, &mut KeyboardEventSource);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    app.reader.teardown();
    app.reader.reset();

    if let Err(err) = res {
        error!("Application error: {err:?}");
        println!("{err:?}");
    }

    info!("Shutting down panels");
    Ok(())
}

fn run_headless(path: PathBuf, print_events: bool) -> Result<()> {
    let mut reader = Reader::new();
    if print_events {
        reader.record_messages();
    }

    reader
        .open_path(&path)
        .with_context(|| format!("cannot open {path:?}"))?;

    let deadline = std::time::Instant::now() + HEADLESS_TIMEOUT;
    while !reader.status().is_settled() && std::time::Instant::now() < deadline {
        reader.pump_blocking(Duration::from_millis(100));
        for message in reader.take_recorded() {
            println!("{}", serde_json::to_string(&message)?);
        }
    }
    for message in reader.take_recorded() {
        println!("{}", serde_json::to_string(&message)?);
    }

    let status = reader.status();
    if let Some(notification) = reader.notifications().current() {
        eprintln!("{}", notification.display_text());
    }

    println!("{:>6}  {:>6}  {:>6}  {}", "page", "width", "height", "url");
    for page in reader.pages().iter() {
        println!(
            "{:>6}  {:>6}  {:>6}  {}",
            page.index, page.width, page.height, page.url
        );
    }
    println!(
        "{} pages, status {status:?}",
        reader.total().unwrap_or(reader.pages().len())
    );

    reader.teardown();
    reader.reset();

    if status == SessionStatus::Failed {
        bail!("could not read {path:?}");
    }
    Ok(())
}
