mod actions;
mod app;
mod cli;
mod config;
mod limiter;
mod state;
mod store;
mod ui;
mod update;
mod view;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    init_logging();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match cli::parse(&args) {
        Ok(cli::CliAction::Ui) => {
            let mut app = app::App::initialize()?;
            ui::run(&mut app)
        }
        Ok(cli::CliAction::Command(command)) => cli::run(command),
        Err(err) => {
            eprintln!("{err}");
            cli::print_help();
            std::process::exit(2);
        }
    }
}

/// Logs go to a file in the data dir; the terminal belongs to the TUI.
fn init_logging() {
    let Ok(data_dir) = config::base_data_dir() else {
        return;
    };
    if std::fs::create_dir_all(&data_dir).is_err() {
        return;
    }
    let Ok(file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(data_dir.join("arcadesmith.log"))
    else {
        return;
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::sync::Arc::new(file))
        .with_ansi(false)
        .try_init();
}
