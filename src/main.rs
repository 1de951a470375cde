use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;

use wordrill::app::App;
use wordrill::config::Config;
use wordrill::store::json_store::{read_export, write_export};
use wordrill::store::{JsonStore, PersistenceBridge};

#[derive(Parser)]
#[command(name = "wordrill", version, about = "Terminal vocabulary drill with adaptive word selection")]
struct Cli {
    #[arg(short, long, help = "Directory holding vocabulary.json and activity.json")]
    data_dir: Option<PathBuf>,

    #[arg(short, long, help = "Random jitter added to scores before selection")]
    noise: Option<f64>,

    #[arg(short, long, help = "Print vocabulary statistics and exit")]
    stats: bool,

    #[arg(long, value_name = "PATH", help = "Write a full backup to PATH and exit")]
    export: Option<PathBuf>,

    #[arg(long, value_name = "PATH", help = "Replace stored data with the backup at PATH and exit")]
    import: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("wordrill=warn")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = Config::load().unwrap_or_else(|err| {
        eprintln!(
            "Could not read {}: {err:#}. Using default settings.",
            Config::config_path().display()
        );
        Config::default()
    });
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir.to_string_lossy().to_string();
    }
    if let Some(noise) = cli.noise {
        config.noise_amplitude = noise;
    }
    config.validate();

    let store = JsonStore::open(config.data_path())
        .with_context(|| format!("opening data directory {}", config.data_dir))?;
    if store.check_interrupted_import()? {
        eprintln!("Found leftovers from an interrupted import; they have been resolved.");
    }

    if let Some(path) = cli.import {
        let data = read_export(&path)?;
        store.import_all(&data)?;
        println!("Imported {}", path.display());
        return Ok(());
    }
    if let Some(path) = cli.export {
        let data = store.export_all(&config)?;
        write_export(&path, &data)?;
        println!("Exported to {}", path.display());
        return Ok(());
    }

    let bridge = PersistenceBridge::new(store);
    if cli.stats {
        let session = bridge.load()?;
        let summary = session.summarize(Utc::now().date_naive(), &config.stats_options());
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let mut app = App::new(config, bridge, Utc::now())?;
    run_app(&mut app)
}

fn run_app(app: &mut App<JsonStore>) -> Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut stdout = io::stdout();

    loop {
        for line in app.take_output() {
            writeln!(stdout, "{line}")?;
        }
        if app.is_finished() {
            return Ok(());
        }
        write!(stdout, "{}", app.prompt())?;
        stdout.flush()?;

        let result = match lines.next() {
            Some(line) => app.handle(&line?, Utc::now()),
            None => {
                writeln!(stdout)?;
                app.finish(Utc::now())?;
                for line in app.take_output() {
                    writeln!(stdout, "{line}")?;
                }
                // Input is gone, so a failed save cannot be retried interactively.
                if !app.is_finished() {
                    anyhow::bail!("session could not be saved");
                }
                return Ok(());
            }
        };
        if let Err(err) = result {
            eprintln!("Error: {err:#}");
        }
    }
}
