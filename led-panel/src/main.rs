use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::signal;
use tokio::time::{Duration, Instant, sleep_until};
use tracing::{info, warn};

use led_blocks::interpreter::{GpioBank, PreviewConfig, Previewer, format_elapsed};
use led_blocks::{Document, init_logging};
use led_panel::{Display, FrameLibrary, Rgb, SimulatedPanel};

#[derive(Parser)]
#[command(name = "led-panel")]
#[command(about = "Preview LED block programs on a simulated panel", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Запускает программу на симулированной панели
    Run {
        /// Program JSON
        program: PathBuf,

        /// Directory with .raw images and animation folders
        #[arg(short, long)]
        assets: Option<PathBuf>,

        /// Stop after this many seconds
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Seed for random blocks
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Показать один кадр .raw
    View {
        /// 96-byte frame file
        frame: PathBuf,

        /// Pixel color
        #[arg(short, long, default_value = "#FFFFFF")]
        color: String,
    },
}

#[tokio::main]
async fn main() {
    init_logging("led_panel=info,led_blocks=info");
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { program, assets, timeout, seed } => {
            run(&program, assets.as_deref(), timeout, seed).await
        }
        Commands::View { frame, color } => view(&frame, &color),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run(
    path: &Path,
    assets: Option<&Path>,
    timeout: Option<u64>,
    seed: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let document = Document::parse(&fs::read_to_string(path)?)?;
    let library = match assets {
        Some(dir) => FrameLibrary::load_dir(dir)?,
        None => FrameLibrary::new(),
    };

    let gpio = Arc::new(GpioBank::new());
    let panel = Arc::new(SimulatedPanel::new(library, gpio.clone()));
    let config = PreviewConfig { seed, ..PreviewConfig::default() };
    let previewer = Previewer::new(panel.clone(), gpio, config);

    println!("{}", panel.render());
    let mut redraws = panel.subscribe();

    let Some(handle) = previewer.start_document(document).await else {
        println!("Nothing to run: no start block found");
        return Ok(());
    };
    info!("Program '{}' started", path.display());

    let mut deadline = timeout.map(|secs| Instant::now() + Duration::from_secs(secs));
    let finished = handle.finished();
    tokio::pin!(finished);

    // Главный цикл: перерисовка, Ctrl-C и таймаут
    let report = loop {
        tokio::select! {
            report = &mut finished => break report?,
            changed = redraws.changed() => {
                if changed.is_ok() {
                    println!("{}{}", panel.render(), previewer.status());
                }
            }
            _ = signal::ctrl_c() => {
                warn!("Interrupted");
                previewer.stop();
            }
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                info!("Timeout reached, stopping");
                deadline = None;
                previewer.stop();
            }
        }
    };

    println!("{}", panel.render());
    println!("Preview finished!");
    println!("Blocks executed: {}", report.executed);
    println!("Run time: {}", format_elapsed(report.elapsed));
    if report.cancelled {
        println!("(stopped before the program ended)");
    }
    Ok(())
}

fn view(path: &Path, color: &str) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(path)?;
    let mut display = Display::new();
    display.set_color(Rgb::parse(color));
    if let Err(err) = display.draw_frame(&data) {
        warn!("{}: {err}", path.display());
        display.show_error();
    }
    print!("{}", display.to_ascii());
    Ok(())
}
