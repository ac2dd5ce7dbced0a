//! qrlens - scan, classify and remember QR codes from images or a camera.

mod commands;
mod log_buffer;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use commands::{CameraOptions, ImageOptions};
use log_buffer::{LogBuffer, LogBufferLayer};
use qrlens_core::config::{get_config_path, load_config, save_config};
use qrlens_core::{
    AppConfig, CropRegion, Facing, HistoryStore, JsonFileStore, ScanOrchestrator, Size,
};
use qrlens_scan::permission::{camera_permission, probe_host_capabilities};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// qrlens - scan, classify and remember QR codes.
#[derive(Parser, Debug)]
#[command(name = "qrlens")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Print captured log lines before exiting
    #[arg(long, global = true)]
    show_log: bool,

    /// Do not echo log lines to stderr
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Override the cooldown after an accepted scan, in milliseconds
    #[arg(long, global = true)]
    cooldown_ms: Option<u64>,

    /// History file to use instead of the default location
    #[arg(long, global = true)]
    history_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan the QR codes in an image file
    ScanImage {
        /// PNG or JPEG file
        path: PathBuf,

        /// Crop region as x,y,w,h percentages of the image
        #[arg(long, value_parser = commands::parse_crop)]
        crop: Option<CropRegion>,

        /// Grow (positive) or shrink (negative) the crop in 10% steps
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        zoom: i32,

        /// Write the crop preview to this file
        #[arg(long)]
        preview: Option<PathBuf>,

        /// Which code to keep when several are found (1-based)
        #[arg(long)]
        pick: Option<usize>,

        /// Ask the AI service what the code contains
        #[arg(long)]
        explain: bool,
    },

    /// Scan live from a camera
    Camera {
        /// Camera to prefer: environment or user
        #[arg(long)]
        facing: Option<FacingArg>,

        /// Stop after this many results
        #[arg(long, default_value = "1")]
        count: usize,

        /// Turn the flashlight on when supported
        #[arg(long)]
        torch: bool,

        /// Print overlay coordinates for a preview of this size (WIDTHxHEIGHT)
        #[arg(long, value_parser = commands::parse_viewport)]
        viewport: Option<Size>,

        /// Ask the AI service about each result
        #[arg(long)]
        explain: bool,
    },

    /// Show or clear scan history
    History {
        #[command(subcommand)]
        action: Option<HistoryAction>,
    },

    /// Ask the AI service to explain a payload
    Explain {
        /// Text to explain
        content: String,
    },

    /// Show camera permission and host capabilities
    Status,

    /// Show or initialize the configuration file
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand, Debug)]
enum HistoryAction {
    /// List scans, most recent first
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete every scan
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the configuration file path
    Path,
    /// Write the default configuration if none exists
    Init,
}

/// Camera facing argument wrapper for clap.
#[derive(Debug, Clone, Copy)]
struct FacingArg(Facing);

impl std::str::FromStr for FacingArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "environment" | "back" | "rear" => Ok(FacingArg(Facing::Environment)),
            "user" | "front" => Ok(FacingArg(Facing::User)),
            _ => Err(format!(
                "Unknown facing '{}'. Valid options: environment, user",
                s
            )),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    color_eyre::install()?;

    let log_buffer = LogBuffer::new();

    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("qrlens=info".parse()?)
        .add_directive("qrlens_core=info".parse()?)
        .add_directive("qrlens_scan=info".parse()?);

    let stderr_layer =
        (!args.quiet).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(LogBufferLayer::new(log_buffer.clone()))
        .init();

    let outcome = run(&args).await;

    if args.show_log {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "--- log ({} lines) ---", log_buffer.len())?;
        log_buffer.dump(&mut stdout)?;
    }
    outcome
}

async fn run(args: &Args) -> Result<()> {
    let mut config = load_config().unwrap_or_else(|e| {
        tracing::warn!("Using default configuration: {}", e);
        AppConfig::default()
    });
    if let Some(cooldown_ms) = args.cooldown_ms {
        config.cooldown_ms = cooldown_ms;
    }

    let store = match &args.history_file {
        Some(path) => JsonFileStore::new(path),
        None => JsonFileStore::default_location()?,
    };
    let caps = probe_host_capabilities();

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut out = io::stdout().lock();

    match &args.command {
        Command::ScanImage {
            path,
            crop,
            zoom,
            preview,
            pick,
            explain,
        } => {
            let mut orchestrator =
                ScanOrchestrator::new(HistoryStore::load(store), config.orchestrator());
            let opts = ImageOptions {
                path: path.clone(),
                crop: *crop,
                zoom: *zoom,
                preview: preview.clone(),
                pick: *pick,
            };
            let result = commands::scan_image_file(
                &config,
                &mut orchestrator,
                &caps,
                &opts,
                &mut input,
                &mut out,
            )?;
            if *explain && let Some(result) = result {
                let text = commands::explain_content(&config.explain, &result.content).await;
                writeln!(out, "  AI: {}", text)?;
            }
        }
        Command::Camera {
            facing,
            count,
            torch,
            viewport,
            explain,
        } => {
            let mut orchestrator =
                ScanOrchestrator::new(HistoryStore::load(store), config.orchestrator());
            let opts = CameraOptions {
                facing: facing.map(|f| f.0),
                count: *count,
                torch: *torch,
                viewport: *viewport,
            };
            let results = commands::scan_camera(
                &config,
                &mut orchestrator,
                &caps,
                &opts,
                &mut input,
                &mut out,
            )
            .await?;
            if *explain {
                for result in &results {
                    let text = commands::explain_content(&config.explain, &result.content).await;
                    writeln!(out, "{}: {}", result.content, text)?;
                }
            }
        }
        Command::History { action } => {
            let mut orchestrator =
                ScanOrchestrator::new(HistoryStore::load(store), config.orchestrator());
            match action {
                None | Some(HistoryAction::List { json: false }) => {
                    commands::print_history(&mut out, orchestrator.history())?;
                }
                Some(HistoryAction::List { json: true }) => {
                    let json = serde_json::to_string_pretty(orchestrator.history().entries())?;
                    writeln!(out, "{}", json)?;
                }
                Some(HistoryAction::Clear { yes }) => {
                    commands::clear_history(&mut orchestrator, *yes, &mut input, &mut out)?;
                }
            }
        }
        Command::Explain { content } => {
            let text = commands::explain_content(&config.explain, content).await;
            writeln!(out, "{}", text)?;
        }
        Command::Status => {
            commands::print_status(&mut out, camera_permission(), &caps, Some(store.path()))?;
        }
        Command::Config { action } => match action {
            None | Some(ConfigAction::Show) => {
                writeln!(out, "{}", serde_json::to_string_pretty(&config)?)?;
            }
            Some(ConfigAction::Path) => {
                writeln!(out, "{}", get_config_path()?.display())?;
            }
            Some(ConfigAction::Init) => {
                let path = get_config_path()?;
                if path.exists() {
                    writeln!(out, "Config already exists at {}", path.display())?;
                } else {
                    save_config(&AppConfig::default())?;
                    writeln!(out, "Wrote {}", path.display())?;
                }
            }
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_scan_image() {
        let args = Args::parse_from([
            "qrlens",
            "--cooldown-ms",
            "500",
            "scan-image",
            "codes.png",
            "--crop",
            "0,0,50,100",
            "--zoom",
            "-2",
            "--pick",
            "2",
        ]);
        assert_eq!(args.cooldown_ms, Some(500));
        let Command::ScanImage {
            path,
            crop,
            zoom,
            pick,
            ..
        } = args.command
        else {
            panic!("expected scan-image");
        };
        assert_eq!(path, PathBuf::from("codes.png"));
        assert_eq!(crop.map(|c| c.width), Some(50.0));
        assert_eq!(zoom, -2);
        assert_eq!(pick, Some(2));
    }

    #[test]
    fn test_parse_camera_facing() {
        let args = Args::parse_from(["qrlens", "camera", "--facing", "front", "--viewport", "240x240"]);
        let Command::Camera {
            facing, viewport, ..
        } = args.command
        else {
            panic!("expected camera");
        };
        assert_eq!(facing.map(|f| f.0), Some(Facing::User));
        assert_eq!(viewport, Some(Size::new(240.0, 240.0)));
    }

    #[test]
    fn test_bad_facing_is_rejected() {
        assert!(Args::try_parse_from(["qrlens", "camera", "--facing", "sideways"]).is_err());
    }

    #[test]
    fn test_history_defaults_to_list() {
        let args = Args::parse_from(["qrlens", "--show-log", "history"]);
        assert!(args.show_log);
        assert!(matches!(args.command, Command::History { action: None }));
    }
}
