mod calibrate;
mod capture;
mod classify;
mod config;
mod engine;
mod error;
mod fen;
mod grid;
mod ocr;
mod piece;
mod session;
mod templates;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use config::{Config, DEFAULT_CONFIG_PATH};
use ocr::Orientation;
use session::{Session, SessionOptions};
use std::path::PathBuf;
use std::time::Duration;

fn cli() -> Command {
    Command::new("fenshot")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Reads the chess position from a browser window and prints it as FEN")
        .arg(
            Arg::new("title")
                .long("title")
                .value_name("TITLE")
                .help("Window title substring")
                .default_value("Chess.com"),
        )
        .arg(
            Arg::new("calibrate")
                .long("calibrate")
                .action(ArgAction::SetTrue)
                .help("Mark the board corners and save the calibration, then exit"),
        )
        .arg(
            Arg::new("flip")
                .long("flip")
                .action(ArgAction::SetTrue)
                .help("Force flip (black at bottom); disables auto side detection"),
        )
        .arg(
            Arg::new("no-auto-side")
                .long("no-auto-side")
                .action(ArgAction::SetTrue)
                .help("Disable auto side detection and encode the board as captured"),
        )
        .arg(
            Arg::new("threshold")
                .long("threshold")
                .value_name("SCORE")
                .value_parser(value_parser!(f32))
                .allow_negative_numbers(true)
                .help("Template match threshold in [-1, 1] (default 0.25)"),
        )
        .arg(
            Arg::new("post")
                .long("post")
                .value_name("URL")
                .help("Post each FEN to this analysis server"),
        )
        .arg(
            Arg::new("interval")
                .long("interval")
                .value_name("SECS")
                .value_parser(value_parser!(u64))
                .default_value("5")
                .help("Capture interval in seconds (minimum 1)"),
        )
        .arg(
            Arg::new("once")
                .long("once")
                .action(ArgAction::SetTrue)
                .help("Capture once and exit"),
        )
        .arg(
            Arg::new("debug-dir")
                .long("debug-dir")
                .value_name("DIR")
                .value_parser(value_parser!(PathBuf))
                .help("Save window, board and square images to this folder"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .default_value(DEFAULT_CONFIG_PATH)
                .help("JSON config file (defaults are used if it does not exist)"),
        )
        .arg(
            Arg::new("calibration")
                .long("calibration")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("Calibration file (overrides the config)"),
        )
        .arg(
            Arg::new("templates")
                .long("templates")
                .value_name("DIR")
                .value_parser(value_parser!(PathBuf))
                .help("Piece template directory (overrides the config)"),
        )
        .arg(
            Arg::new("max-retries")
                .long("max-retries")
                .value_name("N")
                .value_parser(value_parser!(u32))
                .help("Give up after N consecutive capture failures (default: retry forever)"),
        )
}

fn load_config(matches: &ArgMatches) -> Result<Config> {
    let path = matches
        .get_one::<PathBuf>("config")
        .cloned()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let mut config = Config::load_or_default(&path)
        .with_context(|| format!("Failed to load config {}", path.display()))?;

    if let Some(path) = matches.get_one::<PathBuf>("calibration") {
        config.calibration_path = path.clone();
    }
    if let Some(dir) = matches.get_one::<PathBuf>("templates") {
        config.templates_dir = dir.clone();
    }
    if let Some(&threshold) = matches.get_one::<f32>("threshold") {
        config.recognition.match_threshold = threshold;
    }
    config.validate()?;
    Ok(config)
}

fn session_options(matches: &ArgMatches) -> SessionOptions {
    let orientation = if matches.get_flag("flip") {
        Orientation::Flipped
    } else if matches.get_flag("no-auto-side") {
        Orientation::AsCaptured
    } else {
        Orientation::Auto
    };
    let interval = matches.get_one::<u64>("interval").copied().unwrap_or(5).max(1);

    SessionOptions {
        title: matches
            .get_one::<String>("title")
            .cloned()
            .unwrap_or_else(|| "Chess.com".to_string()),
        orientation,
        interval: Duration::from_secs(interval),
        once: matches.get_flag("once"),
        debug_dir: matches.get_one::<PathBuf>("debug-dir").cloned(),
        post: matches.get_one::<String>("post").cloned(),
        max_capture_failures: matches.get_one::<u32>("max-retries").copied(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = cli().get_matches();
    let config = load_config(&matches)?;
    let options = session_options(&matches);
    let mut session = Session::new(config, options.clone(), capture::ScreenCapture);

    if matches.get_flag("calibrate") {
        println!("Calibrating against window '{}'.", options.title);
        let mut points = calibrate::TerminalPoints::new("calibration_frame.png");
        let calibration = session.calibrate(&mut points).context("Calibration failed")?;
        println!("Saved calibration: {:?}", calibration);
        return Ok(());
    }

    println!(
        "Watching window '{}' (orientation: {}). Press Ctrl+C to stop.",
        options.title, options.orientation
    );
    session.run().await.context("Capture session failed")
}
