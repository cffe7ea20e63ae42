use clap::{Arg, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use libsensor_merger::capture::{describe_port, list_ports, CancelToken};
use libsensor_merger::config::Config;
use libsensor_merger::process::{process, replay, RunOutcome};
use libsensor_merger::status::PipelineStatus;

/// Rows of the merged table echoed to the terminal after a run
const PREVIEW_ROWS: usize = 5;

fn make_template_config(path: &Path) -> Result<(), String> {
    let config = Config::default();
    let yaml_str = serde_yaml::to_string(&config).map_err(|e| e.to_string())?;
    let mut file = File::create(path).map_err(|e| e.to_string())?;
    file.write_all(yaml_str.as_bytes())
        .map_err(|e| e.to_string())?;
    Ok(())
}

fn print_ports() {
    match list_ports() {
        Ok(ports) if ports.is_empty() => log::warn!("No serial ports found."),
        Ok(ports) => {
            for info in ports.iter() {
                log::info!("{}", describe_port(info));
            }
        }
        Err(e) => log::error!("{e}"),
    }
}

fn main() {
    // Create a cli
    let matches = Command::new("sensor_merger_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .subcommand(Command::new("ports").about("List the available serial ports"))
        .subcommand(
            Command::new("replay")
                .about("Process a raw capture saved by an earlier run instead of the serial port")
                .arg(Arg::new("capture").required(true).help("Path to the raw capture")),
        )
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .help("Path to the configuration file"),
        )
        .get_matches();

    // Initialize feedback
    let logger = simplelog::TermLogger::new(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    let pb_manager = MultiProgress::new();

    LogWrapper::new(pb_manager.clone(), logger)
        .try_init()
        .expect("Could not create logging/progress!");

    if let Some(("ports", _)) = matches.subcommand() {
        print_ports();
        return;
    }

    // Parse the cli
    let config_path = match matches.get_one::<String>("path") {
        Some(p) => PathBuf::from(p),
        None => {
            log::error!("A configuration file is required (-p <path>)");
            return;
        }
    };

    if let Some(("new", _)) = matches.subcommand() {
        log::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );
        match make_template_config(&config_path) {
            Ok(()) => log::info!("Done."),
            Err(e) => log::error!("Could not write template config: {e}"),
        }
        return;
    }

    // Load our config
    log::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match Config::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    log::info!("Config successfully loaded.");
    log::info!("Archive Path: {}", config.archive_path.to_string_lossy());
    log::info!(
        "Port: {}",
        config.port.as_deref().unwrap_or("auto-detect")
    );
    log::info!("Baud Rate: {}", config.baud_rate);
    log::info!(
        "Byte Budget: {} Timeout: {}s",
        config.byte_budget,
        config.capture_timeout_secs
    );
    let channel_names: Vec<&str> = config.channels.iter().map(|c| c.name.as_str()).collect();
    log::info!("Channels: {}", channel_names.join(", "));

    let replay_path = match matches.subcommand() {
        Some(("replay", sub)) => sub.get_one::<String>("capture").map(PathBuf::from),
        _ => None,
    };

    // Setup the progress bar
    let pb = pb_manager.add(ProgressBar::new(100));
    pb.set_style(
        ProgressStyle::with_template("{msg:>10} [{bar:40.cyan/blue}] {pos:>3}%")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    let (tx, rx) = mpsc::channel::<PipelineStatus>();
    let cancel = CancelToken::new();
    // Spawn the task!
    let handle = std::thread::spawn(move || match replay_path {
        Some(path) => replay(config, &path, tx),
        None => process(config, tx, cancel),
    });

    loop {
        match rx.recv_timeout(Duration::from_millis(250)) {
            Ok(status) => {
                pb.set_message(status.stage.to_string());
                pb.set_position((status.progress * 100.0) as u64);
            }
            Err(mpsc::RecvTimeoutError::Timeout) => (),
            // The worker is wrapping up
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                std::thread::sleep(Duration::from_millis(50))
            }
        }

        if handle.is_finished() {
            match handle.join() {
                Ok(result) => match result {
                    Ok(RunOutcome::Merged {
                        table_path, table, ..
                    }) => {
                        log::info!("Successfully merged data into {}", table_path.display());
                        log::info!("Preview:\n{}", table.preview(PREVIEW_ROWS));
                    }
                    Ok(RunOutcome::NothingToMerge { location }) => log::warn!(
                        "Nothing to merge; raw data kept in {}",
                        location.path.display()
                    ),
                    Err(e) => log::error!("Merging failed with error: {e}"),
                },
                Err(_) => log::error!("Failed to join merging task!"),
            }
            break;
        }
    }

    pb.finish();

    log::info!("Done.");
}
