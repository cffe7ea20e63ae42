use std::path::PathBuf;
use thiserror::Error;

use super::status::PipelineStatus;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Config is invalid: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("No serial ports are available; is the sensor board attached?")]
    NoPorts,
    #[error("Could not open serial port {0}: {1}")]
    OpenFailed(String, serialport::Error),
    #[error("Capture failed due to serial port error: {0}")]
    SerialError(#[from] serialport::Error),
    #[error("Could not replay capture because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Capture failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Archive failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Archive failed to write CSV table: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Archive location {0:?} is not a directory")]
    NotADirectory(PathBuf),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to Capture error: {0}")]
    CaptureError(#[from] CaptureError),
    #[error("Processor failed due to Archive error: {0}")]
    ArchiveError(#[from] ArchiveError),
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<PipelineStatus>),
}
