use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

use super::archive::{normalize_crlf, ArchiveSink, DirectoryArchive, RunLocation};
use super::capture::{CancelToken, CaptureSource, FileCapture, SerialCapture};
use super::config::Config;
use super::error::ProcessorError;
use super::frame_splitter::{decode_capture, FrameSplitter};
use super::merger::{MergeOutcome, TimeKeyMerger, UnifiedTable};
use super::record_router::{RecordRouter, RoutedRecords};
use super::status::{PipelineStatus, Stage};
use super::table::{SensorTable, TableBuilder};
use super::tokenizer::RecordTokenizer;

/// How a run ended
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// The unified table was written to `table_path`
    Merged {
        location: RunLocation,
        table_path: PathBuf,
        table: UnifiedTable,
    },
    /// No channel got a single usable record. Raw and channel files are written, the table is not.
    NothingToMerge { location: RunLocation },
}

impl RunOutcome {
    pub fn location(&self) -> &RunLocation {
        match self {
            Self::Merged { location, .. } | Self::NothingToMerge { location } => location,
        }
    }
}

/// Tokenize and tabulate every channel, in configured order
fn build_tables(config: &Config, routed: &RoutedRecords) -> Vec<(String, SensorTable)> {
    let tokenizer = RecordTokenizer::new(&config.protocol);
    let builder = TableBuilder::new(config);
    routed
        .channels
        .iter()
        .map(|channel| {
            let table = builder.build(tokenizer.tokenize_all(channel.records.iter()));
            if table.is_empty() {
                log::warn!("Channel {} has no usable records", channel.channel.name);
            } else {
                log::info!(
                    "Loaded {} rows ({} columns) from {}",
                    table.n_rows(),
                    table.n_columns(),
                    channel.channel.file_name()
                );
            }
            (channel.channel.name.clone(), table)
        })
        .collect()
}

/// The main loop of sensor_merger.
///
/// Capture from `source`, archive the raw capture and the per-channel records, then merge the
/// channels into a single table. Capture happens before anything is written, so a source that
/// fails leaves the archive untouched.
pub fn process_with(
    config: &Config,
    source: &mut dyn CaptureSource,
    archive: &mut dyn ArchiveSink,
    cancel: &CancelToken,
    tx: &Sender<PipelineStatus>,
) -> Result<RunOutcome, ProcessorError> {
    log::info!("Capturing from {}...", source.describe());
    tx.send(PipelineStatus::new(0.0, Stage::Capturing, 0))?;
    let raw = source.read_capture(config.byte_budget, config.capture_timeout(), cancel)?;
    log::info!(
        "Read {} from {}",
        human_bytes::human_bytes(raw.len() as f64),
        source.describe()
    );

    let location = archive.allocate_output_location()?;
    log::info!("Using run directory {}", location.path.display());
    tx.send(PipelineStatus::new(0.0, Stage::Splitting, location.run_number))?;

    let text = decode_capture(&raw);
    let raw_path =
        archive.write_text(&location, &config.raw_capture_name, &normalize_crlf(&text))?;
    log::info!("Raw capture saved to {}", raw_path.display());

    let (candidates, stats) = FrameSplitter::new(&config.protocol).split_with_stats(&text);
    log::info!(
        "Found {} segments: {} accepted, {} unterminated, {} oversized",
        stats.segments,
        stats.accepted,
        stats.unterminated,
        stats.oversized
    );

    let routed = RecordRouter::new(&config.channels).route(candidates);
    if routed.unrouted > 0 {
        log::info!(
            "{} records matched no channel and were dropped",
            routed.unrouted
        );
    }
    archive.write_channels(&location, &routed)?;
    log::info!("Channel files saved to {}", location.path.display());
    tx.send(PipelineStatus::new(0.5, Stage::Splitting, location.run_number))?;

    tx.send(PipelineStatus::new(0.0, Stage::Merging, location.run_number))?;
    let tables = build_tables(config, &routed);
    let table = match TimeKeyMerger::new(config).merge(tables) {
        MergeOutcome::Merged(table) => table,
        MergeOutcome::NothingToMerge => {
            log::warn!("No channel produced any data; nothing to merge.");
            tx.send(PipelineStatus::new(1.0, Stage::Merging, location.run_number))?;
            return Ok(RunOutcome::NothingToMerge { location });
        }
    };

    tx.send(PipelineStatus::new(0.0, Stage::Writing, location.run_number))?;
    let table_path = archive.write_table(&location, &config.unified_table_name, &table)?;
    log::info!(
        "Unified table with {} rows saved to {}",
        table.n_rows(),
        table_path.display()
    );
    tx.send(PipelineStatus::new(1.0, Stage::Writing, location.run_number))?;

    Ok(RunOutcome::Merged {
        location,
        table_path,
        table,
    })
}

/// Capture from the sensor board over the serial port and process the run.
///
/// This is the function to be called by a separate thread (typically the CLI).
pub fn process(
    config: Config,
    tx: Sender<PipelineStatus>,
    cancel: CancelToken,
) -> Result<RunOutcome, ProcessorError> {
    config.validate()?;
    let mut source = SerialCapture::open(&config)?.with_status(tx.clone());
    let mut archive = DirectoryArchive::new(&config.archive_path);
    process_with(&config, &mut source, &mut archive, &cancel, &tx)
}

/// Process a raw capture archived by an earlier run, writing the results to a new run directory
pub fn replay(
    config: Config,
    raw_capture: &Path,
    tx: Sender<PipelineStatus>,
) -> Result<RunOutcome, ProcessorError> {
    config.validate()?;
    let mut source = FileCapture::new(raw_capture)?;
    let mut archive = DirectoryArchive::new(&config.archive_path);
    process_with(&config, &mut source, &mut archive, &CancelToken::new(), &tx)
}
