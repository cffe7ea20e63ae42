use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::config::ChannelConfig;
use super::error::ArchiveError;
use super::merger::UnifiedTable;
use super::record_router::RoutedRecords;

/// A run directory handed out by an ArchiveSink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLocation {
    pub run_number: u32,
    pub path: PathBuf,
}

/// Where the artifacts of a run end up
pub trait ArchiveSink {
    /// Reserve a fresh location for this run
    fn allocate_output_location(&mut self) -> Result<RunLocation, ArchiveError>;

    fn write_text(
        &self,
        location: &RunLocation,
        name: &str,
        content: &str,
    ) -> Result<PathBuf, ArchiveError>;

    /// Write one text file per channel, holding that channel's routed records
    fn write_channels(
        &self,
        location: &RunLocation,
        routed: &RoutedRecords,
    ) -> Result<(), ArchiveError>;

    fn write_table(
        &self,
        location: &RunLocation,
        name: &str,
        table: &UnifiedTable,
    ) -> Result<PathBuf, ArchiveError>;
}

/// Normalize every line ending (`\r\n`, lone `\n` or lone `\r`) to `\r\n`
pub fn normalize_crlf(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len() + text.len() / 16);
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                normalized.push_str("\r\n");
            }
            '\n' => normalized.push_str("\r\n"),
            _ => normalized.push(c),
        }
    }
    normalized
}

/// Per-channel output files, opened together and closed together.
///
/// Dropping the guard (on success or halfway through an error) releases every handle.
struct ChannelFiles {
    files: Vec<(PathBuf, BufWriter<File>)>,
}

impl ChannelFiles {
    fn create<'a>(
        dir: &Path,
        channels: impl Iterator<Item = &'a ChannelConfig>,
    ) -> Result<Self, ArchiveError> {
        let mut files = Vec::new();
        for channel in channels {
            let path = dir.join(channel.file_name());
            let file = File::create(&path)?;
            files.push((path, BufWriter::new(file)));
        }
        Ok(Self { files })
    }

    fn write_line(&mut self, idx: usize, line: &str) -> Result<(), ArchiveError> {
        let writer = &mut self.files[idx].1;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }

    fn finish(mut self) -> Result<(), ArchiveError> {
        for (path, writer) in self.files.iter_mut() {
            writer.flush()?;
            log::debug!("Closed channel file {}", path.display());
        }
        Ok(())
    }
}

/// Archive of numbered run directories: `<root>/1`, `<root>/2`, ...
#[derive(Debug, Clone)]
pub struct DirectoryArchive {
    root: PathBuf,
}

impl DirectoryArchive {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// One past the highest numbered directory in the archive, or 1 for a fresh archive.
    /// Anything that is not a directory with a purely numeric name is ignored.
    pub fn next_run_number(&self) -> Result<u32, ArchiveError> {
        if !self.root.exists() {
            return Ok(1);
        }
        if !self.root.is_dir() {
            return Err(ArchiveError::NotADirectory(self.root.clone()));
        }
        let mut highest: u32 = 0;
        for item in self.root.read_dir()? {
            let item_path = item?.path();
            if !item_path.is_dir() {
                continue;
            }
            let number = item_path
                .file_name()
                .and_then(|n| n.to_str())
                .filter(|n| n.chars().all(|c| c.is_ascii_digit()))
                .and_then(|n| n.parse::<u32>().ok());
            if let Some(number) = number {
                highest = highest.max(number);
            }
        }
        Ok(highest + 1)
    }
}

impl ArchiveSink for DirectoryArchive {
    fn allocate_output_location(&mut self) -> Result<RunLocation, ArchiveError> {
        std::fs::create_dir_all(&self.root)?;
        let run_number = self.next_run_number()?;
        let path = self.root.join(run_number.to_string());
        std::fs::create_dir_all(&path)?;
        Ok(RunLocation { run_number, path })
    }

    fn write_text(
        &self,
        location: &RunLocation,
        name: &str,
        content: &str,
    ) -> Result<PathBuf, ArchiveError> {
        let path = location.path.join(name);
        std::fs::write(&path, content)?;
        Ok(path)
    }

    fn write_channels(
        &self,
        location: &RunLocation,
        routed: &RoutedRecords,
    ) -> Result<(), ArchiveError> {
        let mut files =
            ChannelFiles::create(&location.path, routed.channels.iter().map(|c| &c.channel))?;
        for (idx, channel) in routed.channels.iter().enumerate() {
            for record in channel.records.iter() {
                files.write_line(idx, record)?;
            }
        }
        files.finish()
    }

    fn write_table(
        &self,
        location: &RunLocation,
        name: &str,
        table: &UnifiedTable,
    ) -> Result<PathBuf, ArchiveError> {
        let path = location.path.join(name);
        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(table.columns())?;
        for record in table.records() {
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::frame_splitter::FrameSplitter;
    use crate::merger::{MergeOutcome, TimeKeyMerger};
    use crate::record_router::RecordRouter;
    use crate::table::TableBuilder;

    #[test]
    fn test_run_numbers_increase() {
        let dir = tempfile::tempdir().unwrap();
        let mut archive = DirectoryArchive::new(&dir.path().join("arh"));
        let first = archive.allocate_output_location().unwrap();
        assert_eq!(first.run_number, 1);
        assert!(first.path.is_dir());

        std::fs::create_dir_all(dir.path().join("arh").join("41")).unwrap();
        std::fs::create_dir_all(dir.path().join("arh").join("notes")).unwrap();
        std::fs::write(dir.path().join("arh").join("99"), "not a directory").unwrap();
        let next = archive.allocate_output_location().unwrap();
        assert_eq!(next.run_number, 42);
        assert_eq!(next.path, dir.path().join("arh").join("42"));
    }

    #[test]
    fn test_normalize_crlf() {
        assert_eq!(normalize_crlf("a\nb\r\nc\rd"), "a\r\nb\r\nc\r\nd");
        assert_eq!(normalize_crlf("no breaks"), "no breaks");
    }

    #[test]
    fn test_channel_files_written_even_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut archive = DirectoryArchive::new(dir.path());
        let location = archive.allocate_output_location().unwrap();

        let config = Config::default();
        let candidates = FrameSplitter::new(&config.protocol).split("!!Mag|1|2|3||!!Mag|1|2|4||");
        let routed = RecordRouter::new(&config.channels).route(candidates);
        archive.write_channels(&location, &routed).unwrap();

        let mag = std::fs::read_to_string(location.path.join("MagTest.txt")).unwrap();
        assert_eq!(mag, "Mag|1|2|3||\nMag|1|2|4||\n");
        let sgp = std::fs::read_to_string(location.path.join("SGP30_aht20.txt")).unwrap();
        assert!(sgp.is_empty());
    }

    #[test]
    fn test_table_written_with_empty_cells() {
        let dir = tempfile::tempdir().unwrap();
        let mut archive = DirectoryArchive::new(dir.path());
        let location = archive.allocate_output_location().unwrap();

        let config = Config::default();
        let builder = TableBuilder::new(&config);
        let mag = builder.build(vec![vec![
            String::from("Mag"),
            String::from("1"),
            String::from("2"),
            String::from("3"),
            String::from("0,5"),
        ]]);
        let atm = builder.build(vec![vec![
            String::from("Atm"),
            String::from("1"),
            String::from("2"),
            String::from("4"),
        ]]);
        let table = match TimeKeyMerger::new(&config)
            .merge(vec![(String::from("Mag"), mag), (String::from("Atm"), atm)])
        {
            MergeOutcome::Merged(table) => table,
            MergeOutcome::NothingToMerge => panic!(),
        };
        let path = archive
            .write_table(&location, "unified_raw_data.csv", &table)
            .unwrap();
        let contents = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(
            lines[0],
            "Mag.placeholder,day,hour,min,Mag.col_0,Atm.placeholder"
        );
        assert_eq!(lines[1], "Mag,1,2,3,\"0,5\",");
        assert_eq!(lines[2], ",1,2,4,,Atm");
    }
}
