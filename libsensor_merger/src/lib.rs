//! # sensor_merger
//!
//! sensor_merger is a data collector for small Arduino-style sensor boards, written in Rust.
//! It reads the text stream the board prints over a serial link, splits it into records,
//! hands each record to the sensor that produced it, and merges the independent sensor
//! streams into one table aligned on the board's (day, hour, minute) time stamp.
//!
//! ## Installation
//!
//! The only method of install is from source. With a Rust toolchain installed, run
//!
//! ```bash
//! cargo install --path ./sensor_merger_cli
//! ```
//!
//! On Linux you may need to add yourself to the `dialout` group to access serial ports.
//!
//! ## Documentation
//!
//! Documentation is provided for the `libsensor_merger` library; the source code of
//! `sensor_merger_cli` should be examined for an example of using the library.
//!
//! ## Wire protocol
//!
//! The board prints records like
//!
//! ```text
//! !!Mag|12|10|31|0.51|0.12||
//! ```
//!
//! - `!!` starts a record (primary delimiter)
//! - `|` separates fields (secondary delimiter)
//! - `||` ends a structurally complete record (terminator)
//!
//! The first field names the sensor, the next three are the day, hour and minute, and
//! everything after that is the sensor reading. Records longer than 70 characters or
//! missing the terminator are considered line noise and dropped. Records are routed to a
//! channel by keyword: the first configured channel whose keyword appears in the record
//! gets it.
//!
//! ## Configuration
//!
//! Configurations are YAML files. A template can be made with
//! `sensor_merger_cli -p config.yaml new`. The format is as follows:
//!
//! ```yml
//! archive_path: arh
//! port: null
//! port_hint: CH340
//! baud_rate: 9600
//! read_timeout_ms: 15000
//! settle_ms: 2000
//! start_command: "sbrosdannih\n"
//! byte_budget: 12285
//! capture_timeout_secs: 120
//! poll_interval_ms: 50
//! raw_capture_name: stringTest.txt
//! unified_table_name: unified_raw_data.csv
//! protocol:
//!   primary_delimiter: '!!'
//!   secondary_delimiter: '|'
//!   terminator: '||'
//!   max_record_len: 70
//! placeholder_column: placeholder
//! time_columns: [day, hour, min]
//! channels:
//! - name: MagTest
//!   keyword: Mag
//! - name: txt_Atm_tem_h
//!   keyword: Atm_tem_h
//! - name: SGP30_aht20
//!   keyword: SGP30_aht20
//! ```
//!
//! If `port` is `null`, the first port whose USB description contains `port_hint` is used,
//! falling back to the first port found. A capture ends after `byte_budget` bytes or
//! `capture_timeout_secs` seconds, whichever comes first.
//!
//! ## Output
//!
//! Every run gets a fresh numbered directory in `archive_path` (`arh/1`, `arh/2`, ...):
//!
//! ```text
//! arh/3
//! |---- stringTest.txt        raw capture, CRLF line endings
//! |---- MagTest.txt           one routed record per line
//! |---- txt_Atm_tem_h.txt
//! |---- SGP30_aht20.txt
//! |---- unified_raw_data.csv  merged table
//! ```
//!
//! The CSV holds the time columns under their plain names and every other column prefixed
//! with its channel (`MagTest.col_0`). Values are written exactly as received; a row with
//! no reading from a channel has empty cells for that channel. If no channel received a
//! usable record the CSV is not written.
pub mod archive;
pub mod capture;
pub mod config;
pub mod error;
pub mod frame_splitter;
pub mod merger;
pub mod process;
pub mod record_router;
pub mod status;
pub mod table;
pub mod tokenizer;
