use serialport::{ClearBuffer, SerialPort, SerialPortInfo, SerialPortType};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::config::Config;
use super::error::CaptureError;
use super::status::{PipelineStatus, Stage};

/// Size of a single read from the transport
const CHUNK_SIZE: usize = 1024;

/// Shared flag used to stop a capture early from another thread
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Anything that can hand the pipeline a raw capture.
///
/// A capture is bounded: implementations stop at `byte_budget` bytes, after `timeout`, or when
/// `cancel` fires, whichever happens first, and return what they have so far.
pub trait CaptureSource {
    fn read_capture(
        &mut self,
        byte_budget: usize,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<Vec<u8>, CaptureError>;

    /// Short human readable name of the source, for the log
    fn describe(&self) -> String;
}

/// The bits of a serial port the polling loop needs
pub trait PolledTransport {
    /// Bytes waiting in the input buffer
    fn available(&mut self) -> std::io::Result<usize>;
    fn read_chunk(&mut self, buffer: &mut [u8]) -> std::io::Result<usize>;
}

impl PolledTransport for Box<dyn SerialPort> {
    fn available(&mut self) -> std::io::Result<usize> {
        Ok(self.bytes_to_read()? as usize)
    }

    fn read_chunk(&mut self, buffer: &mut [u8]) -> std::io::Result<usize> {
        self.read(buffer)
    }
}

/// Poll a transport until the budget is filled, the timeout runs out, or the capture is cancelled.
///
/// Sleeps for `poll_interval` whenever nothing is waiting. `on_progress` gets the running byte count.
pub fn poll_capture<T: PolledTransport>(
    transport: &mut T,
    byte_budget: usize,
    timeout: Duration,
    poll_interval: Duration,
    cancel: &CancelToken,
    mut on_progress: impl FnMut(usize),
) -> Result<Vec<u8>, CaptureError> {
    let start = Instant::now();
    let mut data: Vec<u8> = Vec::with_capacity(byte_budget);
    let mut buffer = [0u8; CHUNK_SIZE];
    while data.len() < byte_budget {
        if cancel.is_cancelled() {
            log::warn!("Capture cancelled after {} bytes", data.len());
            break;
        }
        if start.elapsed() >= timeout {
            log::warn!(
                "Capture timed out after {:?} with {} of {} bytes",
                timeout,
                data.len(),
                byte_budget
            );
            break;
        }

        let available = transport.available()?;
        if available == 0 {
            std::thread::sleep(poll_interval);
            continue;
        }

        let wanted = available.min(byte_budget - data.len()).min(CHUNK_SIZE);
        match transport.read_chunk(&mut buffer[..wanted]) {
            Ok(n) => {
                data.extend_from_slice(&buffer[..n]);
                on_progress(data.len());
            }
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::Interrupted => (),
            Err(e) => return Err(CaptureError::IOError(e)),
        }
    }
    Ok(data)
}

/// Human readable one-liner for a port: `device - description`
pub fn describe_port(info: &SerialPortInfo) -> String {
    match &info.port_type {
        SerialPortType::UsbPort(usb) => format!(
            "{} - {} {} ({:04x}:{:04x})",
            info.port_name,
            usb.manufacturer.as_deref().unwrap_or(""),
            usb.product.as_deref().unwrap_or("USB device"),
            usb.vid,
            usb.pid
        ),
        SerialPortType::PciPort => format!("{} - PCI device", info.port_name),
        SerialPortType::BluetoothPort => format!("{} - Bluetooth device", info.port_name),
        SerialPortType::Unknown => format!("{} - n/a", info.port_name),
    }
}

fn matches_hint(info: &SerialPortInfo, hint: &str) -> bool {
    match &info.port_type {
        SerialPortType::UsbPort(usb) => {
            usb.product.as_deref().is_some_and(|p| p.contains(hint))
                || usb.manufacturer.as_deref().is_some_and(|m| m.contains(hint))
        }
        _ => false,
    }
}

/// Pick the port whose USB product or manufacturer contains the hint, falling back to the first port
pub fn choose_port(ports: &[SerialPortInfo], hint: &str) -> Option<String> {
    ports
        .iter()
        .find(|info| matches_hint(info, hint))
        .or_else(|| ports.first())
        .map(|info| info.port_name.clone())
}

pub fn list_ports() -> Result<Vec<SerialPortInfo>, CaptureError> {
    Ok(serialport::available_ports()?)
}

/// Find the sensor board. Having no port at all is fatal.
pub fn discover_port(hint: &str) -> Result<String, CaptureError> {
    let ports = list_ports()?;
    for info in ports.iter() {
        log::info!("Found port: {}", describe_port(info));
    }
    let chosen = choose_port(&ports, hint).ok_or(CaptureError::NoPorts)?;
    if !ports.iter().any(|info| matches_hint(info, hint)) {
        log::warn!("No {hint} port found; using the first port: {chosen}");
    }
    Ok(chosen)
}

/// Capture straight from the sensor board over a serial port
pub struct SerialCapture {
    port_name: String,
    port: Box<dyn SerialPort>,
    poll_interval: Duration,
    status_tx: Option<Sender<PipelineStatus>>,
}

impl SerialCapture {
    /// Open the configured (or discovered) port and get the board talking.
    ///
    /// The board resets when the port opens, so we wait for it to settle, flush whatever is
    /// left in the buffers and then send the start command.
    pub fn open(config: &Config) -> Result<Self, CaptureError> {
        let port_name = match &config.port {
            Some(name) => name.clone(),
            None => discover_port(&config.port_hint)?,
        };

        let mut port = serialport::new(&port_name, config.baud_rate)
            .timeout(config.read_timeout())
            .open()
            .map_err(|e| CaptureError::OpenFailed(port_name.clone(), e))?;

        std::thread::sleep(config.settle_time());
        port.clear(ClearBuffer::All)?;

        if let Some(command) = &config.start_command {
            port.write_all(command.as_bytes())?;
            port.flush()?;
        }
        log::info!(
            "Opened {} at {} baud (timeout {:?})",
            port_name,
            config.baud_rate,
            config.read_timeout()
        );

        Ok(Self {
            port_name,
            port,
            poll_interval: config.poll_interval(),
            status_tx: None,
        })
    }

    /// Report capture progress on this channel
    pub fn with_status(mut self, tx: Sender<PipelineStatus>) -> Self {
        self.status_tx = Some(tx);
        self
    }
}

impl CaptureSource for SerialCapture {
    fn read_capture(
        &mut self,
        byte_budget: usize,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<Vec<u8>, CaptureError> {
        let tx = self.status_tx.clone();
        poll_capture(
            &mut self.port,
            byte_budget,
            timeout,
            self.poll_interval,
            cancel,
            |n_bytes| {
                if let Some(tx) = &tx {
                    // A front end that went away should not stop the capture
                    let _ = tx.send(PipelineStatus::new(
                        n_bytes as f32 / byte_budget as f32,
                        Stage::Capturing,
                        0,
                    ));
                }
            },
        )
    }

    fn describe(&self) -> String {
        format!("serial port {}", self.port_name)
    }
}

/// Replay a raw capture archived by an earlier run.
///
/// The file is already finite, so the budget and timeout do not apply.
#[derive(Debug, Clone)]
pub struct FileCapture {
    path: PathBuf,
}

impl FileCapture {
    pub fn new(path: &Path) -> Result<Self, CaptureError> {
        if !path.exists() {
            return Err(CaptureError::BadFilePath(path.to_path_buf()));
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl CaptureSource for FileCapture {
    fn read_capture(
        &mut self,
        _byte_budget: usize,
        _timeout: Duration,
        _cancel: &CancelToken,
    ) -> Result<Vec<u8>, CaptureError> {
        Ok(std::fs::read(&self.path)?)
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

/// An in-memory capture. Honors the byte budget.
#[derive(Debug, Clone, Default)]
pub struct BufferCapture {
    data: Vec<u8>,
}

impl BufferCapture {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }
}

impl CaptureSource for BufferCapture {
    fn read_capture(
        &mut self,
        byte_budget: usize,
        _timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<Vec<u8>, CaptureError> {
        if cancel.is_cancelled() {
            return Ok(Vec::new());
        }
        let n = self.data.len().min(byte_budget);
        Ok(self.data[..n].to_vec())
    }

    fn describe(&self) -> String {
        String::from("memory buffer")
    }
}
