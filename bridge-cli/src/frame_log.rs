//! CSV frame logging
//!
//! Every frame the bridge receives or forwards can be appended to a CSV
//! file for later analysis. Rows carry the frame timestamp, the bus it was
//! seen on, the transfer direction, and the decoded payload.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use bridge_relay::{BusChannel, CanFrame};

const HEADER: &str = "Timestamp,Channel,Direction,ID,DLC,Data";

/// Which side of the bridge a logged frame was on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Rx,
    Tx,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Self::Rx => "RX",
            Self::Tx => "TX",
        }
    }
}

/// Appends bridge traffic to a CSV file, one row per frame
#[derive(Debug)]
pub struct FrameLogger {
    writer: BufWriter<File>,
}

impl FrameLogger {
    /// Create (truncate) the log file and write the header row
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{}", HEADER)?;
        writer.flush()?;
        Ok(Self { writer })
    }

    /// Append one frame row and flush it
    pub fn record(
        &mut self,
        frame: &CanFrame,
        channel: BusChannel,
        direction: Direction,
    ) -> io::Result<()> {
        let data = frame
            .data()
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(
            self.writer,
            "{:.3},{},{},0x{:X},{},{}",
            frame.timestamp(),
            channel.index(),
            direction.as_str(),
            frame.arbitration_id(),
            frame.dlc(),
            data,
        )?;
        self.writer.flush()
    }
}
