//! OpenCDC JSON lines input.

use anyhow::{anyhow, Result};
use cdc_core::{ChangeEvent, OpenCdcRecord};
use std::io::{BufRead, Lines};

/// Reads change events from OpenCDC records, one JSON object per line.
pub struct OpenCdcReader<R: BufRead> {
    lines: Lines<R>,
    line_count: usize,
}

impl<R: BufRead> OpenCdcReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_count: 0,
        }
    }

    /// Lines consumed so far.
    pub fn line_count(&self) -> usize {
        self.line_count
    }

    /// Read up to `max` events. An empty batch means the input is exhausted.
    ///
    /// Blank lines are skipped. A malformed line fails with its 1-based line
    /// number.
    pub fn next_batch(&mut self, max: usize) -> Result<Vec<ChangeEvent>> {
        let mut batch = Vec::new();
        while batch.len() < max {
            let Some(line) = self.lines.next() else {
                break;
            };
            let line = line?;
            self.line_count += 1;

            if line.trim().is_empty() {
                continue;
            }

            let line_count = self.line_count;
            let record: OpenCdcRecord = serde_json::from_str(&line)
                .map_err(|e| anyhow!("Error parsing OpenCDC record at line {line_count}: {e}"))?;
            let event = ChangeEvent::try_from(record)
                .map_err(|e| anyhow!("Invalid OpenCDC record at line {line_count}: {e}"))?;
            batch.push(event);
        }
        Ok(batch)
    }
}
