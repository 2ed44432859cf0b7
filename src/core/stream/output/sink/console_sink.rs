// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::core::error::{InventoryError, InventoryResult};
use crate::core::event::TagRecord;
use crate::core::stream::output::sink::sink_trait::NotificationSink;
use std::fmt::Debug;
use std::io::{self, Write};
use std::sync::Mutex;

/// Writes one `New tag: ...` line per accepted record to a writer (stdout by default)
pub struct ConsoleSink<W: Write + Send = io::Stdout> {
    writer: Mutex<W>,
}

impl<W: Write + Send> Debug for ConsoleSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleSink").finish_non_exhaustive()
    }
}

impl ConsoleSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Recover the writer, e.g. to inspect captured output
    pub fn into_inner(self) -> W {
        match self.writer.into_inner() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> NotificationSink for ConsoleSink<W> {
    fn notify(&self, record: &TagRecord) -> InventoryResult<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| InventoryError::sink("console writer poisoned"))?;
        writeln!(writer, "New tag: {record}")?;
        writer.flush()?;
        Ok(())
    }

    fn flush(&self) -> InventoryResult<()> {
        self.writer
            .lock()
            .map_err(|_| InventoryError::sink("console writer poisoned"))?
            .flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_sink_line_format() {
        let sink = ConsoleSink::new(Vec::new());
        sink.notify(&TagRecord::new("E2003412", Some(5), 1234, 2))
            .unwrap();
        sink.notify(&TagRecord::new("E2003413", None, 1235, 1))
            .unwrap();

        let output = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(
            output,
            "New tag: EPC: E2003412 | Ch: 5 | Seen: 2x | Time: 1234\n\
             New tag: EPC: E2003413 | Ch: - | Seen: 1x | Time: 1235\n"
        );
    }
}
