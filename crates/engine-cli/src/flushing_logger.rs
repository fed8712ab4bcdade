//! Stderr writer that flushes every message, so log output from a GUI
//! subprocess never stalls in a pipe buffer.

use std::io::{self, Write};

pub struct FlushingStderrWriter {
    stderr: io::Stderr,
}

impl FlushingStderrWriter {
    pub fn new() -> Self {
        Self {
            stderr: io::stderr(),
        }
    }
}

impl Default for FlushingStderrWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for FlushingStderrWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.stderr.write(buf)?;
        self.stderr.flush()?;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stderr.flush()
    }
}
