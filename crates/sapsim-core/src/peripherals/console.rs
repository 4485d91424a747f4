//! CP/M-style console reached through `CALL 0x0005`.
//!
//! Function 2 prints the character in E; function 9 prints the
//! `$`-terminated string at DE. Other function numbers are ignored.

use std::io::{self, Write};

use crate::api::SystemCallHandler;
use crate::clocked::low_byte;
use crate::memory::Memory;

/// Console output function number (character in E).
pub const CONSOLE_OUTPUT: u8 = 2;

/// Print-string function number (string at DE).
pub const PRINT_STRING: u8 = 9;

/// Terminator of strings printed by [`PRINT_STRING`].
pub const STRING_TERMINATOR: u8 = b'$';

/// Console handler writing program output to `W`.
#[derive(Debug)]
pub struct BdosConsole<W: Write> {
    sink: W,
    calls: u64,
    error: Option<io::ErrorKind>,
}

impl<W: Write> BdosConsole<W> {
    /// Creates a console writing to `sink`.
    #[must_use]
    pub const fn new(sink: W) -> Self {
        Self {
            sink,
            calls: 0,
            error: None,
        }
    }

    /// Number of system calls seen, handled or not.
    #[must_use]
    pub const fn calls(&self) -> u64 {
        self.calls
    }

    /// First write error hit, if any. Output after an error is dropped.
    #[must_use]
    pub const fn error(&self) -> Option<io::ErrorKind> {
        self.error
    }

    /// Borrows the output sink.
    #[must_use]
    pub const fn sink(&self) -> &W {
        &self.sink
    }

    /// Returns the output sink.
    #[must_use]
    pub fn into_sink(self) -> W {
        self.sink
    }

    fn emit(&mut self, bytes: &[u8]) {
        if self.error.is_some() {
            return;
        }
        if let Err(err) = self.sink.write_all(bytes).and_then(|()| self.sink.flush()) {
            log::error!("console write failed: {err}");
            self.error = Some(err.kind());
        }
    }
}

impl<W: Write> SystemCallHandler for BdosConsole<W> {
    fn on_system_call(&mut self, c: u8, de: u16, memory: &Memory) {
        self.calls += 1;
        match c {
            CONSOLE_OUTPUT => self.emit(&[low_byte(de)]),
            PRINT_STRING => match memory.read_until(de, STRING_TERMINATOR) {
                Some(text) => self.emit(&text),
                None => log::warn!("unterminated string at {de:#06x}"),
            },
            other => log::debug!("ignoring system call {other} (DE={de:#06x})"),
        }
    }
}
