// SensorStream - Serial Token Reader
//
// Assembles inbound serial bytes into command tokens.  A token ends at a
// newline, or when the line has been idle for the read window, the same
// way a timed stream read returns whatever arrived.  Polled from the
// scheduler loop with the current time.

use crate::config::{TOKEN_IDLE_MS, TOKEN_MAX_LEN};
use crate::time::elapsed_ms;

#[derive(Debug, Default)]
pub struct TokenReader {
    line: Vec<u8>,
    last_byte_ms: u32,
    // Set once a line exceeds TOKEN_MAX_LEN; the rest of it is dropped.
    overflow: bool,
}

impl TokenReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte received at `now_ms`.  Returns a completed token when
    /// the byte was a newline.
    pub fn push(&mut self, byte: u8, now_ms: u32) -> Option<String> {
        self.last_byte_ms = now_ms;
        match byte {
            b'\n' => self.finish(),
            b'\r' => None,
            _ => {
                if self.line.len() >= TOKEN_MAX_LEN {
                    self.overflow = true;
                } else {
                    self.line.push(byte);
                }
                None
            }
        }
    }

    /// Close a pending line that has been idle for the read window.
    pub fn expire(&mut self, now_ms: u32) -> Option<String> {
        let pending = !self.line.is_empty() || self.overflow;
        if pending && elapsed_ms(now_ms, self.last_byte_ms) >= TOKEN_IDLE_MS {
            self.finish()
        } else {
            None
        }
    }

    fn finish(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.line);
        if std::mem::take(&mut self.overflow) {
            log::debug!("discarding over-long serial line");
            return None;
        }
        if line.is_empty() {
            return None;
        }
        match String::from_utf8(line) {
            Ok(token) => Some(token),
            Err(_) => {
                log::debug!("discarding non-UTF-8 serial line");
                None
            }
        }
    }
}
