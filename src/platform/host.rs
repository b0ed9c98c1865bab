// SensorStream - Host Serial Port
//
// stdin/stdout as a serial link for running the node off-target.  A reader
// thread forwards stdin bytes over a channel so `available` never blocks.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use crate::error::Result;
use crate::transport::SerialPort;

pub struct StdioPort {
    rx: Receiver<u8>,
    pending: VecDeque<u8>,
}

impl StdioPort {
    pub fn spawn() -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("stdin".into())
            .spawn(move || {
                let stdin = std::io::stdin();
                for byte in stdin.lock().bytes() {
                    let Ok(byte) = byte else { break };
                    if tx.send(byte).is_err() {
                        break;
                    }
                }
                log::debug!("stdin closed");
            })?;
        Ok(Self::from_receiver(rx))
    }

    pub fn from_receiver(rx: Receiver<u8>) -> Self {
        Self { rx, pending: VecDeque::new() }
    }

    fn drain_channel(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(byte) => self.pending.push_back(byte),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
    }
}

impl SerialPort for StdioPort {
    fn available(&mut self) -> Result<usize> {
        self.drain_channel();
        Ok(self.pending.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.drain_channel();
        let n = buf.len().min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        std::io::stdout().lock().write_all(bytes)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        std::io::stdout().lock().flush()?;
        Ok(())
    }
}
