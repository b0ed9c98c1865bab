// SensorStream - Streaming (Serial) Transport
//
// Wired byte-stream link.  The descriptor is written as one JSON line and
// repeated until the host answers "connect"; packets are raw little-endian
// bytes written and flushed before the call returns.

use crate::config::TransportKind;
use crate::error::{Error, Result};
use crate::events::HostCommand;
use crate::handshake::{Handshake, HandshakeState};
use crate::input::TokenReader;
use crate::packetizer::Packet;
use crate::transport::Transport;

/// A full-duplex byte stream such as a UART or USB CDC port.
pub trait SerialPort {
    /// Bytes waiting to be read.  Never blocks.
    fn available(&mut self) -> Result<usize>;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    fn write_all(&mut self, bytes: &[u8]) -> Result<()>;

    /// Block until every written byte has left the port.
    fn flush(&mut self) -> Result<()>;
}

pub struct StreamingTransport<P> {
    port: P,
    handshake: Handshake,
    reader: TokenReader,
    /// Descriptor plus trailing newline, kept for re-advertisement.
    config_line: Vec<u8>,
    // The setup write has no timestamp yet; the next poll supplies one.
    config_unstamped: bool,
}

impl<P: SerialPort> StreamingTransport<P> {
    pub fn new(port: P) -> Self {
        Self {
            port,
            handshake: Handshake::new(),
            reader: TokenReader::new(),
            config_line: Vec::new(),
            config_unstamped: false,
        }
    }

    pub fn handshake_state(&self) -> HandshakeState {
        self.handshake.state()
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    fn write_config(&mut self) -> Result<()> {
        self.port.write_all(&self.config_line)?;
        self.port.flush()
    }

    fn on_token(&mut self, token: &str) {
        log::debug!("serial token {:?}", token);
        match HostCommand::from_token(token) {
            Some(command) => {
                self.handshake.on_command(command);
            }
            None => log::debug!("ignoring unrecognised token"),
        }
    }

    /// Drain waiting bytes through the token reader.
    fn read_tokens(&mut self, now_ms: u32) -> Result<()> {
        let mut chunk = [0u8; 16];
        while self.port.available()? > 0 {
            let n = self.port.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            for &byte in &chunk[..n] {
                if let Some(token) = self.reader.push(byte, now_ms) {
                    self.on_token(&token);
                }
            }
        }
        if let Some(token) = self.reader.expire(now_ms) {
            self.on_token(&token);
        }
        Ok(())
    }
}

impl<P: SerialPort> Transport for StreamingTransport<P> {
    fn kind(&self) -> TransportKind {
        TransportKind::Streaming
    }

    fn poll(&mut self, now_ms: u32) -> Result<()> {
        self.read_tokens(now_ms)?;
        if std::mem::take(&mut self.config_unstamped) {
            self.handshake.mark_advertised(now_ms);
        }
        if !self.config_line.is_empty() && self.handshake.advert_due(now_ms) {
            self.write_config()?;
            self.handshake.mark_advertised(now_ms);
        }
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.handshake.is_streaming()
    }

    fn send_config(&mut self, descriptor: &[u8]) -> Result<()> {
        self.config_line.clear();
        self.config_line.extend_from_slice(descriptor);
        self.config_line.push(b'\n');
        self.config_unstamped = true;
        self.write_config()
    }

    fn send_packet(&mut self, packet: &Packet<'_>) -> Result<()> {
        let mtu = self.kind().mtu();
        if packet.len() > mtu {
            return Err(Error::PacketTooLarge { bytes: packet.len(), mtu });
        }
        self.port.write_all(packet.as_bytes())?;
        self.port.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct Loopback {
        inbound: VecDeque<u8>,
        written: Vec<u8>,
        flushes: usize,
    }

    impl SerialPort for Loopback {
        fn available(&mut self) -> Result<usize> {
            Ok(self.inbound.len())
        }
        fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
            let n = buf.len().min(self.inbound.len());
            for (slot, byte) in buf.iter_mut().zip(self.inbound.drain(..n)) {
                *slot = byte;
            }
            Ok(n)
        }
        fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
            self.written.extend_from_slice(bytes);
            Ok(())
        }
        fn flush(&mut self) -> Result<()> {
            self.flushes += 1;
            Ok(())
        }
    }

    fn lines(bytes: &[u8]) -> usize {
        bytes.iter().filter(|&&b| b == b'\n').count()
    }

    #[test]
    fn config_is_newline_terminated_and_flushed() {
        let mut t = StreamingTransport::new(Loopback::default());
        t.send_config(br#"{"a":1}"#).unwrap();
        assert_eq!(t.port().written, b"{\"a\":1}\n");
        assert_eq!(t.port().flushes, 1);
    }

    #[test]
    fn readvertises_until_connect() {
        let mut t = StreamingTransport::new(Loopback::default());
        t.send_config(b"{}").unwrap();
        t.poll(0).unwrap();
        t.poll(500).unwrap();
        assert_eq!(lines(&t.port().written), 1);
        t.poll(1000).unwrap();
        t.poll(1999).unwrap();
        t.poll(2000).unwrap();
        assert_eq!(lines(&t.port().written), 3);

        t.port_mut().inbound.extend(b"connect\n");
        t.poll(2200).unwrap();
        assert!(t.is_ready());
        t.poll(5000).unwrap();
        assert_eq!(lines(&t.port().written), 3);
    }

    #[test]
    fn garbage_tokens_are_ignored() {
        let mut t = StreamingTransport::new(Loopback::default());
        t.port_mut().inbound.extend(b"hello\nCONNECT\n");
        t.poll(0).unwrap();
        assert_eq!(t.handshake_state(), HandshakeState::Unconfirmed);
    }

    #[test]
    fn disconnect_stops_stream() {
        let mut t = StreamingTransport::new(Loopback::default());
        t.port_mut().inbound.extend(b"cnnect\r\n");
        t.poll(0).unwrap();
        assert!(t.is_ready());
        t.port_mut().inbound.extend(b"disconnect");
        t.poll(10).unwrap();
        assert!(t.is_ready());
        t.poll(110).unwrap();
        assert!(!t.is_ready());
    }
}
