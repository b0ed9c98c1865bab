// SensorStream - Config Handshake
//
// Two-state machine for the serial link.  The descriptor is re-advertised
// while unconfirmed; packets flow only once the host has acknowledged it.

use crate::config::HANDSHAKE_RESEND_MS;
use crate::events::HostCommand;
use crate::time::elapsed_ms;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandshakeState {
    #[default]
    Unconfirmed,
    Streaming,
}

#[derive(Debug, Default)]
pub struct Handshake {
    state: HandshakeState,
    last_advert_ms: Option<u32>,
}

impl Handshake {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn is_streaming(&self) -> bool {
        self.state == HandshakeState::Streaming
    }

    /// Apply a host command.  Returns `true` when the state changed.
    pub fn on_command(&mut self, command: HostCommand) -> bool {
        let next = match command {
            HostCommand::Connect => HandshakeState::Streaming,
            HostCommand::Disconnect => HandshakeState::Unconfirmed,
        };
        if next == self.state {
            return false;
        }
        log::info!("handshake {:?} -> {:?}", self.state, next);
        self.state = next;
        if next == HandshakeState::Unconfirmed {
            // Re-advertise on the next poll.
            self.last_advert_ms = None;
        }
        true
    }

    /// Whether the descriptor should be sent again at `now_ms`.  Never true
    /// while streaming.
    pub fn advert_due(&self, now_ms: u32) -> bool {
        match (self.state, self.last_advert_ms) {
            (HandshakeState::Streaming, _) => false,
            (HandshakeState::Unconfirmed, None) => true,
            (HandshakeState::Unconfirmed, Some(last)) => elapsed_ms(now_ms, last) >= HANDSHAKE_RESEND_MS,
        }
    }

    pub fn mark_advertised(&mut self, now_ms: u32) {
        self.last_advert_ms = Some(now_ms);
    }
}
