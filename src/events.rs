// SensorStream - Host Commands & Tick Outcomes

// ---------------------------------------------------------------------------
// Host commands (serial handshake tokens)
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    Connect,
    Disconnect,
}

impl HostCommand {
    /// Map a received token to a command.  Matching is exact and
    /// case-sensitive; anything unrecognised is `None` and gets ignored.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            // "cnnect" is what some host tools send; accept it as written.
            "connect" | "cnnect" => Some(Self::Connect),
            "disconnect"         => Some(Self::Disconnect),
            _                    => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Scheduler tick outcome
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No receiver, or the handshake is unconfirmed.  Nothing was read.
    NotReady,
    /// Ready, but the session interval has not elapsed yet.
    Waiting,
    /// Interval elapsed; fewer than one packet's worth of samples queued.
    Idle,
    /// Packets handed to the transport this tick.
    Emitted(usize),
}

impl TickOutcome {
    pub fn packets(&self) -> usize {
        match self {
            Self::Emitted(n) => *n,
            _ => 0,
        }
    }
}
