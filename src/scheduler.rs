// SensorStream - Cooperative Scheduler
//
// One tick per loop iteration: poll the link, and when the session interval
// has elapsed move every whole packet the source has queued to the
// transport.  All timing state lives in `SchedulerState`, which the caller
// owns and hands back on each tick.

use crate::config::{BuildProfile, PacketShape};
use crate::descriptor::ConfigDescriptor;
use crate::error::{Error, Result};
use crate::events::TickOutcome;
use crate::packetizer::Packetizer;
use crate::source::SampleSource;
use crate::time::{elapsed_ms, Clock};
use crate::transport::Transport;

/// Polling interval for one session, fixed at setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionClock {
    interval_ms: u32,
}

impl SessionClock {
    /// Half the sample period, so the loop looks at least twice per sample.
    pub fn from_odr_hz(odr_hz: u32) -> Self {
        Self { interval_ms: (1000 / odr_hz.max(1)) / 2 }
    }

    /// Poll on every tick.
    pub fn free_running() -> Self {
        Self { interval_ms: 0 }
    }

    pub fn for_rate(odr_hz: Option<u32>) -> Self {
        odr_hz.map_or_else(Self::free_running, Self::from_odr_hz)
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    pub fn is_due(&self, now_ms: u32, last_ms: u32) -> bool {
        elapsed_ms(now_ms, last_ms) >= self.interval_ms
    }
}

/// Mutable timing state threaded through every tick.
#[derive(Debug, Clone)]
pub struct SchedulerState {
    session: SessionClock,
    last_emission_ms: u32,
    packets_sent: u64,
    ticks: u64,
}

impl SchedulerState {
    pub fn new(session: SessionClock, now_ms: u32) -> Self {
        Self { session, last_emission_ms: now_ms, packets_sent: 0, ticks: 0 }
    }

    pub fn session(&self) -> SessionClock {
        self.session
    }

    pub fn packets_sent(&self) -> u64 {
        self.packets_sent
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

pub struct Scheduler<S, T, C> {
    source: S,
    transport: T,
    clock: C,
    packetizer: Packetizer,
    descriptor: ConfigDescriptor,
}

impl<S: SampleSource, T: Transport, C: Clock> Scheduler<S, T, C> {
    /// Build the descriptor from the source, size the packet buffer for the
    /// profile and publish the descriptor once.
    pub fn setup(
        mut source: S,
        mut transport: T,
        clock: C,
        profile: BuildProfile,
    ) -> Result<(Self, SchedulerState)> {
        if source.kind() != profile.source {
            return Err(Error::UnsupportedProfile("source does not match the build profile"));
        }
        if transport.kind() != profile.transport {
            return Err(Error::UnsupportedProfile("transport does not match the build profile"));
        }
        let shape = PacketShape::for_profile(profile)?;

        let mut builder = ConfigDescriptor::builder();
        let columns = source.describe(&mut builder);
        builder.samples_per_packet(shape.samples_per_packet);
        let descriptor = builder.build();

        let packetizer = Packetizer::new(shape, columns, transport.kind().mtu())?;
        let bytes = descriptor.to_bytes()?;
        transport.send_config(&bytes)?;

        let session = SessionClock::for_rate(source.output_data_rate_hz());
        log::info!(
            "session: {} columns, {} samples/packet, interval {} ms, descriptor {} bytes",
            columns,
            shape.samples_per_packet,
            session.interval_ms(),
            bytes.len()
        );

        let state = SchedulerState::new(session, clock.now_ms());
        let scheduler = Self { source, transport, clock, packetizer, descriptor };
        Ok((scheduler, state))
    }

    /// One iteration of the cooperative loop.
    pub fn tick(&mut self, state: &mut SchedulerState) -> Result<TickOutcome> {
        state.ticks += 1;
        let now = self.clock.now_ms();
        self.transport.poll(now)?;
        if !self.transport.is_ready() {
            return Ok(TickOutcome::NotReady);
        }
        if !state.session.is_due(now, state.last_emission_ms) {
            return Ok(TickOutcome::Waiting);
        }
        state.last_emission_ms = now;

        let packets = self.packetizer.packets_ready(self.source.available()?);
        if packets == 0 {
            return Ok(TickOutcome::Idle);
        }
        let sent = self.packetizer.emit(&mut self.source, &mut self.transport, packets)?;
        state.packets_sent += sent as u64;
        Ok(TickOutcome::Emitted(sent))
    }

    pub fn descriptor(&self) -> &ConfigDescriptor {
        &self.descriptor
    }

    pub fn packetizer(&self) -> &Packetizer {
        &self.packetizer
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_is_half_the_sample_period() {
        assert_eq!(SessionClock::from_odr_hz(119).interval_ms(), 4);
        assert_eq!(SessionClock::from_odr_hz(10).interval_ms(), 50);
        assert_eq!(SessionClock::from_odr_hz(476).interval_ms(), 1);
        assert_eq!(SessionClock::for_rate(None).interval_ms(), 0);
    }

    #[test]
    fn due_check_handles_wrap() {
        let clock = SessionClock::from_odr_hz(119);
        assert!(!clock.is_due(u32::MAX, u32::MAX - 3));
        assert!(clock.is_due(1, u32::MAX - 2));
        assert!(SessionClock::free_running().is_due(7, 7));
    }
}
