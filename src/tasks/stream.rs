// SensorStream - Stream Task
//
// The node's only flow of control.  Ticks the scheduler forever, yielding
// briefly between iterations so the idle task and the radio stack get CPU.

use std::fmt::Display;

use crate::config::*;
use crate::events::TickOutcome;
use crate::scheduler::{Scheduler, SchedulerState};
use crate::source::SampleSource;
use crate::time::Clock;
use crate::transport::Transport;

pub fn run<S, T, C>(mut scheduler: Scheduler<S, T, C>, mut state: SchedulerState) -> !
where
    S: SampleSource,
    T: Transport,
    C: Clock,
{
    log::info!("Stream task started");
    loop {
        step(&mut scheduler, &mut state);
        scheduler.clock().delay_ms(POLL_IDLE_MS);
    }
}

/// One loop iteration.  A failed tick is logged and yields `None`; the next
/// tick starts from a clear buffer.
pub fn step<S, T, C>(scheduler: &mut Scheduler<S, T, C>, state: &mut SchedulerState) -> Option<TickOutcome>
where
    S: SampleSource,
    T: Transport,
    C: Clock,
{
    match scheduler.tick(state) {
        Ok(outcome) => {
            if outcome.packets() > 0 {
                log::trace!("{} packet(s) sent, {} total", outcome.packets(), state.packets_sent());
            }
            Some(outcome)
        }
        Err(e) => {
            log::warn!("tick failed: {}", e);
            None
        }
    }
}

/// Halt after a peripheral failed to start, repeating the reason forever.
pub fn fail_stop(what: &str, err: &dyn Display, clock: &impl Clock) -> ! {
    loop {
        log::error!("{} failed to start: {}; halted", what, err);
        clock.delay_ms(FAIL_STOP_RETRY_MS);
    }
}
