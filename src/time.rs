// SensorStream - Monotonic Time
//
// Millisecond tick source shared by the scheduler, the transports and the
// token reader.  Wraps at ~49 days; every comparison uses `wrapping_sub`.

/// Monotonic millisecond clock with a blocking delay.
pub trait Clock {
    fn now_ms(&self) -> u32;
    fn delay_ms(&self, ms: u32);
}

/// Milliseconds elapsed from `since` to `now`, tolerant of counter wrap.
pub fn elapsed_ms(now: u32, since: u32) -> u32 {
    now.wrapping_sub(since)
}

// ---------------------------------------------------------------------------
// Utility: milliseconds since boot
// ---------------------------------------------------------------------------
#[cfg(target_os = "espidf")]
pub fn now_ms() -> u32 {
    unsafe { (esp_idf_sys::esp_timer_get_time() / 1000) as u32 }
}

#[cfg(not(target_os = "espidf"))]
pub fn now_ms() -> u32 {
    use std::sync::OnceLock;
    use std::time::Instant;

    static BOOT: OnceLock<Instant> = OnceLock::new();
    BOOT.get_or_init(Instant::now).elapsed().as_millis() as u32
}

/// The board's own timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u32 {
        now_ms()
    }

    fn delay_ms(&self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(u64::from(ms)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_survives_wrap() {
        assert_eq!(elapsed_ms(5, u32::MAX - 4), 10);
        assert_eq!(elapsed_ms(1000, 1000), 0);
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock;
        let a = clock.now_ms();
        clock.delay_ms(2);
        assert!(elapsed_ms(clock.now_ms(), a) >= 2);
    }
}
