use eh1::delay::DelayNs;
use std::time::{Duration, Instant};

/// Busy-wait delay.
///
/// `thread::sleep` rounds up to the scheduler tick, which stretches a 250us
/// SWD half period into milliseconds. Spinning on [`Instant`] keeps it close.
#[derive(Debug, Default, Clone, Copy)]
pub struct Delay;
impl Delay {
    fn spin(duration: Duration) {
        let start = Instant::now();
        while start.elapsed() < duration {
            std::hint::spin_loop();
        }
    }
}
impl DelayNs for Delay {
    fn delay_ns(&mut self, ns: u32) {
        Self::spin(Duration::from_nanos(ns as u64));
    }
    fn delay_us(&mut self, us: u32) {
        Self::spin(Duration::from_micros(us as u64));
    }
    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(Duration::from_millis(ms as u64));
    }
}

#[cfg(test)]
mod test {
    use super::Delay;
    use eh1::delay::DelayNs;
    use std::time::{Duration, Instant};

    #[test]
    fn delay_us_waits_at_least_requested() {
        let now = Instant::now();
        Delay.delay_us(250);
        assert!(now.elapsed() >= Duration::from_micros(250));
    }
}
