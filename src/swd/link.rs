use crate::line::{Direction, Level, SwdLines};

use super::{PinAssignment, Verbosity};

/// SWCLK half period, one bit takes two of them (~2kHz).
pub const CLOCK_HALF_PERIOD_US: u32 = 250;
/// Clock cycles with SWDIO high for a line reset, the protocol needs 50 or more.
pub const LINE_RESET_CYCLES: usize = 64;
/// Widest value `write_bits`/`read_bits` can carry.
pub const MAX_SHIFT_BITS: usize = u64::BITS as usize;

/// Bit level SWD link over one SWCLK/SWDIO pin pair.
///
/// The host changes SWDIO while SWCLK is low, the target samples it on the
/// rising edge. Every multi-bit transfer is LSB first.
pub struct SwdLink<'a, L: SwdLines> {
    lines: &'a mut L,
    pins: PinAssignment,
    verbosity: Verbosity,
}
impl<'a, L: SwdLines> SwdLink<'a, L> {
    pub fn new(lines: &'a mut L, pins: PinAssignment, verbosity: Verbosity) -> Self {
        Self {
            lines,
            pins,
            verbosity,
        }
    }
    pub fn pins(&self) -> PinAssignment {
        self.pins
    }
    /// Both pins as outputs, ready to clock out data.
    pub(crate) fn setup_pins(&mut self) -> Result<(), L::Error> {
        self.lines
            .set_direction(self.pins.swdio, Direction::Output)?;
        self.lines
            .set_direction(self.pins.swclk, Direction::Output)
    }
    /// Return both pins to floating inputs.
    pub(crate) fn release_pins(&mut self) -> Result<(), L::Error> {
        let swdio = self.lines.set_direction(self.pins.swdio, Direction::Input);
        let swclk = self.lines.set_direction(self.pins.swclk, Direction::Input);
        swdio.and(swclk)
    }
    pub fn pulse_clock(&mut self) -> Result<(), L::Error> {
        self.lines.write_level(self.pins.swclk, Level::Low)?;
        self.lines.delay_us(CLOCK_HALF_PERIOD_US);
        self.lines.write_level(self.pins.swclk, Level::High)?;
        self.lines.delay_us(CLOCK_HALF_PERIOD_US);
        Ok(())
    }
    pub fn drive_line(&mut self, level: Level) -> Result<(), L::Error> {
        self.lines
            .set_direction(self.pins.swdio, Direction::Output)?;
        self.lines.write_level(self.pins.swdio, level)
    }
    /// Hand SWDIO to the target, the pull-up holds it high until it drives.
    pub fn release_line(&mut self) -> Result<(), L::Error> {
        self.lines.set_direction(self.pins.swdio, Direction::Input)
    }
    pub(crate) fn restore_write_mode(&mut self) -> Result<(), L::Error> {
        self.lines
            .set_direction(self.pins.swdio, Direction::Output)
    }
    pub fn write_bit(&mut self, value: bool) -> Result<(), L::Error> {
        self.drive_line(value.into())?;
        self.pulse_clock()
    }
    /// Send the `len` least significant bits of `value`, LSB first.
    pub fn write_bits(&mut self, value: u64, len: usize) -> Result<(), L::Error> {
        assert!(
            len <= MAX_SHIFT_BITS,
            "bit length should be less than {MAX_SHIFT_BITS}"
        );
        for i in 0..len {
            self.write_bit(value >> i & 1 == 1)?;
        }
        self.trace(">>", value, len);
        Ok(())
    }
    /// Sample `len` bits, LSB first. Each bit is sampled before its clock pulse.
    pub fn read_bits(&mut self, len: usize) -> Result<u64, L::Error> {
        assert!(
            len <= MAX_SHIFT_BITS,
            "bit length should be less than {MAX_SHIFT_BITS}"
        );
        self.release_line()?;
        let mut value = 0u64;
        for i in 0..len {
            if self.lines.read_level(self.pins.swdio)?.is_high() {
                value |= 1 << i;
            }
            self.pulse_clock()?;
        }
        self.trace("<<", value, len);
        self.restore_write_mode()?;
        Ok(value)
    }
    /// One clock cycle with nobody driving SWDIO from the host side.
    pub fn turnaround(&mut self) -> Result<(), L::Error> {
        self.release_line()?;
        self.pulse_clock()
    }
    pub fn reset_line(&mut self) -> Result<(), L::Error> {
        self.drive_line(Level::High)?;
        for _ in 0..LINE_RESET_CYCLES {
            self.pulse_clock()?;
        }
        Ok(())
    }
    fn trace(&self, prefix: &str, value: u64, len: usize) {
        let level = trace_level(self.verbosity);
        if log::log_enabled!(level) {
            log::log!(level, "{prefix} {}", bit_string(value, len));
        }
    }
}

/// Bit traces show up in a plain `info` log only when asked for.
pub(crate) fn trace_level(verbosity: Verbosity) -> log::Level {
    if verbosity >= Verbosity::Verbose {
        log::Level::Info
    } else {
        log::Level::Trace
    }
}

/// Bits of `value` in transmission order.
pub(crate) fn bit_string(value: u64, len: usize) -> String {
    (0..len)
        .map(|i| if value >> i & 1 == 1 { '1' } else { '0' })
        .collect()
}
