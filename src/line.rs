//! Hardware line interface used by the SWD driver.
//!
//! The driver only needs to change a pin's direction, drive an output pin,
//! sample an input pin and block for a number of microseconds. Anything that
//! can do that (an FTDI GPIO bank, a simulated bus, a microcontroller port)
//! can be scanned for SWD lines.

use eh1::{delay::DelayNs, digital::ErrorType};

/// Pin index inside a [`SwdLines`] implementation.
pub type PinId = u8;

/// Highest pin count a pin mask can describe.
pub const MAX_PINS: u8 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}
impl Level {
    pub const fn is_high(self) -> bool {
        matches!(self, Level::High)
    }
}
impl From<bool> for Level {
    fn from(value: bool) -> Self {
        if value { Level::High } else { Level::Low }
    }
}
impl From<Level> for bool {
    fn from(value: Level) -> Self {
        value.is_high()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Host drives the pin.
    Output,
    /// Pin floats with a pull-up, the target may drive it.
    Input,
}

/// Bit-bang capability the SWD link is built on.
///
/// Implementations keep no protocol state; the link driver assumes nothing
/// about a pin it has not configured itself. `delay_us` from [`DelayNs`] is the
/// blocking delay all protocol timing is derived from.
pub trait SwdLines: ErrorType + DelayNs {
    /// Number of addressable pins, pins `0..pin_count()` are valid.
    fn pin_count(&self) -> u8;

    fn set_direction(&mut self, pin: PinId, direction: Direction) -> Result<(), Self::Error>;

    /// Only valid while `pin` is an [`Direction::Output`].
    fn write_level(&mut self, pin: PinId, level: Level) -> Result<(), Self::Error>;

    /// Only valid while `pin` is an [`Direction::Input`].
    fn read_level(&mut self, pin: PinId) -> Result<Level, Self::Error>;
}

impl<T: SwdLines + ?Sized> SwdLines for &mut T {
    fn pin_count(&self) -> u8 {
        T::pin_count(self)
    }
    fn set_direction(&mut self, pin: PinId, direction: Direction) -> Result<(), Self::Error> {
        T::set_direction(self, pin, direction)
    }
    fn write_level(&mut self, pin: PinId, level: Level) -> Result<(), Self::Error> {
        T::write_level(self, pin, level)
    }
    fn read_level(&mut self, pin: PinId) -> Result<Level, Self::Error> {
        T::read_level(self, pin)
    }
}
