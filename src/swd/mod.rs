//! SWD pin discovery.
//!
//! [`SwdLink`] clocks bits over a candidate pin pair, [`Sequencer`] runs the
//! JTAG-to-SWD switch and the DPIDR read on top of it, and [`Scanner`] walks
//! every ordered pin pair of a [`PinMask`] looking for an ARM debug port.

mod idcode;
mod link;
mod sequence;
mod swd_detect;

pub use idcode::{Ack, DESIGNER_ARM, IdResponse, PARTNO_DEFAULT};
pub use link::{CLOCK_HALF_PERIOD_US, LINE_RESET_CYCLES, SwdLink};
pub use sequence::{ProtocolOptions, Sequencer};
pub use swd_detect::{CancelToken, PinMask, ScanConfig, ScanIter, ScanSummary, Scanner};

use crate::line::{MAX_PINS, PinId};
use std::fmt;

/// Pin choice that can not be tried, raised before any pin is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PinError {
    #[error("Swclk and swdio can not share pin {0}.")]
    SamePin(PinId),
    #[error("Pin {pin} is out of range 0 - {}.", .count.saturating_sub(1))]
    OutOfRange { pin: PinId, count: u8 },
}

#[derive(Debug, thiserror::Error)]
pub enum ScanError<E> {
    #[error(transparent)]
    Pin(#[from] PinError),
    /// The line interface failed, the attempt was abandoned.
    #[error("Line interface fault: {0:?}")]
    Line(E),
}

/// Candidate SWCLK/SWDIO pins for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PinAssignment {
    pub(crate) swclk: PinId,
    pub(crate) swdio: PinId,
}
impl PinAssignment {
    pub fn new(swclk: PinId, swdio: PinId) -> Result<Self, PinError> {
        if swclk == swdio {
            return Err(PinError::SamePin(swclk));
        }
        Self { swclk, swdio }.check_count(MAX_PINS)
    }
    pub fn swclk(&self) -> PinId {
        self.swclk
    }
    pub fn swdio(&self) -> PinId {
        self.swdio
    }
    /// Check both pins against the pins a line interface actually has.
    pub(crate) fn check_count(self, count: u8) -> Result<Self, PinError> {
        for pin in [self.swclk, self.swdio] {
            if pin >= count {
                return Err(PinError::OutOfRange { pin, count });
            }
        }
        Ok(self)
    }
}

/// How much each attempt reports.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// Only pairs that answered like an ARM debug port.
    #[default]
    Quiet,
    /// One row per attempt.
    Normal,
    /// Rows plus every bit sent and received.
    Verbose,
}
impl From<u8> for Verbosity {
    /// Unknown levels fall back to [`Verbosity::Quiet`].
    fn from(value: u8) -> Self {
        match value {
            1 => Verbosity::Normal,
            2 => Verbosity::Verbose,
            _ => Verbosity::Quiet,
        }
    }
}

/// Outcome of one attempt on one pin pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanResult {
    pub pins: PinAssignment,
    pub response: IdResponse,
    pub matched: bool,
}
impl fmt::Display for ScanResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CLK: {:2} | IO: {:2} | ACK: {} | PART: {:5x} | MAN: {:4x}",
            self.pins.swclk,
            self.pins.swdio,
            self.response.ack(),
            self.response.part_number(),
            self.response.manufacturer()
        )
    }
}

#[cfg(test)]
mod test {
    use super::{IdResponse, PinAssignment, PinError, ScanError, ScanResult, Verbosity};

    #[test]
    fn pin_assignment_rejects_same_pin() {
        assert_eq!(PinAssignment::new(4, 4), Err(PinError::SamePin(4)));
        let pins = PinAssignment::new(4, 5).unwrap();
        assert_eq!((pins.swclk(), pins.swdio()), (4, 5));
    }

    #[test]
    fn pin_assignment_rejects_out_of_range() {
        assert_eq!(
            PinAssignment::new(64, 1),
            Err(PinError::OutOfRange { pin: 64, count: 64 })
        );
        let pins = PinAssignment::new(2, 9).unwrap();
        assert_eq!(
            pins.check_count(8),
            Err(PinError::OutOfRange { pin: 9, count: 8 })
        );
        assert!(pins.check_count(10).is_ok());
    }

    #[test]
    fn pin_error_messages() {
        let err: ScanError<()> = PinError::OutOfRange { pin: 9, count: 8 }.into();
        assert_eq!(err.to_string(), "Pin 9 is out of range 0 - 7.");
        let err: ScanError<()> = PinError::SamePin(3).into();
        assert_eq!(err.to_string(), "Swclk and swdio can not share pin 3.");
    }

    #[test]
    fn verbosity_from_level() {
        assert_eq!(Verbosity::from(0), Verbosity::Quiet);
        assert_eq!(Verbosity::from(1), Verbosity::Normal);
        assert_eq!(Verbosity::from(2), Verbosity::Verbose);
        assert_eq!(Verbosity::from(7), Verbosity::Quiet);
        assert!(Verbosity::Verbose > Verbosity::Normal);
    }

    #[test]
    fn scan_result_row() {
        // g431cbu6 DPIDR
        let result = ScanResult {
            pins: PinAssignment::new(2, 3).unwrap(),
            response: IdResponse::from_bits(0x2BA0_1477 << 3 | 0b001),
            matched: true,
        };
        assert_eq!(
            result.to_string(),
            "CLK:  2 | IO:  3 | ACK: 1 | PART:  ba01 | MAN:  23b"
        );
    }
}
