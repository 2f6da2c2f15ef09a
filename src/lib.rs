//! Find the SWD pins of an unknown board by brute force.
//!
//! Every ordered pair of candidate pins is tried as SWCLK/SWDIO: the
//! JTAG-to-SWD switch is bit-banged over the pair and the debug port's
//! IDCODE (DPIDR) is read back. A pair matches when the target acknowledges
//! with OK and reports ARM as designer.
//!
//! The pins come from a [`SwdLines`] implementation: the GPIO banks of an
//! FTDI MPSSE chip ([`FtdiSwdLines`]) or the software model in [`sim`].
//!
//! # Quickstart
//!
//! * Linux users only: Add [udev rules].
//! * Connect the candidate pins to ADBUS0-7 (pins 0-7) and ACBUS0-7 (pins 8-15).
//!
//! # Limitations
//!
//! * Limited device support: FT232H, FT2232D, FT2232H, FT4232H.
//! * Only the DPIDR read is issued, no further debug port access.
//!
//! [udev rules]: https://github.com/probe-rs/webpage/blob/master/public/files/69-probe-rs.rules

#![forbid(unsafe_code)]

pub mod delay;
mod ftdaye;
pub mod gpio;
pub mod line;
mod list;
pub mod mpsse;
mod mpsse_cmd;
pub mod sim;
pub mod swd;

pub use gpio::FtdiSwdLines;
pub use line::{Direction, Level, PinId, SwdLines};
pub use list::{FtdiDeviceInfo, list_all_device};
pub use mpsse::FtdiMpsse;
pub use swd::{
    PinAssignment, PinError, PinMask, ProtocolOptions, ScanConfig, ScanError, ScanResult, Scanner,
    Verbosity,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChipType {
    Am,
    Bm,
    FT2232D,
    R,
    FT2232H,
    FT4232H,
    FT232H,
    FT230X,
}
impl ChipType {
    pub(crate) const fn interface_list(self) -> &'static [Interface] {
        match self {
            ChipType::FT232H => &[Interface::A],
            ChipType::FT2232H | ChipType::FT2232D => &[Interface::A, Interface::B],
            ChipType::FT4232H => &[Interface::A, Interface::B, Interface::C, Interface::D],
            _ => &[],
        }
    }
    pub(crate) const fn mpsse_list(self) -> &'static [Interface] {
        match self {
            ChipType::FT232H | ChipType::FT2232D => &[Interface::A],
            ChipType::FT2232H | ChipType::FT4232H => &[Interface::A, Interface::B],
            _ => &[],
        }
    }
    /// GPIO pins in the upper (ACBUS) bank.
    pub(crate) const fn upper_pins(self) -> usize {
        match self {
            ChipType::FT232H | ChipType::FT2232H => 8,
            ChipType::FT2232D => 4,
            _ => 0,
        }
    }
    pub(crate) const fn max_packet_size(self) -> usize {
        match self {
            ChipType::FT232H | ChipType::FT2232H | ChipType::FT4232H => 512,
            _ => 64,
        }
    }
}
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Interface {
    A = 1,
    B = 2,
    C = 3,
    D = 4,
}

impl Interface {
    pub(crate) const fn read_ep(self) -> u8 {
        match self {
            Interface::A => 0x81,
            Interface::B => 0x83,
            Interface::C => 0x85,
            Interface::D => 0x87,
        }
    }

    pub(crate) const fn write_ep(self) -> u8 {
        match self {
            Interface::A => 0x02,
            Interface::B => 0x04,
            Interface::C => 0x06,
            Interface::D => 0x08,
        }
    }

    pub(crate) const fn index(self) -> u16 {
        self as u16
    }

    pub(crate) const fn interface_number(self) -> u8 {
        (self as u8) - 1
    }
}

/// A GPIO pin of one MPSSE interface.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Pin {
    /// ADBUS, scan pins 0 - 7.
    Lower(usize),
    /// ACBUS, scan pins 8 and up.
    Upper(usize),
}
impl Pin {
    pub(crate) const fn mask(self) -> u8 {
        match self {
            Pin::Lower(idx) => 1 << idx,
            Pin::Upper(idx) => 1 << idx,
        }
    }
}
impl From<PinId> for Pin {
    fn from(value: PinId) -> Self {
        match value {
            0..8 => Pin::Lower(value as usize),
            _ => Pin::Upper(value as usize - 8),
        }
    }
}
impl From<Pin> for PinId {
    fn from(value: Pin) -> Self {
        match value {
            Pin::Lower(idx) => idx as PinId,
            Pin::Upper(idx) => idx as PinId + 8,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FtdiError {
    #[error("A USB transport error occurred.")]
    ///
    /// This variant is used for all errors reported by the operating system when performing a USB
    /// operation. It may indicate that the USB device was unplugged, that another application or an
    /// operating system driver is currently using it, or that the current user does not have
    /// permission to access it.
    Usb(#[from] std::io::Error),

    #[error("Open failed: {0}")]
    /// Error occurs when open.
    OpenFailed(String),

    #[error("Unsupported chip type: {0:?}")]
    /// The connected device is not supported by the driver.
    UnsupportedChip(ChipType),

    #[error("Bad Mpsse Command: {0:#x}")]
    BadMpsseCommand(u8),

    #[error("{chip:?} Interface::{interface:?} has no MPSSE engine.")]
    NoMpsse { chip: ChipType, interface: Interface },

    #[error("{chip:?} has no pin {pin:?}.")]
    PinNotValid { chip: ChipType, pin: Pin },

    #[error("Pin {0:?} is already in use.")]
    PinInUse(Pin),

    #[error("Pin {0} was not allocated for scanning.")]
    PinNotAllocated(PinId),

    #[error("Mpsse handle poisoned by a panicked thread.")]
    Poisoned,
}
