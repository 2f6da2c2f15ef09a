use std::fmt;

/// JEP106 designer code of ARM, reported by every ARM debug port.
pub const DESIGNER_ARM: u16 = 0x23B;
/// Part number of the Cortex-M debug ports seen most often (STM32 and friends).
///
/// Only reported, a pair with any part number still matches.
pub const PARTNO_DEFAULT: u16 = 0xBA01;

/// Raw 36 bits clocked in after a DPIDR read request.
///
/// Timing Sequence: [ACK(3), DPIDR(32), Parity(1)], LSB first.
/// DPIDR itself is [RAO(1), DESIGNER(11), PARTNO(16), VERSION(4)].
#[bitfield_struct::bitfield(u64, order = Lsb)]
#[derive(PartialEq, Eq)]
pub struct IdResponse {
    #[bits(3)]
    pub ack: u8,
    /// Always 1 in a valid DPIDR.
    pub rao: bool,
    #[bits(11)]
    pub manufacturer: u16,
    pub part_number: u16,
    #[bits(4)]
    pub version: u8,
    pub parity: bool,
    #[bits(28)]
    __: u32,
}
impl IdResponse {
    pub const BITS: usize = 36;

    /// The 32 bit DPIDR value between ack and parity.
    pub fn data(&self) -> u32 {
        (self.into_bits() >> 3) as u32
    }
    pub fn decoded_ack(&self) -> Ack {
        Ack::from(self.ack())
    }
    /// Even parity over [`IdResponse::data`]. Not part of the match decision.
    pub fn parity_ok(&self) -> bool {
        (self.data().count_ones() & 1 == 1) == self.parity()
    }
    /// OK ack from a port designed by ARM.
    pub fn is_arm_debug_port(&self) -> bool {
        self.ack() == Ack::OK && self.manufacturer() == DESIGNER_ARM
    }
}

/// SWD ack, LSB[2:0] - 001:ok, 010:wait, 100:fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    Ok,
    Wait,
    Fault,
    /// Anything else, usually a floating or wrong line.
    Other(u8),
}
impl Ack {
    pub const OK: u8 = 0b001;
    pub const WAIT: u8 = 0b010;
    pub const FAULT: u8 = 0b100;
}
impl From<u8> for Ack {
    fn from(value: u8) -> Self {
        match value {
            Self::OK => Ack::Ok,
            Self::WAIT => Ack::Wait,
            Self::FAULT => Ack::Fault,
            x => Ack::Other(x),
        }
    }
}
impl fmt::Display for Ack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ack::Ok => f.write_str("OK"),
            Ack::Wait => f.write_str("WAIT"),
            Ack::Fault => f.write_str("FAULT"),
            Ack::Other(x) => write!(f, "{x:#05b}"),
        }
    }
}
