//! Software model of a GPIO bank with an SWD target wired to two of its pins.
//!
//! [`SimBus`] implements [`SwdLines`] without hardware. Unconnected inputs read
//! high (pull-up), the wired [`SimDevice`] sees every rising edge on its SWCLK
//! pin together with whatever the host drives on its SWDIO pin.
//!
//! The bus is strict: writing an input, reading an output or touching a pin
//! that does not exist is an error, so driver mistakes show up in tests.

use crate::{
    line::{Direction, Level, PinId, SwdLines},
    swd::PinAssignment,
};
use eh1::{delay::DelayNs, digital::ErrorType};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SimError {
    #[error("Pin {0} does not exist.")]
    NoSuchPin(PinId),
    #[error("Pin {0} written while it is an input.")]
    NotOutput(PinId),
    #[error("Pin {0} read while it is an output.")]
    NotInput(PinId),
    #[error("Injected line fault.")]
    Injected,
}
impl eh1::digital::Error for SimError {
    fn kind(&self) -> eh1::digital::ErrorKind {
        eh1::digital::ErrorKind::Other
    }
}

/// Something clocked by the host through the simulated SWD pins.
pub trait SimDevice {
    /// Rising SWCLK edge. `swdio` is the host's level, `None` when the host
    /// is not driving SWDIO.
    fn clock(&mut self, swdio: Option<Level>);
    /// Level the device puts on SWDIO right now.
    fn drive(&self) -> Option<Level>;
}

#[derive(Debug, Clone, Copy)]
struct PinState {
    direction: Direction,
    latch: Level,
}
impl Default for PinState {
    fn default() -> Self {
        Self {
            direction: Direction::Input,
            latch: Level::Low,
        }
    }
}

pub struct SimBus<D> {
    pins: Vec<PinState>,
    wiring: PinAssignment,
    device: D,
    swclk_level: Level,
    rising_edges: u64,
    elapsed_ns: u64,
    ops: u64,
    fault_at: Option<u64>,
    driven: Vec<PinId>,
}
impl<D: SimDevice> SimBus<D> {
    /// `wiring` is where the device's SWCLK and SWDIO really are.
    ///
    /// # Panics
    /// If a wired pin is not below `pin_count`.
    pub fn new(pin_count: u8, wiring: PinAssignment, device: D) -> Self {
        assert!(
            wiring.swclk() < pin_count && wiring.swdio() < pin_count,
            "wiring {wiring:?} is out of range 0 - {}",
            pin_count.saturating_sub(1)
        );
        Self {
            pins: vec![PinState::default(); pin_count as usize],
            wiring,
            device,
            swclk_level: Level::High,
            rising_edges: 0,
            elapsed_ns: 0,
            ops: 0,
            fault_at: None,
            driven: Vec::new(),
        }
    }
    pub fn device(&self) -> &D {
        &self.device
    }
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }
    /// Rising edges seen on the wired SWCLK pin.
    pub fn rising_edges(&self) -> u64 {
        self.rising_edges
    }
    /// Virtual time spent in delays.
    pub fn elapsed_us(&self) -> u64 {
        self.elapsed_ns / 1_000
    }
    /// Pins in the order they were first made outputs.
    pub fn driven_pins(&self) -> &[PinId] {
        &self.driven
    }
    pub fn all_inputs(&self) -> bool {
        self.pins
            .iter()
            .all(|pin| pin.direction == Direction::Input)
    }
    /// Fail the `nth` pin operation from now, once.
    pub fn inject_fault(&mut self, nth: u64) {
        self.fault_at = Some(self.ops + nth);
    }
    fn begin(&mut self, pin: PinId) -> Result<&mut PinState, SimError> {
        self.ops += 1;
        if self.fault_at == Some(self.ops) {
            self.fault_at = None;
            return Err(SimError::Injected);
        }
        self.pins
            .get_mut(pin as usize)
            .ok_or(SimError::NoSuchPin(pin))
    }
    fn level(&self, pin: PinId) -> Level {
        let state = self.pins[pin as usize];
        if state.direction == Direction::Output {
            return state.latch;
        }
        if pin == self.wiring.swdio() {
            if let Some(level) = self.device.drive() {
                return level;
            }
        }
        Level::High
    }
    fn settle(&mut self) {
        let swclk = self.level(self.wiring.swclk());
        if self.swclk_level == Level::Low && swclk == Level::High {
            self.rising_edges += 1;
            let swdio = self.pins[self.wiring.swdio() as usize];
            let host = (swdio.direction == Direction::Output).then_some(swdio.latch);
            self.device.clock(host);
        }
        self.swclk_level = swclk;
    }
}
impl<D> ErrorType for SimBus<D> {
    type Error = SimError;
}
impl<D> DelayNs for SimBus<D> {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns += ns as u64;
    }
}
impl<D: SimDevice> SwdLines for SimBus<D> {
    fn pin_count(&self) -> u8 {
        self.pins.len() as u8
    }
    fn set_direction(&mut self, pin: PinId, direction: Direction) -> Result<(), SimError> {
        self.begin(pin)?.direction = direction;
        if direction == Direction::Output && !self.driven.contains(&pin) {
            self.driven.push(pin);
        }
        self.settle();
        Ok(())
    }
    fn write_level(&mut self, pin: PinId, level: Level) -> Result<(), SimError> {
        let state = self.begin(pin)?;
        if state.direction != Direction::Output {
            return Err(SimError::NotOutput(pin));
        }
        state.latch = level;
        self.settle();
        Ok(())
    }
    fn read_level(&mut self, pin: PinId) -> Result<Level, SimError> {
        if self.begin(pin)?.direction != Direction::Input {
            return Err(SimError::NotInput(pin));
        }
        Ok(self.level(pin))
    }
}

/// Records what the host clocks out and never drives the line.
#[derive(Debug, Default)]
pub struct Recorder {
    bits: Vec<Option<Level>>,
}
impl Recorder {
    pub fn bits(&self) -> &[Option<Level>] {
        &self.bits
    }
}
impl SimDevice for Recorder {
    fn clock(&mut self, swdio: Option<Level>) {
        self.bits.push(swdio);
    }
    fn drive(&self) -> Option<Level> {
        None
    }
}

/// Plays back the bits the host clocked in, first in first out, once the
/// host releases SWDIO.
#[derive(Debug, Default)]
pub struct Loopback {
    fifo: VecDeque<Level>,
}
impl SimDevice for Loopback {
    fn clock(&mut self, swdio: Option<Level>) {
        match swdio {
            Some(level) => self.fifo.push_back(level),
            None => {
                self.fifo.pop_front();
            }
        }
    }
    fn drive(&self) -> Option<Level> {
        self.fifo.front().copied()
    }
}

// The protocol asks for at least 50, targets accept exactly that.
const LINE_RESET_MIN_CYCLES: u32 = 50;
const JTAG_TO_SWD: u16 = 0xE79E;
const SELECTION_ALERT: u128 = 0x19BC_0EA2_E3DD_AFE9_8685_2D95_6209_F392;
const SWD_ACTIVATION_CODE: u16 = 0x1A;
const READ_DPIDR_REQUEST: u8 = 0xA5;
const RESPONSE_BITS: u8 = 36;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetState {
    Dormant,
    /// Selection alert seen, collecting 4 idle bits and the activation code.
    Alerted { bits: u16, count: u8 },
    Jtag,
    /// Switched to SWD, waiting for a line reset.
    Switched,
    LineReset,
    Idle,
    Request { bits: u8, count: u8 },
    TurnToTarget,
    Respond { index: u8 },
    TurnToHost,
    /// Protocol error, only a line reset gets out.
    Lockout,
}
impl TargetState {
    fn is_swd(self) -> bool {
        !matches!(
            self,
            TargetState::Dormant | TargetState::Alerted { .. } | TargetState::Jtag
        )
    }
}

/// SW-DP that answers the DPIDR read and nothing else.
#[derive(Debug)]
pub struct SimTarget {
    dpidr: u32,
    state: TargetState,
    high_run: u32,
    history: u128,
}
impl SimTarget {
    /// SWD v1 port, comes up in JTAG mode.
    pub fn v1(dpidr: u32) -> Self {
        Self::with_state(dpidr, TargetState::Jtag)
    }
    /// SWD v2 port, comes up dormant and ignores the plain JTAG-to-SWD switch.
    pub fn dormant(dpidr: u32) -> Self {
        Self::with_state(dpidr, TargetState::Dormant)
    }
    fn with_state(dpidr: u32, state: TargetState) -> Self {
        Self {
            dpidr,
            state,
            high_run: 0,
            history: 0,
        }
    }
    /// Whether the port currently talks SWD.
    pub fn is_swd(&self) -> bool {
        self.state.is_swd()
    }
    fn response(&self) -> u64 {
        const ACK_OK: u64 = 0b001;
        let parity = (self.dpidr.count_ones() & 1) as u64;
        ACK_OK | (self.dpidr as u64) << 3 | parity << 35
    }
}
impl SimDevice for SimTarget {
    fn clock(&mut self, swdio: Option<Level>) {
        let bit = swdio.map(Level::is_high);
        if bit == Some(true) {
            self.high_run += 1;
        } else {
            self.high_run = 0;
        }
        if let Some(bit) = bit {
            self.history = self.history >> 1 | (bit as u128) << 127;
        }
        if self.state.is_swd() && self.high_run >= LINE_RESET_MIN_CYCLES {
            self.state = TargetState::LineReset;
            return;
        }
        // undriven SWDIO is pulled high
        let high = bit.unwrap_or(true);
        self.state = match self.state {
            TargetState::Dormant if self.history == SELECTION_ALERT => {
                TargetState::Alerted { bits: 0, count: 0 }
            }
            TargetState::Alerted { bits, count } => {
                let bits = bits | (high as u16) << count;
                match count + 1 {
                    12 if bits == SWD_ACTIVATION_CODE << 4 => TargetState::Switched,
                    12 => TargetState::Dormant,
                    count => TargetState::Alerted { bits, count },
                }
            }
            TargetState::Jtag if bit.is_some() && (self.history >> 112) as u16 == JTAG_TO_SWD => {
                TargetState::Switched
            }
            TargetState::LineReset if bit == Some(false) => TargetState::Idle,
            TargetState::Idle if bit == Some(true) => TargetState::Request { bits: 1, count: 1 },
            TargetState::Request { bits, count } => {
                let bits = bits | (high as u8) << count;
                match count + 1 {
                    8 if bits == READ_DPIDR_REQUEST => TargetState::TurnToTarget,
                    8 => TargetState::Lockout,
                    count => TargetState::Request { bits, count },
                }
            }
            TargetState::TurnToTarget => TargetState::Respond { index: 0 },
            TargetState::Respond { index } if index + 1 == RESPONSE_BITS => {
                TargetState::TurnToHost
            }
            TargetState::Respond { index } => TargetState::Respond { index: index + 1 },
            TargetState::TurnToHost => TargetState::Idle,
            state => state,
        };
    }
    fn drive(&self) -> Option<Level> {
        match self.state {
            TargetState::Respond { index } => Some((self.response() >> index & 1 == 1).into()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::{Loopback, Recorder, SimBus, SimDevice, SimError, SimTarget};
    use crate::{
        line::{Direction, Level, SwdLines},
        swd::PinAssignment,
    };

    fn wiring() -> PinAssignment {
        PinAssignment::new(0, 1).unwrap()
    }

    fn clock_bits(target: &mut SimTarget, value: u64, len: usize) {
        for i in 0..len {
            target.clock(Some((value >> i & 1 == 1).into()));
        }
    }

    #[test]
    fn bus_is_strict() {
        let mut bus = SimBus::new(4, wiring(), Recorder::default());
        assert_eq!(bus.write_level(2, Level::High), Err(SimError::NotOutput(2)));
        assert_eq!(bus.read_level(9), Err(SimError::NoSuchPin(9)));
        bus.set_direction(2, Direction::Output).unwrap();
        assert_eq!(bus.read_level(2), Err(SimError::NotInput(2)));
        assert_eq!(bus.driven_pins(), [2]);
    }

    #[test]
    fn floating_inputs_read_high() {
        let mut bus = SimBus::new(4, wiring(), Recorder::default());
        assert_eq!(bus.read_level(3), Ok(Level::High));
        assert_eq!(bus.read_level(1), Ok(Level::High));
    }

    #[test]
    fn rising_edges_only_on_wired_swclk() {
        let mut bus = SimBus::new(4, wiring(), Recorder::default());
        bus.set_direction(0, Direction::Output).unwrap();
        bus.set_direction(2, Direction::Output).unwrap();
        bus.write_level(2, Level::High).unwrap();
        assert_eq!(bus.rising_edges(), 0);
        bus.write_level(0, Level::High).unwrap();
        bus.write_level(0, Level::Low).unwrap();
        // releasing lets the pull-up raise SWCLK
        bus.set_direction(0, Direction::Input).unwrap();
        assert_eq!(bus.rising_edges(), 2);
        assert_eq!(bus.device().bits(), [None, None]);
    }

    #[test]
    fn injected_fault_fires_once() {
        let mut bus = SimBus::new(4, wiring(), Recorder::default());
        bus.inject_fault(2);
        assert!(bus.read_level(3).is_ok());
        assert_eq!(bus.read_level(3), Err(SimError::Injected));
        assert!(bus.read_level(3).is_ok());
    }

    #[test]
    fn loopback_replays_in_order() {
        let mut device = Loopback::default();
        device.clock(Some(Level::High));
        device.clock(Some(Level::Low));
        assert_eq!(device.drive(), Some(Level::High));
        device.clock(None);
        assert_eq!(device.drive(), Some(Level::Low));
        device.clock(None);
        assert_eq!(device.drive(), None);
    }

    #[test]
    fn target_answers_after_switch() {
        let mut target = SimTarget::v1(0x2BA0_1477);
        assert!(!target.is_swd());
        clock_bits(&mut target, u64::MAX, 64);
        clock_bits(&mut target, 0xE79E, 16);
        assert!(target.is_swd());
        clock_bits(&mut target, u64::MAX, 64);
        clock_bits(&mut target, 0, 4);
        clock_bits(&mut target, 0xA5, 8);
        target.clock(None);
        let mut response = 0u64;
        for i in 0..36 {
            response |= (target.drive() == Some(Level::High)) as u64 * (1 << i);
            target.clock(None);
        }
        assert_eq!(response & 0x7, 0b001);
        assert_eq!((response >> 3) as u32, 0x2BA0_1477);
        assert_eq!(target.drive(), None);
    }

    #[test]
    fn target_locks_out_on_unknown_request() {
        let mut target = SimTarget::v1(0x2BA0_1477);
        clock_bits(&mut target, 0xE79E, 16);
        clock_bits(&mut target, u64::MAX, 64);
        clock_bits(&mut target, 0, 4);
        // DP write of ABORT
        clock_bits(&mut target, 0x81, 8);
        target.clock(None);
        assert_eq!(target.drive(), None);
        // a read request is ignored until the next line reset
        clock_bits(&mut target, 0xA5, 8);
        target.clock(None);
        assert_eq!(target.drive(), None);
    }

    #[test]
    fn dormant_target_wakes_on_activation_code() {
        let mut target = SimTarget::dormant(0x0BC1_2477);
        clock_bits(&mut target, 0xE79E, 16);
        assert!(!target.is_swd());
        clock_bits(&mut target, 0xFF, 8);
        for word in [0x6209_F392, 0x8685_2D95, 0xE3DD_AFE9, 0x19BC_0EA2] {
            clock_bits(&mut target, word, 32);
        }
        clock_bits(&mut target, 0, 4);
        clock_bits(&mut target, 0x1A, 8);
        assert!(target.is_swd());
    }
}
