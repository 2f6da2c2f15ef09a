use crate::line::{Level, SwdLines};

use super::{IdResponse, PinAssignment, ScanError, ScanResult, SwdLink, Verbosity};

// 0111_1001_1110_0111
// 0x79E7, transmitted MSB first.
// 0xE79E, transmitted least-significant-bit (LSB) first.
const JTAG_TO_SWD: u16 = 0xE79E;
// ADIv6 B5.3.4, 128 bits transmitted LSB first, word 0 first.
const SELECTION_ALERT: [u32; 4] = [0x6209_F392, 0x8685_2D95, 0xE3DD_AFE9, 0x19BC_0EA2];
// 8+ cycles with SWDIO high before the selection alert.
const DORMANT_EXIT_HIGH_CYCLES: usize = 8;
// 4 cycles with SWDIO low between the alert and the activation code.
const DORMANT_EXIT_LOW_CYCLES: usize = 4;
// 0b0101_1000 MSB first, 0x1A LSB first.
const SWD_ACTIVATION_CODE: u8 = 0x1A;
// Trailing low cycles after the wake sequence.
const DORMANT_EXIT_FLUSH_CYCLES: usize = 8;
// Timing Sequence: [Start(1), APnDP(0), RnW(1), A[2:3](00), Parity(1), Stop(0), Park(1)]
// LSB Format: 0b1010_0101, a DP read of DPIDR.
const READ_DPIDR_REQUEST: u8 = 0xA5;
// Idle cycles closing the transaction.
const PARK_CYCLES: usize = 8;

/// Switch sequence variant.
///
/// Firmware revisions disagree on the idle cycles after the switch and only
/// newer ones wake dormant targets, so both are selectable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolOptions {
    /// Low cycles after the post-switch line reset.
    pub idle_bits: usize,
    /// Send the dormant to SWD wake sequence after the switch.
    pub dormant_wake: bool,
}
impl ProtocolOptions {
    /// SWD v1 targets: 4 idle bits, no dormant wake.
    pub const V1: Self = Self {
        idle_bits: 4,
        dormant_wake: false,
    };
    /// SWD v2 targets (RP2040 and later): 8 idle bits, dormant wake.
    pub const V2: Self = Self {
        idle_bits: 8,
        dormant_wake: true,
    };
}
impl Default for ProtocolOptions {
    fn default() -> Self {
        Self::V1
    }
}

/// Runs one discovery attempt on one pin pair.
///
/// Protocol Flow:
/// 1. Line reset
/// 2. JTAG to SWD switch, line reset, idle cycles
/// 3. Optional dormant wake
/// 4. DPIDR read: request, turnaround, 36 bits in, turnaround, park
/// 5. Match on OK ack and the ARM designer code
pub struct Sequencer<'a, L: SwdLines> {
    link: SwdLink<'a, L>,
    options: ProtocolOptions,
    verbosity: Verbosity,
}
impl<'a, L: SwdLines> Sequencer<'a, L> {
    pub fn new(
        lines: &'a mut L,
        pins: PinAssignment,
        options: ProtocolOptions,
        verbosity: Verbosity,
    ) -> Self {
        Self {
            link: SwdLink::new(lines, pins, verbosity),
            options,
            verbosity,
        }
    }
    pub fn switch_jtag_to_swd(&mut self) -> Result<(), L::Error> {
        self.link.reset_line()?;
        self.link.write_bits(JTAG_TO_SWD as u64, 16)?;
        self.link.reset_line()?;
        self.link.write_bits(0, self.options.idle_bits)
    }
    pub fn wake_from_dormant(&mut self) -> Result<(), L::Error> {
        self.link.drive_line(Level::High)?;
        for _ in 0..DORMANT_EXIT_HIGH_CYCLES {
            self.link.pulse_clock()?;
        }
        for word in SELECTION_ALERT {
            self.link.write_bits(word as u64, 32)?;
        }
        self.link.write_bits(0, DORMANT_EXIT_LOW_CYCLES)?;
        self.link.write_bits(SWD_ACTIVATION_CODE as u64, 8)?;
        self.link.reset_line()?;
        self.link.write_bits(0, DORMANT_EXIT_FLUSH_CYCLES)
    }
    pub fn read_id_code(&mut self) -> Result<IdResponse, L::Error> {
        self.link.write_bits(READ_DPIDR_REQUEST as u64, 8)?;
        self.link.turnaround()?;
        let raw = self.link.read_bits(IdResponse::BITS)?;
        self.link.turnaround()?;
        self.link.restore_write_mode()?;
        self.link.write_bits(0, PARK_CYCLES)?;
        Ok(IdResponse::from_bits(raw))
    }
    fn attempt(&mut self) -> Result<IdResponse, L::Error> {
        self.link.setup_pins()?;
        self.switch_jtag_to_swd()?;
        if self.options.dormant_wake {
            self.wake_from_dormant()?;
        }
        self.read_id_code()
    }
    /// Run the whole attempt. Both pins are inputs again afterwards, also on error.
    pub fn run(mut self) -> Result<ScanResult, ScanError<L::Error>> {
        let pins = self.link.pins();
        let attempt = self.attempt();
        let released = self.link.release_pins();
        let response = match (attempt, released) {
            (Ok(response), Ok(())) => response,
            (Err(e), released) => {
                if let Err(release) = released {
                    log::warn!("Failed to release pins {pins:?}: {release:?}");
                }
                return Err(ScanError::Line(e));
            }
            (Ok(_), Err(e)) => return Err(ScanError::Line(e)),
        };
        let result = ScanResult {
            pins,
            response,
            matched: response.is_arm_debug_port(),
        };
        log::log!(row_level(result.matched, self.verbosity), "{result}");
        Ok(result)
    }
}

/// Hits are always reported, misses only from [`Verbosity::Normal`] up.
pub(crate) fn row_level(matched: bool, verbosity: Verbosity) -> log::Level {
    if matched || verbosity >= Verbosity::Normal {
        log::Level::Info
    } else {
        log::Level::Debug
    }
}

#[cfg(test)]
mod test {
    use super::{
        JTAG_TO_SWD, ProtocolOptions, SELECTION_ALERT, SWD_ACTIVATION_CODE, Sequencer, row_level,
    };
    use crate::{
        line::Level,
        sim::{Recorder, SimBus, SimTarget},
        swd::{LINE_RESET_CYCLES, PinAssignment, ScanError, Verbosity},
    };

    const DPIDR: u32 = 0x2BA0_1477;

    fn pins() -> PinAssignment {
        PinAssignment::new(2, 3).unwrap()
    }

    fn bits(levels: &[Option<Level>]) -> u64 {
        levels
            .iter()
            .enumerate()
            .map(|(i, level)| (*level == Some(Level::High)) as u64 * (1 << i))
            .sum()
    }

    #[test]
    fn switch_sequence_on_the_wire() {
        let mut bus = SimBus::new(8, pins(), Recorder::default());
        let mut sequencer = Sequencer::new(&mut bus, pins(), ProtocolOptions::V1, Verbosity::Quiet);
        sequencer.link.setup_pins().unwrap();
        sequencer.switch_jtag_to_swd().unwrap();
        let sent = bus.device().bits();
        let (reset, rest) = sent.split_at(LINE_RESET_CYCLES);
        assert!(reset.iter().all(|bit| *bit == Some(Level::High)));
        let (switch, rest) = rest.split_at(16);
        assert_eq!(bits(switch), JTAG_TO_SWD as u64);
        let (reset, idle) = rest.split_at(LINE_RESET_CYCLES);
        assert!(reset.iter().all(|bit| *bit == Some(Level::High)));
        assert_eq!(idle, [Some(Level::Low); 4]);
    }

    #[test]
    fn dormant_wake_on_the_wire() {
        let mut bus = SimBus::new(8, pins(), Recorder::default());
        let mut sequencer = Sequencer::new(&mut bus, pins(), ProtocolOptions::V2, Verbosity::Quiet);
        sequencer.link.setup_pins().unwrap();
        sequencer.wake_from_dormant().unwrap();
        let sent = bus.device().bits();
        assert_eq!(sent.len(), 8 + 128 + 4 + 8 + LINE_RESET_CYCLES + 8);
        assert!(sent[..8].iter().all(|bit| *bit == Some(Level::High)));
        for (i, word) in SELECTION_ALERT.into_iter().enumerate() {
            let start = 8 + 32 * i;
            assert_eq!(bits(&sent[start..start + 32]), word as u64);
        }
        assert_eq!(bits(&sent[136..140]), 0);
        assert_eq!(bits(&sent[140..148]), SWD_ACTIVATION_CODE as u64);
        assert!(sent[148..148 + LINE_RESET_CYCLES]
            .iter()
            .all(|bit| *bit == Some(Level::High)));
        assert_eq!(bits(&sent[148 + LINE_RESET_CYCLES..]), 0);
    }

    #[test]
    fn id_code_transaction_on_the_wire() {
        let mut bus = SimBus::new(8, pins(), Recorder::default());
        let mut sequencer = Sequencer::new(&mut bus, pins(), ProtocolOptions::V1, Verbosity::Quiet);
        sequencer.link.setup_pins().unwrap();
        // floating line reads as all ones
        let response = sequencer.read_id_code().unwrap();
        assert_eq!(response.into_bits(), (1 << 36) - 1);
        assert!(!response.is_arm_debug_port());
        let sent = bus.device().bits();
        // request, turnaround, 36 data cycles, turnaround, park
        assert_eq!(sent.len(), 8 + 1 + 36 + 1 + 8);
        assert_eq!(bits(&sent[..8]), 0xA5);
        assert!(sent[8..46].iter().all(Option::is_none));
        assert_eq!(&sent[46..], [Some(Level::Low); 8]);
    }

    #[test]
    fn finds_v1_target() {
        let mut bus = SimBus::new(8, pins(), SimTarget::v1(DPIDR));
        let result = Sequencer::new(&mut bus, pins(), ProtocolOptions::V1, Verbosity::Quiet)
            .run()
            .unwrap();
        assert!(result.matched);
        assert_eq!(result.pins, pins());
        assert_eq!(result.response.data(), DPIDR);
        assert!(result.response.parity_ok());
        assert!(bus.all_inputs());
    }

    #[test]
    fn v2_protocol_still_finds_v1_target() {
        let mut bus = SimBus::new(8, pins(), SimTarget::v1(DPIDR));
        let result = Sequencer::new(&mut bus, pins(), ProtocolOptions::V2, Verbosity::Quiet)
            .run()
            .unwrap();
        assert!(result.matched);
    }

    #[test]
    fn dormant_target_needs_wake() {
        let mut bus = SimBus::new(8, pins(), SimTarget::dormant(DPIDR));
        let result = Sequencer::new(&mut bus, pins(), ProtocolOptions::V1, Verbosity::Quiet)
            .run()
            .unwrap();
        assert!(!result.matched);

        let mut bus = SimBus::new(8, pins(), SimTarget::dormant(DPIDR));
        let result = Sequencer::new(&mut bus, pins(), ProtocolOptions::V2, Verbosity::Quiet)
            .run()
            .unwrap();
        assert!(result.matched);
        assert_eq!(result.response.data(), DPIDR);
    }

    #[test]
    fn swapped_pins_do_not_match() {
        let swapped = PinAssignment::new(3, 2).unwrap();
        let mut bus = SimBus::new(8, pins(), SimTarget::v1(DPIDR));
        let result = Sequencer::new(&mut bus, swapped, ProtocolOptions::V1, Verbosity::Quiet)
            .run()
            .unwrap();
        assert!(!result.matched);
        assert!(bus.all_inputs());
    }

    #[test]
    fn non_arm_designer_does_not_match() {
        let mut bus = SimBus::new(8, pins(), SimTarget::v1(0x0000_1001));
        let result = Sequencer::new(&mut bus, pins(), ProtocolOptions::V1, Verbosity::Quiet)
            .run()
            .unwrap();
        assert_eq!(result.response.ack(), 1);
        assert!(!result.matched);
    }

    #[test]
    fn line_fault_releases_pins() {
        let mut bus = SimBus::new(8, pins(), SimTarget::v1(DPIDR));
        bus.inject_fault(100);
        let result = Sequencer::new(&mut bus, pins(), ProtocolOptions::V1, Verbosity::Quiet).run();
        assert!(matches!(result, Err(ScanError::Line(_))));
        assert!(bus.all_inputs());
    }

    #[test]
    fn row_level_by_match_and_verbosity() {
        for verbosity in [Verbosity::Quiet, Verbosity::Normal, Verbosity::Verbose] {
            assert_eq!(row_level(true, verbosity), log::Level::Info);
        }
        assert_eq!(row_level(false, Verbosity::Quiet), log::Level::Debug);
        assert_eq!(row_level(false, Verbosity::Normal), log::Level::Info);
        assert_eq!(row_level(false, Verbosity::Verbose), log::Level::Info);
    }
}
