//! MPSSE command bytes for the GPIO banks.
//!
//! Only the pin commands are needed to bit-bang SWD, the data shifting
//! engine stays idle.

/// MPSSE opcodes, AN108 chapter 3.
#[repr(u8)]
#[derive(Debug, Copy, Clone)]
enum MpsseCmd {
    /// Used by [`MpsseCmdBuilder::set_gpio_lower`].
    SetDataBitsLowbyte = 0x80,
    /// Used by [`MpsseCmdBuilder::gpio_lower`].
    GetDataBitsLowbyte = 0x81,
    /// Used by [`MpsseCmdBuilder::set_gpio_upper`].
    SetDataBitsHighbyte = 0x82,
    /// Used by [`MpsseCmdBuilder::gpio_upper`].
    GetDataBitsHighbyte = 0x83,
    /// Used by [`MpsseCmdBuilder::enable_loopback`].
    EnableLoopback = 0x84,
    /// Used by [`MpsseCmdBuilder::enable_loopback`].
    DisableLoopback = 0x85,
    /// Used by [`MpsseCmdBuilder::send_immediate`].
    SendImmediate = 0x87,
    /// Used by [`MpsseCmdBuilder::enable_adaptive_clocking`].
    EnableAdaptiveClocking = 0x96,
    /// Used by [`MpsseCmdBuilder::enable_adaptive_clocking`].
    DisableAdaptiveClocking = 0x97,
}

/// FTDI Multi-Protocol Synchronous Serial Engine (MPSSE) command builder.
///
/// Commands are pushed bytewise and written to the device in one USB
/// transfer, see [FTDI MPSSE Basics].
///
/// [FTDI MPSSE Basics]: https://www.ftdichip.com/Support/Documents/AppNotes/AN_135_MPSSE_Basics.pdf
#[derive(Default)]
pub(crate) struct MpsseCmdBuilder {
    cmd: Vec<u8>,
    read_len: usize,
}
impl MpsseCmdBuilder {
    pub(crate) fn new() -> MpsseCmdBuilder {
        Default::default()
    }

    /// Command bytes and a buffer sized for the response.
    ///
    /// Flushes with [`MpsseCmdBuilder::send_immediate`] when anything is read back.
    pub(crate) fn destruct(mut self) -> (Vec<u8>, Vec<u8>) {
        if self.read_len > 0 {
            self.send_immediate();
        }
        (self.cmd, vec![0; self.read_len])
    }

    /// MPSSE loopback state.
    pub(crate) fn enable_loopback(&mut self, state: bool) -> &mut Self {
        if state {
            self.cmd.push(MpsseCmd::EnableLoopback as u8);
        } else {
            self.cmd.push(MpsseCmd::DisableLoopback as u8);
        }
        self
    }

    /// Adaptive clocking, FTx232H only.
    ///
    /// While enabled GPIOL3 is the RTCK input and can not be used as GPIO.
    pub(crate) fn enable_adaptive_clocking(&mut self, state: bool) -> &mut Self {
        if state {
            self.cmd.push(MpsseCmd::EnableAdaptiveClocking as u8);
        } else {
            self.cmd.push(MpsseCmd::DisableAdaptiveClocking as u8);
        }
        self
    }

    /// Set the pin direction and state of the lower byte (0-7) GPIO pins on the
    /// MPSSE interface.
    ///
    /// * On the FT232H this will control the AD0-AD7 pins.
    ///
    /// # Arguments
    ///
    /// * `state` - GPIO state mask, `0` is low (or input pin), `1` is high.
    /// * `direction` - GPIO direction mask, `0` is input, `1` is output.
    pub(crate) fn set_gpio_lower(&mut self, state: u8, direction: u8) -> &mut Self {
        self.cmd
            .extend_from_slice(&[MpsseCmd::SetDataBitsLowbyte as u8, state, direction]);
        self
    }

    /// Set the pin direction and state of the upper byte (8-15) GPIO pins on
    /// the MPSSE interface.
    ///
    /// The FT4232H has no upper byte, the FT2232D only four of its pins.
    pub(crate) fn set_gpio_upper(&mut self, state: u8, direction: u8) -> &mut Self {
        self.cmd
            .extend_from_slice(&[MpsseCmd::SetDataBitsHighbyte as u8, state, direction]);
        self
    }

    /// Read the lower byte (0-7) GPIO pins, one response byte.
    pub(crate) fn gpio_lower(&mut self) -> &mut Self {
        self.read_len += 1;
        self.cmd.push(MpsseCmd::GetDataBitsLowbyte as u8);
        self
    }

    /// Read the upper byte (8-15) GPIO pins, one response byte.
    pub(crate) fn gpio_upper(&mut self) -> &mut Self {
        self.read_len += 1;
        self.cmd.push(MpsseCmd::GetDataBitsHighbyte as u8);
        self
    }

    /// Send the preceding commands immediately.
    fn send_immediate(&mut self) -> &mut Self {
        self.cmd.push(MpsseCmd::SendImmediate as u8);
        self
    }
}

#[cfg(test)]
mod test {
    use super::MpsseCmdBuilder;

    #[test]
    fn gpio_write_bytes() {
        // AN108-3.6
        let mut cmd = MpsseCmdBuilder::new();
        cmd.set_gpio_lower(0b0000_0100, 0b0000_1100)
            .set_gpio_upper(0x01, 0x03);
        let (cmd, response) = cmd.destruct();
        assert_eq!(cmd, [0x80, 0x04, 0x0C, 0x82, 0x01, 0x03]);
        assert!(response.is_empty());
    }

    #[test]
    fn gpio_read_flushes() {
        let mut cmd = MpsseCmdBuilder::new();
        cmd.gpio_lower().gpio_upper();
        let (cmd, response) = cmd.destruct();
        assert_eq!(cmd, [0x81, 0x83, 0x87]);
        assert_eq!(response.len(), 2);
    }

    #[test]
    fn open_sequence_bytes() {
        let mut cmd = MpsseCmdBuilder::new();
        cmd.enable_loopback(false).enable_adaptive_clocking(false);
        assert_eq!(cmd.destruct().0, [0x85, 0x97]);
    }
}
