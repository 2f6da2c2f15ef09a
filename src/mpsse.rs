use crate::{ChipType, FtdiError, Interface, Pin, ftdaye::FtdiContext, mpsse_cmd::MpsseCmdBuilder};

/// Manages a bank of 8 GPIO pins
/// Tracks direction, current value, and which pins are taken
#[derive(Debug, Default)]
pub(crate) struct GpioByte {
    /// Direction mask (0 = input, 1 = output) for each pin in the bank
    pub(crate) direction: u8,
    /// Current logic level (0 = low, 1 = high) for each output pin
    pub(crate) value: u8,
    /// Allocation status for each pin (prevents conflicting usage)
    allocated: u8,
}

/// FTDI MPSSE (Multi-Protocol Synchronous Serial Engine) interface used as
/// two banks of GPIO.
pub struct FtdiMpsse {
    /// FTDI device context handle
    ft: FtdiContext,
    /// Type of FTDI chip (e.g., FT232H, FT2232H)
    pub(crate) chip_type: ChipType,
    /// Lower 8 GPIO pins state tracker
    pub(crate) lower: GpioByte,
    /// Upper GPIO pins state tracker (if supported by chip)
    pub(crate) upper: GpioByte,
}

impl FtdiMpsse {
    /// Opens an FTDI interface in MPSSE mode, every pin an input.
    ///
    /// # Arguments
    /// * `usb_device` - USB device information from enumeration
    /// * `interface` - FTDI interface to use (A, B, etc.)
    pub fn open(usb_device: &nusb::DeviceInfo, interface: Interface) -> Result<Self, FtdiError> {
        let chip_type = match (
            usb_device.device_version(),
            usb_device.serial_number().unwrap_or(""),
        ) {
            (0x400, _) | (0x200, "") => return Err(FtdiError::UnsupportedChip(ChipType::Bm)),
            (0x200, _) => return Err(FtdiError::UnsupportedChip(ChipType::Am)),
            (0x500, _) => ChipType::FT2232D,
            (0x600, _) => return Err(FtdiError::UnsupportedChip(ChipType::R)),
            (0x700, _) => ChipType::FT2232H,
            (0x800, _) => ChipType::FT4232H,
            (0x900, _) => ChipType::FT232H,
            (0x1000, _) => return Err(FtdiError::UnsupportedChip(ChipType::FT230X)),
            (version, _) => {
                return Err(FtdiError::OpenFailed(format!(
                    "Unknown ChipType version:0x{version:x}"
                )));
            }
        };
        if !chip_type.interface_list().contains(&interface) {
            return Err(FtdiError::OpenFailed(format!(
                "{chip_type:?} do not support Interface::{interface:?}"
            )));
        }
        if !chip_type.mpsse_list().contains(&interface) {
            return Err(FtdiError::NoMpsse {
                chip: chip_type,
                interface,
            });
        }

        let handle = usb_device
            .open()?
            .detach_and_claim_interface(interface.interface_number())?;
        let context =
            FtdiContext::new(handle, interface, chip_type.max_packet_size()).into_mpsse()?;
        let mut cmd = MpsseCmdBuilder::new();
        cmd.set_gpio_lower(0, 0).enable_loopback(false);
        if chip_type.upper_pins() > 0 {
            cmd.set_gpio_upper(0, 0);
        }
        if chip_type != ChipType::FT2232D {
            cmd.enable_adaptive_clocking(false);
        }
        let mpsse = Self {
            ft: context,
            chip_type,
            lower: Default::default(),
            upper: Default::default(),
        };
        mpsse.exec(cmd)?;
        log::info!("Open {chip_type:?} Interface::{interface:?}");
        Ok(mpsse)
    }

    pub fn chip_type(&self) -> ChipType {
        self.chip_type
    }

    /// Lower bank plus whatever upper bank the chip has.
    pub fn pin_count(&self) -> u8 {
        8 + self.chip_type.upper_pins() as u8
    }

    /// Write mpsse command and read response
    pub(crate) fn exec(&self, cmd: MpsseCmdBuilder) -> Result<Vec<u8>, FtdiError> {
        let (cmd, mut response) = cmd.destruct();
        self.ft.write_read(&cmd, &mut response)?;
        Ok(response)
    }

    fn bank(&mut self, pin: Pin) -> Result<(&mut GpioByte, u8), FtdiError> {
        let chip = self.chip_type;
        match pin {
            Pin::Lower(idx) if idx < 8 => Ok((&mut self.lower, pin.mask())),
            Pin::Upper(idx) if idx < chip.upper_pins() => Ok((&mut self.upper, pin.mask())),
            _ => Err(FtdiError::PinNotValid { chip, pin }),
        }
    }

    /// Send the current state of the bank `pin` belongs to.
    fn update(&self, pin: Pin) -> Result<(), FtdiError> {
        let mut cmd = MpsseCmdBuilder::new();
        match pin {
            Pin::Lower(_) => cmd.set_gpio_lower(self.lower.value, self.lower.direction),
            Pin::Upper(_) => cmd.set_gpio_upper(self.upper.value, self.upper.direction),
        };
        self.exec(cmd)?;
        Ok(())
    }

    /// Reserve a pin, it stays an input until driven.
    pub(crate) fn alloc_pin(&mut self, pin: Pin) -> Result<(), FtdiError> {
        log::trace!("alloc pin {pin:?}");
        let (byte, mask) = self.bank(pin)?;
        if byte.allocated & mask != 0 {
            return Err(FtdiError::PinInUse(pin));
        }
        byte.allocated |= mask;
        Ok(())
    }

    /// Release a pin and return it to a low input.
    pub(crate) fn free_pin(&mut self, pin: Pin) -> Result<(), FtdiError> {
        log::trace!("free pin {pin:?}");
        let (byte, mask) = self.bank(pin)?;
        byte.allocated &= !mask;
        byte.value &= !mask;
        byte.direction &= !mask;
        self.update(pin)
    }

    pub(crate) fn set_output(&mut self, pin: Pin, output: bool) -> Result<(), FtdiError> {
        let (byte, mask) = self.bank(pin)?;
        if output {
            byte.direction |= mask;
        } else {
            byte.direction &= !mask;
        }
        self.update(pin)
    }

    pub(crate) fn set_value(&mut self, pin: Pin, high: bool) -> Result<(), FtdiError> {
        let (byte, mask) = self.bank(pin)?;
        if high {
            byte.value |= mask;
        } else {
            byte.value &= !mask;
        }
        self.update(pin)
    }

    pub(crate) fn read_value(&mut self, pin: Pin) -> Result<bool, FtdiError> {
        let (_, mask) = self.bank(pin)?;
        let mut cmd = MpsseCmdBuilder::new();
        match pin {
            Pin::Lower(_) => cmd.gpio_lower(),
            Pin::Upper(_) => cmd.gpio_upper(),
        };
        let response = self.exec(cmd)?;
        Ok(response[0] & mask != 0)
    }
}
