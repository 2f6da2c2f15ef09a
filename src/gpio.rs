use crate::{
    FtdiError, Pin,
    delay::Delay,
    line::{Direction, Level, PinId, SwdLines},
    mpsse::FtdiMpsse,
    swd::PinMask,
};
use eh1::delay::DelayNs;
use std::sync::{Arc, Mutex, MutexGuard};

/// FTDI GPIO banks as scan lines.
///
/// Scan pin 0 - 7 is ADBUS0 - 7, pin 8 and up is ACBUS0 and up. The pins of
/// the mask are reserved on construction and returned to low inputs on drop.
/// Every level change is one USB transfer.
pub struct FtdiSwdLines {
    /// Thread-safe handle to FTDI MPSSE controller
    mtx: Arc<Mutex<FtdiMpsse>>,
    /// Reserved pins
    pins: Vec<Pin>,
    pin_count: u8,
    delay: Delay,
}

impl Drop for FtdiSwdLines {
    fn drop(&mut self) {
        let Ok(mut lock) = self.mtx.lock() else {
            log::warn!("Mpsse handle poisoned, pins left as they are");
            return;
        };
        for &pin in &self.pins {
            if let Err(e) = lock.free_pin(pin) {
                log::warn!("Failed to free {pin:?}: {e}");
            }
        }
    }
}

impl FtdiSwdLines {
    pub fn new(mtx: Arc<Mutex<FtdiMpsse>>, mask: PinMask) -> Result<Self, FtdiError> {
        let pin_count = mtx.lock().map_err(|_| FtdiError::Poisoned)?.pin_count();
        let mut lines = FtdiSwdLines {
            mtx,
            pins: Vec::new(),
            pin_count,
            delay: Delay,
        };
        // on error, drop frees what was reserved so far
        for id in mask.pins() {
            let pin = Pin::from(id);
            lines.lock()?.alloc_pin(pin)?;
            lines.pins.push(pin);
        }
        Ok(lines)
    }

    fn lock(&self) -> Result<MutexGuard<'_, FtdiMpsse>, FtdiError> {
        self.mtx.lock().map_err(|_| FtdiError::Poisoned)
    }

    fn reserved(&self, id: PinId) -> Result<Pin, FtdiError> {
        let pin = Pin::from(id);
        if self.pins.contains(&pin) {
            Ok(pin)
        } else {
            Err(FtdiError::PinNotAllocated(id))
        }
    }
}

impl eh1::digital::Error for FtdiError {
    fn kind(&self) -> eh1::digital::ErrorKind {
        eh1::digital::ErrorKind::Other
    }
}

impl eh1::digital::ErrorType for FtdiSwdLines {
    type Error = FtdiError;
}

impl DelayNs for FtdiSwdLines {
    fn delay_ns(&mut self, ns: u32) {
        self.delay.delay_ns(ns);
    }
    fn delay_us(&mut self, us: u32) {
        self.delay.delay_us(us);
    }
}

impl SwdLines for FtdiSwdLines {
    fn pin_count(&self) -> u8 {
        self.pin_count
    }

    fn set_direction(&mut self, pin: PinId, direction: Direction) -> Result<(), FtdiError> {
        let pin = self.reserved(pin)?;
        self.lock()?
            .set_output(pin, direction == Direction::Output)
    }

    fn write_level(&mut self, pin: PinId, level: Level) -> Result<(), FtdiError> {
        let pin = self.reserved(pin)?;
        self.lock()?.set_value(pin, level.is_high())
    }

    fn read_level(&mut self, pin: PinId) -> Result<Level, FtdiError> {
        let pin = self.reserved(pin)?;
        self.lock()?.read_value(pin).map(Level::from)
    }
}
