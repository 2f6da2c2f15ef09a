use crate::{ChipType, FtdiError, Interface};
use nusb::DeviceInfo;

/// Known properties associated to particular FTDI chip types.
#[derive(Debug, Clone, Copy)]
struct FtdiDevice {
    /// The (VID, PID) pair of this device.
    id: (u16, u16),

    /// Chip type assumed from the VID/PID pair alone.
    ///
    /// "FTDI compatible" adapters reuse FTDI pairs or bring their own, the real
    /// chip is only known once [`crate::FtdiMpsse::open`] reads `bcdDevice`.
    fallback_chip_type: ChipType,
}

/// Known FTDI device variants.
static FTDI_COMPAT_DEVICES: &[FtdiDevice] = &[
    //
    // --- FTDI VID/PID pairs ---
    //
    // FTDI Ltd. FT2232C/D/H Dual UART/FIFO IC
    FtdiDevice {
        id: (0x0403, 0x6010),
        fallback_chip_type: ChipType::FT2232H,
    },
    // FTDI Ltd. FT4232H Quad HS USB-UART/FIFO IC
    FtdiDevice {
        id: (0x0403, 0x6011),
        fallback_chip_type: ChipType::FT4232H,
    },
    // FTDI Ltd. FT232H Single HS USB-UART/FIFO IC
    FtdiDevice {
        id: (0x0403, 0x6014),
        fallback_chip_type: ChipType::FT232H,
    },
    //
    // --- Third-party VID/PID pairs ---
    //
    // Olimex Ltd. ARM-USB-OCD
    FtdiDevice {
        id: (0x15ba, 0x0003),
        fallback_chip_type: ChipType::FT2232D,
    },
    // Olimex Ltd. ARM-USB-TINY
    FtdiDevice {
        id: (0x15ba, 0x0004),
        fallback_chip_type: ChipType::FT2232D,
    },
    // Olimex Ltd. ARM-USB-TINY-H
    FtdiDevice {
        id: (0x15ba, 0x002a),
        fallback_chip_type: ChipType::FT2232H,
    },
    // Olimex Ltd. ARM-USB-OCD-H
    FtdiDevice {
        id: (0x15ba, 0x002b),
        fallback_chip_type: ChipType::FT2232H,
    },
];

pub struct FtdiDeviceInfo {
    pub usb_device: DeviceInfo,
    /// Interfaces with an MPSSE engine, usable for scanning.
    pub interface: &'static [Interface],
}

/// Every connected FTDI (compatible) device.
pub fn list_all_device() -> Result<Vec<FtdiDeviceInfo>, FtdiError> {
    fn filter_map(info: DeviceInfo) -> Option<FtdiDeviceInfo> {
        let device = FTDI_COMPAT_DEVICES
            .iter()
            .find(|device| (info.vendor_id(), info.product_id()) == device.id)?;
        log::info!(
            "Find {:?}:[{:#06x?},{:#06x?}]",
            device.fallback_chip_type,
            device.id.0,
            device.id.1
        );
        Some(FtdiDeviceInfo {
            usb_device: info,
            interface: device.fallback_chip_type.mpsse_list(),
        })
    }
    Ok(nusb::list_devices()?.filter_map(filter_map).collect())
}
