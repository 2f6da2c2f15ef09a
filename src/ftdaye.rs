//! USB side of an FTDI interface: vendor requests and bulk transfers.

use crate::{FtdiError, Interface};
use futures_lite::future::{block_on, zip};
use nusb::transfer::{Control, ControlType, Recipient, RequestBuffer};
use std::time::Duration;

const SIO_RESET_REQUEST: u8 = 0x00;
const SIO_RESET_SIO: u16 = 0;
const SIO_RESET_PURGE_RX: u16 = 1;
const SIO_RESET_PURGE_TX: u16 = 2;
const SIO_SET_LATENCY_TIMER_REQUEST: u8 = 0x09;
const SIO_SET_BITMODE_REQUEST: u8 = 0x0B;
// Two modem status bytes lead every bulk in packet.
const STATUS_LEN: usize = 2;
// First status byte after an opcode the MPSSE does not know.
const BAD_COMMAND: u8 = 0xFA;

#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum BitMode {
    Mpsse = 2,
}

pub(crate) struct FtdiContext {
    /// USB device handle
    handle: nusb::Interface,
    interface: Interface,
    max_packet_size: usize,
}

impl FtdiContext {
    pub(crate) fn new(handle: nusb::Interface, interface: Interface, max_packet_size: usize) -> Self {
        Self {
            handle,
            interface,
            max_packet_size,
        }
    }
    /// Reset the interface and enter MPSSE mode with every pin an input.
    pub(crate) fn into_mpsse(self) -> Result<Self, FtdiError> {
        self.sio_write(SIO_RESET_REQUEST, SIO_RESET_SIO)?;
        self.sio_write(SIO_RESET_REQUEST, SIO_RESET_PURGE_TX)?;
        self.sio_write(SIO_RESET_REQUEST, SIO_RESET_PURGE_RX)?;
        self.sio_write(SIO_SET_LATENCY_TIMER_REQUEST, 16)?;
        self.sio_write(
            SIO_SET_BITMODE_REQUEST,
            u16::from_le_bytes([0, BitMode::Mpsse as u8]),
        )?;
        Ok(self)
    }
    fn sio_write(&self, request: u8, value: u16) -> Result<(), FtdiError> {
        self.handle
            .control_out_blocking(
                Control {
                    control_type: ControlType::Vendor,
                    recipient: Recipient::Device,
                    request,
                    value,
                    index: self.interface.index(),
                },
                &[],
                Duration::from_secs(1),
            )
            .map_err(std::io::Error::from)?;
        Ok(())
    }
    /// Write `write` and fill `read` from the responses, both at once.
    pub(crate) fn write_read(&self, write: &[u8], read: &mut [u8]) -> Result<(), FtdiError> {
        let write = async {
            for batch in write.chunks(self.max_packet_size) {
                self.handle
                    .bulk_out(self.interface.write_ep(), batch.to_vec())
                    .await
                    .into_result()
                    .map_err(std::io::Error::from)?;
            }
            Ok::<(), FtdiError>(())
        };
        let read = async {
            let mut filled = 0;
            while filled < read.len() {
                let packet = self
                    .handle
                    .bulk_in(
                        self.interface.read_ep(),
                        RequestBuffer::new(self.max_packet_size),
                    )
                    .await
                    .into_result()
                    .map_err(std::io::Error::from)?;
                if packet.len() <= STATUS_LEN {
                    continue;
                }
                let (status, data) = packet.split_at(STATUS_LEN);
                if status[0] == BAD_COMMAND {
                    return Err(FtdiError::BadMpsseCommand(status[1]));
                }
                let len = data.len().min(read.len() - filled);
                read[filled..filled + len].copy_from_slice(&data[..len]);
                filled += len;
            }
            Ok::<(), FtdiError>(())
        };
        let (written, read) = block_on(zip(write, read));
        written.and(read)
    }
}
