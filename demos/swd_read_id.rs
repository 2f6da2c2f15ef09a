//! Read the DPIDR over one known SWCLK/SWDIO pin pair.
//!
//! Run with:
//! ```bash
//! RUST_LOG=info cargo run --example swd_read_id -- 0 1
//! ```

use std::sync::{Arc, Mutex};

use clap::Parser;
use swd_finder::{
    FtdiSwdLines, PinMask, ProtocolOptions, ScanConfig, Scanner, Verbosity, list_all_device,
    mpsse::FtdiMpsse,
};

#[derive(Parser, Debug)]
struct Args {
    swclk: u8,
    swdio: u8,
    /// Wake the port from dormant state first (SWD v2)
    #[arg(long, default_value_t = false)]
    dormant: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let mask = 1u64
        .checked_shl(args.swclk.into())
        .zip(1u64.checked_shl(args.swdio.into()))
        .map(|(swclk, swdio)| swclk | swdio)
        .ok_or_else(|| anyhow::anyhow!("Pins must be below 64"))?;
    let protocol = if args.dormant {
        ProtocolOptions::V2
    } else {
        ProtocolOptions::V1
    };
    let config = ScanConfig::configure(mask, true, Verbosity::Verbose).with_protocol(protocol);

    let devices = list_all_device()?;
    anyhow::ensure!(!devices.is_empty(), "Not found Ftdi devices");
    let mpsse = FtdiMpsse::open(&devices[0].usb_device, devices[0].interface[0])?;
    let mtx = Arc::new(Mutex::new(mpsse));
    let lines = FtdiSwdLines::new(mtx, PinMask::new(mask))?;

    let result = Scanner::new(lines).test_pair(args.swclk, args.swdio, &config)?;
    let response = result.response;
    // g431cbu6: 0x2BA01477; according to rm0440-47.8.5
    println!("ack:{}", response.decoded_ack());
    println!("idcode:{:#010x?}", response.data());
    println!(
        "designer:{:#x} part:{:#x} version:{} parity ok:{}",
        response.manufacturer(),
        response.part_number(),
        response.version(),
        response.parity_ok()
    );
    println!("ARM debug port: {}", result.matched);
    Ok(())
}
