//! Search the SWD pins among a set of candidate pins.
//!
//! Every ordered pair of the mask is tried as SWCLK/SWDIO, a pair matches
//! when the DPIDR read is acknowledged and reports ARM as designer.
//!
//! Run with:
//! ```bash
//! RUST_LOG=info cargo run --example swd_detect -- --mask 0xff --break-on-hit
//! # without hardware, target wired to pins 4 (SWCLK) and 2 (SWDIO)
//! RUST_LOG=info cargo run --example swd_detect -- --simulate 4 2
//! ```

use std::{
    sync::{Arc, Mutex},
    time::Instant,
};

use clap::{Parser, ValueEnum};
use swd_finder::{
    FtdiSwdLines, PinAssignment, PinMask, ProtocolOptions, ScanConfig, Scanner, SwdLines,
    list_all_device,
    mpsse::FtdiMpsse,
    sim::{SimBus, SimTarget},
};

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Protocol {
    /// SWD v1 targets, 4 idle bits after the switch
    V1,
    /// SWD v2 targets, 8 idle bits and dormant wake
    V2,
}
impl From<Protocol> for ProtocolOptions {
    fn from(value: Protocol) -> Self {
        match value {
            Protocol::V1 => ProtocolOptions::V1,
            Protocol::V2 => ProtocolOptions::V2,
        }
    }
}

/// Brute force SWD pin finder
#[derive(Parser, Debug)]
struct Args {
    /// Candidate pins, bit n is pin n (0x, 0b or decimal)
    #[arg(short, long, value_parser = parse_mask, default_value = "0b11100")]
    mask: u64,

    /// Stop at the first pair that answers
    #[arg(short, long, default_value_t = false)]
    break_on_hit: bool,

    /// 0: hits only, 1: every pair, 2: every bit
    #[arg(short, long, default_value_t = 0)]
    verbosity: u8,

    #[arg(short, long, value_enum, default_value_t = Protocol::V1)]
    protocol: Protocol,

    /// Scan a simulated target wired to these pins instead of an FTDI device
    #[arg(long, num_args = 2, value_names = ["SWCLK", "SWDIO"])]
    simulate: Option<Vec<u8>>,
}

fn parse_mask(s: &str) -> Result<u64, String> {
    let parsed = if let Some(hex) = s.strip_prefix("0x") {
        u64::from_str_radix(hex, 16)
    } else if let Some(bin) = s.strip_prefix("0b") {
        u64::from_str_radix(bin, 2)
    } else {
        s.parse()
    };
    parsed.map_err(|e| format!("invalid pin mask {s}: {e}"))
}

fn scan<L>(lines: L, config: &ScanConfig) -> anyhow::Result<()>
where
    L: SwdLines,
    L::Error: Send + Sync + 'static,
{
    let now = Instant::now();
    let mut scanner = Scanner::new(lines);
    // Enter stops the scan before the next pair
    scanner
        .cancel_token()
        .cancel_on_input(std::io::BufReader::new(std::io::stdin()));
    let summary = scanner.scan(config)?.finish()?;
    for result in summary.results.iter().filter(|result| result.matched) {
        println!(
            "!!!!!! Pins:swclk[{}],swdio[{}]",
            result.pins.swclk(),
            result.pins.swdio()
        );
        println!("!!!!!! Found DPIDR:{:#010x}", result.response.data());
    }
    if !summary.matched {
        println!("No SWD pins among {}", config.mask());
    }
    if summary.cancelled {
        println!("Cancelled after {} pairs", summary.results.len());
    }
    println!("Finish Detect Using {:?}", now.elapsed());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = ScanConfig::configure(args.mask, args.break_on_hit, args.verbosity.into())
        .with_protocol(args.protocol.into());

    if let Some(wiring) = args.simulate {
        let wiring = PinAssignment::new(wiring[0], wiring[1])?;
        let pin_count = config.max_pin().max(wiring.swclk().max(wiring.swdio()) + 1);
        let target = match args.protocol {
            Protocol::V1 => SimTarget::v1(0x2BA0_1477),
            Protocol::V2 => SimTarget::dormant(0x0BC1_2477),
        };
        return scan(SimBus::new(pin_count, wiring, target), &config);
    }

    let devices = list_all_device()?;
    anyhow::ensure!(!devices.is_empty(), "Not found Ftdi devices");
    let mpsse = FtdiMpsse::open(&devices[0].usb_device, devices[0].interface[0])?;
    let mtx = Arc::new(Mutex::new(mpsse));
    let lines = FtdiSwdLines::new(mtx, PinMask::new(args.mask))?;
    scan(lines, &config)
}
