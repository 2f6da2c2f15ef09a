use crate::line::{MAX_PINS, PinId, SwdLines};
use std::{
    fmt,
    io::BufRead,
    iter::FusedIterator,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
};

use super::{PinAssignment, PinError, ProtocolOptions, ScanError, ScanResult, Sequencer, Verbosity};

/// Candidate pins, bit n set means pin n takes part in the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PinMask(u64);
impl PinMask {
    /// Pins 2, 3 and 4.
    pub const DEFAULT: Self = Self(0b11100);

    pub const fn new(bits: u64) -> Self {
        Self(bits)
    }
    pub const fn bits(self) -> u64 {
        self.0
    }
    pub const fn contains(self, pin: PinId) -> bool {
        pin < MAX_PINS && self.0 >> pin & 1 == 1
    }
    /// Highest candidate pin + 1, 0 for an empty mask.
    pub const fn max_pin(self) -> u8 {
        (u64::BITS - self.0.leading_zeros()) as u8
    }
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
    /// Candidate pins in ascending order.
    pub fn pins(self) -> impl Iterator<Item = PinId> + Clone {
        (0..self.max_pin()).filter(move |&pin| self.contains(pin))
    }
}
impl Default for PinMask {
    fn default() -> Self {
        Self::DEFAULT
    }
}
impl From<u64> for PinMask {
    fn from(value: u64) -> Self {
        Self(value)
    }
}
impl From<PinMask> for u64 {
    fn from(value: PinMask) -> Self {
        value.0
    }
}
impl fmt::Display for PinMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#b}", self.0)
    }
}

/// Everything a scan needs, passed by value into each scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanConfig {
    mask: PinMask,
    max_pin: u8,
    /// Stop at the first pair that answers.
    pub break_on_hit: bool,
    pub verbosity: Verbosity,
    pub protocol: ProtocolOptions,
}
impl ScanConfig {
    pub fn configure(mask: u64, break_on_hit: bool, verbosity: Verbosity) -> Self {
        let mask = PinMask::new(mask);
        Self {
            mask,
            max_pin: mask.max_pin(),
            break_on_hit,
            verbosity,
            protocol: ProtocolOptions::default(),
        }
    }
    pub fn with_mask(mut self, mask: u64) -> Self {
        self.set_mask(mask);
        self
    }
    pub fn with_protocol(mut self, protocol: ProtocolOptions) -> Self {
        self.protocol = protocol;
        self
    }
    pub fn set_mask(&mut self, mask: u64) {
        self.mask = PinMask::new(mask);
        self.max_pin = self.mask.max_pin();
    }
    pub fn mask(&self) -> PinMask {
        self.mask
    }
    pub fn max_pin(&self) -> u8 {
        self.max_pin
    }
    /// Ordered SWCLK/SWDIO pairs in scan order: swclk outer, swdio inner.
    ///
    /// (A, B) and (B, A) are both tried, the two roles are not interchangeable.
    pub fn pairs(&self) -> impl Iterator<Item = PinAssignment> + use<> {
        let pins = self.mask.pins();
        let swdio = pins.clone();
        pins.flat_map(move |swclk| {
            swdio
                .clone()
                .filter(move |&swdio| swdio != swclk)
                .map(move |swdio| PinAssignment { swclk, swdio })
        })
    }
}
impl Default for ScanConfig {
    fn default() -> Self {
        Self::configure(PinMask::DEFAULT.bits(), false, Verbosity::Quiet)
    }
}

/// Stops a running scan before its next pin pair. Clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);
impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
    /// Re-arm after a cancelled scan.
    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
    /// Cancel once a line arrives on `input`, e.g. Enter on stdin.
    ///
    /// End of input and read errors leave the token alone, so a closed or
    /// redirected stdin does not stop the scan.
    pub fn cancel_on_input<R>(&self, mut input: R) -> JoinHandle<()>
    where
        R: BufRead + Send + 'static,
    {
        let token = self.clone();
        thread::spawn(move || {
            let mut line = String::new();
            match input.read_line(&mut line) {
                Ok(n) if n > 0 => token.cancel(),
                Ok(_) => log::debug!("Input closed, scan runs to the end"),
                Err(e) => log::warn!("Input unreadable, scan runs to the end: {e}"),
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    pub matched: bool,
    pub results: Vec<ScanResult>,
    pub cancelled: bool,
}

/// Brute force search for the SWD pins among a set of candidates.
pub struct Scanner<L: SwdLines> {
    lines: L,
    cancel: CancelToken,
}
impl<L: SwdLines> Scanner<L> {
    pub fn new(lines: L) -> Self {
        Self {
            lines,
            cancel: CancelToken::new(),
        }
    }
    pub fn lines(&self) -> &L {
        &self.lines
    }
    pub fn lines_mut(&mut self) -> &mut L {
        &mut self.lines
    }
    pub fn into_inner(self) -> L {
        self.lines
    }
    /// Token that aborts scans of this scanner, may be handed to another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
    /// Try one explicit pin pair.
    pub fn test_pair(
        &mut self,
        swclk: PinId,
        swdio: PinId,
        config: &ScanConfig,
    ) -> Result<ScanResult, ScanError<L::Error>> {
        let pins = PinAssignment::new(swclk, swdio)?.check_count(self.lines.pin_count())?;
        log::debug!("Test swclk[{swclk}], swdio[{swdio}]");
        Sequencer::new(&mut self.lines, pins, config.protocol, config.verbosity).run()
    }
    /// Lazily try every ordered pair of `config`'s mask.
    ///
    /// Every candidate pin is checked against the line interface before the
    /// first pin is touched.
    pub fn scan(&mut self, config: &ScanConfig) -> Result<ScanIter<'_, L>, ScanError<L::Error>> {
        let count = self.lines.pin_count();
        if let Some(pin) = config.mask.pins().find(|&pin| pin >= count) {
            return Err(PinError::OutOfRange { pin, count }.into());
        }
        log::debug!(
            "Scan pins {} with {:?}, break on hit: {}",
            config.mask,
            config.protocol,
            config.break_on_hit
        );
        Ok(ScanIter {
            scanner: self,
            config: *config,
            pairs: Box::new(config.pairs()),
            matched: false,
            cancelled: false,
            done: false,
        })
    }
    /// Scan to the end and report whether any pair answered.
    pub fn run(&mut self, config: &ScanConfig) -> Result<bool, ScanError<L::Error>> {
        Ok(self.scan(config)?.finish()?.matched)
    }
}

/// Results of a scan in progress, one per pin pair tried.
///
/// Ends after the last pair, after the first match with `break_on_hit`, when
/// the [`CancelToken`] fires, or right after yielding a line fault.
pub struct ScanIter<'a, L: SwdLines> {
    scanner: &'a mut Scanner<L>,
    config: ScanConfig,
    pairs: Box<dyn Iterator<Item = PinAssignment>>,
    matched: bool,
    cancelled: bool,
    done: bool,
}
impl<L: SwdLines> ScanIter<'_, L> {
    /// Whether any pair tried so far answered.
    pub fn matched(&self) -> bool {
        self.matched
    }
    pub fn cancelled(&self) -> bool {
        self.cancelled
    }
    /// Run the remaining pairs. A line fault discards the collected results.
    pub fn finish(mut self) -> Result<ScanSummary, ScanError<L::Error>> {
        let mut results = Vec::new();
        for result in &mut self {
            results.push(result?);
        }
        Ok(ScanSummary {
            matched: self.matched,
            results,
            cancelled: self.cancelled,
        })
    }
    fn stop(&mut self) {
        self.done = true;
        log::debug!("Finish scan, found: {}", self.matched);
    }
}
impl<L: SwdLines> Iterator for ScanIter<'_, L> {
    type Item = Result<ScanResult, ScanError<L::Error>>;
    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let Some(pins) = self.pairs.next() else {
            self.stop();
            return None;
        };
        if self.scanner.cancel.is_cancelled() {
            log::info!("Scan cancelled before {pins:?}");
            self.cancelled = true;
            self.stop();
            return None;
        }
        let result = Sequencer::new(
            &mut self.scanner.lines,
            pins,
            self.config.protocol,
            self.config.verbosity,
        )
        .run();
        match &result {
            Ok(result) if result.matched => {
                self.matched = true;
                if self.config.break_on_hit {
                    self.stop();
                }
            }
            Ok(_) => {}
            Err(e) => {
                log::error!("Scan aborted on {pins:?}: {e}");
                self.stop();
            }
        }
        Some(result)
    }
}
impl<L: SwdLines> FusedIterator for ScanIter<'_, L> {}
