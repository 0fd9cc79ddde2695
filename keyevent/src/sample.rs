//! Raw key sampling.
//!
//! The hardware side is supplied by the application through one of three
//! capability traits: [`PinReader`] for keys on their own GPIO lines,
//! [`MatrixScanner`] for a row/column matrix, and [`SnapshotScanner`] for
//! anything else that can report one level per key. Each is wrapped by a
//! [`Sampler`] that turns line levels into pressed/released using the
//! configured polarity.

use crate::config::{BackendMode, Config, Level, MatrixBounds, Polarity};
use crate::error::{Error, SampleError};
use crate::registry::Locator;

/// Reads independent key pins.
pub trait PinReader {
    fn read_pin(&mut self, pin: u8) -> Level;
}

/// Drives matrix rows and reads matrix columns.
///
/// Every key is sampled as `select_row`, `read_col`, `unselect_row`.
pub trait MatrixScanner {
    /// Drive `row` to its selected level.
    fn select_row(&mut self, row: u8, drive: Level);
    fn read_col(&mut self, col: u8) -> Level;
    /// Return `row` to its idle level.
    fn unselect_row(&mut self, row: u8, idle: Level);
}

/// Produces the state of every registered key at once.
pub trait SnapshotScanner {
    /// Write one entry per registered key (true = pressed) in registration
    /// order and return how many were written.
    fn scan_snapshot(&mut self, pressed: &mut [bool]) -> Result<usize, SampleError>;
}

/// One sampling backend, as seen by the poll driver.
pub trait Sampler {
    fn mode(&self) -> BackendMode;

    /// Pick up polarity and matrix wiring from the driver configuration.
    ///
    /// Fails with [`Error::BackendCapabilityMismatch`] when the
    /// configuration selects a different backend.
    fn configure(&mut self, config: &Config) -> Result<(), Error> {
        if config.backend != self.mode() {
            return Err(Error::BackendCapabilityMismatch);
        }
        Ok(())
    }

    /// Called once at the start of every tick with room for one entry per
    /// registered key. An error aborts the tick.
    fn begin_scan(&mut self, snapshot: &mut [bool]) -> Result<(), SampleError> {
        let _ = snapshot;
        Ok(())
    }

    /// Raw pressed state of the key in `slot`.
    fn sample(&mut self, slot: usize, locator: &Locator, snapshot: &[bool]) -> bool;
}

/// Samples keys wired to their own pins.
pub struct GpioSampler<P> {
    reader: P,
    active: Level,
}

impl<P: PinReader> GpioSampler<P> {
    pub fn new(reader: P) -> Self {
        Self {
            reader,
            active: Polarity::new().pin_active,
        }
    }

    pub fn inner(&self) -> &P {
        &self.reader
    }

    pub fn inner_mut(&mut self) -> &mut P {
        &mut self.reader
    }

    pub fn into_inner(self) -> P {
        self.reader
    }
}

impl<P: PinReader> Sampler for GpioSampler<P> {
    fn mode(&self) -> BackendMode {
        BackendMode::Gpio
    }

    fn configure(&mut self, config: &Config) -> Result<(), Error> {
        if config.backend != BackendMode::Gpio {
            return Err(Error::BackendCapabilityMismatch);
        }
        self.active = config.polarity.pin_active;
        Ok(())
    }

    fn sample(&mut self, _slot: usize, locator: &Locator, _snapshot: &[bool]) -> bool {
        match *locator {
            Locator::Pin(pin) => self.reader.read_pin(pin) == self.active,
            _ => false,
        }
    }
}

/// Samples keys on a row/column matrix.
pub struct MatrixSampler<M> {
    scanner: M,
    polarity: Polarity,
    bounds: MatrixBounds,
}

impl<M: MatrixScanner> MatrixSampler<M> {
    pub fn new(scanner: M) -> Self {
        Self {
            scanner,
            polarity: Polarity::new(),
            bounds: MatrixBounds::new(),
        }
    }

    pub fn inner(&self) -> &M {
        &self.scanner
    }

    pub fn inner_mut(&mut self) -> &mut M {
        &mut self.scanner
    }

    pub fn into_inner(self) -> M {
        self.scanner
    }
}

impl<M: MatrixScanner> Sampler for MatrixSampler<M> {
    fn mode(&self) -> BackendMode {
        BackendMode::Matrix
    }

    fn configure(&mut self, config: &Config) -> Result<(), Error> {
        if config.backend != BackendMode::Matrix {
            return Err(Error::BackendCapabilityMismatch);
        }
        self.polarity = config.polarity;
        self.bounds = config.matrix;
        Ok(())
    }

    fn sample(&mut self, _slot: usize, locator: &Locator, _snapshot: &[bool]) -> bool {
        let Locator::Matrix { row, col } = *locator else {
            return false;
        };
        let (row, col) = self.bounds.physical(row, col);

        self.scanner.select_row(row, self.polarity.row_active);
        let level = self.scanner.read_col(col);
        self.scanner.unselect_row(row, self.polarity.row_idle());

        level == self.polarity.col_active
    }
}

/// Samples keys from an application-supplied snapshot.
pub struct SnapshotSampler<S> {
    scanner: S,
}

impl<S: SnapshotScanner> SnapshotSampler<S> {
    pub fn new(scanner: S) -> Self {
        Self { scanner }
    }

    pub fn inner(&self) -> &S {
        &self.scanner
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.scanner
    }

    pub fn into_inner(self) -> S {
        self.scanner
    }
}

impl<S: SnapshotScanner> Sampler for SnapshotSampler<S> {
    fn mode(&self) -> BackendMode {
        BackendMode::Custom
    }

    fn begin_scan(&mut self, snapshot: &mut [bool]) -> Result<(), SampleError> {
        snapshot.fill(false);
        let filled = self.scanner.scan_snapshot(snapshot)?;
        if filled != snapshot.len() {
            return Err(SampleError::SizeMismatch {
                expected: snapshot.len(),
                actual: filled,
            });
        }
        Ok(())
    }

    fn sample(&mut self, slot: usize, _locator: &Locator, snapshot: &[bool]) -> bool {
        snapshot.get(slot).copied().unwrap_or(false)
    }
}
