//! Simulated key hardware for trace replay.
//!
//! One board type stands in for all three backends: it answers pin reads,
//! matrix row/column scans and snapshot requests from the same set of held
//! keys, honouring the configured polarity and matrix wiring.

use keyevent::{
    Config, Level, Locator, MatrixBounds, MatrixScanner, PinReader, Polarity, SampleError,
    SnapshotScanner,
};

pub struct SimBoard {
    polarity: Polarity,
    bounds: MatrixBounds,
    /// Keys currently held, by logical locator.
    held: Vec<Locator>,
    /// Registered keys in registration order, for snapshots.
    order: Vec<Locator>,
    selected_row: Option<u8>,
    fail_next_scan: bool,
}

impl SimBoard {
    pub fn new(config: &Config) -> Self {
        Self {
            polarity: config.polarity,
            bounds: config.matrix,
            held: Vec::new(),
            order: Vec::new(),
            selected_row: None,
            fail_next_scan: false,
        }
    }

    /// Wire a registered key to the board.
    pub fn attach(&mut self, locator: Locator) {
        self.order.push(locator);
    }

    pub fn set(&mut self, locator: Locator, pressed: bool) {
        let held = self.held.contains(&locator);
        if pressed && !held {
            self.held.push(locator);
        } else if !pressed && held {
            self.held.retain(|l| *l != locator);
        }
    }

    pub fn is_held(&self, locator: &Locator) -> bool {
        self.held.contains(locator)
    }

    /// Make the next snapshot scan report a failure.
    pub fn fail_next_scan(&mut self) {
        self.fail_next_scan = true;
    }

    fn level(&self, pressed: bool, active: Level) -> Level {
        if pressed {
            active
        } else {
            active.inverted()
        }
    }
}

impl PinReader for SimBoard {
    fn read_pin(&mut self, pin: u8) -> Level {
        self.level(self.is_held(&Locator::Pin(pin)), self.polarity.pin_active)
    }
}

impl MatrixScanner for SimBoard {
    fn select_row(&mut self, row: u8, drive: Level) {
        if drive == self.polarity.row_active {
            self.selected_row = Some(row);
        }
    }

    fn read_col(&mut self, col: u8) -> Level {
        let pressed = match self.selected_row {
            Some(row) => self.held.iter().any(|l| match *l {
                Locator::Matrix { row: r, col: c } => self.bounds.physical(r, c) == (row, col),
                _ => false,
            }),
            None => false,
        };
        self.level(pressed, self.polarity.col_active)
    }

    fn unselect_row(&mut self, row: u8, idle: Level) {
        if self.selected_row == Some(row) && idle == self.polarity.row_idle() {
            self.selected_row = None;
        }
    }
}

impl SnapshotScanner for SimBoard {
    fn scan_snapshot(&mut self, pressed: &mut [bool]) -> Result<usize, SampleError> {
        if std::mem::take(&mut self.fail_next_scan) {
            return Err(SampleError::Backend);
        }
        for (slot, locator) in pressed.iter_mut().zip(&self.order) {
            *slot = self.held.contains(locator);
        }
        Ok(self.order.len())
    }
}
