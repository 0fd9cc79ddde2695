//! Driver configuration.
//!
//! The defaults below are the values a board gets when it does not override
//! anything. A [`Config`] is built with `const fn` setters so a firmware can
//! keep its whole configuration in a `const` item.

use crate::error::Error;

/// Upper bound on registered keys when a driver does not pick its own `N`.
pub const DEFAULT_MAX_KEYS: usize = 16;

/// Byte budget for the registry pool.
pub const POOL_SIZE: usize = 1024;

/// Time a raw level must hold before it becomes the stable level.
pub const DEBOUNCE_MS: u32 = 20;
/// Hold time before a `LongPress` fires.
pub const LONG_PRESS_MS: u32 = 800;
/// Hold time before `Repeat` events start.
pub const REPEAT_START_MS: u32 = 500;
/// Spacing between `Repeat` events.
pub const REPEAT_PERIOD_MS: u32 = 80;
/// Window in which a second release turns into a `DoubleClick`.
pub const DOUBLE_CLICK_MS: u32 = 250;

/// Number of matrix rows addressable in matrix mode.
pub const MATRIX_MAX_ROW: u8 = 8;
/// Number of matrix columns addressable in matrix mode.
pub const MATRIX_MAX_COL: u8 = 8;

/// A digital line level.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub const fn from_bit(bit: u8) -> Self {
        if bit == 0 {
            Level::Low
        } else {
            Level::High
        }
    }

    pub const fn inverted(self) -> Self {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }

    pub const fn is_high(self) -> bool {
        matches!(self, Level::High)
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

/// Which sampling backend the driver is built for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BackendMode {
    /// One GPIO line per key.
    Gpio,
    /// Keys sit on a row/column matrix.
    Matrix,
    /// The application hands over one level per key each tick.
    Custom,
}

/// Timing thresholds, all in milliseconds.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Timing {
    pub debounce_ms: u32,
    pub long_press_ms: u32,
    pub repeat_start_ms: u32,
    pub repeat_period_ms: u32,
    pub double_click_ms: u32,
}

impl Timing {
    pub const fn new() -> Self {
        Self {
            debounce_ms: DEBOUNCE_MS,
            long_press_ms: LONG_PRESS_MS,
            repeat_start_ms: REPEAT_START_MS,
            repeat_period_ms: REPEAT_PERIOD_MS,
            double_click_ms: DOUBLE_CLICK_MS,
        }
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self::new()
    }
}

/// Electrical polarity of the sampled lines.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Polarity {
    /// Pin level that means "pressed" in GPIO mode.
    pub pin_active: Level,
    /// Column level that means "pressed" in matrix mode.
    pub col_active: Level,
    /// Level driven onto a row while it is selected.
    pub row_active: Level,
}

impl Polarity {
    pub const fn new() -> Self {
        Self {
            pin_active: Level::High,
            col_active: Level::High,
            row_active: Level::High,
        }
    }

    /// Level a row rests at while it is not selected.
    pub const fn row_idle(&self) -> Level {
        self.row_active.inverted()
    }
}

impl Default for Polarity {
    fn default() -> Self {
        Self::new()
    }
}

/// Matrix dimensions and wiring orientation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MatrixBounds {
    pub rows: u8,
    pub cols: u8,
    /// Mirror logical rows onto physical rows (`row` -> `rows - 1 - row`).
    pub reverse_rows: bool,
    /// Mirror logical columns onto physical columns.
    pub reverse_cols: bool,
}

impl MatrixBounds {
    pub const fn new() -> Self {
        Self {
            rows: MATRIX_MAX_ROW,
            cols: MATRIX_MAX_COL,
            reverse_rows: false,
            reverse_cols: false,
        }
    }

    pub const fn contains(&self, row: u8, col: u8) -> bool {
        row < self.rows && col < self.cols
    }

    /// Map a logical position onto the row/column lines that are actually
    /// driven and read. Only meaningful for positions inside the bounds.
    pub const fn physical(&self, row: u8, col: u8) -> (u8, u8) {
        let row = if self.reverse_rows { self.rows - 1 - row } else { row };
        let col = if self.reverse_cols { self.cols - 1 - col } else { col };
        (row, col)
    }
}

impl Default for MatrixBounds {
    fn default() -> Self {
        Self::new()
    }
}

/// Complete driver configuration.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub backend: BackendMode,
    pub timing: Timing,
    pub polarity: Polarity,
    pub matrix: MatrixBounds,
    /// Bytes available to the registry pool.
    pub pool_bytes: usize,
}

impl Config {
    pub const fn new() -> Self {
        Self {
            backend: BackendMode::Matrix,
            timing: Timing::new(),
            polarity: Polarity::new(),
            matrix: MatrixBounds::new(),
            pool_bytes: POOL_SIZE,
        }
    }

    pub const fn with_backend(mut self, backend: BackendMode) -> Self {
        self.backend = backend;
        self
    }

    pub const fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub const fn with_debounce_ms(mut self, ms: u32) -> Self {
        self.timing.debounce_ms = ms;
        self
    }

    pub const fn with_long_press_ms(mut self, ms: u32) -> Self {
        self.timing.long_press_ms = ms;
        self
    }

    pub const fn with_repeat_ms(mut self, start_ms: u32, period_ms: u32) -> Self {
        self.timing.repeat_start_ms = start_ms;
        self.timing.repeat_period_ms = period_ms;
        self
    }

    pub const fn with_double_click_ms(mut self, ms: u32) -> Self {
        self.timing.double_click_ms = ms;
        self
    }

    pub const fn with_polarity(mut self, polarity: Polarity) -> Self {
        self.polarity = polarity;
        self
    }

    pub const fn with_matrix(mut self, matrix: MatrixBounds) -> Self {
        self.matrix = matrix;
        self
    }

    pub const fn with_pool_bytes(mut self, bytes: usize) -> Self {
        self.pool_bytes = bytes;
        self
    }

    /// Reject configurations the state machine cannot run with.
    ///
    /// A zero repeat period would fire `Repeat` on every tick, and a matrix
    /// without rows or columns cannot hold any key.
    pub fn validate(&self) -> Result<(), Error> {
        if self.timing.repeat_period_ms == 0 {
            return Err(Error::InvalidParameter);
        }
        if self.backend == BackendMode::Matrix && (self.matrix.rows == 0 || self.matrix.cols == 0)
        {
            return Err(Error::InvalidParameter);
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
