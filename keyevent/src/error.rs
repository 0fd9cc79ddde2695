//! Error types.

use core::fmt;

/// Failure of a driver bring-up or key registration call.
///
/// Registration errors leave the registry and pool untouched, so the caller
/// can retry with corrected input. Bring-up errors must be handled before the
/// first poll.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Error {
    /// Empty key name, wrong locator kind for the backend, or an unusable
    /// configuration value.
    InvalidParameter,
    /// The sampler does not provide the configured backend mode.
    BackendCapabilityMismatch,
    /// The pool byte budget cannot hold a single registry block.
    PoolConfiguration,
    /// Matrix position outside the configured rows/columns.
    OutOfRange,
    /// Key id or hardware locator already registered.
    Duplicate,
    /// Maximum key count reached.
    Full,
    /// Registry pool exhausted.
    OutOfMemory,
}

impl Error {
    /// Numeric code for hosts that expect C-style status values.
    pub const fn code(self) -> i32 {
        match self {
            Error::InvalidParameter => -1,
            Error::BackendCapabilityMismatch => -2,
            Error::PoolConfiguration => -3,
            Error::OutOfRange => -4,
            Error::Duplicate => -5,
            Error::Full => -6,
            Error::OutOfMemory => -7,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::InvalidParameter => "invalid parameter",
            Error::BackendCapabilityMismatch => "sampler does not match the configured backend",
            Error::PoolConfiguration => "pool budget cannot hold a single key",
            Error::OutOfRange => "matrix position out of range",
            Error::Duplicate => "key id or hardware position already registered",
            Error::Full => "maximum number of keys registered",
            Error::OutOfMemory => "key pool exhausted",
        };
        f.write_str(msg)
    }
}

#[cfg(any(test, feature = "std"))]
impl std::error::Error for Error {}

/// A snapshot scan that could not produce levels for this tick.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SampleError {
    /// The snapshot source reported a failure.
    Backend,
    /// The snapshot source filled a different number of levels than there are
    /// registered keys.
    SizeMismatch { expected: usize, actual: usize },
}

impl fmt::Display for SampleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleError::Backend => f.write_str("snapshot scan failed"),
            SampleError::SizeMismatch { expected, actual } => write!(
                f,
                "snapshot returned {} levels, expected {}",
                actual, expected
            ),
        }
    }
}

#[cfg(any(test, feature = "std"))]
impl std::error::Error for SampleError {}
