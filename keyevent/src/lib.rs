//! Debounced key event driver for polled control loops.
//!
//! Raw key samples come in through one of three sampling backends (independent
//! pins, a row/column matrix, or a snapshot supplied by the application). Every
//! poll tick each registered key is debounced and classified into press,
//! release, click, double-click, long-press, long-press-release and repeat
//! events, which are handed to an [`EventHandler`] once the scan pass is done.
//!
//! This crate is `no_std` and never allocates: the key registry is carved out
//! of a fixed-block pool and all per-key state lives in arrays sized by the
//! driver's `N` parameter.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod config;
pub mod debounce;
pub mod driver;
pub mod error;
pub mod event;
pub mod lock;
pub mod pool;
pub mod registry;
pub mod sample;

pub use config::{BackendMode, Config, Level, MatrixBounds, Polarity, Timing};
pub use debounce::KeyState;
pub use driver::{Driver, TickSource};
pub use error::{Error, SampleError};
pub use event::{EventHandler, KeyEvent};
pub use lock::{CriticalSection, NoLock, RegistrationLock};
pub use pool::{BlockId, BlockPool};
pub use registry::{KeyDescriptor, Locator, Registry};
pub use sample::{
    GpioSampler, MatrixSampler, MatrixScanner, PinReader, Sampler, SnapshotSampler,
    SnapshotScanner,
};
