//! Conditional logging macros.
//!
//! When the `tracing` feature is enabled, these re-export `tracing` macros.
//! When disabled, they expand to no-ops so the plot loop pays nothing for
//! per-command logging.

#[cfg(feature = "tracing")]
pub use tracing::{debug, info, trace, warn};

#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
pub use crate::{debug, info, trace, warn};
