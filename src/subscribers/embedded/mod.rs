//! # Built-in subscribers
//!
//! - [`LogWriter`]: renders activity through `tracing` (demo/debug).

mod log;

pub use log::LogWriter;
