//! Configuration constants
//!
//! Tool names, file layout and timeouts shared by the build engine.

pub mod defaults;
