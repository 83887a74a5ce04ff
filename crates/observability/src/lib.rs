//! Process-wide logging setup shared by the binaries and black-box tests.

pub mod tracing;

pub use crate::tracing::{LogFormat, init, init_with};
