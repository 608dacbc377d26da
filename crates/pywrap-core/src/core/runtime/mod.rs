//! Subprocess plumbing: the external venv/pip operations and the final hand-off.

pub mod delegate;
pub mod process;
pub mod toolchain;
