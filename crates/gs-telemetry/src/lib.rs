//! Logging setup shared by gitscribe binaries.
//!
//! Output goes to stderr so that command results on stdout stay clean.
//! `RUST_LOG` overrides the level chosen by the caller.

pub mod logging;
