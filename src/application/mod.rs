//! Application-level error reporting shared by the binary and the HTTP layer.

pub mod error;
