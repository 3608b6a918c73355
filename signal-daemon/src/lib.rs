//! Sibling daemon for `daemon-launcher`.
//!
//! The `signal` binary logs to a file and blocks until a kill signal arrives;
//! [`signals`] is the handler registry it waits on.

pub mod signals;
