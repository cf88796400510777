//! Eva CLI library — command implementations shared by the `eva` binary and its tests.

pub mod commands;
