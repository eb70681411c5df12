//! Finding project scripts and inspecting them
//!
//! Scripts live in `<dir>/<marker_dir>/<commands_dir>/` (by default `.opencmd/commands/`) of
//! any ancestor of the working directory, at any depth. Lookup walks ancestors nearest first;
//! classification then decides how a found script can be started.

pub mod ancestors;
pub mod classify;
pub mod locator;
