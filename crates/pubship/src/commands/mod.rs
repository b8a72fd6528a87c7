//! Command implementations

pub mod ship;
