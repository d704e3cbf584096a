//! Command implementations

pub mod async_utils;
pub mod drain;
