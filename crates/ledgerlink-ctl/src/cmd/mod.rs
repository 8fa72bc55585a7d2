//! CLI command modules.

pub mod enroll;
pub mod genesis;
pub mod invoke;
pub mod join;
pub mod limits;
pub mod network;
