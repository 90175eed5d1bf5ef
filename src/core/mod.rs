//! Core domain types: identifiers, time handling and the clock.

pub mod clock;
pub mod time;
pub mod types;
