//! Value objects shared by the mapper, the data access layer and the service.
//!
//! # Responsibility
//! - Define driver-independent raw values and column maps.
//! - Define the pending argument shape flushed before each procedure call.

pub mod argument;
pub mod value;
