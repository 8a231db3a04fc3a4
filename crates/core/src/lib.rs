#![forbid(unsafe_code)]

pub mod error;
pub mod model;
pub mod progress;
pub mod quiz;
pub mod scheduler;
pub mod seek_guard;
pub mod time;

pub use error::Error;
pub use time::Clock;
