pub mod clock;
pub mod comment;
pub mod config;
pub mod directory;
pub mod error;
pub mod eta;
pub mod io;
pub mod lifecycle;
pub mod paths;
pub mod policy;
pub mod stats;
pub mod store;
pub mod ticket;
pub mod tracker;
pub mod types;

pub use error::{ErrorKind, Result, TrackerError};
pub use tracker::Tracker;
