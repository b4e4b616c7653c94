pub mod config;
pub mod error;

pub use config::{MasterKey, Overrides, Settings};
pub use error::*;
