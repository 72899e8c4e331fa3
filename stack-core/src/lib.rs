pub mod clock;
pub mod config;
pub mod constants;
pub mod container;
pub mod error;
pub mod extension;
pub mod properties;
pub mod runner;
pub mod state;

#[cfg(test)]
mod test_support;

pub use error::{Result, StackError};
