pub mod config;
pub mod convolution;
pub mod distribution;
pub mod error;
pub mod histogram;
pub mod rank;
pub mod scores;
pub mod series;
pub mod util;

pub use crate::error::Error;
