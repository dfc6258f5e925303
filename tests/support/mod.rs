#![allow(dead_code)]

mod engine;
mod logging;

pub use engine::*;
pub use logging::*;
