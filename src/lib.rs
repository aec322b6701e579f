pub mod app;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod features;
pub mod gfx;

pub use error::EngineError;
