//! Application module

pub mod args;
pub mod config;
pub mod display;
pub mod error;
pub mod pipeline;
pub mod startup;
