//! Core business logic for peyda-rs: the match-and-notify pipeline.

pub mod services;

pub use services::*;
