//! Common utilities and shared types for peyda-rs.
//!
//! This crate provides foundational components used across all peyda-rs crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: Entity ids and OTP request ids via [`IdGenerator`]
//! - **Clock**: Injectable time source via [`Clock`], with a fake for tests
//! - **Cache**: TTL key-value store via [`Cache`], Redis-backed or in-memory
//!
//! # Example
//!
//! ```no_run
//! use peyda_common::{Config, IdGenerator, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id_gen = IdGenerator::new();
//!     let id = id_gen.generate();
//!     println!("Generated ID: {}", id);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod id;

pub use cache::{Cache, CacheJson, InMemoryCache, RedisCache};
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
