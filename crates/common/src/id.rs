//! ID generation utilities.

use rand::RngCore;
use rand::rngs::OsRng;
use uuid::Uuid;

/// ID generator for entities and OTP request ids.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Generate a new random UUID v4 entity id.
    #[must_use]
    pub fn generate(&self) -> String {
        Uuid::new_v4().to_string()
    }

    /// Generate an unguessable OTP request id (`req_` + 32 hex chars).
    ///
    /// Uses the OS random source; request ids gate code verification and
    /// must not be predictable.
    #[must_use]
    pub fn generate_request_id(&self) -> String {
        let mut bytes = [0u8; 16];
        OsRng.fill_bytes(&mut bytes);
        format!("req_{}", hex::encode(bytes))
    }
}
