use std::io::Cursor;

use thiserror::Error;

/// Seed the bootstrap service hashes peer addresses with unless configured otherwise.
pub const DEFAULT_HASH_SEED: u32 = 42;

pub type GeneratorId = i32;
pub type ConsumerId = i128;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("failed to hash peer address: {0}")]
    HashError(#[from] std::io::Error),
}

/// Derives identities from peer addresses with a seeded MurmurHash3.
///
/// The same `(address, seed)` pair always yields the same identity. Collisions between distinct
/// addresses are not detected: both peers receive the same identity.
#[derive(Debug, Clone, Copy)]
pub struct IdentityIssuer {
    seed: u32,
}

impl IdentityIssuer {
    pub fn new(seed: u32) -> Self {
        Self { seed }
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn generator_id(&self, address: &str) -> Result<GeneratorId, IdentityError> {
        issue_generator_id(address, self.seed)
    }

    pub fn consumer_id(&self, address: &str) -> Result<ConsumerId, IdentityError> {
        issue_consumer_id(address, self.seed)
    }
}

impl Default for IdentityIssuer {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_SEED)
    }
}

/// 32-bit x86 MurmurHash3 of the address, reinterpreted as a signed integer.
pub fn issue_generator_id(address: &str, seed: u32) -> Result<GeneratorId, IdentityError> {
    let hash = murmur3::murmur3_32(&mut Cursor::new(address.as_bytes()), seed)?;
    Ok(hash as i32)
}

/// 128-bit x64 MurmurHash3 of the address, reinterpreted as a signed integer.
pub fn issue_consumer_id(address: &str, seed: u32) -> Result<ConsumerId, IdentityError> {
    let hash = murmur3::murmur3_x64_128(&mut Cursor::new(address.as_bytes()), seed)?;
    Ok(hash as i128)
}
