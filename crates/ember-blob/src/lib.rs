//! Storage-adjacent components: filename sanitizing, MIME sniffing,
//! the size/type validation chain, the on-disk blob repository
//! with secure erase, and the path manager.

#![deny(unsafe_code)]

pub mod mime;
pub mod path;
pub mod repo;
pub mod sanitizer;
pub mod validate;

pub use path::PathManager;
pub use repo::{BlobRepository, RepoError};
pub use validate::{MimeAllowlistValidator, SizeValidator, ValidationChain, ValidationContext, Validator};

/// SHA-256 of `bytes`, hex-encoded.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_of_hello() {
        assert_eq!(
            sha256_hex(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }
}
