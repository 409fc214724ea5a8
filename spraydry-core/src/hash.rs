use blake2::Blake2b512;
use sha2::{Digest, Sha256};

use crate::error::{Result, SprayDryError};

/// Supported hash algorithms for file, chunk and directory identity.
///
/// The algorithm name is embedded into every stored hash, so renaming a
/// variant here would change the on-disk format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashAlgorithm {
    Blake2b,
    Blake3,
    Sha256,
}

impl HashAlgorithm {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "blake2b" => Ok(Self::Blake2b),
            "blake3" => Ok(Self::Blake3),
            "sha256" => Ok(Self::Sha256),
            _ => Err(SprayDryError::Config(format!(
                "unknown hash algorithm: '{name}'"
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Blake2b => "blake2b",
            Self::Blake3 => "blake3",
            Self::Sha256 => "sha256",
        }
    }

    pub fn hasher(&self) -> Hasher {
        match self {
            Self::Blake2b => Hasher::Blake2b(Blake2b512::new()),
            Self::Blake3 => Hasher::Blake3(blake3::Hasher::new()),
            Self::Sha256 => Hasher::Sha256(Sha256::new()),
        }
    }

    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        let mut hasher = self.hasher();
        hasher.update(data);
        hasher.digest()
    }

    /// A final stored hash: `name-digest`.
    pub fn tag(&self, digest: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.name().len() + 1 + digest.len());
        out.extend_from_slice(self.name().as_bytes());
        out.push(b'-');
        out.extend_from_slice(digest);
        out
    }

    /// A preliminary fake hash: `name_digest`. The underscore separator
    /// keeps it disjoint from every real hash.
    pub fn tag_preliminary(&self, digest: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.name().len() + 1 + digest.len());
        out.extend_from_slice(self.name().as_bytes());
        out.push(b'_');
        out.extend_from_slice(digest);
        out
    }
}

/// An incremental hash state. Cloning forks the state, so a prefix can
/// be hashed once and continued independently per entry.
#[derive(Clone)]
pub enum Hasher {
    Blake2b(Blake2b512),
    Blake3(blake3::Hasher),
    Sha256(Sha256),
}

impl Hasher {
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Blake2b(h) => Digest::update(h, data),
            Self::Blake3(h) => {
                h.update(data);
            }
            Self::Sha256(h) => Digest::update(h, data),
        }
    }

    pub fn digest(self) -> Vec<u8> {
        match self {
            Self::Blake2b(h) => h.finalize().to_vec(),
            Self::Blake3(h) => h.finalize().as_bytes().to_vec(),
            Self::Sha256(h) => h.finalize().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for algo in [
            HashAlgorithm::Blake2b,
            HashAlgorithm::Blake3,
            HashAlgorithm::Sha256,
        ] {
            assert_eq!(HashAlgorithm::from_name(algo.name()).unwrap(), algo);
        }
        assert!(HashAlgorithm::from_name("md5").is_err());
    }

    #[test]
    fn digest_lengths() {
        assert_eq!(HashAlgorithm::Blake2b.digest(b"abc").len(), 64);
        assert_eq!(HashAlgorithm::Blake3.digest(b"abc").len(), 32);
        assert_eq!(HashAlgorithm::Sha256.digest(b"abc").len(), 32);
    }

    #[test]
    fn incremental_matches_oneshot() {
        for algo in [
            HashAlgorithm::Blake2b,
            HashAlgorithm::Blake3,
            HashAlgorithm::Sha256,
        ] {
            let mut hasher = algo.hasher();
            hasher.update(b"spray");
            hasher.update(b"dry");
            assert_eq!(hasher.digest(), algo.digest(b"spraydry"));
        }
    }

    #[test]
    fn cloned_state_forks() {
        let mut prefix = HashAlgorithm::Blake2b.hasher();
        prefix.update(b"common");
        let mut left = prefix.clone();
        let mut right = prefix;
        left.update(b"-a");
        right.update(b"-b");
        assert_eq!(left.digest(), HashAlgorithm::Blake2b.digest(b"common-a"));
        assert_eq!(right.digest(), HashAlgorithm::Blake2b.digest(b"common-b"));
    }

    #[test]
    fn tag_separators_differ() {
        let digest = HashAlgorithm::Sha256.digest(b"x");
        let real = HashAlgorithm::Sha256.tag(&digest);
        let fake = HashAlgorithm::Sha256.tag_preliminary(&digest);
        assert!(real.starts_with(b"sha256-"));
        assert!(fake.starts_with(b"sha256_"));
        assert_ne!(real, fake);
    }
}
