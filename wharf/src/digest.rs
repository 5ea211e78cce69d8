//! Content digests: computing, parsing, and verifying.

use std::fmt;
use std::str::FromStr;

use sha2::{Digest as _, Sha256};

/// Digest algorithms the registry understands.
///
/// Only SHA-256 today; the enum leaves room for additional algorithms
/// without changing the addressing scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// SHA-256, rendered as the `sha256:` prefix.
    Sha256,
}

impl Algorithm {
    /// The registry name of the algorithm.
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Sha256 => "sha256",
        }
    }

    /// Length of the hex-encoded hash for this algorithm.
    fn hex_len(&self) -> usize {
        match self {
            Algorithm::Sha256 => 64,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a digest string does not parse.
#[derive(Debug, Clone, thiserror::Error)]
#[error("malformed digest: {0}")]
pub struct InvalidDigest(pub String);

/// An algorithm-prefixed content digest, e.g. `sha256:<64 hex chars>`.
///
/// The hex portion is always lowercase; parsing rejects anything else, so
/// two digests of the same content always compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Digest {
    algorithm: Algorithm,
    hex: String,
}

impl Digest {
    /// Compute the digest of the given content.
    pub fn compute(data: &[u8]) -> Self {
        Digest {
            algorithm: Algorithm::Sha256,
            hex: hex::encode(Sha256::digest(data)),
        }
    }

    /// The digest algorithm.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// The hex-encoded hash, without the algorithm prefix.
    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// Recompute the digest of `data` and compare. This is the only
    /// trustworthy check; a claimed digest is never taken at face value
    /// where integrity matters.
    pub fn verify(&self, data: &[u8]) -> bool {
        *self == Digest::compute(data)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

impl FromStr for Digest {
    type Err = InvalidDigest;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((algorithm, hex)) = s.split_once(':') else {
            return Err(InvalidDigest(s.to_string()));
        };
        let algorithm = match algorithm {
            "sha256" => Algorithm::Sha256,
            _ => return Err(InvalidDigest(s.to_string())),
        };
        if hex.len() != algorithm.hex_len()
            || !hex.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        {
            return Err(InvalidDigest(s.to_string()));
        }
        Ok(Digest {
            algorithm,
            hex: hex.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_known_vector() {
        // sha256 of the empty string
        assert_eq!(
            Digest::compute(b"").to_string(),
            "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn verify_roundtrip() {
        let data = b"some blob content";
        let digest = Digest::compute(data);
        assert!(digest.verify(data));
    }

    #[test]
    fn verify_rejects_mutation() {
        let data = b"some blob content".to_vec();
        let digest = Digest::compute(&data);

        for i in 0..data.len() {
            let mut mutated = data.clone();
            mutated[i] ^= 0x01;
            assert!(!digest.verify(&mutated), "mutation at byte {i} accepted");
        }
    }

    #[test]
    fn parse_roundtrip() {
        let digest = Digest::compute(b"x");
        let parsed: Digest = digest.to_string().parse().unwrap();
        assert_eq!(parsed, digest);
        assert_eq!(parsed.algorithm(), Algorithm::Sha256);
        assert_eq!(parsed.hex(), digest.hex());
    }

    #[test]
    fn parse_rejects_malformed() {
        for s in [
            "",
            "sha256",
            "sha256:",
            "sha256:abc",
            // uppercase hex
            "sha256:E3B0C44298FC1C149AFBF4C8996FB92427AE41E4649B934CA495991B7852B855",
            // non-hex character
            "sha256:g3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
            // unsupported algorithm
            "sha512:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
            // trailing garbage
            "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b8550",
        ] {
            assert!(s.parse::<Digest>().is_err(), "accepted {s:?}");
        }
    }
}
