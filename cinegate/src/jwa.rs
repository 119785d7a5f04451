//! Signing algorithms accepted for bearer tokens
//!
//! Only the RSA family of [RFC7518][] is supported. Tokens are minted by an
//! external identity provider that publishes public keys, so a shared-secret
//! algorithm is never acceptable here.
//!
//! [RFC7518]: https://tools.ietf.org/html/rfc7518

use std::{convert::TryFrom, fmt, str::FromStr};

use ring::signature::RsaParameters;
use serde::{Deserialize, Serialize};

use crate::error;

/// An RSA signature algorithm
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Algorithm {
    /// RSASSA-PKCS1-v1_5 using SHA-256
    RS256,
    /// RSASSA-PKCS1-v1_5 using SHA-384
    RS384,
    /// RSASSA-PKCS1-v1_5 using SHA-512
    RS512,
    /// RSASSA-PSS using SHA-256 and MGF1 with SHA-256
    PS256,
    /// RSASSA-PSS using SHA-384 and MGF1 with SHA-384
    PS384,
    /// RSASSA-PSS using SHA-512 and MGF1 with SHA-512
    PS512,
}

impl Algorithm {
    /// The name used in the `alg` header and JWK parameter
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::RS512 => "RS512",
            Self::PS256 => "PS256",
            Self::PS384 => "PS384",
            Self::PS512 => "PS512",
        }
    }

    pub(crate) fn verification_params(self) -> &'static RsaParameters {
        match self {
            Self::RS256 => &ring::signature::RSA_PKCS1_2048_8192_SHA256,
            Self::RS384 => &ring::signature::RSA_PKCS1_2048_8192_SHA384,
            Self::RS512 => &ring::signature::RSA_PKCS1_2048_8192_SHA512,
            Self::PS256 => &ring::signature::RSA_PSS_2048_8192_SHA256,
            Self::PS384 => &ring::signature::RSA_PSS_2048_8192_SHA384,
            Self::PS512 => &ring::signature::RSA_PSS_2048_8192_SHA512,
        }
    }
}

impl Default for Algorithm {
    fn default() -> Self {
        Self::RS256
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<&'_ str> for Algorithm {
    type Error = error::UnknownAlgorithm;

    #[inline]
    fn try_from(value: &'_ str) -> Result<Self, Self::Error> {
        match value {
            "RS256" => Ok(Self::RS256),
            "RS384" => Ok(Self::RS384),
            "RS512" => Ok(Self::RS512),
            "PS256" => Ok(Self::PS256),
            "PS384" => Ok(Self::PS384),
            "PS512" => Ok(Self::PS512),
            _ => Err(error::unknown_algorithm(value)),
        }
    }
}

impl FromStr for Algorithm {
    type Err = error::UnknownAlgorithm;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_parsing() -> color_eyre::Result<()> {
        for alg in [
            Algorithm::RS256,
            Algorithm::RS384,
            Algorithm::RS512,
            Algorithm::PS256,
            Algorithm::PS384,
            Algorithm::PS512,
        ] {
            assert_eq!(alg.name().parse::<Algorithm>()?, alg);
        }
        Ok(())
    }

    #[test]
    fn symmetric_and_unsigned_algorithms_are_unknown() {
        for name in ["HS256", "none", "ES256", "rs256", ""] {
            assert!(name.parse::<Algorithm>().is_err(), "{name} should be rejected");
        }
    }

    #[test]
    fn deserializes_from_header_name() -> color_eyre::Result<()> {
        let alg: Algorithm = serde_json::from_str(r#""PS384""#)?;
        assert_eq!(alg, Algorithm::PS384);
        Ok(())
    }
}
