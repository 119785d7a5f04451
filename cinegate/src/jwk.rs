//! RSA public keys in the JSON Web Key (JWK) format
//!
//! The specifications for JSON Web Keys can be found in [RFC7517][].
//!
//! [RFC7517]: https://tools.ietf.org/html/rfc7517

use std::convert::TryFrom;

use aliri_braid::braid;
use serde::Deserialize;

use crate::{b64, error, jwa::Algorithm};

/// An identifier for a JWK
#[braid(serde, ref_doc = "A borrowed reference to JWK identifier ([`KeyId`])")]
pub struct KeyId;

const MIN_MODULUS_BYTES: usize = 2048 / 8;
const MAX_MODULUS_BYTES: usize = 8192 / 8;

/// An identified RSA public key usable for signature verification
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "JwkDto")]
#[must_use]
pub struct Jwk {
    key_id: KeyId,
    algorithm: Option<Algorithm>,
    modulus: Vec<u8>,
    exponent: Vec<u8>,
}

impl Jwk {
    /// Constructs a key from its big-endian modulus and public exponent
    ///
    /// Leading zero octets are ignored. The modulus must be between 2048 and
    /// 8192 bits.
    pub fn from_components(
        key_id: KeyId,
        modulus: &[u8],
        exponent: &[u8],
    ) -> Result<Self, error::KeyRejected> {
        let modulus = strip_leading_zeros(modulus);
        let exponent = strip_leading_zeros(exponent);

        if !(MIN_MODULUS_BYTES..=MAX_MODULUS_BYTES).contains(&modulus.len()) {
            return Err(error::key_rejected(
                "key modulus must be between 2048 and 8192 bits",
            ));
        }

        if exponent.is_empty() {
            return Err(error::key_rejected("key exponent must not be zero"));
        }

        Ok(Self {
            key_id,
            algorithm: None,
            modulus: modulus.to_vec(),
            exponent: exponent.to_vec(),
        })
    }

    /// Restricts the key to a single algorithm
    pub fn with_algorithm(self, alg: Algorithm) -> Self {
        Self {
            algorithm: Some(alg),
            ..self
        }
    }

    /// The key ID
    #[must_use]
    pub fn key_id(&self) -> &KeyIdRef {
        &self.key_id
    }

    /// The algorithm the publisher restricted this key to, if any
    #[must_use]
    pub fn algorithm(&self) -> Option<Algorithm> {
        self.algorithm
    }

    /// Whether the key may be used with the given algorithm
    #[must_use]
    pub fn is_compatible(&self, alg: Algorithm) -> bool {
        self.algorithm.map_or(true, |restricted| restricted == alg)
    }

    /// Verifies `signature` over `message`
    pub fn verify(
        &self,
        alg: Algorithm,
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), error::SignatureMismatch> {
        if !self.is_compatible(alg) {
            return Err(error::signature_mismatch());
        }

        let pk = ring::signature::RsaPublicKeyComponents {
            n: self.modulus.as_slice(),
            e: self.exponent.as_slice(),
        };

        pk.verify(alg.verification_params(), message, signature)
            .map_err(|_| error::signature_mismatch())
    }
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

impl TryFrom<JwkDto> for Jwk {
    type Error = error::KeyRejected;

    fn try_from(dto: JwkDto) -> Result<Self, Self::Error> {
        if dto.kty != "RSA" {
            return Err(error::key_rejected("only RSA keys are supported"));
        }

        if matches!(dto.usage.as_deref(), Some(usage) if usage != "sig") {
            return Err(error::key_rejected("key is not intended for signatures"));
        }

        let key_id = dto
            .kid
            .ok_or_else(|| error::key_rejected("key has no identifier"))?;

        let algorithm = dto
            .alg
            .as_deref()
            .map(Algorithm::try_from)
            .transpose()
            .map_err(|e| error::key_rejected_by("key algorithm is not supported", e))?;

        let (n, e) = dto
            .n
            .zip(dto.e)
            .ok_or_else(|| error::key_rejected("key is missing its modulus or exponent"))?;

        let modulus =
            b64::decode(&n).map_err(|e| error::key_rejected_by("malformed key modulus", e))?;
        let exponent =
            b64::decode(&e).map_err(|e| error::key_rejected_by("malformed key exponent", e))?;

        let key = Self::from_components(key_id, &modulus, &exponent)?;
        Ok(Self { algorithm, ..key })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct JwkDto {
    #[serde(default)]
    kty: String,
    #[serde(default)]
    pub(crate) kid: Option<KeyId>,
    #[serde(default, rename = "use")]
    pub(crate) usage: Option<String>,
    #[serde(default)]
    pub(crate) alg: Option<String>,
    #[serde(default)]
    n: Option<String>,
    #[serde(default)]
    e: Option<String>,
}
