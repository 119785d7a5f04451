use std::convert::TryFrom;

use serde::Deserialize;

use crate::{
    jwa,
    jwk::{JwkDto, KeyIdRef},
    Jwk,
};

/// A JSON Web Key Set (JWKS)
///
/// Entries that are not usable RSA signing keys are skipped when a set is
/// deserialized, so one unexpected key published by the identity provider
/// does not take down verification for the rest.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Jwks {
    #[serde(deserialize_with = "deserialize_keys")]
    keys: Vec<Jwk>,
}

impl Jwks {
    /// Adds a key to the set
    pub fn add_key(&mut self, key: Jwk) {
        self.keys.push(key);
    }

    /// A view of the keys in this set
    #[must_use]
    pub fn keys(&self) -> &[Jwk] {
        &self.keys
    }

    /// The number of usable keys in the set
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the set holds no usable keys
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Gets the first key with the given key ID that may be used with `alg`
    #[must_use]
    pub fn get_key_by_id(&self, kid: &KeyIdRef, alg: jwa::Algorithm) -> Option<&Jwk> {
        self.keys
            .iter()
            .find(|k| k.key_id() == kid && k.is_compatible(alg))
    }
}

impl FromIterator<Jwk> for Jwks {
    fn from_iter<T: IntoIterator<Item = Jwk>>(iter: T) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}

fn deserialize_keys<'de, D>(deserializer: D) -> Result<Vec<Jwk>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct LenientJwksVisitor;

    impl<'de> serde::de::Visitor<'de> for LenientJwksVisitor {
        type Value = Vec<Jwk>;

        fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("a list of JWK objects")
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: serde::de::SeqAccess<'de>,
        {
            let mut values = Vec::with_capacity(seq.size_hint().unwrap_or_default());
            let mut index = 0_usize;

            while let Some(dto) = seq.next_element::<JwkDto>()? {
                let kid = dto.kid.clone();
                let usage = dto.usage.clone();
                let alg = dto.alg.clone();

                match Jwk::try_from(dto) {
                    Ok(jwk) => values.push(jwk),
                    Err(error) => {
                        tracing::warn!(
                            jwks.idx = index,
                            jwk.kid = ?kid,
                            "jwk.use" = ?usage,
                            jwk.alg = ?alg,
                            %error,
                            "ignoring unusable JWK"
                        );
                    }
                }
                index += 1;
            }

            Ok(values)
        }
    }

    deserializer.deserialize_seq(LenientJwksVisitor)
}

#[cfg(test)]
mod tests {
    use color_eyre::Result;
    use tracing_test::traced_test;

    use super::*;
    use crate::{jwk::KeyId, testing};

    #[test]
    #[traced_test]
    fn skips_keys_that_cannot_verify_signatures() -> Result<()> {
        let jwks: Jwks = serde_json::from_str(testing::JWKS)?;

        assert_eq!(jwks.len(), 1);
        assert_eq!(jwks.keys()[0].key_id().as_str(), testing::TRUSTED_KEY_ID);
        assert!(logs_contain("ignoring unusable JWK"));
        Ok(())
    }

    #[test]
    fn finds_key_by_id_for_compatible_algorithm() -> Result<()> {
        let jwks: Jwks = serde_json::from_str(testing::JWKS)?;
        let kid = KeyId::from_static(testing::TRUSTED_KEY_ID);

        assert!(jwks.get_key_by_id(&kid, jwa::Algorithm::RS256).is_some());
        assert!(jwks.get_key_by_id(&kid, jwa::Algorithm::RS512).is_none());
        Ok(())
    }

    #[test]
    fn skipped_keys_cannot_be_found() -> Result<()> {
        let jwks: Jwks = serde_json::from_str(testing::JWKS)?;

        for kid in ["ec-key", "encryption-key", "unknown"] {
            let kid = KeyId::from_static(kid);
            assert!(jwks.get_key_by_id(&kid, jwa::Algorithm::RS256).is_none());
        }
        Ok(())
    }

    #[test]
    fn empty_document_yields_empty_set() -> Result<()> {
        let jwks: Jwks = serde_json::from_str(r#"{"keys":[]}"#)?;
        assert!(jwks.is_empty());
        Ok(())
    }

    #[test]
    fn document_without_keys_is_malformed() {
        assert!(serde_json::from_str::<Jwks>(r#"{"issuer":"nobody"}"#).is_err());
    }
}
