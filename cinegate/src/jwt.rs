//! Compact JSON Web Tokens and the claims they carry
//!
//! A token moves through three stages, each of which can only be reached from
//! the previous one:
//!
//! 1. [`JwtRef::decompose`] splits the token and decodes its header.
//! 2. [`Decomposed::verify`] checks the signature with a [`Jwk`].
//! 3. [`Verified::claims`] decodes the payload.
//!
//! Claims are therefore never inspected before the signature has been
//! checked. The standard is described in [RFC7519][].
//!
//! [RFC7519]: https://tools.ietf.org/html/rfc7519

use std::fmt;

use aliri_braid::braid;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{b64, error, jwa::Algorithm, jwk::KeyId, jwk::KeyIdRef, Jwk};

/// An audience
#[braid(serde, ref_doc = "A borrowed reference to an [`Audience`]")]
pub struct Audience;

/// An issuer of JWTs
#[braid(serde, ref_doc = "A borrowed reference to an [`Issuer`]")]
pub struct Issuer;

/// The subject of a JWT
#[braid(serde, ref_doc = "A borrowed reference to a [`Subject`]")]
pub struct Subject;

/// A JSON Web Token in compact serialization
///
/// `Debug` and `Display` hide the token unless the alternate format is
/// requested. See the implementations on [`JwtRef`].
#[braid(
    serde,
    debug = "owned",
    display = "owned",
    ord = "omit",
    ref_doc = "\
    A borrowed reference to a JSON Web Token ([`Jwt`])\n\
    \n\
    `Debug` and `Display` hide the token unless the alternate format is requested."
)]
#[must_use]
pub struct Jwt;

const REDACTED: &str = "***JWT***";

/// Prints a placeholder. The alternate form, `{:#?}`, prints the header and
/// payload but never the signature.
///
/// ```
/// # use cinegate::jwt::JwtRef;
/// let token = JwtRef::from_str("eyJhbGciOiJSUzI1NiJ9.e30.c2lnbmF0dXJl");
///
/// assert_eq!(format!("{:?}", token), "***JWT***");
/// assert_eq!(format!("{:#?}", token), "\"eyJhbGciOiJSUzI1NiJ9.e30.…\"");
/// ```
impl fmt::Debug for JwtRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if !f.alternate() {
            return f.write_str(REDACTED);
        }

        match self.0.rfind('.') {
            Some(last_period) => write!(f, "\"{}…\"", &self.0[..=last_period]),
            None => f.write_str("\"…\""),
        }
    }
}

/// Prints a placeholder. The alternate form, `{:#}`, prints the whole token.
///
/// ```
/// # use cinegate::jwt::JwtRef;
/// let token = JwtRef::from_str("eyJhbGciOiJSUzI1NiJ9.e30.c2lnbmF0dXJl");
///
/// assert_eq!(format!("{}", token), "***JWT***");
/// assert_eq!(format!("{:#}", token), "eyJhbGciOiJSUzI1NiJ9.e30.c2lnbmF0dXJl");
/// ```
impl fmt::Display for JwtRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if f.alternate() {
            f.write_str(&self.0)
        } else {
            f.write_str(REDACTED)
        }
    }
}

/// The JOSE header of a token
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kid: Option<KeyId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
}

impl Header {
    /// Constructs a header for `alg`, typed as a JWT
    #[must_use]
    pub fn new(alg: Algorithm) -> Self {
        Self {
            alg: alg.name().to_owned(),
            kid: None,
            typ: Some("JWT".to_owned()),
        }
    }

    /// Sets the key ID
    #[must_use]
    pub fn with_key_id(self, kid: KeyId) -> Self {
        Self {
            kid: Some(kid),
            ..self
        }
    }

    /// The algorithm name exactly as the token declares it
    #[must_use]
    pub fn alg_name(&self) -> &str {
        &self.alg
    }

    /// The declared algorithm, if it is a supported one
    pub fn algorithm(&self) -> Result<Algorithm, error::UnknownAlgorithm> {
        self.alg.parse()
    }

    /// The key ID, if declared
    #[must_use]
    pub fn kid(&self) -> Option<&KeyIdRef> {
        self.kid.as_deref()
    }

    /// The media type, if declared
    #[must_use]
    pub fn typ(&self) -> Option<&str> {
        self.typ.as_deref()
    }
}

/// A token split into its sections, with the header decoded but not yet
/// trusted
#[derive(Debug)]
#[must_use]
pub struct Decomposed<'a> {
    header: Header,
    message: &'a str,
    payload: &'a str,
    signature: Vec<u8>,
}

impl<'a> Decomposed<'a> {
    /// The header, which has not been authenticated yet
    #[must_use]
    pub fn untrusted_header(&self) -> &Header {
        &self.header
    }

    /// Checks the signature over the header and payload with `key`
    pub fn verify(self, key: &Jwk, alg: Algorithm) -> Result<Verified<'a>, error::SignatureMismatch> {
        key.verify(alg, self.message.as_bytes(), &self.signature)?;

        Ok(Verified {
            header: self.header,
            payload: self.payload,
        })
    }
}

/// A token whose signature has been checked
#[derive(Debug)]
#[must_use]
pub struct Verified<'a> {
    header: Header,
    payload: &'a str,
}

impl Verified<'_> {
    /// The authenticated header
    #[must_use]
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Decodes the payload into the requested claims type
    pub fn claims<C: DeserializeOwned>(&self) -> Result<C, error::MalformedJwt> {
        let raw = b64::decode(self.payload).map_err(|e| error::MalformedJwt::Payload(e.into()))?;
        serde_json::from_slice(&raw).map_err(|e| error::MalformedJwt::Payload(e.into()))
    }
}

impl JwtRef {
    /// Splits the token into its three sections and decodes the header
    pub fn decompose(&self) -> Result<Decomposed<'_>, error::MalformedJwt> {
        let mut sections = self.0.split('.');
        let (header, payload, signature) =
            match (sections.next(), sections.next(), sections.next(), sections.next()) {
                (Some(h), Some(p), Some(s), None) => (h, p, s),
                _ => return Err(error::MalformedJwt::Sections),
            };

        let raw_header = b64::decode(header).map_err(|e| error::MalformedJwt::Header(e.into()))?;
        let header_data: Header =
            serde_json::from_slice(&raw_header).map_err(|e| error::MalformedJwt::Header(e.into()))?;

        let signature = b64::decode(signature).map_err(error::MalformedJwt::Signature)?;

        Ok(Decomposed {
            header: header_data,
            message: &self.0[..header.len() + 1 + payload.len()],
            payload,
            signature,
        })
    }
}

/// The audience claim, which identity providers emit as either a single
/// string or an array
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "OneOrMany<Audience>", into = "OneOrMany<Audience>")]
pub struct Audiences(Vec<Audience>);

impl Audiences {
    /// An empty set of audiences
    #[must_use]
    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    /// Whether no audience is present
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `aud` is one of the audiences
    #[must_use]
    pub fn contains(&self, aud: &AudienceRef) -> bool {
        self.0.iter().any(|a| &**a == aud)
    }

    /// Iterates over the audiences
    pub fn iter(&self) -> impl Iterator<Item = &AudienceRef> {
        self.0.iter().map(|a| &**a)
    }
}

impl From<Audience> for Audiences {
    fn from(aud: Audience) -> Self {
        Self(vec![aud])
    }
}

impl From<Vec<Audience>> for Audiences {
    fn from(auds: Vec<Audience>) -> Self {
        Self(auds)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl From<OneOrMany<Audience>> for Audiences {
    fn from(value: OneOrMany<Audience>) -> Self {
        match value {
            OneOrMany::One(aud) => Self(vec![aud]),
            OneOrMany::Many(auds) => Self(auds),
        }
    }
}

impl From<Audiences> for OneOrMany<Audience> {
    fn from(mut value: Audiences) -> Self {
        if value.0.len() == 1 {
            Self::One(value.0.remove(0))
        } else {
            Self::Many(value.0)
        }
    }
}
