//! Fixtures for exercising the gateway without an identity provider
//!
//! Two RSA key pairs are bundled. The `trusted` key is published in
//! [`JWKS`] under [`TRUSTED_KEY_ID`]; the `rogue` key is published only in
//! [`ROTATED_JWKS`] under [`ROTATED_KEY_ID`], so it doubles as a key the
//! gateway does not trust and as the replacement in key rotation scenarios.
//!
//! Tokens are minted with `ring`. Nothing here is meant for production use.

#![allow(missing_docs)]

use std::sync::Arc;

use ring::{
    rand::SystemRandom,
    signature::{self, RsaKeyPair},
};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::{
    b64,
    clock::UnixTime,
    error,
    jwa::Algorithm,
    jwk::KeyId,
    jwt::{Audience, Header, Issuer, Jwt},
    AuthGateway, Jwk, Jwks, KeySetCache, TokenVerifier,
};

pub const JWKS: &str = include_str!("../data/rsa/jwks.json");
pub const ROTATED_JWKS: &str = include_str!("../data/rsa/jwks-rotated.json");

pub const TRUSTED_KEY_ID: &str = "trusted-key";
pub const ROTATED_KEY_ID: &str = "rogue-key";

const TRUSTED_PRIVATE_KEY: &[u8] = include_bytes!("../data/rsa/trusted.pk8");
const ROGUE_PRIVATE_KEY: &[u8] = include_bytes!("../data/rsa/rogue.pk8");

pub const ISSUER: &str = "https://example.auth0.com/";
pub const AUDIENCE: &str = "api";
pub const SUBJECT: &str = "auth0|casting-test";

/// The instant test tokens are issued at
pub const NOW: UnixTime = UnixTime(1_700_000_000);
/// How long test tokens stay valid after [`NOW`]
pub const TOKEN_LIFETIME: u64 = 3600;

/// Which bundled private key signs a token
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signer {
    Trusted,
    Rogue,
}

/// A fixture could not be produced
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("bundled private key was rejected: {0}")]
    PrivateKey(String),
    #[error("signing failed")]
    Signing,
    #[error(transparent)]
    PublicKey(#[from] error::KeyRejected),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn key_pair(signer: Signer) -> Result<RsaKeyPair, FixtureError> {
    let der = match signer {
        Signer::Trusted => TRUSTED_PRIVATE_KEY,
        Signer::Rogue => ROGUE_PRIVATE_KEY,
    };
    RsaKeyPair::from_pkcs8(der).map_err(|e| FixtureError::PrivateKey(e.to_string()))
}

/// Signs `message` with the chosen private key
pub fn sign(signer: Signer, alg: Algorithm, message: &[u8]) -> Result<Vec<u8>, FixtureError> {
    let encoding: &'static dyn signature::RsaEncoding = match alg {
        Algorithm::RS256 => &signature::RSA_PKCS1_SHA256,
        Algorithm::RS384 => &signature::RSA_PKCS1_SHA384,
        Algorithm::RS512 => &signature::RSA_PKCS1_SHA512,
        Algorithm::PS256 => &signature::RSA_PSS_SHA256,
        Algorithm::PS384 => &signature::RSA_PSS_SHA384,
        Algorithm::PS512 => &signature::RSA_PSS_SHA512,
    };

    let key_pair = key_pair(signer)?;
    let mut signature = vec![0; key_pair.public().modulus_len()];
    key_pair
        .sign(encoding, &SystemRandom::new(), message, &mut signature)
        .map_err(|_| FixtureError::Signing)?;
    Ok(signature)
}

/// A header for `RS256` naming `kid`
pub fn header(kid: &'static str) -> Header {
    Header::new(Algorithm::RS256).with_key_id(KeyId::from_static(kid))
}

/// A payload accepted by [`verifier`] at [`NOW`], granting `permissions`
pub fn claims(permissions: &[&str]) -> Value {
    json!({
        "iss": ISSUER,
        "aud": AUDIENCE,
        "sub": SUBJECT,
        "iat": NOW.0,
        "exp": NOW.0 + TOKEN_LIFETIME,
        "permissions": permissions,
    })
}

/// Mints a compact token over an arbitrary header and payload
///
/// The signature algorithm follows the header's `alg` when it names an RSA
/// algorithm and falls back to `RS256` otherwise, so headers declaring
/// unsupported algorithms still produce a well-formed token.
pub fn mint<H, P>(signer: Signer, header: &H, payload: &P) -> Result<Jwt, FixtureError>
where
    H: Serialize,
    P: Serialize,
{
    mint_raw(signer, header, &serde_json::to_vec(payload)?)
}

/// Mints a compact token whose payload section holds `payload` verbatim
pub fn mint_raw<H: Serialize>(
    signer: Signer,
    header: &H,
    payload: &[u8],
) -> Result<Jwt, FixtureError> {
    let header = serde_json::to_value(header)?;
    let alg = header
        .get("alg")
        .and_then(Value::as_str)
        .and_then(|alg| alg.parse().ok())
        .unwrap_or(Algorithm::RS256);

    let message = format!(
        "{}.{}",
        b64::encode(serde_json::to_vec(&header)?),
        b64::encode(payload)
    );
    let signature = sign(signer, alg, message.as_bytes())?;

    Ok(Jwt::new(format!("{message}.{}", b64::encode(signature))))
}

/// A token from the trusted key, valid at [`NOW`], granting `permissions`
pub fn token(permissions: &[&str]) -> Result<Jwt, FixtureError> {
    mint(Signer::Trusted, &header(TRUSTED_KEY_ID), &claims(permissions))
}

/// The `n` parameter of the trusted public key
#[must_use]
pub fn trusted_modulus() -> String {
    serde_json::from_str::<Value>(JWKS)
        .ok()
        .and_then(|jwks| jwks["keys"][0]["n"].as_str().map(ToOwned::to_owned))
        .unwrap_or_default()
}

/// The trusted public key, restricted to `RS256` as published
pub fn trusted_jwk() -> Result<Jwk, FixtureError> {
    let jwks: Jwks = serde_json::from_str(JWKS)?;
    Ok(jwks.keys()[0].clone())
}

/// The trusted public key without an algorithm restriction
pub fn trusted_jwk_unrestricted() -> Result<Jwk, FixtureError> {
    let modulus = b64::decode(&trusted_modulus())
        .map_err(|e| error::key_rejected_by("malformed key modulus", e))?;
    Ok(Jwk::from_components(
        KeyId::from_static(TRUSTED_KEY_ID),
        &modulus,
        &[1, 0, 1],
    )?)
}

/// A static key cache over [`JWKS`]
pub fn key_set() -> Result<KeySetCache, FixtureError> {
    Ok(KeySetCache::from_jwks(serde_json::from_str(JWKS)?))
}

/// A verifier over [`key_set`] expecting [`ISSUER`] and [`AUDIENCE`], with
/// its clock fixed at [`NOW`]
pub fn verifier() -> Result<TokenVerifier, FixtureError> {
    Ok(TokenVerifier::new(
        key_set()?,
        Issuer::from_static(ISSUER),
        Audience::from_static(AUDIENCE),
    )
    .with_clock(Arc::new(crate::clock::TestClock::new(NOW))))
}

/// A gateway over [`verifier`]
pub fn gateway() -> Result<AuthGateway, FixtureError> {
    Ok(AuthGateway::new(verifier()?))
}
