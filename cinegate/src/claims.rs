//! The verified body of a bearer token

use std::slice;

use aliri_braid::braid;
use serde::{de::DeserializeOwned, Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::{
    clock::UnixTime,
    error,
    jwt::{Audiences, Issuer, IssuerRef, Subject, SubjectRef},
};

/// A single permission, such as `get:movies`
///
/// Permissions are compared by exact string equality.
#[braid(serde, ref_doc = "A borrowed reference to a [`Permission`]")]
pub struct Permission;

/// The permissions granted to the bearer of a token, in the order the token
/// lists them
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permissions(Vec<Permission>);

impl Permissions {
    /// An empty permission list
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Whether `permission` is granted
    #[must_use]
    pub fn contains(&self, permission: &PermissionRef) -> bool {
        self.0.iter().any(|granted| **granted == *permission)
    }

    /// Appends a permission
    pub fn push(&mut self, permission: Permission) {
        self.0.push(permission);
    }

    /// The number of entries, duplicates included
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no permission is granted
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the granted permissions in token order
    pub fn iter(&self) -> slice::Iter<'_, Permission> {
        self.0.iter()
    }
}

impl FromIterator<Permission> for Permissions {
    fn from_iter<T: IntoIterator<Item = Permission>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Permissions {
    type Item = &'a Permission;
    type IntoIter = slice::Iter<'a, Permission>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// The decoded body of a token that passed verification
///
/// The body is kept verbatim: every claim is available through
/// [`ClaimSet::claim`], and serializing a claim set reproduces the token body
/// exactly. Registered claims are also decoded into typed accessors.
#[derive(Clone, Debug, PartialEq)]
pub struct ClaimSet {
    iss: Option<Issuer>,
    aud: Audiences,
    exp: Option<UnixTime>,
    nbf: Option<UnixTime>,
    iat: Option<UnixTime>,
    sub: Option<Subject>,
    permissions: Option<Permissions>,
    body: Map<String, Value>,
}

impl ClaimSet {
    /// The `iss` claim
    #[must_use]
    pub fn issuer(&self) -> Option<&IssuerRef> {
        self.iss.as_deref()
    }

    /// The `aud` claim
    #[must_use]
    pub fn audiences(&self) -> &Audiences {
        &self.aud
    }

    /// The `exp` claim
    #[must_use]
    pub fn expiration(&self) -> Option<UnixTime> {
        self.exp
    }

    /// The `nbf` claim
    #[must_use]
    pub fn not_before(&self) -> Option<UnixTime> {
        self.nbf
    }

    /// The `iat` claim
    #[must_use]
    pub fn issued_at(&self) -> Option<UnixTime> {
        self.iat
    }

    /// The `sub` claim
    #[must_use]
    pub fn subject(&self) -> Option<&SubjectRef> {
        self.sub.as_deref()
    }

    /// The `permissions` claim, or `None` if the token does not carry one
    #[must_use]
    pub fn permissions(&self) -> Option<&Permissions> {
        self.permissions.as_ref()
    }

    /// Any claim, by name, exactly as the token carries it
    #[must_use]
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.body.get(name)
    }

    /// Decodes the registered claims of a token body
    ///
    /// Not public: a claim set only comes out of signature verification.
    pub(crate) fn from_body(body: Map<String, Value>) -> Result<Self, error::MistypedClaim> {
        Ok(Self {
            iss: registered(&body, "iss")?,
            aud: registered(&body, "aud")?.unwrap_or_default(),
            exp: registered(&body, "exp")?,
            nbf: registered(&body, "nbf")?,
            iat: registered(&body, "iat")?,
            sub: registered(&body, "sub")?,
            permissions: registered(&body, "permissions")?,
            body,
        })
    }
}

// A `null` claim is treated as absent.
fn registered<T: DeserializeOwned>(
    body: &Map<String, Value>,
    name: &'static str,
) -> Result<Option<T>, error::MistypedClaim> {
    match body.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => T::deserialize(value)
            .map(Some)
            .map_err(|err| error::mistyped_claim(name, err)),
    }
}

impl Serialize for ClaimSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.body.serialize(serializer)
    }
}

#[cfg(test)]
impl ClaimSet {
    pub(crate) fn from_json(value: Value) -> color_eyre::Result<Self> {
        Ok(Self::from_body(serde_json::from_value(value)?)?)
    }
}

#[cfg(test)]
mod tests {
    use color_eyre::Result;
    use serde_json::json;

    use super::*;
    use crate::jwt::AudienceRef;

    #[test]
    fn reads_registered_claims_and_permissions() -> Result<()> {
        let claims = ClaimSet::from_json(json!({
            "iss": "https://example.auth0.com/",
            "aud": "api",
            "exp": 1_700_000_600,
            "iat": 1_700_000_000,
            "sub": "auth0|actor",
            "permissions": ["get:movies", "get:actors", "get:movies"],
        }))?;

        assert_eq!(
            claims.issuer().map(IssuerRef::as_str),
            Some("https://example.auth0.com/")
        );
        assert!(claims.audiences().contains(AudienceRef::from_str("api")));
        assert_eq!(claims.expiration(), Some(UnixTime(1_700_000_600)));
        assert_eq!(claims.not_before(), None);
        assert_eq!(claims.subject().map(SubjectRef::as_str), Some("auth0|actor"));

        let permissions: Vec<&str> = claims
            .permissions()
            .into_iter()
            .flatten()
            .map(|p| p.as_str())
            .collect();
        assert_eq!(permissions, ["get:movies", "get:actors", "get:movies"]);
        Ok(())
    }

    #[test]
    fn absent_permissions_differ_from_empty_permissions() -> Result<()> {
        let absent = ClaimSet::from_json(json!({"sub": "a"}))?;
        let empty = ClaimSet::from_json(json!({"sub": "a", "permissions": []}))?;

        assert!(absent.permissions().is_none());
        assert!(empty.permissions().is_some_and(Permissions::is_empty));
        Ok(())
    }

    #[test]
    fn serializes_back_to_the_original_body() -> Result<()> {
        let body = json!({
            "iss": "https://example.auth0.com/",
            "aud": ["api", "https://example.auth0.com/userinfo"],
            "exp": 1_700_000_600.5,
            "azp": "client-id",
            "scope": "openid profile",
            "permissions": ["patch:movies", "get:movies", "delete:actors", "get:movies"],
        });

        let claims = ClaimSet::from_json(body.clone())?;
        assert_eq!(claims.claim("azp"), Some(&json!("client-id")));
        assert_eq!(claims.expiration(), Some(UnixTime(1_700_000_600)));
        assert_eq!(serde_json::to_value(&claims)?, body);
        Ok(())
    }

    #[test]
    fn null_claims_are_absent() -> Result<()> {
        let claims = ClaimSet::from_json(json!({"nbf": null, "permissions": null}))?;

        assert_eq!(claims.not_before(), None);
        assert!(claims.permissions().is_none());
        Ok(())
    }

    #[test]
    fn mistyped_registered_claims_are_named() -> Result<()> {
        let cases = [
            ("exp", json!({"exp": "soon"})),
            ("nbf", json!({"nbf": -1})),
            ("iss", json!({"iss": 42})),
            ("aud", json!({"aud": {"name": "api"}})),
            ("sub", json!({"sub": ["a", "b"]})),
            ("permissions", json!({"permissions": "get:movies"})),
            ("permissions", json!({"permissions": [1, 2]})),
        ];

        for (name, body) in cases {
            let body = serde_json::from_value(body)?;
            let err = ClaimSet::from_body(body).unwrap_err();
            assert_eq!(err.name(), name);
        }
        Ok(())
    }
}
