//! Permission checks on verified claims

use crate::{claims::PermissionRef, error::AuthFailure, ClaimSet};

/// Ensures `claims` grant `required`
///
/// # Errors
///
/// * `invalid_claims` (400) if the token carries no `permissions` claim at all
/// * `unauthorized` (403) if the claim is present but lacks `required`
pub fn check(claims: &ClaimSet, required: &PermissionRef) -> Result<(), AuthFailure> {
    let granted = claims.permissions().ok_or_else(|| {
        tracing::debug!(%required, "token carries no permissions claim");
        AuthFailure::permissions_missing()
    })?;

    if granted.contains(required) {
        Ok(())
    } else {
        tracing::debug!(%required, granted = granted.len(), "required permission not granted");
        Err(AuthFailure::permission_not_found())
    }
}
