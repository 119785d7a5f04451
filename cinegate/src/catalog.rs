//! Permissions and roles of the casting agency API
//!
//! Roles are informational. Access is decided only by the `permissions`
//! claim a token carries; the identity provider is expected to grant each
//! role the permissions listed by [`Role::permissions`].

use std::fmt;

use crate::claims::PermissionRef;

macro_rules! permissions {
    ($($(#[$meta:meta])* $name:ident => $value:literal,)*) => {
        $(
            $(#[$meta])*
            pub const $name: &str = $value;
        )*

        /// Every permission of the casting agency API
        pub const ALL: &[&str] = &[$($name),*];
    };
}

permissions! {
    /// List movies
    GET_MOVIES => "get:movies",
    /// Create a movie
    POST_MOVIES => "post:movies",
    /// Update a movie
    PATCH_MOVIES => "patch:movies",
    /// Delete a movie
    DELETE_MOVIES => "delete:movies",
    /// List actors
    GET_ACTORS => "get:actors",
    /// Create an actor
    POST_ACTORS => "post:actors",
    /// Update an actor
    PATCH_ACTORS => "patch:actors",
    /// Delete an actor
    DELETE_ACTORS => "delete:actors",
}

/// A casting agency role
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum Role {
    /// Can view actors and movies
    CastingAssistant,
    /// Can also add or delete actors and modify actors or movies
    CastingDirector,
    /// Can also add or delete movies
    ExecutiveProducer,
}

impl Role {
    /// Every role, from least to most privileged
    pub const ALL: [Role; 3] = [
        Role::CastingAssistant,
        Role::CastingDirector,
        Role::ExecutiveProducer,
    ];

    /// The permissions the role is granted
    #[must_use]
    pub fn permissions(self) -> &'static [&'static str] {
        match self {
            Role::CastingAssistant => &[GET_ACTORS, GET_MOVIES],
            Role::CastingDirector => &[
                GET_ACTORS,
                GET_MOVIES,
                POST_ACTORS,
                DELETE_ACTORS,
                PATCH_ACTORS,
                PATCH_MOVIES,
            ],
            Role::ExecutiveProducer => ALL,
        }
    }

    /// Whether the role is granted `permission`
    #[must_use]
    pub fn grants(self, permission: &PermissionRef) -> bool {
        self.permissions()
            .iter()
            .any(|&p| p == permission.as_str())
    }

    /// The display name of the role
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Role::CastingAssistant => "Casting Assistant",
            Role::CastingDirector => "Casting Director",
            Role::ExecutiveProducer => "Executive Producer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
