//! Types used to assert that a presented token grants a required permission

/// Constructs an extractor that asserts the presented token grants a
/// permission
///
/// For a more concise way to construct several permission guards, see
/// [`permission_guards!`][crate::permission_guards!].
///
/// ```
/// use cinegate_axum::permission_guard;
///
/// permission_guard!(GetActors; "get:actors");
/// ```
///
/// A constant naming the permission works as well:
///
/// ```
/// use cinegate_axum::permission_guard;
///
/// permission_guard!(pub DeleteActors; cinegate::catalog::DELETE_ACTORS);
/// ```
///
/// The guard can then be used on an axum handler to assert that the request
/// carries a valid bearer token _and_ that the token grants the permission.
/// The [`AuthGateway`][cinegate::AuthGateway] is taken from the router state
/// through [`FromRef`][axum_core::extract::FromRef]. If an earlier layer has
/// already verified the token and placed the
/// [`ClaimSet`][cinegate::ClaimSet] in the request extensions, those claims
/// are checked instead.
///
/// ```
/// use cinegate_axum::permission_guard;
///
/// permission_guard!(GetActors; "get:actors");
///
/// async fn list_actors(GetActors(claims): GetActors) -> String {
///     format!("{:?} may list actors", claims.subject())
/// }
///
/// // Or ignore the claims if they aren't required
/// async fn count_actors(_: GetActors) -> &'static str {
///     "0"
/// }
/// ```
#[macro_export]
macro_rules! permission_guard {
    ($vis:vis $i:ident; $permission:literal) => {
        $crate::permission_guard!(@guard $vis $i; $permission; concat!("Requires the `", $permission, "` permission"));
    };
    ($vis:vis $i:ident; $permission:path) => {
        $crate::permission_guard!(@guard $vis $i; $permission; concat!("Requires the permission named by `", stringify!($permission), "`"));
    };
    (@guard $vis:vis $i:ident; $permission:expr; $doc:expr) => {
        #[doc = $doc]
        ///
        /// Rejects the request with the gateway's failure when the token is
        /// missing, invalid, or does not grant the permission.
        $vis struct $i($vis $crate::__private::ClaimSet);

        impl $i {
            #[allow(dead_code)]
            $vis fn into_claims(self) -> $crate::__private::ClaimSet {
                self.0
            }

            #[allow(dead_code)]
            $vis fn claims(&self) -> &$crate::__private::ClaimSet {
                &self.0
            }
        }

        impl $crate::EndpointPermission for $i {
            fn required_permission() -> &'static $crate::__private::PermissionRef {
                $crate::__private::PermissionRef::from_str($permission)
            }
        }

        #[::axum::async_trait]
        impl<S> ::axum::extract::FromRequestParts<S> for $i
        where
            S: Send + Sync,
            $crate::__private::AuthGateway: ::axum::extract::FromRef<S>,
        {
            type Rejection = $crate::AuthRejection;

            async fn from_request_parts(
                req: &mut ::axum::http::request::Parts,
                state: &S,
            ) -> Result<Self, Self::Rejection> {
                let gateway = <$crate::__private::AuthGateway as ::axum::extract::FromRef<S>>::from_ref(state);
                $crate::__private::authorize(
                    req,
                    &gateway,
                    <Self as $crate::EndpointPermission>::required_permission(),
                )
                .await
                .map(Self)
            }
        }
    };
}

/// Convenience macro for services that need to define many permission guards
///
/// # Example
///
/// ```
/// use cinegate_axum::permission_guards;
///
/// permission_guards! {
///     permission GetMovies = "get:movies";
///     permission PostMovies = "post:movies";
///     pub permission PatchMovies = cinegate::catalog::PATCH_MOVIES;
///     pub permission DeleteMovies = cinegate::catalog::DELETE_MOVIES;
/// }
/// ```
///
/// The above will define a guard type for each of the permissions, similar
/// to the [`permission_guard!`] macro. Each permission may be a string
/// literal or the path of a `&str` constant.
#[macro_export]
macro_rules! permission_guards {
    () => {};
    ($vis:vis permission $i:ident = $permission:literal $(; $($rest:tt)*)?) => {
        $crate::permission_guard!($vis $i; $permission);
        $($crate::permission_guards!($($rest)*);)?
    };
    ($vis:vis permission $i:ident = $permission:path $(; $($rest:tt)*)?) => {
        $crate::permission_guard!($vis $i; $permission);
        $($crate::permission_guards!($($rest)*);)?
    };
}
