use std::{net::SocketAddr, time::Duration};

use axum::{
    extract::Path,
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use cinegate::{
    catalog::{self, Role},
    jwa::Algorithm,
    jwt::{Audience, Issuer},
    AuthGateway, GatewayConfig,
};
use clap::Parser;
use color_eyre::Result;
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

mod permission {
    use cinegate::catalog;
    use cinegate_axum::permission_guards;

    permission_guards! {
        pub permission GetMovies = catalog::GET_MOVIES;
        pub permission PostMovies = catalog::POST_MOVIES;
        pub permission PatchMovies = catalog::PATCH_MOVIES;
        pub permission DeleteMovies = catalog::DELETE_MOVIES;
        pub permission GetActors = catalog::GET_ACTORS;
        pub permission PostActors = catalog::POST_ACTORS;
        pub permission PatchActors = catalog::PATCH_ACTORS;
        pub permission DeleteActors = catalog::DELETE_ACTORS;
    }
}

/// Casting agency API protected by an Auth0 tenant
#[derive(Debug, Parser)]
#[command(version)]
struct Opts {
    /// The Auth0 tenant domain, e.g. `example.auth0.com`
    #[arg(long, env = "AUTH0_DOMAIN")]
    auth_domain: Option<String>,

    /// The expected token issuer, overriding the one derived from the domain
    #[arg(long, env = "AUTH0_ISSUER")]
    issuer: Option<Issuer>,

    /// The audience tokens must be issued for
    #[arg(long, env = "API_AUDIENCE")]
    audience: Audience,

    /// The only accepted signing algorithm
    #[arg(long, env = "ALGORITHMS", default_value = "RS256")]
    algorithm: Algorithm,

    /// Fetch signing keys from this URL instead of the issuer's
    #[arg(long, env = "JWKS_URL")]
    jwks_url: Option<String>,

    /// Refresh the signing keys in the background this often, in seconds
    #[arg(long, env = "JWKS_REFRESH_INTERVAL")]
    refresh_interval: Option<u64>,

    /// Minimum time between key set fetches triggered by unknown key IDs, in
    /// seconds
    #[arg(long, env = "JWKS_REFRESH_COOLDOWN", default_value_t = 30)]
    refresh_cooldown: u64,

    /// Tolerated clock skew, in seconds
    #[arg(long, env = "TOKEN_LEEWAY", default_value_t = 0)]
    leeway: u64,

    /// Address to listen on
    #[arg(long, env = "LISTEN_ADDR", default_value = "127.0.0.1:8080")]
    listen: SocketAddr,
}

impl Opts {
    fn config(&self) -> GatewayConfig {
        let config = match &self.issuer {
            Some(issuer) => GatewayConfig::for_issuer(issuer.clone(), self.audience.clone()),
            None => GatewayConfig::for_domain(
                self.auth_domain.clone().unwrap_or_default(),
                self.audience.clone(),
            ),
        };

        let config = config
            .with_algorithm(self.algorithm)
            .with_leeway(Duration::from_secs(self.leeway))
            .with_refresh_cooldown(Duration::from_secs(self.refresh_cooldown));

        let config = match &self.jwks_url {
            Some(url) => config.with_jwks_url(url.clone()),
            None => config,
        };

        match self.refresh_interval {
            Some(secs) => config.with_refresh_interval(Duration::from_secs(secs)),
            None => config,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("cinegate=debug,casting_server=info,info")
        }))
        .init();

    let opts = Opts::parse();
    let config = opts.config();
    let gateway = AuthGateway::from_config(&config)?;

    if let Some(interval) = config.refresh_interval() {
        gateway.verifier().key_set().spawn_refresh(interval);
    }

    for role in Role::ALL {
        tracing::info!(%role, permissions = ?role.permissions(), "role");
    }

    let app = Router::new()
        .route("/movies", get(list_movies).post(create_movie))
        .route("/movies/:id", patch(update_movie).delete(delete_movie))
        .route("/actors", get(list_actors).post(create_actor))
        .route("/actors/:id", patch(update_actor).delete(delete_actor))
        .with_state(gateway);

    tracing::info!(addr = %opts.listen, "listening");
    let listener = tokio::net::TcpListener::bind(opts.listen).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}

async fn list_movies(_: permission::GetMovies) -> Json<Value> {
    Json(json!({
        "success": true,
        "movies": [{"id": 1, "title": "The Casting Call", "release_date": "2024-05-01"}],
    }))
}

async fn create_movie(
    guard: permission::PostMovies,
    Json(movie): Json<Value>,
) -> (StatusCode, Json<Value>) {
    tracing::info!(sub = ?guard.claims().subject(), permission = catalog::POST_MOVIES, "creating movie");
    (StatusCode::CREATED, Json(json!({"success": true, "movie": movie})))
}

async fn update_movie(
    _: permission::PatchMovies,
    Path(id): Path<u64>,
    Json(changes): Json<Value>,
) -> Json<Value> {
    Json(json!({"success": true, "id": id, "movie": changes}))
}

async fn delete_movie(_: permission::DeleteMovies, Path(id): Path<u64>) -> Json<Value> {
    Json(json!({"success": true, "delete": id}))
}

async fn list_actors(_: permission::GetActors) -> Json<Value> {
    Json(json!({
        "success": true,
        "actors": [{"id": 1, "name": "Ada Reyes", "age": 34, "gender": "F"}],
    }))
}

async fn create_actor(
    guard: permission::PostActors,
    Json(actor): Json<Value>,
) -> (StatusCode, Json<Value>) {
    tracing::info!(sub = ?guard.claims().subject(), permission = catalog::POST_ACTORS, "creating actor");
    (StatusCode::CREATED, Json(json!({"success": true, "actor": actor})))
}

async fn update_actor(
    _: permission::PatchActors,
    Path(id): Path<u64>,
    Json(changes): Json<Value>,
) -> Json<Value> {
    Json(json!({"success": true, "id": id, "actor": changes}))
}

async fn delete_actor(_: permission::DeleteActors, Path(id): Path<u64>) -> Json<Value> {
    Json(json!({"success": true, "delete": id}))
}
