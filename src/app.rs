use crate::config::Config;
use crate::favorites::{FavoritesStore, LoadOutcome};
use crate::models::Movie;
use crate::storage::FileStorage;
use crate::tmdb::{self, TmdbApi, TmdbClient, TmdbError};
use crate::views::{self, ErrorPanel, HomeView, PageContext};
use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect},
    routing::{get, post},
    Form, Json, Router,
};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{error, info, warn};

const MAX_BODY_BYTES: usize = 16 * 1024; // toggle forms are tiny

#[derive(Clone)]
pub struct AppState {
    pub tmdb: Arc<dyn TmdbApi>,
    pub favorites: Arc<Mutex<FavoritesStore>>,
    pub image_base: String,
}

impl AppState {
    pub fn new(tmdb: Arc<dyn TmdbApi>, favorites: FavoritesStore, image_base: &str) -> Self {
        Self {
            tmdb,
            favorites: Arc::new(Mutex::new(favorites)),
            image_base: image_base.to_string(),
        }
    }
}

/// A movie summary posted by the heart button on a card or detail page.
#[derive(Debug, Deserialize)]
pub struct ToggleForm {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub vote_count: u64,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub return_to: Option<String>,
}

impl ToggleForm {
    fn into_movie(self) -> Result<(Movie, String), &'static str> {
        let return_to = local_path(self.return_to.as_deref());
        let movie = Movie {
            id: self.id,
            title: self.title,
            poster_path: self.poster_path.filter(|p| !p.is_empty()),
            vote_average: self.vote_average,
            vote_count: self.vote_count,
            release_date: self.release_date.filter(|d| !d.is_empty()),
        };
        if !movie.has_valid_rating() {
            return Err("vote_average must be a number between 0 and 10");
        }
        Ok((movie, return_to))
    }
}

pub async fn run_server(config: Config) -> Result<()> {
    let storage = Arc::new(FileStorage::new(&config.favorites_dir));
    let mut favorites = FavoritesStore::new(storage);
    match favorites.load() {
        LoadOutcome::Degraded(e) => warn!("Starting with no favorites: {}", e),
        outcome => info!("Favorites ready ({} movies): {:?}", favorites.len(), outcome),
    }

    let tmdb: Arc<dyn TmdbApi> = Arc::new(TmdbClient::new(&config.tmdb)?);
    let state = AppState::new(tmdb, favorites, &config.tmdb.image_base_url);
    let app = build_router(state);

    info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/movie/:id", get(movie_detail))
        .route("/favorites/toggle", post(toggle_favorite))
        .route("/api/favorites", get(list_favorites))
        .route("/placeholder.svg", get(placeholder))
        .route("/health", get(health))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

async fn home(State(state): State<AppState>) -> Html<String> {
    let (trending, recommended) =
        tokio::join!(state.tmdb.trending_movies(), state.tmdb.popular_movies());
    if let Err(e) = &trending {
        warn!("Failed to fetch trending movies: {}", e);
    }
    if let Err(e) = &recommended {
        warn!("Failed to fetch recommended movies: {}", e);
    }

    let store = state.favorites.lock().await;
    let ctx = PageContext {
        image_base: &state.image_base,
        favorite_ids: favorite_ids(&store),
        return_to: "/",
    };
    let view = HomeView {
        trending: &trending,
        recommended: &recommended,
        favorites: store.is_loaded().then(|| store.favorites()),
    };
    Html(views::render_home(&view, &ctx))
}

async fn movie_detail(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> (StatusCode, Html<String>) {
    const ERROR_TITLE: &str = "Failed to load movie details";

    let Some(id) = tmdb::parse_movie_id(&raw_id) else {
        warn!("Rejecting detail request for non-numeric id '{}'", raw_id);
        let panel = ErrorPanel {
            title: ERROR_TITLE,
            message: "Movie not found".to_string(),
            api_key_note: false,
            retry_href: None,
        };
        return (StatusCode::NOT_FOUND, Html(views::render_details_error(&panel)));
    };

    let return_to = format!("/movie/{id}");
    match state.tmdb.movie_details(id).await {
        Ok(details) => {
            let store = state.favorites.lock().await;
            let ctx = PageContext {
                image_base: &state.image_base,
                favorite_ids: favorite_ids(&store),
                return_to: &return_to,
            };
            (StatusCode::OK, Html(views::render_details(&details, &ctx)))
        }
        Err(e) => {
            warn!("Failed to fetch details for movie {}: {}", id, e);
            let status = detail_error_status(&e);
            let panel = ErrorPanel::from_tmdb(ERROR_TITLE, &e, &return_to);
            (status, Html(views::render_details_error(&panel)))
        }
    }
}

async fn toggle_favorite(
    State(state): State<AppState>,
    Form(form): Form<ToggleForm>,
) -> Result<Redirect, (StatusCode, &'static str)> {
    let (movie, return_to) = form.into_movie().map_err(|msg| {
        warn!("Rejecting favorite toggle: {}", msg);
        (StatusCode::BAD_REQUEST, msg)
    })?;
    let id = movie.id;

    // Storage writes are blocking file I/O.
    let favorites = state.favorites.clone();
    let toggled = tokio::task::spawn_blocking(move || favorites.blocking_lock().toggle(movie))
        .await
        .map_err(|e| {
            error!("Favorite toggle task failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "favorite toggle failed")
        })?;
    if let Some(e) = toggled.persistence.error() {
        // The toggle still counts; only durability is lost.
        error!("Favorite {} toggled but not saved: {}", id, e);
    }
    info!(
        "Movie {} is {} a favorite",
        id,
        if toggled.favorite { "now" } else { "no longer" }
    );
    Ok(Redirect::to(&return_to))
}

async fn list_favorites(State(state): State<AppState>) -> Json<Vec<Movie>> {
    let store = state.favorites.lock().await;
    Json(store.favorites().to_vec())
}

async fn placeholder() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "image/svg+xml")],
        views::placeholder_svg(),
    )
}

fn favorite_ids(store: &FavoritesStore) -> HashSet<i64> {
    store.favorites().iter().map(|m| m.id).collect()
}

fn detail_error_status(err: &TmdbError) -> StatusCode {
    match err.status() {
        Some(404) => StatusCode::NOT_FOUND,
        _ if err.is_credential_problem() => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::BAD_GATEWAY,
    }
}

/// Only same-site paths are valid redirect targets.
fn local_path(candidate: Option<&str>) -> String {
    match candidate {
        Some(p) if p.starts_with('/') && !p.starts_with("//") && !p.contains('\\') => {
            p.to_string()
        }
        _ => "/".to_string(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirects_stay_on_site() {
        assert_eq!(local_path(Some("/movie/5")), "/movie/5");
        assert_eq!(local_path(Some("//evil.example")), "/");
        assert_eq!(local_path(Some("https://evil.example")), "/");
        assert_eq!(local_path(Some("/\\evil.example")), "/");
        assert_eq!(local_path(None), "/");
    }

    #[test]
    fn toggle_form_blanks_become_none() {
        let form = ToggleForm {
            id: 3,
            title: "Up".to_string(),
            poster_path: Some(String::new()),
            vote_average: 8.0,
            vote_count: 12,
            release_date: Some(String::new()),
            return_to: Some("/movie/3".to_string()),
        };
        let (movie, return_to) = form.into_movie().unwrap();
        assert_eq!(movie.poster_path, None);
        assert_eq!(movie.release_date, None);
        assert_eq!(return_to, "/movie/3");
    }

    #[test]
    fn toggle_form_rejects_ratings_off_scale() {
        for vote_average in [f64::NAN, f64::INFINITY, 11.0, -0.5] {
            let form = ToggleForm {
                id: 7,
                title: "Seven".to_string(),
                poster_path: None,
                vote_average,
                vote_count: 0,
                release_date: None,
                return_to: None,
            };
            assert!(form.into_movie().is_err());
        }
    }

    #[test]
    fn detail_errors_map_to_statuses() {
        assert_eq!(
            detail_error_status(&TmdbError::Http {
                status: 404,
                reason: "Not Found".to_string()
            }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            detail_error_status(&TmdbError::MissingApiKey),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            detail_error_status(&TmdbError::Http {
                status: 500,
                reason: "Internal Server Error".to_string()
            }),
            StatusCode::BAD_GATEWAY
        );
    }
}
