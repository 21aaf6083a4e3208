use crate::config::TmdbConfig;
use crate::models::{Movie, MovieDetails};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub const POSTER_SIZE: &str = "w500";
pub const BACKDROP_SIZE: &str = "w1280";
pub const PLACEHOLDER_IMAGE: &str = "/placeholder.svg?height=750&width=500&text=No+Image";

#[derive(Debug, Error)]
pub enum TmdbError {
    #[error("TMDB API key is not configured. Please add TMDB_API_KEY to your .env file.")]
    MissingApiKey,

    #[error("Invalid API key. Please check your TMDB API key.")]
    InvalidApiKey { status: u16 },

    #[error("Failed to fetch data: {reason}")]
    Http { status: u16, reason: String },

    #[error("Network error occurred")]
    Network(#[source] reqwest::Error),

    #[error("Network error occurred")]
    Decode(#[source] serde_json::Error),
}

/// Coarse grouping shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MissingCredential,
    InvalidCredential,
    Failure,
}

impl TmdbError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TmdbError::MissingApiKey => ErrorKind::MissingCredential,
            TmdbError::InvalidApiKey { .. } => ErrorKind::InvalidCredential,
            _ => ErrorKind::Failure,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            TmdbError::InvalidApiKey { status } | TmdbError::Http { status, .. } => Some(*status),
            TmdbError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_credential_problem(&self) -> bool {
        self.kind() != ErrorKind::Failure
    }

    /// Maps a non-success HTTP status to the matching error.
    pub fn from_status(status: StatusCode) -> Self {
        if status == StatusCode::UNAUTHORIZED {
            return TmdbError::InvalidApiKey {
                status: status.as_u16(),
            };
        }
        TmdbError::Http {
            status: status.as_u16(),
            reason: status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| status.as_u16().to_string()),
        }
    }
}

#[async_trait]
pub trait TmdbApi: Send + Sync {
    async fn trending_movies(&self) -> Result<Vec<Movie>, TmdbError>;
    async fn popular_movies(&self) -> Result<Vec<Movie>, TmdbError>;
    async fn movie_details(&self, id: i64) -> Result<MovieDetails, TmdbError>;
}

#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    results: Vec<Movie>,
}

impl TmdbClient {
    pub fn new(config: &TmdbConfig) -> Result<Self, TmdbError> {
        let user_agent = format!("cinescope/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .build()
            .map_err(TmdbError::Network)?;
        Ok(Self {
            client,
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, TmdbError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(TmdbError::MissingApiKey);
        };
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("GET {}", url);
        let res = self
            .client
            .get(&url)
            .query(&[("api_key", api_key)])
            .send()
            .await
            .map_err(|e| {
                warn!("TMDB request to {} failed: {}", endpoint, e);
                TmdbError::Network(e.without_url())
            })?;
        let status = res.status();
        if !status.is_success() {
            warn!("TMDB {} returned {}", endpoint, status);
            return Err(TmdbError::from_status(status));
        }
        let text = res.text().await.map_err(|e| TmdbError::Network(e.without_url()))?;
        serde_json::from_str(&text).map_err(|e| {
            warn!("TMDB {} returned an unexpected body: {}", endpoint, e);
            TmdbError::Decode(e)
        })
    }
}

#[async_trait]
impl TmdbApi for TmdbClient {
    async fn trending_movies(&self) -> Result<Vec<Movie>, TmdbError> {
        let data: ListResponse = self.get_json("/trending/movie/week").await?;
        Ok(data.results)
    }

    async fn popular_movies(&self) -> Result<Vec<Movie>, TmdbError> {
        let data: ListResponse = self.get_json("/movie/popular").await?;
        Ok(data.results)
    }

    async fn movie_details(&self, id: i64) -> Result<MovieDetails, TmdbError> {
        self.get_json(&format!("/movie/{id}")).await
    }
}

/// Full image URL for a TMDB file path, or the local placeholder.
pub fn image_url(image_base: &str, path: Option<&str>, size: &str) -> String {
    match path.filter(|p| !p.is_empty()) {
        Some(p) => format!("{}/{}{}", image_base.trim_end_matches('/'), size, p),
        None => PLACEHOLDER_IMAGE.to_string(),
    }
}

pub fn parse_movie_id(input: &str) -> Option<i64> {
    let trimmed = input.trim();
    if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
        return trimmed.parse().ok();
    }
    None
}
