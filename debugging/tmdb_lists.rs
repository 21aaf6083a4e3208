//! Fetch TMDB lists or a movie's details and print them as JSON.
//! Usage:
//!   cargo run --bin tmdb_lists -- trending
//!   cargo run --bin tmdb_lists -- popular
//!   cargo run --bin tmdb_lists -- movie <tmdb_id>
//! Requires TMDB_API_KEY in the environment (.env supported).

use anyhow::{Context, Result};
use cinescope::config::Config;
use cinescope::tmdb::{self, TmdbApi, TmdbClient};
use dotenvy::dotenv;
use serde_json::json;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq)]
enum ListKind {
    Trending,
    Popular,
    Movie,
}

impl FromStr for ListKind {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "trending" => Ok(ListKind::Trending),
            "popular" => Ok(ListKind::Popular),
            "movie" => Ok(ListKind::Movie),
            _ => Err(anyhow::anyhow!(
                "kind must be 'trending', 'popular' or 'movie'"
            )),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv();
    let mut args = env::args().skip(1);
    let kind: ListKind = args
        .next()
        .context("usage: tmdb_lists <trending|popular|movie> [id]")?
        .parse()?;

    let config = Config::from_env()?;
    let client = TmdbClient::new(&config.tmdb)?;
    let image_base = config.tmdb.image_base_url.as_str();

    let output = match kind {
        ListKind::Trending | ListKind::Popular => {
            let movies = if kind == ListKind::Trending {
                client.trending_movies().await?
            } else {
                client.popular_movies().await?
            };
            let rows: Vec<_> = movies
                .iter()
                .map(|m| {
                    json!({
                        "id": m.id,
                        "title": m.title,
                        "year": m.release_year(),
                        "rating": m.rating_label(),
                        "votes": m.vote_count,
                        "poster": tmdb::image_url(image_base, m.poster_path.as_deref(), tmdb::POSTER_SIZE),
                    })
                })
                .collect();
            json!({ "count": rows.len(), "results": rows })
        }
        ListKind::Movie => {
            let raw_id = args.next().context("movie requires a TMDB id")?;
            let id = tmdb::parse_movie_id(&raw_id).context("TMDB id must be numeric")?;
            let details = client.movie_details(id).await?;
            json!({
                "details": details,
                "poster": tmdb::image_url(image_base, details.movie.poster_path.as_deref(), tmdb::POSTER_SIZE),
                "backdrop": tmdb::image_url(image_base, details.backdrop_path.as_deref(), tmdb::BACKDROP_SIZE),
            })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
