use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};

/// Movie summary as TMDB returns it in list endpoints.
///
/// This is also the shape of each entry in the persisted favorites record.
/// `id` and `title` are required; the remaining fields fall back to defaults
/// so that partially populated records still load.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Movie {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub vote_average: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub vote_count: u64,
    #[serde(default)]
    pub release_date: Option<String>,
}

// serde_json writes non-finite floats as `null`; read those back as zero.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Genre {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MovieDetails {
    #[serde(flatten)]
    pub movie: Movie,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub runtime: Option<u32>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub genres: Vec<Genre>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingTier {
    High,
    Medium,
    Low,
}

impl RatingTier {
    pub fn from_average(vote_average: f64) -> Self {
        if vote_average >= 7.0 {
            RatingTier::High
        } else if vote_average >= 5.0 {
            RatingTier::Medium
        } else {
            RatingTier::Low
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            RatingTier::High => "#10b981",
            RatingTier::Medium => "#f59e0b",
            RatingTier::Low => "#ef4444",
        }
    }
}

impl Movie {
    /// TMDB averages are on a 0-10 scale.
    pub fn has_valid_rating(&self) -> bool {
        self.vote_average.is_finite() && (0.0..=10.0).contains(&self.vote_average)
    }

    pub fn rating_label(&self) -> String {
        format!("{:.1}", self.vote_average)
    }

    pub fn rating_tier(&self) -> RatingTier {
        RatingTier::from_average(self.vote_average)
    }

    /// Year of release, if TMDB gave us anything resembling a date.
    pub fn release_year(&self) -> Option<i32> {
        let raw = self.release_date.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return Some(date.year());
        }
        raw.split('-').next().and_then(|y| y.parse().ok())
    }
}

impl MovieDetails {
    /// The summary stored when a detail page is favorited.
    pub fn summary(&self) -> Movie {
        self.movie.clone()
    }

    pub fn overview_text(&self) -> &str {
        match self.overview.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text,
            _ => "No overview available.",
        }
    }
}
