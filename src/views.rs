//! HTML rendering for the home and detail pages.
use crate::models::{Movie, MovieDetails};
use crate::tmdb::{self, TmdbError, BACKDROP_SIZE, POSTER_SIZE};
use std::collections::HashSet;
use std::fmt::Write;

const STYLES: &str = r#"
* { box-sizing: border-box; margin: 0; padding: 0; }
body { font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif; background: #f8f9fa; color: #333; }
a { color: inherit; text-decoration: none; }
.header { background: linear-gradient(135deg, #667eea 0%, #764ba2 100%); color: white; padding: 1rem 0; box-shadow: 0 2px 10px rgba(0,0,0,0.1); }
.header-content, main { max-width: 1200px; margin: 0 auto; padding: 0 1rem; }
.header-content { display: flex; justify-content: space-between; align-items: center; }
.logo { font-size: 1.5rem; font-weight: 700; }
main { padding: 2rem 1rem; }
.section { margin-bottom: 3rem; }
.section h2 { font-size: 1.8rem; font-weight: 700; margin-bottom: 0.5rem; }
.section .description { color: #666; margin-bottom: 1.5rem; }
.grid { display: grid; grid-template-columns: repeat(auto-fill, minmax(200px, 1fr)); gap: 1.5rem; }
@media (max-width: 768px) { .grid { grid-template-columns: repeat(auto-fill, minmax(150px, 1fr)); gap: 1rem; } }
.card { background: white; border-radius: 12px; overflow: hidden; box-shadow: 0 4px 6px rgba(0,0,0,0.1); position: relative; transition: all 0.3s ease; }
.card:hover { transform: translateY(-8px); box-shadow: 0 12px 24px rgba(0,0,0,0.15); }
.card img { width: 100%; height: 300px; object-fit: cover; display: block; }
.card-content { padding: 1rem; }
.card-content h3 { font-size: 1.1rem; font-weight: 600; margin-bottom: 0.5rem; line-height: 1.3; }
.rating { display: flex; align-items: center; gap: 0.5rem; color: #666; font-size: 0.9rem; }
.badge { color: white; padding: 0.2rem 0.5rem; border-radius: 6px; font-weight: 600; font-size: 0.8rem; }
.fav-form { position: absolute; top: 0.75rem; right: 0.75rem; z-index: 2; }
.fav { background: rgba(0,0,0,0.7); border: none; border-radius: 50%; width: 40px; height: 40px; cursor: pointer; font-size: 1.2rem; color: white; }
.fav.active { color: #ef4444; }
.fav:hover { background: rgba(0,0,0,0.9); transform: scale(1.1); }
.panel { text-align: center; padding: 3rem 1rem; background: white; border-radius: 12px; box-shadow: 0 4px 6px rgba(0,0,0,0.1); margin-top: 1.5rem; }
.panel h3 { margin-bottom: 0.5rem; }
.panel p { color: #666; margin-bottom: 1.5rem; }
.retry { display: inline-block; background: #667eea; color: white; padding: 0.75rem 1.5rem; border-radius: 8px; font-weight: 500; }
.retry:hover { background: #5a67d8; }
.key-note { background: #fef3c7; border: 1px solid #f59e0b; border-radius: 8px; padding: 1rem; margin: 1rem auto 0; max-width: 500px; color: #92400e; }
.key-note h4 { font-size: 0.9rem; margin-bottom: 0.5rem; }
.key-note p { font-size: 0.8rem; color: #92400e; margin: 0; }
.skeleton { background: white; border-radius: 12px; height: 380px; box-shadow: 0 4px 6px rgba(0,0,0,0.1); background-image: linear-gradient(90deg, #f0f0f0 25%, #e0e0e0 50%, #f0f0f0 75%); }
.back { display: inline-flex; color: #667eea; font-weight: 500; margin: 2rem 0; }
.movie-header { background: white; border-radius: 12px; overflow: hidden; box-shadow: 0 4px 6px rgba(0,0,0,0.1); margin-bottom: 2rem; }
.hero { position: relative; min-height: 400px; background: linear-gradient(135deg, #667eea 0%, #764ba2 100%); }
.hero .backdrop { position: absolute; inset: 0; width: 100%; height: 100%; object-fit: cover; opacity: 0.3; }
.hero .fav-form { top: 1rem; right: 1rem; z-index: 3; }
.hero .fav { width: 50px; height: 50px; }
.hero-content { position: relative; z-index: 2; display: flex; align-items: center; padding: 2rem; color: white; gap: 2rem; }
.hero-content .poster { width: 200px; height: 300px; border-radius: 12px; object-fit: cover; box-shadow: 0 8px 24px rgba(0,0,0,0.3); flex-shrink: 0; }
.hero-content h1 { font-size: 2.5rem; margin-bottom: 1rem; line-height: 1.2; }
.meta { display: flex; flex-wrap: wrap; gap: 1.5rem; margin-bottom: 1rem; font-size: 0.9rem; }
.genres { display: flex; flex-wrap: wrap; gap: 0.5rem; }
.genre { background: rgba(255,255,255,0.2); padding: 0.25rem 0.75rem; border-radius: 20px; font-size: 0.8rem; }
.overview { background: white; padding: 2rem; border-radius: 12px; box-shadow: 0 4px 6px rgba(0,0,0,0.1); margin-bottom: 2rem; }
.overview h2 { font-size: 1.5rem; margin-bottom: 1rem; }
.overview p { line-height: 1.6; color: #555; }
@media (max-width: 768px) { .hero-content { flex-direction: column; text-align: center; } .hero-content h1 { font-size: 1.8rem; } .meta { justify-content: center; } }
"#;

/// Per-request inputs shared by every card on a page.
pub struct PageContext<'a> {
    pub image_base: &'a str,
    pub favorite_ids: HashSet<i64>,
    /// Where a favorite toggle should send the browser back to.
    pub return_to: &'a str,
}

impl PageContext<'_> {
    fn is_favorite(&self, id: i64) -> bool {
        self.favorite_ids.contains(&id)
    }
}

pub struct ErrorPanel<'a> {
    pub title: &'a str,
    pub message: String,
    pub api_key_note: bool,
    pub retry_href: Option<&'a str>,
}

impl<'a> ErrorPanel<'a> {
    pub fn from_tmdb(title: &'a str, err: &TmdbError, retry_href: &'a str) -> Self {
        Self {
            title,
            message: err.to_string(),
            api_key_note: err.is_credential_problem(),
            retry_href: Some(retry_href),
        }
    }
}

/// The three sections of the home page.
pub struct HomeView<'a> {
    pub trending: &'a Result<Vec<Movie>, TmdbError>,
    pub recommended: &'a Result<Vec<Movie>, TmdbError>,
    /// `None` until the favorites store has loaded.
    pub favorites: Option<&'a [Movie]>,
}

pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{}</title>\n<style>{}</style>\n</head>\n<body>\n{}\n{}\n</body>\n</html>\n",
        escape(title),
        STYLES,
        header(),
        body
    )
}

fn header() -> &'static str {
    "<header class=\"header\"><div class=\"header-content\">\
     <h1 class=\"logo\">🎬 MovieApp</h1><nav><a href=\"/\">Home</a></nav>\
     </div></header>"
}

fn section(title: &str, description: &str, content: &str) -> String {
    format!(
        "<section class=\"section\"><h2>{}</h2><p class=\"description\">{}</p>{}</section>",
        escape(title),
        escape(description),
        content
    )
}

pub fn loading_skeleton(count: usize) -> String {
    let mut out = String::from("<div class=\"grid\" aria-busy=\"true\">");
    for _ in 0..count {
        out.push_str("<div class=\"skeleton\"></div>");
    }
    out.push_str("</div>");
    out
}

pub fn error_panel(panel: &ErrorPanel<'_>) -> String {
    let mut out = format!(
        "<div class=\"panel error\"><h3>{}</h3><p>{}</p>",
        escape(panel.title),
        escape(&panel.message)
    );
    if let Some(href) = panel.retry_href {
        let _ = write!(
            out,
            "<a class=\"retry\" href=\"{}\">Try Again</a>",
            escape(href)
        );
    }
    if panel.api_key_note {
        out.push_str(
            "<div class=\"key-note\"><h4>API Key Issue</h4>\
             <p>Make sure your TMDB API key is correctly set in your .env file as TMDB_API_KEY</p></div>",
        );
    }
    out.push_str("</div>");
    out
}

fn favorite_form(movie: &Movie, is_favorite: bool, return_to: &str) -> String {
    let (label, class, glyph) = if is_favorite {
        ("Remove from favorites", "fav active", "♥")
    } else {
        ("Add to favorites", "fav", "♡")
    };
    format!(
        "<form class=\"fav-form\" method=\"post\" action=\"/favorites/toggle\">\
         <input type=\"hidden\" name=\"id\" value=\"{}\">\
         <input type=\"hidden\" name=\"title\" value=\"{}\">\
         <input type=\"hidden\" name=\"poster_path\" value=\"{}\">\
         <input type=\"hidden\" name=\"vote_average\" value=\"{}\">\
         <input type=\"hidden\" name=\"vote_count\" value=\"{}\">\
         <input type=\"hidden\" name=\"release_date\" value=\"{}\">\
         <input type=\"hidden\" name=\"return_to\" value=\"{}\">\
         <button type=\"submit\" class=\"{}\" aria-label=\"{}\">{}</button></form>",
        movie.id,
        escape(&movie.title),
        escape(movie.poster_path.as_deref().unwrap_or("")),
        movie.vote_average,
        movie.vote_count,
        escape(movie.release_date.as_deref().unwrap_or("")),
        escape(return_to),
        class,
        label,
        glyph
    )
}

pub fn movie_card(movie: &Movie, ctx: &PageContext<'_>) -> String {
    let poster = tmdb::image_url(ctx.image_base, movie.poster_path.as_deref(), POSTER_SIZE);
    format!(
        "<div class=\"card\">{}<a href=\"/movie/{}\">\
         <img src=\"{}\" alt=\"{}\" loading=\"lazy\">\
         <div class=\"card-content\"><h3>{}</h3>\
         <div class=\"rating\"><span class=\"badge\" style=\"background: {}\">{}</span>\
         <span>({} votes)</span></div></div></a></div>",
        favorite_form(movie, ctx.is_favorite(movie.id), ctx.return_to),
        movie.id,
        escape(&poster),
        escape(&movie.title),
        escape(&movie.title),
        movie.rating_tier().color(),
        movie.rating_label(),
        movie.vote_count
    )
}

pub fn movie_grid(movies: &[Movie], ctx: &PageContext<'_>) -> String {
    let mut out = String::from("<div class=\"grid\">");
    for movie in movies {
        out.push_str(&movie_card(movie, ctx));
    }
    out.push_str("</div>");
    out
}

fn remote_section(
    result: &Result<Vec<Movie>, TmdbError>,
    error_title: &str,
    retry_href: &str,
    ctx: &PageContext<'_>,
) -> String {
    match result {
        Ok(movies) => movie_grid(movies, ctx),
        Err(e) => error_panel(&ErrorPanel::from_tmdb(error_title, e, retry_href)),
    }
}

pub fn render_home(view: &HomeView<'_>, ctx: &PageContext<'_>) -> String {
    let trending = remote_section(
        view.trending,
        "Failed to load trending movies",
        "/?retry=trending",
        ctx,
    );
    let recommended = remote_section(
        view.recommended,
        "Failed to load recommended movies",
        "/?retry=recommended",
        ctx,
    );
    let favorites = match view.favorites {
        None => loading_skeleton(4),
        Some([]) => "<div class=\"panel empty\"><h3>No favorites yet</h3>\
                     <p>Start adding movies to your favorites by clicking the heart icon!</p></div>"
            .to_string(),
        Some(movies) => movie_grid(movies, ctx),
    };

    let body = format!(
        "<main>{}{}{}</main>",
        section(
            "Trending Movies",
            "Discover what's popular this week",
            &trending
        ),
        section(
            "Recommended Movies",
            "Popular movies you might enjoy",
            &recommended
        ),
        section(
            "Your Favorites",
            "Movies you've saved for later",
            &favorites
        ),
    );
    layout("MovieApp", &body)
}

pub fn render_details(details: &MovieDetails, ctx: &PageContext<'_>) -> String {
    let movie = &details.movie;
    let poster = tmdb::image_url(ctx.image_base, movie.poster_path.as_deref(), POSTER_SIZE);

    let backdrop = match details.backdrop_path.as_deref() {
        Some(path) if !path.is_empty() => format!(
            "<img class=\"backdrop\" src=\"{}\" alt=\"{}\">",
            escape(&tmdb::image_url(ctx.image_base, Some(path), BACKDROP_SIZE)),
            escape(&movie.title)
        ),
        _ => String::new(),
    };

    let mut meta = String::new();
    if let Some(year) = movie.release_year() {
        let _ = write!(meta, "<span class=\"year\">📅 {year}</span>");
    }
    if let Some(runtime) = details.runtime.filter(|r| *r > 0) {
        let _ = write!(meta, "<span class=\"runtime\">🕒 {runtime} min</span>");
    }
    let _ = write!(
        meta,
        "<span class=\"score\">★ {} ({} votes)</span>",
        movie.rating_label(),
        movie.vote_count
    );

    let genres = if details.genres.is_empty() {
        String::new()
    } else {
        let tags: String = details
            .genres
            .iter()
            .map(|g| format!("<span class=\"genre\">{}</span>", escape(&g.name)))
            .collect();
        format!("<div class=\"genres\">{tags}</div>")
    };

    let body = format!(
        "<main><a class=\"back\" href=\"/\">← Back to Movies</a>\
         <div class=\"movie-header\"><div class=\"hero\">{}{}\
         <div class=\"hero-content\"><img class=\"poster\" src=\"{}\" alt=\"{}\">\
         <div class=\"info\"><h1>{}</h1><div class=\"meta\">{}</div>{}</div></div></div></div>\
         <div class=\"overview\"><h2>Overview</h2><p>{}</p></div></main>",
        backdrop,
        favorite_form(movie, ctx.is_favorite(movie.id), ctx.return_to),
        escape(&poster),
        escape(&movie.title),
        escape(&movie.title),
        meta,
        genres,
        escape(details.overview_text())
    );
    layout(&movie.title, &body)
}

pub fn render_details_error(panel: &ErrorPanel<'_>) -> String {
    let body = format!(
        "<main><a class=\"back\" href=\"/\">← Back to Movies</a>{}</main>",
        error_panel(panel)
    );
    layout("MovieApp", &body)
}

pub fn placeholder_svg() -> &'static str {
    "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"500\" height=\"750\" viewBox=\"0 0 500 750\">\
     <rect width=\"500\" height=\"750\" fill=\"#e5e7eb\"/>\
     <text x=\"250\" y=\"375\" font-family=\"sans-serif\" font-size=\"32\" fill=\"#6b7280\" \
     text-anchor=\"middle\">No Image</text></svg>"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Genre;
    use reqwest::StatusCode;

    fn movie(id: i64, title: &str, vote_average: f64) -> Movie {
        Movie {
            id,
            title: title.to_string(),
            poster_path: Some(format!("/p{id}.jpg")),
            vote_average,
            vote_count: 42,
            release_date: Some("2023-07-21".to_string()),
        }
    }

    fn ctx(favorites: &[i64]) -> PageContext<'static> {
        PageContext {
            image_base: "https://image.tmdb.org/t/p",
            favorite_ids: favorites.iter().copied().collect(),
            return_to: "/",
        }
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape(r#"<b>"Tom & Jerry's"</b>"#),
            "&lt;b&gt;&quot;Tom &amp; Jerry&#39;s&quot;&lt;/b&gt;"
        );
    }

    #[test]
    fn card_reflects_favorite_state() {
        let m = movie(7, "Oppenheimer", 8.1);
        let fav = movie_card(&m, &ctx(&[7]));
        assert!(fav.contains("aria-label=\"Remove from favorites\""));
        assert!(fav.contains("href=\"/movie/7\""));
        assert!(fav.contains("https://image.tmdb.org/t/p/w500/p7.jpg"));
        assert!(fav.contains("#10b981"));
        assert!(fav.contains("(42 votes)"));

        let not_fav = movie_card(&m, &ctx(&[]));
        assert!(not_fav.contains("aria-label=\"Add to favorites\""));
    }

    #[test]
    fn card_escapes_titles() {
        let html = movie_card(&movie(1, "<script>alert(1)</script>", 3.0), &ctx(&[]));
        assert!(!html.contains("<script>"));
        assert!(html.contains("#ef4444"));
    }

    #[test]
    fn home_distinguishes_credential_errors() {
        let trending = Err(TmdbError::from_status(StatusCode::UNAUTHORIZED));
        let recommended = Err(TmdbError::from_status(StatusCode::INTERNAL_SERVER_ERROR));
        let html = render_home(
            &HomeView {
                trending: &trending,
                recommended: &recommended,
                favorites: Some(&[]),
            },
            &ctx(&[]),
        );
        assert!(html.contains("Failed to load trending movies"));
        assert!(html.contains("Invalid API key. Please check your TMDB API key."));
        assert!(html.contains("Failed to load recommended movies"));
        assert!(html.contains("Failed to fetch data: Internal Server Error"));
        assert_eq!(html.matches("API Key Issue").count(), 1);
        assert_eq!(html.matches("Try Again").count(), 2);
        assert!(html.contains("No favorites yet"));
    }

    #[test]
    fn home_shows_skeleton_before_favorites_load() {
        let ok = Ok(vec![movie(1, "A", 6.0)]);
        let html = render_home(
            &HomeView {
                trending: &ok,
                recommended: &ok,
                favorites: None,
            },
            &ctx(&[]),
        );
        assert!(html.contains("aria-busy=\"true\""));
        assert!(!html.contains("No favorites yet"));
    }

    #[test]
    fn details_render_meta_and_genres() {
        let details = MovieDetails {
            movie: movie(9, "Barbie", 7.0),
            overview: Some("Plastic.".to_string()),
            runtime: Some(114),
            backdrop_path: Some("/b9.jpg".to_string()),
            genres: vec![
                Genre {
                    id: 35,
                    name: "Comedy".to_string(),
                },
                Genre {
                    id: 12,
                    name: "Adventure".to_string(),
                },
            ],
        };
        let html = render_details(&details, &ctx(&[]));
        assert!(html.contains("2023"));
        assert!(html.contains("114 min"));
        assert!(html.contains("7.0 (42 votes)"));
        assert!(html.contains("w1280/b9.jpg"));
        assert!(html.find("Comedy").unwrap() < html.find("Adventure").unwrap());
        assert!(html.contains("Plastic."));
    }

    #[test]
    fn details_without_runtime_or_overview() {
        let details = MovieDetails {
            movie: movie(9, "Barbie", 7.0),
            overview: None,
            runtime: None,
            backdrop_path: None,
            genres: Vec::new(),
        };
        let html = render_details(&details, &ctx(&[9]));
        assert!(!html.contains(" min</span>"));
        assert!(html.contains("No overview available."));
        assert!(html.contains("Remove from favorites"));
    }
}
