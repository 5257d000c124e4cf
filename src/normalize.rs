//! Maps raw TMDB records onto the shapes the frontend consumes.
//!
//! Everything here is pure. The functions take `serde_json::Value` rather than
//! typed upstream structs because TMDB omits, nulls, or retypes fields freely
//! and a missing field must never fail a request.
//!
//! Conventions shared by every record:
//! - `title` and `overview` fall back to an empty string.
//! - Optional strings such as dates and image paths become `null` when absent
//!   or empty.
//! - `year` is the first four characters of the relevant date, unvalidated.

use serde::Serialize;
use serde_json::{Number, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Genre {
    pub id: Option<Number>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieSummary {
    pub media_type: MediaType,
    pub id: Option<Number>,
    /// Same value as `id`; the frontend bundle keys and links by this name.
    pub tmdb_id: Option<Number>,
    pub title: String,
    pub overview: String,
    pub year: Option<String>,
    pub release_date: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub vote_average: Option<Number>,
    pub vote_count: Option<Number>,
    pub runtime: Option<Number>,
    /// Omitted when upstream did not send a list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genres: Option<Vec<Genre>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TvSummary {
    pub media_type: MediaType,
    pub id: Option<Number>,
    /// Same value as `id`; the frontend bundle keys and links by this name.
    pub tmdb_id: Option<Number>,
    pub title: String,
    pub overview: String,
    pub year: Option<String>,
    pub first_air_date: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub vote_average: Option<Number>,
    pub vote_count: Option<Number>,
    pub number_of_seasons: Option<Number>,
    pub number_of_episodes: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genres: Option<Vec<Genre>>,
}

/// Entry of a multi-type listing (search, trending).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub media_type: MediaType,
    pub id: Option<Number>,
    /// Same value as `id`; the frontend bundle keys and links by this name.
    pub tmdb_id: Option<Number>,
    pub title: String,
    pub overview: String,
    pub year: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub vote_average: Option<Number>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeSummary {
    pub episode_number: Option<Number>,
    pub season_number: Option<Number>,
    pub name: String,
    pub overview: String,
    pub air_date: Option<String>,
    pub runtime: Option<Number>,
    pub still_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonDetail {
    pub tmdb_id: u64,
    pub season: Number,
    pub name: Option<String>,
    pub overview: Option<String>,
    pub air_date: Option<String>,
    pub poster_path: Option<String>,
    pub episodes: Vec<EpisodeSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedResult<T> {
    pub page: Number,
    pub results: Vec<T>,
    pub total_pages: Number,
    pub total_results: Number,
}

impl<T> PagedResult<T> {
    pub fn empty() -> Self {
        Self {
            page: Number::from(1),
            results: Vec::new(),
            total_pages: Number::from(0),
            total_results: Number::from(0),
        }
    }
}

/// Everything the API can answer with, and therefore everything the response
/// cache stores. Serialized without a wrapper so the wire shape is the inner
/// record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NormalizedPayload {
    Movie(MovieSummary),
    Tv(TvSummary),
    Season(SeasonDetail),
    MoviePage(PagedResult<MovieSummary>),
    TvPage(PagedResult<TvSummary>),
    SearchPage(PagedResult<SearchHit>),
    /// Upstream answered a detail request with an empty body.
    Empty,
}

fn text(raw: &Value, key: &str) -> Option<String> {
    raw.get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

fn text_or_empty(raw: &Value, key: &str) -> String {
    text(raw, key).unwrap_or_default()
}

/// Numbers pass through untouched, integer or not. Anything else is `None`.
fn number(raw: &Value, key: &str) -> Option<Number> {
    match raw.get(key) {
        Some(Value::Number(value)) => Some(value.clone()),
        _ => None,
    }
}

/// First four characters of a date string, or `None` when it is empty.
pub fn year_of(date: Option<&str>) -> Option<String> {
    let year: String = date.unwrap_or_default().chars().take(4).collect();
    (!year.is_empty()).then_some(year)
}

fn genres(raw: &Value) -> Option<Vec<Genre>> {
    let list = raw.get("genres")?.as_array()?;
    Some(
        list.iter()
            .map(|genre| Genre {
                id: number(genre, "id"),
                name: genre.get("name").and_then(Value::as_str).map(str::to_owned),
            })
            .collect(),
    )
}

pub fn normalize_movie(raw: &Value) -> Option<MovieSummary> {
    if raw.is_null() {
        return None;
    }
    let release_date = text(raw, "release_date");
    Some(MovieSummary {
        media_type: MediaType::Movie,
        id: number(raw, "id"),
        tmdb_id: number(raw, "id"),
        title: text_or_empty(raw, "title"),
        overview: text_or_empty(raw, "overview"),
        year: year_of(release_date.as_deref()),
        release_date,
        poster_path: text(raw, "poster_path"),
        backdrop_path: text(raw, "backdrop_path"),
        vote_average: number(raw, "vote_average"),
        vote_count: number(raw, "vote_count"),
        runtime: number(raw, "runtime"),
        genres: genres(raw),
    })
}

pub fn normalize_tv(raw: &Value) -> Option<TvSummary> {
    if raw.is_null() {
        return None;
    }
    let first_air_date = text(raw, "first_air_date");
    Some(TvSummary {
        media_type: MediaType::Tv,
        id: number(raw, "id"),
        tmdb_id: number(raw, "id"),
        title: text_or_empty(raw, "name"),
        overview: text_or_empty(raw, "overview"),
        year: year_of(first_air_date.as_deref()),
        first_air_date,
        poster_path: text(raw, "poster_path"),
        backdrop_path: text(raw, "backdrop_path"),
        vote_average: number(raw, "vote_average"),
        vote_count: number(raw, "vote_count"),
        number_of_seasons: number(raw, "number_of_seasons"),
        number_of_episodes: number(raw, "number_of_episodes"),
        genres: genres(raw),
    })
}

/// Returns `None` for anything that is not a movie or a show (people,
/// collections, ...). Callers drop those entries.
pub fn normalize_search_hit(raw: &Value) -> Option<SearchHit> {
    let (media_type, title_key, date_key) = match raw.get("media_type")?.as_str()? {
        "movie" => (MediaType::Movie, "title", "release_date"),
        "tv" => (MediaType::Tv, "name", "first_air_date"),
        _ => return None,
    };
    Some(SearchHit {
        media_type,
        id: number(raw, "id"),
        tmdb_id: number(raw, "id"),
        title: text_or_empty(raw, title_key),
        overview: text_or_empty(raw, "overview"),
        year: year_of(text(raw, date_key).as_deref()),
        poster_path: text(raw, "poster_path"),
        backdrop_path: text(raw, "backdrop_path"),
        vote_average: number(raw, "vote_average"),
    })
}

pub fn normalize_episode(raw: &Value) -> EpisodeSummary {
    EpisodeSummary {
        episode_number: number(raw, "episode_number"),
        season_number: number(raw, "season_number"),
        name: text_or_empty(raw, "name"),
        overview: text_or_empty(raw, "overview"),
        air_date: text(raw, "air_date"),
        runtime: number(raw, "runtime"),
        still_path: text(raw, "still_path"),
    }
}

pub fn normalize_season(raw: &Value, tmdb_id: u64, requested_season: u32) -> SeasonDetail {
    let episodes = raw
        .get("episodes")
        .and_then(Value::as_array)
        .map(|list| list.iter().map(normalize_episode).collect())
        .unwrap_or_default();
    SeasonDetail {
        tmdb_id,
        season: number(raw, "season_number").unwrap_or_else(|| Number::from(requested_season)),
        name: text(raw, "name"),
        overview: text(raw, "overview"),
        air_date: text(raw, "air_date"),
        poster_path: text(raw, "poster_path"),
        episodes,
    }
}

/// Normalizes a paginated listing, keeping only the items `item` accepts.
pub fn normalize_page<T, F>(raw: &Value, item: F) -> PagedResult<T>
where
    F: Fn(&Value) -> Option<T>,
{
    let results = raw
        .get("results")
        .and_then(Value::as_array)
        .map(|list| list.iter().filter_map(&item).collect())
        .unwrap_or_default();
    PagedResult {
        page: number(raw, "page").unwrap_or_else(|| Number::from(1)),
        results,
        total_pages: number(raw, "total_pages").unwrap_or_else(|| Number::from(0)),
        total_results: number(raw, "total_results").unwrap_or_else(|| Number::from(0)),
    }
}
