use serde::{Deserialize, Serialize};

/// One entry of a discover listing.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MovieStub {
    pub id: i32,
    pub title: Option<String>,
    pub original_title: Option<String>,
    pub overview: Option<String>,
    pub release_date: Option<String>,
    pub popularity: Option<f64>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<i32>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoverPage {
    pub page: u32,
    pub results: Vec<MovieStub>,
    pub total_pages: u32,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MovieDetails {
    pub id: Option<i32>,
    pub title: Option<String>,
    pub original_title: Option<String>,
    pub overview: Option<String>,
    pub release_date: Option<String>,
    pub popularity: Option<f64>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<i32>,
    pub revenue: Option<i64>,
    pub runtime: Option<i32>,
    pub genres: Vec<GenreRef>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct GenreRef {
    pub id: i32,
    pub name: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Credits {
    pub id: Option<i32>,
    pub cast: Vec<CastMember>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CastMember {
    pub id: i32,
    pub name: Option<String>,
    pub gender: Option<i32>,
    pub popularity: Option<f64>,
    pub profile_path: Option<String>,
    pub character: Option<String>,
    pub order: Option<i32>,
}

/// Movie row as it will be written, after resolving details against the stub.
#[derive(Clone, Debug, PartialEq)]
pub struct MovieRecord {
    pub id: i32,
    pub title: Option<String>,
    pub original_title: Option<String>,
    pub overview: Option<String>,
    pub release_date: Option<String>,
    pub popularity: Option<f64>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<i32>,
    pub revenue: i64,
    pub runtime: i32,
}

impl MovieRecord {
    /// Details win when present and truthy, then the stub, then the default
    /// (0 for revenue and runtime, absent for everything else).
    pub fn merge(stub: &MovieStub, details: &MovieDetails) -> Self {
        Self {
            id: stub.id,
            title: pick_text(&details.title, &stub.title),
            original_title: pick_text(&details.original_title, &stub.original_title),
            overview: pick_text(&details.overview, &stub.overview),
            release_date: valid_date(&details.release_date)
                .or_else(|| valid_date(&stub.release_date)),
            popularity: details.popularity.filter(|v| *v != 0.0).or(stub.popularity),
            vote_average: details.vote_average.filter(|v| *v != 0.0).or(stub.vote_average),
            vote_count: details.vote_count.filter(|v| *v != 0).or(stub.vote_count),
            revenue: details.revenue.unwrap_or(0),
            runtime: details.runtime.unwrap_or(0),
        }
    }
}

/// Lowercases with full Unicode case mapping. Stored keys and search terms
/// both go through here since SQLite's `LOWER` and `LIKE` only fold ASCII.
pub fn search_key(text: &str) -> String {
    text.to_lowercase()
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|s| !s.trim().is_empty()).cloned()
}

fn pick_text(preferred: &Option<String>, fallback: &Option<String>) -> Option<String> {
    non_empty(preferred).or_else(|| non_empty(fallback))
}

fn valid_date(value: &Option<String>) -> Option<String> {
    let raw = non_empty(value)?;
    raw.trim().parse::<jiff::civil::Date>().ok().map(|d| d.to_string())
}

/// Everything stored for one movie in a single transaction.
#[derive(Clone, Debug)]
pub struct MovieBundle {
    pub movie: MovieRecord,
    pub genres: Vec<GenreRef>,
    pub cast: Vec<CastMember>,
}

impl MovieBundle {
    pub fn new(stub: &MovieStub, details: MovieDetails, credits: Credits) -> Self {
        Self {
            movie: MovieRecord::merge(stub, &details),
            genres: details.genres,
            cast: credits.cast,
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct MovieRow {
    pub id: i32,
    pub title: String,
    pub original_title: Option<String>,
    pub overview: Option<String>,
    pub release_date: Option<String>,
    pub popularity: Option<f64>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<i32>,
    pub revenue: Option<i64>,
    pub runtime: Option<i32>,
    pub genre_names: Vec<String>,
    pub cast_names: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct MoviePage {
    pub results: Vec<MovieRow>,
    pub page: u64,
    pub total_pages: u64,
    pub total_results: u64,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct IngestReport {
    pub discovered: usize,
    pub fetched: usize,
    pub stored: usize,
    pub failed: usize,
    pub skipped: usize,
    pub used_fallback: bool,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub() -> MovieStub {
        MovieStub {
            id: 42,
            title: Some("Stub Title".to_string()),
            original_title: Some("Stub Original".to_string()),
            overview: Some("stub overview".to_string()),
            release_date: Some("2019-05-01".to_string()),
            popularity: Some(12.5),
            vote_average: Some(7.1),
            vote_count: Some(300),
        }
    }

    #[test]
    fn empty_details_fall_back_to_stub_and_zero_defaults() {
        let record = MovieRecord::merge(&stub(), &MovieDetails::default());

        assert_eq!(record.title.as_deref(), Some("Stub Title"));
        assert_eq!(record.overview.as_deref(), Some("stub overview"));
        assert_eq!(record.release_date.as_deref(), Some("2019-05-01"));
        assert_eq!(record.popularity, Some(12.5));
        assert_eq!(record.vote_count, Some(300));
        assert_eq!(record.revenue, 0);
        assert_eq!(record.runtime, 0);
    }

    #[test]
    fn truthy_details_win_over_stub() {
        let details = MovieDetails {
            title: Some("Detail Title".to_string()),
            popularity: Some(99.0),
            revenue: Some(1_000_000),
            runtime: Some(121),
            ..Default::default()
        };
        let record = MovieRecord::merge(&stub(), &details);

        assert_eq!(record.title.as_deref(), Some("Detail Title"));
        assert_eq!(record.original_title.as_deref(), Some("Stub Original"));
        assert_eq!(record.popularity, Some(99.0));
        assert_eq!(record.revenue, 1_000_000);
        assert_eq!(record.runtime, 121);
    }

    #[test]
    fn falsy_detail_values_do_not_win() {
        let details = MovieDetails {
            title: Some("   ".to_string()),
            vote_count: Some(0),
            vote_average: Some(0.0),
            release_date: Some(String::new()),
            ..Default::default()
        };
        let record = MovieRecord::merge(&stub(), &details);

        assert_eq!(record.title.as_deref(), Some("Stub Title"));
        assert_eq!(record.vote_count, Some(300));
        assert_eq!(record.vote_average, Some(7.1));
        assert_eq!(record.release_date.as_deref(), Some("2019-05-01"));
    }

    #[test]
    fn unparsable_release_date_is_absent() {
        let mut s = stub();
        s.release_date = Some("sometime in May".to_string());
        let record = MovieRecord::merge(&s, &MovieDetails::default());
        assert_eq!(record.release_date, None);
    }

    #[test]
    fn missing_everything_leaves_fields_absent() {
        let s = MovieStub { id: 7, ..Default::default() };
        let record = MovieRecord::merge(&s, &MovieDetails::default());
        assert_eq!(record.title, None);
        assert_eq!(record.popularity, None);
        assert_eq!(record.revenue, 0);
    }

    #[test]
    fn surrounding_whitespace_is_kept_on_stored_text() {
        let details = MovieDetails { title: Some(" Foo ".to_string()), ..Default::default() };
        let record = MovieRecord::merge(&stub(), &details);
        assert_eq!(record.title.as_deref(), Some(" Foo "));
    }

    #[test]
    fn search_key_folds_non_ascii_letters() {
        assert_eq!(search_key("ÉCOLE DE PARIS"), "école de paris");
        assert_eq!(search_key("Élodie Bouchez"), "élodie bouchez");
    }

    #[test]
    fn tmdb_payloads_with_nulls_deserialize() {
        let raw = r#"{"id": 3, "title": "X", "overview": null, "genres": [{"id": 18, "name": "Drama"}], "revenue": null}"#;
        let details: MovieDetails = serde_json::from_str(raw).unwrap();
        assert_eq!(details.id, Some(3));
        assert_eq!(details.overview, None);
        assert_eq!(details.genres, vec![GenreRef { id: 18, name: "Drama".to_string() }]);

        let credits: Credits = serde_json::from_str(r#"{"id": 3}"#).unwrap();
        assert!(credits.cast.is_empty());
    }
}
