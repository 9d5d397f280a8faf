use std::str::FromStr;

use sea_orm::{
    ConnectionTrait, DatabaseConnection, FromQueryResult, Iterable,
    sea_query::{
        Alias, Condition, Expr, Func, IntoCondition, LikeExpr, Order, Query, SelectStatement,
    },
};
use serde::Deserialize;
use tracing::debug;

use crate::{
    entities::{actor, genre, movie, movie_actor, movie_genre},
    error::{AppError, AppResult},
    models::{MoviePage, MovieRow, search_key},
};

pub const DEFAULT_PER_PAGE: u64 = 20;
pub const MAX_PER_PAGE: u64 = 100;
/// Keeps `(page - 1) * perPage` within the store's signed 64-bit offset.
const MAX_PAGE: u64 = i64::MAX as u64 / MAX_PER_PAGE;
const MIN_YEAR: i16 = 1900;
const MAX_SEARCH_LEN: usize = 255;

/// Query string of `GET /movies`, exactly as received.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MovieQueryParams {
    pub page: Option<String>,
    #[serde(rename = "perPage")]
    pub per_page: Option<String>,
    pub year: Option<String>,
    pub genres: Option<String>,
    pub without_genres: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub search: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortField {
    #[default]
    Popularity,
    VoteAverage,
    VoteCount,
    ReleaseDate,
    Revenue,
    Title,
}

impl SortField {
    fn column(self) -> movie::Column {
        match self {
            SortField::Popularity => movie::Column::Popularity,
            SortField::VoteAverage => movie::Column::VoteAverage,
            SortField::VoteCount => movie::Column::VoteCount,
            SortField::ReleaseDate => movie::Column::ReleaseDate,
            SortField::Revenue => movie::Column::Revenue,
            SortField::Title => movie::Column::Title,
        }
    }
}

impl FromStr for SortField {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "popularity" => Ok(SortField::Popularity),
            "vote_average" => Ok(SortField::VoteAverage),
            "vote_count" => Ok(SortField::VoteCount),
            "release_date" => Ok(SortField::ReleaseDate),
            "revenue" => Ok(SortField::Revenue),
            "title" => Ok(SortField::Title),
            _ => Err(AppError::Validation(
                "\"sort_by\" must be one of [popularity, vote_average, vote_count, release_date, revenue, title]"
                    .to_string(),
            )),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl FromStr for SortOrder {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(AppError::Validation("\"sort_order\" must be one of [asc, desc]".to_string())),
        }
    }
}

impl From<SortOrder> for Order {
    fn from(order: SortOrder) -> Self {
        match order {
            SortOrder::Asc => Order::Asc,
            SortOrder::Desc => Order::Desc,
        }
    }
}

/// A validated search request. Only values of this type reach the query
/// builder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MovieQuery {
    pub page: u64,
    pub per_page: u64,
    pub year: Option<i16>,
    pub genres: Vec<i32>,
    pub without_genres: Vec<i32>,
    pub search: Option<String>,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
}

impl Default for MovieQuery {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
            year: None,
            genres: Vec::new(),
            without_genres: Vec::new(),
            search: None,
            sort_by: SortField::default(),
            sort_order: SortOrder::default(),
        }
    }
}

impl MovieQueryParams {
    pub fn validate(self, current_year: i16) -> AppResult<MovieQuery> {
        let mut query = MovieQuery::default();

        if let Some(raw) = self.page {
            query.page = parse_number("page", &raw, 1, MAX_PAGE)?;
        }
        if let Some(raw) = self.per_page {
            query.per_page = parse_number("perPage", &raw, 1, MAX_PER_PAGE)?;
        }
        if let Some(raw) = self.year {
            query.year = Some(parse_number("year", &raw, MIN_YEAR, current_year + 1)?);
        }
        if let Some(raw) = self.genres {
            query.genres = parse_ids("genres", &raw)?;
        }
        if let Some(raw) = self.without_genres {
            query.without_genres = parse_ids("without_genres", &raw)?;
        }
        if let Some(raw) = self.sort_by {
            query.sort_by = raw.parse()?;
        }
        if let Some(raw) = self.sort_order {
            query.sort_order = raw.parse()?;
        }
        if let Some(raw) = self.search {
            if raw.is_empty() {
                return Err(AppError::Validation("\"search\" is not allowed to be empty".into()));
            }
            if raw.chars().count() > MAX_SEARCH_LEN {
                return Err(AppError::Validation(format!(
                    "\"search\" length must be less than or equal to {MAX_SEARCH_LEN} characters long"
                )));
            }
            query.search = Some(raw);
        }

        Ok(query)
    }
}

fn parse_number<T>(field: &str, raw: &str, min: T, max: T) -> AppResult<T>
where
    T: FromStr + PartialOrd + std::fmt::Display,
{
    let value: T = raw
        .trim()
        .parse()
        .map_err(|_| AppError::Validation(format!("\"{field}\" must be an integer")))?;
    if value < min {
        return Err(AppError::Validation(format!(
            "\"{field}\" must be greater than or equal to {min}"
        )));
    }
    if value > max {
        return Err(AppError::Validation(format!("\"{field}\" must be less than or equal to {max}")));
    }
    Ok(value)
}

fn parse_ids(field: &str, raw: &str) -> AppResult<Vec<i32>> {
    raw.split(',')
        .map(|part| {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(AppError::Validation(format!(
                    "\"{field}\" must be a comma-separated list of ids"
                )));
            }
            part.parse().map_err(|_| AppError::Validation(format!("\"{field}\" id out of range")))
        })
        .collect()
}

fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

impl MovieQuery {
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.per_page)
    }

    /// The conjunction of all active filters, `None` when there are none.
    fn filter(&self) -> Option<Condition> {
        let mut predicates: Vec<Condition> = Vec::new();

        if let Some(year) = self.year {
            let release_year = Func::cust(Alias::new("strftime"))
                .arg("%Y")
                .arg(Expr::col((movie::Entity, movie::Column::ReleaseDate)));
            predicates.push(Expr::expr(release_year).eq(format!("{year:04}")).into_condition());
        }

        if !self.genres.is_empty() {
            predicates.push(
                Expr::col((movie_genre::Entity, movie_genre::Column::GenreId))
                    .is_in(self.genres.iter().copied())
                    .into_condition(),
            );
        }

        if !self.without_genres.is_empty() {
            let excluded = Alias::new("excluded");
            let tagged = Query::select()
                .column((excluded.clone(), movie_genre::Column::MovieId))
                .from_as(movie_genre::Entity, excluded.clone())
                .and_where(
                    Expr::col((excluded, movie_genre::Column::GenreId))
                        .is_in(self.without_genres.iter().copied()),
                )
                .to_owned();
            predicates.push(
                Expr::col((movie::Entity, movie::Column::Id)).not_in_subquery(tagged).into_condition(),
            );
        }

        if let Some(term) = &self.search {
            let pattern = format!("%{}%", escape_like(&search_key(term)));
            predicates.push(
                Condition::any()
                    .add(
                        Expr::col((movie::Entity, movie::Column::TitleKey))
                            .like(LikeExpr::new(pattern.clone()).escape('\\')),
                    )
                    .add(
                        Expr::col((actor::Entity, actor::Column::NameKey))
                            .like(LikeExpr::new(pattern).escape('\\')),
                    ),
            );
        }

        if predicates.is_empty() {
            return None;
        }
        Some(predicates.into_iter().fold(Condition::all(), Condition::add))
    }

    /// One page of movies, each with its genre and cast names aggregated.
    pub fn page_statement(&self) -> SelectStatement {
        let mut select = Query::select();
        select
            .columns(movie::Column::iter().map(|c| (movie::Entity, c)))
            .expr_as(Expr::cust("json_group_array(DISTINCT genres.name)"), Alias::new("genre_names"))
            .expr_as(Expr::cust("json_group_array(DISTINCT actors.name)"), Alias::new("cast_names"));
        join_catalog(&mut select);
        if let Some(filter) = self.filter() {
            select.cond_where(filter);
        }
        select
            .group_by_col((movie::Entity, movie::Column::Id))
            .order_by((movie::Entity, self.sort_by.column()), self.sort_order.into())
            .limit(self.per_page)
            .offset(self.offset());
        select
    }

    /// Distinct movies matched by the same joins and filters as
    /// [`MovieQuery::page_statement`], without grouping or paging.
    pub fn count_statement(&self) -> SelectStatement {
        let mut select = Query::select();
        select.expr_as(
            Func::count_distinct(Expr::col((movie::Entity, movie::Column::Id))),
            Alias::new("total"),
        );
        join_catalog(&mut select);
        if let Some(filter) = self.filter() {
            select.cond_where(filter);
        }
        select
    }
}

fn join_catalog(select: &mut SelectStatement) {
    select
        .from(movie::Entity)
        .left_join(
            movie_genre::Entity,
            Expr::col((movie::Entity, movie::Column::Id))
                .equals((movie_genre::Entity, movie_genre::Column::MovieId)),
        )
        .left_join(
            genre::Entity,
            Expr::col((movie_genre::Entity, movie_genre::Column::GenreId))
                .equals((genre::Entity, genre::Column::Id)),
        )
        .left_join(
            movie_actor::Entity,
            Expr::col((movie::Entity, movie::Column::Id))
                .equals((movie_actor::Entity, movie_actor::Column::MovieId)),
        )
        .left_join(
            actor::Entity,
            Expr::col((movie_actor::Entity, movie_actor::Column::CastId))
                .equals((actor::Entity, actor::Column::Id)),
        );
}

#[derive(Debug, FromQueryResult)]
struct AggregatedMovie {
    id: i32,
    title: String,
    original_title: Option<String>,
    overview: Option<String>,
    release_date: Option<String>,
    popularity: Option<f64>,
    vote_average: Option<f64>,
    vote_count: Option<i32>,
    revenue: Option<i64>,
    runtime: Option<i32>,
    genre_names: String,
    cast_names: String,
}

impl AggregatedMovie {
    fn into_row(self) -> AppResult<MovieRow> {
        Ok(MovieRow {
            id: self.id,
            title: self.title,
            original_title: self.original_title,
            overview: self.overview,
            release_date: self.release_date,
            popularity: self.popularity,
            vote_average: self.vote_average,
            vote_count: self.vote_count,
            revenue: self.revenue,
            runtime: self.runtime,
            genre_names: name_list(&self.genre_names)?,
            cast_names: name_list(&self.cast_names)?,
        })
    }
}

fn name_list(json: &str) -> AppResult<Vec<String>> {
    let names: Vec<Option<String>> = serde_json::from_str(json)?;
    Ok(names.into_iter().flatten().collect())
}

#[derive(Clone)]
pub struct MovieSearch {
    db: DatabaseConnection,
}

impl MovieSearch {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn search(&self, query: &MovieQuery) -> AppResult<MoviePage> {
        let backend = self.db.get_database_backend();

        let rows = AggregatedMovie::find_by_statement(backend.build(&query.page_statement()))
            .all(&self.db)
            .await?;

        let total: i64 = match self.db.query_one(backend.build(&query.count_statement())).await? {
            Some(row) => row.try_get("", "total")?,
            None => 0,
        };
        let total = u64::try_from(total).unwrap_or(0);

        debug!(?query, returned = rows.len(), total, "searched movies");

        Ok(MoviePage {
            results: rows.into_iter().map(AggregatedMovie::into_row).collect::<AppResult<_>>()?,
            page: query.page,
            total_pages: total.div_ceil(query.per_page.max(1)),
            total_results: total,
        })
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::sea_query::SqliteQueryBuilder;

    use super::*;

    fn params(pairs: &[(&str, &str)]) -> MovieQueryParams {
        let map: serde_json::Map<String, serde_json::Value> =
            pairs.iter().map(|(k, v)| (k.to_string(), serde_json::Value::from(*v))).collect();
        serde_json::from_value(serde_json::Value::Object(map)).unwrap()
    }

    #[test]
    fn defaults_are_applied_when_params_are_missing() {
        let query = MovieQueryParams::default().validate(2026).unwrap();
        assert_eq!(query, MovieQuery::default());
        assert_eq!(query.page, 1);
        assert_eq!(query.per_page, 20);
        assert_eq!(query.sort_by, SortField::Popularity);
        assert_eq!(query.sort_order, SortOrder::Desc);
    }

    #[test]
    fn full_request_is_parsed() {
        let query = params(&[
            ("page", "3"),
            ("perPage", "50"),
            ("year", "2020"),
            ("genres", "1,2"),
            ("without_genres", "3"),
            ("sort_by", "title"),
            ("sort_order", "asc"),
            ("search", "smith"),
        ])
        .validate(2026)
        .unwrap();

        assert_eq!(query.page, 3);
        assert_eq!(query.per_page, 50);
        assert_eq!(query.offset(), 100);
        assert_eq!(query.year, Some(2020));
        assert_eq!(query.genres, vec![1, 2]);
        assert_eq!(query.without_genres, vec![3]);
        assert_eq!(query.sort_by, SortField::Title);
        assert_eq!(query.sort_order, SortOrder::Asc);
        assert_eq!(query.search.as_deref(), Some("smith"));
    }

    #[test]
    fn out_of_range_and_unknown_values_are_rejected() {
        let rejected = [
            ("perPage", "500"),
            ("perPage", "0"),
            ("page", "0"),
            ("page", "abc"),
            ("year", "1899"),
            ("year", "2028"),
            ("year", "20x0"),
            ("genres", "1,,2"),
            ("genres", "1;DROP TABLE movies"),
            ("without_genres", ""),
            ("sort_by", "budget"),
            ("sort_by", "title; --"),
            ("sort_order", "sideways"),
            ("search", ""),
        ];
        for (key, value) in rejected {
            let err = params(&[(key, value)]).validate(2026).unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "{key}={value} should be rejected");
        }

        let too_far = (MAX_PAGE + 1).to_string();
        assert!(params(&[("page", &too_far)]).validate(2026).is_err());
        let last = params(&[("page", &MAX_PAGE.to_string()), ("perPage", "100")])
            .validate(2026)
            .unwrap();
        assert!(i64::try_from(last.offset()).is_ok());

        let long = "a".repeat(256);
        assert!(params(&[("search", &long)]).validate(2026).is_err());
        assert!(params(&[("year", "2027")]).validate(2026).is_ok());
    }

    #[test]
    fn page_statement_applies_allow_listed_sort_and_paging() {
        let query = MovieQuery {
            page: 2,
            per_page: 10,
            sort_by: SortField::Title,
            sort_order: SortOrder::Asc,
            ..Default::default()
        };
        let (sql, _) = query.page_statement().build(SqliteQueryBuilder);

        assert!(sql.contains(r#"LEFT JOIN "movie_genres""#), "{sql}");
        assert!(sql.contains(r#"LEFT JOIN "actors""#), "{sql}");
        assert!(sql.contains(r#"GROUP BY "movies"."id""#), "{sql}");
        assert!(sql.contains(r#"ORDER BY "movies"."title" ASC"#), "{sql}");
        assert!(sql.contains("LIMIT"), "{sql}");
        assert!(!sql.contains("WHERE"), "{sql}");
    }

    #[test]
    fn user_values_are_bound_never_inlined() {
        let query = MovieQuery {
            year: Some(2020),
            genres: vec![101, 202],
            without_genres: vec![303],
            search: Some("O'Smith".to_string()),
            ..Default::default()
        };

        for statement in [query.page_statement(), query.count_statement()] {
            let (sql, values) = statement.build(SqliteQueryBuilder);
            for literal in ["2020", "101", "202", "303", "smith"] {
                assert!(!sql.to_lowercase().contains(literal), "{literal} inlined in {sql}");
            }
            let bound = format!("{values:?}");
            assert!(bound.contains("%o'smith%"), "{bound}");
            assert!(bound.contains("303"), "{bound}");
        }
    }

    #[test]
    fn exclusion_is_a_subquery_and_search_is_a_disjunction() {
        let query = MovieQuery {
            without_genres: vec![3],
            search: Some("smith".to_string()),
            ..Default::default()
        };
        let (sql, _) = query.page_statement().build(SqliteQueryBuilder);

        assert!(sql.contains(r#""movies"."id" NOT IN (SELECT "excluded"."movie_id""#), "{sql}");
        assert!(sql.contains(" OR "), "{sql}");
        assert!(sql.contains("ESCAPE"), "{sql}");
    }

    #[test]
    fn count_statement_shares_filters_but_not_paging() {
        let query = MovieQuery { genres: vec![1], ..Default::default() };
        let (sql, values) = query.count_statement().build(SqliteQueryBuilder);

        assert!(sql.contains("COUNT(DISTINCT"), "{sql}");
        assert!(sql.contains(r#""movie_genres"."genre_id" IN"#), "{sql}");
        assert!(!sql.contains("GROUP BY"), "{sql}");
        assert!(!sql.contains("LIMIT"), "{sql}");
        assert_eq!(values.0.len(), 1);
    }

    #[test]
    fn search_matches_case_folded_keys() {
        let query = MovieQuery { search: Some("ÉLODIE".to_string()), ..Default::default() };
        let (sql, values) = query.count_statement().build(SqliteQueryBuilder);

        assert!(sql.contains(r#""movies"."title_key" LIKE"#), "{sql}");
        assert!(sql.contains(r#""actors"."name_key" LIKE"#), "{sql}");
        assert!(!sql.contains("LOWER"), "{sql}");
        assert!(format!("{values:?}").contains("%élodie%"));
    }

    #[test]
    fn like_metacharacters_are_escaped() {
        assert_eq!(escape_like("100%_off\\"), "100\\%\\_off\\\\");
    }

    #[test]
    fn aggregated_names_drop_nulls() {
        assert_eq!(name_list(r#"["Drama", null, "Crime"]"#).unwrap(), vec!["Drama", "Crime"]);
        assert!(name_list("[null]").unwrap().is_empty());
    }
}
