use sea_orm::{
    DatabaseConnection, DatabaseTransaction, EntityTrait, PaginatorTrait, QueryOrder, Set,
    TransactionTrait, sea_query::OnConflict,
};
use tracing::{debug, warn};

use crate::{
    entities::{actor, genre, movie, movie_actor, movie_genre},
    error::AppResult,
    models::{CastMember, GenreRef, MovieBundle, MovieRecord, search_key},
};

/// Rows actually written for one movie. Rows that already existed are not
/// counted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreOutcome {
    pub movie_inserted: bool,
    pub genres_inserted: u64,
    pub cast_inserted: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TableCounts {
    pub movies: u64,
    pub genres: u64,
    pub actors: u64,
    pub movie_genres: u64,
    pub movie_actors: u64,
}

#[derive(Clone)]
pub struct MovieStore {
    db: DatabaseConnection,
}

impl MovieStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Writes the movie, its genres and its cast in one transaction. Existing
    /// rows are left untouched; any failure rolls back the whole movie.
    pub async fn store_movie(&self, bundle: &MovieBundle) -> AppResult<StoreOutcome> {
        let txn = self.db.begin().await?;

        match write_bundle(&txn, bundle).await {
            Ok(outcome) => {
                txn.commit().await?;
                debug!(movie_id = bundle.movie.id, ?outcome, "stored movie");
                Ok(outcome)
            },
            Err(err) => {
                if let Err(rollback_err) = txn.rollback().await {
                    warn!(movie_id = bundle.movie.id, error = %rollback_err, "rollback failed");
                }
                Err(err)
            },
        }
    }

    pub async fn list_genres(&self) -> AppResult<Vec<genre::Model>> {
        let genres = genre::Entity::find().order_by_asc(genre::Column::Name).all(&self.db).await?;
        Ok(genres)
    }

    pub async fn counts(&self) -> AppResult<TableCounts> {
        Ok(TableCounts {
            movies: movie::Entity::find().count(&self.db).await?,
            genres: genre::Entity::find().count(&self.db).await?,
            actors: actor::Entity::find().count(&self.db).await?,
            movie_genres: movie_genre::Entity::find().count(&self.db).await?,
            movie_actors: movie_actor::Entity::find().count(&self.db).await?,
        })
    }
}

async fn write_bundle(txn: &DatabaseTransaction, bundle: &MovieBundle) -> AppResult<StoreOutcome> {
    let movie_id = bundle.movie.id;
    let mut outcome = StoreOutcome {
        movie_inserted: insert_movie(txn, &bundle.movie).await? > 0,
        ..Default::default()
    };

    for g in &bundle.genres {
        insert_genre(txn, g).await?;
        outcome.genres_inserted += link_genre(txn, movie_id, g.id).await?;
    }

    for member in &bundle.cast {
        insert_actor(txn, member).await?;
        outcome.cast_inserted += link_actor(txn, movie_id, member).await?;
    }

    Ok(outcome)
}

async fn insert_movie(txn: &DatabaseTransaction, record: &MovieRecord) -> AppResult<u64> {
    let title = record
        .title
        .clone()
        .ok_or_else(|| anyhow::anyhow!("movie {} has no title in any source", record.id))?;

    let model = movie::ActiveModel {
        id: Set(record.id),
        title_key: Set(search_key(&title)),
        title: Set(title),
        original_title: Set(record.original_title.clone()),
        overview: Set(record.overview.clone()),
        release_date: Set(record.release_date.clone()),
        popularity: Set(record.popularity),
        vote_average: Set(record.vote_average),
        vote_count: Set(record.vote_count),
        revenue: Set(Some(record.revenue)),
        runtime: Set(Some(record.runtime)),
    };

    let inserted = movie::Entity::insert(model)
        .on_conflict(OnConflict::column(movie::Column::Id).do_nothing().to_owned())
        .exec_without_returning(txn)
        .await?;
    Ok(inserted)
}

async fn insert_genre(txn: &DatabaseTransaction, g: &GenreRef) -> AppResult<u64> {
    let model = genre::ActiveModel { id: Set(g.id), name: Set(g.name.clone()) };

    let inserted = genre::Entity::insert(model)
        .on_conflict(OnConflict::column(genre::Column::Id).do_nothing().to_owned())
        .exec_without_returning(txn)
        .await?;
    Ok(inserted)
}

async fn link_genre(txn: &DatabaseTransaction, movie_id: i32, genre_id: i32) -> AppResult<u64> {
    let model = movie_genre::ActiveModel { movie_id: Set(movie_id), genre_id: Set(genre_id) };

    let inserted = movie_genre::Entity::insert(model)
        .on_conflict(
            OnConflict::columns([movie_genre::Column::MovieId, movie_genre::Column::GenreId])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(txn)
        .await?;
    Ok(inserted)
}

async fn insert_actor(txn: &DatabaseTransaction, member: &CastMember) -> AppResult<u64> {
    let name =
        member.name.clone().ok_or_else(|| anyhow::anyhow!("cast member {} has no name", member.id))?;

    let model = actor::ActiveModel {
        id: Set(member.id),
        name_key: Set(search_key(&name)),
        name: Set(name),
        gender: Set(member.gender),
        popularity: Set(member.popularity),
        profile_path: Set(member.profile_path.clone()),
    };

    let inserted = actor::Entity::insert(model)
        .on_conflict(OnConflict::column(actor::Column::Id).do_nothing().to_owned())
        .exec_without_returning(txn)
        .await?;
    Ok(inserted)
}

async fn link_actor(txn: &DatabaseTransaction, movie_id: i32, member: &CastMember) -> AppResult<u64> {
    let model = movie_actor::ActiveModel {
        movie_id: Set(movie_id),
        cast_id: Set(member.id),
        character_name: Set(member.character.clone()),
        order_num: Set(member.order),
    };

    let inserted = movie_actor::Entity::insert(model)
        .on_conflict(
            OnConflict::columns([movie_actor::Column::MovieId, movie_actor::Column::CastId])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(txn)
        .await?;
    Ok(inserted)
}
