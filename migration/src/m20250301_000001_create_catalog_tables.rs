use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Genres::Table)
                    .if_not_exists()
                    .col(integer(Genres::Id).primary_key())
                    .col(string(Genres::Name))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Movies::Table)
                    .if_not_exists()
                    .col(integer(Movies::Id).primary_key())
                    .col(string(Movies::Title))
                    .col(string(Movies::TitleKey))
                    .col(string_null(Movies::OriginalTitle))
                    .col(text_null(Movies::Overview))
                    .col(string_null(Movies::ReleaseDate))
                    .col(double_null(Movies::Popularity))
                    .col(double_null(Movies::VoteAverage))
                    .col(integer_null(Movies::VoteCount))
                    .col(big_integer_null(Movies::Revenue))
                    .col(integer_null(Movies::Runtime))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MovieGenres::Table)
                    .if_not_exists()
                    .col(integer(MovieGenres::MovieId))
                    .col(integer(MovieGenres::GenreId))
                    .primary_key(
                        Index::create().col(MovieGenres::MovieId).col(MovieGenres::GenreId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_movie_genres_movie")
                            .from(MovieGenres::Table, MovieGenres::MovieId)
                            .to(Movies::Table, Movies::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_movie_genres_genre")
                            .from(MovieGenres::Table, MovieGenres::GenreId)
                            .to(Genres::Table, Genres::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_movie_genres_genre_id")
                    .table(MovieGenres::Table)
                    .col(MovieGenres::GenreId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Actors::Table)
                    .if_not_exists()
                    .col(integer(Actors::Id).primary_key())
                    .col(string(Actors::Name))
                    .col(string(Actors::NameKey))
                    .col(integer_null(Actors::Gender))
                    .col(double_null(Actors::Popularity))
                    .col(string_null(Actors::ProfilePath))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MovieActors::Table)
                    .if_not_exists()
                    .col(integer(MovieActors::MovieId))
                    .col(integer(MovieActors::CastId))
                    .col(string_null(MovieActors::CharacterName))
                    .col(integer_null(MovieActors::OrderNum))
                    .primary_key(
                        Index::create().col(MovieActors::MovieId).col(MovieActors::CastId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_movie_actors_movie")
                            .from(MovieActors::Table, MovieActors::MovieId)
                            .to(Movies::Table, Movies::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_movie_actors_actor")
                            .from(MovieActors::Table, MovieActors::CastId)
                            .to(Actors::Table, Actors::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_movie_actors_cast_id")
                    .table(MovieActors::Table)
                    .col(MovieActors::CastId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(MovieActors::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Actors::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(MovieGenres::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Movies::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Genres::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Genres {
    Table,
    Id,
    Name,
}

#[derive(DeriveIden)]
enum Movies {
    Table,
    Id,
    Title,
    TitleKey,
    OriginalTitle,
    Overview,
    ReleaseDate,
    Popularity,
    VoteAverage,
    VoteCount,
    Revenue,
    Runtime,
}

#[derive(DeriveIden)]
enum MovieGenres {
    Table,
    MovieId,
    GenreId,
}

#[derive(DeriveIden)]
enum Actors {
    Table,
    Id,
    Name,
    NameKey,
    Gender,
    Popularity,
    ProfilePath,
}

#[derive(DeriveIden)]
enum MovieActors {
    Table,
    MovieId,
    CastId,
    CharacterName,
    OrderNum,
}
