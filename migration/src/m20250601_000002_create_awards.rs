use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Awards::Table)
                    .if_not_exists()
                    .col(pk_auto(Awards::Id))
                    .col(string(Awards::FilmTitle))
                    .col(string(Awards::FilmKey))
                    .col(string(Awards::FilmMatchKey))
                    .col(integer(Awards::FilmReleaseYear))
                    .col(integer(Awards::CeremonyYear))
                    .col(integer(Awards::ActorId))
                    .col(integer_null(Awards::CategoryId))
                    .col(boolean(Awards::Winner))
                    .col(string_null(Awards::PosterUrl))
                    .col(integer_null(Awards::FilmId))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_awards_ceremony_year")
                            .from(Awards::Table, Awards::CeremonyYear)
                            .to(CeremonyYears::Table, CeremonyYears::Year),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_awards_actor_id")
                            .from(Awards::Table, Awards::ActorId)
                            .to(Actors::Table, Actors::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_awards_category_id")
                            .from(Awards::Table, Awards::CategoryId)
                            .to(Categories::Table, Categories::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_awards_film_id")
                            .from(Awards::Table, Awards::FilmId)
                            .to(Films::Table, Films::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_awards_dedup_key")
                    .table(Awards::Table)
                    .col(Awards::FilmReleaseYear)
                    .col(Awards::FilmKey)
                    .col(Awards::ActorId)
                    .col(Awards::CategoryId)
                    .col(Awards::Winner)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_awards_ceremony_year")
                    .table(Awards::Table)
                    .col(Awards::CeremonyYear)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_awards_film_id")
                    .table(Awards::Table)
                    .col(Awards::FilmId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Awards::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Awards {
    Table,
    Id,
    FilmTitle,
    FilmKey,
    FilmMatchKey,
    FilmReleaseYear,
    CeremonyYear,
    ActorId,
    CategoryId,
    Winner,
    PosterUrl,
    FilmId,
}

#[derive(DeriveIden)]
enum Films {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Actors {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Categories {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum CeremonyYears {
    Table,
    Year,
}
