use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Films::Table)
                    .if_not_exists()
                    .col(pk_auto(Films::Id))
                    .col(integer_null(Films::ExternalId))
                    .col(string(Films::Title))
                    .col(string(Films::TitleKey))
                    .col(text_null(Films::Overview))
                    .col(string_null(Films::ReleaseDate))
                    .col(string_null(Films::PosterUrl))
                    .col(double_null(Films::VoteAverage))
                    .col(boolean(Films::IsOscarWinner).default(false))
                    .col(boolean(Films::IsBaftaWinner).default(false))
                    .col(integer_null(Films::BaftaWinnerYear))
                    .col(integer(Films::RecommendCount).default(0))
                    .to_owned(),
            )
            .await?;

        // sqlite treats NULLs as distinct, so only present ids collide
        manager
            .create_index(
                Index::create()
                    .name("idx_films_external_id")
                    .table(Films::Table)
                    .col(Films::ExternalId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_films_title_key")
                    .table(Films::Table)
                    .col(Films::TitleKey)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Actors::Table)
                    .if_not_exists()
                    .col(pk_auto(Actors::Id))
                    .col(string(Actors::Name))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_actors_name")
                    .table(Actors::Table)
                    .col(Actors::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Categories::Table)
                    .if_not_exists()
                    .col(pk_auto(Categories::Id))
                    .col(string(Categories::Name))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_categories_name")
                    .table(Categories::Table)
                    .col(Categories::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CeremonyYears::Table)
                    .if_not_exists()
                    .col(integer(CeremonyYears::Year).primary_key())
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(CeremonyYears::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Categories::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Actors::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Films::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Films {
    Table,
    Id,
    ExternalId,
    Title,
    TitleKey,
    Overview,
    ReleaseDate,
    PosterUrl,
    VoteAverage,
    IsOscarWinner,
    IsBaftaWinner,
    BaftaWinnerYear,
    RecommendCount,
}

#[derive(DeriveIden)]
enum Actors {
    Table,
    Id,
    Name,
}

#[derive(DeriveIden)]
enum Categories {
    Table,
    Id,
    Name,
}

#[derive(DeriveIden)]
enum CeremonyYears {
    Table,
    Year,
}
