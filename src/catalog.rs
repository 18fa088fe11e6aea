//! Catalog maintenance outside the ledger run: seeding films for an award
//! scheme, setting winner flags, and relinking unmatched awards.

use std::path::Path;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
    sea_query::{Expr, Query},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    enrich::{self, MetadataLookup},
    entities::{award, film},
    matcher,
};

/// Award schemes whose winners are tracked as film flags.
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum Scheme {
    Bafta,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct CatalogEntry {
    pub title: String,
    /// Ceremony year.
    pub year: i32,
    #[serde(default)]
    pub winner: bool,
}

pub fn read_entries(path: &Path) -> anyhow::Result<Vec<CatalogEntry>> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CatalogReport {
    pub created: usize,
    pub updated: usize,
    pub no_match: usize,
    pub unavailable: usize,
    pub failed: usize,
}

/// Creates a film for each scheme entry from its metadata, or flags the
/// film already holding that external id. Each entry commits on its own.
pub async fn load_catalog<L>(
    db: &DatabaseConnection,
    lookup: &L,
    entries: &[CatalogEntry],
    scheme: Scheme,
) -> Result<CatalogReport, DbErr>
where
    L: MetadataLookup,
{
    let mut report = CatalogReport::default();

    for entry in entries {
        let meta = match lookup.lookup(&entry.title, Some(entry.year)).await {
            Ok(Some(meta)) => meta,
            Ok(None) => {
                warn!(title = %entry.title, year = entry.year, "no metadata results for catalog entry");
                report.no_match += 1;
                continue;
            },
            Err(err) => {
                warn!(title = %entry.title, year = entry.year, error = %err, "metadata lookup unavailable");
                report.unavailable += 1;
                continue;
            },
        };

        let txn = db.begin().await?;
        let existing = enrich::find_by_external_id(&txn, meta.external_id).await?;
        let created = existing.is_none();
        let mut model = match existing {
            Some(film) => film.into_active_model(),
            None => {
                let mut model = enrich::new_film(&entry.title);
                enrich::apply_metadata(&mut model, &meta);
                if model.release_date.as_ref().is_none() {
                    model.release_date = Set(Some(format!("{}-01-01", entry.year)));
                }
                model
            },
        };
        match scheme {
            Scheme::Bafta => {
                if entry.winner {
                    model.is_bafta_winner = Set(true);
                }
                model.bafta_winner_year = Set(Some(entry.year));
            },
        }

        match model.save(&txn).await {
            Ok(_) => {
                txn.commit().await?;
                debug!(title = %entry.title, year = entry.year, winner = entry.winner, created, "catalog entry stored");
                if created {
                    report.created += 1;
                } else {
                    report.updated += 1;
                }
            },
            Err(err) => {
                txn.rollback().await?;
                warn!(title = %entry.title, error = %err, "failed to store catalog entry");
                report.failed += 1;
            },
        }
    }

    info!(
        created = report.created,
        updated = report.updated,
        no_match = report.no_match,
        unavailable = report.unavailable,
        failed = report.failed,
        "catalog load finished"
    );
    Ok(report)
}

/// Marks every film referenced by a winning award as an Oscar winner.
pub async fn flag_oscar_winners(db: &DatabaseConnection) -> Result<u64, DbErr> {
    let winners = Query::select()
        .column(award::Column::FilmId)
        .from(award::Entity)
        .and_where(Expr::col(award::Column::Winner).eq(true))
        .and_where(Expr::col(award::Column::FilmId).is_not_null())
        .to_owned();

    let result = film::Entity::update_many()
        .col_expr(film::Column::IsOscarWinner, Expr::value(true))
        .filter(film::Column::IsOscarWinner.eq(false))
        .filter(film::Column::Id.in_subquery(winners))
        .exec(db)
        .await?;

    info!(flagged = result.rows_affected, "oscar winner flags updated");
    Ok(result.rows_affected)
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RelinkReport {
    pub examined: usize,
    pub linked: usize,
    pub still_unmatched: usize,
}

/// Re-runs film matching for awards without a film reference. Only ever
/// invoked explicitly; ingestion does not relink on its own.
pub async fn relink_unmatched(db: &DatabaseConnection) -> Result<RelinkReport, DbErr> {
    let titles: Vec<(String, String)> = award::Entity::find()
        .select_only()
        .column(award::Column::FilmKey)
        .column_as(award::Column::FilmTitle.min(), "film_title")
        .filter(award::Column::FilmId.is_null())
        .group_by(award::Column::FilmKey)
        .order_by_asc(award::Column::FilmKey)
        .into_tuple()
        .all(db)
        .await?;

    let mut report = RelinkReport { examined: titles.len(), ..Default::default() };
    for (key, title) in titles {
        let Some(film) = matcher::match_title(db, &title).await? else {
            report.still_unmatched += 1;
            continue;
        };
        let result = award::Entity::update_many()
            .col_expr(award::Column::FilmId, Expr::value(film.id))
            .filter(award::Column::FilmKey.eq(key))
            .filter(award::Column::FilmId.is_null())
            .exec(db)
            .await?;
        debug!(title = %title, film_id = film.id, awards = result.rows_affected, "relinked awards");
        report.linked += 1;
    }

    info!(
        examined = report.examined,
        linked = report.linked,
        still_unmatched = report.still_unmatched,
        "relink finished"
    );
    Ok(report)
}
