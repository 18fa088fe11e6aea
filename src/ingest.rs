//! Award ledger ingestion.
//!
//! Rows are processed one at a time inside a single batch transaction. Each
//! row runs in its own savepoint so a failure only discards that row's
//! writes; the batch transaction is committed once at the end as the final
//! flush.

use std::{collections::BTreeSet, path::Path};

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    DbErr, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    enrich::{self, Metadata, MetadataLookup},
    entities::award,
    ledger::{LedgerError, LedgerRow},
    matcher,
    resolver::{NaturalKey, resolve},
};

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("missing required field: {field}")]
    Validation { field: &'static str },
    #[error("award already recorded")]
    Duplicate {
        /// The recorded award has no film reference.
        unlinked: bool,
    },
    #[error("store error: {0}")]
    Store(#[from] DbErr),
    #[error("final commit failed ({added} added, {skipped} skipped were rolled back): {source}")]
    BatchCommit { source: DbErr, added: usize, skipped: usize },
}

/// Switches for catalog-building runs. Both are off for a plain ledger load.
#[derive(Clone, Copy, Debug, Default)]
pub struct IngestOptions {
    /// Look up an award-specific poster for every new Award.
    pub fetch_posters: bool,
    /// Create a Film from metadata when the catalog has no match.
    pub create_missing_films: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub added: usize,
    pub skipped: usize,
    pub skipped_invalid: usize,
    pub skipped_duplicate: usize,
    pub failed: usize,
    pub films_created: usize,
    pub enrichment_unavailable: usize,
    pub unmatched_titles: BTreeSet<String>,
}

impl IngestReport {
    fn skip(&mut self, err: &IngestError) {
        self.skipped += 1;
        match err {
            IngestError::Validation { .. } => self.skipped_invalid += 1,
            IngestError::Duplicate { .. } => self.skipped_duplicate += 1,
            IngestError::Store(_) | IngestError::BatchCommit { .. } => self.failed += 1,
        }
    }

    /// Writes the unmatched titles, one per line, sorted.
    pub async fn write_unmatched(&self, path: &Path) -> std::io::Result<()> {
        let mut body = String::new();
        for title in &self.unmatched_titles {
            body.push_str(title);
            body.push('\n');
        }
        tokio::fs::write(path, body).await
    }
}

/// A validated ledger row.
#[derive(Clone, Debug)]
struct AwardRow {
    film: String,
    actor: String,
    category: Option<String>,
    year_film: i32,
    year_ceremony: i32,
    winner: bool,
}

impl TryFrom<&LedgerRow> for AwardRow {
    type Error = IngestError;

    fn try_from(row: &LedgerRow) -> Result<Self, Self::Error> {
        fn required(value: &Option<String>, field: &'static str) -> Result<String, IngestError> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or(IngestError::Validation { field })
        }

        Ok(Self {
            film: required(&row.film, "film")?,
            actor: required(&row.name, "name")?,
            category: row
                .category
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
            year_film: row.year_film.ok_or(IngestError::Validation { field: "year_film" })?,
            year_ceremony: row
                .year_ceremony
                .ok_or(IngestError::Validation { field: "year_ceremony" })?,
            winner: row.winner,
        })
    }
}

struct Persisted {
    award_id: i32,
    matched: bool,
    film_created: bool,
    enrichment_unavailable: bool,
}

pub struct Ingestor<'a, L> {
    db: &'a DatabaseConnection,
    lookup: Option<&'a L>,
    options: IngestOptions,
}

impl<'a, L> Ingestor<'a, L>
where
    L: MetadataLookup,
{
    pub fn new(db: &'a DatabaseConnection, lookup: Option<&'a L>, options: IngestOptions) -> Self {
        Self { db, lookup, options }
    }

    /// Ingests every row and flushes once at the end.
    ///
    /// Row-level problems are counted in the report. Only a failure to open
    /// or commit the batch transaction aborts the run.
    pub async fn run<I>(&self, rows: I) -> Result<IngestReport, IngestError>
    where
        I: IntoIterator<Item = Result<LedgerRow, LedgerError>>,
    {
        let batch = self.db.begin().await?;
        let mut report = IngestReport::default();

        for (index, row) in rows.into_iter().enumerate() {
            let row = match row {
                Ok(row) => row,
                Err(err) => {
                    warn!(row = index, error = %err, "skipping malformed ledger record");
                    report.skip(&IngestError::Validation { field: "record" });
                    continue;
                },
            };

            let parsed = match AwardRow::try_from(&row) {
                Ok(parsed) => parsed,
                Err(err) => {
                    debug!(row = index, error = %err, "skipping invalid row");
                    report.skip(&err);
                    continue;
                },
            };

            match self.ingest_row(&batch, &parsed).await {
                Ok(done) => {
                    report.added += 1;
                    if done.film_created {
                        report.films_created += 1;
                    }
                    if done.enrichment_unavailable {
                        report.enrichment_unavailable += 1;
                    }
                    if !done.matched {
                        report.unmatched_titles.insert(parsed.film.clone());
                    }
                    debug!(row = index, award_id = done.award_id, film = %parsed.film, "award added");
                },
                Err(err @ IngestError::Duplicate { unlinked }) => {
                    debug!(
                        row = index,
                        film = %parsed.film,
                        year_film = parsed.year_film,
                        winner = parsed.winner,
                        "skipping existing award"
                    );
                    // the stored award is still unmatched, so this run reports it too
                    if unlinked {
                        report.unmatched_titles.insert(parsed.film.clone());
                    }
                    report.skip(&err);
                },
                Err(err) => {
                    warn!(row = index, film = %parsed.film, error = %err, "failed to ingest row");
                    report.skip(&err);
                },
            }
        }

        if let Err(source) = batch.commit().await {
            return Err(IngestError::BatchCommit {
                source,
                added: report.added,
                skipped: report.skipped,
            });
        }

        info!(
            added = report.added,
            skipped = report.skipped,
            duplicates = report.skipped_duplicate,
            invalid = report.skipped_invalid,
            failed = report.failed,
            unmatched = report.unmatched_titles.len(),
            "ledger ingestion finished"
        );
        Ok(report)
    }

    /// Runs one row inside a savepoint, releasing it on success and rolling
    /// it back on any error.
    async fn ingest_row(
        &self,
        batch: &DatabaseTransaction,
        row: &AwardRow,
    ) -> Result<Persisted, IngestError> {
        let savepoint = batch.begin().await?;
        match self.persist_row(&savepoint, row).await {
            Ok(done) => {
                savepoint.commit().await?;
                Ok(done)
            },
            Err(err) => {
                savepoint.rollback().await?;
                Err(err)
            },
        }
    }

    async fn persist_row<C>(&self, conn: &C, row: &AwardRow) -> Result<Persisted, IngestError>
    where
        C: ConnectionTrait,
    {
        let actor_id = resolve(conn, NaturalKey::Actor(&row.actor)).await?.id();
        let category_id = match &row.category {
            Some(name) => Some(resolve(conn, NaturalKey::Category(name)).await?.id()),
            None => None,
        };
        let ceremony_year = resolve(conn, NaturalKey::CeremonyYear(row.year_ceremony)).await?.id();

        let film_key = matcher::title_key(&row.film);
        if let Some(existing) = find_duplicate(conn, row, &film_key, actor_id, category_id).await? {
            return Err(IngestError::Duplicate { unlinked: existing.film_id.is_none() });
        }

        let mut film_id = matcher::match_title(conn, &row.film).await?.map(|f| f.id);

        let wants_lookup =
            self.options.fetch_posters || (self.options.create_missing_films && film_id.is_none());
        let mut enrichment_unavailable = false;
        let metadata = match self.lookup.filter(|_| wants_lookup) {
            Some(lookup) => match lookup.lookup(&row.film, Some(row.year_ceremony)).await {
                Ok(meta) => meta,
                Err(err) => {
                    warn!(film = %row.film, error = %err, "metadata lookup unavailable");
                    enrichment_unavailable = true;
                    None
                },
            },
            None => None,
        };

        let mut film_created = false;
        if film_id.is_none() && self.options.create_missing_films {
            if let Some(meta) = &metadata {
                let (id, created) = film_from_metadata(conn, &row.film, meta).await?;
                film_id = Some(id);
                film_created = created;
            }
        }

        let poster_url = if self.options.fetch_posters {
            metadata.as_ref().and_then(|m| m.poster_url.clone())
        } else {
            None
        };

        let saved = award::ActiveModel {
            film_title: Set(row.film.clone()),
            film_key: Set(film_key),
            film_match_key: Set(matcher::match_key(&row.film)),
            film_release_year: Set(row.year_film),
            ceremony_year: Set(ceremony_year),
            actor_id: Set(actor_id),
            category_id: Set(category_id),
            winner: Set(row.winner),
            poster_url: Set(poster_url),
            film_id: Set(film_id),
            ..Default::default()
        }
        .insert(conn)
        .await?;

        Ok(Persisted {
            award_id: saved.id,
            matched: film_id.is_some(),
            film_created,
            enrichment_unavailable,
        })
    }
}

async fn find_duplicate<C>(
    conn: &C,
    row: &AwardRow,
    film_key: &str,
    actor_id: i32,
    category_id: Option<i32>,
) -> Result<Option<award::Model>, DbErr>
where
    C: ConnectionTrait,
{
    let category = match category_id {
        Some(id) => award::Column::CategoryId.eq(id),
        None => award::Column::CategoryId.is_null(),
    };
    award::Entity::find()
        .filter(award::Column::FilmReleaseYear.eq(row.year_film))
        .filter(award::Column::FilmKey.eq(film_key))
        .filter(award::Column::ActorId.eq(actor_id))
        .filter(category)
        .filter(award::Column::Winner.eq(row.winner))
        .one(conn)
        .await
}

/// Reuses the film holding this external id, or creates one titled after the
/// ledger string.
async fn film_from_metadata<C>(conn: &C, title: &str, meta: &Metadata) -> Result<(i32, bool), DbErr>
where
    C: ConnectionTrait,
{
    if let Some(existing) = enrich::find_by_external_id(conn, meta.external_id).await? {
        return Ok((existing.id, false));
    }
    let mut model = enrich::new_film(title);
    enrich::apply_metadata(&mut model, meta);
    let film = model.insert(conn).await?;
    debug!(title = %title, film_id = film.id, external_id = meta.external_id, "film created from metadata");
    Ok((film.id, true))
}
