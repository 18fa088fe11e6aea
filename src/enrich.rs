use std::future::Future;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    entities::{award, film},
    matcher,
    tmdb::{EnrichmentError, SearchMovie, TmdbClient},
};

/// Normalized metadata for one film from the external service.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Metadata {
    pub external_id: i32,
    pub title: Option<String>,
    pub release_date: Option<String>,
    pub poster_url: Option<String>,
    pub vote_average: Option<f64>,
    pub overview: Option<String>,
}

/// Maps a ceremony year to the release year a nominated film most likely
/// has. Ceremonies honour the previous calendar year's releases, hence the
/// default lag of one.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ReleaseYearPolicy {
    pub lag_years: i32,
}

impl Default for ReleaseYearPolicy {
    fn default() -> Self {
        Self { lag_years: 1 }
    }
}

impl ReleaseYearPolicy {
    pub fn expected_release_year(self, ceremony_year: i32) -> i32 {
        ceremony_year - self.lag_years
    }

    /// Picks the first candidate released in the expected year, otherwise
    /// the first candidate.
    pub fn select<'a>(self, results: &'a [SearchMovie], year_hint: Option<i32>) -> Option<&'a SearchMovie> {
        let preferred = year_hint.and_then(|hint| {
            let expected = self.expected_release_year(hint);
            results.iter().find(|r| release_year(r.release_date.as_deref()) == Some(expected))
        });
        preferred.or_else(|| results.first())
    }
}

fn release_year(date: Option<&str>) -> Option<i32> {
    date.and_then(|d| d.get(..4)).and_then(|y| y.parse().ok())
}

/// Title lookup against the metadata service.
pub trait MetadataLookup {
    fn lookup(
        &self,
        title: &str,
        year_hint: Option<i32>,
    ) -> impl Future<Output = Result<Option<Metadata>, EnrichmentError>> + Send;
}

pub struct EnrichmentClient {
    tmdb: TmdbClient,
    policy: ReleaseYearPolicy,
}

impl EnrichmentClient {
    pub fn new(tmdb: TmdbClient, policy: ReleaseYearPolicy) -> Self {
        Self { tmdb, policy }
    }
}

impl MetadataLookup for EnrichmentClient {
    async fn lookup(
        &self,
        title: &str,
        year_hint: Option<i32>,
    ) -> Result<Option<Metadata>, EnrichmentError> {
        let query = matcher::clean_title(title);
        if query.is_empty() {
            return Ok(None);
        }

        let release_year = year_hint.map(|hint| self.policy.expected_release_year(hint));
        let results = self.tmdb.search_movie(&query, release_year).await?;
        let Some(best) = self.policy.select(&results, year_hint) else {
            debug!(title = %title, "no search results");
            return Ok(None);
        };

        Ok(Some(Metadata {
            external_id: best.id,
            title: best.title.clone(),
            release_date: best.release_date.clone().filter(|d| !d.is_empty()),
            poster_url: self.tmdb.poster_url(best.poster_path.as_deref()),
            vote_average: best.vote_average,
            overview: best.overview.clone().filter(|o| !o.is_empty()),
        }))
    }
}

/// Copies metadata onto a film's active model.
pub fn apply_metadata(model: &mut film::ActiveModel, meta: &Metadata) {
    model.external_id = Set(Some(meta.external_id));
    model.poster_url = Set(meta.poster_url.clone());
    model.overview = Set(meta.overview.clone());
    model.release_date = Set(meta.release_date.clone());
    model.vote_average = Set(meta.vote_average);
}

pub fn new_film(title: &str) -> film::ActiveModel {
    film::ActiveModel {
        title: Set(title.to_string()),
        title_key: Set(matcher::title_key(title)),
        is_oscar_winner: Set(false),
        is_bafta_winner: Set(false),
        recommend_count: Set(0),
        ..Default::default()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EnrichReport {
    pub titles: usize,
    pub already_complete: usize,
    pub created: usize,
    pub updated: usize,
    pub no_match: usize,
    pub unavailable: usize,
    pub failed: usize,
}

/// Fills in missing film metadata for every distinct Award title.
///
/// Each title commits on its own; a failed commit is rolled back and the
/// pass moves on. Safe to rerun: complete films are skipped.
pub async fn enrich_award_films<L>(
    db: &DatabaseConnection,
    lookup: &L,
) -> Result<EnrichReport, DbErr>
where
    L: MetadataLookup,
{
    let titles: Vec<(String, String, i32)> = award::Entity::find()
        .select_only()
        .column(award::Column::FilmKey)
        .column_as(award::Column::FilmTitle.min(), "film_title")
        .column_as(award::Column::CeremonyYear.min(), "ceremony_year")
        .group_by(award::Column::FilmKey)
        .order_by_asc(award::Column::FilmKey)
        .into_tuple()
        .all(db)
        .await?;

    let mut report = EnrichReport { titles: titles.len(), ..Default::default() };

    for (_, title, ceremony_year) in titles {
        // exact only: a containment hit may be a different film
        let existing = matcher::find_exact(db, &title).await?;
        if existing.as_ref().is_some_and(film::Model::has_complete_metadata) {
            debug!(title = %title, "already enriched");
            report.already_complete += 1;
            continue;
        }

        let meta = match lookup.lookup(&title, Some(ceremony_year)).await {
            Ok(Some(meta)) => meta,
            Ok(None) => {
                debug!(title = %title, "no metadata match");
                report.no_match += 1;
                continue;
            },
            Err(err) => {
                warn!(title = %title, error = %err, "metadata lookup unavailable");
                report.unavailable += 1;
                continue;
            },
        };

        let created = existing.is_none();
        match upsert_film(db, existing, &title, &meta).await {
            Ok(film_id) => {
                debug!(title = %title, film_id, external_id = meta.external_id, matched = ?meta.title, "film enriched");
                if created {
                    report.created += 1;
                } else {
                    report.updated += 1;
                }
            },
            Err(err) => {
                warn!(title = %title, error = %err, "failed to store metadata");
                report.failed += 1;
            },
        }
    }

    info!(
        titles = report.titles,
        created = report.created,
        updated = report.updated,
        skipped = report.already_complete,
        no_match = report.no_match,
        unavailable = report.unavailable,
        failed = report.failed,
        "enrichment pass finished"
    );
    Ok(report)
}

async fn upsert_film(
    db: &DatabaseConnection,
    existing: Option<film::Model>,
    title: &str,
    meta: &Metadata,
) -> Result<i32, DbErr> {
    let txn = db.begin().await?;
    let saved = match existing {
        Some(film) => {
            let mut model = film.into_active_model();
            apply_metadata(&mut model, meta);
            model.update(&txn).await
        },
        None => {
            let mut model = new_film(title);
            apply_metadata(&mut model, meta);
            model.insert(&txn).await
        },
    };

    match saved {
        Ok(film) => {
            txn.commit().await?;
            Ok(film.id)
        },
        Err(err) => {
            txn.rollback().await?;
            Err(err)
        },
    }
}

/// Finds a film already carrying this external id.
pub async fn find_by_external_id<C>(conn: &C, external_id: i32) -> Result<Option<film::Model>, DbErr>
where
    C: sea_orm::ConnectionTrait,
{
    film::Entity::find().filter(film::Column::ExternalId.eq(external_id)).one(conn).await
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{
        collections::HashMap,
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use sea_orm::PaginatorTrait;

    use super::*;
    use crate::{db, resolver, tmdb};

    /// In-memory stand-in for the metadata service.
    #[derive(Default)]
    pub(crate) struct FakeLookup {
        pub found: HashMap<String, Metadata>,
        pub failing: Vec<String>,
        pub calls: AtomicUsize,
        pub hints: Mutex<Vec<(String, Option<i32>)>>,
    }

    impl FakeLookup {
        pub fn with(mut self, title: &str, external_id: i32) -> Self {
            self.found.insert(
                title.to_string(),
                Metadata {
                    external_id,
                    title: Some(title.to_string()),
                    release_date: Some("2019-05-30".to_string()),
                    poster_url: Some(format!("https://img/{external_id}.jpg")),
                    vote_average: Some(8.5),
                    overview: Some(format!("About {title}")),
                },
            );
            self
        }

        pub fn failing(mut self, title: &str) -> Self {
            self.failing.push(title.to_string());
            self
        }
    }

    impl MetadataLookup for FakeLookup {
        async fn lookup(
            &self,
            title: &str,
            year_hint: Option<i32>,
        ) -> Result<Option<Metadata>, EnrichmentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.hints.lock().unwrap().push((title.to_string(), year_hint));
            if self.failing.iter().any(|t| t == title) {
                return Err(EnrichmentError::MissingApiKey);
            }
            Ok(self.found.get(title).cloned())
        }
    }

    fn candidate(id: i32, date: &str) -> SearchMovie {
        SearchMovie {
            id,
            title: None,
            release_date: Some(date.to_string()),
            poster_path: None,
            vote_average: None,
            overview: None,
        }
    }

    async fn award_for(db: &DatabaseConnection, title: &str, ceremony: i32) {
        let actor = resolver::resolve(db, resolver::NaturalKey::Actor("Someone")).await.unwrap().id();
        resolver::resolve(db, resolver::NaturalKey::CeremonyYear(ceremony)).await.unwrap();
        award::ActiveModel {
            film_title: Set(title.to_string()),
            film_key: Set(matcher::title_key(title)),
            film_match_key: Set(matcher::match_key(title)),
            film_release_year: Set(ceremony - 1),
            ceremony_year: Set(ceremony),
            actor_id: Set(actor),
            category_id: Set(None),
            winner: Set(true),
            poster_url: Set(None),
            film_id: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap();
    }

    #[test]
    fn policy_prefers_year_before_ceremony() {
        let results = vec![candidate(1, "1950-01-01"), candidate(2, "2019-05-30"), candidate(3, "2019-11-01")];
        let policy = ReleaseYearPolicy::default();

        assert_eq!(policy.select(&results, Some(2020)).map(|r| r.id), Some(2));
        assert_eq!(policy.select(&results, Some(1990)).map(|r| r.id), Some(1));
        assert_eq!(policy.select(&results, None).map(|r| r.id), Some(1));
        assert!(policy.select(&[], Some(2020)).is_none());
    }

    #[test]
    fn policy_lag_is_overridable() {
        let results = vec![candidate(1, "2019-05-30"), candidate(2, "2018-02-01")];
        let policy = ReleaseYearPolicy { lag_years: 2 };
        assert_eq!(policy.select(&results, Some(2020)).map(|r| r.id), Some(2));
    }

    #[tokio::test]
    async fn client_applies_policy_and_builds_poster() {
        let base = tmdb::tests::fake_tmdb().await;
        let client = EnrichmentClient::new(tmdb::tests::client(base, 100), ReleaseYearPolicy::default());

        let meta = client.lookup("Parasite", Some(2020)).await.unwrap().unwrap();
        assert_eq!(meta.external_id, 496243);
        assert_eq!(meta.poster_url.as_deref(), Some("https://image.tmdb.org/t/p/w500/parasite.jpg"));

        assert_eq!(client.lookup("Unknown Film", Some(2020)).await.unwrap(), None);
        assert!(client.lookup("Boom", None).await.is_err());

        // ceremony 2020 searches releases from 2019
        let echoed = client.lookup("Echo", Some(2020)).await.unwrap().unwrap();
        assert_eq!(echoed.title.as_deref(), Some("year 2019"));
    }

    #[tokio::test]
    async fn pass_creates_updates_and_skips() {
        let db = db::memory().await;
        award_for(&db, "Parasite", 2020).await;
        award_for(&db, "Roma", 2019).await;
        award_for(&db, "Nowhere", 2019).await;
        let roma = new_film("Roma").insert(&db).await.unwrap();

        let lookup = FakeLookup::default().with("Parasite", 496243).with("Roma", 426426);
        let report = enrich_award_films(&db, &lookup).await.unwrap();

        assert_eq!(report.titles, 3);
        assert_eq!(report.created, 1);
        assert_eq!(report.updated, 1);
        assert_eq!(report.no_match, 1);
        assert!(lookup.hints.lock().unwrap().contains(&("Parasite".to_string(), Some(2020))));

        let roma = film::Entity::find_by_id(roma.id).one(&db).await.unwrap().unwrap();
        assert_eq!(roma.external_id, Some(426426));
        assert!(roma.has_complete_metadata());

        let again = enrich_award_films(&db, &lookup).await.unwrap();
        assert_eq!(again.already_complete, 2);
        assert_eq!(film::Entity::find().count(&db).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn no_result_leaves_film_untouched() {
        let db = db::memory().await;
        award_for(&db, "Obscure", 1950).await;
        let before = new_film("Obscure").insert(&db).await.unwrap();

        let report = enrich_award_films(&db, &FakeLookup::default()).await.unwrap();
        assert_eq!(report.no_match, 1);

        let after = film::Entity::find_by_id(before.id).one(&db).await.unwrap().unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn near_miss_title_is_not_overwritten() {
        let db = db::memory().await;
        award_for(&db, "Roma", 2019).await;
        let holiday = new_film("Roman Holiday").insert(&db).await.unwrap();

        let lookup = FakeLookup::default().with("Roma", 426426);
        let report = enrich_award_films(&db, &lookup).await.unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.updated, 0);

        let after = film::Entity::find_by_id(holiday.id).one(&db).await.unwrap().unwrap();
        assert_eq!(after, holiday);
        let roma = find_by_external_id(&db, 426426).await.unwrap().unwrap();
        assert_eq!(roma.title, "Roma");
    }

    #[tokio::test]
    async fn one_failed_title_does_not_stop_the_pass() {
        let db = db::memory().await;
        award_for(&db, "Alpha", 2001).await;
        award_for(&db, "Beta", 2002).await;
        award_for(&db, "Gamma", 2003).await;

        // Beta collides with Alpha's external id and fails the unique index
        let lookup = FakeLookup::default().with("Alpha", 7).with("Beta", 7).with("Gamma", 9);
        let report = enrich_award_films(&db, &lookup).await.unwrap();

        assert_eq!(report.created, 2);
        assert_eq!(report.failed, 1);
        assert!(find_by_external_id(&db, 9).await.unwrap().is_some());
    }
}
