//! Film matching between ledger titles and the catalog.
//!
//! Ledger titles and catalog titles come from independent sources, so an
//! Award only carries a nullable film reference. Matching is read-only and
//! never fails on a miss: `None` means "unmatched".

use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    sea_query::{Expr, LikeExpr},
};
use tracing::debug;

use crate::entities::{award, film};

/// Key used for case-insensitive title equality.
pub fn title_key(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Key used for containment search: the lowercased title without punctuation.
pub fn match_key(title: &str) -> String {
    title_key(&clean_title(title))
}

/// Drops punctuation, keeping word characters and whitespace.
pub fn clean_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect::<String>()
        .trim()
        .to_string()
}

fn containing(needle: &str) -> LikeExpr {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    LikeExpr::new(escaped).escape('\\')
}

/// Exact case-insensitive title match against the catalog.
pub async fn find_exact<C>(conn: &C, title: &str) -> Result<Option<film::Model>, DbErr>
where
    C: ConnectionTrait,
{
    film::Entity::find()
        .filter(film::Column::TitleKey.eq(title_key(title)))
        .order_by_asc(film::Column::Id)
        .one(conn)
        .await
}

/// Finds the catalog film for a raw ledger title.
///
/// Tries an exact case-insensitive match first. On a miss, looks for an
/// Award whose film string contains the punctuation-stripped title and
/// re-resolves through the catalog with that Award's film string, which
/// catches truncated or decorated ledger titles.
pub async fn match_title<C>(conn: &C, raw_title: &str) -> Result<Option<film::Model>, DbErr>
where
    C: ConnectionTrait,
{
    if let Some(film) = find_exact(conn, raw_title).await? {
        return Ok(Some(film));
    }

    let cleaned = match_key(raw_title);
    if cleaned.is_empty() {
        return Ok(None);
    }

    let candidates = award::Entity::find()
        .select_only()
        .column(award::Column::FilmKey)
        .distinct()
        .filter(Expr::col(award::Column::FilmMatchKey).like(containing(&cleaned)))
        .order_by_asc(award::Column::FilmKey)
        .into_tuple::<String>()
        .all(conn)
        .await?;

    for key in candidates {
        let film = film::Entity::find()
            .filter(Expr::col(film::Column::TitleKey).like(containing(&key)))
            .order_by_asc(film::Column::Id)
            .one(conn)
            .await?;
        if let Some(film) = film {
            debug!(title = %raw_title, via = %key, film_id = film.id, "matched film by containment");
            return Ok(Some(film));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use sea_orm::{ActiveModelTrait, Set};

    use super::*;
    use crate::{db, resolver};

    async fn insert_film(conn: &impl ConnectionTrait, title: &str) -> film::Model {
        film::ActiveModel {
            title: Set(title.to_string()),
            title_key: Set(title_key(title)),
            is_oscar_winner: Set(false),
            is_bafta_winner: Set(false),
            recommend_count: Set(0),
            ..Default::default()
        }
        .insert(conn)
        .await
        .unwrap()
    }

    async fn insert_award(conn: &impl ConnectionTrait, title: &str) {
        let actor = resolver::resolve(conn, resolver::NaturalKey::Actor("Someone")).await.unwrap().id();
        resolver::resolve(conn, resolver::NaturalKey::CeremonyYear(2000)).await.unwrap();
        award::ActiveModel {
            film_title: Set(title.to_string()),
            film_key: Set(title_key(title)),
            film_match_key: Set(match_key(title)),
            film_release_year: Set(1999),
            ceremony_year: Set(2000),
            actor_id: Set(actor),
            category_id: Set(None),
            winner: Set(true),
            poster_url: Set(None),
            film_id: Set(None),
            ..Default::default()
        }
        .insert(conn)
        .await
        .unwrap();
    }

    #[test]
    fn clean_title_strips_punctuation() {
        assert_eq!(
            clean_title("Dr. Strangelove: or How I Learned..."),
            "Dr Strangelove or How I Learned"
        );
        assert_eq!(clean_title("  Amélie! "), "Amélie");
        assert_eq!(clean_title("?!"), "");
    }

    #[tokio::test]
    async fn exact_match_ignores_case() {
        let db = db::memory().await;
        let film = insert_film(&db, "Parasite").await;

        let found = match_title(&db, "  PARASITE ").await.unwrap();
        assert_eq!(found.map(|f| f.id), Some(film.id));
    }

    #[tokio::test]
    async fn containment_goes_through_award_strings() {
        let db = db::memory().await;
        let film = insert_film(&db, "Birdman or (The Unexpected Virtue of Ignorance)").await;
        insert_award(&db, "Birdman").await;

        let found = match_title(&db, "Birdman!").await.unwrap();
        assert_eq!(found.map(|f| f.id), Some(film.id));
    }

    #[tokio::test]
    async fn containment_ignores_punctuation_on_both_sides() {
        let db = db::memory().await;
        let title = "Dr. Strangelove or: How I Learned to Stop Worrying and Love the Bomb";
        let film = insert_film(&db, title).await;
        insert_award(&db, title).await;

        let found = match_title(&db, "Dr Strangelove").await.unwrap();
        assert_eq!(found.map(|f| f.id), Some(film.id));
    }

    #[tokio::test]
    async fn miss_is_none() {
        let db = db::memory().await;
        insert_film(&db, "Roma").await;

        assert!(match_title(&db, "Nomadland").await.unwrap().is_none());
        assert!(match_title(&db, "...").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn like_wildcards_are_literal() {
        let db = db::memory().await;
        insert_film(&db, "Anything").await;
        insert_award(&db, "Anything").await;

        assert!(match_title(&db, "_").await.unwrap().is_none());
    }
}
