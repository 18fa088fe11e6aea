use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};

use crate::entities::{film, review};

pub const RATING_RANGE: std::ops::RangeInclusive<i32> = 1..=10;

#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("{0}")]
    Validation(&'static str),
    #[error("film {0} not found")]
    FilmNotFound(i32),
    #[error(transparent)]
    Store(#[from] DbErr),
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewReview {
    pub film_id: Option<i32>,
    pub user_key: Option<String>,
    pub rating: Option<i32>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReviewView {
    pub id: i32,
    pub film_id: i32,
    pub user_key: String,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: jiff::Timestamp,
}

impl From<review::Model> for ReviewView {
    fn from(r: review::Model) -> Self {
        Self {
            id: r.id,
            film_id: r.film_id,
            user_key: r.user_key,
            rating: r.rating,
            comment: r.comment,
            created_at: jiff::Timestamp::from_second(r.created_at).unwrap_or_default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FilmReviews {
    pub film_id: i32,
    pub average: f64,
    pub reviews: Vec<ReviewView>,
}

pub async fn add_review<C>(conn: &C, new: NewReview) -> Result<ReviewView, ReviewError>
where
    C: ConnectionTrait,
{
    let (Some(film_id), Some(user_key), Some(rating)) =
        (new.film_id, new.user_key.filter(|k| !k.trim().is_empty()), new.rating)
    else {
        return Err(ReviewError::Validation("film_id, user_key, and rating are required"));
    };
    if !RATING_RANGE.contains(&rating) {
        return Err(ReviewError::Validation("rating must be between 1 and 10"));
    }
    if film::Entity::find_by_id(film_id).one(conn).await?.is_none() {
        return Err(ReviewError::FilmNotFound(film_id));
    }

    let comment = new.comment.map(|c| c.trim().to_string()).filter(|c| !c.is_empty());
    let saved = review::ActiveModel {
        film_id: Set(film_id),
        user_key: Set(user_key),
        rating: Set(rating),
        comment: Set(comment),
        created_at: Set(jiff::Timestamp::now().as_second()),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    Ok(saved.into())
}

/// Reviews for a film, newest first, with the mean rating to two decimals.
pub async fn film_reviews<C>(conn: &C, film_id: i32) -> Result<FilmReviews, DbErr>
where
    C: ConnectionTrait,
{
    let reviews = review::Entity::find()
        .filter(review::Column::FilmId.eq(film_id))
        .order_by_desc(review::Column::CreatedAt)
        .order_by_desc(review::Column::Id)
        .all(conn)
        .await?;

    let average = if reviews.is_empty() {
        0.0
    } else {
        let sum: i64 = reviews.iter().map(|r| i64::from(r.rating)).sum();
        (sum as f64 / reviews.len() as f64 * 100.0).round() / 100.0
    };

    Ok(FilmReviews {
        film_id,
        average,
        reviews: reviews.into_iter().map(ReviewView::from).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, enrich};

    fn new_review(film_id: i32, rating: i32) -> NewReview {
        NewReview {
            film_id: Some(film_id),
            user_key: Some("user-1".to_string()),
            rating: Some(rating),
            comment: Some("  loved it ".to_string()),
        }
    }

    #[tokio::test]
    async fn reviews_average_and_order() {
        let db = db::memory().await;
        let film = enrich::new_film("Roma").insert(&db).await.unwrap();

        let first = add_review(&db, new_review(film.id, 8)).await.unwrap();
        assert_eq!(first.comment.as_deref(), Some("loved it"));
        add_review(&db, new_review(film.id, 7)).await.unwrap();
        let last = add_review(&db, new_review(film.id, 7)).await.unwrap();

        let listed = film_reviews(&db, film.id).await.unwrap();
        assert_eq!(listed.reviews.len(), 3);
        assert_eq!(listed.reviews[0].id, last.id);
        assert_eq!(listed.average, 7.33);

        assert_eq!(film_reviews(&db, film.id + 1).await.unwrap().average, 0.0);
    }

    #[tokio::test]
    async fn invalid_reviews_are_rejected() {
        let db = db::memory().await;
        let film = enrich::new_film("Roma").insert(&db).await.unwrap();

        let mut missing = new_review(film.id, 5);
        missing.user_key = Some(" ".to_string());
        assert!(matches!(add_review(&db, missing).await, Err(ReviewError::Validation(_))));
        assert!(matches!(add_review(&db, new_review(film.id, 11)).await, Err(ReviewError::Validation(_))));
        assert!(matches!(
            add_review(&db, new_review(film.id + 100, 5)).await,
            Err(ReviewError::FilmNotFound(_))
        ));
    }
}
