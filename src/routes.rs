use std::{collections::BTreeMap, sync::Arc};

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::get,
};
use serde::Deserialize;

use crate::{
    AppState,
    error::{AppError, AppResult},
    reviews::{self, FilmReviews, NewReview, ReviewView},
    stats::{self, AwardedFilm, CategoryCount, CategoryWinner, FilmDetails, TopWinner, Treasure, YearEntry, YearTally},
};

pub const DEFAULT_CATEGORY_LIMIT: usize = 10;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/oscars_by_year", get(oscars_by_year))
        .route("/api/top_winners", get(top_winners))
        .route("/api/oscars_vs_nominations", get(oscars_vs_nominations))
        .route("/api/most_awarded_films", get(most_awarded_films))
        .route("/api/categories_frequency", get(categories_frequency))
        .route("/api/oscars_by_category", get(oscars_by_category))
        .route("/api/film_details", get(film_details))
        .route("/api/underrated_treasures", get(underrated_treasures))
        .route("/api/reviews", get(list_reviews).post(create_review))
        .with_state(state)
}

pub async fn oscars_by_year(State(state): State<Arc<AppState>>) -> AppResult<Json<BTreeMap<i32, Vec<YearEntry>>>> {
    Ok(Json(stats::oscars_by_year(&state.db).await?))
}

pub async fn top_winners(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<TopWinner>>> {
    Ok(Json(stats::top_winners(&state.db).await?))
}

pub async fn oscars_vs_nominations(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<YearTally>>> {
    Ok(Json(stats::wins_vs_nominations(&state.db).await?))
}

pub async fn most_awarded_films(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<AwardedFilm>>> {
    Ok(Json(stats::most_awarded_films(&state.db).await?))
}

pub async fn categories_frequency(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<CategoryCount>>> {
    Ok(Json(stats::categories_frequency(&state.db).await?))
}

#[derive(Debug, Deserialize)]
pub struct CategoryQuery {
    category: Option<String>,
    limit: Option<usize>,
}

pub async fn oscars_by_category(
    State(state): State<Arc<AppState>>,
    Query(q): Query<CategoryQuery>,
) -> AppResult<Json<Vec<CategoryWinner>>> {
    let category = q
        .category
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadRequest("category is required".to_string()))?;
    let limit = q.limit.unwrap_or(DEFAULT_CATEGORY_LIMIT);

    Ok(Json(stats::category_winners(&state.db, &category, limit).await?))
}

#[derive(Debug, Deserialize)]
pub struct FilmQuery {
    movie_id: Option<i32>,
    title: Option<String>,
}

pub async fn film_details(
    State(state): State<Arc<AppState>>,
    Query(q): Query<FilmQuery>,
) -> AppResult<Json<FilmDetails>> {
    let title = q.title.as_deref().map(str::trim).filter(|t| !t.is_empty());
    if q.movie_id.is_none() && title.is_none() {
        return Err(AppError::BadRequest("movie_id or title is required".to_string()));
    }

    stats::film_details(&state.db, q.movie_id, title)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("film not found".to_string()))
}

pub async fn underrated_treasures(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<Treasure>>> {
    Ok(Json(stats::underrated_treasures(&state.db).await?))
}

#[derive(Debug, Deserialize)]
pub struct ReviewQuery {
    film_id: i32,
}

pub async fn list_reviews(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ReviewQuery>,
) -> AppResult<Json<FilmReviews>> {
    Ok(Json(reviews::film_reviews(&state.db, q.film_id).await?))
}

pub async fn create_review(
    State(state): State<Arc<AppState>>,
    Json(new): Json<NewReview>,
) -> AppResult<(StatusCode, Json<ReviewView>)> {
    let saved = reviews::add_review(&state.db, new).await?;
    tracing::debug!(film_id = saved.film_id, rating = saved.rating, "review added");
    Ok((StatusCode::CREATED, Json(saved)))
}
