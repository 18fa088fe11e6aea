use std::{num::NonZeroU32, sync::Arc, time::Duration};

use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

/// Reasons the metadata service could not answer. All of them are treated
/// as "no metadata" by callers.
#[derive(Debug, thiserror::Error)]
pub enum EnrichmentError {
    #[error("no TMDB_API_KEY configured")]
    MissingApiKey,
    #[error("metadata request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("metadata service returned {0}")]
    Status(StatusCode),
}

pub struct TmdbClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    image_base: String,
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl TmdbClient {
    pub fn new(
        client: reqwest::Client,
        api_key: String,
        base_url: String,
        image_base: String,
        rps: u32,
    ) -> Self {
        if api_key.trim().is_empty() {
            tracing::warn!("no TMDB_API_KEY provided, enrichment lookups will be unavailable");
        }

        // fixed spacing between calls rather than a burst allowance
        let period = Duration::from_secs(1) / rps.max(1);
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
            .allow_burst(NonZeroU32::MIN);
        let limiter = Arc::new(RateLimiter::direct(quota));
        Self { client, api_key, base_url, image_base, limiter }
    }

    /// Runs one title search, narrowed to a release year when given, and
    /// returns the service's ranked candidates.
    pub async fn search_movie(
        &self,
        query: &str,
        year: Option<i32>,
    ) -> Result<Vec<SearchMovie>, EnrichmentError> {
        if self.api_key.trim().is_empty() {
            return Err(EnrichmentError::MissingApiKey);
        }

        self.limiter.until_ready().await;

        let url = format!("{}/search/movie", self.base_url.trim_end_matches('/'));
        debug!(query = %query, year, "searching TMDB");
        let mut req = self.client.get(url).query(&[
            ("api_key", self.api_key.as_str()),
            ("query", query),
            ("language", "en-US"),
            ("include_adult", "false"),
        ]);
        if let Some(year) = year {
            req = req.query(&[("year", year)]);
        }
        let resp = req.send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(EnrichmentError::Status(status));
        }

        let body: SearchResponse = resp.json().await?;
        Ok(body.results)
    }

    pub fn poster_url(&self, poster_path: Option<&str>) -> Option<String> {
        poster_path
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| format!("{}{}", self.image_base.trim_end_matches('/'), p))
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchMovie>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SearchMovie {
    pub id: i32,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub vote_average: Option<f64>,
    #[serde(default)]
    pub overview: Option<String>,
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{collections::HashMap, time::Instant};

    use axum::{Json, Router, extract::Query, http::StatusCode, routing::get};
    use serde_json::json;

    use super::*;

    /// Serves a fake `/search/movie` on an ephemeral port.
    pub(crate) async fn fake_tmdb() -> String {
        async fn search(
            Query(q): Query<HashMap<String, String>>,
        ) -> Result<Json<serde_json::Value>, StatusCode> {
            match q.get("query").map(String::as_str) {
                Some("Parasite") => Ok(Json(json!({
                    "results": [
                        { "id": 1, "title": "Parasite", "release_date": "1982-03-01", "poster_path": "/old.jpg" },
                        { "id": 496243, "title": "Parasite", "release_date": "2019-05-30",
                          "poster_path": "/parasite.jpg", "vote_average": 8.5, "overview": "Greed and class." }
                    ]
                }))),
                Some("Boom") => Err(StatusCode::SERVICE_UNAVAILABLE),
                // echoes the year filter back as the title
                Some("Echo") => Ok(Json(json!({
                    "results": [
                        { "id": 7, "title": format!("year {}", q.get("year").map_or("none", String::as_str)) }
                    ]
                }))),
                _ => Ok(Json(json!({ "results": [] }))),
            }
        }

        let app = Router::new().route("/search/movie", get(search));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    pub(crate) fn client(base_url: String, rps: u32) -> TmdbClient {
        TmdbClient::new(
            reqwest::Client::new(),
            "test-key".to_string(),
            base_url,
            "https://image.tmdb.org/t/p/w500".to_string(),
            rps,
        )
    }

    #[tokio::test]
    async fn search_returns_ranked_candidates() {
        let tmdb = client(fake_tmdb().await, 100);
        let results = tmdb.search_movie("Parasite", None).await.unwrap();
        assert_eq!(results.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 496243]);
        assert_eq!(results[1].vote_average, Some(8.5));
    }

    #[tokio::test]
    async fn year_filter_is_sent_when_given() {
        let tmdb = client(fake_tmdb().await, 100);
        let with_year = tmdb.search_movie("Echo", Some(2019)).await.unwrap();
        assert_eq!(with_year[0].title.as_deref(), Some("year 2019"));
        let without = tmdb.search_movie("Echo", None).await.unwrap();
        assert_eq!(without[0].title.as_deref(), Some("year none"));
    }

    #[tokio::test]
    async fn server_error_is_reported() {
        let tmdb = client(fake_tmdb().await, 100);
        let err = tmdb.search_movie("Boom", None).await.unwrap_err();
        assert!(matches!(err, EnrichmentError::Status(s) if s == StatusCode::SERVICE_UNAVAILABLE));
    }

    #[tokio::test]
    async fn missing_key_short_circuits() {
        let tmdb = TmdbClient::new(
            reqwest::Client::new(),
            String::new(),
            "http://127.0.0.1:9".to_string(),
            String::new(),
            4,
        );
        assert!(matches!(tmdb.search_movie("x", None).await, Err(EnrichmentError::MissingApiKey)));
    }

    #[tokio::test]
    async fn calls_are_spaced_by_the_limiter() {
        let tmdb = client(fake_tmdb().await, 4);
        let started = Instant::now();
        for _ in 0..3 {
            tmdb.search_movie("Nothing", None).await.unwrap();
        }
        // first call is free, the next two wait ~250ms each
        assert!(started.elapsed() >= Duration::from_millis(450));
    }

    #[test]
    fn poster_url_joins_image_base() {
        let tmdb = client("http://unused".to_string(), 4);
        assert_eq!(
            tmdb.poster_url(Some("/a.jpg")).as_deref(),
            Some("https://image.tmdb.org/t/p/w500/a.jpg")
        );
        assert_eq!(tmdb.poster_url(Some("")), None);
        assert_eq!(tmdb.poster_url(None), None);
    }
}
