use std::{net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::Context;

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub database_url: String,
    pub tmdb_api_key: String,
    pub tmdb_base_url: String,
    pub tmdb_image_base: String,
    pub tmdb_rps: u32,
    pub tmdb_timeout: Duration,
    pub release_lag_years: i32,
    pub unmatched_report: PathBuf,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 =
            std::env::var("PORT").unwrap_or_else(|_| "5050".to_string()).parse().context("PORT")?;

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://cineverse.db?mode=rwc".to_string());

        let tmdb_api_key = std::env::var("TMDB_API_KEY").unwrap_or_default();
        let tmdb_base_url = std::env::var("TMDB_BASE_URL")
            .unwrap_or_else(|_| "https://api.themoviedb.org/3".to_string());
        let tmdb_image_base = std::env::var("TMDB_IMAGE_BASE")
            .unwrap_or_else(|_| "https://image.tmdb.org/t/p/w500".to_string());

        let tmdb_rps: u32 =
            std::env::var("TMDB_RPS").ok().and_then(|s| s.parse().ok()).unwrap_or(4);

        let tmdb_timeout_secs: u64 =
            std::env::var("TMDB_TIMEOUT_SECS").ok().and_then(|s| s.parse().ok()).unwrap_or(5);

        let release_lag_years: i32 =
            std::env::var("RELEASE_LAG_YEARS").ok().and_then(|s| s.parse().ok()).unwrap_or(1);

        let unmatched_report = std::env::var("UNMATCHED_REPORT")
            .unwrap_or_else(|_| "unmatched_awards.txt".to_string())
            .into();

        Ok(Self {
            addr: format!("{host}:{port}").parse().context("HOST/PORT")?,
            database_url,
            tmdb_api_key,
            tmdb_base_url,
            tmdb_image_base,
            tmdb_rps,
            tmdb_timeout: Duration::from_secs(tmdb_timeout_secs),
            release_lag_years,
            unmatched_report,
        })
    }
}
