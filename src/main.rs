mod catalog;
mod config;
mod db;
mod enrich;
mod entities;
mod error;
mod ingest;
mod ledger;
mod matcher;
mod resolver;
mod reviews;
mod routes;
mod stats;
mod tmdb;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::{Parser, Subcommand};
use sea_orm::DatabaseConnection;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    catalog::Scheme,
    config::Config,
    enrich::{EnrichmentClient, ReleaseYearPolicy},
    ingest::{IngestError, IngestOptions, Ingestor},
    tmdb::TmdbClient,
};

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
}

#[derive(Parser)]
#[command(name = "cineverse", about = "Award ledger ingestion and film statistics")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the JSON statistics API.
    Serve,
    /// Load an award ledger (CSV or JSON) in one batch.
    Ingest {
        path: PathBuf,
        #[arg(long)]
        fetch_posters: bool,
        #[arg(long)]
        create_missing_films: bool,
        /// Where to write unmatched titles; defaults to UNMATCHED_REPORT.
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Fill in film metadata for every award title.
    Enrich,
    /// Re-run film matching for awards without a film.
    Relink,
    /// Seed films for an award scheme from a JSON list of entries.
    LoadCatalog {
        path: PathBuf,
        #[arg(long, value_enum, default_value = "bafta")]
        scheme: Scheme,
    },
    /// Set the Oscar winner flag from winning awards.
    FlagWinners,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,cineverse=debug,sqlx=warn".to_string()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let db = db::connect_and_migrate(&config.database_url)
        .await
        .with_context(|| format!("opening {}", config.database_url))?;

    match cli.command {
        Command::Serve => serve(&config, db).await,
        Command::Ingest { path, fetch_posters, create_missing_films, report } => {
            let rows = ledger::read_ledger(&path).with_context(|| format!("reading {}", path.display()))?;
            let options = IngestOptions { fetch_posters, create_missing_films };
            let lookup = (fetch_posters || create_missing_films).then(|| enrichment_client(&config)).transpose()?;

            let report_path = report.unwrap_or_else(|| config.unmatched_report.clone());
            match Ingestor::new(&db, lookup.as_ref(), options).run(rows).await {
                Ok(summary) => {
                    summary.write_unmatched(&report_path).await?;
                    tracing::info!(
                        added = summary.added,
                        skipped = summary.skipped,
                        unmatched = summary.unmatched_titles.len(),
                        report = %report_path.display(),
                        "ingestion complete"
                    );
                    Ok(())
                },
                Err(err @ IngestError::BatchCommit { .. }) => {
                    tracing::error!(error = %err, "ingestion rolled back");
                    Err(err.into())
                },
                Err(err) => Err(err.into()),
            }
        },
        Command::Enrich => {
            let lookup = enrichment_client(&config)?;
            let report = enrich::enrich_award_films(&db, &lookup).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        },
        Command::Relink => {
            let report = catalog::relink_unmatched(&db).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        },
        Command::LoadCatalog { path, scheme } => {
            let entries = catalog::read_entries(&path).with_context(|| format!("reading {}", path.display()))?;
            let lookup = enrichment_client(&config)?;
            let report = catalog::load_catalog(&db, &lookup, &entries, scheme).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        },
        Command::FlagWinners => {
            let flagged = catalog::flag_oscar_winners(&db).await?;
            println!("{flagged} films flagged");
            Ok(())
        },
    }
}

fn enrichment_client(config: &Config) -> anyhow::Result<EnrichmentClient> {
    let http = reqwest::Client::builder()
        .user_agent("cineverse/0.1")
        .timeout(config.tmdb_timeout)
        .build()?;

    let tmdb = TmdbClient::new(
        http,
        config.tmdb_api_key.clone(),
        config.tmdb_base_url.clone(),
        config.tmdb_image_base.clone(),
        config.tmdb_rps,
    );
    Ok(EnrichmentClient::new(tmdb, ReleaseYearPolicy { lag_years: config.release_lag_years }))
}

async fn serve(config: &Config, db: DatabaseConnection) -> anyhow::Result<()> {
    let state = Arc::new(AppState { db });

    let app = routes::router(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
