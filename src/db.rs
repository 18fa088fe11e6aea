use migration::{Migrator, MigratorTrait};
use sea_orm::{
    ConnectOptions, Database, DatabaseConnection,
    sqlx::sqlite::{SqliteJournalMode, SqliteSynchronous},
};

pub async fn connect_and_migrate(database_url: &str) -> Result<DatabaseConnection, sea_orm::DbErr> {
    let in_memory = database_url.contains(":memory:");

    let mut opts = ConnectOptions::new(database_url);
    opts.sqlx_logging(false);
    // applied by sqlx on every new pooled connection
    opts.map_sqlx_sqlite_opts(move |sqlite| {
        let sqlite = sqlite.foreign_keys(true).synchronous(SqliteSynchronous::Normal);
        if in_memory { sqlite } else { sqlite.journal_mode(SqliteJournalMode::Wal) }
    });
    // every pooled connection to :memory: would get its own empty database
    if in_memory {
        opts.max_connections(1).min_connections(1);
    }

    let db = Database::connect(opts).await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

#[cfg(test)]
pub async fn memory() -> DatabaseConnection {
    connect_and_migrate("sqlite::memory:").await.expect("in-memory database")
}

#[cfg(test)]
mod tests {
    use sea_orm::{ConnectionTrait, Statement, TransactionTrait};

    use super::*;

    async fn pragma(conn: &impl ConnectionTrait, name: &str) -> i32 {
        let row = conn
            .query_one(Statement::from_string(conn.get_database_backend(), format!("PRAGMA {name}")))
            .await
            .unwrap()
            .unwrap();
        row.try_get("", name).unwrap()
    }

    #[tokio::test]
    async fn every_file_connection_enforces_foreign_keys() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("pragmas.db").display());
        let db = connect_and_migrate(&url).await.unwrap();

        // two open transactions hold two distinct pooled connections
        let first = db.begin().await.unwrap();
        let second = db.begin().await.unwrap();
        for txn in [&first, &second] {
            assert_eq!(pragma(txn, "foreign_keys").await, 1);
            assert_eq!(pragma(txn, "synchronous").await, 1);
        }
        first.rollback().await.unwrap();
        second.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn memory_database_enforces_foreign_keys() {
        let db = memory().await;
        assert_eq!(pragma(&db, "foreign_keys").await, 1);
    }
}
