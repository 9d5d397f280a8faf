use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};

use crate::error::AppResult;

pub async fn connect_and_migrate(database_url: &str) -> AppResult<DatabaseConnection> {
    let mut options = ConnectOptions::new(database_url.to_string());
    options.sqlx_logging(false);
    if database_url.contains(":memory:") {
        // every pooled connection would otherwise get its own empty database
        options.max_connections(1).min_connections(1);
    }

    let db = Database::connect(options).await?;

    if !database_url.contains(":memory:") {
        db.execute(Statement::from_string(
            db.get_database_backend(),
            "PRAGMA journal_mode=WAL".to_string(),
        ))
        .await?;

        db.execute(Statement::from_string(
            db.get_database_backend(),
            "PRAGMA synchronous=NORMAL".to_string(),
        ))
        .await?;
    }

    db.execute(Statement::from_string(
        db.get_database_backend(),
        "PRAGMA foreign_keys=ON".to_string(),
    ))
    .await?;

    Migrator::up(&db, None).await?;
    Ok(db)
}
