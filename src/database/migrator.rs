use sqlx::PgPool;
use tracing::info;

use crate::error::Result;

/// Embedded migrations from the crate's `migrations/` directory.
///
/// Also usable with `#[sqlx::test(migrator = "signoff_core::database::MIGRATOR")]`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    info!("Running sign-off schema migrations");
    MIGRATOR.run(pool).await?;
    info!("Sign-off schema migrations complete");
    Ok(())
}
