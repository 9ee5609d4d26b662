//! # Database
//!
//! Pool construction and schema migrations for the PostgreSQL store.
//!
//! ```rust,no_run
//! use signoff_core::config::DatabaseConfig;
//! use signoff_core::database::{connect, run_migrations};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = connect(&DatabaseConfig::default()).await?;
//! run_migrations(&pool).await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod migrator;

pub use connection::{connect, health_check};
pub use migrator::{run_migrations, MIGRATOR};
