mod url;
mod schema;
pub mod models;
pub mod pool;
pub mod migrations;
pub mod store;

pub(crate) use schema::ref_schema;
pub(crate) use schema::stats_schema;

pub use url::postgres_url_from_environment;
pub use models::SyncStatus;
pub use store::{Store, StoreError, StoreResult, SyncKind};
pub use migrations::{run_migrations, MigrationError};
pub use pool::{get_pool, ConnectionPool};

pub use diesel::{Connection, PgConnection};
