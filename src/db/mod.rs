use crate::errors::{ErrorKind, Result};
use diesel::connection::SimpleConnection;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Error as ConnectionError};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use rocket::http::Status;
use rocket::outcome::{try_outcome, Outcome};
use rocket::request::{self, FromRequest, Request};
use rocket::State;
use std::ops::{Deref, DerefMut};

pub mod schema;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

// An alias to the type for a pool of Diesel SQLite connections.
pub type Pool = r2d2::Pool<ConnectionManager<SqliteConnection>>;

pub struct DbConnection(pub r2d2::PooledConnection<ConnectionManager<SqliteConnection>>);

/// SQLite leaves foreign keys off unless asked, per connection.
#[derive(Debug)]
struct ConnectionOptions;

impl CustomizeConnection<SqliteConnection, ConnectionError> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> std::result::Result<(), ConnectionError> {
        conn.batch_execute("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
            .map_err(ConnectionError::QueryError)
    }
}

/// Attempts to retrieve a single connection from the managed database pool. If
/// no pool is currently managed, fails with an `InternalServerError` status. If
/// no connections are available, fails with a `ServiceUnavailable` status.
#[rocket::async_trait]
impl<'r> FromRequest<'r> for DbConnection {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<DbConnection, ()> {
        let pool = try_outcome!(request.guard::<&State<Pool>>().await);
        match pool.get() {
            Ok(conn) => Outcome::Success(DbConnection(conn)),
            Err(_) => Outcome::Error((Status::ServiceUnavailable, ())),
        }
    }
}

// For the convenience of using an &mut DbConnection as an &mut SqliteConnection.
impl Deref for DbConnection {
    type Target = SqliteConnection;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for DbConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

const IN_MEMORY: &str = ":memory:";

/// Every `:memory:` connection is its own database, so such a pool holds
/// exactly one connection and never recycles it.
pub fn init_pool(database_url: &str) -> Result<Pool> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    let mut builder = Pool::builder().connection_customizer(Box::new(ConnectionOptions));
    if database_url.trim() == IN_MEMORY {
        builder = builder.max_size(1).idle_timeout(None).max_lifetime(None);
    }
    let pool = builder.build(manager)?;
    let mut conn = pool.get()?;
    run_migrations(&mut conn)?;
    Ok(pool)
}

pub fn run_migrations(conn: &mut SqliteConnection) -> Result<()> {
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| ErrorKind::Migration(e.to_string()))?;
    for version in applied {
        tracing::info!(%version, "applied migration");
    }
    Ok(())
}

/// A private in-memory database with the schema applied.
#[cfg(test)]
pub fn test_connection() -> SqliteConnection {
    use diesel::Connection;

    let mut conn = SqliteConnection::establish(":memory:").expect("in-memory sqlite");
    conn.batch_execute("PRAGMA foreign_keys = ON;").expect("foreign keys");
    run_migrations(&mut conn).expect("migrations");
    conn
}
