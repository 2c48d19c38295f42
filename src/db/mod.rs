pub mod migrations;
pub mod queries;

use anyhow::Context;
use rusqlite::Connection;

/// Opens the booking database and brings its schema up to date. `":memory:"`
/// gives a private throwaway database, which is what the tests use.
pub fn init_db(path: &str) -> anyhow::Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("failed to open booking database at {path}"))?;

    // Foreign keys keep bookings pointing at a known resource.
    conn.execute_batch(
        "PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON; PRAGMA busy_timeout=5000;",
    )
    .context("failed to set database pragmas")?;

    migrations::run_migrations(&conn)?;
    tracing::debug!(path, "booking database ready");

    Ok(conn)
}
