use anyhow::{bail, Context, Result};
use log::info;
use rusqlite::{params, Connection, Transaction};

use super::helpers::to_i64;
use super::repositories::recordings::decode_histogram;
use crate::telemetry::energy_sum;

const CURRENT_SCHEMA_VERSION: i32 = 3;

pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let mut version: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read user_version pragma")?;

    if version > CURRENT_SCHEMA_VERSION {
        bail!(
            "database version ({}) is newer than supported schema ({})",
            version,
            CURRENT_SCHEMA_VERSION
        );
    }

    if version == CURRENT_SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn
        .transaction()
        .context("failed to open migration transaction")?;

    while version < CURRENT_SCHEMA_VERSION {
        let next_version = version + 1;
        apply_migration(&tx, next_version)
            .with_context(|| format!("migration to version {next_version} failed"))?;
        version = next_version;
    }

    tx.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)
        .context("failed to update user_version pragma")?;
    tx.commit().context("failed to commit migrations")?;

    Ok(())
}

fn apply_migration(tx: &Transaction<'_>, version: i32) -> Result<()> {
    match version {
        1 => tx
            .execute_batch(include_str!("schemas/schema_v1.sql"))
            .context("failed to execute schema_v1.sql"),
        2 => add_energy_column(tx),
        3 => tx
            .execute_batch(include_str!("schemas/schema_v3.sql"))
            .context("failed to execute schema_v3.sql"),
        _ => bail!("unknown migration target version: {version}"),
    }
}

/// Databases written by older viewers may already carry the column without a
/// matching `user_version`; that is not an error.
fn add_energy_column(tx: &Transaction<'_>) -> Result<()> {
    match tx.execute_batch(include_str!("schemas/schema_v2.sql")) {
        Ok(()) => {}
        Err(err) if err.to_string().contains("duplicate column name") => {}
        Err(err) => return Err(err).context("failed to execute schema_v2.sql"),
    }

    let pending: Vec<(i64, Option<String>)> = {
        let mut stmt =
            tx.prepare("SELECT id, spectrum_data FROM recordings WHERE spectrum_sum IS NULL")?;
        let mut rows = stmt.query([])?;
        let mut pending = Vec::new();
        while let Some(row) = rows.next()? {
            pending.push((row.get(0)?, row.get(1)?));
        }
        pending
    };

    if pending.is_empty() {
        return Ok(());
    }

    let mut update = tx.prepare("UPDATE recordings SET spectrum_sum = ?1 WHERE id = ?2")?;
    for (id, spectrum_data) in &pending {
        // Unreadable histograms count as no energy.
        let sum = spectrum_data
            .as_deref()
            .and_then(|raw| decode_histogram(raw).ok())
            .map(|histogram| energy_sum(&histogram))
            .unwrap_or(0);
        update.execute(params![to_i64(sum)?, id])?;
    }
    info!("Back-filled spectrum energy for {} recordings", pending.len());

    Ok(())
}
