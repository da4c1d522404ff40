//! Enable/disable users in batch
//!
//! Row fields: UserName, Disabled (True|False). Accounts are only ever
//! flipped, never deleted.

use tracing::{error, info, warn};

use super::Record;
use crate::core::engine::ReconcileEngine;
use crate::utils::error::Result;

/// Process every record, skipping bad rows with a warning.
pub async fn run(engine: &mut ReconcileEngine, records: &[Record]) -> Result<()> {
    for record in records {
        match status_row(engine, record).await {
            Ok(()) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                error!("Row failed: {}", e);
                engine.stats_mut().row_errors += 1;
            }
        }
    }
    info!("User status update complete: {}", engine.stats());
    Ok(())
}

async fn status_row(engine: &mut ReconcileEngine, record: &Record) -> Result<()> {
    let missing = record.missing(&["UserName", "Disabled"]);
    if !missing.is_empty() {
        warn!(
            "One or more required fields missing: {}; skipping this row",
            missing.join(", ")
        );
        engine.stats_mut().rows_skipped += 1;
        return Ok(());
    }

    let username = record.require("UserName")?.to_lowercase();
    let disabled_text = record.require("Disabled")?;
    let disabled = match disabled_text.to_lowercase().as_str() {
        "true" | "yes" => true,
        "false" | "no" => false,
        other => {
            warn!("Disabled must be True or False, got {}; skipping this row", other);
            engine.stats_mut().rows_skipped += 1;
            return Ok(());
        }
    };

    let Some(user) = engine.client().find_user(&username).await? else {
        warn!("User {} not found; skipping", username);
        engine.stats_mut().rows_skipped += 1;
        return Ok(());
    };

    if engine.options().dry_run {
        info!(
            "dry run: would set {} to {}",
            user.username,
            if disabled { "disabled" } else { "enabled" }
        );
        return Ok(());
    }

    if engine.client().set_user_enabled(&user, !disabled).await? {
        engine.stats_mut().updated += 1;
    } else {
        engine.stats_mut().unchanged += 1;
    }
    Ok(())
}
