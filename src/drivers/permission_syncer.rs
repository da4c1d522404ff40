//! Permission syncer: mirror a source user onto a target user, per row
//!
//! Row fields: TargetUserID, SourceUserID. Which permission kinds and
//! whether team memberships follow are configured per run, not per row.

use tracing::{error, info, warn};

use super::Record;
use crate::config::ReconcileSettings;
use crate::core::engine::ReconcileEngine;
use crate::utils::error::Result;

/// What to mirror for each row
#[derive(Debug, Clone, Copy)]
pub struct SyncFlags {
    pub project_permissions: bool,
    pub workspace_permissions: bool,
    pub team_memberships: bool,
}

impl From<&ReconcileSettings> for SyncFlags {
    fn from(settings: &ReconcileSettings) -> Self {
        Self {
            project_permissions: settings.sync_project_permissions,
            workspace_permissions: settings.sync_workspace_permissions,
            team_memberships: settings.sync_team_memberships,
        }
    }
}

/// Process every record, skipping bad rows with a warning.
pub async fn run(engine: &mut ReconcileEngine, records: &[Record], flags: SyncFlags) -> Result<()> {
    for record in records {
        match sync_row(engine, record, flags).await {
            Ok(()) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                error!("Row failed: {}", e);
                engine.stats_mut().row_errors += 1;
            }
        }
    }
    info!("Permission sync complete: {}", engine.stats());
    Ok(())
}

async fn sync_row(engine: &mut ReconcileEngine, record: &Record, flags: SyncFlags) -> Result<()> {
    let missing = record.missing(&["TargetUserID", "SourceUserID"]);
    if !missing.is_empty() {
        warn!(
            "One or more required fields missing: {}; skipping this row",
            missing.join(", ")
        );
        engine.stats_mut().rows_skipped += 1;
        return Ok(());
    }

    let target = record.require("TargetUserID")?.to_lowercase();
    let source = record.require("SourceUserID")?.to_lowercase();

    if flags.project_permissions {
        info!("Syncing project permissions from {} to {}", source, target);
        engine.sync_project_permissions(&source, &target).await?;
    }

    if flags.workspace_permissions {
        info!("Syncing workspace permissions from {} to {}", source, target);
        engine.sync_workspace_permissions(&source, &target).await?;
    }

    if flags.team_memberships {
        // Permission sync just mutated the target; memberships are decided
        // against the refreshed state
        engine.client().refresh_user(&target).await?;
        info!("Syncing team memberships from {} to {}", source, target);
        engine.sync_team_memberships(&source, &target).await?;
    }

    Ok(())
}
