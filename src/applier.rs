use tracing::info;

use crate::changes::ChangeSet;
use crate::dns::{Transport, TransportError};

/// Submits a change set: deletes, then creates, then updates.
///
/// The first failed call aborts the run. In dry-run mode every change is
/// logged exactly as in a live run but nothing is sent.
pub async fn apply_changes<T>(changes: &ChangeSet, transport: &T) -> Result<(), TransportError>
where
    T: Transport + ?Sized,
{
    if changes.is_empty() {
        info!("no changes to apply");
        return Ok(());
    }

    let dry_run = changes.dry_run();
    let default_ttl = changes.default_ttl();

    for delete in changes.deletes() {
        let record = &delete.record;
        info!(
            dry_run,
            zone = %record.zone.name,
            id = %delete.id,
            name = %record.name,
            record_type = %record.record_type,
            value = %record.value,
            ttl = ?record.ttl,
            "deleting record"
        );
        if !dry_run {
            transport.delete_record(&delete.id).await?;
        }
    }

    for create in changes.creates() {
        let params = create.params(default_ttl);
        info!(
            dry_run,
            zone = %create.zone.name,
            name = %params.name,
            record_type = %params.record_type,
            value = %params.value,
            ttl = ?params.ttl,
            "creating record"
        );
        if !dry_run {
            transport.create_record(&params).await?;
        }
    }

    for update in changes.updates() {
        let params = update.record.params(default_ttl);
        info!(
            dry_run,
            zone = %update.record.zone.name,
            id = %update.id,
            name = %params.name,
            record_type = %params.record_type,
            value = %params.value,
            ttl = ?params.ttl,
            "updating record"
        );
        if !dry_run {
            transport.update_record(&update.id, &params).await?;
        }
    }

    Ok(())
}
