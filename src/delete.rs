use crate::error::{DocdexError, Result};
use crate::index::DocumentIndex;
use crate::store::RecordStore;

/// Remove a file's chunks from the index and its upload record from the
/// store, as one best-effort operation.
///
/// Order matters: the index is cleaned first. If that fails the record is
/// kept, so the file stays visible and re-deletable instead of silently
/// orphaning still-indexed chunks. If the record delete fails afterwards,
/// the orphaned record is surfaced as an inconsistency for administrative
/// cleanup; it is not retried.
///
/// Returns the number of chunks removed from the index.
pub async fn delete_file(
    index: &dyn DocumentIndex,
    store: &RecordStore,
    file_id: &str,
) -> Result<u64> {
    let record = store
        .get_by_id(file_id)
        .await?
        .ok_or_else(|| DocdexError::RecordNotFound(file_id.to_string()))?;

    log::info!("Deleting file {} ({})", record.file_name, file_id);

    let deleted = match index.delete_by_file_id(file_id).await {
        Ok(count) => count,
        Err(e) => {
            return Err(DocdexError::DeletionInconsistency(format!(
                "index deletion failed for {}, record retained: {}",
                file_id, e
            )));
        }
    };

    if let Err(e) = store.delete(file_id).await {
        log::error!(
            "Chunks for {} removed from index but record deletion failed: {}",
            file_id,
            e
        );
        return Err(DocdexError::DeletionInconsistency(format!(
            "record deletion failed for {} after index cleanup: {}",
            file_id, e
        )));
    }

    log::info!("Deleted {} chunks and record for {}", deleted, file_id);
    Ok(deleted)
}
