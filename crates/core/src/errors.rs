use storesync_common::KvError;
use storesync_domain::StoreSyncError;

/// Shared key-value store failures surface as internal errors.
pub fn map_kv_error(err: KvError) -> StoreSyncError {
    StoreSyncError::Internal(format!("key-value store: {err}"))
}
