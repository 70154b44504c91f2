use async_trait::async_trait;
use pvc_plumber_core::{BackendKind, CheckResult};

/// A source of truth for whether a namespace/PVC pair has been backed up.
///
/// Implementations never fail: problems reaching the underlying store are
/// reported through [`CheckResult::error`] with `exists` set to false.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn check_backup_exists(&self, namespace: &str, pvc: &str) -> CheckResult;

    fn backend_kind(&self) -> BackendKind;
}
