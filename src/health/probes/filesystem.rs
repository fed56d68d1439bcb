//! Filesystem health probe: `stat` every declared root-path mount for local
//! backends; remote backends are not probed here and are always healthy.

use std::time::Instant;

use crate::health::types::{FilesystemParams, ProbeOutcome};

pub async fn probe(params: &FilesystemParams) -> ProbeOutcome {
    let start = Instant::now();

    if !params.is_local {
        return ProbeOutcome::success(elapsed_ms(start));
    }

    for root in &params.root_paths {
        if let Err(e) = tokio::fs::metadata(root).await {
            return ProbeOutcome::failure(
                elapsed_ms(start),
                format!("stat failed for {}: {e}", root.display()),
            );
        }
    }

    ProbeOutcome::success(elapsed_ms(start))
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn remote_backend_always_healthy() {
        let params = FilesystemParams {
            root_paths: vec![PathBuf::from("/does/not/exist")],
            is_local: false,
        };
        assert!(probe(&params).await.ok);
    }

    #[tokio::test]
    async fn local_backend_checks_every_root() {
        let dir = tempfile::tempdir().unwrap();
        let params = FilesystemParams {
            root_paths: vec![dir.path().to_path_buf()],
            is_local: true,
        };
        assert!(probe(&params).await.ok);
    }

    #[tokio::test]
    async fn local_backend_missing_root_fails() {
        let params = FilesystemParams {
            root_paths: vec![PathBuf::from("/does/not/exist/at/all")],
            is_local: true,
        };
        assert!(!probe(&params).await.ok);
    }
}
