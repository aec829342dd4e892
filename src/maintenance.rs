//! Background upkeep: idle session sweeping, rate-limit pruning and
//! removal of stale temp files.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Delete files under `root` older than `max_age`; returns how many were removed.
///
/// Emptied subdirectories are removed too, `root` itself is kept.
pub async fn cleanup_temp_dir(root: &Path, max_age: Duration) -> Result<usize> {
    if !tokio::fs::try_exists(root).await? {
        return Ok(0);
    }

    let now = SystemTime::now();
    let mut removed = 0;
    let mut pending: Vec<PathBuf> = vec![root.to_path_buf()];
    let mut visited_dirs: Vec<PathBuf> = Vec::new();

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let metadata = entry.metadata().await?;
            if metadata.is_dir() {
                pending.push(path.clone());
                visited_dirs.push(path);
                continue;
            }

            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age >= max_age {
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => removed += 1,
                    Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove temp file"),
                }
            }
        }
    }

    // Deepest first
    for dir in visited_dirs.iter().rev() {
        if tokio::fs::remove_dir(dir).await.is_ok() {
            debug!(path = %dir.display(), "Removed empty temp dir");
        }
    }

    Ok(removed)
}

/// Start the periodic maintenance loops
pub fn spawn_maintenance(state: Arc<AppState>) -> Vec<JoinHandle<()>> {
    let timeouts = state.config.timeouts.clone();

    let sweeper = {
        let state = state.clone();
        let every = Duration::from_secs(timeouts.session_sweep_interval_secs.max(1));
        let idle = Duration::from_secs(timeouts.session_idle_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let swept = state.sessions.sweep_idle(idle, &state.guard);
                state.limiter.prune();
                if swept > 0 {
                    info!(swept, remaining = state.sessions.len(), "Idle sessions swept");
                }
            }
        })
    };

    let temp_cleaner = {
        let every = Duration::from_secs(timeouts.temp_cleanup_interval_secs.max(1));
        let max_age = Duration::from_secs(timeouts.temp_file_max_age_secs);
        let temp_dir = state.config.temp_dir();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                match cleanup_temp_dir(&temp_dir, max_age).await {
                    Ok(0) => {}
                    Ok(removed) => info!(removed, "Stale temp files removed"),
                    Err(e) => warn!(error = %e, "Temp cleanup failed"),
                }
            }
        })
    };

    vec![sweeper, temp_cleaner]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cleanup_removes_old_files_only() {
        let root = tempfile::tempdir().unwrap();
        let user_dir = root.path().join("42");
        std::fs::create_dir_all(&user_dir).unwrap();
        std::fs::write(user_dir.join("a.pdf"), b"%PDF").unwrap();

        let kept = cleanup_temp_dir(root.path(), Duration::from_secs(3600)).await.unwrap();
        assert_eq!(kept, 0);
        assert!(user_dir.join("a.pdf").exists());

        let removed = cleanup_temp_dir(root.path(), Duration::ZERO).await.unwrap();
        assert_eq!(removed, 1);
        assert!(!user_dir.exists());
        assert!(root.path().exists());
    }

    #[tokio::test]
    async fn test_cleanup_missing_root() {
        let root = tempfile::tempdir().unwrap();
        let missing = root.path().join("nope");
        assert_eq!(cleanup_temp_dir(&missing, Duration::ZERO).await.unwrap(), 0);
    }
}
