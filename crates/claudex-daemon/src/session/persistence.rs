use std::path::Path;

use claudex_paths::ClaudexPaths;

use super::state::SessionMetadata;
use crate::errors::Result;

/// Write `meta` to `<storage>/<id>.json` atomically: serialize to a
/// `.tmp` sibling, then rename over the final path, so a reader never
/// observes a half-written file.
pub fn save_session_metadata(paths: &ClaudexPaths, meta: &SessionMetadata) -> Result<()> {
    let file = paths.session_metadata_file(&meta.id);
    let json = serde_json::to_string_pretty(meta)?;

    let tmp = file.with_extension("json.tmp");
    if let Err(e) = std::fs::write(&tmp, &json) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    if let Err(e) = std::fs::rename(&tmp, &file) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

pub fn remove_session_metadata(paths: &ClaudexPaths, session_id: &str) -> Result<()> {
    let file = paths.session_metadata_file(session_id);
    match std::fs::remove_file(&file) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

pub fn save_scrollback(paths: &ClaudexPaths, session_id: &str, bytes: &[u8]) -> Result<()> {
    let file = paths.session_scrollback_file(session_id);
    let tmp = file.with_extension("scrollback.tmp");
    if let Err(e) = std::fs::write(&tmp, bytes) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    if let Err(e) = std::fs::rename(&tmp, &file) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

pub fn load_scrollback(paths: &ClaudexPaths, session_id: &str) -> Option<Vec<u8>> {
    std::fs::read(paths.session_scrollback_file(session_id)).ok()
}

pub fn remove_scrollback(paths: &ClaudexPaths, session_id: &str) -> Result<()> {
    let file = paths.session_scrollback_file(session_id);
    match std::fs::remove_file(&file) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Scan `storage_dir` for `*.json` metadata files (skipping the reserved
/// `client-state.json`), parsing each as `SessionMetadata`. A file that
/// fails to parse is logged and skipped — startup never aborts on a
/// corrupt session file.
pub fn load_all_metadata(storage_dir: &Path) -> Vec<SessionMetadata> {
    let mut loaded = Vec::new();
    let entries = match std::fs::read_dir(storage_dir) {
        Ok(e) => e,
        Err(_) => return loaded,
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        if path.file_name().and_then(|n| n.to_str()) == Some(ClaudexPaths::CLIENT_STATE_FILE_NAME) {
            continue;
        }

        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(event = "session.load_read_failed", file = %path.display(), error = %e);
                continue;
            }
        };

        match serde_json::from_str::<SessionMetadata>(&contents) {
            Ok(mut meta) => {
                // Runtime state cannot be resumed across a restart.
                meta.status = claudex_protocol::Status::Idle;
                loaded.push(meta);
            }
            Err(e) => {
                tracing::warn!(event = "session.load_parse_failed", file = %path.display(), error = %e);
            }
        }
    }

    loaded
}
