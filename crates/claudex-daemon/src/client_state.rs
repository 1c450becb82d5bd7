use claudex_paths::ClaudexPaths;
use claudex_protocol::ClientState;

use crate::errors::Result;

/// Load the UI-preferences document from `client-state.json`. A missing or
/// unparseable file is treated as an empty document rather than an error —
/// the core is oblivious to its schema and never refuses to start because
/// of it.
pub fn load_client_state(paths: &ClaudexPaths) -> ClientState {
    let path = paths.client_state_file();
    let contents = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(_) => return ClientState::new(),
    };
    serde_json::from_str(&contents).unwrap_or_else(|e| {
        tracing::warn!(event = "client_state.parse_failed", error = %e, "discarding unparseable client state");
        ClientState::new()
    })
}

/// Persist the UI-preferences document atomically.
pub fn save_client_state(paths: &ClaudexPaths, state: &ClientState) -> Result<()> {
    let path = paths.client_state_file();
    let json = serde_json::to_string_pretty(state)?;
    let tmp = path.with_extension("json.tmp");
    if let Err(e) = std::fs::write(&tmp, &json) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    if let Err(e) = std::fs::rename(&tmp, &path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}
