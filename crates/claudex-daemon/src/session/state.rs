use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use claudex_protocol::{LayoutNode, SessionSummary, SplitDirection, Status};

use crate::errors::{ClaudexError, Result};
use crate::pty::{PtyExitEvent, PtyPane};

/// Persisted fields of a `Session`: everything written to
/// `<storage>/<id>.json` and restored on daemon startup. `status` is the
/// one field intentionally *not* carried by meaning across a restart — it
/// is written as a record of the last observed value but always reloaded
/// as `Idle`, since a child process cannot be resumed in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub id: String,
    pub name: String,
    pub directory: PathBuf,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_input_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub worktree_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_agent_session_id: Option<String>,
    pub layout: LayoutNode,
    pub main_pane_id: String,
    /// Opaque UI-editable key/value pairs (`UpdateCustomization`); the core
    /// round-trips these without interpreting them.
    #[serde(default)]
    pub customization: std::collections::BTreeMap<String, String>,
}

/// A Session aggregates one or more panes under a shared identity, working
/// directory, and derived status. Exclusively owns its panes; `main_pane_id`
/// names the pane operations default to when no pane id is supplied.
pub struct Session {
    pub meta: SessionMetadata,
    panes: HashMap<String, PtyPane>,
}

impl Session {
    /// Construct a brand-new session with a single inactive main pane.
    pub fn new(id: String, name: String, directory: PathBuf) -> Self {
        let main_pane_id = "main".to_string();
        let now = Utc::now();
        let mut panes = HashMap::new();
        panes.insert(main_pane_id.clone(), PtyPane::inactive(directory.clone()));

        Self {
            meta: SessionMetadata {
                id,
                name,
                directory,
                status: Status::Idle,
                created_at: now,
                updated_at: now,
                last_input_at: None,
                parent_id: None,
                worktree_path: None,
                branch: None,
                last_agent_session_id: None,
                layout: LayoutNode::leaf(main_pane_id.clone()),
                main_pane_id,
                customization: Default::default(),
            },
            panes,
        }
    }

    /// Reconstruct a session from persisted metadata plus an inactive pane
    /// for every id the layout tree names. Runtime state (child processes,
    /// trackers) is never restored — only metadata, scrollback, and the
    /// last agent session id survive a restart.
    pub fn from_metadata(meta: SessionMetadata) -> Self {
        let mut panes = HashMap::new();
        for id in leaf_ids(&meta.layout) {
            panes.insert(id, PtyPane::inactive(meta.directory.clone()));
        }
        panes.entry(meta.main_pane_id.clone()).or_insert_with(|| PtyPane::inactive(meta.directory.clone()));
        Self { meta, panes }
    }

    pub fn id(&self) -> &str {
        &self.meta.id
    }

    pub fn main_pane_id(&self) -> &str {
        &self.meta.main_pane_id
    }

    pub fn status(&self) -> Status {
        self.meta.status
    }

    pub fn pane(&self, id: &str) -> Option<&PtyPane> {
        self.panes.get(id)
    }

    pub fn pane_mut(&mut self, id: &str) -> Option<&mut PtyPane> {
        self.panes.get_mut(id)
    }

    pub fn main_pane(&self) -> &PtyPane {
        self.panes
            .get(&self.meta.main_pane_id)
            .expect("main_pane_id always names a live entry in panes")
    }

    pub fn pane_ids(&self) -> impl Iterator<Item = &String> {
        self.panes.keys()
    }

    /// Resolve the effective pane id for an operation: the caller's
    /// explicit choice, or the session's main pane.
    pub fn resolve_pane_id<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested.unwrap_or(&self.meta.main_pane_id)
    }

    /// Insert a new inactive pane. Does not touch the layout tree —
    /// `split_pane` is the operation that actually grafts a pane into the
    /// visible layout.
    pub fn create_pane(&mut self, id: String, directory: PathBuf) {
        self.panes.insert(id, PtyPane::inactive(directory));
    }

    /// Stop and remove a pane, collapsing any layout split that becomes a
    /// single child as a result. Removing the main pane is rejected —
    /// callers must `remove_pane` every other leaf first.
    pub fn remove_pane(&mut self, id: &str) -> Result<()> {
        if id == self.meta.main_pane_id {
            return Err(ClaudexError::ProtocolError(
                "cannot remove a session's main pane".to_string(),
            ));
        }
        if let Some(pane) = self.panes.get_mut(id) {
            pane.stop();
        }
        self.panes.remove(id);
        self.meta.layout = collapse_after_removal(&self.meta.layout, id);
        self.meta.updated_at = Utc::now();
        Ok(())
    }

    /// Replace the leaf for `existing_id` with a split of the old leaf and
    /// a new `new_id` leaf, copying the existing pane's working directory
    /// into the new one.
    pub fn split_pane(&mut self, existing_id: &str, new_id: String, direction: SplitDirection) -> Result<()> {
        if !self.panes.contains_key(existing_id) {
            return Err(ClaudexError::PaneNotFound(existing_id.to_string()));
        }
        let directory = self.panes[existing_id].working_directory().to_path_buf();
        self.meta.layout = replace_leaf_with_split(&self.meta.layout, existing_id, &new_id, direction);
        self.panes.insert(new_id, PtyPane::inactive(directory));
        self.meta.updated_at = Utc::now();
        Ok(())
    }

    /// `session.status = max(pane.status)` under the `Status` total order,
    /// which is declared in exactly the priority used here. Returns the
    /// new status if it changed.
    pub fn update_aggregate_status(&mut self) -> Option<Status> {
        let aggregate = self.panes.values().map(|p| p.status()).max().unwrap_or(Status::Idle);
        if aggregate != self.meta.status {
            self.meta.status = aggregate;
            self.meta.updated_at = Utc::now();
            Some(aggregate)
        } else {
            None
        }
    }

    /// Query the main pane's child cwd and update `directory` if it has
    /// drifted (e.g. the shell `cd`'d elsewhere). Returns whether a change
    /// occurred, so the caller knows to persist.
    pub fn update_cwd(&mut self) -> bool {
        let observed = self.main_pane().process_cwd();
        if observed != self.meta.directory {
            self.meta.directory = observed;
            self.meta.updated_at = Utc::now();
            true
        } else {
            false
        }
    }

    pub fn record_input_time(&mut self) {
        self.meta.last_input_at = Some(Utc::now());
    }

    pub fn directory(&self) -> &Path {
        &self.meta.directory
    }

    pub fn to_summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.meta.id.clone(),
            name: self.meta.name.clone(),
            directory: self.meta.directory.display().to_string(),
            status: self.meta.status,
            layout: self.meta.layout.clone(),
            parent_id: self.meta.parent_id.clone(),
            worktree_path: self.meta.worktree_path.clone(),
            branch: self.meta.branch.clone(),
            created_at: self.meta.created_at,
            updated_at: self.meta.updated_at,
        }
    }

    /// Stop every pane (used on session delete and process shutdown).
    pub fn stop_all_panes(&mut self) {
        for pane in self.panes.values_mut() {
            pane.stop();
        }
    }
}

fn leaf_ids(node: &LayoutNode) -> Vec<String> {
    match node {
        LayoutNode::Leaf { leaf } => vec![leaf.clone()],
        LayoutNode::Split { children, .. } => {
            let mut ids = leaf_ids(&children.0);
            ids.extend(leaf_ids(&children.1));
            ids
        }
    }
}

fn replace_leaf_with_split(node: &LayoutNode, target: &str, new_id: &str, direction: SplitDirection) -> LayoutNode {
    match node {
        LayoutNode::Leaf { leaf } if leaf == target => {
            LayoutNode::split(direction, LayoutNode::leaf(leaf.clone()), LayoutNode::leaf(new_id.to_string()))
        }
        LayoutNode::Leaf { .. } => node.clone(),
        LayoutNode::Split { split, children } => LayoutNode::Split {
            split: *split,
            children: Box::new((
                replace_leaf_with_split(&children.0, target, new_id, direction),
                replace_leaf_with_split(&children.1, target, new_id, direction),
            )),
        },
    }
}

/// Remove `target` from the layout tree, collapsing any split that becomes
/// a single child into that remaining child directly.
fn collapse_after_removal(node: &LayoutNode, target: &str) -> LayoutNode {
    match node {
        LayoutNode::Leaf { .. } => node.clone(),
        LayoutNode::Split { split, children } => {
            let left_is_target = matches!(&children.0, LayoutNode::Leaf { leaf } if leaf == target);
            let right_is_target = matches!(&children.1, LayoutNode::Leaf { leaf } if leaf == target);
            if left_is_target {
                return children.1.clone();
            }
            if right_is_target {
                return children.0.clone();
            }
            LayoutNode::Split {
                split: *split,
                children: Box::new((
                    collapse_after_removal(&children.0, target),
                    collapse_after_removal(&children.1, target),
                )),
            }
        }
    }
}

/// Closures threaded into `PtyPane::start`/`resume` so output and status
/// events reach their owning session and, from there, the fan-out layer.
/// Built by the manager; kept here only as type aliases for readability.
pub type OutputSink = Arc<dyn Fn(&[u8]) + Send + Sync>;
pub type StatusSink = Arc<dyn Fn(Status) + Send + Sync>;
pub type ExitSender = mpsc::UnboundedSender<PtyExitEvent>;

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new("s1".to_string(), "test".to_string(), PathBuf::from("/tmp"))
    }

    #[test]
    fn new_session_has_a_single_main_leaf() {
        let s = session();
        assert_eq!(s.meta.layout, LayoutNode::leaf("main"));
        assert_eq!(s.main_pane_id(), "main");
        assert_eq!(s.status(), Status::Idle);
    }

    #[test]
    fn split_pane_replaces_leaf_with_split() {
        let mut s = session();
        s.split_pane("main", "right".to_string(), SplitDirection::Vertical).unwrap();
        assert_eq!(
            s.meta.layout,
            LayoutNode::split(SplitDirection::Vertical, LayoutNode::leaf("main"), LayoutNode::leaf("right"))
        );
        assert!(s.pane("right").is_some());
    }

    #[test]
    fn split_unknown_pane_fails() {
        let mut s = session();
        let err = s.split_pane("nope", "x".to_string(), SplitDirection::Horizontal).unwrap_err();
        assert!(matches!(err, ClaudexError::PaneNotFound(_)));
    }

    #[test]
    fn split_then_remove_restores_original_layout() {
        let mut s = session();
        s.split_pane("main", "right".to_string(), SplitDirection::Vertical).unwrap();
        s.remove_pane("right").unwrap();
        assert_eq!(s.meta.layout, LayoutNode::leaf("main"));
        assert!(s.pane("right").is_none());
    }

    #[test]
    fn removing_main_pane_is_rejected() {
        let mut s = session();
        let err = s.remove_pane("main").unwrap_err();
        assert!(matches!(err, ClaudexError::ProtocolError(_)));
    }

    #[test]
    fn update_aggregate_status_picks_highest_priority_pane() {
        let mut s = session();
        s.create_pane("side".to_string(), PathBuf::from("/tmp"));
        // Both panes are inactive (Idle) so aggregate stays Idle, no change reported.
        assert_eq!(s.update_aggregate_status(), None);
        assert_eq!(s.status(), Status::Idle);
    }

    #[test]
    fn to_summary_reflects_current_metadata() {
        let s = session();
        let summary = s.to_summary();
        assert_eq!(summary.id, "s1");
        assert_eq!(summary.name, "test");
        assert_eq!(summary.status, Status::Idle);
    }

    #[test]
    fn from_metadata_rebuilds_inactive_panes_for_every_leaf() {
        let mut s = session();
        s.split_pane("main", "right".to_string(), SplitDirection::Vertical).unwrap();
        let meta = s.meta.clone();
        let rebuilt = Session::from_metadata(meta);
        assert!(rebuilt.pane("main").is_some());
        assert!(rebuilt.pane("right").is_some());
        assert!(!rebuilt.main_pane().is_running());
    }
}
