//! Remote state ingestion: resource statuses pushed over the live channel and
//! full-state reconciliation after a refetch.
//!
//! Reconciliation never records history and never queues save requests.
//! Resources with unsaved local edits are left alone until those edits are
//! acknowledged.

use crate::json::{self, Resource};
use crate::model::{BoxEntity, Dictionary, LinkDefinition};
use crate::pending::ResourceKind;
use crate::store::DocumentStore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{info, warn};

/// Full resource set of one schema as fetched from the backend.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaState {
    #[serde(default)]
    pub resources: Vec<Resource>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceStatus {
    Running,
    Pending,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum LiveEvent {
    Status { resource: String, status: ResourceStatus },
    RepositoryUpdate,
    Reconnected,
}

/// What the host must do after an event was handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncAction {
    None,
    Refetch,
}

#[derive(Clone, Debug, Default)]
pub struct StatusBoard {
    statuses: BTreeMap<String, ResourceStatus>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &LiveEvent) -> SyncAction {
        match event {
            LiveEvent::Status { resource, status } => {
                self.statuses.insert(resource.clone(), *status);
                SyncAction::None
            }
            LiveEvent::RepositoryUpdate | LiveEvent::Reconnected => SyncAction::Refetch,
        }
    }

    pub fn status(&self, resource: &str) -> Option<ResourceStatus> {
        self.statuses.get(resource).copied()
    }

    pub fn statuses(&self) -> &BTreeMap<String, ResourceStatus> {
        &self.statuses
    }

    pub fn clear(&mut self) {
        self.statuses.clear();
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub name: String,
}

impl ResourceRef {
    fn new(kind: ResourceKind, name: &str) -> ResourceRef {
        ResourceRef {
            kind,
            name: name.to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub added: Vec<ResourceRef>,
    pub changed: Vec<ResourceRef>,
    pub removed: Vec<ResourceRef>,
    /// Left untouched: unsaved local edits or an unreadable remote body.
    pub skipped: Vec<ResourceRef>,
}

impl ReconcileReport {
    /// True when the store was not modified.
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.removed.is_empty()
    }
}

const KINDS: [ResourceKind; 4] = [
    ResourceKind::Box,
    ResourceKind::LinkDefinition,
    ResourceKind::Dictionary,
    ResourceKind::Settings,
];

fn apply_remote(store: &mut DocumentStore, r: &Resource) -> crate::error::Result<()> {
    match r.kind {
        ResourceKind::Box => {
            let mut b: BoxEntity = json::parse_resource(r.body.clone())?;
            b.name = r.name.clone();
            store.remote_upsert_box(b);
        }
        ResourceKind::LinkDefinition => {
            let mut d: LinkDefinition = json::parse_resource(r.body.clone())?;
            d.name = r.name.clone();
            store.remote_upsert_link_document(d);
        }
        ResourceKind::Dictionary => {
            let mut d: Dictionary = json::parse_resource(r.body.clone())?;
            d.name = r.name.clone();
            store.remote_upsert_dictionary(d);
        }
        ResourceKind::Settings => store.remote_set_settings(&r.name, r.body.clone()),
    }
    Ok(())
}

/// Brings the store in line with `state`, applying only the delta. Running it
/// twice with the same state leaves the second run a no-op.
pub fn reconcile(store: &mut DocumentStore, state: &SchemaState) -> ReconcileReport {
    let mut report = ReconcileReport::default();
    let mut seen: HashSet<(ResourceKind, &str)> = HashSet::new();

    for r in &state.resources {
        seen.insert((r.kind, r.name.as_str()));
        if store.has_pending(r.kind, &r.name) {
            report.skipped.push(ResourceRef::new(r.kind, &r.name));
            continue;
        }
        let remote = r.effective_hash();
        let local = store.local_hash(r.kind, &r.name);
        if local.as_deref() == Some(remote.as_str()) {
            continue;
        }
        if let Err(e) = apply_remote(store, r) {
            warn!(kind = ?r.kind, name = %r.name, error = %e, "ignoring unreadable remote resource");
            report.skipped.push(ResourceRef::new(r.kind, &r.name));
            continue;
        }
        store.set_hash(r.kind, &r.name, remote);
        let entry = ResourceRef::new(r.kind, &r.name);
        if local.is_some() {
            report.changed.push(entry);
        } else {
            report.added.push(entry);
        }
    }

    for kind in KINDS {
        for name in store.resource_names(kind) {
            if seen.contains(&(kind, name.as_str())) {
                continue;
            }
            if store.has_pending(kind, &name) {
                report.skipped.push(ResourceRef::new(kind, &name));
                continue;
            }
            store.remote_remove(kind, &name);
            report.removed.push(ResourceRef::new(kind, &name));
        }
    }

    info!(
        added = report.added.len(),
        changed = report.changed.len(),
        removed = report.removed.len(),
        skipped = report.skipped.len(),
        "reconciled remote state"
    );
    report
}
