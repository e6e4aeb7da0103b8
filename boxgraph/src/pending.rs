//! Requests waiting for the next save.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Box,
    LinkDefinition,
    Dictionary,
    Settings,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestOperation {
    Add,
    Update,
    Remove,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
    pub operation: RequestOperation,
    pub kind: ResourceKind,
    pub name: String,
    pub payload: Value,
}

/// One entry per resource. A later request for the same resource folds into
/// the earlier one so the save sends the net effect.
#[derive(Clone, Debug, Default)]
pub struct PendingQueue {
    ops: Vec<PendingOperation>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operations(&self) -> &[PendingOperation] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn contains(&self, kind: ResourceKind, name: &str) -> bool {
        self.ops.iter().any(|o| o.kind == kind && o.name == name)
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }

    pub fn enqueue(&mut self, operation: RequestOperation, kind: ResourceKind, name: &str, payload: Value) {
        use RequestOperation::*;
        let Some(i) = self.ops.iter().position(|o| o.kind == kind && o.name == name) else {
            self.ops.push(PendingOperation {
                operation,
                kind,
                name: name.to_string(),
                payload,
            });
            return;
        };
        let merged = match (self.ops[i].operation, operation) {
            (Add, Remove) => None,
            (Add, _) => Some(Add),
            (Remove, Add) | (Remove, Update) => Some(Update),
            (Update, op) | (Remove, op) => Some(op),
        };
        match merged {
            Some(op) => {
                self.ops[i].operation = op;
                self.ops[i].payload = payload;
            }
            None => {
                self.ops.remove(i);
            }
        }
    }

    /// Drops the operations a successful save sent. Entries that changed after
    /// the request was built stay queued.
    pub fn acknowledge(&mut self, sent: &[PendingOperation]) {
        self.ops.retain(|o| !sent.contains(o));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coalesces_per_resource() {
        let mut q = PendingQueue::new();
        q.enqueue(RequestOperation::Add, ResourceKind::Box, "a", json!({"v": 1}));
        q.enqueue(RequestOperation::Update, ResourceKind::Box, "a", json!({"v": 2}));
        assert_eq!(q.len(), 1);
        assert_eq!(q.operations()[0].operation, RequestOperation::Add);
        assert_eq!(q.operations()[0].payload, json!({"v": 2}));

        q.enqueue(RequestOperation::Remove, ResourceKind::Box, "a", json!({"v": 2}));
        assert!(q.is_empty());

        q.enqueue(RequestOperation::Remove, ResourceKind::Dictionary, "d", json!({}));
        q.enqueue(RequestOperation::Add, ResourceKind::Dictionary, "d", json!({"x": 1}));
        assert_eq!(q.operations()[0].operation, RequestOperation::Update);

        q.enqueue(RequestOperation::Update, ResourceKind::Box, "d", json!({}));
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn acknowledge_keeps_newer_edits() {
        let mut q = PendingQueue::new();
        q.enqueue(RequestOperation::Update, ResourceKind::Box, "a", json!(1));
        q.enqueue(RequestOperation::Update, ResourceKind::Box, "b", json!(1));
        let sent = q.operations().to_vec();
        q.enqueue(RequestOperation::Update, ResourceKind::Box, "b", json!(2));
        q.acknowledge(&sent);
        assert_eq!(q.len(), 1);
        assert_eq!(q.operations()[0].name, "b");
    }
}
