//! Which boxes a link drag may end on.

use crate::model::BoxEntity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A named group of box types, in declared display order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TypeGroup {
    pub title: String,
    pub types: Vec<String>,
}

impl TypeGroup {
    pub fn new(title: &str, types: &[&str]) -> TypeGroup {
        TypeGroup {
            title: title.to_string(),
            types: types.iter().map(|t| t.to_string()).collect(),
        }
    }
}

pub fn default_groups() -> Vec<TypeGroup> {
    vec![
        TypeGroup::new("conn", &["th2-conn", "th2-read", "th2-hand"]),
        TypeGroup::new("codec", &["th2-codec"]),
        TypeGroup::new("act", &["th2-act"]),
        TypeGroup::new("check", &["th2-check1", "th2-check2-recon"]),
        TypeGroup::new("script", &["th2-script"]),
        TypeGroup::new("recon", &["th2-recon"]),
    ]
}

/// Index of the group holding `box_type`. Types no group declares share the
/// trailing index `groups.len()`.
pub fn group_index(groups: &[TypeGroup], box_type: &str) -> usize {
    groups
        .iter()
        .position(|g| g.types.iter().any(|t| t == box_type))
        .unwrap_or(groups.len())
}

fn start_types<'a>(start_box: &'a BoxEntity, start_pin: Option<&str>) -> BTreeSet<&'a str> {
    match start_pin {
        Some(pin) => start_box
            .pin(pin)
            .map(|p| p.connection_type.as_str())
            .into_iter()
            .collect(),
        None => start_box
            .pins()
            .iter()
            .map(|p| p.connection_type.as_str())
            .collect(),
    }
}

/// Boxes outside the start box's group sharing a connection type with the
/// start pin (or with any pin of the start box when no pin is given). Ordered
/// by declared group, then by position in `boxes`.
pub fn connectable_boxes<'a>(
    groups: &[TypeGroup],
    boxes: &'a [BoxEntity],
    start_box: &BoxEntity,
    start_pin: Option<&str>,
) -> Vec<&'a BoxEntity> {
    let types = start_types(start_box, start_pin);
    if types.is_empty() {
        return Vec::new();
    }
    let own_group = group_index(groups, start_box.box_type());
    let mut out = Vec::new();
    for gi in 0..=groups.len() {
        if gi == own_group {
            continue;
        }
        for b in boxes {
            if b.name == start_box.name || group_index(groups, b.box_type()) != gi {
                continue;
            }
            if b.pins().iter().any(|p| types.contains(p.connection_type.as_str())) {
                out.push(b);
            }
        }
    }
    out
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct ResolverKey {
    box_name: String,
    pin: Option<String>,
    store_version: u64,
}

/// Holds the candidate set for the active box/pin. The set is rebuilt whenever
/// the active box, the active pin or the store version differ from the last
/// build.
#[derive(Clone, Debug, Default)]
pub struct CompatibilityResolver {
    groups: Vec<TypeGroup>,
    key: Option<ResolverKey>,
    candidates: Vec<String>,
}

impl CompatibilityResolver {
    pub fn new(groups: Vec<TypeGroup>) -> Self {
        CompatibilityResolver {
            groups,
            key: None,
            candidates: Vec::new(),
        }
    }

    pub fn groups(&self) -> &[TypeGroup] {
        &self.groups
    }

    pub fn group_of(&self, b: &BoxEntity) -> Option<&TypeGroup> {
        self.groups.get(group_index(&self.groups, b.box_type()))
    }

    pub fn refresh(&mut self, boxes: &[BoxEntity], active_box: Option<&str>, active_pin: Option<&str>, store_version: u64) {
        let Some(name) = active_box else {
            self.key = None;
            self.candidates.clear();
            return;
        };
        let key = ResolverKey {
            box_name: name.to_string(),
            pin: active_pin.map(str::to_string),
            store_version,
        };
        if self.key.as_ref() == Some(&key) {
            return;
        }
        self.candidates = match boxes.iter().find(|b| b.name == name) {
            Some(start) => connectable_boxes(&self.groups, boxes, start, active_pin)
                .into_iter()
                .map(|b| b.name.clone())
                .collect(),
            None => Vec::new(),
        };
        self.key = Some(key);
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn is_connectable(&self, box_name: &str) -> bool {
        self.candidates.iter().any(|c| c == box_name)
    }
}
