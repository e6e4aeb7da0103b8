//! Canonical in-memory schema: boxes, dictionaries and link-definition
//! documents, plus the derived link lists.
//!
//! Every mutation goes through this type. A mutation validates first, then
//! applies, enqueues the resulting save requests and, when `record` is set,
//! pushes one snapshot holding the entity change and any cascade it caused.

use crate::error::{EditorError, Result};
use crate::hash;
use crate::history::{History, ReplayTarget};
use crate::links::{self, DocumentTouch, LinkRemoval};
use crate::model::{
    BoxEntity, Change, ConnectionType, Dictionary, DictionaryLink, Entity, EntityKind, Link,
    LinkDefinition, Operation, Pin, Snapshot,
};
use crate::pending::{PendingOperation, PendingQueue, RequestOperation, ResourceKind};
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::debug;

pub const DEFAULT_LINKS_DOCUMENT: &str = "editor-generated-links";

fn payload<T: Serialize>(t: &T) -> Value {
    serde_json::to_value(t).unwrap_or(Value::Null)
}

pub(crate) fn validate_box(b: &BoxEntity) -> Result<()> {
    if b.name.trim().is_empty() {
        return Err(EditorError::InvalidDocument("box name is empty".into()));
    }
    let mut seen = HashSet::new();
    for pin in b.pins() {
        if !seen.insert(pin.name.as_str()) {
            return Err(EditorError::InvalidDocument(format!(
                "duplicate pin '{}' in box '{}'",
                pin.name, b.name
            )));
        }
        if pin.connection().is_none() {
            return Err(EditorError::InvalidConnectionType(pin.connection_type.clone()));
        }
    }
    Ok(())
}

#[derive(Clone, Debug)]
pub struct DocumentStore {
    boxes: Vec<BoxEntity>,
    dictionaries: Vec<Dictionary>,
    link_documents: Vec<LinkDefinition>,
    links: Vec<Link>,
    dictionary_links: Vec<DictionaryLink>,
    settings: Option<(String, Value)>,
    hashes: HashMap<(ResourceKind, String), String>,
    pending: PendingQueue,
    history: History,
    default_links_document: String,
    version: u64,
    links_version: u64,
}

impl Default for DocumentStore {
    fn default() -> Self {
        DocumentStore::new(crate::history::DEFAULT_CAPACITY, DEFAULT_LINKS_DOCUMENT)
    }
}

impl DocumentStore {
    pub fn new(history_capacity: usize, default_links_document: &str) -> Self {
        DocumentStore {
            boxes: Vec::new(),
            dictionaries: Vec::new(),
            link_documents: Vec::new(),
            links: Vec::new(),
            dictionary_links: Vec::new(),
            settings: None,
            hashes: HashMap::new(),
            pending: PendingQueue::new(),
            history: History::new(history_capacity),
            default_links_document: default_links_document.to_string(),
            version: 1,
            links_version: 1,
        }
    }

    /// Drops all entities, history and pending requests.
    pub fn reset(&mut self) {
        self.boxes.clear();
        self.dictionaries.clear();
        self.link_documents.clear();
        self.settings = None;
        self.hashes.clear();
        self.pending.clear();
        self.history.clear();
        self.touch_links();
        self.bump();
    }

    // Read access

    pub fn boxes(&self) -> &[BoxEntity] {
        &self.boxes
    }

    pub fn get_box(&self, name: &str) -> Option<&BoxEntity> {
        self.boxes.iter().find(|b| b.name == name)
    }

    pub fn dictionaries(&self) -> &[Dictionary] {
        &self.dictionaries
    }

    pub fn get_dictionary(&self, name: &str) -> Option<&Dictionary> {
        self.dictionaries.iter().find(|d| d.name == name)
    }

    pub fn link_documents(&self) -> &[LinkDefinition] {
        &self.link_documents
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn get_link(&self, name: &str) -> Option<&Link> {
        self.links.iter().find(|l| l.name == name)
    }

    pub fn dictionary_links(&self) -> &[DictionaryLink] {
        &self.dictionary_links
    }

    pub fn settings(&self) -> Option<&Value> {
        self.settings.as_ref().map(|(_, v)| v)
    }

    pub fn settings_name(&self) -> Option<&str> {
        self.settings.as_ref().map(|(n, _)| n.as_str())
    }

    pub fn pending(&self) -> &[PendingOperation] {
        self.pending.operations()
    }

    pub fn has_pending(&self, kind: ResourceKind, name: &str) -> bool {
        self.pending.contains(kind, name)
    }

    /// Forget operations a save delivered.
    pub fn acknowledge_sent(&mut self, sent: &[PendingOperation]) {
        self.pending.acknowledge(sent);
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Bumps on every mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Bumps whenever the link set changes.
    pub fn links_version(&self) -> u64 {
        self.links_version
    }

    pub(crate) fn stored_hash(&self, kind: ResourceKind, name: &str) -> Option<&String> {
        self.hashes.get(&(kind, name.to_string()))
    }

    pub(crate) fn set_hash(&mut self, kind: ResourceKind, name: &str, hash: String) {
        self.hashes.insert((kind, name.to_string()), hash);
    }

    // Bookkeeping

    fn bump(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    fn touch_links(&mut self) {
        self.links = links::to_editor_links(&self.link_documents);
        self.dictionary_links = links::to_editor_dictionary_links(&self.link_documents);
        self.links_version = self.links_version.wrapping_add(1);
    }

    fn record(&mut self, record: bool, snapshot: Snapshot) {
        if record {
            self.history.push(snapshot);
        }
    }

    fn enqueue_entity<T: Serialize>(&mut self, op: RequestOperation, kind: ResourceKind, name: &str, entity: &T) {
        let body = payload(entity);
        if op == RequestOperation::Remove {
            self.hashes.remove(&(kind, name.to_string()));
        } else {
            self.set_hash(kind, name, hash::content_hash(&body));
        }
        self.pending.enqueue(op, kind, name, body);
    }

    fn enqueue_document(&mut self, name: &str, created: bool) {
        let Some(doc) = self.link_documents.iter().find(|d| d.name == name).cloned() else {
            return;
        };
        let op = if created { RequestOperation::Add } else { RequestOperation::Update };
        self.enqueue_entity(op, ResourceKind::LinkDefinition, name, &doc);
    }

    fn enqueue_touch(&mut self, touch: &DocumentTouch) {
        self.enqueue_document(&touch.document, touch.created);
    }

    /// Changes for an insert: the entity, then the document the insert had to
    /// create. Undo removes the entity first, leaving the document empty.
    fn inserted(entity: Entity, touch: &DocumentTouch) -> Vec<Change> {
        let mut changes = vec![Change::added(entity)];
        if touch.created {
            changes.push(Change::added(Entity::LinkDefinition(LinkDefinition::new(&touch.document))));
        }
        changes
    }

    fn enqueue_documents(&mut self, removals: &[&LinkRemoval]) {
        let mut names: Vec<String> = Vec::new();
        for r in removals {
            for d in &r.documents {
                if !names.contains(&d.name) {
                    names.push(d.name.clone());
                }
            }
        }
        for n in names {
            self.enqueue_document(&n, false);
        }
    }

    fn box_index(&self, name: &str) -> Result<usize> {
        self.boxes
            .iter()
            .position(|b| b.name == name)
            .ok_or_else(|| EditorError::not_found(EntityKind::Box, name))
    }

    fn dictionary_index(&self, name: &str) -> Result<usize> {
        self.dictionaries
            .iter()
            .position(|d| d.name == name)
            .ok_or_else(|| EditorError::not_found(EntityKind::Dictionary, name))
    }

    // Boxes

    pub fn create_box(&mut self, b: BoxEntity, record: bool) -> Result<()> {
        validate_box(&b)?;
        if self.get_box(&b.name).is_some() {
            return Err(EditorError::duplicate(EntityKind::Box, &b.name));
        }
        debug!(name = %b.name, "create box");
        self.enqueue_entity(RequestOperation::Add, ResourceKind::Box, &b.name, &b);
        self.boxes.push(b.clone());
        self.bump();
        let name = b.name.clone();
        self.record(
            record,
            Snapshot::new(name, EntityKind::Box, Operation::Add, vec![Change::added(Entity::Box(b))]),
        );
        Ok(())
    }

    /// Deletes a box together with every link and dictionary relation naming it.
    pub fn delete_box(&mut self, name: &str, record: bool) -> Result<()> {
        let idx = self.box_index(name)?;
        let removed = self.boxes.remove(idx);
        let link_removal = links::remove_box_links(&mut self.link_documents, name);
        let dict_removal = links::remove_box_dictionary_links(&mut self.link_documents, name);
        debug!(name, links = link_removal.changes.len(), relations = dict_removal.changes.len(), "delete box");

        self.enqueue_entity(RequestOperation::Remove, ResourceKind::Box, name, &removed);
        self.enqueue_documents(&[&link_removal, &dict_removal]);
        if !link_removal.is_empty() || !dict_removal.is_empty() {
            self.touch_links();
        }
        self.bump();

        let mut changes = vec![Change::removed(Entity::Box(removed)).at(idx)];
        changes.extend(link_removal.changes);
        changes.extend(dict_removal.changes);
        self.record(record, Snapshot::new(name, EntityKind::Box, Operation::Remove, changes));
        Ok(())
    }

    /// Replaces the box named `name` with `updated`. Renames rewrite every link
    /// and relation naming the box; pins that disappear or change type drop
    /// their links.
    pub fn configure_box(&mut self, name: &str, updated: BoxEntity, record: bool) -> Result<()> {
        let idx = self.box_index(name)?;
        validate_box(&updated)?;
        let renamed = updated.name != name;
        if renamed && self.get_box(&updated.name).is_some() {
            return Err(EditorError::duplicate(EntityKind::Box, &updated.name));
        }
        let previous = self.boxes[idx].clone();
        if previous == updated {
            return Ok(());
        }

        let dropped: Vec<&str> = previous
            .pins()
            .iter()
            .filter(|pin| {
                !updated
                    .pin(&pin.name)
                    .is_some_and(|p| p.connection_type == pin.connection_type)
            })
            .map(|pin| pin.name.as_str())
            .collect();
        let mut cascades = Vec::new();
        if !dropped.is_empty() {
            cascades.push(links::remove_pin_links(&mut self.link_documents, name, &dropped));
        }
        if renamed {
            cascades.push(links::rename_box_references(&mut self.link_documents, name, &updated.name));
        }
        self.boxes[idx] = updated.clone();
        debug!(name, renamed, "configure box");

        if renamed {
            self.enqueue_entity(RequestOperation::Remove, ResourceKind::Box, name, &previous);
            self.enqueue_entity(RequestOperation::Add, ResourceKind::Box, &updated.name, &updated);
        } else {
            self.enqueue_entity(RequestOperation::Update, ResourceKind::Box, name, &updated);
        }
        let refs: Vec<&LinkRemoval> = cascades.iter().collect();
        self.enqueue_documents(&refs);
        if cascades.iter().any(|c| !c.is_empty()) {
            self.touch_links();
        }
        self.bump();

        let mut changes = Vec::new();
        changes.extend(Change::modified(Entity::Box(previous), Entity::Box(updated)));
        for c in cascades {
            changes.extend(c.changes);
        }
        self.record(record, Snapshot::new(name, EntityKind::Box, Operation::Change, changes));
        Ok(())
    }

    /// Adds `pin` to the box, or replaces the pin with the same name.
    pub fn configure_pin(&mut self, box_name: &str, pin: Pin, record: bool) -> Result<()> {
        if pin.connection().is_none() {
            return Err(EditorError::InvalidConnectionType(pin.connection_type));
        }
        let mut updated = self.boxes[self.box_index(box_name)?].clone();
        let pins = updated.pins_mut();
        match pins.iter_mut().find(|p| p.name == pin.name) {
            Some(slot) => *slot = pin,
            None => pins.push(pin),
        }
        self.configure_box(box_name, updated, record)
    }

    pub fn remove_pin(&mut self, box_name: &str, pin: &str, record: bool) -> Result<()> {
        let mut updated = self.boxes[self.box_index(box_name)?].clone();
        let before = updated.pins().len();
        updated.pins_mut().retain(|p| p.name != pin);
        if updated.pins().len() == before {
            return Err(EditorError::PinNotFound {
                box_name: box_name.to_string(),
                pin: pin.to_string(),
            });
        }
        self.configure_box(box_name, updated, record)
    }

    // Dictionaries

    pub fn create_dictionary(&mut self, d: Dictionary, record: bool) -> Result<()> {
        if d.name.trim().is_empty() {
            return Err(EditorError::InvalidDocument("dictionary name is empty".into()));
        }
        if self.get_dictionary(&d.name).is_some() {
            return Err(EditorError::duplicate(EntityKind::Dictionary, &d.name));
        }
        self.enqueue_entity(RequestOperation::Add, ResourceKind::Dictionary, &d.name, &d);
        self.dictionaries.push(d.clone());
        self.bump();
        let name = d.name.clone();
        self.record(
            record,
            Snapshot::new(name, EntityKind::Dictionary, Operation::Add, vec![Change::added(Entity::Dictionary(d))]),
        );
        Ok(())
    }

    pub fn delete_dictionary(&mut self, name: &str, record: bool) -> Result<()> {
        let idx = self.dictionary_index(name)?;
        let removed = self.dictionaries.remove(idx);
        let relations = links::remove_dictionary_relations(&mut self.link_documents, name);
        self.enqueue_entity(RequestOperation::Remove, ResourceKind::Dictionary, name, &removed);
        self.enqueue_documents(&[&relations]);
        if !relations.is_empty() {
            self.touch_links();
        }
        self.bump();
        let mut changes = vec![Change::removed(Entity::Dictionary(removed)).at(idx)];
        changes.extend(relations.changes);
        self.record(record, Snapshot::new(name, EntityKind::Dictionary, Operation::Remove, changes));
        Ok(())
    }

    pub fn configure_dictionary(&mut self, name: &str, updated: Dictionary, record: bool) -> Result<()> {
        let idx = self.dictionary_index(name)?;
        if updated.name.trim().is_empty() {
            return Err(EditorError::InvalidDocument("dictionary name is empty".into()));
        }
        let renamed = updated.name != name;
        if renamed && self.get_dictionary(&updated.name).is_some() {
            return Err(EditorError::duplicate(EntityKind::Dictionary, &updated.name));
        }
        let previous = self.dictionaries[idx].clone();
        if previous == updated {
            return Ok(());
        }
        let relations = if renamed {
            links::rename_dictionary_references(&mut self.link_documents, name, &updated.name)
        } else {
            LinkRemoval::default()
        };
        self.dictionaries[idx] = updated.clone();
        if renamed {
            self.enqueue_entity(RequestOperation::Remove, ResourceKind::Dictionary, name, &previous);
            self.enqueue_entity(RequestOperation::Add, ResourceKind::Dictionary, &updated.name, &updated);
        } else {
            self.enqueue_entity(RequestOperation::Update, ResourceKind::Dictionary, name, &updated);
        }
        self.enqueue_documents(&[&relations]);
        if !relations.is_empty() {
            self.touch_links();
        }
        self.bump();
        let mut changes = Vec::new();
        changes.extend(Change::modified(Entity::Dictionary(previous), Entity::Dictionary(updated)));
        changes.extend(relations.changes);
        self.record(record, Snapshot::new(name, EntityKind::Dictionary, Operation::Change, changes));
        Ok(())
    }

    // Links

    fn validate_link(&self, link: &Link) -> Result<()> {
        if link.name.trim().is_empty() {
            return Err(EditorError::InvalidDocument("link name is empty".into()));
        }
        let family = link.from.connection_type;
        if link.to.connection_type != family {
            return Err(EditorError::IncompatiblePins {
                from: format!("{}/{}", link.from.box_name, link.from.pin),
                to: format!("{}/{}", link.to.box_name, link.to.pin),
            });
        }
        for end in [&link.from, &link.to] {
            let b = self
                .get_box(&end.box_name)
                .ok_or_else(|| EditorError::not_found(EntityKind::Box, &end.box_name))?;
            let pin = b.pin(&end.pin).ok_or_else(|| EditorError::PinNotFound {
                box_name: end.box_name.clone(),
                pin: end.pin.clone(),
            })?;
            if pin.connection() != Some(family) {
                return Err(EditorError::IncompatiblePins {
                    from: format!("{}/{}", link.from.box_name, link.from.pin),
                    to: format!("{}/{}", link.to.box_name, link.to.pin),
                });
            }
        }
        Ok(())
    }

    pub fn add_link(&mut self, link: Link, record: bool) -> Result<()> {
        self.validate_link(&link)?;
        let (stored, touch) =
            links::insert_link(&mut self.link_documents, &link, &self.default_links_document, None)?;
        debug!(name = %stored.name, document = %touch.document, created = touch.created, "add link");
        self.enqueue_touch(&touch);
        self.touch_links();
        self.bump();
        let name = stored.name.clone();
        let changes = Self::inserted(Entity::Link(stored), &touch);
        self.record(record, Snapshot::new(name, EntityKind::Link, Operation::Add, changes));
        Ok(())
    }

    pub fn delete_link(&mut self, name: &str, record: bool) -> Result<()> {
        let (removed, slot) = links::remove_link(&mut self.link_documents, name)
            .ok_or_else(|| EditorError::not_found(EntityKind::Link, name))?;
        self.enqueue_document(&slot.document, false);
        self.touch_links();
        self.bump();
        let change = Change::removed(Entity::Link(removed)).at(slot.index);
        self.record(record, Snapshot::new(name, EntityKind::Link, Operation::Remove, vec![change]));
        Ok(())
    }

    pub fn change_link(&mut self, name: &str, link: Link, record: bool) -> Result<()> {
        if self.get_link(name).is_none() {
            return Err(EditorError::not_found(EntityKind::Link, name));
        }
        self.validate_link(&link)?;
        let (previous, slot) = links::replace_link(&mut self.link_documents, name, &link, None)?;
        let mut stored = link;
        stored.document = Some(slot.document.clone());
        self.enqueue_document(&slot.document, false);
        self.touch_links();
        self.bump();
        let changes = Change::modified(Entity::Link(previous), Entity::Link(stored))
            .map(|c| c.at(slot.index))
            .into_iter()
            .collect();
        self.record(record, Snapshot::new(name, EntityKind::Link, Operation::Change, changes));
        Ok(())
    }

    pub fn add_dictionary_link(&mut self, link: DictionaryLink, record: bool) -> Result<()> {
        if self.get_box(&link.box_name).is_none() {
            return Err(EditorError::not_found(EntityKind::Box, &link.box_name));
        }
        if self.get_dictionary(&link.dictionary.name).is_none() {
            return Err(EditorError::not_found(EntityKind::Dictionary, &link.dictionary.name));
        }
        let (stored, touch) =
            links::insert_dictionary_link(&mut self.link_documents, &link, &self.default_links_document, None)?;
        self.enqueue_touch(&touch);
        self.touch_links();
        self.bump();
        let name = stored.name.clone();
        let changes = Self::inserted(Entity::DictionaryLink(stored), &touch);
        self.record(record, Snapshot::new(name, EntityKind::DictionaryLink, Operation::Add, changes));
        Ok(())
    }

    pub fn delete_dictionary_link(&mut self, name: &str, record: bool) -> Result<()> {
        let (removed, slot) = links::remove_dictionary_link(&mut self.link_documents, name)
            .ok_or_else(|| EditorError::not_found(EntityKind::DictionaryLink, name))?;
        self.enqueue_document(&slot.document, false);
        self.touch_links();
        self.bump();
        let change = Change::removed(Entity::DictionaryLink(removed)).at(slot.index);
        self.record(record, Snapshot::new(name, EntityKind::DictionaryLink, Operation::Remove, vec![change]));
        Ok(())
    }

    /// Links attached to `box_name`, split by family.
    pub fn box_links(&self, box_name: &str, family: Option<ConnectionType>) -> Vec<&Link> {
        self.links
            .iter()
            .filter(|l| l.touches_box(box_name))
            .filter(|l| family.is_none_or(|f| l.connection_type() == f))
            .collect()
    }

    // History

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo(&mut self) -> bool {
        let mut history = std::mem::take(&mut self.history);
        let done = history.undo(self);
        self.history = history;
        done
    }

    pub fn redo(&mut self) -> bool {
        let mut history = std::mem::take(&mut self.history);
        let done = history.redo(self);
        self.history = history;
        done
    }

    // Remote ingestion. No history, no save requests.

    pub(crate) fn remote_upsert_box(&mut self, b: BoxEntity) {
        match self.boxes.iter_mut().find(|x| x.name == b.name) {
            Some(slot) => *slot = b,
            None => self.boxes.push(b),
        }
        self.bump();
    }

    pub(crate) fn remote_upsert_dictionary(&mut self, d: Dictionary) {
        match self.dictionaries.iter_mut().find(|x| x.name == d.name) {
            Some(slot) => *slot = d,
            None => self.dictionaries.push(d),
        }
        self.bump();
    }

    pub(crate) fn remote_upsert_link_document(&mut self, doc: LinkDefinition) {
        match self.link_documents.iter_mut().find(|x| x.name == doc.name) {
            Some(slot) => *slot = doc,
            None => self.link_documents.push(doc),
        }
        self.touch_links();
        self.bump();
    }

    pub(crate) fn remote_set_settings(&mut self, name: &str, settings: Value) {
        self.settings = Some((name.to_string(), settings));
        self.bump();
    }

    pub(crate) fn remote_remove(&mut self, kind: ResourceKind, name: &str) {
        match kind {
            ResourceKind::Box => self.boxes.retain(|b| b.name != name),
            ResourceKind::Dictionary => self.dictionaries.retain(|d| d.name != name),
            ResourceKind::LinkDefinition => {
                self.link_documents.retain(|d| d.name != name);
                self.touch_links();
            }
            ResourceKind::Settings => self.settings = None,
        }
        self.hashes.remove(&(kind, name.to_string()));
        self.bump();
    }

    pub(crate) fn resource_names(&self, kind: ResourceKind) -> Vec<String> {
        match kind {
            ResourceKind::Box => self.boxes.iter().map(|b| b.name.clone()).collect(),
            ResourceKind::Dictionary => self.dictionaries.iter().map(|d| d.name.clone()).collect(),
            ResourceKind::LinkDefinition => self.link_documents.iter().map(|d| d.name.clone()).collect(),
            ResourceKind::Settings => self.settings_name().map(str::to_string).into_iter().collect(),
        }
    }

    pub(crate) fn local_hash(&self, kind: ResourceKind, name: &str) -> Option<String> {
        if let Some(h) = self.stored_hash(kind, name) {
            return Some(h.clone());
        }
        match kind {
            ResourceKind::Box => hash::hash_of(self.get_box(name)?).ok(),
            ResourceKind::Dictionary => hash::hash_of(self.get_dictionary(name)?).ok(),
            ResourceKind::LinkDefinition => hash::hash_of(self.link_documents.iter().find(|d| d.name == name)?).ok(),
            ResourceKind::Settings => {
                let (_, v) = self.settings.as_ref().filter(|(n, _)| n == name)?;
                Some(hash::content_hash(v))
            }
        }
    }
}

impl ReplayTarget for DocumentStore {
    fn replay_create(&mut self, entity: &Entity, at: Option<usize>) -> Result<()> {
        match entity {
            Entity::Box(b) => {
                if self.get_box(&b.name).is_some() {
                    return Err(EditorError::duplicate(EntityKind::Box, &b.name));
                }
                self.enqueue_entity(RequestOperation::Add, ResourceKind::Box, &b.name, b);
                let i = links::insert_position(at, self.boxes.len());
                self.boxes.insert(i, b.clone());
            }
            Entity::Dictionary(d) => {
                if self.get_dictionary(&d.name).is_some() {
                    return Err(EditorError::duplicate(EntityKind::Dictionary, &d.name));
                }
                self.enqueue_entity(RequestOperation::Add, ResourceKind::Dictionary, &d.name, d);
                let i = links::insert_position(at, self.dictionaries.len());
                self.dictionaries.insert(i, d.clone());
            }
            Entity::Link(l) => {
                let (_, touch) = links::insert_link(&mut self.link_documents, l, &self.default_links_document, at)?;
                self.enqueue_touch(&touch);
                self.touch_links();
            }
            Entity::DictionaryLink(l) => {
                let (_, touch) =
                    links::insert_dictionary_link(&mut self.link_documents, l, &self.default_links_document, at)?;
                self.enqueue_touch(&touch);
                self.touch_links();
            }
            Entity::LinkDefinition(doc) => {
                // Redoing the insert that created this document already recreated it.
                if self.link_documents.iter().any(|d| d.name == doc.name) {
                    return Ok(());
                }
                self.enqueue_entity(RequestOperation::Add, ResourceKind::LinkDefinition, &doc.name, doc);
                let i = links::insert_position(at, self.link_documents.len());
                self.link_documents.insert(i, doc.clone());
                self.touch_links();
            }
        }
        self.bump();
        Ok(())
    }

    fn replay_delete(&mut self, entity: &Entity) -> Result<()> {
        let name = entity.name();
        match entity {
            Entity::Box(_) => {
                let idx = self.box_index(name)?;
                let removed = self.boxes.remove(idx);
                self.enqueue_entity(RequestOperation::Remove, ResourceKind::Box, name, &removed);
            }
            Entity::Dictionary(_) => {
                let idx = self.dictionary_index(name)?;
                let removed = self.dictionaries.remove(idx);
                self.enqueue_entity(RequestOperation::Remove, ResourceKind::Dictionary, name, &removed);
            }
            Entity::Link(_) => {
                let (_, slot) = links::remove_link(&mut self.link_documents, name)
                    .ok_or_else(|| EditorError::not_found(EntityKind::Link, name))?;
                self.enqueue_document(&slot.document, false);
                self.touch_links();
            }
            Entity::DictionaryLink(_) => {
                let (_, slot) = links::remove_dictionary_link(&mut self.link_documents, name)
                    .ok_or_else(|| EditorError::not_found(EntityKind::DictionaryLink, name))?;
                self.enqueue_document(&slot.document, false);
                self.touch_links();
            }
            Entity::LinkDefinition(_) => {
                let idx = self
                    .link_documents
                    .iter()
                    .position(|d| d.name == name)
                    .ok_or_else(|| EditorError::not_found(EntityKind::LinkDefinition, name))?;
                let removed = self.link_documents.remove(idx);
                self.enqueue_entity(RequestOperation::Remove, ResourceKind::LinkDefinition, name, &removed);
                self.touch_links();
            }
        }
        self.bump();
        Ok(())
    }

    fn replay_replace(&mut self, current: &Entity, target: &Entity, at: Option<usize>) -> Result<()> {
        let name = current.name();
        let renamed = target.name() != name;
        match (current, target) {
            (Entity::Box(_), Entity::Box(next)) => {
                let idx = self.box_index(name)?;
                if renamed && self.get_box(&next.name).is_some() {
                    return Err(EditorError::duplicate(EntityKind::Box, &next.name));
                }
                let previous = std::mem::replace(&mut self.boxes[idx], next.clone());
                if renamed {
                    self.enqueue_entity(RequestOperation::Remove, ResourceKind::Box, name, &previous);
                    self.enqueue_entity(RequestOperation::Add, ResourceKind::Box, &next.name, next);
                } else {
                    self.enqueue_entity(RequestOperation::Update, ResourceKind::Box, name, next);
                }
            }
            (Entity::Dictionary(_), Entity::Dictionary(next)) => {
                let idx = self.dictionary_index(name)?;
                if renamed && self.get_dictionary(&next.name).is_some() {
                    return Err(EditorError::duplicate(EntityKind::Dictionary, &next.name));
                }
                let previous = std::mem::replace(&mut self.dictionaries[idx], next.clone());
                if renamed {
                    self.enqueue_entity(RequestOperation::Remove, ResourceKind::Dictionary, name, &previous);
                    self.enqueue_entity(RequestOperation::Add, ResourceKind::Dictionary, &next.name, next);
                } else {
                    self.enqueue_entity(RequestOperation::Update, ResourceKind::Dictionary, name, next);
                }
            }
            (Entity::Link(_), Entity::Link(next)) => {
                let (_, slot) = links::replace_link(&mut self.link_documents, name, next, at)?;
                self.enqueue_document(&slot.document, false);
                self.touch_links();
            }
            (Entity::DictionaryLink(_), Entity::DictionaryLink(next)) => {
                let (_, slot) = links::replace_dictionary_link(&mut self.link_documents, name, next)?;
                self.enqueue_document(&slot.document, false);
                self.touch_links();
            }
            (Entity::LinkDefinition(_), Entity::LinkDefinition(next)) => {
                let slot = self
                    .link_documents
                    .iter_mut()
                    .find(|d| d.name == name)
                    .ok_or_else(|| EditorError::not_found(EntityKind::LinkDefinition, name))?;
                *slot = next.clone();
                self.enqueue_document(&next.name, false);
                self.touch_links();
            }
            _ => {
                return Err(EditorError::InvalidChange(format!(
                    "{} cannot become {}",
                    current.kind(),
                    target.kind()
                )))
            }
        }
        self.bump();
        Ok(())
    }
}
