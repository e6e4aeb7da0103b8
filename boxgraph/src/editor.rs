//! Composition root. Owns one instance of every engine component and keeps
//! the derived ones (geometry, connectable candidates) in step with the store.

use crate::compat::{default_groups, CompatibilityResolver, TypeGroup};
use crate::error::{EditorError, Result};
use crate::geometry::{Arrow, ArrowTieBreak, GeometryCache, LayoutInputs, PinRect};
use crate::history::DEFAULT_CAPACITY;
use crate::json::{self, Resource};
use crate::model::{BoxEntity, Dictionary, DictionaryLink, EntityKind, Link, LinkEndpoint, Pin};
use crate::notify::NotificationCenter;
use crate::session::{FetchHandle, SaveRequest, Session};
use crate::store::{DocumentStore, DEFAULT_LINKS_DOCUMENT};
use crate::sync::{self, LiveEvent, ReconcileReport, SchemaState, StatusBoard, SyncAction};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub history_capacity: usize,
    /// Declared group order used when offering link targets.
    pub groups: Vec<TypeGroup>,
    /// Document new links land in when no other document is available.
    pub default_links_document: String,
    pub arrow_tie_break: ArrowTieBreak,
}

impl Default for EditorConfig {
    fn default() -> Self {
        EditorConfig {
            history_capacity: DEFAULT_CAPACITY,
            groups: default_groups(),
            default_links_document: DEFAULT_LINKS_DOCUMENT.to_string(),
            arrow_tie_break: ArrowTieBreak::default(),
        }
    }
}

impl EditorConfig {
    pub fn from_json(text: &str) -> Result<EditorConfig> {
        serde_json::from_str(text).map_err(|e| EditorError::InvalidDocument(format!("editor config: {}", e)))
    }
}

/// A link drag in progress.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkDrag {
    pub box_name: String,
    pub pin: Option<String>,
}

#[derive(Debug)]
pub struct Editor {
    config: EditorConfig,
    store: DocumentStore,
    geometry: GeometryCache,
    resolver: CompatibilityResolver,
    session: Session,
    statuses: StatusBoard,
    notifications: NotificationCenter,
    layout: LayoutInputs,
    active_pin: Option<String>,
    drag: Option<LinkDrag>,
}

impl Default for Editor {
    fn default() -> Self {
        Editor::new(EditorConfig::default())
    }
}

impl Editor {
    pub fn new(config: EditorConfig) -> Self {
        let store = DocumentStore::new(config.history_capacity, &config.default_links_document);
        let mut ed = Editor {
            geometry: GeometryCache::new(config.arrow_tie_break),
            resolver: CompatibilityResolver::new(config.groups.clone()),
            store,
            session: Session::new(),
            statuses: StatusBoard::new(),
            notifications: NotificationCenter::new(),
            layout: LayoutInputs::default(),
            active_pin: None,
            drag: None,
            config,
        };
        ed.refresh();
        ed
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn geometry(&self) -> &GeometryCache {
        &self.geometry
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn statuses(&self) -> &StatusBoard {
        &self.statuses
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    pub fn notifications_mut(&mut self) -> &mut NotificationCenter {
        &mut self.notifications
    }

    pub fn layout(&self) -> &LayoutInputs {
        &self.layout
    }

    pub fn links(&self) -> &[Link] {
        self.store.links()
    }

    pub fn resources(&self) -> Result<Vec<Resource>> {
        json::export_resources(&self.store)
    }

    /// Re-derives geometry validity and connectable candidates. Returns `true`
    /// when pins must be re-measured.
    fn refresh(&mut self) -> bool {
        self.layout.links_version = self.store.links_version();
        let remeasure = self.geometry.sync(&self.layout);
        self.resolver.refresh(
            self.store.boxes(),
            self.layout.active_box.as_deref(),
            self.active_pin.as_deref(),
            self.store.version(),
        );
        remeasure
    }

    fn drop_dangling_selection(&mut self) {
        let gone = |name: &Option<String>, store: &DocumentStore| {
            name.as_deref().is_some_and(|n| store.get_box(n).is_none())
        };
        if gone(&self.layout.active_box, &self.store) {
            self.layout.active_box = None;
            self.active_pin = None;
        }
        if gone(&self.layout.expanded_box, &self.store) {
            self.layout.expanded_box = None;
        }
        if self.drag.as_ref().is_some_and(|d| self.store.get_box(&d.box_name).is_none()) {
            self.drag = None;
        }
        let store = &self.store;
        self.layout
            .expanded_pins
            .retain(|(b, p)| store.get_box(b).is_some_and(|x| x.pin(p).is_some()));
    }

    fn mutate(&mut self, f: impl FnOnce(&mut DocumentStore) -> Result<()>) -> Result<()> {
        f(&mut self.store)?;
        self.drop_dangling_selection();
        self.refresh();
        Ok(())
    }

    // Mutations

    pub fn create_box(&mut self, b: BoxEntity) -> Result<()> {
        self.mutate(|s| s.create_box(b, true))
    }

    pub fn delete_box(&mut self, name: &str) -> Result<()> {
        self.mutate(|s| s.delete_box(name, true))
    }

    pub fn configure_box(&mut self, name: &str, updated: BoxEntity) -> Result<()> {
        let renamed = (updated.name != name).then(|| updated.name.clone());
        self.mutate(|s| s.configure_box(name, updated, true))?;
        if let Some(new) = renamed {
            if self.layout.active_box.as_deref() == Some(name) {
                self.layout.active_box = Some(new);
                self.refresh();
            }
        }
        Ok(())
    }

    /// Replaces the box's custom config with `text` parsed as JSON.
    pub fn configure_box_config(&mut self, name: &str, text: &str) -> Result<()> {
        let config = json::parse_custom_config(text)?;
        let mut updated = self
            .store
            .get_box(name)
            .cloned()
            .ok_or_else(|| EditorError::not_found(EntityKind::Box, name))?;
        updated.spec.custom_config = config;
        self.configure_box(name, updated)
    }

    pub fn configure_pin(&mut self, box_name: &str, pin: Pin) -> Result<()> {
        self.mutate(|s| s.configure_pin(box_name, pin, true))
    }

    pub fn remove_pin(&mut self, box_name: &str, pin: &str) -> Result<()> {
        self.mutate(|s| s.remove_pin(box_name, pin, true))
    }

    pub fn create_dictionary(&mut self, d: Dictionary) -> Result<()> {
        self.mutate(|s| s.create_dictionary(d, true))
    }

    pub fn delete_dictionary(&mut self, name: &str) -> Result<()> {
        self.mutate(|s| s.delete_dictionary(name, true))
    }

    pub fn configure_dictionary(&mut self, name: &str, updated: Dictionary) -> Result<()> {
        self.mutate(|s| s.configure_dictionary(name, updated, true))
    }

    pub fn add_link(&mut self, link: Link) -> Result<()> {
        self.mutate(|s| s.add_link(link, true))
    }

    pub fn delete_link(&mut self, name: &str) -> Result<()> {
        self.mutate(|s| s.delete_link(name, true))
    }

    pub fn change_link(&mut self, name: &str, link: Link) -> Result<()> {
        self.mutate(|s| s.change_link(name, link, true))
    }

    pub fn add_dictionary_link(&mut self, link: DictionaryLink) -> Result<()> {
        self.mutate(|s| s.add_dictionary_link(link, true))
    }

    pub fn delete_dictionary_link(&mut self, name: &str) -> Result<()> {
        self.mutate(|s| s.delete_dictionary_link(name, true))
    }

    pub fn undo(&mut self) -> bool {
        let done = self.store.undo();
        if done {
            self.drop_dangling_selection();
            self.refresh();
        }
        done
    }

    pub fn redo(&mut self) -> bool {
        let done = self.store.redo();
        if done {
            self.drop_dangling_selection();
            self.refresh();
        }
        done
    }

    // Layout

    pub fn set_scroll(&mut self, left: f32, top: f32) -> bool {
        self.layout.scroll_left = left;
        self.layout.scroll_top = top;
        self.refresh()
    }

    pub fn set_viewport(&mut self, width: f32, height: f32) -> bool {
        self.layout.viewport_width = width;
        self.layout.viewport_height = height;
        self.refresh()
    }

    /// Flips the expansion state of a pin. Returns the new state.
    pub fn toggle_pin_expanded(&mut self, box_name: &str, pin: &str) -> bool {
        let key = (box_name.to_string(), pin.to_string());
        let expanded = if self.layout.expanded_pins.remove(&key) {
            false
        } else {
            self.layout.expanded_pins.insert(key);
            true
        };
        self.refresh();
        expanded
    }

    pub fn set_active_box(&mut self, box_name: Option<&str>, pin: Option<&str>) -> bool {
        self.layout.active_box = box_name.map(str::to_string);
        self.active_pin = box_name.and(pin).map(str::to_string);
        self.refresh()
    }

    pub fn set_expanded_box(&mut self, box_name: Option<&str>) -> bool {
        self.layout.expanded_box = box_name.map(str::to_string);
        self.refresh()
    }

    pub fn record_pin_rect(&mut self, box_name: &str, pin: &str, link: &str, rect: PinRect) {
        self.geometry.record_pin_rect(box_name, pin, link, rect);
    }

    pub fn arrows(&self) -> Vec<Arrow> {
        self.geometry.arrows_for(self.store.links())
    }

    // Drag-to-link

    /// Starts a link drag from `box_name` (and `pin`, when one was grabbed).
    /// Returns the names of the boxes the drag may end on.
    pub fn begin_link_drag(&mut self, box_name: &str, pin: Option<&str>) -> Result<Vec<String>> {
        let b = self
            .store
            .get_box(box_name)
            .ok_or_else(|| EditorError::not_found(EntityKind::Box, box_name))?;
        if let Some(p) = pin {
            if b.pin(p).is_none() {
                return Err(EditorError::PinNotFound {
                    box_name: box_name.to_string(),
                    pin: p.to_string(),
                });
            }
        }
        self.drag = Some(LinkDrag {
            box_name: box_name.to_string(),
            pin: pin.map(str::to_string),
        });
        self.set_active_box(Some(box_name), pin);
        Ok(self.resolver.candidates().to_vec())
    }

    pub fn link_drag(&self) -> Option<&LinkDrag> {
        self.drag.as_ref()
    }

    pub fn connectable_boxes(&self) -> &[String] {
        self.resolver.candidates()
    }

    pub fn cancel_link_drag(&mut self) {
        if self.drag.take().is_some() {
            self.set_active_box(None, None);
        }
    }

    /// Ends the current drag on `target_box`/`target_pin`, creating the link.
    /// Without an explicit name the link is called `{from}-to-{to}`.
    pub fn complete_link_drag(&mut self, target_box: &str, target_pin: &str, name: Option<&str>) -> Result<Link> {
        let drag = self
            .drag
            .clone()
            .ok_or_else(|| EditorError::InvalidChange("no link drag in progress".into()))?;
        let incompatible = || EditorError::IncompatiblePins {
            from: drag.box_name.clone(),
            to: format!("{}/{}", target_box, target_pin),
        };
        let target = self
            .store
            .get_box(target_box)
            .ok_or_else(|| EditorError::not_found(EntityKind::Box, target_box))?;
        let to_pin = target.pin(target_pin).ok_or_else(|| EditorError::PinNotFound {
            box_name: target_box.to_string(),
            pin: target_pin.to_string(),
        })?;
        let family = to_pin
            .connection()
            .ok_or_else(|| EditorError::InvalidConnectionType(to_pin.connection_type.clone()))?;
        if !self.resolver.is_connectable(target_box) {
            return Err(incompatible());
        }
        let start = self
            .store
            .get_box(&drag.box_name)
            .ok_or_else(|| EditorError::not_found(EntityKind::Box, &drag.box_name))?;
        let from_pin = match &drag.pin {
            Some(p) => start.pin(p).filter(|p| p.connection() == Some(family)),
            None => start.pins().iter().find(|p| p.connection() == Some(family)),
        }
        .ok_or_else(incompatible)?;

        let link = Link::new(
            name.map(str::to_string)
                .unwrap_or_else(|| format!("{}-to-{}", drag.box_name, target_box)),
            LinkEndpoint::new(&drag.box_name, &from_pin.name, family),
            LinkEndpoint::new(target_box, target_pin, family),
        );
        debug!(name = %link.name, "completing link drag");
        self.add_link(link.clone())?;
        self.drag = None;
        self.set_active_box(None, None);
        Ok(self.store.get_link(&link.name).cloned().unwrap_or(link))
    }

    // Remote state

    pub fn set_schemas(&mut self, schemas: Vec<String>) {
        self.session.set_schemas(schemas);
    }

    pub fn select_schema(&mut self, schema: &str) -> Result<FetchHandle> {
        let handle = self.session.select_schema(schema)?;
        self.statuses.clear();
        Ok(handle)
    }

    pub fn begin_refetch(&mut self) -> Option<FetchHandle> {
        self.session.begin_refetch()
    }

    /// Applies a fetched state if `handle` is still current. The first state
    /// of a schema replaces the store wholesale; later ones are reconciled.
    pub fn accept_state(&mut self, handle: &FetchHandle, state: &SchemaState) -> Option<ReconcileReport> {
        if !self.session.accept(handle) {
            return None;
        }
        if self.session.mark_loaded(handle.schema()) {
            self.store.reset();
            self.geometry.invalidate();
            self.drag = None;
            self.layout = LayoutInputs::default();
            self.active_pin = None;
        }
        let report = sync::reconcile(&mut self.store, state);
        self.drop_dangling_selection();
        self.refresh();
        Some(report)
    }

    pub fn fetch_failed(&mut self, code: &str, message: &str) {
        self.notifications.push(&EditorError::network(code, message));
    }

    pub fn handle_live_event(&mut self, event: &LiveEvent) -> SyncAction {
        self.statuses.apply(event)
    }

    /// Snapshot of pending operations to send, or `None` when nothing is queued.
    pub fn begin_save(&self) -> Option<SaveRequest> {
        self.session.save_request(self.store.pending())
    }

    pub fn save_succeeded(&mut self, request: &SaveRequest) {
        self.store.acknowledge_sent(&request.operations);
    }

    /// Keeps the queue for a retry and raises a network notification.
    pub fn save_failed(&mut self, code: &str, message: &str) {
        self.notifications.push(&EditorError::network(code, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::model::ConnectionType;

    fn editor() -> Editor {
        let config = EditorConfig {
            groups: vec![TypeGroup::new("G1", &["K1"]), TypeGroup::new("G2", &["K2"])],
            ..EditorConfig::default()
        };
        let mut ed = Editor::new(config);
        ed.create_box(BoxEntity::new("svc-a", "K1").with_pin(Pin::new("out", ConnectionType::Mq)))
            .unwrap();
        ed.create_box(BoxEntity::new("svc-b", "K2").with_pin(Pin::new("in", ConnectionType::Mq)))
            .unwrap();
        ed
    }

    #[test]
    fn config_from_partial_json() {
        let c = EditorConfig::from_json(r#"{ "history_capacity": 5, "arrow_tie_break": "to-is-start" }"#).unwrap();
        assert_eq!(c.history_capacity, 5);
        assert_eq!(c.arrow_tie_break, ArrowTieBreak::ToIsStart);
        assert_eq!(c.default_links_document, DEFAULT_LINKS_DOCUMENT);
        assert_eq!(c.groups.len(), default_groups().len());
        assert_eq!(EditorConfig::from_json("[").unwrap_err().code(), "invalid_document");
    }

    #[test]
    fn drag_creates_default_named_link() {
        let mut ed = editor();
        let candidates = ed.begin_link_drag("svc-a", Some("out")).unwrap();
        assert_eq!(candidates, vec!["svc-b".to_string()]);
        let link = ed.complete_link_drag("svc-b", "in", None).unwrap();
        assert_eq!(link.name, "svc-a-to-svc-b");
        assert!(ed.link_drag().is_none());
        assert_eq!(ed.links().len(), 1);
    }

    #[test]
    fn drag_to_non_candidate_rejected() {
        let mut ed = editor();
        ed.create_box(BoxEntity::new("peer", "K1").with_pin(Pin::new("in", ConnectionType::Mq)))
            .unwrap();
        ed.begin_link_drag("svc-a", Some("out")).unwrap();
        let err = ed.complete_link_drag("peer", "in", None).unwrap_err();
        assert_eq!(err.code(), "incompatible_pins");
        assert!(ed.links().is_empty());
        assert!(ed.link_drag().is_some());
    }

    #[test]
    fn link_changes_invalidate_geometry() {
        let mut ed = editor();
        ed.record_pin_rect("svc-a", "out", "l", PinRect { left: 0.0, top: 0.0, width: 10.0, height: 10.0 });
        assert_eq!(ed.geometry().connection_count(), 1);
        ed.begin_link_drag("svc-a", Some("out")).unwrap();
        assert_eq!(ed.geometry().connection_count(), 0);
        ed.complete_link_drag("svc-b", "in", Some("l")).unwrap();
        ed.record_pin_rect("svc-a", "out", "l", PinRect { left: 0.0, top: 0.0, width: 10.0, height: 10.0 });
        ed.record_pin_rect("svc-b", "in", "l", PinRect { left: 50.0, top: 20.0, width: 10.0, height: 10.0 });
        let arrows = ed.arrows();
        assert_eq!(arrows.len(), 1);
        assert_eq!(arrows[0].start, Point { left: 10.0, top: 5.0 });
        assert!(ed.set_scroll(0.0, 30.0));
        assert!(ed.arrows().is_empty());
    }

    #[test]
    fn malformed_custom_config_leaves_box_alone() {
        let mut ed = editor();
        let v = ed.store().version();
        let err = ed.configure_box_config("svc-a", "{ nope").unwrap_err();
        assert_eq!(err.code(), "malformed_config");
        assert_eq!(ed.store().version(), v);
        ed.configure_box_config("svc-a", r#"{"session-alias": "x"}"#).unwrap();
        assert!(ed.store().get_box("svc-a").unwrap().spec.custom_config.is_some());
    }

    #[test]
    fn failed_save_keeps_pending_and_collapses_notices() {
        let mut ed = editor();
        ed.select_schema("main").unwrap();
        let req = ed.begin_save().unwrap();
        assert_eq!(req.operations.len(), 2);
        ed.save_failed("503", "unavailable");
        ed.save_failed("503", "unavailable");
        assert_eq!(ed.notifications().entries().len(), 1);
        assert_eq!(ed.notifications().entries()[0].count, 2);
        assert_eq!(ed.store().pending().len(), 2);
        ed.save_succeeded(&req);
        assert!(ed.begin_save().is_none());
    }
}
