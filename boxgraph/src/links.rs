//! Translation between the persisted link-definition documents and the flat
//! link list the rest of the editor consumes.
//!
//! Ordering of [`to_editor_links`]: documents in the order given, and inside each
//! document the `router-mq` list before the `router-grpc` list. Link numbering in
//! the host relies on this order being stable.

use crate::error::{EditorError, Result};
use crate::model::{
    Change, ConnectionType, DictionaryLink, DictionaryRelation, Entity, EntityKind, Link,
    LinkDefinition, LinkEndpoint, RouterEndpoint, RouterLink,
};

const FAMILIES: [ConnectionType; 2] = [ConnectionType::Mq, ConnectionType::Grpc];

/// Changes produced by a cascading edit, and the documents it touched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinkRemoval {
    pub changes: Vec<Change>,
    pub documents: Vec<LinkDefinition>,
}

impl LinkRemoval {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Where an inserted link landed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentTouch {
    pub document: String,
    pub created: bool,
}

/// Document and list position a link or relation occupied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Slot {
    pub document: String,
    pub index: usize,
}

/// Insert position for `at` in a list of `len` items. `None` appends.
pub fn insert_position(at: Option<usize>, len: usize) -> usize {
    at.map_or(len, |i| i.min(len))
}

fn endpoint_to_editor(e: &RouterEndpoint, family: ConnectionType) -> LinkEndpoint {
    LinkEndpoint {
        box_name: e.box_name.clone(),
        pin: e.pin.clone(),
        connection_type: family,
        strategy: e.strategy.clone(),
        service_class: e.service_class.clone(),
        extra: e.extra.clone(),
    }
}

fn endpoint_to_document(e: &LinkEndpoint, extended: bool) -> RouterEndpoint {
    RouterEndpoint {
        box_name: e.box_name.clone(),
        pin: e.pin.clone(),
        strategy: if extended { e.strategy.clone() } else { None },
        service_class: if extended { e.service_class.clone() } else { None },
        extra: e.extra.clone(),
    }
}

fn router_to_link(r: &RouterLink, family: ConnectionType, document: &str) -> Link {
    Link {
        name: r.name.clone(),
        from: endpoint_to_editor(&r.from, family),
        to: endpoint_to_editor(&r.to, family),
        document: Some(document.to_string()),
        extra: r.extra.clone(),
    }
}

pub fn to_editor_links(documents: &[LinkDefinition]) -> Vec<Link> {
    let mut out = Vec::new();
    for doc in documents {
        let Some(rel) = doc.spec.boxes_relation.as_ref() else {
            continue;
        };
        for family in FAMILIES {
            for r in rel.routers(family) {
                out.push(router_to_link(r, family, &doc.name));
            }
        }
    }
    out
}

/// Persisted shape of `link`. Routing strategy and service class are written
/// only when `extended` is set.
pub fn to_document_link(link: &Link, extended: bool) -> RouterLink {
    RouterLink {
        name: link.name.clone(),
        from: endpoint_to_document(&link.from, extended),
        to: endpoint_to_document(&link.to, extended),
        extra: link.extra.clone(),
    }
}

pub fn to_editor_dictionary_links(documents: &[LinkDefinition]) -> Vec<DictionaryLink> {
    let mut out = Vec::new();
    for doc in documents {
        for rel in doc.spec.dictionaries_relation.iter().flatten() {
            out.push(relation_to_link(rel, &doc.name));
        }
    }
    out
}

fn relation_to_link(rel: &DictionaryRelation, document: &str) -> DictionaryLink {
    DictionaryLink {
        name: rel.name.clone(),
        box_name: rel.box_name.clone(),
        dictionary: rel.dictionary.clone(),
        document: Some(document.to_string()),
        extra: rel.extra.clone(),
    }
}

pub fn to_document_dictionary_relation(link: &DictionaryLink) -> DictionaryRelation {
    DictionaryRelation {
        name: link.name.clone(),
        box_name: link.box_name.clone(),
        dictionary: link.dictionary.clone(),
        extra: link.extra.clone(),
    }
}

pub fn find_link(documents: &[LinkDefinition], name: &str) -> Option<Link> {
    to_editor_links(documents).into_iter().find(|l| l.name == name)
}

fn link_name_taken(documents: &[LinkDefinition], name: &str) -> bool {
    documents.iter().any(|doc| {
        doc.spec
            .boxes_relation
            .as_ref()
            .is_some_and(|rel| FAMILIES.iter().any(|f| rel.routers(*f).iter().any(|r| r.name == name)))
    })
}

fn dictionary_link_taken(documents: &[LinkDefinition], name: &str) -> bool {
    documents
        .iter()
        .any(|doc| doc.spec.dictionaries_relation.iter().flatten().any(|r| r.name == name))
}

/// Picks the document a new link goes into: the link's own document if it still
/// exists, else `default_document`, else the first document, else a new
/// `default_document`.
fn target_document(documents: &mut Vec<LinkDefinition>, preferred: Option<&str>, default_document: &str) -> (usize, bool) {
    if let Some(name) = preferred {
        if let Some(i) = documents.iter().position(|d| d.name == name) {
            return (i, false);
        }
    }
    if let Some(i) = documents.iter().position(|d| d.name == default_document) {
        return (i, false);
    }
    if !documents.is_empty() {
        return (0, false);
    }
    documents.push(LinkDefinition::new(default_document));
    (documents.len() - 1, true)
}

/// Inserts `link` at position `at` of its family list, rejecting a name already
/// used anywhere in the graph. Returns the link as stored (with its document
/// filled in).
pub fn insert_link(
    documents: &mut Vec<LinkDefinition>,
    link: &Link,
    default_document: &str,
    at: Option<usize>,
) -> Result<(Link, DocumentTouch)> {
    if link_name_taken(documents, &link.name) {
        return Err(EditorError::duplicate(EntityKind::Link, &link.name));
    }
    let (idx, created) = target_document(documents, link.document.as_deref(), default_document);
    let doc = &mut documents[idx];
    let family = link.connection_type();
    let list = doc
        .spec
        .boxes_relation
        .get_or_insert_with(Default::default)
        .routers_mut(family);
    let i = insert_position(at, list.len());
    list.insert(i, to_document_link(link, link.is_extended()));
    let mut stored = link.clone();
    stored.document = Some(doc.name.clone());
    Ok((
        stored,
        DocumentTouch {
            document: doc.name.clone(),
            created,
        },
    ))
}

/// Removes the link named `name`, returning it and the slot it held.
pub fn remove_link(documents: &mut [LinkDefinition], name: &str) -> Option<(Link, Slot)> {
    for doc in documents.iter_mut() {
        let doc_name = doc.name.clone();
        let Some(rel) = doc.spec.boxes_relation.as_mut() else {
            continue;
        };
        for family in FAMILIES {
            if let Some(index) = rel.routers(family).iter().position(|r| r.name == name) {
                let r = rel.routers_mut(family).remove(index);
                let link = router_to_link(&r, family, &doc_name);
                return Some((link, Slot { document: doc_name, index }));
            }
        }
    }
    None
}

/// Replaces the link named `name` with `link`, in place when the connection
/// family is unchanged. A link that moves family goes to position `at` of its
/// new list. Returns the previous link and the slot it held.
pub fn replace_link(documents: &mut [LinkDefinition], name: &str, link: &Link, at: Option<usize>) -> Result<(Link, Slot)> {
    if link.name != name && link_name_taken(documents, &link.name) {
        return Err(EditorError::duplicate(EntityKind::Link, &link.name));
    }
    for doc in documents.iter_mut() {
        let doc_name = doc.name.clone();
        let Some(rel) = doc.spec.boxes_relation.as_mut() else {
            continue;
        };
        for family in FAMILIES {
            let Some(i) = rel.routers(family).iter().position(|r| r.name == name) else {
                continue;
            };
            let persisted = to_document_link(link, link.is_extended());
            let previous = if family == link.connection_type() {
                std::mem::replace(&mut rel.routers_mut(family)[i], persisted)
            } else {
                let old = rel.routers_mut(family).remove(i);
                let target = rel.routers_mut(link.connection_type());
                let j = insert_position(at, target.len());
                target.insert(j, persisted);
                old
            };
            let previous = router_to_link(&previous, family, &doc_name);
            return Ok((previous, Slot { document: doc_name, index: i }));
        }
    }
    Err(EditorError::not_found(EntityKind::Link, name))
}

fn remove_links_where(documents: &mut [LinkDefinition], pred: impl Fn(&Link) -> bool) -> LinkRemoval {
    let mut out = LinkRemoval::default();
    for doc in documents.iter_mut() {
        let doc_name = doc.name.clone();
        let Some(rel) = doc.spec.boxes_relation.as_mut() else {
            continue;
        };
        let mut touched = false;
        for family in FAMILIES {
            if rel.routers(family).is_empty() {
                continue;
            }
            let list = rel.routers_mut(family);
            let mut kept = Vec::with_capacity(list.len());
            for (i, r) in list.drain(..).enumerate() {
                let link = router_to_link(&r, family, &doc_name);
                if pred(&link) {
                    out.changes.push(Change::removed(Entity::Link(link)).at(i));
                    touched = true;
                } else {
                    kept.push(r);
                }
            }
            *list = kept;
        }
        if touched {
            out.documents.push(doc.clone());
        }
    }
    out
}

/// Removes every link with `box_name` as an endpoint box. Links whose name
/// merely mentions the box are left alone.
pub fn remove_box_links(documents: &mut [LinkDefinition], box_name: &str) -> LinkRemoval {
    remove_links_where(documents, |l| l.touches_box(box_name))
}

/// Removes every link attached to one of `pins` on `box_name`, in a single pass
/// so the recorded positions all refer to the same list.
pub fn remove_pin_links(documents: &mut [LinkDefinition], box_name: &str, pins: &[&str]) -> LinkRemoval {
    remove_links_where(documents, |l| pins.iter().any(|p| l.touches_pin(box_name, p)))
}

/// Points every endpoint naming `old` at `new`.
pub fn rename_box_references(documents: &mut [LinkDefinition], old: &str, new: &str) -> LinkRemoval {
    let mut out = LinkRemoval::default();
    for doc in documents.iter_mut() {
        let doc_name = doc.name.clone();
        let mut touched = false;
        if let Some(rel) = doc.spec.boxes_relation.as_mut() {
            for family in FAMILIES {
                if rel.routers(family).is_empty() {
                    continue;
                }
                for r in rel.routers_mut(family).iter_mut() {
                    if r.from.box_name != old && r.to.box_name != old {
                        continue;
                    }
                    let before = router_to_link(r, family, &doc_name);
                    if r.from.box_name == old {
                        r.from.box_name = new.to_string();
                    }
                    if r.to.box_name == old {
                        r.to.box_name = new.to_string();
                    }
                    let after = router_to_link(r, family, &doc_name);
                    out.changes.extend(Change::modified(Entity::Link(before), Entity::Link(after)));
                    touched = true;
                }
            }
        }
        for rel in doc.spec.dictionaries_relation.iter_mut().flatten() {
            if rel.box_name != old {
                continue;
            }
            let before = relation_to_link(rel, &doc_name);
            rel.box_name = new.to_string();
            let after = relation_to_link(rel, &doc_name);
            out.changes
                .extend(Change::modified(Entity::DictionaryLink(before), Entity::DictionaryLink(after)));
            touched = true;
        }
        if touched {
            out.documents.push(doc.clone());
        }
    }
    out
}

pub fn rename_dictionary_references(documents: &mut [LinkDefinition], old: &str, new: &str) -> LinkRemoval {
    let mut out = LinkRemoval::default();
    for doc in documents.iter_mut() {
        let doc_name = doc.name.clone();
        let mut touched = false;
        for rel in doc.spec.dictionaries_relation.iter_mut().flatten() {
            if rel.dictionary.name != old {
                continue;
            }
            let before = relation_to_link(rel, &doc_name);
            rel.dictionary.name = new.to_string();
            let after = relation_to_link(rel, &doc_name);
            out.changes
                .extend(Change::modified(Entity::DictionaryLink(before), Entity::DictionaryLink(after)));
            touched = true;
        }
        if touched {
            out.documents.push(doc.clone());
        }
    }
    out
}

fn remove_relations_where(documents: &mut [LinkDefinition], pred: impl Fn(&DictionaryRelation) -> bool) -> LinkRemoval {
    let mut out = LinkRemoval::default();
    for doc in documents.iter_mut() {
        let doc_name = doc.name.clone();
        let Some(list) = doc.spec.dictionaries_relation.as_mut() else {
            continue;
        };
        let before = list.len();
        let mut kept = Vec::with_capacity(before);
        for (i, rel) in list.drain(..).enumerate() {
            if pred(&rel) {
                let link = relation_to_link(&rel, &doc_name);
                out.changes.push(Change::removed(Entity::DictionaryLink(link)).at(i));
            } else {
                kept.push(rel);
            }
        }
        *list = kept;
        if list.len() != before {
            out.documents.push(doc.clone());
        }
    }
    out
}

pub fn remove_box_dictionary_links(documents: &mut [LinkDefinition], box_name: &str) -> LinkRemoval {
    remove_relations_where(documents, |rel| rel.box_name == box_name)
}

pub fn remove_dictionary_relations(documents: &mut [LinkDefinition], dictionary: &str) -> LinkRemoval {
    remove_relations_where(documents, |rel| rel.dictionary.name == dictionary)
}

pub fn insert_dictionary_link(
    documents: &mut Vec<LinkDefinition>,
    link: &DictionaryLink,
    default_document: &str,
    at: Option<usize>,
) -> Result<(DictionaryLink, DocumentTouch)> {
    if dictionary_link_taken(documents, &link.name) {
        return Err(EditorError::duplicate(EntityKind::DictionaryLink, &link.name));
    }
    let (idx, created) = target_document(documents, link.document.as_deref(), default_document);
    let doc = &mut documents[idx];
    let list = doc.spec.dictionaries_relation.get_or_insert_with(Vec::new);
    let i = insert_position(at, list.len());
    list.insert(i, to_document_dictionary_relation(link));
    let mut stored = link.clone();
    stored.document = Some(doc.name.clone());
    Ok((
        stored,
        DocumentTouch {
            document: doc.name.clone(),
            created,
        },
    ))
}

pub fn remove_dictionary_link(documents: &mut [LinkDefinition], name: &str) -> Option<(DictionaryLink, Slot)> {
    for doc in documents.iter_mut() {
        let doc_name = doc.name.clone();
        let Some(list) = doc.spec.dictionaries_relation.as_mut() else {
            continue;
        };
        if let Some(index) = list.iter().position(|r| r.name == name) {
            let rel = list.remove(index);
            let link = relation_to_link(&rel, &doc_name);
            return Some((link, Slot { document: doc_name, index }));
        }
    }
    None
}

pub fn replace_dictionary_link(documents: &mut [LinkDefinition], name: &str, link: &DictionaryLink) -> Result<(DictionaryLink, Slot)> {
    if link.name != name && dictionary_link_taken(documents, &link.name) {
        return Err(EditorError::duplicate(EntityKind::DictionaryLink, &link.name));
    }
    for doc in documents.iter_mut() {
        let doc_name = doc.name.clone();
        let Some(list) = doc.spec.dictionaries_relation.as_mut() else {
            continue;
        };
        if let Some(index) = list.iter().position(|r| r.name == name) {
            let previous = std::mem::replace(&mut list[index], to_document_dictionary_relation(link));
            let previous = relation_to_link(&previous, &doc_name);
            return Ok((previous, Slot { document: doc_name, index }));
        }
    }
    Err(EditorError::not_found(EntityKind::DictionaryLink, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: serde_json::Value) -> LinkDefinition {
        serde_json::from_value(v).unwrap()
    }

    fn mq_link(name: &str, from: &str, to: &str) -> serde_json::Value {
        json!({ "name": name, "from": { "box": from, "pin": "out" }, "to": { "box": to, "pin": "in" } })
    }

    #[test]
    fn flattens_mq_before_grpc_per_document() {
        let docs = vec![
            doc(json!({ "name": "d1", "spec": { "boxes-relation": {
                "router-grpc": [ { "name": "g1", "from": { "box": "a", "pin": "c" }, "to": { "box": "b", "pin": "s", "strategy": "robin" } } ],
                "router-mq": [ mq_link("m1", "a", "b") ]
            } } })),
            doc(json!({ "name": "d2", "spec": { "boxes-relation": { "router-mq": [ mq_link("m2", "b", "c") ] } } })),
        ];
        let links = to_editor_links(&docs);
        let names: Vec<_> = links.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["m1", "g1", "m2"]);
        assert_eq!(links[1].connection_type(), ConnectionType::Grpc);
        assert_eq!(links[1].to.strategy.as_deref(), Some("robin"));
        assert_eq!(links[2].document.as_deref(), Some("d2"));
    }

    #[test]
    fn tolerates_missing_families() {
        let docs = vec![
            doc(json!({ "name": "empty" })),
            doc(json!({ "name": "grpc-only", "spec": { "boxes-relation": { "router-grpc": [
                { "name": "g", "from": { "box": "a", "pin": "c" }, "to": { "box": "b", "pin": "s" } }
            ] } } })),
        ];
        let links = to_editor_links(&docs);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].connection_type(), ConnectionType::Grpc);
    }

    #[test]
    fn extended_fields_only_when_marked() {
        let mut from = LinkEndpoint::new("a", "c", ConnectionType::Grpc);
        from.strategy = Some("filter".into());
        let mut to = LinkEndpoint::new("b", "s", ConnectionType::Grpc);
        to.service_class = Some("com.example.Service".into());
        let link = Link::new("g", from, to);
        let plain = serde_json::to_value(to_document_link(&link, false)).unwrap();
        assert_eq!(plain, json!({ "name": "g", "from": { "box": "a", "pin": "c" }, "to": { "box": "b", "pin": "s" } }));
        let ext = to_document_link(&link, true);
        assert_eq!(ext.from.strategy.as_deref(), Some("filter"));
        assert_eq!(ext.to.service_class.as_deref(), Some("com.example.Service"));
    }

    #[test]
    fn remove_box_links_touches_endpoints_only() {
        let mut docs = vec![doc(json!({ "name": "d", "spec": { "boxes-relation": { "router-mq": [
            mq_link("A-to-B", "A", "B"),
            mq_link("B-to-A", "B", "A"),
            mq_link("A-named-but-C-to-D", "C", "D"),
        ] } } }))];
        let removal = remove_box_links(&mut docs, "A");
        assert_eq!(removal.changes.len(), 2);
        assert!(removal.changes.iter().all(|c| c.to.is_none()));
        let slots: Vec<_> = removal.changes.iter().map(|c| c.index).collect();
        assert_eq!(slots, vec![Some(0), Some(1)]);
        assert_eq!(removal.documents.len(), 1);
        let left = to_editor_links(&docs);
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].name, "A-named-but-C-to-D");
    }

    #[test]
    fn duplicate_link_names_rejected_across_documents() {
        let mut docs = vec![
            doc(json!({ "name": "d1", "spec": { "boxes-relation": { "router-mq": [ mq_link("x", "a", "b") ] } } })),
            doc(json!({ "name": "d2" })),
        ];
        let mut l = Link::new(
            "x",
            LinkEndpoint::new("c", "out", ConnectionType::Grpc),
            LinkEndpoint::new("d", "in", ConnectionType::Grpc),
        );
        l.document = Some("d2".into());
        let err = insert_link(&mut docs, &l, "generated", None).unwrap_err();
        assert_eq!(err.code(), "duplicate_name");
        assert_eq!(to_editor_links(&docs).len(), 1);
    }

    #[test]
    fn insert_creates_default_document_when_none() {
        let mut docs = Vec::new();
        let l = Link::new(
            "x",
            LinkEndpoint::new("a", "out", ConnectionType::Mq),
            LinkEndpoint::new("b", "in", ConnectionType::Mq),
        );
        let (stored, touch) = insert_link(&mut docs, &l, "generated", None).unwrap();
        assert!(touch.created);
        assert_eq!(stored.document.as_deref(), Some("generated"));
        assert_eq!(find_link(&docs, "x"), Some(stored));
    }

    #[test]
    fn rename_rewrites_links_and_relations() {
        let mut docs = vec![doc(json!({ "name": "d", "spec": {
            "boxes-relation": { "router-mq": [ mq_link("l", "old", "b") ] },
            "dictionaries-relation": [ { "name": "r", "box": "old", "dictionary": { "name": "dict", "type": "MAIN" } } ]
        } }))];
        let out = rename_box_references(&mut docs, "old", "new");
        assert_eq!(out.changes.len(), 2);
        assert_eq!(to_editor_links(&docs)[0].from.box_name, "new");
        assert_eq!(to_editor_dictionary_links(&docs)[0].box_name, "new");
    }

    #[test]
    fn replace_moves_between_families() {
        let mut docs = vec![doc(json!({ "name": "d", "spec": { "boxes-relation": { "router-mq": [ mq_link("l", "a", "b") ] } } }))];
        let l = Link::new(
            "l",
            LinkEndpoint::new("a", "c", ConnectionType::Grpc),
            LinkEndpoint::new("b", "s", ConnectionType::Grpc),
        );
        let (prev, _) = replace_link(&mut docs, "l", &l, None).unwrap();
        assert_eq!(prev.connection_type(), ConnectionType::Mq);
        let links = to_editor_links(&docs);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].connection_type(), ConnectionType::Grpc);
    }

    #[test]
    fn removed_links_go_back_to_their_slot() {
        let mut docs = vec![doc(json!({ "name": "d", "spec": { "boxes-relation": { "router-mq": [
            mq_link("first", "a", "b"),
            mq_link("second", "b", "c"),
            mq_link("third", "c", "a"),
        ] } } }))];
        let (removed, slot) = remove_link(&mut docs, "second").unwrap();
        assert_eq!(slot, Slot { document: "d".into(), index: 1 });
        insert_link(&mut docs, &removed, "generated", Some(slot.index)).unwrap();
        let names: Vec<_> = to_editor_links(&docs).into_iter().map(|l| l.name).collect();
        assert_eq!(names, vec!["first", "second", "third"]);

        let removal = remove_box_links(&mut docs, "a");
        assert_eq!(removal.changes.len(), 2);
        for c in &removal.changes {
            let Some(Entity::Link(l)) = &c.from else { unreachable!() };
            insert_link(&mut docs, l, "generated", c.index).unwrap();
        }
        let names: Vec<_> = to_editor_links(&docs).into_iter().map(|l| l.name).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn family_move_can_return_to_its_slot() {
        let mut docs = vec![doc(json!({ "name": "d", "spec": { "boxes-relation": { "router-mq": [
            mq_link("m0", "a", "b"),
            mq_link("m1", "a", "b"),
        ] } } }))];
        let grpc = Link::new(
            "m0",
            LinkEndpoint::new("a", "c", ConnectionType::Grpc),
            LinkEndpoint::new("b", "s", ConnectionType::Grpc),
        );
        let (previous, slot) = replace_link(&mut docs, "m0", &grpc, None).unwrap();
        assert_eq!(slot.index, 0);
        replace_link(&mut docs, "m0", &previous, Some(slot.index)).unwrap();
        let names: Vec<_> = to_editor_links(&docs).into_iter().map(|l| l.name).collect();
        assert_eq!(names, vec!["m0", "m1"]);
    }
}
