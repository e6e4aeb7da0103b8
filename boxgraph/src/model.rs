use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fields a resource carries that the editor does not interpret. They ride along
/// through every edit so a save never drops them.
pub type Extra = Map<String, Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConnectionType {
    #[serde(rename = "mq")]
    Mq,
    #[serde(rename = "grpc")]
    Grpc,
}

impl ConnectionType {
    pub fn parse(s: &str) -> Option<ConnectionType> {
        match s {
            "mq" => Some(ConnectionType::Mq),
            "grpc" => Some(ConnectionType::Grpc),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionType::Mq => "mq",
            ConnectionType::Grpc => "grpc",
        }
    }

    /// Router list key inside a link-definition document.
    pub fn router_key(self) -> &'static str {
        match self {
            ConnectionType::Mq => "router-mq",
            ConnectionType::Grpc => "router-grpc",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pin {
    pub name: String,
    #[serde(rename = "connection-type")]
    pub connection_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<Value>>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Pin {
    pub fn new(name: impl Into<String>, connection_type: ConnectionType) -> Pin {
        Pin {
            name: name.into(),
            connection_type: connection_type.as_str().to_string(),
            attributes: None,
            filters: None,
            extra: Extra::new(),
        }
    }

    pub fn connection(&self) -> Option<ConnectionType> {
        ConnectionType::parse(&self.connection_type)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoxSpec {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub box_type: Option<String>,
    #[serde(rename = "image-name", default, skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,
    #[serde(rename = "image-version", default, skip_serializing_if = "Option::is_none")]
    pub image_version: Option<String>,
    #[serde(rename = "custom-config", default, skip_serializing_if = "Option::is_none")]
    pub custom_config: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pins: Option<Vec<Pin>>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// A schema node: one deployable service component.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoxEntity {
    pub name: String,
    #[serde(default)]
    pub spec: BoxSpec,
    #[serde(flatten)]
    pub extra: Extra,
}

impl BoxEntity {
    pub fn new(name: impl Into<String>, box_type: impl Into<String>) -> BoxEntity {
        BoxEntity {
            name: name.into(),
            spec: BoxSpec {
                box_type: Some(box_type.into()),
                ..BoxSpec::default()
            },
            extra: Extra::new(),
        }
    }

    pub fn with_pin(mut self, pin: Pin) -> BoxEntity {
        self.pins_mut().push(pin);
        self
    }

    pub fn box_type(&self) -> &str {
        self.spec.box_type.as_deref().unwrap_or("")
    }

    pub fn pins(&self) -> &[Pin] {
        self.spec.pins.as_deref().unwrap_or(&[])
    }

    pub fn pins_mut(&mut self) -> &mut Vec<Pin> {
        self.spec.pins.get_or_insert_with(Vec::new)
    }

    pub fn pin(&self, name: &str) -> Option<&Pin> {
        self.pins().iter().find(|p| p.name == name)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DictionarySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dictionary {
    pub name: String,
    #[serde(default)]
    pub spec: DictionarySpec,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Dictionary {
    pub fn new(name: impl Into<String>, data: impl Into<String>) -> Dictionary {
        Dictionary {
            name: name.into(),
            spec: DictionarySpec {
                data: Some(data.into()),
                extra: Extra::new(),
            },
            extra: Extra::new(),
        }
    }

    pub fn data(&self) -> &str {
        self.spec.data.as_deref().unwrap_or("")
    }
}

// Persisted link-definition shapes.

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RouterEndpoint {
    #[serde(rename = "box")]
    pub box_name: String,
    pub pin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(rename = "service-class", default, skip_serializing_if = "Option::is_none")]
    pub service_class: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouterLink {
    pub name: String,
    pub from: RouterEndpoint,
    pub to: RouterEndpoint,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoxesRelation {
    #[serde(rename = "router-mq", default, skip_serializing_if = "Option::is_none")]
    pub router_mq: Option<Vec<RouterLink>>,
    #[serde(rename = "router-grpc", default, skip_serializing_if = "Option::is_none")]
    pub router_grpc: Option<Vec<RouterLink>>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl BoxesRelation {
    pub fn routers(&self, family: ConnectionType) -> &[RouterLink] {
        let list = match family {
            ConnectionType::Mq => &self.router_mq,
            ConnectionType::Grpc => &self.router_grpc,
        };
        list.as_deref().unwrap_or(&[])
    }

    pub fn routers_mut(&mut self, family: ConnectionType) -> &mut Vec<RouterLink> {
        let list = match family {
            ConnectionType::Mq => &mut self.router_mq,
            ConnectionType::Grpc => &mut self.router_grpc,
        };
        list.get_or_insert_with(Vec::new)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DictionaryRef {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub dictionary_type: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DictionaryRelation {
    pub name: String,
    #[serde(rename = "box")]
    pub box_name: String,
    pub dictionary: DictionaryRef,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkSpec {
    #[serde(rename = "boxes-relation", default, skip_serializing_if = "Option::is_none")]
    pub boxes_relation: Option<BoxesRelation>,
    #[serde(rename = "dictionaries-relation", default, skip_serializing_if = "Option::is_none")]
    pub dictionaries_relation: Option<Vec<DictionaryRelation>>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinkDefinition {
    pub name: String,
    #[serde(default)]
    pub spec: LinkSpec,
    #[serde(flatten)]
    pub extra: Extra,
}

impl LinkDefinition {
    pub fn new(name: impl Into<String>) -> LinkDefinition {
        LinkDefinition {
            name: name.into(),
            spec: LinkSpec::default(),
            extra: Extra::new(),
        }
    }
}

// Editor-level shapes.

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinkEndpoint {
    pub box_name: String,
    pub pin: String,
    pub connection_type: ConnectionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_class: Option<String>,
    #[serde(default, skip_serializing_if = "Extra::is_empty")]
    pub extra: Extra,
}

impl LinkEndpoint {
    pub fn new(box_name: impl Into<String>, pin: impl Into<String>, connection_type: ConnectionType) -> LinkEndpoint {
        LinkEndpoint {
            box_name: box_name.into(),
            pin: pin.into(),
            connection_type,
            strategy: None,
            service_class: None,
            extra: Extra::new(),
        }
    }
}

/// A directed edge between two pins, flattened out of the link-definition documents.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub name: String,
    pub from: LinkEndpoint,
    pub to: LinkEndpoint,
    /// Link-definition document the link is persisted in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
    #[serde(default, skip_serializing_if = "Extra::is_empty")]
    pub extra: Extra,
}

impl Link {
    pub fn new(name: impl Into<String>, from: LinkEndpoint, to: LinkEndpoint) -> Link {
        Link {
            name: name.into(),
            from,
            to,
            document: None,
            extra: Extra::new(),
        }
    }

    pub fn connection_type(&self) -> ConnectionType {
        self.from.connection_type
    }

    pub fn touches_box(&self, box_name: &str) -> bool {
        self.from.box_name == box_name || self.to.box_name == box_name
    }

    pub fn touches_pin(&self, box_name: &str, pin: &str) -> bool {
        (self.from.box_name == box_name && self.from.pin == pin)
            || (self.to.box_name == box_name && self.to.pin == pin)
    }

    /// Whether routing strategy or service class are set on either endpoint.
    pub fn is_extended(&self) -> bool {
        self.from.strategy.is_some()
            || self.from.service_class.is_some()
            || self.to.strategy.is_some()
            || self.to.service_class.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DictionaryLink {
    pub name: String,
    pub box_name: String,
    pub dictionary: DictionaryRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
    #[serde(default, skip_serializing_if = "Extra::is_empty")]
    pub extra: Extra,
}

impl DictionaryLink {
    pub fn new(name: impl Into<String>, box_name: impl Into<String>, dictionary: impl Into<String>) -> DictionaryLink {
        DictionaryLink {
            name: name.into(),
            box_name: box_name.into(),
            dictionary: DictionaryRef {
                name: dictionary.into(),
                dictionary_type: None,
                extra: Extra::new(),
            },
            document: None,
            extra: Extra::new(),
        }
    }
}

// History records.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    Box,
    Link,
    Dictionary,
    DictionaryLink,
    LinkDefinition,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Box => "box",
            EntityKind::Link => "link",
            EntityKind::Dictionary => "dictionary",
            EntityKind::DictionaryLink => "dictionary-link",
            EntityKind::LinkDefinition => "link-definition",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum Entity {
    Box(BoxEntity),
    Link(Link),
    Dictionary(Dictionary),
    DictionaryLink(DictionaryLink),
    LinkDefinition(LinkDefinition),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Box(_) => EntityKind::Box,
            Entity::Link(_) => EntityKind::Link,
            Entity::Dictionary(_) => EntityKind::Dictionary,
            Entity::DictionaryLink(_) => EntityKind::DictionaryLink,
            Entity::LinkDefinition(_) => EntityKind::LinkDefinition,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Entity::Box(b) => &b.name,
            Entity::Link(l) => &l.name,
            Entity::Dictionary(d) => &d.name,
            Entity::DictionaryLink(d) => &d.name,
            Entity::LinkDefinition(d) => &d.name,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Add,
    Remove,
    Change,
}

/// One entity's before/after state. `from == None` is a creation, `to == None`
/// a deletion; never both.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub object: String,
    pub from: Option<Entity>,
    pub to: Option<Entity>,
    /// Position `from` held in its list. Undo puts it back there.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

impl Change {
    pub fn added(entity: Entity) -> Change {
        Change {
            object: entity.name().to_string(),
            from: None,
            to: Some(entity),
            index: None,
        }
    }

    pub fn removed(entity: Entity) -> Change {
        Change {
            object: entity.name().to_string(),
            from: Some(entity),
            to: None,
            index: None,
        }
    }

    /// Returns `None` when the two sides are different entity kinds.
    pub fn modified(from: Entity, to: Entity) -> Option<Change> {
        if from.kind() != to.kind() {
            return None;
        }
        Some(Change {
            object: from.name().to_string(),
            from: Some(from),
            to: Some(to),
            index: None,
        })
    }

    pub fn at(mut self, index: usize) -> Change {
        self.index = Some(index);
        self
    }

    pub fn kind(&self) -> Option<EntityKind> {
        self.from.as_ref().or(self.to.as_ref()).map(Entity::kind)
    }

    pub fn is_valid(&self) -> bool {
        match (&self.from, &self.to) {
            (None, None) => false,
            (Some(a), Some(b)) => a.kind() == b.kind(),
            _ => true,
        }
    }
}

/// One undoable unit of history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub object: String,
    pub entity: EntityKind,
    pub operation: Operation,
    pub changes: Vec<Change>,
}

impl Snapshot {
    pub fn new(object: impl Into<String>, entity: EntityKind, operation: Operation, changes: Vec<Change>) -> Snapshot {
        Snapshot {
            object: object.into(),
            entity,
            operation,
            changes,
        }
    }
}
