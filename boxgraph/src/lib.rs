pub mod compat;
pub mod editor;
pub mod error;
pub mod geometry;
pub mod hash;
pub mod history;
pub mod json;
pub mod links;
pub mod model;
pub mod notify;
pub mod pending;
pub mod session;
pub mod store;
pub mod sync;

pub use compat::{CompatibilityResolver, TypeGroup};
pub use editor::{Editor, EditorConfig, LinkDrag};
pub use error::{EditorError, Result};
pub use geometry::{Arrow, ArrowTieBreak, ConnectionCoords, GeometryCache, LayoutInputs, PinRect, Point};
pub use history::{History, ReplayTarget};
pub use json::Resource;
pub use model::{
    BoxEntity, Change, ConnectionType, Dictionary, DictionaryLink, Entity, EntityKind, Link,
    LinkDefinition, LinkEndpoint, Operation, Pin, Snapshot,
};
pub use pending::{PendingOperation, RequestOperation, ResourceKind};
pub use session::{FetchHandle, SaveRequest, Session};
pub use store::DocumentStore;
pub use sync::{LiveEvent, ReconcileReport, ResourceStatus, SchemaState, SyncAction};
