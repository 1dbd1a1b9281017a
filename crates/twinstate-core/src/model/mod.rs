pub mod entity_id;
pub mod metadata;
pub mod path;
pub mod selector;
pub mod snapshot;

pub use entity_id::{EntityId, EntityKind};
pub use metadata::Metadata;
pub use path::ResourcePath;
pub use selector::FieldSelector;
pub use snapshot::{EntitySnapshot, Lifecycle};

/// Field holding the revision in a projected entity document
pub const REVISION_FIELD: &str = "_revision";

/// Field holding the creation timestamp in a projected entity document
pub const CREATED_FIELD: &str = "_created";

/// Field holding the last-modified timestamp in a projected entity document
pub const MODIFIED_FIELD: &str = "_modified";

/// Field of a Thing referencing the policy that governs it
pub const POLICY_ID_FIELD: &str = "policyId";
