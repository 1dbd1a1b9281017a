use std::collections::BTreeSet;

use twinstate_core::{EntityId, EntityKind, FieldSelector};

/// Authorization subjects of the requester
///
/// Part of the cache key so projections are never shared between requesters
/// with different visibility.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AuthContext {
    subjects: BTreeSet<String>,
}

impl AuthContext {
    pub fn new<I, S>(subjects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            subjects: subjects.into_iter().map(Into::into).collect(),
        }
    }

    pub fn subjects(&self) -> impl Iterator<Item = &str> {
        self.subjects.iter().map(String::as_str)
    }
}

/// Everything besides the entity that shapes a cached projection
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LookupContext {
    selector: FieldSelector,
    auth: AuthContext,
}

impl LookupContext {
    /// Build a context; the selector is augmented with the bookkeeping fields
    pub fn new(selector: &FieldSelector, auth: AuthContext) -> Self {
        Self {
            selector: selector.augmented(),
            auth,
        }
    }

    /// Augmented selector used for fetching and storing
    pub fn selector(&self) -> &FieldSelector {
        &self.selector
    }

    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }
}

/// Key of one cached projection
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    resource_type: &'static str,
    entity_id: EntityId,
    context: LookupContext,
}

impl CacheKey {
    pub fn new(kind: EntityKind, entity_id: EntityId, context: LookupContext) -> Self {
        Self {
            resource_type: kind.resource_type(),
            entity_id,
            context,
        }
    }

    pub fn resource_type(&self) -> &'static str {
        self.resource_type
    }

    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    pub fn context(&self) -> &LookupContext {
        &self.context
    }

    pub fn selector(&self) -> &FieldSelector {
        self.context.selector()
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}[{}]",
            self.resource_type, self.entity_id, self.context.selector
        )
    }
}
