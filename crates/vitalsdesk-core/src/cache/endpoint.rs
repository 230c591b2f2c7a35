//! Endpoint descriptors and the immutable table they live in.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::api::{ApiError, RequestSpec};

use super::error::CacheError;
use super::tag::Tag;

/// Builds the request for an argument value. Must be pure.
pub type RequestFn = fn(&Value) -> Result<RequestSpec, ApiError>;

/// Computes tags from `(result, args)`. Must be pure.
pub type TagFn = fn(&Value, &Value) -> Vec<Tag>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    Query,
    Mutation,
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointKind::Query => f.write_str("query"),
            EndpointKind::Mutation => f.write_str("mutation"),
        }
    }
}

/// Declarative description of one query or mutation.
#[derive(Clone)]
pub struct EndpointDescriptor {
    pub name: &'static str,
    pub kind: EndpointKind,
    pub request: RequestFn,
    pub provides_tags: Option<TagFn>,
    pub invalidates_tags: Option<TagFn>,
}

impl EndpointDescriptor {
    pub const fn query(name: &'static str, request: RequestFn) -> Self {
        Self {
            name,
            kind: EndpointKind::Query,
            request,
            provides_tags: None,
            invalidates_tags: None,
        }
    }

    pub const fn mutation(name: &'static str, request: RequestFn) -> Self {
        Self {
            name,
            kind: EndpointKind::Mutation,
            request,
            provides_tags: None,
            invalidates_tags: None,
        }
    }

    pub const fn providing(mut self, tags: TagFn) -> Self {
        self.provides_tags = Some(tags);
        self
    }

    pub const fn invalidating(mut self, tags: TagFn) -> Self {
        self.invalidates_tags = Some(tags);
        self
    }

    pub fn provided_tags(&self, result: &Value, args: &Value) -> Vec<Tag> {
        self.provides_tags
            .map(|tags| tags(result, args))
            .unwrap_or_default()
    }

    pub fn invalidated_tags(&self, result: &Value, args: &Value) -> Vec<Tag> {
        self.invalidates_tags
            .map(|tags| tags(result, args))
            .unwrap_or_default()
    }
}

impl fmt::Debug for EndpointDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("provides_tags", &self.provides_tags.is_some())
            .field("invalidates_tags", &self.invalidates_tags.is_some())
            .finish()
    }
}

/// Name-indexed descriptor table. Frozen once handed to a store.
#[derive(Debug, Default, Clone)]
pub struct EndpointRegistry {
    endpoints: HashMap<&'static str, Arc<EndpointDescriptor>>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: EndpointDescriptor) -> Result<(), CacheError> {
        if self.endpoints.contains_key(descriptor.name) {
            return Err(CacheError::DuplicateEndpoint(descriptor.name.to_string()));
        }
        self.endpoints.insert(descriptor.name, Arc::new(descriptor));
        Ok(())
    }

    pub fn register_all(
        &mut self,
        descriptors: impl IntoIterator<Item = EndpointDescriptor>,
    ) -> Result<(), CacheError> {
        descriptors
            .into_iter()
            .try_for_each(|descriptor| self.register(descriptor))
    }

    pub fn get(&self, name: &str) -> Option<Arc<EndpointDescriptor>> {
        self.endpoints.get(name).cloned()
    }

    /// Look up `name` and check it is of the expected kind.
    pub fn expect(&self, name: &str, kind: EndpointKind) -> Result<Arc<EndpointDescriptor>, CacheError> {
        let descriptor = self
            .get(name)
            .ok_or_else(|| CacheError::UnknownEndpoint(name.to_string()))?;
        if descriptor.kind != kind {
            return Err(CacheError::WrongKind {
                name: name.to_string(),
                expected: kind,
                actual: descriptor.kind,
            });
        }
        Ok(descriptor)
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.endpoints.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
