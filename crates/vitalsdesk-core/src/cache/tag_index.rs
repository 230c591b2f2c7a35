//! Reverse index from tags to the cache entries that provide them.
//!
//! Each key's tag set is replaced as a whole on every successful fetch, so
//! the index always reflects exactly the tags of the last success.

use std::collections::{BTreeSet, HashMap, HashSet};

use super::key::CacheKey;
use super::tag::Tag;

#[derive(Debug, Default)]
struct KindEntries {
    bare: HashSet<CacheKey>,
    by_id: HashMap<String, HashSet<CacheKey>>,
}

impl KindEntries {
    fn is_empty(&self) -> bool {
        self.bare.is_empty() && self.by_id.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct TagIndex {
    by_kind: HashMap<String, KindEntries>,
    by_key: HashMap<CacheKey, Vec<Tag>>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the tags registered for `key`. Duplicate tags collapse.
    pub fn replace(&mut self, key: &CacheKey, tags: Vec<Tag>) {
        self.remove(key);

        let mut unique: Vec<Tag> = Vec::with_capacity(tags.len());
        for tag in tags {
            if !unique.contains(&tag) {
                unique.push(tag);
            }
        }
        if unique.is_empty() {
            return;
        }

        for tag in &unique {
            let kind = self.by_kind.entry(tag.kind().to_string()).or_default();
            match tag {
                Tag::Type(_) => {
                    kind.bare.insert(key.clone());
                }
                Tag::Id { id, .. } => {
                    kind.by_id.entry(id.clone()).or_default().insert(key.clone());
                }
            }
        }
        self.by_key.insert(key.clone(), unique);
    }

    /// Drop every registration of `key`.
    pub fn remove(&mut self, key: &CacheKey) {
        let Some(tags) = self.by_key.remove(key) else {
            return;
        };
        for tag in tags {
            let kind_name = tag.kind().to_string();
            let Some(kind) = self.by_kind.get_mut(&kind_name) else {
                continue;
            };
            match tag {
                Tag::Type(_) => {
                    kind.bare.remove(key);
                }
                Tag::Id { id, .. } => {
                    if let Some(keys) = kind.by_id.get_mut(&id) {
                        keys.remove(key);
                        if keys.is_empty() {
                            kind.by_id.remove(&id);
                        }
                    }
                }
            }
            if kind.is_empty() {
                self.by_kind.remove(&kind_name);
            }
        }
    }

    /// Keys matched by any of `tags`.
    ///
    /// A bare `Type` tag matches every key registered under that kind, with or
    /// without an id. A scoped `Id` tag matches only keys registered under
    /// that exact id.
    pub fn resolve(&self, tags: &[Tag]) -> BTreeSet<CacheKey> {
        let mut keys = BTreeSet::new();
        for tag in tags {
            let Some(kind) = self.by_kind.get(tag.kind()) else {
                continue;
            };
            match tag {
                Tag::Type(_) => {
                    keys.extend(kind.bare.iter().cloned());
                    for ids in kind.by_id.values() {
                        keys.extend(ids.iter().cloned());
                    }
                }
                Tag::Id { id, .. } => {
                    if let Some(ids) = kind.by_id.get(id) {
                        keys.extend(ids.iter().cloned());
                    }
                }
            }
        }
        keys
    }

    pub fn tags_for(&self, key: &CacheKey) -> &[Tag] {
        self.by_key.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains_key(&self, key: &CacheKey) -> bool {
        self.by_key.contains_key(key)
    }

    /// Number of keys with at least one tag.
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_kind.clear();
        self.by_key.clear();
    }
}
