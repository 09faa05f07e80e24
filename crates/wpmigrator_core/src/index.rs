use std::collections::{BTreeMap, BTreeSet};

use crate::error::{MigrateError, Result};
use crate::record::{EntityKind, Record};

/// Registry of one entity kind keyed by id.
///
/// Ids whose record `name` appears in the filter list are remembered at
/// insertion so later phases can exclude content that references them.
#[derive(Debug, Clone)]
pub struct EntityIndex {
    kind: EntityKind,
    records: BTreeMap<i64, Record>,
    filter_names: BTreeSet<String>,
    filtered_ids: BTreeSet<i64>,
}

impl EntityIndex {
    pub fn new(kind: EntityKind) -> Self {
        Self::with_filter(kind, Vec::<String>::new())
    }

    pub fn with_filter<I, S>(kind: EntityKind, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind,
            records: BTreeMap::new(),
            filter_names: names.into_iter().map(Into::into).collect(),
            filtered_ids: BTreeSet::new(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn add(&mut self, record: Record) -> Result<()> {
        let id = record.id()?;
        if self.records.contains_key(&id) {
            return Err(MigrateError::DuplicateId {
                kind: self.kind,
                id,
            });
        }
        if record
            .name()
            .is_some_and(|name| self.filter_names.contains(name))
        {
            self.filtered_ids.insert(id);
        }
        self.records.insert(id, record);
        Ok(())
    }

    pub fn get(&self, id: i64) -> Result<&Record> {
        self.records.get(&id).ok_or(MigrateError::NotFound {
            kind: self.kind,
            id,
        })
    }

    pub fn slug(&self, id: i64) -> Result<&str> {
        self.get(id)?.slug()
    }

    pub fn is_filtered(&self, ids: &[i64]) -> bool {
        ids.iter().any(|id| self.filtered_ids.contains(id))
    }

    pub fn contains(&self, id: i64) -> bool {
        self.records.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn filtered_count(&self) -> usize {
        self.filtered_ids.len()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::record::record;

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut index = EntityIndex::new(EntityKind::Category);
        index
            .add(record(json!({"id": 1, "slug": "news"})))
            .expect("first insert");
        index
            .add(record(json!({"id": 2, "slug": "events"})))
            .expect("distinct id");

        let error = index
            .add(record(json!({"id": 1, "slug": "other"})))
            .expect_err("duplicate must fail");
        assert!(matches!(
            error,
            MigrateError::DuplicateId {
                kind: EntityKind::Category,
                id: 1
            }
        ));
        assert_eq!(index.len(), 2);
        assert_eq!(index.slug(1).expect("slug"), "news");
    }

    #[test]
    fn filter_list_marks_matching_names() {
        let mut tags = EntityIndex::with_filter(EntityKind::Tag, ["usdatagov"]);
        tags.add(record(json!({"id": 7, "name": "usdatagov", "slug": "usdatagov"})))
            .expect("insert filtered tag");
        tags.add(record(json!({"id": 8, "name": "climate", "slug": "climate"})))
            .expect("insert tag");

        assert!(tags.is_filtered(&[7]));
        assert!(!tags.is_filtered(&[8]));
        assert!(tags.is_filtered(&[8, 7]));
        assert!(!tags.is_filtered(&[]));
        assert_eq!(tags.filtered_count(), 1);
    }

    #[test]
    fn lookups_of_unknown_ids_fail() {
        let index = EntityIndex::new(EntityKind::Author);
        assert!(matches!(
            index.slug(42),
            Err(MigrateError::NotFound {
                kind: EntityKind::Author,
                id: 42
            })
        ));
        assert!(index.get(42).is_err());
        assert!(index.is_empty());
    }
}
