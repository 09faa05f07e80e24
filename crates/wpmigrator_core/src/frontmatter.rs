use serde_yaml::{Mapping, Value as YamlValue};
use tracing::error;

use crate::error::{MigrateError, Result};
use crate::index::EntityIndex;
use crate::record::{EntityKind, Record};

/// Keys whose value is a `{ "rendered": ... }` object.
const RENDERED_KEYS: &[&str] = &["content", "title", "excerpt", "guid"];

/// Indices consulted while resolving referenced ids into slugs.
#[derive(Debug, Clone, Copy)]
pub struct Lookups<'a> {
    pub tags: &'a EntityIndex,
    pub categories: &'a EntityIndex,
    pub authors: Option<&'a EntityIndex>,
}

/// Copy the configured `keys` of `record` into an ordered mapping.
///
/// With `resolve` set, rendered objects are flattened and tag, category and
/// author ids are replaced by slugs. An unknown tag or category fails the
/// record; an unknown author only drops the `author` key.
pub fn build(record: &Record, keys: &[String], lookups: &Lookups<'_>, resolve: bool) -> Result<Mapping> {
    let mut mapping = Mapping::new();
    for key in keys {
        let Some(value) = record.get(key) else {
            continue;
        };
        if !resolve {
            mapping.insert(key_value(key), to_yaml(value)?);
            continue;
        }

        let converted = match key.as_str() {
            key if RENDERED_KEYS.contains(&key) => match value.get("rendered") {
                Some(rendered) => to_yaml(rendered)?,
                None => YamlValue::Null,
            },
            "tags" => slugs(record, key, lookups.tags)?,
            "categories" => slugs(record, key, lookups.categories)?,
            "author" => match author_slug(record, lookups.authors) {
                Some(slug) => YamlValue::String(slug),
                None => continue,
            },
            _ => to_yaml(value)?,
        };
        mapping.insert(key_value(key), converted);
    }
    Ok(mapping)
}

/// Merge computed keys after the copied ones, replacing any with the same name.
pub fn merge(mapping: &mut Mapping, extra: Mapping) {
    for (key, value) in extra {
        mapping.insert(key, value);
    }
}

pub fn serialize(mapping: &Mapping) -> Result<String> {
    Ok(serde_yaml::to_string(mapping)?)
}

pub fn parse(text: &str) -> Result<Mapping> {
    Ok(serde_yaml::from_str(text)?)
}

pub fn key_value(key: &str) -> YamlValue {
    YamlValue::String(key.to_string())
}

fn to_yaml(value: &serde_json::Value) -> Result<YamlValue> {
    Ok(serde_yaml::to_value(value)?)
}

fn slugs(record: &Record, key: &str, index: &EntityIndex) -> Result<YamlValue> {
    let mut output = Vec::new();
    for id in record.id_list(key)? {
        output.push(YamlValue::String(index.slug(id)?.to_string()));
    }
    Ok(YamlValue::Sequence(output))
}

fn author_slug(record: &Record, authors: Option<&EntityIndex>) -> Option<String> {
    let author_id = record.get("author").and_then(serde_json::Value::as_i64);
    let lookup = match (author_id, authors) {
        (Some(id), Some(authors)) => authors.slug(id).map(ToString::to_string),
        (Some(id), None) => Err(MigrateError::NotFound {
            kind: EntityKind::Author,
            id,
        }),
        (None, _) => Err(MigrateError::invalid_field("author", "expected integer id")),
    };
    match lookup {
        Ok(slug) => Some(slug),
        Err(err) => {
            error!(id = %record.id_or_unknown(), "author lookup failed: {err}");
            None
        }
    }
}
