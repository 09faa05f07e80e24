use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{MigrateError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Author,
    Tag,
    Category,
    Post,
    Page,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Author => "author",
            Self::Tag => "tag",
            Self::Category => "category",
            Self::Post => "post",
            Self::Page => "page",
        }
    }

    /// REST collection that lists entities of this kind.
    pub fn collection(self) -> &'static str {
        match self {
            Self::Author => "users",
            Self::Tag => "tags",
            Self::Category => "categories",
            Self::Post => "posts",
            Self::Page => "pages",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entity as returned by the source, kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn id(&self) -> Result<i64> {
        self.integer("id")
    }

    /// Id for log lines; never fails.
    pub fn id_or_unknown(&self) -> String {
        match self.0.get("id") {
            Some(value) => value.to_string(),
            None => "<unknown>".to_string(),
        }
    }

    pub fn slug(&self) -> Result<&str> {
        self.string("slug")
    }

    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    pub fn integer(&self, key: &str) -> Result<i64> {
        let value = self.require(key)?;
        value
            .as_i64()
            .ok_or_else(|| MigrateError::invalid_field(key, format!("expected integer, got {value}")))
    }

    pub fn string(&self, key: &str) -> Result<&str> {
        let value = self.require(key)?;
        value
            .as_str()
            .ok_or_else(|| MigrateError::invalid_field(key, format!("expected string, got {value}")))
    }

    /// `{ "rendered": ... }` sub-value of `key`, `None` when absent.
    pub fn rendered(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(|value| value.get("rendered"))
            .and_then(Value::as_str)
    }

    /// Referenced ids under `key`; an absent field is an empty list.
    pub fn id_list(&self, key: &str) -> Result<Vec<i64>> {
        let Some(value) = self.0.get(key) else {
            return Ok(Vec::new());
        };
        let items = value
            .as_array()
            .ok_or_else(|| MigrateError::invalid_field(key, format!("expected id list, got {value}")))?;
        items
            .iter()
            .map(|item| {
                item.as_i64().ok_or_else(|| {
                    MigrateError::invalid_field(key, format!("expected integer id, got {item}"))
                })
            })
            .collect()
    }

    fn require(&self, key: &str) -> Result<&Value> {
        self.0.get(key).ok_or_else(|| MigrateError::MissingField {
            field: key.to_string(),
        })
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

#[cfg(test)]
pub(crate) fn record(value: Value) -> Record {
    match value {
        Value::Object(fields) => Record(fields),
        other => panic!("test record must be an object, got {other}"),
    }
}
