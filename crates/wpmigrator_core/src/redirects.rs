use std::collections::BTreeSet;

use reqwest::Url;

use crate::error::{MigrateError, Result};
use crate::index::EntityIndex;
use crate::record::Record;

/// Canonical path of `record.link`, always ending in `/`.
pub fn permalink(record: &Record) -> Result<String> {
    let link = record.string("link")?;
    let url = Url::parse(link).map_err(|error| MigrateError::invalid_field("link", error.to_string()))?;
    let mut path = url.path().to_string();
    if !path.ends_with('/') {
        path.push('/');
    }
    Ok(path)
}

/// Legacy category-prefixed paths that should redirect to the post's permalink.
///
/// Every category contributes `/<category>/<title-slug>/`, plus the same path
/// under its parent category when it has one. Only one level of parent is
/// followed. The result is sorted and never contains the permalink itself.
pub fn compute_redirects(post: &Record, categories: &EntityIndex) -> Result<Vec<String>> {
    let permalink = permalink(post)?;
    let Some(title) = permalink.split('/').rev().find(|segment| !segment.is_empty()) else {
        return Ok(Vec::new());
    };

    let mut redirects = BTreeSet::new();
    for category_id in post.id_list("categories")? {
        let redirect = format!("/{}/{title}/", categories.slug(category_id)?);
        if redirect == permalink {
            continue;
        }

        let parent_id = categories
            .get(category_id)?
            .get("parent")
            .and_then(serde_json::Value::as_i64)
            .unwrap_or(0);
        if parent_id != 0 {
            let nested = format!("/{}{redirect}", categories.slug(parent_id)?);
            if nested != permalink {
                redirects.insert(nested);
            }
        }
        redirects.insert(redirect);
    }

    Ok(redirects.into_iter().collect())
}
