use std::path::PathBuf;

use chrono::NaiveDateTime;
use serde_yaml::{Mapping, Value as YamlValue};

use crate::error::{MigrateError, Result};
use crate::frontmatter::{self, Lookups, key_value};
use crate::markdown::html_to_markdown;
use crate::record::{EntityKind, Record};
use crate::redirects::{compute_redirects, permalink};
use crate::sink::FileSink;

const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const FRONT_MATTER_DELIMITER: &str = "---\n";

/// Per-kind rules for turning a record into an output file.
pub trait Templater {
    fn kind(&self) -> EntityKind;

    fn filename(&self, record: &Record) -> Result<String>;

    /// Markdown body, or `None` for files that carry front matter only.
    fn body(&self, record: &Record) -> Result<Option<String>>;

    /// Computed keys merged after the copied fields.
    fn extra_front_matter(&self, record: &Record, lookups: &Lookups<'_>) -> Result<Mapping>;

    /// Whether copied fields get slug and `rendered` resolution.
    fn resolves_references(&self) -> bool {
        true
    }
}

/// Pages: `<slug>.md`, never any redirects.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageTemplater;

/// Posts: `<date>-<title>.md` with category redirects.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostTemplater;

/// Authors and other data files: `<slug>.yml`, front matter only.
#[derive(Debug, Clone, Copy)]
pub struct DataTemplater {
    pub kind: EntityKind,
}

impl Templater for PageTemplater {
    fn kind(&self) -> EntityKind {
        EntityKind::Page
    }

    fn filename(&self, record: &Record) -> Result<String> {
        Ok(format!("{}.md", record.slug()?))
    }

    fn body(&self, record: &Record) -> Result<Option<String>> {
        markdown_body(record).map(Some)
    }

    fn extra_front_matter(&self, record: &Record, _lookups: &Lookups<'_>) -> Result<Mapping> {
        content_extras(record, self.kind(), Vec::new())
    }
}

impl Templater for PostTemplater {
    fn kind(&self) -> EntityKind {
        EntityKind::Post
    }

    fn filename(&self, record: &Record) -> Result<String> {
        let date = post_date(record)?;
        let title = record
            .rendered("title")
            .map(slugify)
            .filter(|title| !title.is_empty())
            .map_or_else(|| record.slug().map(ToString::to_string), Ok)?;
        Ok(format!("{}-{title}.md", date.format("%Y-%m-%d")))
    }

    fn body(&self, record: &Record) -> Result<Option<String>> {
        markdown_body(record).map(Some)
    }

    fn extra_front_matter(&self, record: &Record, lookups: &Lookups<'_>) -> Result<Mapping> {
        let redirects = compute_redirects(record, lookups.categories)?;
        content_extras(record, self.kind(), redirects)
    }
}

impl Templater for DataTemplater {
    fn kind(&self) -> EntityKind {
        self.kind
    }

    fn filename(&self, record: &Record) -> Result<String> {
        Ok(format!("{}.yml", record.slug()?))
    }

    fn body(&self, _record: &Record) -> Result<Option<String>> {
        Ok(None)
    }

    fn extra_front_matter(&self, _record: &Record, _lookups: &Lookups<'_>) -> Result<Mapping> {
        Ok(Mapping::new())
    }

    fn resolves_references(&self) -> bool {
        false
    }
}

/// A templater variant bound to its field list and output directory.
pub struct EntityTemplater<T: Templater> {
    variant: T,
    keys: Vec<String>,
    sink: FileSink,
}

impl<T: Templater> EntityTemplater<T> {
    pub fn new(variant: T, keys: Vec<String>, sink: FileSink) -> Self {
        Self {
            variant,
            keys,
            sink,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.variant.kind()
    }

    pub fn sink(&self) -> &FileSink {
        &self.sink
    }

    /// Filename and full file contents for `record`, without touching disk.
    pub fn render(&self, record: &Record, lookups: &Lookups<'_>) -> Result<(String, String)> {
        let mut mapping = frontmatter::build(
            record,
            &self.keys,
            lookups,
            self.variant.resolves_references(),
        )?;
        frontmatter::merge(&mut mapping, self.variant.extra_front_matter(record, lookups)?);
        let yaml = frontmatter::serialize(&mapping)?;
        let filename = self.variant.filename(record)?;

        let contents = match self.variant.body(record)? {
            Some(body) => {
                let mut contents = String::with_capacity(yaml.len() + body.len() + 8);
                contents.push_str(FRONT_MATTER_DELIMITER);
                contents.push_str(&yaml);
                contents.push_str(FRONT_MATTER_DELIMITER);
                contents.push_str(&body);
                contents
            }
            None => yaml,
        };
        Ok((filename, contents))
    }

    pub fn template(&mut self, record: &Record, lookups: &Lookups<'_>) -> Result<PathBuf> {
        let (filename, contents) = self.render(record, lookups)?;
        self.sink.write(&filename, &contents)
    }
}

/// Lowercase `title` and collapse every run outside `[a-z0-9_]` into one `-`.
pub fn slugify(title: &str) -> String {
    let mut output = String::with_capacity(title.len());
    let mut previous_dash = false;
    for ch in title.to_lowercase().chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_' {
            output.push(ch);
            previous_dash = false;
        } else if !previous_dash {
            output.push('-');
            previous_dash = true;
        }
    }
    output.trim_matches('-').to_string()
}

fn post_date(record: &Record) -> Result<NaiveDateTime> {
    let raw = record.string("date")?;
    NaiveDateTime::parse_and_remainder(raw, DATE_FORMAT)
        .map(|(date, _)| date)
        .map_err(|error| MigrateError::invalid_field("date", format!("`{raw}`: {error}")))
}

fn markdown_body(record: &Record) -> Result<String> {
    html_to_markdown(record.rendered("content").unwrap_or_default())
}

fn content_extras(record: &Record, kind: EntityKind, redirects: Vec<String>) -> Result<Mapping> {
    let entity_type = record
        .get("type")
        .and_then(serde_json::Value::as_str)
        .unwrap_or(kind.as_str());

    let mut extra = Mapping::new();
    extra.insert(
        key_value("layout"),
        YamlValue::String(format!("legacy-{entity_type}")),
    );
    extra.insert(key_value("permalink"), YamlValue::String(permalink(record)?));
    extra.insert(
        key_value("redirect_from"),
        YamlValue::Sequence(redirects.into_iter().map(YamlValue::String).collect()),
    );
    Ok(extra)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::json;
    use tempfile::tempdir;

    use super::*;
    use crate::config::{DEFAULT_AUTHOR_KEYS, DEFAULT_CONTENT_KEYS};
    use crate::index::EntityIndex;
    use crate::record::record;

    fn keys(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| (*value).to_string()).collect()
    }

    struct Fixture {
        tags: EntityIndex,
        categories: EntityIndex,
        authors: EntityIndex,
    }

    impl Fixture {
        fn new() -> Self {
            let mut tags = EntityIndex::new(EntityKind::Tag);
            tags.add(record(json!({"id": 10, "name": "Climate", "slug": "climate"})))
                .expect("tag");
            let mut categories = EntityIndex::new(EntityKind::Category);
            categories
                .add(record(json!({"id": 3, "slug": "news", "parent": 0})))
                .expect("category");
            categories
                .add(record(json!({"id": 4, "slug": "updates", "parent": 3})))
                .expect("category");
            let mut authors = EntityIndex::new(EntityKind::Author);
            authors
                .add(record(json!({"id": 2, "slug": "jdoe"})))
                .expect("author");
            Self {
                tags,
                categories,
                authors,
            }
        }

        fn lookups(&self) -> Lookups<'_> {
            Lookups {
                tags: &self.tags,
                categories: &self.categories,
                authors: Some(&self.authors),
            }
        }
    }

    fn post(id: i64, title: &str) -> Record {
        record(json!({
            "id": id,
            "date": "2021-05-09T10:00:00",
            "slug": format!("post-{id}"),
            "type": "post",
            "link": "https://www.data.gov/blog/my-post/",
            "title": {"rendered": title},
            "content": {"rendered": "<p>Body <em>text</em></p>"},
            "excerpt": {"rendered": "<p>Body</p>"},
            "author": 2,
            "categories": [3, 4],
            "tags": [10],
        }))
    }

    #[test]
    fn post_filename_uses_date_and_slugified_title() {
        let filename = PostTemplater
            .filename(&post(1, "Hello, World!"))
            .expect("filename");
        assert_eq!(filename, "2021-05-09-hello-world.md");
    }

    #[test]
    fn post_filename_rejects_unparseable_dates() {
        let mut fields = post(1, "Hello").fields().clone();
        fields.insert("date".to_string(), json!("May 9th"));
        let error = PostTemplater
            .filename(&Record::new(fields))
            .expect_err("must fail");
        assert!(matches!(error, MigrateError::InvalidField { .. }));
    }

    #[test]
    fn page_and_data_filenames_use_slug() {
        let page = record(json!({"id": 5, "slug": "about-us"}));
        assert_eq!(PageTemplater.filename(&page).expect("page"), "about-us.md");
        let author = DataTemplater {
            kind: EntityKind::Author,
        };
        assert_eq!(author.filename(&page).expect("data"), "about-us.yml");
    }

    #[test]
    fn slugify_collapses_runs_and_trims() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("  Open   Data_2024 -- Results "), "open-data_2024-results");
        assert_eq!(slugify("Data.gov&#8217;s Year"), "data-gov-8217-s-year");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn post_render_writes_delimited_front_matter_and_markdown() {
        let fixture = Fixture::new();
        let temp = tempdir().expect("tempdir");
        let templater = EntityTemplater::new(
            PostTemplater,
            keys(DEFAULT_CONTENT_KEYS),
            FileSink::new(temp.path()),
        );

        let (filename, contents) = templater
            .render(&post(1, "Hello, World!"), &fixture.lookups())
            .expect("render");
        assert_eq!(filename, "2021-05-09-hello-world.md");
        assert!(contents.starts_with("---\nid: 1\n"));

        let mut parts = contents.splitn(3, "---\n");
        assert_eq!(parts.next(), Some(""));
        let yaml = parts.next().expect("front matter");
        let body = parts.next().expect("body");
        assert!(body.contains("Body") && body.contains("text"));
        assert!(!body.contains("<em>"));

        let parsed = frontmatter::parse(yaml).expect("parse");
        assert_eq!(parsed.get("author").and_then(YamlValue::as_str), Some("jdoe"));
        assert_eq!(parsed.get("layout").and_then(YamlValue::as_str), Some("legacy-post"));
        assert_eq!(
            parsed.get("permalink").and_then(YamlValue::as_str),
            Some("/blog/my-post/")
        );
        let redirects = parsed
            .get("redirect_from")
            .and_then(YamlValue::as_sequence)
            .expect("redirects")
            .iter()
            .filter_map(YamlValue::as_str)
            .collect::<Vec<_>>();
        assert_eq!(
            redirects,
            vec!["/news/my-post/", "/news/updates/my-post/", "/updates/my-post/"]
        );
        assert!(parsed.get("content").is_none());
    }

    #[test]
    fn page_render_has_empty_redirects() {
        let fixture = Fixture::new();
        let temp = tempdir().expect("tempdir");
        let templater = EntityTemplater::new(
            PageTemplater,
            keys(&["id", "title", "type"]),
            FileSink::new(temp.path()),
        );
        let page = record(json!({
            "id": 9,
            "slug": "about-us",
            "type": "page",
            "link": "https://www.data.gov/about-us",
            "title": {"rendered": "About Us"},
            "content": {"rendered": "<h2>Mission</h2>"},
        }));

        let (filename, contents) = templater.render(&page, &fixture.lookups()).expect("render");
        assert_eq!(filename, "about-us.md");
        assert!(contents.contains("layout: legacy-page\n"));
        assert!(contents.contains("permalink: /about-us/\n"));
        assert!(contents.contains("redirect_from: []\n"));
        assert!(contents.contains("Mission"));
    }

    #[test]
    fn data_render_is_plain_yaml() {
        let fixture = Fixture::new();
        let temp = tempdir().expect("tempdir");
        let mut templater = EntityTemplater::new(
            DataTemplater {
                kind: EntityKind::Author,
            },
            keys(DEFAULT_AUTHOR_KEYS),
            FileSink::new(temp.path()),
        );
        let author = record(json!({
            "id": 2,
            "name": "Jane Doe",
            "slug": "jdoe",
            "url": "",
            "description": "Editor",
            "avatar_urls": {"24": "https://example.org/a.png"},
        }));

        let path = templater.template(&author, &fixture.lookups()).expect("template");
        assert_eq!(path, temp.path().join("jdoe.yml"));
        let contents = fs::read_to_string(&path).expect("read");
        assert!(!contents.contains("---"));
        assert!(!contents.contains("layout"));
        assert!(!contents.contains("avatar_urls"));
        let parsed = frontmatter::parse(&contents).expect("parse");
        assert_eq!(parsed.get("name").and_then(YamlValue::as_str), Some("Jane Doe"));
    }

    #[test]
    fn colliding_posts_fail_the_second_write() {
        let fixture = Fixture::new();
        let temp = tempdir().expect("tempdir");
        let mut templater = EntityTemplater::new(
            PostTemplater,
            keys(&["id", "title"]),
            FileSink::new(temp.path()),
        );

        templater
            .template(&post(1, "Same Title"), &fixture.lookups())
            .expect("first post");
        let error = templater
            .template(&post(2, "Same title!"), &fixture.lookups())
            .expect_err("collision");
        assert!(matches!(error, MigrateError::PathExists { .. }));
        let contents =
            fs::read_to_string(temp.path().join("2021-05-09-same-title.md")).expect("read");
        assert!(contents.contains("id: 1\n"));
    }
}
