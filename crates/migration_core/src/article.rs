use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::dates::format_date_pt_br;

/// Everything extracted from one legacy article page, after assets and links
/// have been normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedArticle {
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub category: String,
    pub published: NaiveDate,
    /// Site-relative path of the localized cover image.
    pub cover_image_path: Option<String>,
    pub body_html: String,
}

impl ExtractedArticle {
    pub fn to_record(
        &self,
        source_url: Option<String>,
        local_url: Option<String>,
        include_content: bool,
    ) -> PostRecord {
        PostRecord {
            slug: self.slug.clone(),
            title: self.title.clone(),
            date_iso: self.published.format("%Y-%m-%d").to_string(),
            date_human_pt_br: format_date_pt_br(self.published),
            category: self.category.clone(),
            excerpt: self.excerpt.clone(),
            cover_image_path: self.cover_image_path.clone().unwrap_or_default(),
            source_url,
            local_url,
            content_html: include_content.then(|| self.body_html.clone()),
        }
    }
}

/// One row of `data/posts.json`.
///
/// Field order is part of the file format: serialization must stay stable so
/// that reloading and re-saving the collection is byte-identical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    pub slug: String,
    pub title: String,
    #[serde(rename = "dateISO")]
    pub date_iso: String,
    #[serde(rename = "dateHumanPTBR", default, deserialize_with = "null_as_empty")]
    pub date_human_pt_br: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub category: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub excerpt: String,
    /// Empty when the post has no cover. Older files store `null` instead.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub cover_image_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_html: Option<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl PostRecord {
    pub fn cover(&self) -> Option<&str> {
        let trimmed = self.cover_image_path.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

/// Posts keyed by slug, kept ordered by date (newest first).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostCollection {
    posts: Vec<PostRecord>,
}

impl PostCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the record, replacing any existing record with the same slug.
    pub fn upsert(&mut self, record: PostRecord) {
        match self.posts.iter_mut().find(|p| p.slug == record.slug) {
            Some(existing) => *existing = record,
            None => self.posts.push(record),
        }
        self.sort();
    }

    pub fn get(&self, slug: &str) -> Option<&PostRecord> {
        self.posts.iter().find(|p| p.slug == slug)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PostRecord> {
        self.posts.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PostRecord> {
        self.posts.iter_mut()
    }

    pub fn slugs(&self) -> Vec<String> {
        self.posts.iter().map(|p| p.slug.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn retain(&mut self, keep: impl FnMut(&PostRecord) -> bool) {
        self.posts.retain(keep);
    }

    /// Parses a posts file. Later duplicates of a slug replace earlier ones.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let rows: Vec<PostRecord> = serde_json::from_str(text)?;
        let mut collection = Self::new();
        for row in rows {
            match collection.posts.iter_mut().find(|p| p.slug == row.slug) {
                Some(existing) => *existing = row,
                None => collection.posts.push(row),
            }
        }
        collection.sort();
        Ok(collection)
    }

    /// Pretty JSON (2-space indent) with a trailing newline.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let mut text = serde_json::to_string_pretty(&self.posts)?;
        text.push('\n');
        Ok(text)
    }

    fn sort(&mut self) {
        self.posts.sort_by(|a, b| {
            b.date_iso
                .cmp(&a.date_iso)
                .then_with(|| a.slug.cmp(&b.slug))
        });
    }
}

impl IntoIterator for PostCollection {
    type Item = PostRecord;
    type IntoIter = std::vec::IntoIter<PostRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.posts.into_iter()
    }
}

impl FromIterator<PostRecord> for PostCollection {
    fn from_iter<T: IntoIterator<Item = PostRecord>>(iter: T) -> Self {
        let mut collection = Self::new();
        for record in iter {
            collection.upsert(record);
        }
        collection
    }
}
