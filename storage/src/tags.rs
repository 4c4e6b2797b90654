use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

use crate::object::{NewTag, Tag};
use crate::repository::TagRepository;
use crate::Result;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TagRegistry: Send + Sync {
    /// Resolves every distinct name to a tag, inserting the ones that do not exist yet.
    async fn get_or_create_tags_by_name(&self, names: &[String]) -> Result<Vec<Tag>>;

    async fn tag_exists_by_name(&self, name: &str) -> Result<bool>;
}

pub struct TagService {
    repository: Arc<dyn TagRepository>,
}

impl TagService {
    pub fn new(repository: Arc<dyn TagRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl TagRegistry for TagService {
    async fn get_or_create_tags_by_name(&self, names: &[String]) -> Result<Vec<Tag>> {
        let mut seen = HashSet::new();
        let distinct: Vec<String> = names
            .iter()
            .filter(|name| seen.insert(name.as_str()))
            .cloned()
            .collect();

        if distinct.is_empty() {
            return Ok(Vec::new());
        }

        let mut tags = self.repository.get_by_names(&distinct).await?;
        let existing: HashSet<&str> = tags.iter().map(|tag| tag.name.as_str()).collect();

        let new_tags: Vec<NewTag> = distinct
            .iter()
            .filter(|name| !existing.contains(name.as_str()))
            .map(|name| NewTag::new(name.clone()))
            .collect();

        if new_tags.is_empty() {
            return Ok(tags);
        }

        tracing::debug!("Creating {} new tags", new_tags.len());
        let created = self.repository.add_range(new_tags).await?;
        tags.extend(created);
        Ok(tags)
    }

    async fn tag_exists_by_name(&self, name: &str) -> Result<bool> {
        self.repository.exists_by_name(name).await
    }
}
