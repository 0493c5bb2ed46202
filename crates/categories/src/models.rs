use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Category {
    pub id: Uuid,
    pub title: String,
}

/// A validated category title. Titles are the unique key of a category,
/// matched exactly and case-sensitively.
#[derive(Debug, Serialize, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct CreateCategoryRequest {
    title: String,
}

impl CreateCategoryRequest {
    pub fn new(title: impl Into<String>) -> Result<Self, String> {
        let title = title.into();
        let title = title.trim();
        if title.is_empty() {
            return Err("Category title cannot be empty".to_string());
        }

        Ok(Self {
            title: title.to_string(),
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }
}
