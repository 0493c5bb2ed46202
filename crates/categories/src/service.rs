use crate::models::{Category, CreateCategoryRequest};
use crate::repository::CategoryRepository;
use database::{RepositoryError, Database};
use std::collections::{BTreeSet, HashMap};
use tracing::instrument;

#[derive(Debug, thiserror::Error)]
pub enum CategoryError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Database error: {0}")]
    Infrastructure(String),
    #[error("Category not found")]
    NotFound,
}

impl From<RepositoryError> for CategoryError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => CategoryError::NotFound,
            RepositoryError::CheckViolation(msg) => CategoryError::InvalidInput(msg),
            RepositoryError::Infrastructure(e) => CategoryError::Infrastructure(e.to_string()),
            _ => CategoryError::Infrastructure(err.to_string()),
        }
    }
}

pub struct CategoryService;

impl CategoryService {
    /// Returns the category with exactly this title, creating it first if
    /// no such category exists yet.
    #[instrument(skip(db))]
    pub async fn find_or_create(db: &Database, title: &str) -> Result<Category, CategoryError> {
        let req = CreateCategoryRequest::new(title).map_err(CategoryError::InvalidInput)?;

        let mut uow = db.begin().await?;
        let mut repo = CategoryRepository::new(uow.connection());

        if let Some(category) = repo.find_by_title(req.title()).await? {
            return Ok(category);
        }

        let category = match repo.create(&req).await {
            Ok(category) => {
                tracing::info!(category_id = %category.id, "Created category {:?}", category.title);
                category
            }
            // Another writer created it between our read and insert.
            Err(RepositoryError::UniqueViolation(_)) => repo
                .find_by_title(req.title())
                .await?
                .ok_or(CategoryError::NotFound)?,
            Err(e) => return Err(e.into()),
        };

        uow.commit().await?;

        Ok(category)
    }

    /// Resolves every title to a category, creating all missing ones with a
    /// single batched insert. The returned map has an entry for each
    /// distinct (trimmed) input title.
    #[instrument(skip(db, titles))]
    pub async fn resolve_titles<I, S>(
        db: &Database,
        titles: I,
    ) -> Result<HashMap<String, Category>, CategoryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let requested = titles
            .into_iter()
            .map(|t| CreateCategoryRequest::new(t.as_ref()))
            .collect::<Result<BTreeSet<_>, _>>()
            .map_err(CategoryError::InvalidInput)?;

        if requested.is_empty() {
            return Ok(HashMap::new());
        }

        let mut uow = db.begin().await?;
        let mut repo = CategoryRepository::new(uow.connection());

        let wanted: Vec<&str> = requested.iter().map(|r| r.title()).collect();
        let mut resolved: HashMap<String, Category> = repo
            .find_by_titles(&wanted)
            .await?
            .into_iter()
            .map(|c| (c.title.clone(), c))
            .collect();

        let missing: Vec<CreateCategoryRequest> = requested
            .iter()
            .filter(|r| !resolved.contains_key(r.title()))
            .cloned()
            .collect();

        if !missing.is_empty() {
            let inserted = repo.create_missing(&missing).await?;
            tracing::info!("Created {} of {} missing categories", inserted, missing.len());

            // Re-read so rows inserted concurrently by someone else are picked up too.
            let missing_titles: Vec<&str> = missing.iter().map(|r| r.title()).collect();
            for category in repo.find_by_titles(&missing_titles).await? {
                resolved.insert(category.title.clone(), category);
            }
        }

        if let Some(unresolved) = wanted.iter().find(|t| !resolved.contains_key(**t)) {
            tracing::error!("Category {:?} could not be resolved after insert", unresolved);
            return Err(CategoryError::Infrastructure(format!(
                "category {unresolved:?} could not be resolved"
            )));
        }

        uow.commit().await?;

        Ok(resolved)
    }

    #[instrument(skip(db))]
    pub async fn list_categories(db: &Database) -> Result<Vec<Category>, CategoryError> {
        let mut uow = db.begin().await?;
        let mut repo = CategoryRepository::new(uow.connection());

        let categories = repo.list().await?;

        Ok(categories)
    }
}
