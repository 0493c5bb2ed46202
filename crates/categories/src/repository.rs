use crate::models::{Category, CreateCategoryRequest};
use database::{self, RepositoryError};
use sqlx::{FromRow, QueryBuilder};
use uuid::Uuid;

#[derive(FromRow)]
struct CategoryRecord {
    id: Uuid,
    title: String,
}

impl From<CategoryRecord> for Category {
    fn from(record: CategoryRecord) -> Self {
        Category {
            id: record.id,
            title: record.title,
        }
    }
}

// Two bound parameters per inserted row.
const INSERT_CHUNK: usize = database::MAX_BIND_PARAMS / 2;

pub(crate) struct CategoryRepository<'a> {
    conn: &'a mut database::Connection,
}

impl<'a> CategoryRepository<'a> {
    pub fn new(conn: &'a mut database::Connection) -> Self {
        Self { conn }
    }

    pub async fn create(&mut self, req: &CreateCategoryRequest) -> Result<Category, RepositoryError> {
        let record = sqlx::query_as::<_, CategoryRecord>(
            "INSERT INTO categories (id, title) VALUES ($1, $2) RETURNING id, title",
        )
        .bind(Uuid::new_v4())
        .bind(req.title())
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(record.into())
    }

    /// Inserts every title in one statement per chunk. Titles that already
    /// exist are skipped rather than reported as conflicts.
    pub async fn create_missing(&mut self, reqs: &[CreateCategoryRequest]) -> Result<u64, RepositoryError> {
        let mut inserted = 0;

        for chunk in reqs.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<database::Driver> = QueryBuilder::new("INSERT INTO categories (id, title) ");
            builder.push_values(chunk, |mut row, req| {
                row.push_bind(Uuid::new_v4()).push_bind(req.title());
            });
            builder.push(" ON CONFLICT(title) DO NOTHING");

            let result = builder.build().execute(&mut *self.conn).await?;
            inserted += result.rows_affected();
        }

        Ok(inserted)
    }

    pub async fn list(&mut self) -> Result<Vec<Category>, RepositoryError> {
        let records = sqlx::query_as::<_, CategoryRecord>(
            "SELECT id, title FROM categories ORDER BY title",
        )
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(records.into_iter().map(|r| r.into()).collect())
    }

    pub async fn find_by_title(&mut self, title: &str) -> Result<Option<Category>, RepositoryError> {
        let record = sqlx::query_as::<_, CategoryRecord>(
            "SELECT id, title FROM categories WHERE title = $1",
        )
        .bind(title)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(record.map(|r| r.into()))
    }

    pub async fn find_by_titles(&mut self, titles: &[&str]) -> Result<Vec<Category>, RepositoryError> {
        let mut categories = Vec::with_capacity(titles.len());

        for chunk in titles.chunks(database::MAX_BIND_PARAMS) {
            let mut builder: QueryBuilder<database::Driver> = QueryBuilder::new("SELECT id, title FROM categories WHERE title IN (");
            let mut separated = builder.separated(", ");
            for title in chunk {
                separated.push_bind(*title);
            }
            separated.push_unseparated(")");

            let records = builder
                .build_query_as::<CategoryRecord>()
                .fetch_all(&mut *self.conn)
                .await?;
            categories.extend(records.into_iter().map(Category::from));
        }

        Ok(categories)
    }
}
