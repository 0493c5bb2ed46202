use crate::models::{NewTransaction, Transaction, TransactionType};
use chrono::{DateTime, Utc};
use database::{self, RepositoryError};
use sqlx::{FromRow, QueryBuilder};
use uuid::Uuid;

#[derive(FromRow)]
struct TransactionRecord {
    id: Uuid,
    title: String,
    #[sqlx(rename = "type")]
    kind: TransactionType,
    value: f64,
    category_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TransactionRecord> for Transaction {
    fn from(record: TransactionRecord) -> Self {
        Transaction {
            id: record.id,
            title: record.title,
            kind: record.kind,
            value: record.value,
            category_id: record.category_id,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

const COLUMNS: &str = "id, title, type, value, category_id, created_at, updated_at";

// Seven bound parameters per inserted row.
const INSERT_CHUNK: usize = database::MAX_BIND_PARAMS / 7;

fn stamp(new: &NewTransaction, now: DateTime<Utc>) -> Transaction {
    Transaction {
        id: Uuid::new_v4(),
        title: new.title.clone(),
        kind: new.kind,
        value: new.value,
        category_id: new.category_id,
        created_at: now,
        updated_at: now,
    }
}

pub(crate) struct TransactionRepository<'a> {
    conn: &'a mut database::Connection,
}

impl<'a> TransactionRepository<'a> {
    pub fn new(conn: &'a mut database::Connection) -> Self {
        Self { conn }
    }

    pub async fn create(&mut self, new: &NewTransaction) -> Result<Transaction, RepositoryError> {
        let t = stamp(new, Utc::now());
        let record = sqlx::query_as::<_, TransactionRecord>(&format!(
            "INSERT INTO transactions ({COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {COLUMNS}"
        ))
        .bind(t.id)
        .bind(&t.title)
        .bind(t.kind)
        .bind(t.value)
        .bind(t.category_id)
        .bind(t.created_at)
        .bind(t.updated_at)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(record.into())
    }

    /// Inserts all rows with one multi-row statement per chunk and returns
    /// them in input order.
    pub async fn create_many(&mut self, new: &[NewTransaction]) -> Result<Vec<Transaction>, RepositoryError> {
        let now = Utc::now();
        let transactions: Vec<Transaction> = new.iter().map(|n| stamp(n, now)).collect();

        for chunk in transactions.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<database::Driver> =
                QueryBuilder::new(format!("INSERT INTO transactions ({COLUMNS}) "));
            builder.push_values(chunk, |mut row, t| {
                row.push_bind(t.id)
                    .push_bind(&t.title)
                    .push_bind(t.kind)
                    .push_bind(t.value)
                    .push_bind(t.category_id)
                    .push_bind(t.created_at)
                    .push_bind(t.updated_at);
            });

            builder.build().execute(&mut *self.conn).await?;
        }

        Ok(transactions)
    }

    #[cfg(test)]
    pub async fn find_by_id(&mut self, id: Uuid) -> Result<Option<Transaction>, RepositoryError> {
        let record = sqlx::query_as::<_, TransactionRecord>(&format!(
            "SELECT {COLUMNS} FROM transactions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(record.map(|r| r.into()))
    }

    /// All transactions in insertion order.
    pub async fn list(&mut self) -> Result<Vec<Transaction>, RepositoryError> {
        let records = sqlx::query_as::<_, TransactionRecord>(&format!(
            "SELECT {COLUMNS} FROM transactions ORDER BY rowid"
        ))
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(records.into_iter().map(|r| r.into()).collect())
    }

    /// Returns the number of rows removed; zero when the id is unknown.
    pub async fn delete(&mut self, id: Uuid) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM transactions WHERE id = $1")
            .bind(id)
            .execute(&mut *self.conn)
            .await?;

        Ok(result.rows_affected())
    }
}
