use crate::models::{
    Balance, CreateTransactionRequest, NewTransaction, Transaction, TransactionType,
    TransactionsResponse,
};
use crate::repository::TransactionRepository;
use categories::service::{CategoryError, CategoryService};
use database::{RepositoryError, Database};
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Insufficient balance")]
    InsufficientBalance,
    #[error("Import failed: {0}")]
    Import(String),
    #[error("Database error: {0}")]
    Infrastructure(String),
}

impl From<RepositoryError> for TransactionError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::CheckViolation(msg) => TransactionError::InvalidInput(msg),
            RepositoryError::Infrastructure(e) => TransactionError::Infrastructure(e.to_string()),
            _ => TransactionError::Infrastructure(err.to_string()),
        }
    }
}

impl From<CategoryError> for TransactionError {
    fn from(err: CategoryError) -> Self {
        match err {
            CategoryError::InvalidInput(msg) => TransactionError::InvalidInput(msg),
            _ => TransactionError::Infrastructure(err.to_string()),
        }
    }
}

pub struct TransactionService;

impl TransactionService {
    /// Records a single transaction. An outcome larger than the current
    /// balance total is rejected before anything is written.
    #[instrument(skip(db))]
    pub async fn create_transaction(
        db: &Database,
        title: String,
        value: f64,
        kind: TransactionType,
        category: String,
    ) -> Result<Transaction, TransactionError> {
        let req = CreateTransactionRequest::new(&title, value, kind, &category)
            .map_err(TransactionError::InvalidInput)?;

        let balance = Self::get_balance(db).await?;
        if req.kind() == TransactionType::Outcome && !balance.covers(req.value()) {
            tracing::warn!(
                "Rejected outcome of {} with balance total {}",
                req.value(),
                balance.total
            );
            return Err(TransactionError::InsufficientBalance);
        }

        let category = CategoryService::find_or_create(db, req.category()).await?;

        let mut uow = db.begin().await?;
        let mut repo = TransactionRepository::new(uow.connection());

        let transaction = repo
            .create(&NewTransaction::from_request(&req, category.id))
            .await?;

        uow.commit().await?;

        Ok(transaction)
    }

    /// All transactions together with the balance computed over them.
    #[instrument(skip(db))]
    pub async fn list_transactions(db: &Database) -> Result<TransactionsResponse, TransactionError> {
        let mut uow = db.begin().await?;
        let mut repo = TransactionRepository::new(uow.connection());

        let transactions = repo.list().await?;
        let balance = Balance::from_transactions(&transactions);

        Ok(TransactionsResponse { transactions, balance })
    }

    #[instrument(skip(db))]
    pub async fn get_balance(db: &Database) -> Result<Balance, TransactionError> {
        let mut uow = db.begin().await?;
        let mut repo = TransactionRepository::new(uow.connection());

        let transactions = repo.list().await?;

        Ok(Balance::from_transactions(&transactions))
    }

    /// Deleting an id that does not exist is not an error.
    #[instrument(skip(db))]
    pub async fn delete_transaction(db: &Database, id: Uuid) -> Result<(), TransactionError> {
        let mut uow = db.begin().await?;
        let mut repo = TransactionRepository::new(uow.connection());

        let deleted = repo.delete(id).await?;

        uow.commit().await?;

        if deleted == 0 {
            tracing::info!("No transaction with id {}; nothing deleted", id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use database::get_test_db;

    async fn create(
        db: &Database,
        title: &str,
        value: f64,
        kind: TransactionType,
        category: &str,
    ) -> Result<Transaction, TransactionError> {
        TransactionService::create_transaction(db, title.into(), value, kind, category.into()).await
    }

    #[tokio::test]
    async fn test_empty_balance() {
        let db = get_test_db().await;
        let balance = TransactionService::get_balance(&db).await.unwrap();
        assert_eq!(balance, Balance::default());
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let db = get_test_db().await;

        let created = create(&db, "Salary", 5000.0, TransactionType::Income, "Job").await.unwrap();
        assert_eq!(created.title, "Salary");

        let listed = TransactionService::list_transactions(&db).await.unwrap();
        assert_eq!(listed.transactions.len(), 1);
        assert_eq!(listed.transactions[0].id, created.id);
        assert_eq!(listed.transactions[0].category_id, created.category_id);
        assert_eq!(listed.balance.total, 5000.0);
    }

    #[tokio::test]
    async fn test_outcome_equal_to_total_succeeds() {
        let db = get_test_db().await;
        create(&db, "Salary", 100.0, TransactionType::Income, "Job").await.unwrap();

        create(&db, "Rent", 100.0, TransactionType::Outcome, "Housing").await.unwrap();

        let balance = TransactionService::get_balance(&db).await.unwrap();
        assert_eq!(balance.total, 0.0);
    }

    #[tokio::test]
    async fn test_outcome_above_total_fails() {
        let db = get_test_db().await;
        create(&db, "Salary", 100.0, TransactionType::Income, "Job").await.unwrap();

        let err = create(&db, "Rent", 101.0, TransactionType::Outcome, "Housing").await;
        assert!(matches!(err, Err(TransactionError::InsufficientBalance)));

        // Nothing was written, not even the category.
        let listed = TransactionService::list_transactions(&db).await.unwrap();
        assert_eq!(listed.transactions.len(), 1);
        let categories = CategoryService::list_categories(&db).await.unwrap();
        assert_eq!(categories.len(), 1);
    }

    #[tokio::test]
    async fn test_zero_outcome_on_empty_ledger() {
        let db = get_test_db().await;
        create(&db, "Nothing", 0.0, TransactionType::Outcome, "Misc").await.unwrap();
    }

    #[tokio::test]
    async fn test_category_is_created_once_and_reused() {
        let db = get_test_db().await;

        let first = create(&db, "Salary", 10.0, TransactionType::Income, "Job").await.unwrap();
        let second = create(&db, "Bonus", 5.0, TransactionType::Income, "Job").await.unwrap();
        assert_eq!(first.category_id, second.category_id);

        let categories = CategoryService::list_categories(&db).await.unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].id, first.category_id);
        assert_eq!(categories[0].title, "Job");
    }

    #[tokio::test]
    async fn test_invalid_input_is_rejected() {
        let db = get_test_db().await;
        let err = create(&db, "", 10.0, TransactionType::Income, "Job").await;
        assert!(matches!(err, Err(TransactionError::InvalidInput(_))));

        let err = create(&db, "Salary", -10.0, TransactionType::Income, "Job").await;
        assert!(matches!(err, Err(TransactionError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_delete_transaction() {
        let db = get_test_db().await;
        let t = create(&db, "Salary", 10.0, TransactionType::Income, "Job").await.unwrap();

        TransactionService::delete_transaction(&db, t.id).await.unwrap();
        let listed = TransactionService::list_transactions(&db).await.unwrap();
        assert!(listed.transactions.iter().all(|x| x.id != t.id));
    }

    #[tokio::test]
    async fn test_delete_unknown_id_is_ok() {
        let db = get_test_db().await;
        create(&db, "Salary", 10.0, TransactionType::Income, "Job").await.unwrap();

        TransactionService::delete_transaction(&db, Uuid::new_v4()).await.unwrap();

        let listed = TransactionService::list_transactions(&db).await.unwrap();
        assert_eq!(listed.transactions.len(), 1);
    }
}
