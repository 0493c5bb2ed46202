//! Bulk import of transactions from an uploaded CSV file.
//!
//! Expected layout, header row first:
//!
//! ```text
//! title,type,value,category
//! Salary,income,5000,Job
//! Rent,outcome,1200,Housing
//! ```

use crate::models::{CreateTransactionRequest, NewTransaction, Transaction, TransactionType};
use crate::repository::TransactionRepository;
use crate::service::TransactionError;
use categories::service::CategoryService;
use database::Database;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::instrument;

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("{0} does not exist")]
    FileNotFound(PathBuf),
    #[error("could not read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("line {line}: {message}")]
    InvalidRow { line: u64, message: String },
}

impl From<ImportError> for TransactionError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::FileNotFound(_) | ImportError::Io(_) => {
                tracing::error!("Could not import CSV: {}", err);
                TransactionError::Import("Could not import CSV".to_string())
            }
            ImportError::Csv(_) | ImportError::InvalidRow { .. } => {
                TransactionError::InvalidInput(err.to_string())
            }
        }
    }
}

const FIELDS: usize = 4;

/// Parses every data row. The first invalid row rejects the whole file.
/// Text that is not valid UTF-8 is reported as a malformed CSV.
pub fn parse_csv(contents: impl AsRef<[u8]>) -> Result<Vec<CreateTransactionRequest>, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(contents.as_ref());

    let mut rows = Vec::new();

    for result in reader.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();

        if record.iter().all(str::is_empty) {
            continue;
        }

        if record.len() < FIELDS {
            return Err(ImportError::InvalidRow {
                line,
                message: format!(
                    "expected {FIELDS} fields (title, type, value, category), found {}",
                    record.len()
                ),
            });
        }

        let kind = record[1]
            .parse::<TransactionType>()
            .map_err(|message| ImportError::InvalidRow { line, message })?;

        let value = record[2].parse::<f64>().map_err(|_| ImportError::InvalidRow {
            line,
            message: format!("value {:?} is not a number", &record[2]),
        })?;

        let req = CreateTransactionRequest::new(&record[0], value, kind, &record[3])
            .map_err(|message| ImportError::InvalidRow { line, message })?;

        rows.push(req);
    }

    Ok(rows)
}

pub struct ImportService;

impl ImportService {
    /// Imports the CSV at `path`.
    ///
    /// Once read, the file is moved out of `path` into `failed_dir`. It is
    /// deleted from there when the import succeeds and left in place for a
    /// retry when it does not.
    #[instrument(skip(db))]
    pub async fn import_file(
        db: &Database,
        path: &Path,
        failed_dir: &Path,
    ) -> Result<Vec<Transaction>, TransactionError> {
        if !fs::try_exists(path).await.unwrap_or(false) {
            return Err(ImportError::FileNotFound(path.to_path_buf()).into());
        }

        let contents = fs::read(path).await.map_err(ImportError::from)?;
        let retained = set_aside(path, failed_dir).await;

        match Self::import_csv(db, &contents).await {
            Ok(transactions) => {
                if let Some(copy) = &retained {
                    if let Err(e) = fs::remove_file(copy).await {
                        tracing::warn!("Could not remove imported file {}: {}", copy.display(), e);
                    }
                }
                tracing::info!("Imported {} transactions", transactions.len());
                Ok(transactions)
            }
            Err(e) => {
                if let Some(copy) = &retained {
                    tracing::warn!("Import failed, source kept at {}: {}", copy.display(), e);
                }
                Err(e)
            }
        }
    }

    /// Parses `contents`, creates any categories it names that do not exist
    /// yet and inserts all rows in one batch.
    #[instrument(skip(db, contents))]
    pub async fn import_csv(db: &Database, contents: &[u8]) -> Result<Vec<Transaction>, TransactionError> {
        let rows = parse_csv(contents)?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let categories = CategoryService::resolve_titles(db, rows.iter().map(|r| r.category())).await?;

        let new = rows
            .iter()
            .map(|row| {
                categories
                    .get(row.category())
                    .map(|c| NewTransaction::from_request(row, c.id))
                    .ok_or_else(|| {
                        TransactionError::Infrastructure(format!(
                            "category {:?} was not resolved",
                            row.category()
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut uow = db.begin().await?;
        let mut repo = TransactionRepository::new(uow.connection());

        let transactions = repo.create_many(&new).await?;

        uow.commit().await?;

        Ok(transactions)
    }
}

/// Moves the source out of the upload location. Falls back to deleting it
/// when it cannot be moved, so it never outlives the read.
async fn set_aside(path: &Path, failed_dir: &Path) -> Option<PathBuf> {
    let target = path.file_name().map(|name| failed_dir.join(name));

    if let Some(target) = target {
        let moved = match fs::create_dir_all(failed_dir).await {
            Ok(()) => fs::rename(path, &target).await,
            Err(e) => Err(e),
        };
        match moved {
            Ok(()) => return Some(target),
            Err(e) => tracing::warn!("Could not move {} aside: {}", path.display(), e),
        }
    }

    if let Err(e) = fs::remove_file(path).await {
        tracing::warn!("Could not remove {}: {}", path.display(), e);
    }
    None
}
