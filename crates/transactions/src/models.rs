use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Outcome,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Outcome => "outcome",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(TransactionType::Income),
            "outcome" => Ok(TransactionType::Outcome),
            other => Err(format!(
                "Invalid transaction type {other:?}, expected \"income\" or \"outcome\""
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: Uuid,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub value: f64,
    pub category_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Totals over a set of transactions. Never stored; always recomputed.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Balance {
    pub income: f64,
    pub outcome: f64,
    pub total: f64,
}

impl Balance {
    pub fn from_transactions<'a, I>(transactions: I) -> Self
    where
        I: IntoIterator<Item = &'a Transaction>,
    {
        let (income, outcome) = transactions.into_iter().fold((0.0, 0.0), |(inc, out), t| {
            match t.kind {
                TransactionType::Income => (inc + t.value, out),
                TransactionType::Outcome => (inc, out + t.value),
            }
        });

        Self {
            income,
            outcome,
            total: income - outcome,
        }
    }

    /// Whether an outcome of `value` can be paid from the current total.
    pub fn covers(&self, value: f64) -> bool {
        value <= self.total
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionsResponse {
    pub transactions: Vec<Transaction>,
    pub balance: Balance,
}

// ENCAPSULATION: constructed only through new(), so a value of this type
// always holds trimmed, non-empty strings and a finite non-negative value.
#[derive(Debug, Clone, Validate)]
pub struct CreateTransactionRequest {
    #[validate(length(min = 1, message = "Title cannot be empty"))]
    title: String,
    #[validate(range(min = 0.0, message = "Value cannot be negative"))]
    value: f64,
    kind: TransactionType,
    #[validate(length(min = 1, message = "Category cannot be empty"))]
    category: String,
}

#[derive(Deserialize)]
pub struct RawCreateTransactionRequest {
    pub title: String,
    pub value: f64,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub category: String,
}

impl CreateTransactionRequest {
    pub fn new(
        title: &str,
        value: f64,
        kind: TransactionType,
        category: &str,
    ) -> Result<Self, String> {
        if !value.is_finite() {
            return Err("Value must be a finite number".to_string());
        }

        let req = Self {
            title: title.trim().to_string(),
            value,
            kind,
            category: category.trim().to_string(),
        };
        req.validate().map_err(|e| e.to_string())?;

        Ok(req)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn kind(&self) -> TransactionType {
        self.kind
    }

    pub fn category(&self) -> &str {
        &self.category
    }
}

impl TryFrom<RawCreateTransactionRequest> for CreateTransactionRequest {
    type Error = String;

    fn try_from(raw: RawCreateTransactionRequest) -> Result<Self, Self::Error> {
        Self::new(&raw.title, raw.value, raw.kind, &raw.category)
    }
}

/// A transaction whose category has been resolved to an id, ready to insert.
#[derive(Debug, Clone)]
pub(crate) struct NewTransaction {
    pub title: String,
    pub kind: TransactionType,
    pub value: f64,
    pub category_id: Uuid,
}

impl NewTransaction {
    pub fn from_request(req: &CreateTransactionRequest, category_id: Uuid) -> Self {
        Self {
            title: req.title().to_string(),
            kind: req.kind(),
            value: req.value(),
            category_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn transaction(kind: TransactionType, value: f64) -> Transaction {
        let now = Utc::now();
        Transaction {
            id: Uuid::new_v4(),
            title: "t".into(),
            kind,
            value,
            category_id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_balance_of_nothing_is_zero() {
        let balance = Balance::from_transactions(&Vec::<Transaction>::new());
        assert_eq!(balance, Balance { income: 0.0, outcome: 0.0, total: 0.0 });
    }

    #[test]
    fn test_balance_sums_by_type() {
        let transactions = vec![
            transaction(TransactionType::Income, 5000.0),
            transaction(TransactionType::Outcome, 1200.0),
            transaction(TransactionType::Income, 100.0),
        ];
        let balance = Balance::from_transactions(&transactions);
        assert_eq!(balance.income, 5100.0);
        assert_eq!(balance.outcome, 1200.0);
        assert_eq!(balance.total, 3900.0);
    }

    #[test]
    fn test_balance_random_sequences() {
        let mut rng = rand::thread_rng();

        for _ in 0..200 {
            let len = rng.gen_range(0..60);
            let transactions: Vec<Transaction> = (0..len)
                .map(|_| {
                    let kind = if rng.gen_bool(0.5) {
                        TransactionType::Income
                    } else {
                        TransactionType::Outcome
                    };
                    transaction(kind, rng.gen_range(0.0..10_000.0))
                })
                .collect();

            let balance = Balance::from_transactions(&transactions);

            let income: f64 = transactions
                .iter()
                .filter(|t| t.kind == TransactionType::Income)
                .map(|t| t.value)
                .sum();
            let outcome: f64 = transactions
                .iter()
                .filter(|t| t.kind == TransactionType::Outcome)
                .map(|t| t.value)
                .sum();

            assert!(balance.income >= 0.0);
            assert!(balance.outcome >= 0.0);
            assert!((balance.income - income).abs() < 1e-6);
            assert!((balance.outcome - outcome).abs() < 1e-6);
            assert_eq!(balance.total, balance.income - balance.outcome);

            let mut reversed = transactions.clone();
            reversed.reverse();
            let reversed_balance = Balance::from_transactions(&reversed);
            assert!((reversed_balance.total - balance.total).abs() < 1e-6);
        }
    }

    #[test]
    fn test_covers_is_inclusive() {
        let balance = Balance { income: 100.0, outcome: 0.0, total: 100.0 };
        assert!(balance.covers(100.0));
        assert!(!balance.covers(101.0));
    }

    #[test]
    fn test_transaction_type_parsing() {
        assert_eq!("income".parse::<TransactionType>().unwrap(), TransactionType::Income);
        assert_eq!("outcome".parse::<TransactionType>().unwrap(), TransactionType::Outcome);
        assert!("Income".parse::<TransactionType>().is_err());
        assert!("transfer".parse::<TransactionType>().is_err());
    }

    #[test]
    fn test_transaction_serializes_type_field() {
        let t = transaction(TransactionType::Outcome, 10.0);
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["type"], "outcome");
        assert!(json.get("kind").is_none());
    }

    #[test]
    fn test_create_request_trims_fields() {
        let req = CreateTransactionRequest::new(" Salary ", 10.0, TransactionType::Income, " Job ").unwrap();
        assert_eq!(req.title(), "Salary");
        assert_eq!(req.category(), "Job");
    }

    #[test]
    fn test_create_request_allows_zero() {
        assert!(CreateTransactionRequest::new("Gift", 0.0, TransactionType::Income, "Misc").is_ok());
        assert!(CreateTransactionRequest::new("Gift", 0.0, TransactionType::Outcome, "Misc").is_ok());
    }

    #[test]
    fn test_create_request_rejects_invalid_values() {
        assert!(CreateTransactionRequest::new("Rent", -1.0, TransactionType::Outcome, "Housing").is_err());
        assert!(CreateTransactionRequest::new("Rent", f64::NAN, TransactionType::Outcome, "Housing").is_err());
        assert!(CreateTransactionRequest::new("Rent", f64::INFINITY, TransactionType::Outcome, "Housing").is_err());
    }

    #[test]
    fn test_create_request_accepts_long_free_text() {
        let memo = "POS 4829 ".repeat(40);
        let req = CreateTransactionRequest::new(&memo, 12.0, TransactionType::Outcome, &memo).unwrap();
        assert_eq!(req.title(), memo.trim());
    }

    #[test]
    fn test_create_request_rejects_blank_strings() {
        assert!(CreateTransactionRequest::new("  ", 1.0, TransactionType::Income, "Job").is_err());
        assert!(CreateTransactionRequest::new("Salary", 1.0, TransactionType::Income, "").is_err());
    }
}
