use super::card::{Amount, CardId, CardNumber, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A validated transfer request.
///
/// Can only be built from already-validated [`CardNumber`] and [`Amount`]
/// values, so the engine never sees a malformed shape. Consumed by one
/// `transfer` call and discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    pub from_card: CardId,
    pub to_card: CardNumber,
    pub amount: Amount,
}

impl TransferRequest {
    pub fn new(from_card: CardId, to_card: CardNumber, amount: Amount) -> Self {
        Self {
            from_card,
            to_card,
            amount,
        }
    }
}

/// A transaction record about to be persisted, before the store assigns an
/// id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub from_card: CardId,
    pub to_card: CardId,
    /// Gross amount debited from the sender.
    pub amount: Decimal,
    pub description: String,
}

/// An immutable record of one committed transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: u64,
    pub from_card: CardId,
    pub to_card: CardId,
    /// Gross amount debited from the sender.
    pub amount: Decimal,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Builds the human-readable summary stored with each transaction.
pub fn transfer_description(from: &CardNumber, to: &CardNumber, commission: Decimal) -> String {
    let mut description = format!("Transfer from {from} to {to}");
    if commission > Decimal::ZERO {
        description.push_str(&format!(". Commission: {commission:.2}"));
    }
    description
}

/// Which transactions a history query may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryScope {
    /// Every transaction (administrative view).
    All,
    /// Only transactions touching one of the user's cards.
    User(UserId),
}

/// 1-based pagination request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub per_page: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
        }
    }
}

/// One page of history results, newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
}

impl<T> Page<T> {
    /// Slices a full newest-first result set down to the requested page.
    pub fn from_all(mut all: Vec<T>, request: PageRequest) -> Self {
        let total = all.len();
        let page = request.page.max(1);
        let per_page = request.per_page.max(1);
        let start = (page - 1).saturating_mul(per_page).min(total);
        let end = start.saturating_add(per_page).min(total);
        let items = all.drain(start..end).collect();
        Self {
            items,
            page,
            per_page,
            total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_description_without_commission() {
        let from = CardNumber::parse("4000000000000001").unwrap();
        let to = CardNumber::parse("4000000000000002").unwrap();
        assert_eq!(
            transfer_description(&from, &to, Decimal::ZERO),
            "Transfer from 4000000000000001 to 4000000000000002"
        );
    }

    #[test]
    fn test_description_with_commission() {
        let from = CardNumber::parse("4000000000000001").unwrap();
        let to = CardNumber::parse("4000000000000002").unwrap();
        assert_eq!(
            transfer_description(&from, &to, dec!(2.5)),
            "Transfer from 4000000000000001 to 4000000000000002. Commission: 2.50"
        );
    }

    #[test]
    fn test_page_slicing() {
        let all: Vec<u32> = (0..25).collect();
        let page = Page::from_all(
            all.clone(),
            PageRequest {
                page: 3,
                per_page: 10,
            },
        );
        assert_eq!(page.items, vec![20, 21, 22, 23, 24]);
        assert_eq!(page.total, 25);

        let past_end = Page::from_all(
            all,
            PageRequest {
                page: 5,
                per_page: 10,
            },
        );
        assert!(past_end.items.is_empty());
        assert_eq!(past_end.total, 25);
    }
}
