use crate::domain::ports::LedgerStoreBox;
use crate::domain::transaction::{HistoryScope, Page, PageRequest, TransactionRecord};
use crate::error::Result;

/// Read-only paginated view over recorded transactions.
///
/// Consumes what the engine commits; never mutates anything.
pub struct TransactionHistory {
    ledger: LedgerStoreBox,
}

impl TransactionHistory {
    pub fn new(ledger: LedgerStoreBox) -> Self {
        Self { ledger }
    }

    /// Newest-first page of records visible in `scope`.
    pub async fn list(
        &self,
        scope: HistoryScope,
        page: PageRequest,
    ) -> Result<Page<TransactionRecord>> {
        self.ledger.transaction_history(scope, page).await
    }
}
