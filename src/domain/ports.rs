use super::card::{Amount, Card, CardId, CardNumber};
use super::transaction::{HistoryScope, NewTransaction, Page, PageRequest, TransactionRecord};
use crate::error::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::time::Duration;

pub type LedgerStoreBox = Box<dyn LedgerStore>;
pub type LedgerUnitBox = Box<dyn LedgerUnit>;

/// Storage contract for cards and transaction records.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn card(&self, id: CardId) -> Result<Option<Card>>;
    async fn card_by_number(&self, number: &CardNumber) -> Result<Option<Card>>;

    /// Seeding/administrative path; card CRUD otherwise lives outside this
    /// crate.
    async fn insert_card(&self, card: Card) -> Result<()>;
    async fn all_cards(&self) -> Result<Vec<Card>>;

    /// Takes exclusive locks on the given cards and returns a unit of work
    /// over fresh copies of them.
    ///
    /// Locks are acquired in ascending card-id order regardless of the order
    /// of `ids`, so two transfers touching the same cards in opposite roles
    /// cannot deadlock. Waiting longer than `timeout` for any lock fails with
    /// [`crate::error::TransferError::Contention`].
    async fn lock_cards(&self, ids: &[CardId], timeout: Duration) -> Result<LedgerUnitBox>;

    /// Newest-first page of transaction records visible in `scope`.
    async fn transaction_history(
        &self,
        scope: HistoryScope,
        page: PageRequest,
    ) -> Result<Page<TransactionRecord>>;
}

/// One atomic unit of work over a set of locked cards.
///
/// Mutations are staged on private copies; nothing is visible to other
/// callers until [`LedgerUnit::commit`]. Dropping the unit without
/// committing releases the locks and discards every staged write.
#[async_trait]
pub trait LedgerUnit: Send {
    /// Current (locked) state of a card in this unit.
    fn card(&self, id: CardId) -> Result<&Card>;

    fn debit(&mut self, id: CardId, amount: Amount) -> Result<()>;
    fn credit(&mut self, id: CardId, amount: Decimal) -> Result<()>;

    /// Publishes all staged balance writes together with exactly one
    /// transaction record, all-or-nothing.
    async fn commit(self: Box<Self>, record: NewTransaction) -> Result<TransactionRecord>;
}
