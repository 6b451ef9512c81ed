use crate::domain::card::{Amount, Card, CardId, CardNumber, UserId};
use crate::domain::ports::{LedgerStore, LedgerUnit, LedgerUnitBox};
use crate::domain::transaction::{
    HistoryScope, NewTransaction, Page, PageRequest, TransactionRecord,
};
use crate::error::{Result, TransferError};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::time::timeout;

/// A thread-safe in-memory ledger.
///
/// Card state lives in an `Arc<RwLock<HashMap>>`; exclusive per-card access
/// for transfers goes through a registry of per-card `tokio::sync::Mutex`es.
/// `Clone` shares the underlying state. Ideal for tests and small setups
/// where persistence is not required.
#[derive(Clone)]
pub struct InMemoryLedger {
    cards: Arc<RwLock<HashMap<CardId, Card>>>,
    transactions: Arc<RwLock<Vec<TransactionRecord>>>,
    locks: Arc<std::sync::Mutex<HashMap<CardId, Arc<Mutex<()>>>>>,
    next_tx_id: Arc<AtomicU64>,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            cards: Arc::default(),
            transactions: Arc::default(),
            locks: Arc::default(),
            next_tx_id: Arc::new(AtomicU64::new(1)),
        }
    }

    fn card_lock(&self, id: CardId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(id).or_default())
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn card(&self, id: CardId) -> Result<Option<Card>> {
        let cards = self.cards.read().await;
        Ok(cards.get(&id).cloned())
    }

    async fn card_by_number(&self, number: &CardNumber) -> Result<Option<Card>> {
        let cards = self.cards.read().await;
        Ok(cards.values().find(|c| &c.number == number).cloned())
    }

    async fn insert_card(&self, card: Card) -> Result<()> {
        let mut cards = self.cards.write().await;
        cards.insert(card.id, card);
        Ok(())
    }

    async fn all_cards(&self) -> Result<Vec<Card>> {
        let cards = self.cards.read().await;
        let mut all: Vec<Card> = cards.values().cloned().collect();
        all.sort_by_key(|c| c.id);
        Ok(all)
    }

    async fn lock_cards(&self, ids: &[CardId], wait: Duration) -> Result<LedgerUnitBox> {
        // Ascending id order prevents deadlock between overlapping transfers.
        let mut ordered: Vec<CardId> = ids.to_vec();
        ordered.sort_unstable();
        ordered.dedup();

        let mut guards = Vec::with_capacity(ordered.len());
        for id in &ordered {
            let lock = self.card_lock(*id);
            let guard = timeout(wait, lock.lock_owned())
                .await
                .map_err(|_| TransferError::Contention)?;
            guards.push(guard);
        }

        // Fresh reads under the locks; validation-time snapshots are stale
        // by definition.
        let mut staged = HashMap::with_capacity(ordered.len());
        {
            let cards = self.cards.read().await;
            for id in &ordered {
                let card = cards.get(id).ok_or_else(|| {
                    TransferError::storage(io::Error::new(
                        io::ErrorKind::NotFound,
                        format!("card {id} disappeared before locking"),
                    ))
                })?;
                staged.insert(*id, card.clone());
            }
        }

        Ok(Box::new(InMemoryUnit {
            cards: Arc::clone(&self.cards),
            transactions: Arc::clone(&self.transactions),
            next_tx_id: Arc::clone(&self.next_tx_id),
            staged,
            _guards: guards,
        }))
    }

    async fn transaction_history(
        &self,
        scope: HistoryScope,
        page: PageRequest,
    ) -> Result<Page<TransactionRecord>> {
        let visible_cards: Option<HashSet<CardId>> = match scope {
            HistoryScope::All => None,
            HistoryScope::User(user_id) => Some(user_cards(&*self.cards.read().await, user_id)),
        };

        let transactions = self.transactions.read().await;
        let mut records: Vec<TransactionRecord> = transactions
            .iter()
            .filter(|r| match &visible_cards {
                None => true,
                Some(cards) => cards.contains(&r.from_card) || cards.contains(&r.to_card),
            })
            .cloned()
            .collect();
        records.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(Page::from_all(records, page))
    }
}

fn user_cards(cards: &HashMap<CardId, Card>, user_id: UserId) -> HashSet<CardId> {
    cards
        .values()
        .filter(|c| c.user_id == user_id)
        .map(|c| c.id)
        .collect()
}

/// Unit of work over locked in-memory cards.
///
/// Holds the per-card lock guards for its whole lifetime; dropping it
/// without commit releases them and discards the staged copies.
struct InMemoryUnit {
    cards: Arc<RwLock<HashMap<CardId, Card>>>,
    transactions: Arc<RwLock<Vec<TransactionRecord>>>,
    next_tx_id: Arc<AtomicU64>,
    staged: HashMap<CardId, Card>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl InMemoryUnit {
    fn staged_mut(&mut self, id: CardId) -> Result<&mut Card> {
        self.staged.get_mut(&id).ok_or_else(|| {
            TransferError::storage(io::Error::new(
                io::ErrorKind::NotFound,
                format!("card {id} is not part of this unit"),
            ))
        })
    }
}

#[async_trait]
impl LedgerUnit for InMemoryUnit {
    fn card(&self, id: CardId) -> Result<&Card> {
        self.staged.get(&id).ok_or_else(|| {
            TransferError::storage(io::Error::new(
                io::ErrorKind::NotFound,
                format!("card {id} is not part of this unit"),
            ))
        })
    }

    fn debit(&mut self, id: CardId, amount: Amount) -> Result<()> {
        self.staged_mut(id)?.debit(amount)
    }

    fn credit(&mut self, id: CardId, amount: Decimal) -> Result<()> {
        self.staged_mut(id)?.credit(amount)
    }

    async fn commit(self: Box<Self>, record: NewTransaction) -> Result<TransactionRecord> {
        let Self {
            cards,
            transactions,
            next_tx_id,
            staged,
            _guards,
        } = *self;

        let committed = TransactionRecord {
            id: next_tx_id.fetch_add(1, Ordering::SeqCst),
            from_card: record.from_card,
            to_card: record.to_card,
            amount: record.amount,
            description: record.description,
            created_at: Utc::now(),
        };

        // Single write-lock scope: balances and the record become visible
        // together. The per-card guards are still held here.
        let mut cards = cards.write().await;
        let mut transactions = transactions.write().await;
        for (id, card) in staged {
            cards.insert(id, card);
        }
        transactions.push(committed.clone());

        Ok(committed)
    }
}
