use crate::domain::card::{Amount, Card, CardId, CardNumber, UserId};
use crate::domain::ports::{LedgerStore, LedgerUnit, LedgerUnitBox};
use crate::domain::transaction::{
    HistoryScope, NewTransaction, Page, PageRequest, TransactionRecord,
};
use crate::error::{Result, TransferError};
use async_trait::async_trait;
use chrono::Utc;
use rocksdb::{ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::timeout;

/// Column family for card states.
pub const CF_CARDS: &str = "cards";
/// Column family for transaction records.
pub const CF_TRANSACTIONS: &str = "transactions";

/// A persistent ledger backed by RocksDB.
///
/// Cards and transaction records live in separate column families as
/// serde_json values. Balance writes and the transaction record of one
/// transfer go through a single `WriteBatch`, so a commit is all-or-nothing.
/// Exclusive per-card access uses the same in-process lock registry as the
/// in-memory ledger; the store is meant to be shared by cloning within one
/// process.
#[derive(Clone)]
pub struct RocksDbLedger {
    db: Arc<DB>,
    locks: Arc<std::sync::Mutex<HashMap<CardId, Arc<Mutex<()>>>>>,
    next_tx_id: Arc<AtomicU64>,
}

fn cf_missing(name: &str) -> TransferError {
    TransferError::storage(io::Error::other(format!("column family {name} not found")))
}

impl RocksDbLedger {
    /// Opens or creates a RocksDB ledger at `path`, ensuring both column
    /// families exist and seeding the transaction id counter from the
    /// existing records.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_cards = ColumnFamilyDescriptor::new(CF_CARDS, Options::default());
        let cf_transactions = ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Options::default());

        let db = DB::open_cf_descriptors(&opts, path, vec![cf_cards, cf_transactions])
            .map_err(TransferError::storage)?;

        let mut max_id = 0u64;
        {
            let cf = db.cf_handle(CF_TRANSACTIONS).ok_or_else(|| cf_missing(CF_TRANSACTIONS))?;
            for item in db.iterator_cf(&cf, IteratorMode::End) {
                let (key, _) = item.map_err(TransferError::storage)?;
                if let Ok(bytes) = <[u8; 8]>::try_from(key.as_ref()) {
                    max_id = u64::from_be_bytes(bytes);
                }
                break;
            }
        }

        Ok(Self {
            db: Arc::new(db),
            locks: Arc::default(),
            next_tx_id: Arc::new(AtomicU64::new(max_id + 1)),
        })
    }

    fn card_lock(&self, id: CardId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(id).or_default())
    }

    fn read_card(&self, id: CardId) -> Result<Option<Card>> {
        let cf = self.db.cf_handle(CF_CARDS).ok_or_else(|| cf_missing(CF_CARDS))?;
        match self
            .db
            .get_cf(&cf, id.to_be_bytes())
            .map_err(TransferError::storage)?
        {
            Some(bytes) => {
                let card = serde_json::from_slice(&bytes).map_err(TransferError::storage)?;
                Ok(Some(card))
            }
            None => Ok(None),
        }
    }

    fn scan_cards(&self) -> Result<Vec<Card>> {
        let cf = self.db.cf_handle(CF_CARDS).ok_or_else(|| cf_missing(CF_CARDS))?;
        let mut cards = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item.map_err(TransferError::storage)?;
            cards.push(serde_json::from_slice(&value).map_err(TransferError::storage)?);
        }
        Ok(cards)
    }

    fn scan_transactions(&self) -> Result<Vec<TransactionRecord>> {
        let cf = self
            .db
            .cf_handle(CF_TRANSACTIONS)
            .ok_or_else(|| cf_missing(CF_TRANSACTIONS))?;
        let mut records = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item.map_err(TransferError::storage)?;
            records.push(serde_json::from_slice(&value).map_err(TransferError::storage)?);
        }
        Ok(records)
    }
}

#[async_trait]
impl LedgerStore for RocksDbLedger {
    async fn card(&self, id: CardId) -> Result<Option<Card>> {
        self.read_card(id)
    }

    async fn card_by_number(&self, number: &CardNumber) -> Result<Option<Card>> {
        Ok(self.scan_cards()?.into_iter().find(|c| &c.number == number))
    }

    async fn insert_card(&self, card: Card) -> Result<()> {
        let cf = self.db.cf_handle(CF_CARDS).ok_or_else(|| cf_missing(CF_CARDS))?;
        let value = serde_json::to_vec(&card).map_err(TransferError::storage)?;
        self.db
            .put_cf(&cf, card.id.to_be_bytes(), value)
            .map_err(TransferError::storage)?;
        Ok(())
    }

    async fn all_cards(&self) -> Result<Vec<Card>> {
        let mut cards = self.scan_cards()?;
        cards.sort_by_key(|c| c.id);
        Ok(cards)
    }

    async fn lock_cards(&self, ids: &[CardId], wait: Duration) -> Result<LedgerUnitBox> {
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

        let mut staged = HashMap::with_capacity(ordered.len());
        for id in &ordered {
            let card = self.read_card(*id)?.ok_or_else(|| {
                TransferError::storage(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("card {id} disappeared before locking"),
                ))
            })?;
            staged.insert(*id, card);
        }

        Ok(Box::new(RocksDbUnit {
            db: Arc::clone(&self.db),
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
            HistoryScope::User(user_id) => Some(user_cards(self.scan_cards()?, user_id)),
        };

        let mut records: Vec<TransactionRecord> = self
            .scan_transactions()?
            .into_iter()
            .filter(|r| match &visible_cards {
                None => true,
                Some(cards) => cards.contains(&r.from_card) || cards.contains(&r.to_card),
            })
            .collect();
        records.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(Page::from_all(records, page))
    }
}

fn user_cards(cards: Vec<Card>, user_id: UserId) -> HashSet<CardId> {
    cards
        .into_iter()
        .filter(|c| c.user_id == user_id)
        .map(|c| c.id)
        .collect()
}

struct RocksDbUnit {
    db: Arc<DB>,
    next_tx_id: Arc<AtomicU64>,
    staged: HashMap<CardId, Card>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl RocksDbUnit {
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
impl LedgerUnit for RocksDbUnit {
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
            db,
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

        let cf_cards = db.cf_handle(CF_CARDS).ok_or_else(|| cf_missing(CF_CARDS))?;
        let cf_transactions = db
            .cf_handle(CF_TRANSACTIONS)
            .ok_or_else(|| cf_missing(CF_TRANSACTIONS))?;

        let mut batch = WriteBatch::default();
        for (id, card) in &staged {
            let value = serde_json::to_vec(card).map_err(TransferError::storage)?;
            batch.put_cf(&cf_cards, id.to_be_bytes(), value);
        }
        let value = serde_json::to_vec(&committed).map_err(TransferError::storage)?;
        batch.put_cf(&cf_transactions, committed.id.to_be_bytes(), value);

        // Locks in _guards stay held until this returns; the batch makes the
        // balance writes and the record visible together.
        db.write(batch).map_err(TransferError::storage)?;
        Ok(committed)
    }
}
