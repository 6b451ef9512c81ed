use crate::domain::card::UserId;
use crate::domain::commission::{self, CommissionConfig};
use crate::domain::ports::LedgerStoreBox;
use crate::domain::transaction::{NewTransaction, TransactionRecord, TransferRequest, transfer_description};
use crate::error::{Result, TransferError};
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// The card-to-card transfer engine.
///
/// Validates a request against business rules, resolves the commission, and
/// applies the balance mutations plus one transaction record as a single
/// atomic unit. Each `transfer` call is one logical unit of work; the engine
/// performs no internal parallelism and no internal retries.
pub struct TransferEngine {
    ledger: LedgerStoreBox,
    commission: CommissionConfig,
    lock_timeout: Duration,
}

impl TransferEngine {
    /// Creates an engine over `ledger` with the given commission settings.
    ///
    /// The configuration is captured here and used unchanged for every stage
    /// of every transfer, so validation and application always agree on the
    /// rate.
    pub fn new(ledger: LedgerStoreBox, commission: CommissionConfig) -> Self {
        Self {
            ledger,
            commission,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Overrides how long a transfer may wait for card locks before failing
    /// with a retryable contention error.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Executes one transfer on behalf of `initiator`.
    ///
    /// On success returns the committed transaction record. On any error the
    /// ledger is left exactly as it was: rejections happen before any
    /// mutation, and a failed apply discards all staged writes.
    pub async fn transfer(
        &self,
        initiator: UserId,
        request: TransferRequest,
    ) -> Result<TransactionRecord> {
        // Ordered validation; the first failing check decides the error.
        let source = self
            .ledger
            .card(request.from_card)
            .await?
            .filter(|card| card.user_id == initiator)
            .ok_or(TransferError::UnauthorizedSource)?;
        let destination = self
            .ledger
            .card_by_number(&request.to_card)
            .await?
            .ok_or(TransferError::DestinationNotFound)?;
        if source.id == destination.id {
            return Err(TransferError::SelfTransfer);
        }
        if !source.active || !destination.active {
            return Err(TransferError::InactiveAccount);
        }

        let outcome =
            commission::resolve(&self.commission, request.amount, self.ledger.as_ref()).await?;
        if let Some(beneficiary) = &outcome.beneficiary
            && (beneficiary.id == source.id || beneficiary.id == destination.id)
        {
            return Err(TransferError::CommissionConflict);
        }

        let gross = request.amount.value();
        let net = gross - outcome.amount;

        let mut ids = vec![source.id, destination.id];
        if let Some(beneficiary) = &outcome.beneficiary {
            ids.push(beneficiary.id);
        }
        let mut unit = self
            .ledger
            .lock_cards(&ids, self.lock_timeout)
            .await
            .inspect_err(|err| {
                if matches!(err, TransferError::Contention) {
                    warn!(from = %source.number, to = %destination.number, "card locks contended");
                }
            })?;

        // Sufficiency is decided on the balance seen under the locks, never
        // on the validation-time read.
        if unit.card(source.id)?.balance.0 < gross {
            return Err(TransferError::InsufficientBalance);
        }

        unit.debit(source.id, request.amount)?;
        if net > Decimal::ZERO {
            unit.credit(destination.id, net)?;
        }
        if let Some(beneficiary) = &outcome.beneficiary
            && outcome.amount > Decimal::ZERO
        {
            unit.credit(beneficiary.id, outcome.amount)?;
        }

        let description = transfer_description(&source.number, &destination.number, outcome.amount);
        let record = unit
            .commit(NewTransaction {
                from_card: source.id,
                to_card: destination.id,
                amount: gross,
                description,
            })
            .await?;

        debug!(
            tx = record.id,
            from = %source.number,
            to = %destination.number,
            %gross,
            commission = %outcome.amount,
            "transfer committed"
        );
        Ok(record)
    }

    /// Consumes the engine and returns the final state of all cards.
    pub async fn into_results(self) -> Result<Vec<crate::domain::card::Card>> {
        self.ledger.all_cards().await
    }
}
