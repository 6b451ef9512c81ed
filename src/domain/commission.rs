use super::card::{Amount, Card, CardNumber};
use super::ports::LedgerStore;
use crate::error::{Result, TransferError};
use rust_decimal::{Decimal, RoundingStrategy};

/// Commission settings injected into the engine at construction.
///
/// The same configuration value is used for the whole transfer, so the rate
/// seen during validation is the rate that gets applied.
#[derive(Debug, Clone, PartialEq)]
pub struct CommissionConfig {
    rate: Decimal,
    beneficiary: Option<CardNumber>,
}

impl CommissionConfig {
    pub fn new(rate: Decimal, beneficiary: Option<CardNumber>) -> Result<Self> {
        if rate < Decimal::ZERO {
            return Err(TransferError::InvalidCommissionRate);
        }
        Ok(Self { rate, beneficiary })
    }

    /// Commission disabled: rate 0, no beneficiary.
    pub fn disabled() -> Self {
        Self {
            rate: Decimal::ZERO,
            beneficiary: None,
        }
    }

    pub fn rate(&self) -> Decimal {
        self.rate
    }
}

impl Default for CommissionConfig {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Outcome of commission resolution for one transfer. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct CommissionOutcome {
    pub rate: Decimal,
    /// Fee skimmed off the gross amount; 0 ≤ amount ≤ gross.
    pub amount: Decimal,
    /// Present only when a fee is actually charged.
    pub beneficiary: Option<Card>,
}

impl CommissionOutcome {
    fn none() -> Self {
        Self {
            rate: Decimal::ZERO,
            amount: Decimal::ZERO,
            beneficiary: None,
        }
    }
}

/// Fee for `gross` at `rate`, rounded half-up to 2 decimals and clamped
/// into `[0, gross]`.
pub fn commission_amount(gross: Decimal, rate: Decimal) -> Decimal {
    let raw = (gross * rate).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    if raw < Decimal::ZERO {
        Decimal::ZERO
    } else if raw >= gross {
        // Fee swallows the whole transfer; the receiver gets nothing.
        gross
    } else {
        raw
    }
}

/// Resolves the commission for one transfer.
///
/// With a zero rate no beneficiary lookup is performed. With a positive rate
/// the configured beneficiary must exist and be active. The ledger is only
/// read, never mutated.
pub async fn resolve(
    config: &CommissionConfig,
    amount: Amount,
    ledger: &dyn LedgerStore,
) -> Result<CommissionOutcome> {
    if config.rate.is_zero() {
        return Ok(CommissionOutcome::none());
    }

    let number = config
        .beneficiary
        .as_ref()
        .ok_or(TransferError::CommissionNotConfigured)?;
    let beneficiary = ledger
        .card_by_number(number)
        .await?
        .ok_or(TransferError::BeneficiaryNotFound)?;
    if !beneficiary.active {
        return Err(TransferError::BeneficiaryInactive);
    }

    Ok(CommissionOutcome {
        rate: config.rate,
        amount: commission_amount(amount.value(), config.rate),
        beneficiary: Some(beneficiary),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::card::Balance;
    use crate::infrastructure::in_memory::InMemoryLedger;
    use rust_decimal_macros::dec;

    fn number(s: &str) -> CardNumber {
        CardNumber::parse(s).unwrap()
    }

    #[test]
    fn test_commission_rounds_half_up() {
        assert_eq!(commission_amount(dec!(40.00), dec!(0.05)), dec!(2.00));
        // 12.34 * 0.015 = 0.1851 -> 0.19
        assert_eq!(commission_amount(dec!(12.34), dec!(0.015)), dec!(0.19));
        // 0.01 * 0.5 = 0.005 rounds up to 0.01
        assert_eq!(commission_amount(dec!(0.01), dec!(0.5)), dec!(0.01));
    }

    #[test]
    fn test_commission_clamps_to_gross() {
        assert_eq!(commission_amount(dec!(10.00), dec!(1.5)), dec!(10.00));
        assert_eq!(commission_amount(dec!(10.00), dec!(1.0)), dec!(10.00));
    }

    #[test]
    fn test_negative_commission_clamps_to_zero() {
        assert_eq!(commission_amount(dec!(10.00), dec!(-0.1)), dec!(0.00));
    }

    #[test]
    fn test_config_rejects_negative_rate() {
        assert!(matches!(
            CommissionConfig::new(dec!(-0.01), None),
            Err(TransferError::InvalidCommissionRate)
        ));
    }

    #[tokio::test]
    async fn test_zero_rate_skips_lookup() {
        // Beneficiary configured but the rate is 0: no lookup, no error even
        // though the card does not exist.
        let ledger = InMemoryLedger::new();
        let config =
            CommissionConfig::new(Decimal::ZERO, Some(number("4000000000000099"))).unwrap();
        let outcome = resolve(&config, Amount::new(dec!(10.00)).unwrap(), &ledger)
            .await
            .unwrap();
        assert_eq!(outcome.amount, Decimal::ZERO);
        assert!(outcome.beneficiary.is_none());
    }

    #[tokio::test]
    async fn test_missing_beneficiary_number() {
        let ledger = InMemoryLedger::new();
        let config = CommissionConfig::new(dec!(0.05), None).unwrap();
        let result = resolve(&config, Amount::new(dec!(10.00)).unwrap(), &ledger).await;
        assert!(matches!(result, Err(TransferError::CommissionNotConfigured)));
    }

    #[tokio::test]
    async fn test_unknown_beneficiary_card() {
        let ledger = InMemoryLedger::new();
        let config = CommissionConfig::new(dec!(0.05), Some(number("4000000000000099"))).unwrap();
        let result = resolve(&config, Amount::new(dec!(10.00)).unwrap(), &ledger).await;
        assert!(matches!(result, Err(TransferError::BeneficiaryNotFound)));
    }

    #[tokio::test]
    async fn test_inactive_beneficiary_card() {
        let ledger = InMemoryLedger::new();
        let mut card = Card::new(9, 9, number("4000000000000099"), Balance::ZERO);
        card.active = false;
        ledger.insert_card(card).await.unwrap();

        let config = CommissionConfig::new(dec!(0.05), Some(number("4000000000000099"))).unwrap();
        let result = resolve(&config, Amount::new(dec!(10.00)).unwrap(), &ledger).await;
        assert!(matches!(result, Err(TransferError::BeneficiaryInactive)));
    }
}
