use crate::error::TransferError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::str::FromStr;

pub type CardId = u64;
pub type UserId = u64;

/// A card's monetary balance.
///
/// Wrapper around `rust_decimal::Decimal` to keep financial arithmetic
/// type-safe. The engine never drives a balance below zero.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Balance(pub Decimal);

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl Add for Balance {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Balance {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl AddAssign for Balance {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Balance {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

/// A positive transfer amount with at most 2 fractional digits.
///
/// Built only through validation, so the engine never receives a malformed
/// amount.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, TransferError> {
        if value <= Decimal::ZERO {
            return Err(TransferError::InvalidAmount(
                "amount must be positive".to_string(),
            ));
        }
        if value.normalize().scale() > 2 {
            return Err(TransferError::InvalidAmount(
                "amount must have at most 2 decimal places".to_string(),
            ));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = TransferError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

/// A 16-digit card number (PAN), the external identifier of a card.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CardNumber(String);

impl CardNumber {
    pub fn parse(value: &str) -> Result<Self, TransferError> {
        if value.len() != 16 || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TransferError::InvalidCardNumber(
                "card number must be exactly 16 digits".to_string(),
            ));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CardNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CardNumber {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CardNumber {
    type Error = TransferError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CardNumber> for String {
    fn from(number: CardNumber) -> Self {
        number.0
    }
}

/// A balance-holding card account.
///
/// Created and administered outside this crate; once it exists, only the
/// transfer engine mutates its balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub user_id: UserId,
    pub number: CardNumber,
    pub balance: Balance,
    pub active: bool,
}

impl Card {
    pub fn new(id: CardId, user_id: UserId, number: CardNumber, balance: Balance) -> Self {
        Self {
            id,
            user_id,
            number,
            balance,
            active: true,
        }
    }

    /// Removes `amount` from the balance if covered.
    pub fn debit(&mut self, amount: Amount) -> Result<(), TransferError> {
        if self.balance.0 >= amount.value() {
            self.balance.0 -= amount.value();
            Ok(())
        } else {
            Err(TransferError::InsufficientBalance)
        }
    }

    /// Adds a non-negative `amount` to the balance.
    pub fn credit(&mut self, amount: Decimal) -> Result<(), TransferError> {
        if amount < Decimal::ZERO {
            return Err(TransferError::InvalidAmount(
                "credit amount must be non-negative".to_string(),
            ));
        }
        self.balance.0 += amount;
        Ok(())
    }
}
