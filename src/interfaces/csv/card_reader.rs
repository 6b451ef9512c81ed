use crate::domain::card::{Balance, Card, CardId, CardNumber, UserId};
use crate::error::{Result, TransferError};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;
use std::str::FromStr;

#[derive(Debug, Deserialize)]
struct CardRow {
    id: CardId,
    user_id: UserId,
    card_number: String,
    // Money columns stay strings until Decimal::from_str; deserializing
    // them as numbers would route through f64.
    balance: String,
    active: bool,
}

impl TryFrom<CardRow> for Card {
    type Error = TransferError;

    fn try_from(row: CardRow) -> Result<Card> {
        let balance = Decimal::from_str(&row.balance)
            .map_err(|e| TransferError::InvalidAmount(e.to_string()))?;
        let mut card = Card::new(
            row.id,
            row.user_id,
            CardNumber::parse(&row.card_number)?,
            Balance::new(balance),
        );
        card.active = row.active;
        Ok(card)
    }
}

/// Reads seed cards from a CSV source with columns
/// `id,user_id,card_number,balance,active`.
pub struct CardReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CardReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads and validates cards.
    pub fn cards(self) -> impl Iterator<Item = Result<Card>> {
        self.reader
            .into_deserialize::<CardRow>()
            .map(|result| result.map_err(TransferError::from).and_then(Card::try_from))
    }
}
