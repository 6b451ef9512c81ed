use cardpay::domain::card::{Balance, Card, CardId, CardNumber, UserId};
use cardpay::domain::ports::LedgerStore;
use cardpay::infrastructure::in_memory::InMemoryLedger;
use rust_decimal::Decimal;

/// 16-digit card number derived from a small integer.
pub fn number(n: u64) -> CardNumber {
    CardNumber::parse(&format!("{n:016}")).unwrap()
}

pub fn card(id: CardId, user_id: UserId, balance: Decimal) -> Card {
    Card::new(id, user_id, number(id), Balance::new(balance))
}

pub async fn ledger_with(cards: Vec<Card>) -> InMemoryLedger {
    let ledger = InMemoryLedger::new();
    for card in cards {
        ledger.insert_card(card).await.unwrap();
    }
    ledger
}

pub async fn balance_of(ledger: &InMemoryLedger, id: CardId) -> Decimal {
    ledger.card(id).await.unwrap().unwrap().balance.0
}
