use crate::domain::card::Card;
use crate::error::Result;
use std::io::Write;

/// Writes final card balances as CSV with columns
/// `id,card_number,balance,active`.
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_cards(&mut self, cards: Vec<Card>) -> Result<()> {
        self.writer
            .write_record(["id", "card_number", "balance", "active"])?;
        for card in cards {
            self.writer.write_record([
                card.id.to_string(),
                card.number.to_string(),
                // Always two decimals, whatever scale the arithmetic left.
                format!("{:.2}", card.balance.0),
                card.active.to_string(),
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
