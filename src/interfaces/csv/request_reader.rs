use crate::domain::card::{Amount, CardId, CardNumber, UserId};
use crate::domain::transaction::TransferRequest;
use crate::error::{Result, TransferError};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;
use std::str::FromStr;

#[derive(Debug, Deserialize)]
struct RequestRow {
    user_id: UserId,
    from_card_id: CardId,
    to_card_number: String,
    // Kept as a string until Decimal::from_str so the amount never goes
    // through f64.
    amount: String,
}

/// A transfer request paired with the identity submitting it.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedRequest {
    pub initiator: UserId,
    pub request: TransferRequest,
}

impl TryFrom<RequestRow> for SubmittedRequest {
    type Error = TransferError;

    fn try_from(row: RequestRow) -> Result<Self> {
        let amount = Decimal::from_str(&row.amount)
            .map_err(|e| TransferError::InvalidAmount(e.to_string()))?;
        Ok(Self {
            initiator: row.user_id,
            request: TransferRequest::new(
                row.from_card_id,
                CardNumber::parse(&row.to_card_number)?,
                Amount::new(amount)?,
            ),
        })
    }
}

/// Reads transfer requests from a CSV source with columns
/// `user_id,from_card_id,to_card_number,amount`.
///
/// Each row is validated into a typed request; malformed rows surface as
/// errors in the stream without stopping it.
pub struct RequestReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> RequestReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn requests(self) -> impl Iterator<Item = Result<SubmittedRequest>> {
        self.reader.into_deserialize::<RequestRow>().map(|result| {
            result
                .map_err(TransferError::from)
                .and_then(SubmittedRequest::try_from)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reads_valid_requests() {
        let data = "user_id, from_card_id, to_card_number, amount\n\
                    10, 1, 4000000000000002, 40.00";
        let requests: Vec<Result<SubmittedRequest>> =
            RequestReader::new(data.as_bytes()).requests().collect();

        assert_eq!(requests.len(), 1);
        let submitted = requests[0].as_ref().unwrap();
        assert_eq!(submitted.initiator, 10);
        assert_eq!(submitted.request.from_card, 1);
        assert_eq!(submitted.request.amount.value(), dec!(40.00));
    }

    #[test]
    fn test_invalid_amount_surfaces_per_row() {
        let data = "user_id, from_card_id, to_card_number, amount\n\
                    10, 1, 4000000000000002, 0\n\
                    10, 1, 4000000000000002, 0.005\n\
                    10, 1, 4000000000000002, ten\n\
                    10, 1, 4000000000000002, 1.00";
        let requests: Vec<Result<SubmittedRequest>> =
            RequestReader::new(data.as_bytes()).requests().collect();

        assert_eq!(requests.len(), 4);
        assert!(matches!(requests[0], Err(TransferError::InvalidAmount(_))));
        assert!(matches!(requests[1], Err(TransferError::InvalidAmount(_))));
        assert!(matches!(requests[2], Err(TransferError::InvalidAmount(_))));
        assert!(requests[3].is_ok());
    }
}
