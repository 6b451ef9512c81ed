//! Domain types and contracts: cards, amounts, transfer requests,
//! commission policy, and the ledger storage ports.

pub mod card;
pub mod commission;
pub mod ports;
pub mod transaction;
