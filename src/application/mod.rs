//! Application layer: the transfer engine orchestrating validation,
//! commission resolution, and the atomic apply, plus the read-only
//! transaction history service.

pub mod engine;
pub mod history;
