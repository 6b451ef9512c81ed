//! Adapters between external data formats and the domain.

pub mod csv;
