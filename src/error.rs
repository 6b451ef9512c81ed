use thiserror::Error;

pub type Result<T> = std::result::Result<T, TransferError>;

/// Broad classification of a [`TransferError`].
///
/// Lets callers and operators distinguish "your request is bad" from "the
/// system is misconfigured" without matching on every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller-correctable request problems.
    Input,
    /// Operational misconfiguration of the commission setup.
    Configuration,
    /// Business rules (insufficient balance).
    Business,
    /// Lock contention; safe to retry the whole transfer.
    Contention,
    /// Storage or commit faults; the transfer was fully rolled back.
    Storage,
}

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("sender card not found or not owned by the caller")]
    UnauthorizedSource,
    #[error("receiver card not found")]
    DestinationNotFound,
    #[error("cannot transfer to the same card")]
    SelfTransfer,
    #[error("one or both cards are inactive")]
    InactiveAccount,
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("invalid card number: {0}")]
    InvalidCardNumber(String),
    #[error("commission rate is set but no beneficiary card is configured")]
    CommissionNotConfigured,
    #[error("commission rate must be non-negative")]
    InvalidCommissionRate,
    #[error("commission beneficiary card not found")]
    BeneficiaryNotFound,
    #[error("commission beneficiary card is inactive")]
    BeneficiaryInactive,
    #[error("commission card cannot be the sender or receiver card")]
    CommissionConflict,
    #[error("insufficient balance")]
    InsufficientBalance,
    #[error("timed out waiting for card locks")]
    Contention,
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("transfer failed: {0}")]
    Storage(Box<dyn std::error::Error + Send + Sync>),
}

impl TransferError {
    /// Wraps an arbitrary storage-layer fault.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage(Box::new(err))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnauthorizedSource
            | Self::DestinationNotFound
            | Self::SelfTransfer
            | Self::InactiveAccount
            | Self::InvalidAmount(_)
            | Self::InvalidCardNumber(_) => ErrorKind::Input,
            Self::CommissionNotConfigured
            | Self::InvalidCommissionRate
            | Self::BeneficiaryNotFound
            | Self::BeneficiaryInactive
            | Self::CommissionConflict => ErrorKind::Configuration,
            Self::InsufficientBalance => ErrorKind::Business,
            Self::Contention => ErrorKind::Contention,
            Self::Csv(_) | Self::Io(_) | Self::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Only contention errors are safe to retry as-is.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Contention
    }
}
