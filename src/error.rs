use std::collections::TryReserveError;

use thiserror::Error;

/// Failures reported by the trees, the disjoint-set forest and their backing storage.
///
/// Every operation validates its preconditions before mutating anything, so a call that returns
/// one of these leaves its structure exactly as it was.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum Error {
    #[error("key is already present")]
    DuplicateKey,
    #[error("key not found")]
    NotFound,
    #[error("index out of range")]
    IndexOutOfRange,
    #[error("elements already belong to the same set")]
    AlreadyUnioned,
    #[error("backing storage could not grow")]
    AllocationFailure,
}

impl From<TryReserveError> for Error {
    fn from(_: TryReserveError) -> Self {
        Error::AllocationFailure
    }
}

pub type Result<T, E = Error> = core::result::Result<T, E>;
