use thiserror::Error;

/// Errors returned by the checked mutators of [`StateList`](crate::StateList).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("index {index} is out of range for a list of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("cannot move from {old_index} to {new_index} in a list of length {len}")]
    MoveOutOfRange {
        old_index: usize,
        new_index: usize,
        len: usize,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
