use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PageError {
    #[error("not enough free space on the page")]
    InsufficientSpace,

    #[error("slot {0} is out of range")]
    InvalidSlot(u16),

    #[error("record not found")]
    RecordNotFound,
}
