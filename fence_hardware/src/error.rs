use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("driver busy with a previous command")]
    Busy,
    #[error("unknown move handle {0}")]
    UnknownHandle(u64),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
