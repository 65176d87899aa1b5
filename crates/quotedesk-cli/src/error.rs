use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] quotedesk_core::ValidationError),

    #[error("command error: {0}")]
    Command(String),

    #[error("no data for {0}")]
    NotFound(String),

    #[error("refresh failed for all {0} symbols")]
    RefreshFailed(usize),

    #[error(transparent)]
    Store(#[from] quotedesk_core::StoreError),

    #[error(transparent)]
    Warehouse(#[from] quotedesk_warehouse::WarehouseError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) | Self::Command(_) => 2,
            Self::NotFound(_) => 3,
            Self::RefreshFailed(_) => 4,
            Self::Store(_) | Self::Warehouse(_) | Self::Serialization(_) | Self::Io(_) => 10,
        }
    }
}
