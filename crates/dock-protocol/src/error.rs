use crate::commands::CommandCategory;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Unknown command topic: {0}")]
    UnknownTopic(String),

    #[error("Unknown {category} command: {payload}")]
    UnknownPayload {
        category: CommandCategory,
        payload: String,
    },
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
