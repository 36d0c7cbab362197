use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid part id: {0}")]
    InvalidPartId(String),

    #[error("invalid serial: {0}")]
    InvalidSerial(String),

    #[error("invalid container tag: {0}")]
    InvalidContainerTag(String),

    #[error("invalid data: {0}")]
    InvalidData(String),
}
