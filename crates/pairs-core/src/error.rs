use thiserror::Error;

#[derive(Error, Debug)]
pub enum PairsError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}
