use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("exhausted reconnect attempts")]
    ReconnectExhausted,

    #[error("session replaced too many times, logged out")]
    AutoLogout,

    #[error("transient catalog error: {0}")]
    Transient(String),

    #[error("invalid request: {0}")]
    Invalid(String),
}

pub type CatalogResult<T> = Result<T, CatalogError>;
