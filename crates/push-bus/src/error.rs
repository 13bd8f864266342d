use thiserror::Error;

#[derive(Error, Debug)]
pub enum PushBusError {
    #[error("connection rejected: no valid session")]
    Unauthorized,
}

pub type PushBusResult<T> = Result<T, PushBusError>;
