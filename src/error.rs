use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum ProxyError {
    #[error("sensorfw backend unavailable: {0}")]
    BackendUnavailable(&'static str),

    #[error("no active sensorfw session")]
    NoSession,

    #[error("sensorfw call timed out")]
    CallTimeout,

    #[error("sensor worker terminated")]
    WorkerGone,

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    DbusError(#[from] zbus::Error),

    #[error(transparent)]
    FdoError(#[from] zbus::fdo::Error),
}

pub type Result<T> = std::result::Result<T, ProxyError>;
