use crate::infrastructure::entities::AppointmentState;
use crate::infrastructure::traits::RepositoryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("appointment cannot move from {from} to {to}")]
    InvalidTransition {
        from: AppointmentState,
        to: AppointmentState,
    },

    #[error("upstream service failed: {0}")]
    Upstream(String),

    #[error("{0}")]
    Internal(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
