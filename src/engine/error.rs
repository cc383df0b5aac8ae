use crate::scheduler::SchedulingError;

#[derive(Debug)]
pub enum EngineError {
    Scheduling(SchedulingError),
    LimitExceeded(&'static str),
    WalError(String),
}

impl EngineError {
    /// The scheduling rejection, if that is what this is.
    pub fn scheduling(&self) -> Option<&SchedulingError> {
        match self {
            EngineError::Scheduling(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SchedulingError> for EngineError {
    fn from(e: SchedulingError) -> Self {
        EngineError::Scheduling(e)
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Scheduling(e) => write!(f, "{e}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Scheduling(e) => Some(e),
            _ => None,
        }
    }
}
