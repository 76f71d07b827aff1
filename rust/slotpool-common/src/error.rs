use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    pub fn invalid_config(name: impl Into<String>, message: impl Into<String>) -> Error {
        ErrorKind::InvalidConfiguration {
            name: name.into(),
            message: message.into(),
        }
        .into()
    }

    pub fn invalid_factory_result(index: usize) -> Error {
        ErrorKind::InvalidFactoryResult { index }.into()
    }

    pub fn task_failure(worker: usize, message: impl Into<String>) -> Error {
        ErrorKind::TaskFailure {
            worker,
            message: message.into(),
        }
        .into()
    }

    pub fn pool_exhausted() -> Error {
        ErrorKind::PoolExhausted.into()
    }

    pub fn spawn_worker(index: usize, source: std::io::Error) -> Error {
        ErrorKind::SpawnWorker { index, source }.into()
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Error {
        ErrorKind::Io {
            context: context.into(),
            source,
        }
        .into()
    }

    /// Returns `true` for the configuration errors raised before any worker exists.
    pub fn is_invalid_config(&self) -> bool {
        matches!(self.kind(), ErrorKind::InvalidConfiguration { .. })
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("invalid configuration {name}: {message}")]
    InvalidConfiguration { name: String, message: String },

    #[error("task factory returned no task for item #{index}")]
    InvalidFactoryResult { index: usize },

    #[error("task failed on worker {worker}: {message}")]
    TaskFailure { worker: usize, message: String },

    #[error("all pool workers have terminated")]
    PoolExhausted,

    #[error("failed to spawn worker thread {index}: {source}")]
    SpawnWorker {
        index: usize,
        source: std::io::Error,
    },

    #[error("IO error for '{context}': {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::io("", e)
    }
}
