use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The underlying library could not open the dataset.
    #[error("could not open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error>,
    },
    /// The dataset handle has already been released.
    #[error("dataset is closed")]
    Closed,
    #[error("{0}")]
    General(String),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    #[error(transparent)]
    Wrapped(Box<dyn std::error::Error>),
}

impl Error {
    pub fn general(message: impl Into<String>) -> Self {
        Self::General(message.into())
    }

    pub fn wrap(error: impl std::error::Error + 'static) -> Self {
        Self::Wrapped(Box::new(error))
    }

    pub fn open(path: impl Into<PathBuf>, error: impl std::error::Error + 'static) -> Self {
        Self::Open {
            path: path.into(),
            source: Box::new(error),
        }
    }

    /// An open failure with no library error behind it.
    pub fn open_msg(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::Open {
            path: path.into(),
            source: message.into(),
        }
    }
}
