use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("Source {source_name} failed: {message}")]
    Fetch {
        source_name: String,
        message: String,
    },

    #[error("Malformed reading from {source_name}: {message}")]
    Malformed {
        source_name: String,
        message: String,
    },
}

impl DataError {
    pub fn fetch(source_name: &str, message: impl Into<String>) -> Self {
        DataError::Fetch {
            source_name: source_name.to_string(),
            message: message.into(),
        }
    }

    pub fn malformed(source_name: &str, message: impl Into<String>) -> Self {
        DataError::Malformed {
            source_name: source_name.to_string(),
            message: message.into(),
        }
    }
}
