use thiserror::Error;

#[derive(Debug, Error)]
pub enum GithubError {
    #[error("GitHub user not found: {0}")]
    NotFound(String),

    #[error("Invalid GitHub username: {0:?}")]
    InvalidUsername(String),

    #[error("GitHub responded with status {0}")]
    Status(u16),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Failed to decode GitHub response: {0}")]
    Decode(String),

    #[error("Client configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, GithubError>;
