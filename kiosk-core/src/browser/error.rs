use thiserror::Error;

pub type BrowserResult<T> = Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("chromium launch failed: {0}")]
    Launch(String),
    #[error("cdp error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("timeout waiting for {0}")]
    Timeout(String),
    #[error("browser transport error: {0}")]
    Transport(String),
    #[error("no browser session started")]
    NotStarted,
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

// Transport failures that mean the browser process itself is gone, as
// opposed to a single page misbehaving.
const CRASH_MARKERS: [&str; 4] = [
    "not reachable",
    "session deleted",
    "connection closed",
    "browser closed",
];

impl BrowserError {
    pub fn is_timeout(&self) -> bool {
        match self {
            BrowserError::Timeout(_) => true,
            BrowserError::Cdp(err) => err.to_string().to_lowercase().contains("timeout"),
            _ => false,
        }
    }

    pub fn is_crash(&self) -> bool {
        let message = match self {
            BrowserError::Transport(message) | BrowserError::Unexpected(message) => {
                message.to_lowercase()
            }
            BrowserError::Cdp(err) => err.to_string().to_lowercase(),
            BrowserError::NotStarted => return true,
            _ => return false,
        };
        CRASH_MARKERS.iter().any(|marker| message.contains(marker))
    }
}
