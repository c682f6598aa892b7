//! Error taxonomy shared by every component of the notification client.

/// Errors raised while talking to the notification server or validating
/// caller input.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The server could not be reached (refused, DNS, timeout).
    #[error("server unreachable: {0}")]
    Connection(String),
    /// The server answered with a non-2xx status.
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
    /// The account's rolling SMS window is exhausted.
    #[error("SMS limit cap exceeded: {0}")]
    CapExceeded(String),
    /// A 2xx answer whose body could not be understood.
    #[error("unexpected server response: {0}")]
    Protocol(String),
    /// Invalid input or a violated precondition.
    #[error("invalid configuration: {0}")]
    Configuration(String),
    /// Notifications are not usable right now (not authenticated, disabled
    /// by the user, or no contact channel).
    #[error("notifications are disabled")]
    Disabled,
    #[error("profile storage error: {0}")]
    Storage(String),
}

impl NotifyError {
    /// True for every failure that came out of the transport layer.
    /// `Connection` belongs to this family, like a refused socket is an I/O
    /// error.
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            NotifyError::Connection(_) | NotifyError::Server { .. } | NotifyError::CapExceeded(_)
        )
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, NotifyError::Connection(_))
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        NotifyError::Configuration(msg.into())
    }
}

impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            NotifyError::Connection(err.to_string())
        } else if err.is_decode() || err.is_body() {
            // The server answered but its body could not be read.
            NotifyError::Protocol(err.to_string())
        } else if let Some(status) = err.status() {
            NotifyError::Server {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            // Request building errors never reached the server.
            NotifyError::Connection(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, NotifyError>;
