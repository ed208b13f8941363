use thiserror::Error;

/// Errors raised by the portal session and extraction steps.
///
/// All of them are fatal for a run: nothing is retried and no output is written.
#[derive(Debug, Error)]
pub enum PortalError {
    /// The taxpayer number failed the check digit scheme. Raised before any
    /// browser is launched.
    #[error("invalid NIF: {0:?}")]
    Validation(String),

    /// The SSO login page was still showing after submitting credentials.
    /// Carries the portal's own error text.
    #[error("failed to login: {0}")]
    Authentication(String),

    /// The portal rendered an error box (or no data) instead of the page content.
    #[error("error getting {context}: {message}")]
    DataFetch {
        context: &'static str,
        message: String,
    },

    /// Browser driver failure: launch, CDP command, missing element, bad evaluation result.
    #[error("browser error: {0}")]
    Browser(String),
}

impl From<chromiumoxide::error::CdpError> for PortalError {
    fn from(e: chromiumoxide::error::CdpError) -> Self {
        PortalError::Browser(e.to_string())
    }
}
