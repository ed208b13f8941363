use secrecy::{ExposeSecret, SecretString};

use crate::error::PortalError;
use crate::nif::Nif;

/// Login pair for one run. The password is redacted from `Debug` output and
/// only exposed when typed into the login form.
#[derive(Debug)]
pub struct Credentials {
    nif: Nif,
    password: SecretString,
}

impl Credentials {
    /// Validate the taxpayer number and pair it with the password.
    pub fn new(nif: &str, password: impl Into<String>) -> Result<Self, PortalError> {
        Ok(Self {
            nif: nif.parse()?,
            password: SecretString::from(password.into()),
        })
    }

    pub fn nif(&self) -> &Nif {
        &self.nif
    }

    pub(crate) fn password(&self) -> &str {
        self.password.expose_secret()
    }
}
