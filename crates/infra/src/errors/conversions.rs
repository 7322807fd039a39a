//! Conversions from external infrastructure errors into domain errors.

use reqwest::Error as HttpError;
use wbgate_domain::{TransportError, WbError};

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfraError(pub TransportError);

impl From<InfraError> for TransportError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<InfraError> for WbError {
    fn from(value: InfraError) -> Self {
        WbError::Transport(value.0)
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → TransportError */
/* -------------------------------------------------------------------------- */

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        if value.is_timeout() {
            return InfraError(TransportError::Timeout);
        }

        #[cfg(not(target_arch = "wasm32"))]
        if value.is_connect() {
            return InfraError(TransportError::Connect(value.to_string()));
        }

        if value.is_body() || value.is_decode() {
            return InfraError(TransportError::Body(value.to_string()));
        }

        InfraError(TransportError::Request(value.to_string()))
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
