use std::fmt;

/// Failure reported by a [`GatewayClient`](crate::GatewayClient).
///
/// The named variants are the conditions the engine reasons about. Anything else the provider
/// reports is carried opaquely in [`GatewayError::Remote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// No certificate with this name exists on the gateway.
    CertificateNotFound(String),

    /// A certificate with this name already exists on the gateway.
    CertificateExists(String),

    /// The certificate is in use by an HTTPS listener and cannot be removed.
    CertificateBound {
        certificate: String,
        listener: Option<String>,
    },

    /// No HTTPS listener with this name exists on the gateway.
    ListenerNotFound(String),

    /// Opaque provider or transport failure.
    Remote(String),
}

impl GatewayError {
    pub fn remote(msg: impl Into<String>) -> Self {
        GatewayError::Remote(msg.into())
    }

    /// Returns true for conditions that a read-before-write check could have caught.
    pub fn is_precondition(&self) -> bool {
        !matches!(self, GatewayError::Remote(_))
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::CertificateNotFound(name) => {
                write!(f, "certificate called \"{name}\" does not exist on the gateway")
            }
            GatewayError::CertificateExists(name) => {
                write!(f, "certificate called \"{name}\" already exists on the gateway")
            }
            GatewayError::CertificateBound {
                certificate,
                listener: Some(listener),
            } => write!(
                f,
                "certificate called \"{certificate}\" is in use by listener called \"{listener}\" and cannot be removed"
            ),
            GatewayError::CertificateBound {
                certificate,
                listener: None,
            } => write!(
                f,
                "certificate called \"{certificate}\" is bound to an HTTPS listener and cannot be removed"
            ),
            GatewayError::ListenerNotFound(name) => {
                write!(f, "HTTPS listener called \"{name}\" does not exist on the gateway")
            }
            GatewayError::Remote(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for GatewayError {}

/// Category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad request or store configuration, detected before any remote call.
    Configuration,

    /// The gateway is not in a state that allows the operation.
    Precondition,

    /// Opaque failure from the gateway client.
    Remote,

    /// A multi-step operation stopped after the listener was already repointed.
    ///
    /// The listener is served, but certificate naming needs manual reconciliation.
    Incomplete,
}

/// Errors produced while planning or executing an operation.
#[derive(Debug)]
pub enum Error {
    Config(String),
    Precondition(String),
    Gateway(GatewayError),

    /// An operation failed and the certificate it created could not be removed again.
    Orphaned {
        certificate: String,
        source: GatewayError,
        cleanup: GatewayError,
    },

    Incomplete {
        listener: String,
        original: String,
        temporary: String,
        stage: &'static str,
        source: GatewayError,
    },
}

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    pub(crate) fn precondition(msg: impl Into<String>) -> Self {
        Error::Precondition(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) => ErrorKind::Configuration,
            Error::Precondition(_) => ErrorKind::Precondition,
            Error::Gateway(err) if err.is_precondition() => ErrorKind::Precondition,
            Error::Gateway(_) => ErrorKind::Remote,
            Error::Orphaned { source, .. } if source.is_precondition() => ErrorKind::Precondition,
            Error::Orphaned { .. } => ErrorKind::Remote,
            Error::Incomplete { .. } => ErrorKind::Incomplete,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) | Error::Precondition(msg) => f.write_str(msg),
            Error::Gateway(err) => write!(f, "{err}"),
            Error::Orphaned {
                certificate,
                source,
                cleanup,
            } => write!(
                f,
                "{source}; certificate \"{certificate}\" was left on the gateway and could not \
                 be removed: {cleanup}"
            ),
            Error::Incomplete {
                listener,
                original,
                temporary,
                stage,
                source,
            } => write!(
                f,
                "replacement for listener \"{listener}\" stopped while {stage}: {source}; \
                 the listener is still served, but certificates \"{original}\" and \
                 \"{temporary}\" need manual reconciliation"
            ),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Gateway(err)
            | Error::Orphaned { source: err, .. }
            | Error::Incomplete { source: err, .. } => Some(err),
            _ => None,
        }
    }
}

impl From<GatewayError> for Error {
    fn from(err: GatewayError) -> Self {
        Error::Gateway(err)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
