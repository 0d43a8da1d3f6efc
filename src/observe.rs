use std::fmt;

use crate::plan::Operation;

/// A remote mutation or decision made by the engine, reported as it happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<'a> {
    Planned {
        alias: &'a str,
        operation: Operation,
    },
    CertificateCreated {
        name: &'a str,
    },
    CertificateRemoved {
        name: &'a str,
    },
    ListenerBound {
        listener: &'a str,
        certificate: &'a str,
    },
    /// A certificate created by a failed operation was deleted again.
    Compensated {
        name: &'a str,
    },
}

impl fmt::Display for Step<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Planned { alias, operation } => {
                write!(f, "planned {operation} for \"{alias}\"")
            }
            Step::CertificateCreated { name } => write!(f, "created certificate \"{name}\""),
            Step::CertificateRemoved { name } => write!(f, "removed certificate \"{name}\""),
            Step::ListenerBound {
                listener,
                certificate,
            } => write!(f, "bound certificate \"{certificate}\" to listener \"{listener}\""),
            Step::Compensated { name } => {
                write!(f, "deleted orphaned certificate \"{name}\"")
            }
        }
    }
}

/// Receives each [`Step`] the engine takes.
pub trait Observer {
    fn step(&self, step: Step<'_>);
}

impl<O: Observer + ?Sized> Observer for &O {
    fn step(&self, step: Step<'_>) {
        (**self).step(step);
    }
}

/// Forwards steps to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn step(&self, step: Step<'_>) {
        match step {
            Step::Compensated { .. } => log::warn!("{step}"),
            _ => log::debug!("{step}"),
        }
    }
}
