use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Operation requested by the platform for a management job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Add,
    Remove,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Add => f.write_str("Add"),
            Action::Remove => f.write_str("Remove"),
        }
    }
}

/// A management job's certificate and options.
///
/// What `alias` names depends on the store's [`BindingPolicy`](crate::BindingPolicy).
#[derive(Clone)]
pub struct ManagementRequest {
    pub action: Action,
    pub alias: String,

    /// Base64 PKCS#12 certificate and key.
    pub contents: String,

    /// Password protecting `contents`.
    pub password: Zeroizing<String>,

    pub overwrite: bool,

    /// Listener to bind a newly added certificate to (the `HTTPListenerName` job property).
    pub listener: Option<String>,
}

impl ManagementRequest {
    pub fn add(
        alias: impl Into<String>,
        contents: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        ManagementRequest {
            action: Action::Add,
            alias: alias.into(),
            contents: contents.into(),
            password: Zeroizing::new(password.into()),
            overwrite: false,
            listener: None,
        }
    }

    pub fn remove(alias: impl Into<String>) -> Self {
        ManagementRequest {
            action: Action::Remove,
            alias: alias.into(),
            contents: String::new(),
            password: Zeroizing::new(String::new()),
            overwrite: false,
            listener: None,
        }
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Empty names are treated as unset.
    pub fn with_listener(mut self, listener: impl Into<String>) -> Self {
        let listener = listener.into();
        self.listener = (!listener.trim().is_empty()).then_some(listener);
        self
    }
}

impl fmt::Debug for ManagementRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagementRequest")
            .field("action", &self.action)
            .field("alias", &self.alias)
            .field("contents", &format_args!("<{} bytes>", self.contents.len()))
            .field("password", &"<redacted>")
            .field("overwrite", &self.overwrite)
            .field("listener", &self.listener)
            .finish()
    }
}
