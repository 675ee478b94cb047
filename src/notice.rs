use log::{error, info, warn};
use serde::{Deserialize, Serialize};

/// A message shown to the user next to the control that caused it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "level", content = "message", rename_all = "lowercase")]
pub enum Notice {
    Success(String),
    Info(String),
    Warning(String),
    Error(String),
}

impl Notice {
    pub fn message(&self) -> &str {
        match self {
            Notice::Success(m) | Notice::Info(m) | Notice::Warning(m) | Notice::Error(m) => m,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Notice::Error(_))
    }

    /// Mirror the notice into the log at a matching level.
    pub fn log(&self) {
        match self {
            Notice::Success(m) | Notice::Info(m) => info!("{}", m),
            Notice::Warning(m) => warn!("{}", m),
            Notice::Error(m) => error!("{}", m),
        }
    }
}
