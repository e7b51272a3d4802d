//! Trading signals.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction suggested by the signal engine for the latest window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Long,
    Short,
    #[default]
    Hold,
}

impl Signal {
    /// True for `Long` and `Short`.
    pub fn is_actionable(&self) -> bool {
        !matches!(self, Signal::Hold)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Long => write!(f, "long"),
            Signal::Short => write!(f, "short"),
            Signal::Hold => write!(f, "hold"),
        }
    }
}
