//! Graph configuration.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default of [`Config::max_evaluation_depth`].
pub const DEFAULT_EVALUATION_DEPTH: usize = 512;

/// Tunables of a [`Graph`](crate::graph::Graph).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum nesting of pulls before evaluation fails with
    /// [`Error::EvaluationTooDeep`](crate::Error::EvaluationTooDeep).
    ///
    /// Every node on a chain costs two levels. The default fits a 2 MiB
    /// thread stack in unoptimized builds; [`Graph::refresh`] evaluates
    /// deeper graphs without nesting.
    ///
    /// [`Graph::refresh`]: crate::graph::Graph::refresh
    pub max_evaluation_depth: usize,

    /// Reject duplicate node names within a network. When false, a taken
    /// name gets a numeric suffix instead.
    pub unique_names: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_evaluation_depth: DEFAULT_EVALUATION_DEPTH,
            unique_names: true,
        }
    }
}

impl Config {
    /// Parse a JSON configuration. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
