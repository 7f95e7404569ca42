use serde::{Deserialize, Serialize};

/// Behaviour knobs of a [`System`](crate::System). Forks inherit them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Turn panics inside hooks into `UnexpectedHookFailure`, and inside
    /// `expand` into `ExpansionAborted` (default: true).
    pub catch_panics: bool,
    /// Include each blueprint's `Debug` rendering in error paths (default: true).
    pub render_blueprints: bool,
    /// Maximum number of pending nodes in a single addition (default: 4096).
    pub max_forest_nodes: usize,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            catch_panics: true,
            render_blueprints: true,
            max_forest_nodes: 4096,
        }
    }
}

impl SystemConfig {
    /// Parse a JSON configuration document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
