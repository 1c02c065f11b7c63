// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Where the test units of a run are executed.
///
/// - `Local`: the whole suite runs as one subprocess on this machine.
/// - `Function`: one fire-and-forget invocation per unit; completion is
///   detected by polling the signal store.
/// - `Container`: one task per unit; completion is awaited through the
///   platform's blocking "wait until stopped" call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecuteOn {
    #[default]
    Local,
    Function,
    Container,
}

impl ExecuteOn {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecuteOn::Local => "local",
            ExecuteOn::Function => "function",
            ExecuteOn::Container => "container",
        }
    }
}

impl fmt::Display for ExecuteOn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecuteOn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(ExecuteOn::Local),
            "function" | "lambda" => Ok(ExecuteOn::Function),
            "container" | "ecs" => Ok(ExecuteOn::Container),
            other => Err(format!(
                "invalid execute_on: {other} (expected \"local\", \"function\" or \"container\")"
            )),
        }
    }
}
