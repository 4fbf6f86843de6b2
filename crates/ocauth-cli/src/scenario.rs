use anyhow::{Context, Result};
use ocauth::{Script, SessionConfig};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// A scenario file: the engine script plus, optionally, the session to run.
#[derive(Debug, Deserialize)]
pub struct ScenarioFile {
    #[serde(default)]
    pub session: Option<SessionConfig>,
    pub script: Script,
}

impl ScenarioFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse scenario {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_scenarios_parse() {
        for raw in [
            include_str!("../scenarios/f5-password.json"),
            include_str!("../scenarios/gp-token.json"),
        ] {
            let scenario: ScenarioFile = serde_json::from_str(raw).unwrap();
            let session = scenario.session.unwrap();
            assert!(session.validate().is_ok());
            assert!(!scenario.script.steps.is_empty());
        }
    }
}
