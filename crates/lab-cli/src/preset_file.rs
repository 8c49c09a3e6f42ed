use std::path::Path;

use lab_engine::Preset;

/// Reads and parses a preset document (spec.md §6: loading and validating
/// this file is explicitly the CLI's job, not the engine's).
pub fn load_preset(path: &Path) -> anyhow::Result<Preset> {
    let raw = std::fs::read_to_string(path).map_err(|e| anyhow::anyhow!("reading preset {}: {e}", path.display()))?;
    toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing preset {}: {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_a_minimal_agent_preset() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            objective = "discuss"

            [[nodes]]
            id = "agent"
            [nodes.kind]
            type = "agent"
            role = "agent"
            system_prompt = "be helpful"
            "#
        )
        .unwrap();

        let preset = load_preset(file.path()).unwrap();
        assert_eq!(preset.objective, "discuss");
        assert_eq!(preset.nodes.len(), 1);
    }

    #[test]
    fn missing_file_is_a_readable_error() {
        let err = load_preset(Path::new("/nonexistent/preset.toml")).unwrap_err();
        assert!(err.to_string().contains("reading preset"));
    }
}
