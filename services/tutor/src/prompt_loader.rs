use anyhow::{Context, Result};
use lesson_core::prompts::PROMPT_KEYS;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Reads every `*.md` file in `dir_path`, keyed by file stem.
pub fn load_prompts(dir_path: &Path) -> Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();

    for entry in fs::read_dir(dir_path)
        .with_context(|| format!("Failed to read prompts directory: {}", dir_path.display()))?
    {
        let entry = entry?;
        let path = entry.path();

        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem for prompt file")?
                .to_string();

            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read prompt file: {}", path.display()))?;

            prompts.insert(prompt_key, content);
        }
    }

    Ok(prompts)
}

/// Loads prompt overrides if `dir_path` exists. A missing directory means no overrides.
pub fn load_prompt_overrides(dir_path: &Path) -> Result<HashMap<String, String>> {
    if !dir_path.is_dir() {
        tracing::debug!(
            "No prompt directory at {}, using built-in prompts",
            dir_path.display()
        );
        return Ok(HashMap::new());
    }
    let prompts = load_prompts(dir_path)?;
    for key in prompts.keys() {
        if !PROMPT_KEYS.contains(&key.as_str()) {
            tracing::warn!(
                "Prompt file '{}.md' does not match any of {:?}",
                key,
                PROMPT_KEYS
            );
        }
    }
    Ok(prompts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_load_prompts_successfully() -> Result<()> {
        // --- 1. Arrange ---
        let dir = tempdir()?;
        let dir_path = dir.path();

        // `{{...}}` in `writeln!` writes a single-brace placeholder.
        let mut system = File::create(dir_path.join("system.md"))?;
        writeln!(system, "You are Super Miss. Student: {{student}}")?;

        let mut ready = File::create(dir_path.join("ready.md"))?;
        writeln!(ready, "Next please!")?;

        let mut ignored_file = File::create(dir_path.join("notes.txt"))?;
        writeln!(ignored_file, "not a prompt")?;

        std::fs::create_dir(dir_path.join("drafts"))?;

        // --- 2. Act ---
        let prompts = load_prompts(dir_path)?;

        // --- 3. Assert ---
        assert_eq!(prompts.len(), 2, "Should only load .md files");
        assert_eq!(
            prompts.get("system").unwrap(),
            "You are Super Miss. Student: {student}\n"
        );
        assert_eq!(prompts.get("ready").unwrap(), "Next please!\n");
        assert!(prompts.get("notes").is_none());

        Ok(())
    }

    #[test]
    fn test_load_prompts_from_nonexistent_dir() {
        let result = load_prompts(Path::new("nonexistent_dir_for_testing_prompts"));
        assert!(result.is_err());
    }

    #[test]
    fn test_overrides_from_missing_dir_are_empty() -> Result<()> {
        let overrides = load_prompt_overrides(Path::new("nonexistent_dir_for_testing_prompts"))?;
        assert!(overrides.is_empty());
        Ok(())
    }

    #[test]
    fn test_overrides_keep_unknown_keys_for_the_prompt_set_to_skip() -> Result<()> {
        let dir = tempdir()?;
        let mut intro = File::create(dir.path().join("intro.md"))?;
        writeln!(intro, "Hi {{student}}!")?;
        let mut outro = File::create(dir.path().join("outro.md"))?;
        writeln!(outro, "Bye")?;

        let overrides = load_prompt_overrides(dir.path())?;
        assert_eq!(overrides.len(), 2);
        assert_eq!(overrides.get("intro").unwrap(), "Hi {student}!\n");
        Ok(())
    }
}
