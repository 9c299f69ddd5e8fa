use anyhow::{Context, Result};
use lesson_core::lesson::Unit;
use std::collections::HashSet;
use std::path::Path;

/// The Primary-2 curriculum, Term 1 and Term 2.
const EMBEDDED_CURRICULUM: &str = include_str!("../assets/curriculum.json");

#[derive(Debug, Clone)]
pub struct Curriculum {
    units: Vec<Unit>,
}

impl Curriculum {
    pub fn embedded() -> Result<Self> {
        Self::from_json(EMBEDDED_CURRICULUM).context("Embedded curriculum is malformed")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read curriculum file: {}", path.display()))?;
        Self::from_json(&json)
            .with_context(|| format!("Invalid curriculum file: {}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let units: Vec<Unit> = serde_json::from_str(json)?;
        if units.is_empty() {
            anyhow::bail!("curriculum has no units");
        }
        let mut seen = HashSet::new();
        for unit in &units {
            if !seen.insert(unit.id) {
                anyhow::bail!("unit id {} appears more than once", unit.id);
            }
        }
        Ok(Self { units })
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn unit(&self, id: u32) -> Option<&Unit> {
        self.units.iter().find(|unit| unit.id == id)
    }
}
