//! Recipe and component file loading.
//!
//! Discovery precedence across local/user/public directories belongs to the
//! caller; this module only turns explicit paths into documents.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::types::{Component, Recipe};
use crate::errors::{RecipeError, Result};

/// Load a recipe from a YAML file
pub fn load_recipe(path: &Path) -> Result<Recipe> {
    let content = std::fs::read_to_string(path).map_err(|e| RecipeError::Load {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    serde_yaml::from_str(&content).map_err(|e| RecipeError::Load {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// A component file holds either a `components:` list or a single component.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ComponentFile {
    Many { components: Vec<Component> },
    One(Component),
}

/// Explicit registry of reusable components, keyed by id.
///
/// Populated before any recipe runs and cleared between independent recipe
/// invocations that need a fresh view.
#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    components: HashMap<String, Component>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component, replacing any previous one with the same id
    pub fn register(&mut self, component: Component) {
        if self.components.contains_key(&component.id) {
            debug!(component = %component.id, "Replacing previously registered component");
        }
        self.components.insert(component.id.clone(), component);
    }

    pub fn get(&self, id: &str) -> Option<&Component> {
        self.components.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.components.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn clear(&mut self) {
        self.components.clear();
    }

    /// Sorted component ids
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.components.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Parse component definitions from YAML text
    pub fn load_yaml(&mut self, yaml: &str) -> Result<usize> {
        let file: ComponentFile = serde_yaml::from_str(yaml)?;
        let components = match file {
            ComponentFile::Many { components } => components,
            ComponentFile::One(c) => vec![c],
        };
        let count = components.len();
        for component in components {
            self.register(component);
        }
        Ok(count)
    }

    /// Load a single component file
    pub fn load_file(&mut self, path: &Path) -> Result<usize> {
        let content = std::fs::read_to_string(path).map_err(|e| RecipeError::Load {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        self.load_yaml(&content).map_err(|e| RecipeError::Load {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load every `*.yml`/`*.yaml` file under a directory.
    ///
    /// Unparseable files are skipped with a warning so one broken component
    /// does not hide the rest.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize> {
        if !dir.is_dir() {
            return Err(RecipeError::Load {
                path: dir.to_path_buf(),
                message: "not a directory".to_string(),
            });
        }
        let mut total = 0;
        for entry in WalkDir::new(dir)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            let is_yaml = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e == "yml" || e == "yaml")
                .unwrap_or(false);
            if !entry.file_type().is_file() || !is_yaml {
                continue;
            }
            match self.load_file(path) {
                Ok(n) => total += n,
                Err(e) => warn!("Skipping component file {}: {}", path.display(), e),
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_register_and_clear() {
        let mut registry = ComponentRegistry::new();
        registry.register(Component {
            id: "greet".into(),
            ..Default::default()
        });
        assert!(registry.contains("greet"));
        assert_eq!(registry.len(), 1);
        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_load_yaml_list_and_single() {
        let mut registry = ComponentRegistry::new();
        let n = registry
            .load_yaml(
                r#"
components:
  - id: a
    operations:
      - command: echo a
  - id: b
"#,
            )
            .unwrap();
        assert_eq!(n, 2);

        let n = registry
            .load_yaml("id: c\noperations:\n  - command: echo c\n")
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(registry.ids(), vec!["a", "b", "c"]);
        assert_eq!(registry.get("c").unwrap().operations[0].command, "echo c");
    }

    #[test]
    fn test_load_dir_skips_non_yaml_and_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join("ok.yml")).unwrap();
        writeln!(f, "id: ok\noperations: []").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "id: ignored").unwrap();
        std::fs::write(dir.path().join("broken.yaml"), "id: [unclosed").unwrap();

        let mut registry = ComponentRegistry::new();
        let n = registry.load_dir(dir.path()).unwrap();
        assert_eq!(n, 1);
        assert!(registry.contains("ok"));
        assert!(!registry.contains("ignored"));
    }

    #[test]
    fn test_load_recipe_missing_file() {
        let err = load_recipe(Path::new("/definitely/not/here.yml")).unwrap_err();
        assert!(matches!(err, RecipeError::Load { .. }));
    }
}
