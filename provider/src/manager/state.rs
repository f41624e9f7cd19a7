use super::error::{self, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use snafu::{ensure, ResultExt};
use std::collections::BTreeMap;
use std::path::Path;

/// The state file format written by this version.
pub const STATE_VERSION: u32 = 1;

/// What the manager knows about the objects it created or imported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateFile {
    pub version: u32,
    /// Incremented on every write.
    pub serial: u64,
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceRecord>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            serial: 0,
            resources: BTreeMap::new(),
        }
    }
}

/// The stored state of one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    pub id: String,
    pub attributes: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl StateFile {
    /// Read the state at `path`. A missing file is an empty state.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e).context(error::FileSnafu { path }),
        };
        let state: StateFile = serde_json::from_str(&content).context(error::SerdeJsonSnafu {
            action: format!("parse state file '{}'", path.display()),
        })?;
        ensure!(
            state.version <= STATE_VERSION,
            error::StateVersionSnafu {
                path,
                version: state.version,
                supported: STATE_VERSION,
            }
        );
        Ok(state)
    }

    /// Write the state to `path` with the next serial. The file is replaced atomically.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.version = STATE_VERSION;
        self.serial += 1;
        let content = serde_json::to_string_pretty(self).context(error::SerdeJsonSnafu {
            action: "serialize state",
        })?;
        let mut temp = path.as_os_str().to_owned();
        temp.push(".tmp");
        let temp = Path::new(&temp);
        std::fs::write(temp, content).context(error::WriteSnafu { path: temp })?;
        std::fs::rename(temp, path).context(error::WriteSnafu { path })?;
        Ok(())
    }

    pub fn get(&self, address: &str) -> Option<&ResourceRecord> {
        self.resources.get(address)
    }

    pub fn insert(&mut self, address: String, record: ResourceRecord) {
        self.resources.insert(address, record);
    }

    pub fn remove(&mut self, address: &str) -> Option<ResourceRecord> {
        self.resources.remove(address)
    }

    pub fn addresses(&self) -> impl Iterator<Item = &str> + '_ {
        self.resources.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn record() -> ResourceRecord {
        ResourceRecord {
            resource_type: "rancher2_project".to_string(),
            name: "web".to_string(),
            id: "c-abc12:p-xyz".to_string(),
            attributes: json!({"id": "c-abc12:p-xyz", "name": "web"}),
            depends_on: vec![],
        }
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let state = StateFile::load(&dir.path().join("rancher2.state.json")).unwrap();
        assert_eq!(state, StateFile::default());
    }

    #[test]
    fn save_bumps_serial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rancher2.state.json");
        let mut state = StateFile::default();
        state.insert("rancher2_project.web".to_string(), record());
        state.save(&path).unwrap();
        state.save(&path).unwrap();

        let loaded = StateFile::load(&path).unwrap();
        assert_eq!(loaded.serial, 2);
        assert_eq!(loaded.get("rancher2_project.web"), Some(&record()));
        assert!(!dir.path().join("rancher2.state.json.tmp").exists());
    }

    #[test]
    fn newer_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rancher2.state.json");
        std::fs::write(&path, r#"{"version": 2, "serial": 7, "resources": {}}"#).unwrap();
        let err = StateFile::load(&path).unwrap_err();
        assert!(err.to_string().contains("has version 2"));
    }
}
