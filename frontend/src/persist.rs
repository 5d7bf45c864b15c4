// ----------------------------
// Local persistence: JSON key/value file in the app data dir
// ----------------------------

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

pub const BASE_URL_KEY: &str = "labstand_base_url";

#[derive(Debug, Clone)]
pub struct Storage {
    path: PathBuf,
}

impl Storage {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_location() -> Self {
        let mut base = dirs::data_local_dir()
            .or_else(dirs::data_dir)
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| ".".into()));
        base.push("labstand");
        base.push("storage.json");
        Self::at(base)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_map(&self) -> Result<HashMap<String, String>, io::Error> {
        let bytes = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(e),
        };

        // a corrupt file is treated as empty and rewritten on the next save
        let map = serde_json::from_slice::<HashMap<String, String>>(&bytes).unwrap_or_default();
        Ok(map)
    }

    fn save_map(&self, map: &HashMap<String, String>) -> Result<(), io::Error> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(map).map_err(io::Error::other)?;
        std::fs::write(&self.path, bytes)
    }

    pub fn get_string(&self, key: &str) -> Result<Option<String>, io::Error> {
        let map = self.load_map()?;
        Ok(map.get(key).cloned())
    }

    pub fn set_string(&self, key: &str, value: &str) -> Result<(), io::Error> {
        let mut map = self.load_map()?;
        map.insert(key.to_string(), value.to_string());
        self.save_map(&map)
    }

    pub fn remove(&self, key: &str) -> Result<(), io::Error> {
        let mut map = self.load_map()?;
        if map.remove(key).is_some() {
            self.save_map(&map)?;
        }
        Ok(())
    }
}
