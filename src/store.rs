use std::{
    collections::HashMap,
    fs,
    hash::Hash,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    alarm::{AlarmId, PendingTrigger},
    error::{Error, Result},
};

// https://stackoverflow.com/questions/79314434/rust-serde-serialization-to-from-vec-into-hashmap
pub trait GetId<T> {
    fn get_id(&self) -> &T;
}

/// Map keyed by each item's own id, stored on disk as a plain list
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(from = "Vec<V>", into = "Vec<V>")]
pub struct Collection<K, V>
where
    K: Eq + Hash + Clone,
    V: GetId<K> + Clone,
{
    pub data: HashMap<K, V>,
}

impl<K, V> Default for Collection<K, V>
where
    K: Eq + Hash + Clone,
    V: GetId<K> + Clone,
{
    fn default() -> Self {
        Self {
            data: HashMap::new(),
        }
    }
}

impl<K, V> Collection<K, V>
where
    K: Eq + Hash + Clone,
    V: GetId<K> + Clone,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `item`, returning the item it replaced.
    pub fn insert(&mut self, item: V) -> Option<V> {
        let id = item.get_id().to_owned();
        self.data.insert(id, item)
    }
}

impl<K, V> From<Vec<V>> for Collection<K, V>
where
    K: Eq + Hash + Clone,
    V: GetId<K> + Clone,
{
    fn from(value: Vec<V>) -> Self {
        let mut obj: Self = Self::new();
        value.into_iter().for_each(|v| {
            obj.insert(v);
        });
        obj
    }
}

impl<K, V> From<Collection<K, V>> for Vec<V>
where
    K: Eq + Hash + Clone,
    V: GetId<K> + Clone,
{
    fn from(val: Collection<K, V>) -> Self {
        Self::from_iter(val.data.into_values())
    }
}

impl GetId<AlarmId> for PendingTrigger {
    fn get_id(&self) -> &AlarmId {
        &self.id
    }
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    toml::from_str(&contents)
        .map(Some)
        .map_err(|source| Error::Parse {
            path: path.to_path_buf(),
            source,
        })
}

fn write_toml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let contents = toml::to_string(value)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    Ok(())
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PendingFile {
    #[serde(default)]
    triggers: Collection<AlarmId, PendingTrigger>,
}

/// Pending triggers on disk, so they outlive the daemon process.
#[derive(Debug, Clone)]
pub struct PendingStore {
    path: PathBuf,
}

impl PendingStore {
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty store.
    ///
    /// # Errors
    /// If the file exists but can't be read or parsed.
    pub fn load(&self) -> Result<Collection<AlarmId, PendingTrigger>> {
        Ok(read_toml::<PendingFile>(&self.path)?
            .unwrap_or_default()
            .triggers)
    }

    /// # Errors
    /// If the file can't be written.
    pub fn save<'a>(&self, triggers: impl IntoIterator<Item = &'a PendingTrigger>) -> Result<()> {
        let file = PendingFile {
            triggers: Collection::from(triggers.into_iter().cloned().collect::<Vec<_>>()),
        };
        write_toml(&self.path, &file)
    }
}

/// What was ringing when the marker was last written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingingState {
    pub titles: Vec<String>,
    #[serde(default)]
    pub audio: bool,
    #[serde(default)]
    pub vibrate: bool,
}

/// Small file that exists only while a session rings.
#[derive(Debug, Clone)]
pub struct SessionMarker {
    path: PathBuf,
}

impl SessionMarker {
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// # Errors
    /// If the marker exists but can't be read or parsed.
    pub fn load(&self) -> Result<Option<RingingState>> {
        read_toml(&self.path)
    }

    /// # Errors
    /// If the marker can't be written.
    pub fn save(&self, state: &RingingState) -> Result<()> {
        write_toml(&self.path, state)
    }

    /// Removing a marker that isn't there is fine.
    ///
    /// # Errors
    /// If the marker exists and can't be removed.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}
