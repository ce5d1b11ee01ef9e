// Durable sampling state: visited tree nodes and already-uploaded photos

use crate::error::PersistenceError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const PROGRESS_FILE: &str = "sample-progress.json";
pub const PHOTOS_FILE: &str = "sampled-photos.json";

/// Tree level a visited href belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    State,
    County,
    AzFilter,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::State => "state",
            Level::County => "county",
            Level::AzFilter => "az_filter",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hrefs already descended, per level. Serialized as `{href: true}` maps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressState {
    #[serde(default, with = "flag_map")]
    pub sampled_states: BTreeSet<String>,
    #[serde(default, with = "flag_map")]
    pub sampled_counties: BTreeSet<String>,
    #[serde(default, rename = "sampledAZ", with = "flag_map")]
    pub sampled_az: BTreeSet<String>,
}

impl ProgressState {
    pub fn visited(&self, level: Level) -> &BTreeSet<String> {
        match level {
            Level::State => &self.sampled_states,
            Level::County => &self.sampled_counties,
            Level::AzFilter => &self.sampled_az,
        }
    }

    fn visited_mut(&mut self, level: Level) -> &mut BTreeSet<String> {
        match level {
            Level::State => &mut self.sampled_states,
            Level::County => &mut self.sampled_counties,
            Level::AzFilter => &mut self.sampled_az,
        }
    }
}

mod flag_map {
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::{BTreeMap, BTreeSet};

    // Older documents stored some levels as plain arrays
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Stored {
        Flags(BTreeMap<String, bool>),
        List(Vec<String>),
    }

    pub fn serialize<S: Serializer>(set: &BTreeSet<String>, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(set.len()))?;
        for href in set {
            map.serialize_entry(href, &true)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BTreeSet<String>, D::Error> {
        Ok(match Stored::deserialize(deserializer)? {
            Stored::Flags(flags) => flags
                .into_iter()
                .filter(|(_, visited)| *visited)
                .map(|(href, _)| href)
                .collect(),
            Stored::List(hrefs) => hrefs.into_iter().collect(),
        })
    }
}

/// Durable backing for the progress document and the sampled-photo ledger.
///
/// Every `record_*` call must be durable when it returns. Implementations get
/// both the full snapshot and the key that changed so they can either rewrite
/// wholesale or append.
pub trait StateBackend: Send + Sync {
    fn load_progress(&self) -> Result<ProgressState, PersistenceError>;

    fn record_visit(
        &self,
        state: &ProgressState,
        level: Level,
        href: &str,
    ) -> Result<(), PersistenceError>;

    fn load_photos(&self) -> Result<Vec<String>, PersistenceError>;

    fn record_photo(&self, photos: &[String], url: &str) -> Result<(), PersistenceError>;

    /// Forget everything recorded so far.
    fn reset(&self) -> Result<(), PersistenceError>;
}

/// The two JSON documents, rewritten atomically on every change.
#[derive(Debug, Clone)]
pub struct JsonStateFiles {
    progress_path: PathBuf,
    photos_path: PathBuf,
}

impl JsonStateFiles {
    pub fn new(progress_path: impl Into<PathBuf>, photos_path: impl Into<PathBuf>) -> Self {
        Self {
            progress_path: progress_path.into(),
            photos_path: photos_path.into(),
        }
    }

    /// Standard file names inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(PROGRESS_FILE), dir.join(PHOTOS_FILE))
    }

    pub fn progress_path(&self) -> &Path {
        &self.progress_path
    }

    pub fn photos_path(&self) -> &Path {
        &self.photos_path
    }
}

impl StateBackend for JsonStateFiles {
    fn load_progress(&self) -> Result<ProgressState, PersistenceError> {
        read_json_or_default(&self.progress_path)
    }

    fn record_visit(
        &self,
        state: &ProgressState,
        _level: Level,
        _href: &str,
    ) -> Result<(), PersistenceError> {
        write_json_atomic(&self.progress_path, state)
    }

    fn load_photos(&self) -> Result<Vec<String>, PersistenceError> {
        read_json_or_default(&self.photos_path)
    }

    fn record_photo(&self, photos: &[String], _url: &str) -> Result<(), PersistenceError> {
        write_json_atomic(&self.photos_path, &photos)
    }

    fn reset(&self) -> Result<(), PersistenceError> {
        for path in [&self.progress_path, &self.photos_path] {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(PersistenceError::Io {
                        path: path.clone(),
                        source,
                    });
                }
            }
        }
        Ok(())
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PersistenceError + '_ {
    move |source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// A missing document is the normal first-run condition.
fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T, PersistenceError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => return Err(io_error(path)(e)),
    };
    serde_json::from_slice(&bytes).map_err(|source| PersistenceError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Write to a sibling temp file, sync it, then rename over `path`.
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }

    let json = serde_json::to_vec(value).map_err(|source| PersistenceError::Encode {
        path: path.to_path_buf(),
        source,
    })?;

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let mut file = fs::File::create(&tmp_path).map_err(io_error(&tmp_path))?;
    file.write_all(&json).map_err(io_error(&tmp_path))?;
    file.sync_all().map_err(io_error(&tmp_path))?;
    drop(file);

    fs::rename(&tmp_path, path).map_err(io_error(path))
}

/// Visited-node state with write-through persistence.
pub struct ProgressStore {
    backend: Arc<dyn StateBackend>,
    state: ProgressState,
}

impl ProgressStore {
    pub fn load(backend: Arc<dyn StateBackend>) -> Result<Self, PersistenceError> {
        let state = backend.load_progress()?;
        Ok(Self { backend, state })
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    pub fn is_visited(&self, level: Level, href: &str) -> bool {
        self.state.visited(level).contains(href)
    }

    /// Mark `href` visited and flush the whole state before returning. On a
    /// failed flush the in-memory mark is undone so memory matches disk.
    pub fn mark_visited(&mut self, level: Level, href: &str) -> Result<(), PersistenceError> {
        let inserted = self.state.visited_mut(level).insert(href.to_string());

        if let Err(e) = self.backend.record_visit(&self.state, level, href) {
            if inserted {
                self.state.visited_mut(level).remove(href);
            }
            return Err(e);
        }
        Ok(())
    }
}

/// Append-only ledger of photo URLs already uploaded, across runs.
pub struct SampledPhotoSet {
    backend: Arc<dyn StateBackend>,
    urls: Vec<String>,
    index: HashSet<String>,
}

impl SampledPhotoSet {
    pub fn load(backend: Arc<dyn StateBackend>) -> Result<Self, PersistenceError> {
        let mut urls = Vec::new();
        let mut index = HashSet::new();
        for url in backend.load_photos()? {
            if index.insert(url.clone()) {
                urls.push(url);
            }
        }
        Ok(Self {
            backend,
            urls,
            index,
        })
    }

    pub fn contains(&self, url: &str) -> bool {
        self.index.contains(url)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    /// Record `url` and flush. Returns `false` without writing when it was
    /// already present.
    pub fn insert(&mut self, url: &str) -> Result<bool, PersistenceError> {
        if self.index.contains(url) {
            return Ok(false);
        }

        self.urls.push(url.to_string());
        if let Err(e) = self.backend.record_photo(&self.urls, url) {
            self.urls.pop();
            return Err(e);
        }
        self.index.insert(url.to_string());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn json_backend(dir: &TempDir) -> Arc<JsonStateFiles> {
        Arc::new(JsonStateFiles::in_dir(dir.path()))
    }

    #[test]
    fn test_missing_documents_load_empty() {
        let temp_dir = TempDir::new().unwrap();
        let backend = json_backend(&temp_dir);

        let progress = ProgressStore::load(backend.clone()).unwrap();
        let photos = SampledPhotoSet::load(backend).unwrap();

        assert_eq!(progress.state(), &ProgressState::default());
        assert!(photos.is_empty());
    }

    #[test]
    fn test_mark_visited_twice_keeps_valid_document() {
        let temp_dir = TempDir::new().unwrap();
        let backend = json_backend(&temp_dir);
        let mut progress = ProgressStore::load(backend.clone()).unwrap();
        let href = "https://mugshots.com/US-Counties/Ohio/Franklin-County-OH/";

        for _ in 0..2 {
            progress.mark_visited(Level::County, href).unwrap();
            assert!(progress.is_visited(Level::County, href));

            let raw = fs::read_to_string(backend.progress_path()).unwrap();
            let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
            assert_eq!(doc["sampledCounties"][href], serde_json::Value::Bool(true));
            assert_eq!(doc["sampledCounties"].as_object().unwrap().len(), 1);
        }

        assert!(!progress.is_visited(Level::AzFilter, href));
        assert!(!temp_dir.path().join("sample-progress.json.tmp").exists());
    }

    #[test]
    fn test_progress_survives_reload() {
        let temp_dir = TempDir::new().unwrap();
        let backend = json_backend(&temp_dir);

        let mut progress = ProgressStore::load(backend.clone()).unwrap();
        progress.mark_visited(Level::County, "https://a/").unwrap();
        progress.mark_visited(Level::AzFilter, "https://a/?letter=B").unwrap();
        progress.mark_visited(Level::State, "https://s/").unwrap();

        let reloaded = ProgressStore::load(backend).unwrap();
        assert!(reloaded.is_visited(Level::County, "https://a/"));
        assert!(reloaded.is_visited(Level::AzFilter, "https://a/?letter=B"));
        assert!(reloaded.is_visited(Level::State, "https://s/"));
    }

    #[test]
    fn test_reads_legacy_document_shape() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(PROGRESS_FILE),
            r#"{"sampledStates":[],"sampledCounties":{"https://c/":true,"https://d/":false},"sampledAZ":{"https://c/?letter=A":true}}"#,
        )
        .unwrap();

        let progress = ProgressStore::load(json_backend(&temp_dir)).unwrap();
        assert!(progress.is_visited(Level::County, "https://c/"));
        assert!(!progress.is_visited(Level::County, "https://d/"));
        assert!(progress.is_visited(Level::AzFilter, "https://c/?letter=A"));
        assert!(progress.state().sampled_states.is_empty());
    }

    #[test]
    fn test_corrupt_document_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(PROGRESS_FILE), "{not json").unwrap();

        let result = ProgressStore::load(json_backend(&temp_dir));
        assert!(matches!(result, Err(PersistenceError::Decode { .. })));
    }

    #[test]
    fn test_failed_flush_rolls_back_mark() {
        let temp_dir = TempDir::new().unwrap();
        let backend = json_backend(&temp_dir);
        let mut progress = ProgressStore::load(backend.clone()).unwrap();

        // A non-empty directory where the document should go makes the rename fail
        fs::create_dir_all(backend.progress_path().join("inner")).unwrap();
        let result = progress.mark_visited(Level::County, "https://c/");

        assert!(matches!(result, Err(PersistenceError::Io { .. })));
        assert!(!progress.is_visited(Level::County, "https://c/"));
    }

    #[test]
    fn test_photo_set_appends_and_dedups() {
        let temp_dir = TempDir::new().unwrap();
        let backend = json_backend(&temp_dir);
        let mut photos = SampledPhotoSet::load(backend.clone()).unwrap();

        assert!(photos.insert("https://img/mugshot-1.jpg").unwrap());
        assert!(photos.insert("https://img/mugshot-2.jpg").unwrap());
        assert!(!photos.insert("https://img/mugshot-1.jpg").unwrap());

        let raw = fs::read_to_string(backend.photos_path()).unwrap();
        let stored: Vec<String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            stored,
            vec![
                "https://img/mugshot-1.jpg".to_string(),
                "https://img/mugshot-2.jpg".to_string()
            ]
        );

        let reloaded = SampledPhotoSet::load(backend).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.contains("https://img/mugshot-2.jpg"));
    }

    #[test]
    fn test_reset_removes_documents() {
        let temp_dir = TempDir::new().unwrap();
        let backend = json_backend(&temp_dir);
        let mut progress = ProgressStore::load(backend.clone()).unwrap();
        progress.mark_visited(Level::County, "https://c/").unwrap();

        backend.reset().unwrap();
        backend.reset().unwrap();

        assert!(!backend.progress_path().exists());
        assert!(ProgressStore::load(backend).unwrap().state().sampled_counties.is_empty());
    }
}
