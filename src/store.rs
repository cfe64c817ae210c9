//! Document model store.
//!
//! Holds the current [`ResumeData`] and [`LayoutSettings`] behind an
//! immutable-replace contract: callers build a new document (see
//! [`crate::edit`]) and hand it to [`DocumentStore::replace`], which persists
//! it and notifies subscribers. Persisted state lives under two keys in a
//! [`Storage`] backend, mirroring browser local storage.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde_json::Value;

use crate::dom::escape_text;
use crate::error::Result;
use crate::model::{ResumeData, SectionKey, SectionSettingsMap};
use crate::settings::{LayoutSettings, StoredSettings};

pub const RESUME_DATA_KEY: &str = "resumeData";
pub const LAYOUT_SETTINGS_KEY: &str = "layoutSettings";

/// A string key/value store.
pub trait Storage {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// In-process storage, for tests and ephemeral sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Creates the directory if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path(key)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        fs::write(self.path(key), value)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        match fs::remove_file(self.path(key)) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Observer of store replacements.
pub trait Subscriber {
    fn on_document(&mut self, _doc: &ResumeData) {}
    fn on_settings(&mut self, _settings: &LayoutSettings) {}
}

pub struct DocumentStore<S: Storage> {
    storage: S,
    document: ResumeData,
    settings: LayoutSettings,
    subscribers: Vec<Box<dyn Subscriber>>,
}

impl<S: Storage> DocumentStore<S> {
    /// Load persisted state, falling back to defaults for anything missing
    /// or unreadable.
    pub fn load(storage: S) -> Self {
        let document = match storage.get(RESUME_DATA_KEY) {
            Ok(Some(json)) => parse_document(&json).unwrap_or_else(|e| {
                warn!("Stored resume is unreadable ({e}), using defaults");
                ResumeData::default()
            }),
            Ok(None) => {
                debug!("No stored resume, using defaults");
                ResumeData::default()
            }
            Err(e) => {
                warn!("Could not read stored resume ({e}), using defaults");
                ResumeData::default()
            }
        };

        let settings = match storage.get(LAYOUT_SETTINGS_KEY) {
            Ok(Some(json)) => parse_settings(&json).unwrap_or_else(|e| {
                warn!("Stored layout settings are unreadable ({e}), using defaults");
                LayoutSettings::default()
            }),
            Ok(None) => LayoutSettings::default(),
            Err(e) => {
                warn!("Could not read stored layout settings ({e}), using defaults");
                LayoutSettings::default()
            }
        };

        Self {
            storage,
            document,
            settings,
            subscribers: Vec::new(),
        }
    }

    pub fn document(&self) -> &ResumeData {
        &self.document
    }

    pub fn settings(&self) -> &LayoutSettings {
        &self.settings
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn subscribe(&mut self, subscriber: Box<dyn Subscriber>) {
        self.subscribers.push(subscriber);
    }

    /// Replace the document. The in-memory state and subscribers are always
    /// updated; a persistence failure is logged and returned.
    pub fn replace(&mut self, document: ResumeData) -> Result<()> {
        self.document = document;
        for subscriber in &mut self.subscribers {
            subscriber.on_document(&self.document);
        }
        let persisted = serde_json::to_string(&self.document)
            .map_err(Into::into)
            .and_then(|json| self.storage.set(RESUME_DATA_KEY, &json));
        if let Err(e) = &persisted {
            warn!("Failed to persist resume: {e}");
        }
        persisted
    }

    pub fn replace_settings(&mut self, settings: LayoutSettings) -> Result<()> {
        settings.validate()?;
        self.settings = settings;
        for subscriber in &mut self.subscribers {
            subscriber.on_settings(&self.settings);
        }
        let persisted = serde_json::to_string(&self.settings)
            .map_err(Into::into)
            .and_then(|json| self.storage.set(LAYOUT_SETTINGS_KEY, &json));
        if let Err(e) = &persisted {
            warn!("Failed to persist layout settings: {e}");
        }
        persisted
    }

    /// Persist both documents as they are now.
    pub fn save(&mut self) -> Result<()> {
        let doc = serde_json::to_string(&self.document)?;
        self.storage.set(RESUME_DATA_KEY, &doc)?;
        let settings = serde_json::to_string(&self.settings)?;
        self.storage.set(LAYOUT_SETTINGS_KEY, &settings)
    }

    /// Drop persisted state and go back to defaults.
    pub fn reset(&mut self) -> Result<()> {
        self.storage.remove(RESUME_DATA_KEY)?;
        self.storage.remove(LAYOUT_SETTINGS_KEY)?;
        self.document = ResumeData::default();
        self.settings = LayoutSettings::default();
        for subscriber in &mut self.subscribers {
            subscriber.on_document(&self.document);
            subscriber.on_settings(&self.settings);
        }
        Ok(())
    }
}

/// Parse a stored document, filling fields that older versions did not
/// write.
pub fn parse_document(json: &str) -> Result<ResumeData> {
    let mut value: Value = serde_json::from_str(json)?;
    if let Value::Object(map) = &mut value {
        if !map.contains_key("sectionOrder") {
            debug!("Migrating stored resume: adding sectionOrder");
            map.insert(
                "sectionOrder".to_string(),
                serde_json::to_value(SectionKey::canonical_order())?,
            );
        }
        if !map.contains_key("sections") {
            debug!("Migrating stored resume: adding section settings");
            map.insert(
                "sections".to_string(),
                serde_json::to_value(SectionSettingsMap::default())?,
            );
        }
        for key in ["others", "summary"] {
            migrate_item_list(map.get_mut(key), key);
        }
        for key in ["work", "projects"] {
            if let Some(Value::Array(entries)) = map.get_mut(key) {
                for entry in entries.iter_mut().filter_map(Value::as_object_mut) {
                    migrate_item_list(entry.get_mut("details"), key);
                }
            }
        }
        if let Some(Value::Array(custom)) = map.get_mut("customSections") {
            for section in custom.iter_mut().filter_map(Value::as_object_mut) {
                section
                    .entry("visible")
                    .or_insert_with(|| Value::Bool(true));
            }
        }
    }
    Ok(serde_json::from_value(value)?)
}

/// Older documents stored rich fields as `[{label, content}]` lists; turn
/// such a list into a bullet list in place.
fn migrate_item_list(field: Option<&mut Value>, name: &str) {
    let Some(field) = field else { return };
    let Value::Array(items) = field else { return };
    debug!("Migrating stored resume: {name} item list to rich text");

    let mut html = String::from("<ul>");
    for item in items.iter() {
        let (label, content) = match item {
            Value::String(text) => ("", text.as_str()),
            Value::Object(obj) => (
                obj.get("label").and_then(Value::as_str).unwrap_or(""),
                obj.get("content").and_then(Value::as_str).unwrap_or(""),
            ),
            _ => continue,
        };
        html.push_str("<li>");
        if !label.trim().is_empty() {
            html.push_str("<b>");
            html.push_str(&escape_text(label.trim()));
            html.push_str(":</b> ");
        }
        html.push_str(&escape_text(content));
        html.push_str("</li>");
    }
    html.push_str("</ul>");
    *field = Value::String(if html == "<ul></ul>" { String::new() } else { html });
}

/// Parse stored settings, snapping out-of-range values to allowed ones.
pub fn parse_settings(json: &str) -> Result<LayoutSettings> {
    let stored: StoredSettings = serde_json::from_str(json)?;
    Ok(stored.snapped())
}
