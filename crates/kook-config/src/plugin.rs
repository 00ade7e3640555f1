//! Per-plugin configuration files.
//!
//! A plugin keeps its configuration in `config.yml` inside its data folder,
//! and may bundle a default `config.yml` (and other files) as resources.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{ConfigError, Result};
use crate::serialization::SerializationRegistry;
use crate::yaml::YamlConfiguration;

/// Name of the configuration file and of its bundled default.
pub const CONFIG_FILE_NAME: &str = "config.yml";

/// Files bundled with a plugin.
pub trait ResourceSource {
    /// Open the resource at `path` (`/`-separated), if it exists.
    fn open(&self, path: &str) -> Option<Box<dyn Read + '_>>;
}

/// Resources held in memory.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedResources {
    files: HashMap<String, Vec<u8>>,
}

impl EmbeddedResources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource.
    pub fn with(mut self, path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        self.insert(path, contents);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, contents: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), contents.into());
    }
}

impl ResourceSource for EmbeddedResources {
    fn open(&self, path: &str) -> Option<Box<dyn Read + '_>> {
        let contents = self.files.get(path)?;
        Some(Box::new(Cursor::new(contents.as_slice())))
    }
}

/// The configuration of one plugin, with its bundled defaults.
#[derive(Debug)]
pub struct PluginConfigStore<R> {
    config_file: PathBuf,
    data_folder: PathBuf,
    resources: R,
    registry: Arc<SerializationRegistry>,
    config: YamlConfiguration,
}

impl<R: ResourceSource> PluginConfigStore<R> {
    /// A store for `data_folder/config.yml`. Nothing is read until
    /// [`PluginConfigStore::reload_config`].
    pub fn new(data_folder: impl Into<PathBuf>, resources: R) -> Self {
        let data_folder = data_folder.into();
        Self {
            config_file: data_folder.join(CONFIG_FILE_NAME),
            data_folder,
            resources,
            registry: Arc::default(),
            config: YamlConfiguration::new(),
        }
    }

    /// Read the configuration from `config_file` instead.
    pub fn with_config_file(mut self, config_file: impl Into<PathBuf>) -> Self {
        self.config_file = config_file.into();
        self
    }

    pub fn with_registry(mut self, registry: Arc<SerializationRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Path of the configuration file, `data_folder/config.yml` unless changed.
    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    pub fn data_folder(&self) -> &Path {
        &self.data_folder
    }

    pub fn resources(&self) -> &R {
        &self.resources
    }

    pub fn config(&self) -> &YamlConfiguration {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut YamlConfiguration {
        &mut self.config
    }

    /// Read the configuration file again, then use the bundled
    /// `config.yml` as its defaults.
    ///
    /// Never fails: an unreadable file gives an empty configuration.
    pub fn reload_config(&mut self) {
        let mut config = YamlConfiguration::new().with_registry(Arc::clone(&self.registry));
        config.load_or_clear(&self.config_file);

        if let Some(bundled) = self.resources.open(CONFIG_FILE_NAME) {
            let mut defaults = YamlConfiguration::new().with_registry(Arc::clone(&self.registry));
            defaults.load_or_clear_from_reader(bundled);
            config.set_defaults(defaults.into_root());
        }
        self.config = config;
    }

    /// Write the configuration to the configuration file.
    pub fn save_config(&self) -> Result<()> {
        self.config.save(&self.config_file)
    }

    /// Copy the bundled `config.yml` into the data folder, unless a file is
    /// already there.
    pub fn save_default_config(&self) -> Result<()> {
        self.save_resource(CONFIG_FILE_NAME, false, false)
    }

    /// Copy the bundled resource at `path` into the data folder.
    ///
    /// With `ignore_path_structure` only the file name of `path` is kept.
    /// An existing file is only overwritten with `replace`. I/O failures
    /// are logged, not returned; a resource that is not bundled is an error.
    pub fn save_resource(&self, path: &str, replace: bool, ignore_path_structure: bool) -> Result<()> {
        let path = path.replace('\\', "/");
        let mut source = self
            .resources
            .open(&path)
            .ok_or_else(|| ConfigError::MissingResource(path.clone()))?;

        let relative = if ignore_path_structure {
            path.rsplit('/').next().unwrap_or_default()
        } else {
            path.as_str()
        };
        let target = self.data_folder.join(relative);

        if target.exists() && !replace {
            warn!(resource = %path, target = %target.display(), "not saving resource, the file already exists");
            return Ok(());
        }

        if let Err(e) = copy_to(&mut source, &target) {
            warn!(resource = %path, target = %target.display(), error = %e, "cannot save resource");
            return Ok(());
        }
        debug!(resource = %path, target = %target.display(), "saved resource");
        Ok(())
    }
}

fn copy_to(source: &mut dyn Read, target: &Path) -> std::io::Result<()> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = File::create(target)?;
    std::io::copy(source, &mut file)?;
    Ok(())
}
