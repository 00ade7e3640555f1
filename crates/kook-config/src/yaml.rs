//! YAML-backed configurations.

use std::io::{Read, Write};
use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::sync::Arc;

use kook_yaml_format::{EmitOptions, Emitter};
use kook_yaml_tree::{Document, LineIndex, MappingNode, Node, NodeKind, ParseOptions, parse_with};
use tracing::{debug, error};

use crate::error::{ConfigError, FormatError, Result};
use crate::options::YamlConfigurationOptions;
use crate::section::ConfigurationSection;
use crate::serialization::SerializationRegistry;
use crate::translate::{Translator, comments_from_nodes, comments_to_nodes, load_header, save_header, split_header};

/// A configuration read from and written to YAML, comments included.
///
/// Dereferences to its root [`ConfigurationSection`].
///
/// ```
/// use kook_config::YamlConfiguration;
///
/// let mut config = YamlConfiguration::new();
/// config.load_from_str("# bot settings\n\n# the prefix\nprefix: '!'\n").unwrap();
/// assert_eq!(config.get_string("prefix"), Some("!"));
/// assert_eq!(config.options().header, vec![Some("bot settings".to_string())]);
///
/// config.set("owner", "alice");
/// assert_eq!(
///     config.save_to_string(),
///     "# bot settings\n\n# the prefix\nprefix: '!'\nowner: alice\n"
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct YamlConfiguration {
    root: ConfigurationSection,
    options: YamlConfigurationOptions,
    registry: Arc<SerializationRegistry>,
}

impl YamlConfiguration {
    /// An empty configuration with default options and no registered types.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty configuration using `options`.
    pub fn with_options(options: YamlConfigurationOptions) -> Self {
        Self {
            root: ConfigurationSection::with_options(options.base),
            options,
            registry: Arc::default(),
        }
    }

    /// Use `registry` to reconstruct typed objects.
    pub fn with_registry(mut self, registry: Arc<SerializationRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Formatting, comment and path options, including the header and footer.
    pub fn options(&self) -> &YamlConfigurationOptions {
        &self.options
    }

    /// Change the options. Path options apply to the sections when the
    /// returned guard is dropped.
    pub fn options_mut(&mut self) -> OptionsMut<'_> {
        OptionsMut { config: self }
    }

    /// Types used to reconstruct `==`-tagged mappings on load.
    pub fn registry(&self) -> &Arc<SerializationRegistry> {
        &self.registry
    }

    /// The root section. `YamlConfiguration` also derefs to it.
    pub fn root(&self) -> &ConfigurationSection {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut ConfigurationSection {
        &mut self.root
    }

    /// The root section, e.g. to use a loaded file as another's defaults.
    pub fn into_root(self) -> ConfigurationSection {
        self.root
    }

    // Loading

    /// Replace the contents of this configuration with `contents`.
    ///
    /// Empty text (or text made only of whitespace and NUL bytes) leaves an
    /// empty configuration. The top level must be a mapping.
    pub fn load_from_str(&mut self, contents: &str) -> Result<(), FormatError> {
        let contents = contents.strip_prefix('\u{feff}').unwrap_or(contents);
        let parse_options = ParseOptions::new().process_comments(self.options.parse_comments);
        let Document { root, end_comments } =
            parse_with(contents, parse_options).map_err(|e| FormatError::from_parse(e, contents))?;

        let Some(root) = root else {
            debug!("configuration text has no content");
            self.root.clear();
            return Ok(());
        };
        let Node {
            kind,
            block_comments,
            end_comments: root_end_comments,
            span,
            ..
        } = root;
        let NodeKind::Mapping(mut mapping) = kind else {
            let lines = LineIndex::new(contents);
            return Err(FormatError::at("top level is not a mapping", span, Some(&lines)));
        };

        // The comments above the first key hold the document header, up to
        // the last blank line.
        let mut header = block_comments;
        if header.is_empty()
            && let Some(first) = mapping.entries.first_mut()
        {
            let (head, rest) = split_header(std::mem::take(&mut first.key.block_comments));
            header = head;
            first.key.block_comments = rest;
        }

        self.root.clear();
        self.options.header = load_header(comments_from_nodes(&header));
        let mut footer = comments_from_nodes(&root_end_comments);
        footer.extend(comments_from_nodes(&end_comments));
        self.options.footer = footer;

        Translator::new(&self.registry, self.root.options())
            .with_source(contents)
            .from_node_tree(&mapping, &mut self.root)?;
        debug!(keys = self.root.len(), "loaded configuration");
        Ok(())
    }

    /// Read all of `reader` and load it.
    pub fn load_from_reader(&mut self, mut reader: impl Read) -> Result<()> {
        let mut contents = String::new();
        reader.read_to_string(&mut contents)?;
        self.load_from_str(&contents)?;
        Ok(())
    }

    /// Load the file at `path`.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let contents = std::fs::read_to_string(path)?;
        self.load_from_str(&contents)?;
        Ok(())
    }

    /// Load the file at `path`. Failures are logged and leave the
    /// configuration empty; a missing file is not a failure.
    pub fn load_or_clear(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        match self.load(path) {
            Ok(()) => {}
            Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "configuration file does not exist");
                self.root.clear();
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "cannot load configuration");
                self.root.clear();
            }
        }
    }

    /// Load from `reader`. Failures are logged and leave the configuration
    /// empty.
    pub fn load_or_clear_from_reader(&mut self, reader: impl Read) {
        if let Err(e) = self.load_from_reader(reader) {
            error!(error = %e, "cannot load configuration");
            self.root.clear();
        }
    }

    /// Create a configuration from the file at `path`, never failing.
    ///
    /// See [`YamlConfiguration::load_or_clear`].
    pub fn load_configuration(path: impl AsRef<Path>) -> Self {
        let mut config = Self::new();
        config.load_or_clear(path);
        config
    }

    /// Create a configuration from `reader`, never failing.
    pub fn load_configuration_from_reader(reader: impl Read) -> Self {
        let mut config = Self::new();
        config.load_or_clear_from_reader(reader);
        config
    }

    // Saving

    /// Write this configuration as YAML.
    ///
    /// An empty configuration without header or footer is the empty string.
    pub fn save_to_string(&self) -> String {
        let translator = Translator::new(&self.registry, self.root.options());
        let mut node = translator.to_node_tree(&self.root);
        node.block_comments = comments_to_nodes(&save_header(&self.options.header), false);
        node.end_comments = comments_to_nodes(&self.options.footer, false);

        let is_empty = node.as_mapping().is_some_and(MappingNode::is_empty);
        if is_empty && node.block_comments.is_empty() && node.end_comments.is_empty() {
            return String::new();
        }
        if let NodeKind::Mapping(mapping) = &mut node.kind {
            mapping.flow = is_empty;
        }

        let emit_options = EmitOptions::new()
            .indent(self.options.indent)
            .width(self.options.width)
            .process_comments(self.options.parse_comments);
        Emitter::with_options(emit_options).emit(&node)
    }

    /// Write this configuration as YAML to `writer` and flush it.
    pub fn save_to_writer(&self, mut writer: impl Write) -> Result<()> {
        writer.write_all(self.save_to_string().as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    /// Write this configuration to `path`, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.save_to_string())?;
        debug!(path = %path.display(), "saved configuration");
        Ok(())
    }
}

impl Deref for YamlConfiguration {
    type Target = ConfigurationSection;

    fn deref(&self) -> &ConfigurationSection {
        &self.root
    }
}

impl DerefMut for YamlConfiguration {
    fn deref_mut(&mut self) -> &mut ConfigurationSection {
        &mut self.root
    }
}

/// Mutable access to [`YamlConfigurationOptions`], returned by
/// [`YamlConfiguration::options_mut`].
pub struct OptionsMut<'a> {
    config: &'a mut YamlConfiguration,
}

impl Deref for OptionsMut<'_> {
    type Target = YamlConfigurationOptions;

    fn deref(&self) -> &YamlConfigurationOptions {
        &self.config.options
    }
}

impl DerefMut for OptionsMut<'_> {
    fn deref_mut(&mut self) -> &mut YamlConfigurationOptions {
        &mut self.config.options
    }
}

impl Drop for OptionsMut<'_> {
    fn drop(&mut self) {
        let config = &mut *self.config;
        config.options.indent = config.options.indent.clamp(2, 9);
        config.root.set_options(config.options.base);
    }
}
