//! Configuration options.

/// Options shared by every section of one configuration tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigurationOptions {
    /// Separator between path segments (default: `.`)
    pub path_separator: char,

    /// Include default values the configuration does not set when listing
    /// keys or values and when saving (default: false)
    pub copy_defaults: bool,
}

impl Default for ConfigurationOptions {
    fn default() -> Self {
        Self {
            path_separator: '.',
            copy_defaults: false,
        }
    }
}

impl ConfigurationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Character splitting paths into keys (`.` by default).
    pub fn path_separator(mut self, separator: char) -> Self {
        self.path_separator = separator;
        self
    }

    /// Also write default values that are not overridden when saving.
    pub fn copy_defaults(mut self, copy_defaults: bool) -> Self {
        self.copy_defaults = copy_defaults;
        self
    }
}

/// Options of a YAML-backed configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YamlConfigurationOptions {
    pub base: ConfigurationOptions,

    /// Comment lines written at the top of the file; `None` is a blank line
    pub header: Vec<Option<String>>,

    /// Comment lines written at the end of the file; `None` is a blank line
    pub footer: Vec<Option<String>>,

    /// Read and write comments (default: true)
    pub parse_comments: bool,

    /// Spaces per nesting level, between 2 and 9 (default: 2)
    pub indent: usize,

    /// Soft line width (default: 80)
    pub width: usize,
}

impl Default for YamlConfigurationOptions {
    fn default() -> Self {
        Self {
            base: ConfigurationOptions::default(),
            header: Vec::new(),
            footer: Vec::new(),
            parse_comments: true,
            indent: 2,
            width: 80,
        }
    }
}

impl YamlConfigurationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base(mut self, base: ConfigurationOptions) -> Self {
        self.base = base;
        self
    }

    pub fn header(mut self, header: Vec<Option<String>>) -> Self {
        self.header = header;
        self
    }

    pub fn footer(mut self, footer: Vec<Option<String>>) -> Self {
        self.footer = footer;
        self
    }

    /// Read and write comments (on by default).
    pub fn parse_comments(mut self, parse_comments: bool) -> Self {
        self.parse_comments = parse_comments;
        self
    }

    /// Set the indentation width, clamped to `2..=9`.
    pub fn indent(mut self, indent: usize) -> Self {
        self.indent = indent.clamp(2, 9);
        self
    }

    /// Preferred line width; longer strings are folded where possible.
    pub fn width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = YamlConfigurationOptions::new();
        assert_eq!(options.base.path_separator, '.');
        assert!(!options.base.copy_defaults);
        assert!(options.parse_comments);
        assert_eq!((options.indent, options.width), (2, 80));
    }

    #[test]
    fn test_indent_clamped() {
        assert_eq!(YamlConfigurationOptions::new().indent(0).indent, 2);
        assert_eq!(YamlConfigurationOptions::new().indent(10).indent, 9);
    }
}
