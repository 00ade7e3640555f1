//! Emitter options.

/// Options for YAML emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitOptions {
    /// Spaces per nesting level, between 2 and 9 (default: 2)
    pub indent: usize,

    /// Soft line width; long strings are folded to stay under it (default: 80)
    pub width: usize,

    /// Write block, inline and end comments (default: true)
    pub process_comments: bool,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            indent: 2,
            width: 80,
            process_comments: true,
        }
    }
}

impl EmitOptions {
    /// Create new default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the indentation width, clamped to `2..=9`.
    pub fn indent(mut self, indent: usize) -> Self {
        self.indent = indent.clamp(2, 9);
        self
    }

    /// Set the soft line width.
    pub fn width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    /// Enable or disable comment output.
    pub fn process_comments(mut self, process_comments: bool) -> Self {
        self.process_comments = process_comments;
        self
    }

    /// Indentation actually used, even if `indent` was set out of range.
    pub(crate) fn indent_width(&self) -> usize {
        self.indent.clamp(2, 9)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indent_is_clamped() {
        assert_eq!(EmitOptions::new().indent(1).indent, 2);
        assert_eq!(EmitOptions::new().indent(12).indent, 9);
        assert_eq!(EmitOptions::new().indent(4).indent, 4);

        let raw = EmitOptions {
            indent: 0,
            ..EmitOptions::default()
        };
        assert_eq!(raw.indent_width(), 2);
    }
}
