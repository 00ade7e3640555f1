//! Diagnostic rendering for parser errors.

use ariadne::{Color, Label, Report, ReportKind, Source};
use kook_yaml_tokenizer::Span;

/// The kind of parse error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// A token that cannot appear here.
    UnexpectedToken,
    /// Input the tokenizer could not make sense of (`?`, `%`, `@`, ...).
    InvalidToken,
    /// A quoted scalar without its closing quote.
    UnterminatedScalar,
    /// Expected a mapping key.
    ExpectedKey,
    /// A key not followed by `:`.
    ExpectedMappingValue,
    /// Content indented deeper than its block allows.
    BadIndentation,
    /// `[` without matching `]`.
    UnclosedFlowSequence,
    /// `{` without matching `}`.
    UnclosedFlowMapping,
    /// `*name` with no earlier `&name`.
    UnknownAnchor(String),
    /// Invalid escape in a double-quoted scalar.
    InvalidEscape(String),
    /// More than one document in the stream.
    MultipleDocuments,
}

/// A parser error with source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// The kind of error.
    pub kind: ParseErrorKind,
    /// Source location.
    pub span: Span,
}

impl ParseError {
    /// Create a new parse error.
    pub fn new(kind: ParseErrorKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// 1-based line and column of the error start.
    pub fn line_col(&self, source: &str) -> (usize, usize) {
        LineIndex::new(source).line_col(self.span.start)
    }

    /// Render this error with ariadne.
    ///
    /// Returns a string containing the formatted error message with source context.
    pub fn render(&self, filename: &str, source: &str) -> String {
        let mut output = Vec::new();
        self.write_report(filename, source, &mut output);
        String::from_utf8(output).unwrap_or_else(|_| format!("{}", self))
    }

    /// Write the error report to a writer.
    pub fn write_report<W: std::io::Write>(&self, filename: &str, source: &str, writer: W) {
        let report = self.build_report(filename);
        let _ = report
            .finish()
            .write((filename, Source::from(source)), writer);
    }

    fn build_report<'a>(
        &self,
        filename: &'a str,
    ) -> ariadne::ReportBuilder<'static, (&'a str, std::ops::Range<usize>)> {
        let range: std::ops::Range<usize> = self.span.into();
        let label = |message: &str| {
            Label::new((filename, range.clone()))
                .with_message(message.to_string())
                .with_color(Color::Red)
        };
        let report = Report::build(ReportKind::Error, (filename, range.clone()))
            .with_message(self.message());

        match &self.kind {
            ParseErrorKind::UnexpectedToken => report.with_label(label("unexpected")),

            ParseErrorKind::InvalidToken => report
                .with_label(label("not supported here"))
                .with_help("complex keys, directives and reserved indicators are not supported"),

            ParseErrorKind::UnterminatedScalar => report
                .with_label(label("quoted scalar starts here"))
                .with_help("add the closing quote"),

            ParseErrorKind::ExpectedKey => report.with_label(label("expected a key here")),

            ParseErrorKind::ExpectedMappingValue => report
                .with_label(label("key is not followed by ':'"))
                .with_help("separate keys from values with ': '"),

            ParseErrorKind::BadIndentation => report
                .with_label(label("indented too far"))
                .with_help("entries of one mapping or sequence must share the same indentation"),

            ParseErrorKind::UnclosedFlowSequence => report
                .with_label(label("sequence opened here"))
                .with_help("add a closing ']'"),

            ParseErrorKind::UnclosedFlowMapping => report
                .with_label(label("mapping opened here"))
                .with_help("add a closing '}'"),

            ParseErrorKind::UnknownAnchor(_) => report
                .with_label(label("alias used here"))
                .with_help("anchors must be declared with '&name' before they are used"),

            ParseErrorKind::InvalidEscape(_) => report
                .with_label(label("invalid escape"))
                .with_help("valid escapes include \\\\, \\\", \\n, \\t, \\xXX, \\uXXXX and \\UXXXXXXXX"),

            ParseErrorKind::MultipleDocuments => report
                .with_label(label("second document starts here"))
                .with_help("a configuration file holds exactly one document"),
        }
    }

    fn message(&self) -> String {
        match &self.kind {
            ParseErrorKind::UnexpectedToken => "unexpected token".to_string(),
            ParseErrorKind::InvalidToken => "unsupported syntax".to_string(),
            ParseErrorKind::UnterminatedScalar => "unterminated quoted scalar".to_string(),
            ParseErrorKind::ExpectedKey => "expected key".to_string(),
            ParseErrorKind::ExpectedMappingValue => "expected ':' after key".to_string(),
            ParseErrorKind::BadIndentation => "bad indentation".to_string(),
            ParseErrorKind::UnclosedFlowSequence => "unclosed flow sequence".to_string(),
            ParseErrorKind::UnclosedFlowMapping => "unclosed flow mapping".to_string(),
            ParseErrorKind::UnknownAnchor(name) => format!("unknown anchor '{}'", name),
            ParseErrorKind::InvalidEscape(seq) => format!("invalid escape sequence '{}'", seq),
            ParseErrorKind::MultipleDocuments => "multiple documents in one stream".to_string(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at offset {}", self.message(), self.span.start)
    }
}

impl std::error::Error for ParseError {}

/// Maps byte offsets to 1-based line and column numbers.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<u32>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            source
                .match_indices('\n')
                .map(|(i, _)| i as u32 + 1),
        );
        LineIndex { line_starts }
    }

    /// 0-based line containing `offset`.
    pub fn line(&self, offset: u32) -> usize {
        self.line_starts.partition_point(|start| *start <= offset) - 1
    }

    /// 0-based column (in bytes) of `offset`.
    pub fn column(&self, offset: u32) -> u32 {
        offset - self.line_starts[self.line(offset)]
    }

    /// 1-based `(line, column)` of `offset`.
    pub fn line_col(&self, offset: u32) -> (usize, usize) {
        let line = self.line(offset);
        (line + 1, (offset - self.line_starts[line]) as usize + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_error(source: &str) -> ParseError {
        match crate::parse(source) {
            Ok(doc) => panic!("expected an error, got {doc:?}"),
            Err(e) => e,
        }
    }

    #[test]
    fn test_line_index() {
        let index = LineIndex::new("ab\ncd\n\nef");
        assert_eq!(index.line_col(0), (1, 1));
        assert_eq!(index.line_col(4), (2, 2));
        assert_eq!(index.line_col(6), (3, 1));
        assert_eq!(index.line_col(8), (4, 2));
        assert_eq!(index.column(8), 1);
    }

    #[test]
    fn test_display_includes_offset() {
        let err = first_error("a: [1, 2");
        assert_eq!(err.kind, ParseErrorKind::UnclosedFlowSequence);
        assert_eq!(err.to_string(), "unclosed flow sequence at offset 3");
    }

    #[test]
    fn test_render_mentions_file_and_message() {
        let source = "name: \"hello\\qworld\"";
        let err = first_error(source);
        assert_eq!(err.kind, ParseErrorKind::InvalidEscape("\\q".to_string()));
        let rendered = err.render("config.yml", source);
        assert!(rendered.contains("config.yml"));
        assert!(rendered.contains("invalid escape sequence"));
    }

    #[test]
    fn test_line_col_of_error() {
        let source = "a: 1\nb: *missing\n";
        let err = first_error(source);
        assert_eq!(err.kind, ParseErrorKind::UnknownAnchor("missing".to_string()));
        assert_eq!(err.line_col(source), (2, 4));
    }
}
