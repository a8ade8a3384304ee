//! Diagnostic rendering for parser errors.

use ariadne::{Color, Label, Report, ReportKind, Source};

use crate::error::ParserError;

impl ParserError {
    /// Render this error with ariadne.
    ///
    /// Returns a string containing the formatted error message with source
    /// context. `source` is the accumulated document text, as returned by
    /// [`crate::ParserState::source`].
    pub fn render(&self, filename: &str, source: &str) -> String {
        let mut output = Vec::new();
        self.write_report(filename, source, &mut output);
        String::from_utf8(output).unwrap_or_else(|_| format!("{}", self))
    }

    /// Write the error report to a writer.
    pub fn write_report<W: std::io::Write>(&self, filename: &str, source: &str, writer: W) {
        let report = self.build_report(filename, source);
        let _ = report
            .finish()
            .write((filename, Source::from(source)), writer);
    }

    fn build_report<'a>(
        &self,
        filename: &'a str,
        source: &str,
    ) -> ariadne::ReportBuilder<'static, (&'a str, std::ops::Range<usize>)> {
        let range = match self.offset() {
            Some(offset) if offset < source.len() => offset..offset + 1,
            _ => source.len()..source.len(),
        };

        match self {
            ParserError::Syntax { message, .. } => {
                Report::build(ReportKind::Error, (filename, range.clone()))
                    .with_message(message.clone())
                    .with_label(
                        Label::new((filename, range))
                            .with_message("unexpected input here")
                            .with_color(Color::Red),
                    )
            }

            ParserError::UnexpectedEnd { .. } => {
                Report::build(ReportKind::Error, (filename, range.clone()))
                    .with_message("unexpected end of input")
                    .with_label(
                        Label::new((filename, range))
                            .with_message("input ends here")
                            .with_color(Color::Red),
                    )
                    .with_help("the document has an unclosed value; more input was expected")
            }

            ParserError::SchemaInvalid { path, reason } => {
                Report::build(ReportKind::Error, (filename, range.clone()))
                    .with_message(format!("schema mismatch at {}", path))
                    .with_label(
                        Label::new((filename, range))
                            .with_message(reason.clone())
                            .with_color(Color::Red),
                    )
            }
        }
    }
}
