//! Indentation-aware text accumulator used by the emitters

use crate::utils::quote_string;
use crate::WriterSettings;

/// Every emission call takes the writer explicitly; nothing is shared between
/// independent generations.
#[derive(Debug)]
pub struct CodeWriter {
    output: String,
    indent: usize,
    unit: String,
    quote: char,
}

impl CodeWriter {
    pub fn new(settings: &WriterSettings) -> Self {
        let unit = if settings.use_tabs {
            "\t".to_string()
        } else {
            " ".repeat(settings.indent_number_of_spaces)
        };
        Self {
            output: String::new(),
            indent: 0,
            unit,
            quote: if settings.use_single_quote { '\'' } else { '"' },
        }
    }

    /// Write one line at the current indentation. Embedded newlines are indented too.
    pub fn write_line(&mut self, line: &str) {
        for part in line.split('\n') {
            if !part.is_empty() {
                for _ in 0..self.indent {
                    self.output.push_str(&self.unit);
                }
                self.output.push_str(part);
            }
            self.output.push('\n');
        }
    }

    pub fn blank_line(&mut self) {
        self.output.push('\n');
    }

    pub fn indent(&mut self) {
        self.indent += 1;
    }

    pub fn dedent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    /// `open`, the indented body, then `close`.
    pub fn block(&mut self, open: &str, close: &str, body: impl FnOnce(&mut Self)) {
        self.write_line(open);
        self.indent();
        body(self);
        self.dedent();
        self.write_line(close);
    }

    pub fn quote(&self, text: &str) -> String {
        quote_string(text, self.quote)
    }

    pub fn quote_char(&self) -> char {
        self.quote
    }

    pub fn is_empty(&self) -> bool {
        self.output.is_empty()
    }

    pub fn into_string(self) -> String {
        self.output
    }
}
