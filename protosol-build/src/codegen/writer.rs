//! Line-oriented, indentation-aware text buffer for emitting Solidity.

const INDENT: &str = "    ";

#[derive(Debug, Default)]
pub struct CodeWriter {
    buf: String,
    depth: usize,
}

impl CodeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write one line at the current depth.
    pub fn line(&mut self, line: impl AsRef<str>) {
        let line = line.as_ref();
        if !line.is_empty() {
            for _ in 0..self.depth {
                self.buf.push_str(INDENT);
            }
            self.buf.push_str(line);
        }
        self.buf.push('\n');
    }

    pub fn blank(&mut self) {
        self.buf.push('\n');
    }

    /// Write `header` and indent until the matching [`CodeWriter::close`].
    pub fn open(&mut self, header: impl AsRef<str>) {
        self.line(header);
        self.depth += 1;
    }

    /// Dedent and write `footer`.
    pub fn close(&mut self, footer: impl AsRef<str>) {
        self.depth = self.depth.saturating_sub(1);
        self.line(footer);
    }

    /// Dedent for one line, e.g. `} else {`, and indent again.
    pub fn reopen(&mut self, line: impl AsRef<str>) {
        self.depth = self.depth.saturating_sub(1);
        self.line(line);
        self.depth += 1;
    }

    /// `if (<condition>) { <statement> }` on three lines.
    pub fn guard(&mut self, condition: impl AsRef<str>, statement: impl AsRef<str>) {
        self.open(format!("if ({}) {{", condition.as_ref()));
        self.line(statement);
        self.close("}");
    }

    pub fn finish(self) -> String {
        self.buf
    }
}
