use crate::ast::SourceSpan;
use serde::Serialize;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

/// Switch diagnostics to line-oriented JSON for tooling consumers.
pub static ERRORS_AS_JSON: AtomicBool = AtomicBool::new(false);

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Level {
    Error,
    Warning,
    Note,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Error    => "error",
            Level::Warning  => "warning",
            Level::Note     => "note",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub level:      Level,
    pub message:    String,
    pub span:       SourceSpan,
}

/// Accumulator for located findings. Passes write into this and report
/// success or failure; error presence means "do not proceed".
#[derive(Default)]
pub struct DiagBag {
    pub diags: Vec<Diagnostic>,
}

impl DiagBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error<S: Into<String>>(&mut self, message: S, span: SourceSpan) {
        self.diags.push(Diagnostic { level: Level::Error, message: message.into(), span });
    }

    pub fn warn<S: Into<String>>(&mut self, message: S, span: SourceSpan) {
        self.diags.push(Diagnostic { level: Level::Warning, message: message.into(), span });
    }

    pub fn note<S: Into<String>>(&mut self, message: S, span: SourceSpan) {
        self.diags.push(Diagnostic { level: Level::Note, message: message.into(), span });
    }

    pub fn has_errors(&self) -> bool {
        self.diags.iter().any(|d| d.level == Level::Error)
    }

    pub fn has_warnings(&self) -> bool {
        self.diags.iter().any(|d| d.level == Level::Warning)
    }
}

#[derive(Default, Serialize)]
struct JsonDiag {
    message:        String,
    level:          String,
    file_name:      String,
    line_start:     u32,
    line_end:       u32,
    column_start:   u32,
    column_end:     u32,
}

/// Print one diagnostic: the offending source line, a caret, and the
/// message. In JSON mode, one serialized object per line instead.
pub fn print_message<W: Write>(
    out: &mut W,
    src: &str,
    file: &str,
    span: SourceSpan,
    message: &str,
    level: Level,
) {
    if ERRORS_AS_JSON.load(Ordering::SeqCst) {
        let j = JsonDiag {
            message:        message.to_string(),
            level:          level.as_str().to_string(),
            file_name:      file.to_string(),
            line_start:     span.begin.line,
            line_end:       span.end.line,
            column_start:   span.begin.col,
            column_end:     span.end.col,
        };
        let _ = writeln!(out, "{}", serde_json::to_string(&j).unwrap());
        return;
    }

    if span.begin.offset > src.len() {
        let _ = writeln!(out, "{}: {} (invalid source location)", level.as_str(), message);
        return;
    }

    let line_start = src[..span.begin.offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let line_end = src[span.begin.offset..]
        .find('\n')
        .map(|i| span.begin.offset + i)
        .unwrap_or_else(|| src.len());
    let line_content = &src[line_start..line_end];

    let _ = writeln!(out, "{}:{}:{}", file, span.begin.line, span.begin.col);
    let _ = writeln!(out, "{:>4} | {}", span.begin.line, line_content);

    let mut pad = String::new();
    for c in line_content[..span.begin.offset - line_start].chars() {
        pad.push(if c == '\t' { '\t' } else { ' ' });
    }
    let _ = writeln!(out, "     | {}^", pad);
    let _ = writeln!(out, "     | {}{}: {}", pad, level.as_str(), message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::SourcePos;

    #[test]
    fn bag_levels() {
        let mut bag = DiagBag::new();
        assert!(!bag.has_errors());
        bag.warn("w", SourceSpan::default());
        assert!(!bag.has_errors());
        assert!(bag.has_warnings());
        bag.error("e", SourceSpan::default());
        assert!(bag.has_errors());
    }

    #[test]
    fn render_caret() {
        let src = "fun @f(): i32 {\n  bad\n}\n";
        let span = SourceSpan {
            begin: SourcePos { offset: 18, line: 2, col: 3 },
            end:   SourcePos { offset: 21, line: 2, col: 6 },
        };
        let mut out = Vec::new();
        print_message(&mut out, src, "t.sir", span, "mystery token", Level::Error);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("   2 |   bad"));
        assert!(text.contains("error: mystery token"));
    }
}
