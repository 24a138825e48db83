//! Char offsets <-> LSP positions (line + UTF-16 column).

use tower_lsp::lsp_types::{Position, Range};

use maxlink_core::Span;

/// Line starts of a document, in char offsets.
pub struct LineIndex {
    chars: Vec<char>,
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let chars: Vec<char> = text.chars().collect();
        let mut line_starts = vec![0];
        for (idx, ch) in chars.iter().enumerate() {
            if *ch == '\n' {
                line_starts.push(idx + 1);
            }
        }
        Self { chars, line_starts }
    }

    pub fn position(&self, offset: usize) -> Position {
        let offset = offset.min(self.chars.len());
        let line = self.line_starts.partition_point(|&start| start <= offset) - 1;
        let character: usize = self.chars[self.line_starts[line]..offset]
            .iter()
            .map(|c| c.len_utf16())
            .sum();
        Position {
            line: line as u32,
            character: character as u32,
        }
    }

    pub fn range(&self, span: Span) -> Range {
        Range {
            start: self.position(span.start),
            end: self.position(span.end),
        }
    }

    /// Char offset of `pos`, clamped to the end of its line.
    pub fn offset(&self, pos: Position) -> usize {
        let Some(&start) = self.line_starts.get(pos.line as usize) else {
            return self.chars.len();
        };
        let mut units = 0usize;
        for (idx, ch) in self.chars[start..].iter().enumerate() {
            if *ch == '\n' || units >= pos.character as usize {
                return start + idx;
            }
            units += ch.len_utf16();
        }
        self.chars.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(line: u32, character: u32) -> Position {
        Position { line, character }
    }

    #[test]
    fn positions_use_utf16_columns() {
        // "𝄞" is one char but two UTF-16 units.
        let index = LineIndex::new("ab\n𝄞 neural\nx");
        assert_eq!(index.position(0), pos(0, 0));
        assert_eq!(index.position(3), pos(1, 0));
        assert_eq!(index.position(5), pos(1, 3));
        assert_eq!(index.position(12), pos(2, 0));
        assert_eq!(index.position(99), pos(2, 1));
    }

    #[test]
    fn offsets_invert_positions() {
        let text = "ab\n𝄞 neural\nx";
        let index = LineIndex::new(text);
        for offset in 0..=text.chars().count() {
            assert_eq!(index.offset(index.position(offset)), offset);
        }
    }

    #[test]
    fn offset_clamps_to_line_end() {
        let index = LineIndex::new("short\nline");
        assert_eq!(index.offset(pos(0, 40)), 5);
        assert_eq!(index.offset(pos(7, 0)), 10);
    }

    #[test]
    fn range_covers_span() {
        let index = LineIndex::new("a neural network");
        let range = index.range(Span::new(2, 16));
        assert_eq!(range.start, pos(0, 2));
        assert_eq!(range.end, pos(0, 16));
    }
}
