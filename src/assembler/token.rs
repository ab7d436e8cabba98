/// Classification strings the upstream lexer uses at kind index 1.
///
/// Index 0 is the coarse kind and only matters for spotting comments;
/// index 1 is what the assembler dispatches on. A bare identifier the
/// lexer could not classify carries no kind at index 1 at all.
pub mod kinds {
    pub const COMMENT: &str = "comment";
    pub const WHITESPACE: &str = "whitespace";
    pub const INSTRUCTION: &str = "instruction";
    pub const LABEL: &str = "label";
    pub const OPERAND: &str = "operand";
    pub const COMMA: &str = "comma";
}

/// One classified unit of source text, as handed over by the editor's lexer.
///
/// The assembler never re-tokenizes; the only mutation it performs is the
/// single label-to-constant promotion during symbol resolution (and the
/// trailing-colon strip on label definitions).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    kinds: Vec<String>,
    /// Lexeme text. Rewritten once when a forward reference resolves.
    pub value: String,
    /// Zero-based column of the lexeme in its source line.
    pub start: usize,
    /// One-based row the token belongs to.
    pub line: usize,
}

impl Token {
    pub fn new(kinds: &[&str], value: impl Into<String>, start: usize, line: usize) -> Token {
        Token {
            kinds: kinds.iter().map(|k| k.to_string()).collect(),
            value: value.into(),
            start,
            line,
        }
    }

    /// Classification at `index`, from coarse (0) to fine. Missing indices
    /// read as the empty string rather than an error.
    pub fn kind(&self, index: usize) -> &str {
        self.kinds.get(index).map_or("", String::as_str)
    }

    pub fn set_kinds(&mut self, kinds: &[&str]) {
        self.kinds = kinds.iter().map(|k| k.to_string()).collect();
    }

    /// Column just past the lexeme, where trailing diagnostics point.
    pub fn end(&self) -> usize {
        self.start + self.value.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_kind_reads_as_empty() {
        let token = Token::new(&["text"], "loop", 9, 1);
        assert_eq!(token.kind(0), "text");
        assert_eq!(token.kind(1), "");
        assert_eq!(token.kind(7), "");
    }

    #[test]
    fn promotion_replaces_all_kinds() {
        let mut token = Token::new(&["text"], "loop", 9, 1);
        token.set_kinds(&["constant", "operand", "decimal"]);
        token.value = "4".to_owned();
        assert_eq!(token.kind(1), kinds::OPERAND);
        assert_eq!(token.kind(2), "decimal");
    }

    #[test]
    fn end_is_column_past_lexeme() {
        let token = Token::new(&["entity", "label"], "loop:", 0, 3);
        assert_eq!(token.end(), 5);
    }
}
