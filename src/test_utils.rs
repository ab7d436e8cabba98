//! Stand-ins for the excluded presentation layer: a line tokenizer that
//! reproduces the editor's highlight rules, and an observer that records
//! machine events. Meant for tests and demos; the assembler itself never
//! tokenizes text.

use std::sync::Mutex;

use crate::assembler::Token;
use crate::machine::MachineObserver;

const MNEMONICS: &[&str] = &[
    "ldr", "ldrc", "str", "mov", "add", "fadd", "or", "and", "xor", "ror", "jmp", "hlt",
];

fn is_decimal(word: &str) -> bool {
    !word.is_empty() && word.chars().all(|c| c.is_ascii_digit())
}

fn is_hexadecimal(word: &str) -> bool {
    if let Some(body) = word.strip_prefix("0x").or_else(|| word.strip_prefix("0X")) {
        !body.is_empty() && body.chars().all(|c| c.is_ascii_hexdigit())
    } else if let Some(body) = word.strip_suffix('h').or_else(|| word.strip_suffix('H')) {
        !body.is_empty() && body.chars().all(|c| c.is_ascii_hexdigit())
    } else {
        false
    }
}

fn classify(word: &str, at_line_start: bool) -> &'static [&'static str] {
    if MNEMONICS.contains(&word.to_lowercase().as_str()) {
        &["keyword", "instruction"]
    } else if is_decimal(word) {
        &["constant", "operand", "decimal"]
    } else if is_hexadecimal(word) {
        &["constant", "operand", "hexadecimal"]
    } else if at_line_start {
        // The editor only recognizes labels in column 0; elsewhere a bare
        // identifier stays unclassified until symbol resolution.
        &["entity", "label"]
    } else {
        &["text"]
    }
}

/// Tokenizes one source line the way the editor's highlighter does:
/// `;` comments to end of line, commas, whitespace runs, and words
/// classified as mnemonic, decimal, `0x`/`h` hexadecimal, or label
/// (column 0 only).
pub fn tokenize_line(text: &str, line: usize) -> Vec<Token> {
    let mut tokens = Vec::new();
    let bytes = text.as_bytes();
    let mut column = 0;

    while column < bytes.len() {
        let rest = &text[column..];

        if rest.starts_with(';') {
            tokens.push(Token::new(&["comment", "comment"], rest, column, line));
            break;
        }

        if rest.starts_with(',') {
            tokens.push(Token::new(&["punctuation", "comma"], ",", column, line));
            column += 1;
            continue;
        }

        let run = |pred: fn(char) -> bool| {
            rest.chars().take_while(|&c| pred(c)).map(char::len_utf8).sum::<usize>()
        };

        let length = run(char::is_whitespace);
        if length > 0 {
            tokens.push(Token::new(
                &["text", "whitespace"],
                &rest[..length],
                column,
                line,
            ));
            column += length;
            continue;
        }

        let length = run(|c| !c.is_whitespace() && c != ',' && c != ';');
        let word = &rest[..length];
        tokens.push(Token::new(classify(word, column == 0), word, column, line));
        column += length;
    }

    tokens
}

/// Tokenizes a whole program, one token line per source line, rows
/// numbered from 1.
pub fn tokenize(source: &str) -> Vec<Vec<Token>> {
    source
        .lines()
        .enumerate()
        .map(|(index, text)| tokenize_line(text, index + 1))
        .collect()
}

/// Every notification a [`MachineObserver`] can receive, as data.
#[derive(Debug, Clone, PartialEq)]
pub enum MachineEvent {
    ProgramCounter(u8),
    Register(u8, u8),
    Memory(u8, u8),
    Progress(f32),
    Info(String),
    Error(String),
    Stop,
}

/// Observer that appends every notification to a list, in order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<MachineEvent>>,
}

impl RecordingObserver {
    pub fn new() -> RecordingObserver {
        RecordingObserver::default()
    }

    pub fn events(&self) -> Vec<MachineEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn take_events(&self) -> Vec<MachineEvent> {
        std::mem::take(&mut self.events.lock().unwrap())
    }

    fn push(&self, event: MachineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl MachineObserver for RecordingObserver {
    fn on_program_counter_change(&self, pc: u8) {
        self.push(MachineEvent::ProgramCounter(pc));
    }

    fn on_register_change(&self, register: u8, value: u8) {
        self.push(MachineEvent::Register(register, value));
    }

    fn on_memory_change(&self, address: u8, value: u8) {
        self.push(MachineEvent::Memory(address, value));
    }

    fn on_progress_change(&self, percent: f32) {
        self.push(MachineEvent::Progress(percent));
    }

    fn on_info(&self, message: &str) {
        self.push(MachineEvent::Info(message.to_owned()));
    }

    fn on_error(&self, message: &str) {
        self.push(MachineEvent::Error(message.to_owned()));
    }

    fn on_stop(&self) {
        self.push(MachineEvent::Stop);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::kinds;

    #[test]
    fn labels_only_in_column_zero() {
        let line = tokenize_line("loop: jmp 0x0, loop", 1);
        assert_eq!(line[0].kind(1), kinds::LABEL);
        assert_eq!(line[0].value, "loop:");

        let back_reference = line.last().unwrap();
        assert_eq!(back_reference.value, "loop");
        assert_eq!(back_reference.kind(1), "");
    }

    #[test]
    fn mnemonics_win_over_labels_in_column_zero() {
        let line = tokenize_line("hlt", 1);
        assert_eq!(line[0].kind(1), kinds::INSTRUCTION);
    }

    #[test]
    fn comment_swallows_the_rest_of_the_line() {
        let line = tokenize_line("hlt ; stop here, really", 1);
        assert_eq!(line.len(), 3);
        assert_eq!(line[2].kind(0), kinds::COMMENT);
        assert_eq!(line[2].value, "; stop here, really");
    }

    #[test]
    fn numeric_literal_forms() {
        let line = tokenize_line("ldrc 0x1, 26", 1);
        assert_eq!(line[2].kind(2), "hexadecimal");
        assert_eq!(line[5].kind(2), "decimal");

        let line = tokenize_line("ldrc 0x1, 2Ah", 1);
        assert_eq!(line[5].kind(2), "hexadecimal");
    }

    #[test]
    fn columns_count_from_zero() {
        let line = tokenize_line("  mov 0x1, 0x2", 1);
        assert_eq!(line[0].start, 0); // leading whitespace
        assert_eq!(line[1].start, 2);
        assert_eq!(line[1].value, "mov");
        assert_eq!(line[3].start, 6);
        assert_eq!(line[3].value, "0x1");
    }
}
