//! Two-pass assembler for the Brookshear instruction set.
//!
//! The first pass sizes the machine-code image and binds every label to the
//! byte offset of the instruction that follows it; the second pass resolves
//! forward references, checks line shape, and packs each instruction into
//! its two-byte word. Diagnostics go through a [`DiagnosticSink`]; a fatal
//! error aborts the build and leaves the previous successful image intact.

use std::collections::HashMap;

mod diagnostics;
mod token;

pub use diagnostics::{
    BuildError, Diagnostic, DiagnosticLog, DiagnosticSink, LogSink, Severity,
};
pub use token::{kinds, Token};

const BYTES_PER_INSTRUCTION: usize = 2;
const HALT_OPCODE: u8 = 12;

/// Where one operand lands in the four-nibble instruction word.
struct OperandDraft {
    /// Destination nibble index, 0..=3 (nibble 0 is the opcode).
    offset: usize,
    /// Nibble width, 1 or 2. Multi-nibble operands pack most significant
    /// nibble first.
    width: u32,
}

const REG_THEN_BYTE: &[OperandDraft] = &[
    OperandDraft { offset: 1, width: 1 },
    OperandDraft { offset: 2, width: 2 },
];
const REG_PAIR: &[OperandDraft] = &[
    OperandDraft { offset: 2, width: 1 },
    OperandDraft { offset: 3, width: 1 },
];
const REG_TRIPLE: &[OperandDraft] = &[
    OperandDraft { offset: 1, width: 1 },
    OperandDraft { offset: 2, width: 1 },
    OperandDraft { offset: 3, width: 1 },
];
const REG_SKIP_REG: &[OperandDraft] = &[
    OperandDraft { offset: 1, width: 1 },
    OperandDraft { offset: 3, width: 1 },
];

fn mnemonic_entry(mnemonic: &str) -> Option<(u8, &'static [OperandDraft])> {
    Some(match mnemonic {
        "ldr" => (1, REG_THEN_BYTE),
        "ldrc" => (2, REG_THEN_BYTE),
        "str" => (3, REG_THEN_BYTE),
        "mov" => (4, REG_PAIR),
        "add" => (5, REG_TRIPLE),
        "fadd" => (6, REG_TRIPLE),
        "or" => (7, REG_TRIPLE),
        "and" => (8, REG_TRIPLE),
        "xor" => (9, REG_TRIPLE),
        "ror" => (10, REG_SKIP_REG),
        "jmp" => (11, REG_THEN_BYTE),
        "hlt" => (HALT_OPCODE, &[]),
        _ => return None,
    })
}

/// Indices of the tokens that survive comment/whitespace filtering,
/// in source order. Everything from the first coarse `comment` on is
/// dropped, as are fine `whitespace`/`comment` tokens.
fn significant_indices(line: &[Token]) -> Vec<usize> {
    let mut indices = Vec::new();
    for (i, token) in line.iter().enumerate() {
        if token.kind(0) == kinds::COMMENT {
            break;
        }
        if token.kind(1) == kinds::WHITESPACE || token.kind(1) == kinds::COMMENT {
            continue;
        }
        indices.push(i);
    }
    indices
}

fn parse_operand(value: &str) -> Option<i64> {
    if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()
    } else if value.chars().all(|c| c.is_ascii_digit()) {
        value.parse().ok()
    } else if let Some(hex) = value.strip_suffix('h').or_else(|| value.strip_suffix('H')) {
        i64::from_str_radix(hex, 16).ok()
    } else {
        None
    }
}

fn fail(
    sink: &mut dyn DiagnosticSink,
    line: usize,
    column: usize,
    message: String,
) -> BuildError {
    sink.error(line, column, &message);
    BuildError {
        line,
        column,
        message,
    }
}

pub struct Assembler {
    labels: HashMap<String, usize>,
    machine_code: Vec<u8>,
    source_map: HashMap<usize, usize>,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Assembler {
    pub fn new() -> Assembler {
        Assembler {
            labels: HashMap::new(),
            machine_code: Vec::new(),
            source_map: HashMap::new(),
        }
    }

    /// Drops the label table and the last build. Builds are not
    /// incremental; call this before re-assembling.
    pub fn clear(&mut self) {
        self.labels.clear();
        self.machine_code.clear();
        self.source_map.clear();
    }

    /// Machine-code image of the last successful build.
    pub fn machine_code(&self) -> &[u8] {
        &self.machine_code
    }

    /// Byte offset of each encoded instruction mapped to its one-based
    /// source line, for editor highlighting.
    pub fn source_map(&self) -> &HashMap<usize, usize> {
        &self.source_map
    }

    pub fn label_offset(&self, name: &str) -> Option<usize> {
        self.labels.get(name).copied()
    }

    /// Assembles one token line per source line. On success the new image
    /// replaces the previous one; on failure the previous image and source
    /// map are left untouched. Label references are resolved in place, so
    /// the caller's tokens reflect the promotion afterwards.
    pub fn assemble(
        &mut self,
        lines: &mut [Vec<Token>],
        sink: &mut dyn DiagnosticSink,
    ) -> Result<(), BuildError> {
        let code_size = self.size_and_bind_labels(lines, sink)?;
        let (code, source_map) = self.encode(lines, code_size, sink)?;

        if code.len() >= BYTES_PER_INSTRUCTION
            && code[code.len() - BYTES_PER_INSTRUCTION] >> 4 != HALT_OPCODE
        {
            sink.warning(lines.len(), 0, "No halt instruction at end of program");
        }

        log::debug!("assembled {} bytes", code.len());
        self.machine_code = code;
        self.source_map = source_map;
        Ok(())
    }

    /// Pass 1: every instruction token contributes two bytes; every label
    /// binds to the running size, i.e. the offset of the next instruction.
    fn size_and_bind_labels(
        &mut self,
        lines: &mut [Vec<Token>],
        sink: &mut dyn DiagnosticSink,
    ) -> Result<usize, BuildError> {
        let mut code_size = 0;

        for (index, line) in lines.iter_mut().enumerate() {
            let row = index + 1;
            let significant = significant_indices(line);
            let alone = significant.len() == 1;

            for &i in &significant {
                let token = &mut line[i];
                match token.kind(1) {
                    kinds::INSTRUCTION => code_size += BYTES_PER_INSTRUCTION,
                    kinds::LABEL => {
                        if token.value.ends_with(':') {
                            token.value.pop();
                        } else if alone {
                            sink.warning(
                                row,
                                token.end(),
                                "label alone on a line without a colon might be in error",
                            );
                        }

                        if self.labels.contains_key(&token.value) {
                            let message = format!("label '{}' redefined", token.value);
                            return Err(fail(sink, row, token.start, message));
                        }
                        self.labels.insert(token.value.clone(), code_size);
                    }
                    _ => {}
                }
            }
        }

        Ok(code_size)
    }

    /// Pass 2: resolve bare identifiers against the label table, then
    /// encode one instruction per line into a scratch buffer.
    fn encode(
        &mut self,
        lines: &mut [Vec<Token>],
        code_size: usize,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<(Vec<u8>, HashMap<usize, usize>), BuildError> {
        let mut code = Vec::with_capacity(code_size);
        let mut source_map = HashMap::new();

        for (index, line) in lines.iter_mut().enumerate() {
            let row = index + 1;
            let significant = significant_indices(line);

            // Labels were consumed in pass 1 and carry no encoding.
            let body_start = significant
                .iter()
                .position(|&i| line[i].kind(1) != kinds::LABEL)
                .unwrap_or(significant.len());
            let body = &significant[body_start..];
            if body.is_empty() {
                continue;
            }

            for &i in body {
                if line[i].kind(1).is_empty() {
                    let token = &mut line[i];
                    match self.labels.get(&token.value) {
                        Some(&offset) => {
                            token.value = offset.to_string();
                            token.set_kinds(&["constant", "operand", "decimal"]);
                        }
                        None => {
                            let message = format!("symbol '{}' undefined", token.value);
                            return Err(fail(sink, row, token.start, message));
                        }
                    }
                }
            }

            self.encode_line(row, line, body, &mut code, &mut source_map, sink)?;
        }

        debug_assert_eq!(code.len(), code_size);
        Ok((code, source_map))
    }

    fn encode_line(
        &mut self,
        row: usize,
        line: &[Token],
        body: &[usize],
        code: &mut Vec<u8>,
        source_map: &mut HashMap<usize, usize>,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<(), BuildError> {
        let first = &line[body[0]];
        if first.kind(1) != kinds::INSTRUCTION {
            let message = format!(
                "instruction expected, but found {}: {}",
                first.kind(1),
                first.value
            );
            return Err(fail(sink, row, first.start, message));
        }

        let mnemonic = first.value.to_lowercase();
        let Some((opcode, drafts)) = mnemonic_entry(&mnemonic) else {
            let message = format!("could not resolve instruction: {mnemonic}");
            return Err(fail(sink, row, first.start, message));
        };

        // Operands alternate with single commas, so n operands span 2n - 1
        // tokens (and zero operands span none).
        let expected = (2 * drafts.len()).saturating_sub(1);
        if body.len() - 1 != expected {
            let message = "invalid combination of opcode and operands".to_owned();
            return Err(fail(sink, row, first.end(), message));
        }

        let mut operands = Vec::with_capacity(drafts.len());
        for (position, &i) in body[1..].iter().enumerate() {
            let token = &line[i];
            if position % 2 == 0 {
                if token.kind(1) != kinds::OPERAND {
                    let message = format!(
                        "operand expected, but found {}: {}",
                        token.kind(1),
                        token.value
                    );
                    return Err(fail(sink, row, token.start, message));
                }
                operands.push(token);
            } else if token.kind(1) != kinds::COMMA {
                let message = format!(
                    "comma expected after operand, but found {}: {}",
                    token.kind(1),
                    token.value
                );
                return Err(fail(sink, row, token.start, message));
            }
        }

        let mut nibbles = [opcode, 0, 0, 0];
        for (token, draft) in operands.iter().zip(drafts) {
            let Some(mut value) = parse_operand(&token.value) else {
                let message = format!("invalid operand value: {}", token.value);
                return Err(fail(sink, row, token.start, message));
            };

            let limit = 16i64.pow(draft.width);
            if value >= limit {
                sink.warning(row, token.start, "operand value exceeds bounds");
                value = value.rem_euclid(limit);
            }

            for j in 0..draft.width as usize {
                let shift = (draft.width as usize - 1 - j) * 4;
                nibbles[draft.offset + j] = ((value >> shift) & 0xF) as u8;
            }
        }

        source_map.insert(code.len(), row);
        code.push(nibbles[0] << 4 | nibbles[1]);
        code.push(nibbles[2] << 4 | nibbles[3]);
        Ok(())
    }
}
