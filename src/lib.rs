//! Core of a Brookshear simple-machine simulator: a two-pass assembler
//! that turns the editor's classified token stream into a two-byte-per-
//! instruction machine-code image, and an interpreter with 16 registers,
//! 256 bytes of memory, observable mutations, and throttleable stepping.
//!
//! The text editor, its lexer, and the register/memory views are external
//! collaborators; they feed tokens in ([`assembler::Token`]) and render
//! the notifications pushed out ([`machine::MachineObserver`]).

pub mod assembler;
pub mod convert;
pub mod machine;
pub mod test_utils;
