//! A whitespace interpreter.
//!
//! Source text is filtered down to its space, tab and line feed tokens, every label is collected
//! in a discovery pass and the program is then executed instruction by instruction on a stack
//! machine with arbitrary precision integers.

use wasm_bindgen::prelude::wasm_bindgen;

pub mod log;
pub mod ws;

pub use crate::ws::{
    decode_at, disassemble, discover, ErrorKind, Frame, Instruction, Label, LabelTable, Program,
    WsInstruction, WsParseError, WsParser, WsVm, WsVmConfig, WsVmError,
};

/// Runs the whitespace program in `code` against `input` and returns everything it wrote.
///
/// Pass an empty `input` for programs that read nothing.
#[wasm_bindgen]
pub fn whitespace(code: &str, input: &str) -> Result<String, WsVmError> {
    let mut vm = WsVm::from_source(code, input)?;

    vm.run()
}
