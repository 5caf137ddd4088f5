pub mod labels;
pub mod parser;
pub mod source;
pub mod vm;

pub use labels::{discover, LabelTable};
pub use parser::{
    decode_at, disassemble, ArithmeticCommand, FlowCommand, HeapCommand, Instruction, IoCommand,
    Label, StackCommand, WsImpKind, WsInstruction, WsParseError, WsParser,
};
pub use source::{Program, LINE_FEED, SPACE, TAB};
pub use vm::{write_listing, Frame, WsVm, WsVmConfig, WsVmError};

/// Every way a whitespace run can fail. Structural kinds are raised before execution starts,
/// the rest abort the execution pass.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ErrorKind {
    MalformedInstruction,
    MalformedLiteral,
    DuplicateLabel,
    StackUnderflow,
    UndefinedHeapAddress,
    UndefinedLabel,
    ArithmeticError,
    InputExhausted,
    InputFormatError,
    UncleanTermination,
    SubroutineUnderflow,
    CharacterOutOfRange,
    Io,
}

/// Builds a program from `s`, `t` and `n` letters, ignoring everything else
#[cfg(test)]
pub(crate) fn bleach(letters: &str) -> Program {
    let source: String = letters
        .chars()
        .filter_map(|letter| match letter {
            's' => Some(' '),
            't' => Some('\t'),
            'n' => Some('\n'),
            _ => None,
        })
        .collect();

    Program::new(&source)
}
