use crate::ws::source::{visible, Program, LINE_FEED, SPACE, TAB};
use crate::ws::ErrorKind;
use num_bigint::BigInt;
use num_traits::Zero;
use std::error::Error;
use std::fmt::Display;
use std::rc::Rc;
use wasm_bindgen::JsValue;

#[derive(Debug)]
pub(crate) enum WsParseErrorKind {
    UnexpectedToken(usize, u8, Vec<u8>),
    UnexpectedEnd(usize, Vec<u8>),
    EmptyNumber(usize),
    UnterminatedNumber(usize),
    UnterminatedLabel(usize),
    DuplicateLabel(usize, Label),
    #[allow(unused)]
    FileOpenError(Box<dyn Error>),
    #[allow(unused)]
    MemoryMapError(Box<dyn Error>),
}

impl WsParseErrorKind {
    pub(crate) fn throw<T>(self) -> Result<T, WsParseError> {
        let msg = match &self {
            WsParseErrorKind::UnexpectedToken(pos, token, tokens) => format!(
                "unexpected token at position {}, expected one of {:?}, but got {}",
                pos,
                tokens.iter().map(|b| visible(*b)).collect::<Vec<_>>(),
                visible(*token)
            ),
            WsParseErrorKind::UnexpectedEnd(pos, tokens) => format!(
                "program ended in the middle of an instruction at position {}, expected one of {:?}",
                pos,
                tokens.iter().map(|b| visible(*b)).collect::<Vec<_>>(),
            ),
            WsParseErrorKind::EmptyNumber(pos) => {
                format!("number literal at position {} has no sign", pos)
            }
            WsParseErrorKind::UnterminatedNumber(pos) => {
                format!("number literal at position {} is missing its terminal", pos)
            }
            WsParseErrorKind::UnterminatedLabel(pos) => {
                format!("label literal at position {} is missing its terminal", pos)
            }
            WsParseErrorKind::DuplicateLabel(pos, label) => {
                format!("label {} redefined at position {}", label, pos)
            }
            WsParseErrorKind::FileOpenError(err) => {
                format!("failed to open file, details: {}", err)
            }
            WsParseErrorKind::MemoryMapError(err) => {
                format!("failed to memory map file, details: {}", err)
            }
        };
        Err(WsParseError { msg, kind: self })
    }
}

impl Display for WsParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug)]
pub struct WsParseError {
    pub(crate) msg: String,
    pub(crate) kind: WsParseErrorKind,
}

impl WsParseError {
    /// The category of structural failure
    pub fn kind(&self) -> ErrorKind {
        match self.kind {
            WsParseErrorKind::UnexpectedToken(..) | WsParseErrorKind::UnexpectedEnd(..) => {
                ErrorKind::MalformedInstruction
            }
            WsParseErrorKind::EmptyNumber(_)
            | WsParseErrorKind::UnterminatedNumber(_)
            | WsParseErrorKind::UnterminatedLabel(_) => ErrorKind::MalformedLiteral,
            WsParseErrorKind::DuplicateLabel(..) => ErrorKind::DuplicateLabel,
            WsParseErrorKind::FileOpenError(_) | WsParseErrorKind::MemoryMapError(_) => {
                ErrorKind::Io
            }
        }
    }

    /// Token offset at which decoding failed, if the failure belongs to the program text
    pub fn position(&self) -> Option<usize> {
        match self.kind {
            WsParseErrorKind::UnexpectedToken(pos, ..)
            | WsParseErrorKind::UnexpectedEnd(pos, _)
            | WsParseErrorKind::EmptyNumber(pos)
            | WsParseErrorKind::UnterminatedNumber(pos)
            | WsParseErrorKind::UnterminatedLabel(pos)
            | WsParseErrorKind::DuplicateLabel(pos, _) => Some(pos),
            WsParseErrorKind::FileOpenError(_) | WsParseErrorKind::MemoryMapError(_) => None,
        }
    }

    pub fn message(&self) -> &str {
        &self.msg
    }
}

impl From<WsParseError> for JsValue {
    fn from(err: WsParseError) -> JsValue {
        JsValue::from(format!("wspace error occurred: {}, {}", err.kind, err.msg))
    }
}

impl Display for WsParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.msg)
    }
}

impl Error for WsParseError {}

/// Identity of a jump target: the raw space/tab sequence, without its terminal
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct Label(Rc<str>);

impl Label {
    pub fn new(tokens: &str) -> Label {
        Label(tokens.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let letters: String = self.0.bytes().map(visible).collect();
        write!(f, "\"{}\"", letters)
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum WsImpKind {
    Stack,
    Arithmetic,
    Heap,
    Flow,
    IO,
}

#[derive(Debug, PartialEq, Clone)]
pub enum StackCommand {
    Push(BigInt),
    Duplicate,
    CopyNth(BigInt),
    Swap,
    Discard,
    SlideN(BigInt),
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum ArithmeticCommand {
    Add,
    Subtract,
    Multiply,
    IntegerDivision,
    Modulo,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum HeapCommand {
    Store,
    Retrieve,
}

#[derive(Debug, PartialEq, Clone)]
pub enum FlowCommand {
    Mark(Label),
    Call(Label),
    Jump(Label),
    JumpZero(Label),
    JumpNegative(Label),
    Return,
    Exit,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum IoCommand {
    OutCharacter,
    OutInteger,
    ReadCharacter,
    ReadInteger,
}

/// A decoded command, tagged with the instruction family its prefix selected
#[derive(Debug, PartialEq, Clone)]
pub enum Instruction {
    Stack(StackCommand),
    Arithmetic(ArithmeticCommand),
    Heap(HeapCommand),
    Flow(FlowCommand),
    IO(IoCommand),
}

impl Instruction {
    pub fn imp(&self) -> WsImpKind {
        match self {
            Instruction::Stack(_) => WsImpKind::Stack,
            Instruction::Arithmetic(_) => WsImpKind::Arithmetic,
            Instruction::Heap(_) => WsImpKind::Heap,
            Instruction::Flow(_) => WsImpKind::Flow,
            Instruction::IO(_) => WsImpKind::IO,
        }
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Instruction::Stack(cmd) => match cmd {
                StackCommand::Push(num) => write!(f, "push {}", num),
                StackCommand::Duplicate => write!(f, "dup"),
                StackCommand::CopyNth(num) => write!(f, "copy {}", num),
                StackCommand::Swap => write!(f, "swap"),
                StackCommand::Discard => write!(f, "drop"),
                StackCommand::SlideN(num) => write!(f, "slide {}", num),
            },
            Instruction::Arithmetic(cmd) => match cmd {
                ArithmeticCommand::Add => write!(f, "add"),
                ArithmeticCommand::Subtract => write!(f, "sub"),
                ArithmeticCommand::Multiply => write!(f, "mul"),
                ArithmeticCommand::IntegerDivision => write!(f, "div"),
                ArithmeticCommand::Modulo => write!(f, "mod"),
            },
            Instruction::Heap(cmd) => match cmd {
                HeapCommand::Store => write!(f, "store"),
                HeapCommand::Retrieve => write!(f, "retrieve"),
            },
            Instruction::Flow(cmd) => match cmd {
                FlowCommand::Mark(label) => write!(f, "label {}", label),
                FlowCommand::Call(label) => write!(f, "call {}", label),
                FlowCommand::Jump(label) => write!(f, "jmp {}", label),
                FlowCommand::JumpZero(label) => write!(f, "jz {}", label),
                FlowCommand::JumpNegative(label) => write!(f, "jn {}", label),
                FlowCommand::Return => write!(f, "ret"),
                FlowCommand::Exit => write!(f, "end"),
            },
            Instruction::IO(cmd) => match cmd {
                IoCommand::OutCharacter => write!(f, "printc"),
                IoCommand::OutInteger => write!(f, "printi"),
                IoCommand::ReadCharacter => write!(f, "readc"),
                IoCommand::ReadInteger => write!(f, "readi"),
            },
        }
    }
}

/// A decoded instruction together with where it sits in the program.
/// `end_index` is the offset of the first token after the instruction and its operand.
#[derive(Debug, PartialEq, Clone)]
pub struct WsInstruction {
    pub(crate) instruction: Instruction,
    pub(crate) token_index: usize,
    pub(crate) end_index: usize,
    pub(crate) instruction_index: usize,
}

impl WsInstruction {
    pub fn instruction(&self) -> &Instruction {
        &self.instruction
    }

    pub fn token_index(&self) -> usize {
        self.token_index
    }

    pub fn end_index(&self) -> usize {
        self.end_index
    }

    pub fn instruction_index(&self) -> usize {
        self.instruction_index
    }
}

impl Display for WsInstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:>5} @{:<6} {}",
            self.instruction_index, self.token_index, self.instruction
        )
    }
}

/// The component responsible for decoding instructions out of a loaded program
#[derive(Debug)]
pub struct WsParser<'a> {
    source: &'a Program,
    token_index: usize,
    instruction_index: usize,
}

impl<'a> WsParser<'a> {
    pub fn new(source: &'a Program) -> WsParser<'a> {
        WsParser::at(source, 0)
    }

    /// Creates a parser positioned at `token_index`
    pub fn at(source: &'a Program, token_index: usize) -> WsParser<'a> {
        WsParser {
            source,
            token_index,
            instruction_index: 0,
        }
    }

    pub fn token_index(&self) -> usize {
        self.token_index
    }

    fn next(&mut self) -> Option<u8> {
        let token = self.source.get(self.token_index)?;
        self.token_index += 1;

        Some(token)
    }

    fn expect(&mut self, tokens: &[u8]) -> Result<u8, WsParseError> {
        match self.next() {
            Some(val) => Ok(val),
            None => WsParseErrorKind::UnexpectedEnd(self.token_index, tokens.to_vec()).throw(),
        }
    }

    fn unexpected<T>(&self, val: u8, tokens: &[u8]) -> Result<T, WsParseError> {
        WsParseErrorKind::UnexpectedToken(self.token_index - 1, val, tokens.to_vec()).throw()
    }

    fn imp(&mut self) -> Result<WsImpKind, WsParseError> {
        match self.expect(&[SPACE, TAB, LINE_FEED])? {
            SPACE => Ok(WsImpKind::Stack),
            TAB => match self.expect(&[SPACE, TAB, LINE_FEED])? {
                SPACE => Ok(WsImpKind::Arithmetic),
                TAB => Ok(WsImpKind::Heap),
                _ => Ok(WsImpKind::IO),
            },
            _ => Ok(WsImpKind::Flow),
        }
    }

    fn stack(&mut self) -> Result<StackCommand, WsParseError> {
        match self.expect(&[SPACE, TAB, LINE_FEED])? {
            SPACE => Ok(StackCommand::Push(self.number()?)),
            TAB => match self.expect(&[SPACE, LINE_FEED])? {
                SPACE => Ok(StackCommand::CopyNth(self.number()?)),
                LINE_FEED => Ok(StackCommand::SlideN(self.number()?)),
                val => self.unexpected(val, &[SPACE, LINE_FEED]),
            },
            _ => match self.expect(&[SPACE, TAB, LINE_FEED])? {
                SPACE => Ok(StackCommand::Duplicate),
                TAB => Ok(StackCommand::Swap),
                _ => Ok(StackCommand::Discard),
            },
        }
    }

    fn arithmetic(&mut self) -> Result<ArithmeticCommand, WsParseError> {
        match self.expect(&[SPACE, TAB])? {
            SPACE => match self.expect(&[SPACE, TAB, LINE_FEED])? {
                SPACE => Ok(ArithmeticCommand::Add),
                TAB => Ok(ArithmeticCommand::Subtract),
                _ => Ok(ArithmeticCommand::Multiply),
            },
            TAB => match self.expect(&[SPACE, TAB])? {
                SPACE => Ok(ArithmeticCommand::IntegerDivision),
                TAB => Ok(ArithmeticCommand::Modulo),
                val => self.unexpected(val, &[SPACE, TAB]),
            },
            val => self.unexpected(val, &[SPACE, TAB]),
        }
    }

    fn heap(&mut self) -> Result<HeapCommand, WsParseError> {
        match self.expect(&[SPACE, TAB])? {
            SPACE => Ok(HeapCommand::Store),
            TAB => Ok(HeapCommand::Retrieve),
            val => self.unexpected(val, &[SPACE, TAB]),
        }
    }

    fn flow(&mut self) -> Result<FlowCommand, WsParseError> {
        match self.expect(&[SPACE, TAB, LINE_FEED])? {
            SPACE => match self.expect(&[SPACE, TAB, LINE_FEED])? {
                SPACE => Ok(FlowCommand::Mark(self.label()?)),
                TAB => Ok(FlowCommand::Call(self.label()?)),
                _ => Ok(FlowCommand::Jump(self.label()?)),
            },
            TAB => match self.expect(&[SPACE, TAB, LINE_FEED])? {
                SPACE => Ok(FlowCommand::JumpZero(self.label()?)),
                TAB => Ok(FlowCommand::JumpNegative(self.label()?)),
                _ => Ok(FlowCommand::Return),
            },
            _ => match self.expect(&[LINE_FEED])? {
                LINE_FEED => Ok(FlowCommand::Exit),
                val => self.unexpected(val, &[LINE_FEED]),
            },
        }
    }

    fn io(&mut self) -> Result<IoCommand, WsParseError> {
        match self.expect(&[SPACE, TAB])? {
            SPACE => match self.expect(&[SPACE, TAB])? {
                SPACE => Ok(IoCommand::OutCharacter),
                TAB => Ok(IoCommand::OutInteger),
                val => self.unexpected(val, &[SPACE, TAB]),
            },
            TAB => match self.expect(&[SPACE, TAB])? {
                SPACE => Ok(IoCommand::ReadCharacter),
                TAB => Ok(IoCommand::ReadInteger),
                val => self.unexpected(val, &[SPACE, TAB]),
            },
            val => self.unexpected(val, &[SPACE, TAB]),
        }
    }

    /// Parses a number literal: a sign (space positive, tab negative), binary digits (space 0,
    /// tab 1), then a line feed. No digits at all reads as zero.
    pub fn number(&mut self) -> Result<BigInt, WsParseError> {
        let start_index = self.token_index;
        let negative = match self.next() {
            Some(SPACE) => false,
            Some(TAB) => true,
            _ => return WsParseErrorKind::EmptyNumber(start_index).throw(),
        };
        let mut digits = vec![b'0'];
        loop {
            match self.next() {
                Some(SPACE) => digits.push(b'0'),
                Some(TAB) => digits.push(b'1'),
                Some(_) => break,
                None => return WsParseErrorKind::UnterminatedNumber(start_index).throw(),
            }
        }
        let value = BigInt::parse_bytes(&digits, 2).unwrap_or_else(BigInt::zero);

        Ok(if negative { -value } else { value })
    }

    /// Parses a label literal: any run of spaces and tabs closed by a line feed
    pub fn label(&mut self) -> Result<Label, WsParseError> {
        let start_index = self.token_index;
        let mut result = String::new();
        loop {
            match self.next() {
                Some(LINE_FEED) => break,
                Some(val) => result.push(val as char),
                None => return WsParseErrorKind::UnterminatedLabel(start_index).throw(),
            }
        }

        Ok(Label::new(&result))
    }

    fn decode(&mut self) -> Result<Instruction, WsParseError> {
        let instruction = match self.imp()? {
            WsImpKind::Stack => Instruction::Stack(self.stack()?),
            WsImpKind::Arithmetic => Instruction::Arithmetic(self.arithmetic()?),
            WsImpKind::Heap => Instruction::Heap(self.heap()?),
            WsImpKind::Flow => Instruction::Flow(self.flow()?),
            WsImpKind::IO => Instruction::IO(self.io()?),
        };

        Ok(instruction)
    }

    /// Decodes the instruction at the current position. `None` once the program is exhausted.
    pub fn instruction(&mut self) -> Option<Result<WsInstruction, WsParseError>> {
        if self.token_index >= self.source.len() {
            return None;
        }
        let start_index = self.token_index;
        match self.decode() {
            Ok(instruction) => {
                let instr = WsInstruction {
                    instruction,
                    token_index: start_index,
                    end_index: self.token_index,
                    instruction_index: self.instruction_index,
                };
                self.instruction_index += 1;

                Some(Ok(instr))
            }
            Err(err) => {
                // nothing after a malformed instruction can be decoded reliably
                self.token_index = self.source.len();

                Some(Err(err))
            }
        }
    }
}

impl<'a> Iterator for &mut WsParser<'a> {
    type Item = Result<WsInstruction, WsParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.instruction()
    }
}

/// Decodes the single instruction starting at `token_index`
pub fn decode_at(source: &Program, token_index: usize) -> Result<WsInstruction, WsParseError> {
    let mut parser = WsParser::at(source, token_index);
    match parser.instruction() {
        Some(instr) => instr,
        None => WsParseErrorKind::UnexpectedEnd(token_index, vec![SPACE, TAB, LINE_FEED]).throw(),
    }
}

/// Decodes the whole program front to back
pub fn disassemble(source: &Program) -> Result<Vec<WsInstruction>, WsParseError> {
    let mut parser = WsParser::new(source);
    let mut instructions = vec![];
    for instr in &mut parser {
        instructions.push(instr?);
    }

    Ok(instructions)
}
