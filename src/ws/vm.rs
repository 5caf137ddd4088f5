use crate::log::{self, Level};
use crate::ws::labels::{discover, LabelTable};
use crate::ws::parser::{
    decode_at, disassemble, ArithmeticCommand, FlowCommand, HeapCommand, Instruction, IoCommand,
    Label, StackCommand, WsParseError,
};
use crate::ws::source::Program;
use crate::ws::ErrorKind;
use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{Signed, ToPrimitive, Zero};
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fmt::Display;
use std::io::{stdout, Write};
use wasm_bindgen::prelude::wasm_bindgen;
use wasm_bindgen::JsValue;

/// Configuration options for the virtual machine
#[wasm_bindgen]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WsVmConfig {
    debug: bool,
    debug_heap: bool,
    raw: bool,
    stream_output: bool,
}

#[wasm_bindgen]
impl WsVmConfig {
    /// Creates a new virtual machine config with the given arguments
    ///
    /// - `debug` log the stack, call stack and instruction before executing each instruction
    /// - `debug_heap` log a heap dump after executing each instruction
    /// - `raw` print the decoded listing of the program to stdout when the machine is created
    /// - `stream_output` also write output to stdout as soon as it is produced
    ///
    /// Traces are emitted at debug level, which either debug flag switches on.
    #[wasm_bindgen(constructor)]
    pub fn new(debug: bool, debug_heap: bool, raw: bool, stream_output: bool) -> WsVmConfig {
        WsVmConfig {
            debug,
            debug_heap,
            raw,
            stream_output,
        }
    }

    /// Returns a debug configuration tracing every instruction
    pub fn debug() -> WsVmConfig {
        WsVmConfig {
            debug: true,
            ..WsVmConfig::default()
        }
    }

    /// Returns a debug configuration tracing every instruction along with the heap
    pub fn debug_heap() -> WsVmConfig {
        WsVmConfig {
            debug: true,
            debug_heap: true,
            ..WsVmConfig::default()
        }
    }

    /// Returns a configuration that prints the decoded listing of the program
    pub fn raw() -> WsVmConfig {
        WsVmConfig {
            raw: true,
            ..WsVmConfig::default()
        }
    }

    /// Returns a configuration echoing output to stdout while the program runs
    pub fn streaming() -> WsVmConfig {
        WsVmConfig {
            stream_output: true,
            ..WsVmConfig::default()
        }
    }
}

#[derive(Debug)]
pub(crate) enum WsVmErrorKind {
    ParseError(WsParseError),
    StackUnderflow(usize, Instruction, usize),
    CopyOutOfRange(usize, BigInt, usize),
    UndefinedHeapAddress(usize, BigInt),
    UndefinedLabel(usize, Label),
    DivisionByZero(usize, ArithmeticCommand),
    InputExhausted(usize),
    InputNotTerminated(usize),
    InputNotANumber(usize, String),
    NoTermination(usize),
    ReturnOutsideSubroutine(usize),
    CharacterOutOfRange(usize, BigInt),
    IOError(usize),
}

impl Display for WsVmErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl WsVmErrorKind {
    fn throw<T>(self) -> Result<T, WsVmError> {
        Err(self.into_error())
    }

    fn into_error(self) -> WsVmError {
        let msg = match &self {
            WsVmErrorKind::ParseError(err) => format!("parse error occurred: {}", err.msg),
            WsVmErrorKind::StackUnderflow(pos, instr, len) => format!("stack holds {} value(s), not enough to execute `{}` at position {}", len, instr, pos),
            WsVmErrorKind::CopyOutOfRange(pos, n, len) => format!("cannot copy value {} from the top of a stack of {} value(s) at position {}", n, len, pos),
            WsVmErrorKind::UndefinedHeapAddress(pos, addr) => format!("heap address {} was never stored to, read at position {}", addr, pos),
            WsVmErrorKind::UndefinedLabel(pos, label) => format!("label {} is not defined, referenced at position {}", label, pos),
            WsVmErrorKind::DivisionByZero(pos, cmd) => format!("{:?} by zero at position {}", cmd, pos),
            WsVmErrorKind::InputExhausted(pos) => format!("no input left to read at position {}", pos),
            WsVmErrorKind::InputNotTerminated(pos) => format!("number input must end with a line feed, read at position {}", pos),
            WsVmErrorKind::InputNotANumber(pos, text) => format!("cannot read {:?} as a number at position {}", text, pos),
            WsVmErrorKind::NoTermination(pos) => format!("program ran off its end at position {} without an exit instruction", pos),
            WsVmErrorKind::ReturnOutsideSubroutine(pos) => format!("return outside of any subroutine at position {}", pos),
            WsVmErrorKind::CharacterOutOfRange(pos, val) => format!("{} is not a character code, output at position {}", val, pos),
            WsVmErrorKind::IOError(pos) => format!("stdout error when writing output at position {}", pos),
        };
        WsVmError { msg, kind: self }
    }
}

#[derive(Debug)]
pub struct WsVmError {
    msg: String,
    kind: WsVmErrorKind,
}

impl WsVmError {
    /// The category of the failure, stable across message wording
    pub fn kind(&self) -> ErrorKind {
        match &self.kind {
            WsVmErrorKind::ParseError(err) => err.kind(),
            WsVmErrorKind::StackUnderflow(..) | WsVmErrorKind::CopyOutOfRange(..) => {
                ErrorKind::StackUnderflow
            }
            WsVmErrorKind::UndefinedHeapAddress(..) => ErrorKind::UndefinedHeapAddress,
            WsVmErrorKind::UndefinedLabel(..) => ErrorKind::UndefinedLabel,
            WsVmErrorKind::DivisionByZero(..) => ErrorKind::ArithmeticError,
            WsVmErrorKind::InputExhausted(_) => ErrorKind::InputExhausted,
            WsVmErrorKind::InputNotTerminated(_) | WsVmErrorKind::InputNotANumber(..) => {
                ErrorKind::InputFormatError
            }
            WsVmErrorKind::NoTermination(_) => ErrorKind::UncleanTermination,
            WsVmErrorKind::ReturnOutsideSubroutine(_) => ErrorKind::SubroutineUnderflow,
            WsVmErrorKind::CharacterOutOfRange(..) => ErrorKind::CharacterOutOfRange,
            WsVmErrorKind::IOError(_) => ErrorKind::Io,
        }
    }

    /// Token offset of the instruction that failed
    pub fn position(&self) -> Option<usize> {
        match &self.kind {
            WsVmErrorKind::ParseError(err) => err.position(),
            WsVmErrorKind::StackUnderflow(pos, ..)
            | WsVmErrorKind::CopyOutOfRange(pos, ..)
            | WsVmErrorKind::UndefinedHeapAddress(pos, _)
            | WsVmErrorKind::UndefinedLabel(pos, _)
            | WsVmErrorKind::DivisionByZero(pos, _)
            | WsVmErrorKind::InputExhausted(pos)
            | WsVmErrorKind::InputNotTerminated(pos)
            | WsVmErrorKind::InputNotANumber(pos, _)
            | WsVmErrorKind::NoTermination(pos)
            | WsVmErrorKind::ReturnOutsideSubroutine(pos)
            | WsVmErrorKind::CharacterOutOfRange(pos, _)
            | WsVmErrorKind::IOError(pos) => Some(*pos),
        }
    }

    pub fn message(&self) -> &str {
        &self.msg
    }
}

impl From<WsParseError> for WsVmError {
    fn from(err: WsParseError) -> WsVmError {
        WsVmErrorKind::ParseError(err).into_error()
    }
}

impl From<WsVmError> for JsValue {
    fn from(err: WsVmError) -> JsValue {
        JsValue::from(format!("wspace error occurred: {}, {}", err.kind, err.msg))
    }
}

impl Display for WsVmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.msg)
    }
}

impl Error for WsVmError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.kind {
            WsVmErrorKind::ParseError(err) => Some(err),
            _ => None,
        }
    }
}

/// One call stack entry: where execution continues inside this routine
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Frame {
    instruction_pointer: usize,
}

impl Frame {
    fn new(instruction_pointer: usize) -> Frame {
        Frame {
            instruction_pointer,
        }
    }

    pub fn instruction_pointer(&self) -> usize {
        self.instruction_pointer
    }
}

/// The root component for the virtual machine
#[derive(Debug)]
pub struct WsVm {
    config: WsVmConfig,
    program: Program,
    labels: LabelTable,
    stack: Vec<BigInt>,
    call_stack: Vec<Frame>,
    heap: HashMap<BigInt, BigInt>,
    input: String,
    input_cursor: usize,
    output: String,
    current: usize,
    done: bool,
}

impl WsVm {
    /// Creates a new virtual machine over `program`, reading from `input`.
    ///
    /// All labels are collected here, so every structural error in the program surfaces before
    /// anything executes.
    pub fn new(program: Program, input: &str, config: WsVmConfig) -> Result<WsVm, WsVmError> {
        let labels = discover(&program)?;
        if config.debug || config.debug_heap {
            log::set_level(Level::Debug);
        }
        if config.raw {
            write_listing(&program, &mut stdout())?;
        }

        Ok(WsVm {
            config,
            program,
            labels,
            stack: vec![],
            call_stack: vec![Frame::new(0)],
            heap: HashMap::new(),
            input: input.to_string(),
            input_cursor: 0,
            output: String::new(),
            current: 0,
            done: false,
        })
    }

    /// Creates a virtual machine with the default configuration over raw source text
    pub fn from_source(source: &str, input: &str) -> Result<WsVm, WsVmError> {
        WsVm::new(Program::new(source), input, WsVmConfig::default())
    }

    /// Creates a virtual machine over the source file at `file_name`
    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_file(file_name: &str, input: &str, config: WsVmConfig) -> Result<WsVm, WsVmError> {
        let program = Program::from_file(file_name)?;
        WsVm::new(program, input, config)
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn stack(&self) -> &[BigInt] {
        &self.stack
    }

    pub fn heap(&self) -> &HashMap<BigInt, BigInt> {
        &self.heap
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    pub fn call_stack(&self) -> &[Frame] {
        &self.call_stack
    }

    pub fn call_depth(&self) -> usize {
        self.call_stack.len()
    }

    /// Token offset of the next instruction to decode
    pub fn instruction_pointer(&self) -> usize {
        self.call_stack
            .last()
            .map(|frame| frame.instruction_pointer)
            .unwrap_or(0)
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn remaining_input(&self) -> &str {
        &self.input[self.input_cursor..]
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Pushes a value directly onto the data stack
    pub fn push(&mut self, value: impl Into<BigInt>) {
        self.stack.push(value.into());
    }

    /// Returns the offset of the next instruction to be executed in a `Some` variant. None if the
    /// program has exited or run off its end.
    pub fn next_instruction(&self) -> Option<usize> {
        if self.done {
            return None;
        }
        let ip = self.instruction_pointer();
        if ip < self.program.len() {
            Some(ip)
        } else {
            None
        }
    }

    /// Executes all instructions from a fresh state and returns the produced output
    pub fn run(&mut self) -> Result<String, WsVmError> {
        self.reset();
        while !self.done {
            self.step()?;
        }

        Ok(self.output.clone())
    }

    /// Resets the internal state without decoding the program again
    pub fn reset(&mut self) {
        self.stack.clear();
        self.call_stack.clear();
        self.call_stack.push(Frame::new(0));
        self.heap.clear();
        self.input_cursor = 0;
        self.output.clear();
        self.current = 0;
        self.done = false;
    }

    /// Executes the instruction at the instruction pointer. Returns whether the program exited.
    pub fn step(&mut self) -> Result<bool, WsVmError> {
        if self.done {
            return Ok(true);
        }
        let ip = self.instruction_pointer();
        if ip >= self.program.len() {
            return WsVmErrorKind::NoTermination(ip).throw();
        }
        let instr = decode_at(&self.program, ip)?;
        if self.config.debug {
            crate::debug!(
                "{} | stack {:?} | frames {:?}",
                instr,
                self.stack,
                self.call_stack
                    .iter()
                    .map(|frame| frame.instruction_pointer)
                    .collect::<Vec<_>>()
            );
        }
        self.current = ip;
        self.jump(instr.end_index);
        self.exec(&instr.instruction)?;
        if self.config.debug_heap {
            crate::debug!("heap {:?}", self.heap_dump());
        }

        Ok(self.done)
    }

    /// Executes a single decoded instruction against the current state
    pub fn exec(&mut self, instruction: &Instruction) -> Result<(), WsVmError> {
        match instruction {
            Instruction::Stack(cmd) => self.exec_stack(cmd),
            Instruction::Arithmetic(cmd) => self.exec_arithmetic(*cmd),
            Instruction::Heap(cmd) => self.exec_heap(*cmd),
            Instruction::Flow(cmd) => self.exec_flow(cmd),
            Instruction::IO(cmd) => self.exec_io(*cmd),
        }
    }

    /// Heap contents ordered by address
    pub fn heap_dump(&self) -> BTreeMap<BigInt, BigInt> {
        self.heap
            .iter()
            .map(|(addr, val)| (addr.clone(), val.clone()))
            .collect()
    }

    fn jump(&mut self, target: usize) {
        if let Some(frame) = self.call_stack.last_mut() {
            frame.instruction_pointer = target;
        }
    }

    fn underflow<T>(&self, instr: Instruction) -> Result<T, WsVmError> {
        WsVmErrorKind::StackUnderflow(self.current, instr, self.stack.len()).throw()
    }

    /// Pops `a` then `b`, handing them back as `(b, a)`
    fn pop_pair(&mut self) -> Option<(BigInt, BigInt)> {
        if self.stack.len() < 2 {
            return None;
        }
        let a = self.stack.pop()?;
        let b = self.stack.pop()?;

        Some((b, a))
    }

    fn resolve(&self, label: &Label) -> Result<usize, WsVmError> {
        match self.labels.get(label) {
            Some(target) => Ok(target),
            None => WsVmErrorKind::UndefinedLabel(self.current, label.clone()).throw(),
        }
    }

    pub fn exec_stack(&mut self, cmd: &StackCommand) -> Result<(), WsVmError> {
        match cmd {
            StackCommand::Push(val) => {
                self.stack.push(val.clone());

                Ok(())
            }
            StackCommand::Duplicate => {
                if let Some(val) = self.stack.last().cloned() {
                    self.stack.push(val);

                    return Ok(());
                }

                self.underflow(Instruction::Stack(cmd.clone()))
            }
            StackCommand::CopyNth(n) => {
                let len = self.stack.len();
                match n.to_usize() {
                    Some(offset) if offset < len => {
                        let val = self.stack[len - 1 - offset].clone();
                        self.stack.push(val);

                        Ok(())
                    }
                    _ => WsVmErrorKind::CopyOutOfRange(self.current, n.clone(), len).throw(),
                }
            }
            StackCommand::Swap => {
                let len = self.stack.len();
                if len < 2 {
                    return self.underflow(Instruction::Stack(cmd.clone()));
                }
                self.stack.swap(len - 1, len - 2);

                Ok(())
            }
            StackCommand::Discard => {
                if self.stack.pop().is_some() {
                    return Ok(());
                }

                self.underflow(Instruction::Stack(cmd.clone()))
            }
            StackCommand::SlideN(n) => {
                // out of range counts clamp to "everything below the top"
                let top = match self.stack.pop() {
                    Some(top) => top,
                    None => return Ok(()),
                };
                let below = self.stack.len();
                let count = match n.to_usize() {
                    Some(count) if count <= below => count,
                    _ => below,
                };
                self.stack.truncate(below - count);
                self.stack.push(top);

                Ok(())
            }
        }
    }

    pub fn exec_arithmetic(&mut self, cmd: ArithmeticCommand) -> Result<(), WsVmError> {
        let (left, right) = match self.pop_pair() {
            Some(pair) => pair,
            None => return self.underflow(Instruction::Arithmetic(cmd)),
        };
        let result = match cmd {
            ArithmeticCommand::Add => left + right,
            ArithmeticCommand::Subtract => left - right,
            ArithmeticCommand::Multiply => left * right,
            ArithmeticCommand::IntegerDivision | ArithmeticCommand::Modulo if right.is_zero() => {
                return WsVmErrorKind::DivisionByZero(self.current, cmd).throw();
            }
            ArithmeticCommand::IntegerDivision => left.div_floor(&right),
            ArithmeticCommand::Modulo => left.mod_floor(&right),
        };
        self.stack.push(result);

        Ok(())
    }

    pub fn exec_heap(&mut self, cmd: HeapCommand) -> Result<(), WsVmError> {
        match cmd {
            HeapCommand::Store => {
                if let Some((addr, val)) = self.pop_pair() {
                    self.heap.insert(addr, val);

                    return Ok(());
                }

                self.underflow(Instruction::Heap(cmd))
            }
            HeapCommand::Retrieve => {
                let addr = match self.stack.pop() {
                    Some(addr) => addr,
                    None => return self.underflow(Instruction::Heap(cmd)),
                };
                match self.heap.get(&addr) {
                    Some(val) => {
                        self.stack.push(val.clone());

                        Ok(())
                    }
                    None => WsVmErrorKind::UndefinedHeapAddress(self.current, addr).throw(),
                }
            }
        }
    }

    pub fn exec_flow(&mut self, cmd: &FlowCommand) -> Result<(), WsVmError> {
        match cmd {
            FlowCommand::Mark(_) => Ok(()),
            FlowCommand::Call(label) => {
                let target = self.resolve(label)?;
                self.call_stack.push(Frame::new(target));

                Ok(())
            }
            FlowCommand::Jump(label) => {
                let target = self.resolve(label)?;
                self.jump(target);

                Ok(())
            }
            FlowCommand::JumpZero(label) | FlowCommand::JumpNegative(label) => {
                let val = match self.stack.pop() {
                    Some(val) => val,
                    None => return self.underflow(Instruction::Flow(cmd.clone())),
                };
                let taken = match cmd {
                    FlowCommand::JumpZero(_) => val.is_zero(),
                    _ => val.is_negative(),
                };
                if taken {
                    let target = self.resolve(label)?;
                    self.jump(target);
                }

                Ok(())
            }
            FlowCommand::Return => {
                if self.call_stack.len() > 1 {
                    self.call_stack.pop();

                    return Ok(());
                }

                WsVmErrorKind::ReturnOutsideSubroutine(self.current).throw()
            }
            FlowCommand::Exit => {
                self.done = true;

                Ok(())
            }
        }
    }

    pub fn exec_io(&mut self, cmd: IoCommand) -> Result<(), WsVmError> {
        match cmd {
            IoCommand::OutCharacter => {
                let val = match self.stack.pop() {
                    Some(val) => val,
                    None => return self.underflow(Instruction::IO(cmd)),
                };
                match val.to_u32().and_then(char::from_u32) {
                    Some(character) => self.emit(&character.to_string()),
                    None => WsVmErrorKind::CharacterOutOfRange(self.current, val).throw(),
                }
            }
            IoCommand::OutInteger => {
                let val = match self.stack.pop() {
                    Some(val) => val,
                    None => return self.underflow(Instruction::IO(cmd)),
                };
                self.emit(&val.to_string())
            }
            IoCommand::ReadCharacter => {
                let character = match self.remaining_input().chars().next() {
                    Some(character) => character,
                    None => return WsVmErrorKind::InputExhausted(self.current).throw(),
                };
                self.input_cursor += character.len_utf8();
                let addr = match self.stack.pop() {
                    Some(addr) => addr,
                    None => return self.underflow(Instruction::IO(cmd)),
                };
                self.heap.insert(addr, BigInt::from(character as u32));

                Ok(())
            }
            IoCommand::ReadInteger => {
                let remaining = self.remaining_input();
                if remaining.is_empty() {
                    return WsVmErrorKind::InputExhausted(self.current).throw();
                }
                let (line, consumed) = match remaining.find('\n') {
                    Some(end) => (&remaining[..end], end + 1),
                    None => return WsVmErrorKind::InputNotTerminated(self.current).throw(),
                };
                let val = match line.trim().parse::<BigInt>() {
                    Ok(val) => val,
                    Err(_) => {
                        return WsVmErrorKind::InputNotANumber(self.current, line.to_string())
                            .throw()
                    }
                };
                self.input_cursor += consumed;
                let addr = match self.stack.pop() {
                    Some(addr) => addr,
                    None => return self.underflow(Instruction::IO(cmd)),
                };
                self.heap.insert(addr, val);

                Ok(())
            }
        }
    }

    fn emit(&mut self, text: &str) -> Result<(), WsVmError> {
        self.output.push_str(text);
        if self.config.stream_output {
            let mut out = stdout();
            if write!(out, "{}", text).and_then(|_| out.flush()).is_err() {
                return WsVmErrorKind::IOError(self.current).throw();
            }
        }

        Ok(())
    }
}

/// Writes one decoded instruction per line
pub fn write_listing(program: &Program, out: &mut impl Write) -> Result<(), WsVmError> {
    for instr in disassemble(program)? {
        if writeln!(out, "{}", instr).is_err() {
            return WsVmErrorKind::IOError(instr.token_index).throw();
        }
    }
    if out.flush().is_err() {
        return WsVmErrorKind::IOError(program.len()).throw();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{write_listing, WsVm, WsVmConfig, WsVmError};
    use crate::log::{self, Level};
    use crate::ws::parser::{ArithmeticCommand, FlowCommand, Label, StackCommand};
    use crate::ws::{bleach, ErrorKind};
    use num_bigint::BigInt;

    fn vm(letters: &str, input: &str) -> Result<WsVm, WsVmError> {
        WsVm::new(bleach(letters), input, WsVmConfig::default())
    }

    fn run(letters: &str, input: &str) -> Result<WsVm, WsVmError> {
        let mut vm = vm(letters, input)?;
        vm.run()?;

        Ok(vm)
    }

    fn fails(letters: &str, input: &str) -> ErrorKind {
        match run(letters, input) {
            Ok(vm) => panic!("expected failure, stack was {:?}", vm.stack),
            Err(err) => err.kind(),
        }
    }

    fn ints(values: &[i64]) -> Vec<BigInt> {
        values.iter().map(|val| BigInt::from(*val)).collect()
    }

    fn eval(left: i64, right: i64, cmd: ArithmeticCommand) -> Result<BigInt, WsVmError> {
        let mut vm = vm("nnn", "")?;
        vm.push(left);
        vm.push(right);
        vm.exec_arithmetic(cmd)?;

        Ok(vm.stack[0].clone())
    }

    #[test]
    fn interpret_stack() -> Result<(), WsVmError> {
        let vm = run("ss sn ss stn ss stsn ss sttn ss stssn nnn", "")?;

        assert_eq!(vm.stack, ints(&[0, 1, 2, 3, 4]));
        assert!(vm.heap.is_empty());

        Ok(())
    }

    #[test]
    fn copy_counts_from_the_top() -> Result<(), WsVmError> {
        let vm = run("ss stn ss stsn ss sttn sts stsn sts sn nnn", "")?;

        assert_eq!(vm.stack, ints(&[1, 2, 3, 1, 1]));

        Ok(())
    }

    #[test]
    fn copy_out_of_range_fails() {
        assert_eq!(fails("ss stn sts stn nnn", ""), ErrorKind::StackUnderflow);
        assert_eq!(fails("ss stn sts ttn nnn", ""), ErrorKind::StackUnderflow);
        assert_eq!(fails("sts sn nnn", ""), ErrorKind::StackUnderflow);
    }

    #[test]
    fn slide_keeps_the_top() -> Result<(), WsVmError> {
        let vm = run("ss stn ss stsn ss sttn ss stssn stn stsn nnn", "")?;
        assert_eq!(vm.stack, ints(&[1, 4]));

        let vm = run("ss stn ss stsn ss sttn stn ststsn nnn", "")?;
        assert_eq!(vm.stack, ints(&[3]));

        let vm = run("ss stn ss stsn ss sttn stn ttn nnn", "")?;
        assert_eq!(vm.stack, ints(&[3]));

        let vm = run("stn stn nnn", "")?;
        assert!(vm.stack.is_empty());

        Ok(())
    }

    #[test]
    fn swap_and_discard() -> Result<(), WsVmError> {
        let vm = run("ss stn ss stsn snt nnn", "")?;
        assert_eq!(vm.stack, ints(&[2, 1]));

        let vm = run("ss stn ss stsn snn nnn", "")?;
        assert_eq!(vm.stack, ints(&[1]));

        Ok(())
    }

    #[test]
    fn stack_underflows() {
        assert_eq!(fails("sns nnn", ""), ErrorKind::StackUnderflow);
        assert_eq!(fails("ss stn snt nnn", ""), ErrorKind::StackUnderflow);
        assert_eq!(fails("snn nnn", ""), ErrorKind::StackUnderflow);
        assert_eq!(fails("ss stn tsss nnn", ""), ErrorKind::StackUnderflow);
    }

    #[test]
    fn interpret_arithmetic() -> Result<(), WsVmError> {
        // 3 + 4, then * 2, then - 10
        let vm = run("ss sttn ss stssn tsss ss stsn tssn ss ststsn tsst nnn", "")?;

        assert_eq!(vm.stack, ints(&[4]));

        Ok(())
    }

    #[test]
    fn arithmetic_operand_order() -> Result<(), WsVmError> {
        assert_eq!(eval(7, 2, ArithmeticCommand::Subtract)?, BigInt::from(5));
        assert_eq!(eval(2, 7, ArithmeticCommand::Subtract)?, BigInt::from(-5));
        assert_eq!(eval(7, 2, ArithmeticCommand::IntegerDivision)?, BigInt::from(3));
        assert_eq!(eval(2, 7, ArithmeticCommand::IntegerDivision)?, BigInt::from(0));
        assert_eq!(eval(7, 2, ArithmeticCommand::Modulo)?, BigInt::from(1));
        assert_eq!(eval(6, 7, ArithmeticCommand::Multiply)?, BigInt::from(42));

        Ok(())
    }

    #[test]
    fn division_floors() -> Result<(), WsVmError> {
        assert_eq!(eval(-7, 2, ArithmeticCommand::IntegerDivision)?, BigInt::from(-4));
        assert_eq!(eval(7, -2, ArithmeticCommand::IntegerDivision)?, BigInt::from(-4));
        assert_eq!(eval(-7, 2, ArithmeticCommand::Modulo)?, BigInt::from(1));
        assert_eq!(eval(7, -2, ArithmeticCommand::Modulo)?, BigInt::from(-1));
        assert_eq!(eval(-7, -2, ArithmeticCommand::Modulo)?, BigInt::from(-1));

        Ok(())
    }

    #[test]
    fn division_by_zero_fails() {
        for dividend in [5, 0, -5] {
            for cmd in [ArithmeticCommand::IntegerDivision, ArithmeticCommand::Modulo] {
                let err = eval(dividend, 0, cmd).unwrap_err();
                assert_eq!(err.kind(), ErrorKind::ArithmeticError);
            }
        }
    }

    #[test]
    fn arithmetic_needs_two_values() -> Result<(), WsVmError> {
        let mut vm = vm("nnn", "")?;
        vm.push(1);
        let err = vm.exec_arithmetic(ArithmeticCommand::Add).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::StackUnderflow);

        Ok(())
    }

    #[test]
    fn interpret_heap() -> Result<(), WsVmError> {
        // heap[0] = 5, push heap[0]
        let vm = run("ss sn ss ststn tts ss sn ttt nnn", "")?;

        assert_eq!(vm.stack, ints(&[5]));
        assert_eq!(vm.heap.get(&BigInt::from(0)), Some(&BigInt::from(5)));

        Ok(())
    }

    #[test]
    fn heap_failures() {
        assert_eq!(fails("ss stn ttt nnn", ""), ErrorKind::UndefinedHeapAddress);
        assert_eq!(fails("ss stn tts nnn", ""), ErrorKind::StackUnderflow);
        assert_eq!(fails("ttt nnn", ""), ErrorKind::StackUnderflow);
    }

    #[test]
    fn heap_dump_is_ordered() -> Result<(), WsVmError> {
        // heap[3] = 1, heap[-1] = 2
        let vm = run("ss sttn ss stn tts ss ttn ss stsn tts nnn", "")?;
        let dump: Vec<_> = vm.heap_dump().into_iter().collect();

        assert_eq!(
            dump,
            vec![
                (BigInt::from(-1), BigInt::from(2)),
                (BigInt::from(3), BigInt::from(1))
            ]
        );

        Ok(())
    }

    #[test]
    fn output_numbers_pop() -> Result<(), WsVmError> {
        let vm = run("ss stn ss stsn ss sttn tnst tnst tnst nnn", "")?;

        assert_eq!(vm.output(), "321");
        assert!(vm.stack.is_empty());

        Ok(())
    }

    #[test]
    fn output_characters() -> Result<(), WsVmError> {
        let vm = run("ss stssssstn tnss nnn", "")?;
        assert_eq!(vm.output(), "A");

        assert_eq!(fails("ss ttn tnss nnn", ""), ErrorKind::CharacterOutOfRange);
        assert_eq!(fails("tnss nnn", ""), ErrorKind::StackUnderflow);
        assert_eq!(fails("tnst nnn", ""), ErrorKind::StackUnderflow);

        Ok(())
    }

    #[test]
    fn read_characters() -> Result<(), WsVmError> {
        let vm = run("ss sn tnts ss stn tnts ss sn ttt ss stn ttt nnn", "ab")?;

        assert_eq!(vm.stack, ints(&[97, 98]));
        assert_eq!(vm.remaining_input(), "");

        Ok(())
    }

    #[test]
    fn read_character_failures() {
        assert_eq!(fails("ss sn tnts nnn", ""), ErrorKind::InputExhausted);
        assert_eq!(fails("tnts nnn", "a"), ErrorKind::StackUnderflow);
    }

    #[test]
    fn read_numbers() -> Result<(), WsVmError> {
        let vm = run("ss sn tntt ss sn ttt nnn", "42\nrest")?;
        assert_eq!(vm.stack, ints(&[42]));
        assert_eq!(vm.remaining_input(), "rest");

        let vm = run("ss sn tntt ss sn ttt nnn", " -13 \n")?;
        assert_eq!(vm.stack, ints(&[-13]));

        Ok(())
    }

    #[test]
    fn read_number_failures() {
        assert_eq!(fails("ss sn tntt nnn", ""), ErrorKind::InputExhausted);
        assert_eq!(fails("ss sn tntt nnn", "42"), ErrorKind::InputFormatError);
        assert_eq!(fails("ss sn tntt nnn", "4x2\n"), ErrorKind::InputFormatError);
        assert_eq!(fails("tntt nnn", "7\n"), ErrorKind::StackUnderflow);
    }

    #[test]
    fn interpret_flow() -> Result<(), WsVmError> {
        // push 3; "s": dup, print, push 1, sub, dup, jz "t", jmp "s"; "t": exit
        let vm = run(
            "ss sttn nss sn sns tnst ss stn tsst sns nts tn nsn sn nss tn nnn",
            "",
        )?;

        assert_eq!(vm.output(), "321");
        assert_eq!(vm.stack, ints(&[0]));

        Ok(())
    }

    #[test]
    fn subroutine_returns_after_call() -> Result<(), WsVmError> {
        // push 1, call "t", push 3, exit; "t": push 2, return
        let mut vm = vm("ss stn nst tn ss sttn nnn nss tn ss stsn ntn", "")?;
        vm.step()?;
        vm.step()?;
        assert_eq!(vm.call_depth(), 2);
        assert_eq!(vm.instruction_pointer(), 24);

        vm.step()?;
        vm.step()?;
        assert_eq!(vm.call_depth(), 1);
        assert_eq!(vm.instruction_pointer(), 10);

        while !vm.step()? {}
        assert_eq!(vm.stack, ints(&[1, 2, 3]));

        Ok(())
    }

    #[test]
    fn return_outside_subroutine_fails() {
        assert_eq!(fails("ntn nnn", ""), ErrorKind::SubroutineUnderflow);
    }

    #[test]
    fn conditional_jumps() -> Result<(), WsVmError> {
        let vm = run("ss sn nts tn ss stn nss tn nnn", "")?;
        assert!(vm.stack.is_empty());

        let vm = run("ss stn nts tn ss stn nss tn nnn", "")?;
        assert_eq!(vm.stack, ints(&[1]));

        let vm = run("ss ttn ntt tn ss stn nss tn nnn", "")?;
        assert!(vm.stack.is_empty());

        let vm = run("ss sn ntt tn ss stn nss tn nnn", "")?;
        assert_eq!(vm.stack, ints(&[1]));

        Ok(())
    }

    #[test]
    fn undefined_labels_fail_only_when_taken() -> Result<(), WsVmError> {
        assert_eq!(fails("ss sn nts tn nnn", ""), ErrorKind::UndefinedLabel);
        assert_eq!(fails("nst tn nnn", ""), ErrorKind::UndefinedLabel);
        assert_eq!(fails("nsn tn nnn", ""), ErrorKind::UndefinedLabel);
        assert_eq!(fails("nts tn nnn", ""), ErrorKind::StackUnderflow);

        let vm = run("ss stn nts tn nnn", "")?;
        assert!(vm.stack.is_empty());

        Ok(())
    }

    #[test]
    fn jumping_over_a_fatal_region() -> Result<(), WsVmError> {
        let vm = run("nsn tn snn nss tn nnn", "")?;
        assert!(vm.stack.is_empty());

        Ok(())
    }

    #[test]
    fn malformed_code_fails_before_execution() {
        let err = WsVm::new(bleach("nsn tn tsn nss tn nnn"), "", WsVmConfig::default())
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MalformedInstruction);
        assert_eq!(err.position(), Some(7));
    }

    #[test]
    fn duplicate_labels_fail_before_execution() {
        let err = WsVm::new(bleach("nss tn nss tn nnn"), "", WsVmConfig::default())
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DuplicateLabel);
    }

    #[test]
    fn unclean_termination() {
        assert_eq!(fails("ss stn", ""), ErrorKind::UncleanTermination);
        assert_eq!(fails("", ""), ErrorKind::UncleanTermination);
    }

    #[test]
    fn run_starts_from_a_fresh_state() -> Result<(), WsVmError> {
        let mut vm = vm("ss sn tnts ss sn ttt tnss nnn", "hi")?;

        assert_eq!(vm.run()?, "h");
        assert_eq!(vm.run()?, "h");
        assert_eq!(vm.remaining_input(), "i");

        Ok(())
    }

    #[test]
    fn next_instruction_tracks_progress() -> Result<(), WsVmError> {
        let mut vm = vm("ss stn nnn", "")?;
        assert_eq!(vm.next_instruction(), Some(0));

        vm.step()?;
        assert_eq!(vm.next_instruction(), Some(5));

        assert!(vm.step()?);
        assert_eq!(vm.next_instruction(), None);
        assert!(vm.is_done());

        Ok(())
    }

    #[test]
    fn direct_family_execution() -> Result<(), WsVmError> {
        let mut vm = vm("nss tn nnn", "")?;
        vm.exec_stack(&StackCommand::Push(BigInt::from(9)))?;
        vm.exec_stack(&StackCommand::Duplicate)?;
        assert_eq!(vm.stack(), &ints(&[9, 9])[..]);

        vm.exec_flow(&FlowCommand::Call(Label::new("\t")))?;
        assert_eq!(vm.call_depth(), 2);
        assert_eq!(vm.instruction_pointer(), 5);

        vm.exec_flow(&FlowCommand::Return)?;
        assert_eq!(vm.call_depth(), 1);

        Ok(())
    }

    #[test]
    fn camouflage_is_ignored() -> Result<(), WsVmError> {
        let mut vm = WsVm::from_source("push  one: \t\nprint:\t\n \tend\n\n\n", "")?;

        assert_eq!(vm.run()?, "1");

        Ok(())
    }

    #[test]
    fn debug_configs_switch_tracing_on() -> Result<(), WsVmError> {
        for config in [WsVmConfig::debug(), WsVmConfig::debug_heap()] {
            let mut vm = WsVm::new(bleach("ss sn ss stn tts nnn"), "", config)?;
            assert!(log::enabled(Level::Debug));

            vm.run()?;
            assert_eq!(vm.heap().len(), 1);
        }

        Ok(())
    }

    #[test]
    fn listing_has_a_line_per_instruction() -> Result<(), WsVmError> {
        let mut out = Vec::new();
        write_listing(&bleach("ss stn tnst nnn"), &mut out)?;
        let listing = String::from_utf8_lossy(&out);
        let lines: Vec<&str> = listing.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("push 1"));
        assert!(lines[1].contains("printi"));
        assert!(lines[2].contains("end"));

        Ok(())
    }

    #[test]
    fn listing_reports_malformed_code() {
        let mut out = Vec::new();
        let err = write_listing(&bleach("ss stn tsn"), &mut out).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MalformedInstruction);
    }

}
