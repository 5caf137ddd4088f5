use crate::ws::parser::{
    FlowCommand, Instruction, Label, WsInstruction, WsParseError, WsParseErrorKind, WsParser,
};
use crate::ws::source::Program;
use std::collections::HashMap;

/// Resolved jump targets. Each label maps to the token offset right after its declaration.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct LabelTable {
    labels: HashMap<Label, usize>,
}

impl LabelTable {
    pub fn new() -> LabelTable {
        LabelTable::default()
    }

    pub fn get(&self, label: &Label) -> Option<usize> {
        self.labels.get(label).copied()
    }

    pub fn contains(&self, label: &Label) -> bool {
        self.labels.contains_key(label)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Label, &usize)> {
        self.labels.iter()
    }

    fn declare(&mut self, label: &Label, instr: &WsInstruction) -> Result<(), WsParseError> {
        if self.labels.contains_key(label) {
            return WsParseErrorKind::DuplicateLabel(instr.token_index, label.clone()).throw();
        }
        self.labels.insert(label.clone(), instr.end_index);

        Ok(())
    }
}

/// Walks the whole program front to back without executing anything, collecting every label
/// declaration. Jumps are not followed and `exit` does not stop the walk, so subroutines placed
/// after the main routine are found. Fails on the first malformed instruction or literal and on
/// any label declared twice.
pub fn discover(source: &Program) -> Result<LabelTable, WsParseError> {
    let mut labels = LabelTable::new();
    let mut parser = WsParser::new(source);
    for instr in &mut parser {
        let instr = instr?;
        if let Instruction::Flow(FlowCommand::Mark(label)) = &instr.instruction {
            labels.declare(label, &instr)?;
        }
    }

    Ok(labels)
}
