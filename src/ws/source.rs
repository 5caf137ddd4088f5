#[cfg(not(target_arch = "wasm32"))]
use crate::ws::parser::{WsParseError, WsParseErrorKind};
#[cfg(not(target_arch = "wasm32"))]
use memmap::Mmap;
use std::fmt::Display;
#[cfg(not(target_arch = "wasm32"))]
use std::fs::File;

pub const SPACE: u8 = b' ';
pub const TAB: u8 = b'\t';
pub const LINE_FEED: u8 = b'\n';

/// A normalized whitespace program: only the three command tokens survive loading, every other
/// byte of the source is treated as a comment and dropped.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct Program {
    tokens: Vec<u8>,
}

impl Program {
    /// Loads a program from raw source text
    pub fn new(source: &str) -> Program {
        Program::from_bytes(source.as_bytes())
    }

    /// Loads a program from raw source bytes. The command tokens are all ASCII so any encoding
    /// that keeps ASCII intact works.
    pub fn from_bytes(source: &[u8]) -> Program {
        let tokens = source
            .iter()
            .copied()
            .filter(|token| matches!(*token, SPACE | TAB | LINE_FEED))
            .collect();

        Program { tokens }
    }

    /// Memory maps the file at `file_name` and loads the program from it
    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_file(file_name: &str) -> Result<Program, WsParseError> {
        let file = match File::open(file_name) {
            Ok(content) => content,
            Err(err) => return WsParseErrorKind::FileOpenError(Box::new(err)).throw(),
        };
        // an empty file cannot be mapped on every platform
        if file.metadata().map(|meta| meta.len() == 0).unwrap_or(false) {
            return Ok(Program::default());
        }
        let source = unsafe {
            match Mmap::map(&file) {
                Ok(content) => content,
                Err(err) => return WsParseErrorKind::MemoryMapError(Box::new(err)).throw(),
            }
        };

        Ok(Program::from_bytes(&source))
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[u8] {
        &self.tokens
    }

    pub(crate) fn get(&self, index: usize) -> Option<u8> {
        self.tokens.get(index).copied()
    }
}

/// Renders the program with visible `s`, `t` and `n` letters in place of the tokens
impl Display for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for token in &self.tokens {
            write!(f, "{}", visible(*token))?;
        }

        Ok(())
    }
}

pub(crate) fn visible(token: u8) -> char {
    match token {
        SPACE => 's',
        TAB => 't',
        LINE_FEED => 'n',
        other => other as char,
    }
}
