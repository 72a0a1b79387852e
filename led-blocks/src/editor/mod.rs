//! Capability interface to the block editor.
//!
//! The codec never touches editor internals: it reads a block graph through
//! [`BlockSource`] and builds one through [`BlockSink`].

mod workspace;

use crate::error::SinkError;
use crate::ir::BlockKind;

pub use workspace::{BlockData, BlockRef, Workspace};

/// Editor field names
pub mod field {
    pub const FILENAME: &str = "FILENAME";
    pub const FOLDER: &str = "FOLDER";
    pub const PLAY_FOR: &str = "PLAY_FOR";
    pub const NUMBER: &str = "NUMBER";
    pub const MIN: &str = "MIN";
    pub const MAX: &str = "MAX";
    pub const OPERATOR: &str = "OPERATOR";
    pub const VAR_NAME: &str = "VAR_NAME";
    pub const PIN: &str = "PIN";
    pub const STATE: &str = "STATE";
    pub const TRIGGER: &str = "TRIGGER";
    pub const COLOR: &str = "COLOR";
    pub const RED: &str = "RED";
    pub const GREEN: &str = "GREEN";
    pub const BLUE: &str = "BLUE";
}

/// Editor input names (statement and value sockets)
pub mod input {
    pub const TIME: &str = "TIME";
    pub const CONDITION: &str = "CONDITION";
    pub const TRUE: &str = "TRUE";
    pub const FALSE: &str = "FALSE";
    pub const LEFT: &str = "LEFT";
    pub const RIGHT: &str = "RIGHT";
    pub const VALUE: &str = "VALUE";
    pub const DO: &str = "DO";
    pub const TIMES: &str = "TIMES";
    pub const COLOR: &str = "COLOR";
}

/// Значение поля блока: числовые поля и текстовые/выпадающие
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Number(i64),
    Text(String),
}

impl FieldValue {
    /// Integer value; text is read like `parseInt` (leading sign and digits)
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(text) => parse_leading_int(text),
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(text) => text.clone(),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

fn parse_leading_int(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, text.strip_prefix('+').unwrap_or(text)),
    };
    let end = digits
        .char_indices()
        .find(|(_, ch)| !ch.is_ascii_digit())
        .map_or(digits.len(), |(index, _)| index);
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

/// Read side of the editor, consumed by the serializer
pub trait BlockSource {
    type Block: Copy;

    /// Blocks without a parent, in workspace order
    fn top_blocks(&self) -> Vec<Self::Block>;

    /// Editor kind name, e.g. `"display_image"`
    fn kind(&self, block: Self::Block) -> Option<&str>;

    fn block_id(&self, block: Self::Block) -> Option<&str>;

    fn field(&self, block: Self::Block, name: &str) -> Option<FieldValue>;

    /// First block connected to a statement input
    fn child_statement(&self, block: Self::Block, input: &str) -> Option<Self::Block>;

    /// Block connected to a value input
    fn child_expression(&self, block: Self::Block, input: &str) -> Option<Self::Block>;

    fn next_block(&self, block: Self::Block) -> Option<Self::Block>;
}

/// Write side of the editor, driven by the deserializer
pub trait BlockSink {
    type Block: Copy;

    fn allocate(&mut self, kind: BlockKind) -> Result<Self::Block, SinkError>;

    fn set_field(&mut self, block: Self::Block, name: &str, value: FieldValue) -> Result<(), SinkError>;

    fn connect_statement(
        &mut self,
        parent: Self::Block,
        input: &str,
        child: Self::Block,
    ) -> Result<(), SinkError>;

    fn connect_expression(
        &mut self,
        parent: Self::Block,
        input: &str,
        child: Self::Block,
    ) -> Result<(), SinkError>;

    fn connect_next(&mut self, previous: Self::Block, next: Self::Block) -> Result<(), SinkError>;
}
