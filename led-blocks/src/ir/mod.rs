//! Program Model: the JSON tree the editor, the loader and the interpreter share.

mod document;
mod kind;
mod program;

pub use document::{Document, NO_START_BLOCK, Program};
pub use kind::BlockKind;
pub use program::{
    Chain, ChainIter, ColorLiteral, CompareOp, Comparison, DEFAULT_COLOR, DEFAULT_FILENAME,
    DEFAULT_FOLDER, DEFAULT_PLAY_FOR, DEFAULT_RANDOM_MAX, DEFAULT_RANDOM_MIN, DEFAULT_VAR_NAME,
    ExprKind, Expression, MAX_PIN, Node, NodeKind, NumberValue, Operand, PinState, RandomRange,
    RgbColor, Trigger, VariableRef,
};
