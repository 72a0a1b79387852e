//! Conversion between the editor block graph and the JSON program model.

mod deserializer;
mod serializer;

pub use deserializer::{ChildReport, PRESET_COLORS, deserialize, load_program, load_program_with_report};
pub use serializer::{serialize_block, serialize_workspace};
