//! Block programs for an LED panel.
//!
//! The JSON program model lives in [`ir`], conversion to and from the block
//! editor in [`codec`] (through the traits in [`editor`]), and the async
//! preview interpreter in [`interpreter`].

pub mod codec;
pub mod editor;
pub mod error;
pub mod interpreter;
pub mod ir;

pub use codec::{ChildReport, deserialize, load_program, load_program_with_report, serialize_workspace};
pub use error::{LoadError, RunError, SinkError};
pub use interpreter::{PanelSink, PreviewConfig, Previewer, RunHandle, RunReport, RunStatus};
pub use ir::{BlockKind, Document, Program};

use tracing_subscriber::{EnvFilter, fmt};

/// Installs the `tracing` subscriber used by the binaries.
///
/// `RUST_LOG` overrides the default filter.
pub fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    fmt().with_env_filter(filter).with_target(false).init();
}
