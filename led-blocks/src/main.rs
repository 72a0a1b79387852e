use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use led_blocks::editor::Workspace;
use led_blocks::ir::{Chain, Node, NodeKind, Operand};
use led_blocks::{BlockKind, Document, init_logging, load_program_with_report, serialize_workspace};

#[derive(Parser)]
#[command(name = "led-blocks")]
#[command(about = "Block programs for LED panels", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Загружает программу в редактор и показывает отчёт
    Check {
        /// Program JSON
        input: PathBuf,
    },

    /// Показать дерево программы
    Tree {
        /// Program JSON
        input: PathBuf,
    },

    /// Пропускает программу через редактор и печатает каноничный JSON
    Fmt {
        /// Program JSON
        input: PathBuf,

        /// Drop node ids from the output
        #[arg(long)]
        strip_ids: bool,

        /// Write here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Список типов блоков
    Kinds,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging("led_blocks=info");
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { input } => {
            let program = read_document(&input)?.into_program()?;
            let mut workspace = Workspace::new();
            let (_, report) = load_program_with_report(&program, &mut workspace)?;

            println!("{}: {} nodes", input.display(), program.node_count());
            println!("  created: {}", report.created);
            println!("  reused:  {}", report.reused);
            println!("  skipped: {}", report.skipped);
            if report.skipped > 0 {
                warn!("some blocks could not be placed in the editor");
            }
        }
        Commands::Tree { input } => match read_document(&input)? {
            Document::Program(program) => {
                let mut out = String::new();
                render_node(program.root(), 0, &mut out);
                print!("{out}");
            }
            Document::NoProgram { error } => println!("(no program: {error})"),
        },
        Commands::Fmt { input, strip_ids, output } => {
            let document = read_document(&input)?;
            let mut workspace = Workspace::new();
            if let Some(program) = document.program() {
                load_program_with_report(program, &mut workspace)?;
            }

            let mut document = serialize_workspace(&workspace);
            if strip_ids {
                if let Document::Program(program) = &mut document {
                    program.strip_ids();
                }
            }
            let text = document.to_json_pretty()?;
            match output {
                Some(path) => {
                    fs::write(&path, format!("{text}\n"))?;
                    info!("Written to {}", path.display());
                }
                None => println!("{text}"),
            }
        }
        Commands::Kinds => {
            println!("Block kinds:");
            for kind in BlockKind::all() {
                let shape = if kind.is_expression() { "value" } else { "statement" };
                println!("  {:14} {:9} - {}", kind.name(), shape, kind.description());
            }
        }
    }

    Ok(())
}

fn read_document(path: &Path) -> Result<Document, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path)?;
    Ok(Document::parse(&text)?)
}

fn render_node(head: &Node, depth: usize, out: &mut String) {
    let mut cursor = Some(head);
    while let Some(node) = cursor {
        let indent = "  ".repeat(depth);
        let id = node.id.as_deref().map(|id| format!(" #{id}")).unwrap_or_default();
        out.push_str(&format!("{indent}{}{id}{}\n", node.kind(), describe(node)));

        for chain in node.kind.slots() {
            render_chain(chain, depth + 1, out);
        }
        cursor = node.next.as_deref();
    }
}

fn render_chain(chain: &Chain, depth: usize, out: &mut String) {
    match chain.head() {
        Some(head) => render_node(head, depth, out),
        None => out.push_str(&format!("{}(empty)\n", "  ".repeat(depth))),
    }
}

/// Literal fields in one line, the way the editor shows them
fn describe(node: &Node) -> String {
    match &node.kind {
        NodeKind::DisplayImage { filename } => format!(" {filename}"),
        NodeKind::PlayAnimation { folder, play_for } => format!(" {folder} for {play_for}ms"),
        NodeKind::Wait { time } => format!(" {}", operand(time.as_ref())),
        NodeKind::Repeat { times, .. } => format!(" x{}", operand(times.as_ref())),
        NodeKind::If { condition, .. } | NodeKind::While { condition, .. } => {
            format!(" {}", operand(condition.as_ref()))
        }
        NodeKind::SetVariable { var_name, value } => format!(" {var_name} = {}", operand(value.as_ref())),
        NodeKind::Gpio { pin, state } => format!(" pin {pin} {}", state.name()),
        NodeKind::IfGpio { pin, state, .. } => format!(" pin {pin} is {}", state.name()),
        NodeKind::GpioTrigger { pin, trigger, .. } => format!(" pin {pin} on {}", trigger.name()),
        NodeKind::SetColor { color } => format!(" {}", operand(color.as_ref())),
        _ => String::new(),
    }
}

fn operand(operand: Option<&Operand>) -> String {
    match operand {
        None => "-".to_string(),
        Some(Operand::Number(n)) => n.to_string(),
        Some(Operand::Text(text)) => text.clone(),
        Some(Operand::Expr(expression)) => expression.kind.block_kind().to_string(),
    }
}
