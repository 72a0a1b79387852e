use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::editor::{BlockSink, FieldValue, field, input};
use crate::error::{LoadError, SinkError};
use crate::ir::{BlockKind, Chain, Document, ExprKind, Node, NodeKind, Operand, Program};

/// Colors offered by the `color_value` dropdown
pub const PRESET_COLORS: [&str; 13] = [
    "#FF0000", "#00FF00", "#0000FF", "#FFFF00", "#FF00FF", "#00FFFF", "#FFFFFF", "#FF8000",
    "#FF69B4", "#32CD32", "#8B4513", "#000000", "RANDOM",
];

/// What happened to the children of the loaded program
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChildReport {
    /// Blocks allocated in the sink, the root included
    pub created: usize,
    /// Nodes whose id was already materialized in this call
    pub reused: usize,
    /// Children that could not be created or connected
    pub skipped: usize,
}

/// Parses `text` and builds the program into `sink`, returning the start block
pub fn deserialize<S: BlockSink>(text: &str, sink: &mut S) -> Result<S::Block, LoadError> {
    let program = Document::parse(text)?.into_program()?;
    load_program(&program, sink)
}

pub fn load_program<S: BlockSink>(program: &Program, sink: &mut S) -> Result<S::Block, LoadError> {
    load_program_with_report(program, sink).map(|(root, _)| root)
}

pub fn load_program_with_report<S: BlockSink>(
    program: &Program,
    sink: &mut S,
) -> Result<(S::Block, ChildReport), LoadError> {
    let mut loader = Loader {
        sink,
        visited: HashMap::new(),
        report: ChildReport::default(),
    };
    let root = loader
        .node(program.root())
        .map_err(|source| LoadError::RootConstructionError { source })?;

    info!(
        created = loader.report.created,
        reused = loader.report.reused,
        skipped = loader.report.skipped,
        "program loaded"
    );
    Ok((root.block, loader.report))
}

/// Block handed back by the loader; `fresh` is false for a reused duplicate
#[derive(Clone, Copy)]
struct Placed<B> {
    block: B,
    fresh: bool,
}

struct Loader<'a, S: BlockSink> {
    sink: &'a mut S,
    // Видимые id живут только в пределах одного вызова
    visited: HashMap<String, S::Block>,
    report: ChildReport,
}

impl<S: BlockSink> Loader<'_, S> {
    fn reuse(&mut self, id: Option<&str>) -> Option<Placed<S::Block>> {
        let block = *self.visited.get(id?)?;
        debug!(id, "id already materialized, reusing block");
        self.report.reused += 1;
        Some(Placed { block, fresh: false })
    }

    fn allocate(&mut self, kind: BlockKind, id: Option<&str>) -> Result<S::Block, SinkError> {
        let block = self.sink.allocate(kind)?;
        self.report.created += 1;
        if let Some(id) = id {
            self.visited.insert(id.to_string(), block);
        }
        debug!(%kind, ?id, "block created");
        Ok(block)
    }

    /// Один оператор со всеми детьми, кроме `next`
    fn node(&mut self, node: &Node) -> Result<Placed<S::Block>, SinkError> {
        if let Some(placed) = self.reuse(node.id.as_deref()) {
            return Ok(placed);
        }
        let kind = node.kind();
        let block = self.allocate(kind, node.id.as_deref())?;

        match &node.kind {
            NodeKind::Start { actions } => self.slot(block, input::DO, actions),
            NodeKind::DisplayImage { filename } => {
                self.field(block, kind, field::FILENAME, filename.as_str().into());
            }
            NodeKind::PlayAnimation { folder, play_for } => {
                self.field(block, kind, field::FOLDER, folder.as_str().into());
                let play_for = i64::try_from(*play_for).unwrap_or(i64::MAX);
                self.field(block, kind, field::PLAY_FOR, play_for.into());
            }
            NodeKind::Wait { time } => self.operand(block, kind, input::TIME, time.as_ref()),
            NodeKind::If { condition, true_branch, false_branch } => {
                self.operand(block, kind, input::CONDITION, condition.as_ref());
                self.slot(block, input::TRUE, true_branch);
                self.slot(block, input::FALSE, false_branch);
            }
            NodeKind::SetVariable { var_name, value } => {
                self.field(block, kind, field::VAR_NAME, var_name.as_str().into());
                self.operand(block, kind, input::VALUE, value.as_ref());
            }
            NodeKind::Forever { loop_body } => self.slot(block, input::DO, loop_body),
            NodeKind::Repeat { times, loop_body } => {
                self.operand(block, kind, input::TIMES, times.as_ref());
                self.slot(block, input::DO, loop_body);
            }
            NodeKind::While { condition, loop_body } => {
                self.operand(block, kind, input::CONDITION, condition.as_ref());
                self.slot(block, input::DO, loop_body);
            }
            NodeKind::Break => {}
            NodeKind::Gpio { pin, state } => {
                self.field(block, kind, field::PIN, i64::from(*pin).into());
                self.field(block, kind, field::STATE, state.name().into());
            }
            NodeKind::IfGpio { pin, state, true_branch, false_branch } => {
                self.field(block, kind, field::PIN, i64::from(*pin).into());
                self.field(block, kind, field::STATE, state.name().into());
                self.slot(block, input::TRUE, true_branch);
                self.slot(block, input::FALSE, false_branch);
            }
            NodeKind::GpioTrigger { pin, trigger, actions } => {
                self.field(block, kind, field::PIN, i64::from(*pin).into());
                self.field(block, kind, field::TRIGGER, trigger.name().into());
                self.slot(block, input::DO, actions);
            }
            NodeKind::SetColor { color } => self.operand(block, kind, input::COLOR, color.as_ref()),
            // Выражение на месте оператора: поля как у выражения
            NodeKind::Number(value) => self.expression_body(block, &ExprKind::Number(value.clone())),
            NodeKind::RandomRange(range) => {
                self.expression_body(block, &ExprKind::RandomRange(range.clone()));
            }
            NodeKind::Compare(comparison) => {
                self.expression_body(block, &ExprKind::Compare(comparison.clone()));
            }
            NodeKind::GetVariable(variable) => {
                self.expression_body(block, &ExprKind::GetVariable(variable.clone()));
            }
            NodeKind::ColorValue(color) => self.expression_body(block, &ExprKind::ColorValue(color.clone())),
            NodeKind::CustomColor(color) => self.expression_body(block, &ExprKind::CustomColor(color.clone())),
            NodeKind::RgbColor(rgb) => self.expression_body(block, &ExprKind::RgbColor(*rgb)),
        }

        Ok(Placed { block, fresh: true })
    }

    /// Materializes `head` and links the rest of its chain through `next`
    fn chain(&mut self, head: &Node) -> Result<Placed<S::Block>, SinkError> {
        let first = self.node(head)?;
        if !first.fresh {
            return Ok(first);
        }

        let mut previous = first.block;
        let mut cursor = head.next.as_deref();
        while let Some(node) = cursor {
            let placed = match self.node(node) {
                Ok(placed) => placed,
                Err(err) => {
                    self.skip(node.kind(), &err);
                    break;
                }
            };
            // Повтор уже собран вместе со своей цепочкой
            if !placed.fresh {
                break;
            }
            if let Err(err) = self.sink.connect_next(previous, placed.block) {
                self.skip(node.kind(), &err);
                break;
            }
            previous = placed.block;
            cursor = node.next.as_deref();
        }
        Ok(first)
    }

    fn slot(&mut self, parent: S::Block, name: &str, chain: &Chain) {
        let Some(head) = chain.head() else {
            return;
        };
        let result = self
            .chain(head)
            .and_then(|placed| self.connect(placed, |sink, child| sink.connect_statement(parent, name, child)));
        if let Err(err) = result {
            self.skip(head.kind(), &err);
        }
    }

    fn operand(&mut self, parent: S::Block, parent_kind: BlockKind, name: &str, operand: Option<&Operand>) {
        let Some(operand) = operand else {
            return;
        };
        let result = self
            .expression(parent_kind, operand)
            .and_then(|placed| self.connect(placed, |sink, child| sink.connect_expression(parent, name, child)));
        if let Err(err) = result {
            warn!(parent = %parent_kind, input = name, error = %err, "value input left empty");
            self.report.skipped += 1;
        }
    }

    fn connect(
        &mut self,
        placed: Placed<S::Block>,
        link: impl FnOnce(&mut S, S::Block) -> Result<(), SinkError>,
    ) -> Result<(), SinkError> {
        // Повторно использованный блок уже стоит на своём месте
        if placed.fresh {
            link(&mut *self.sink, placed.block)?;
        }
        Ok(())
    }

    /// Literal numbers become `number` blocks, strings become color blocks
    fn expression(&mut self, parent_kind: BlockKind, operand: &Operand) -> Result<Placed<S::Block>, SinkError> {
        match operand {
            Operand::Number(value) => {
                let block = self.allocate(BlockKind::Number, None)?;
                self.field(block, BlockKind::Number, field::NUMBER, (*value).into());
                Ok(Placed { block, fresh: true })
            }
            Operand::Text(color) => {
                let kind = if parent_kind == BlockKind::SetColor && PRESET_COLORS.contains(&color.as_str()) {
                    BlockKind::ColorValue
                } else {
                    BlockKind::CustomColor
                };
                let block = self.allocate(kind, None)?;
                self.field(block, kind, field::COLOR, color.as_str().into());
                Ok(Placed { block, fresh: true })
            }
            Operand::Expr(expression) => {
                if let Some(placed) = self.reuse(expression.id.as_deref()) {
                    return Ok(placed);
                }
                let block = self.allocate(expression.kind.block_kind(), expression.id.as_deref())?;
                self.expression_body(block, &expression.kind);
                Ok(Placed { block, fresh: true })
            }
        }
    }

    fn expression_body(&mut self, block: S::Block, expression: &ExprKind) {
        let kind = expression.block_kind();
        match expression {
            ExprKind::Number(number) => self.field(block, kind, field::NUMBER, number.value.into()),
            ExprKind::RandomRange(range) => {
                self.field(block, kind, field::MIN, range.min.into());
                self.field(block, kind, field::MAX, range.max.into());
            }
            ExprKind::GetVariable(variable) => {
                self.field(block, kind, field::VAR_NAME, variable.var_name.as_str().into());
            }
            ExprKind::Compare(comparison) => {
                self.field(block, kind, field::OPERATOR, comparison.operator.name().into());
                self.operand(block, kind, input::LEFT, comparison.left.as_ref());
                self.operand(block, kind, input::RIGHT, comparison.right.as_ref());
            }
            ExprKind::ColorValue(color) | ExprKind::CustomColor(color) => {
                self.field(block, kind, field::COLOR, color.color.as_str().into());
            }
            ExprKind::RgbColor(rgb) => {
                self.field(block, kind, field::RED, i64::from(rgb.red).into());
                self.field(block, kind, field::GREEN, i64::from(rgb.green).into());
                self.field(block, kind, field::BLUE, i64::from(rgb.blue).into());
            }
        }
    }

    fn field(&mut self, block: S::Block, kind: BlockKind, name: &str, value: FieldValue) {
        if let Err(err) = self.sink.set_field(block, name, value) {
            warn!(%kind, field = name, error = %err, "field not set");
        }
    }

    fn skip(&mut self, kind: BlockKind, err: &SinkError) {
        warn!(%kind, error = %err, "child block skipped");
        self.report.skipped += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::{BlockSource, Workspace};
    use serde_json::json;

    fn load(value: serde_json::Value) -> (Workspace, crate::editor::BlockRef, ChildReport) {
        let program = Document::from_value(value).unwrap().into_program().unwrap();
        let mut workspace = Workspace::new();
        let (root, report) = load_program_with_report(&program, &mut workspace).unwrap();
        (workspace, root, report)
    }

    #[test]
    fn literals_become_value_blocks() {
        let (ws, root, report) = load(json!({
            "type": "start",
            "actions": [{
                "type": "wait", "time": 250,
                "next": { "type": "set_color", "color": "#FF69B4",
                          "next": { "type": "set_color", "color": "#123456" } }
            }]
        }));
        assert_eq!(report, ChildReport { created: 7, reused: 0, skipped: 0 });

        let wait = ws.child_statement(root, input::DO).unwrap();
        let number = ws.child_expression(wait, input::TIME).unwrap();
        assert_eq!(ws.kind(number), Some("number"));
        assert_eq!(ws.field(number, field::NUMBER), Some(FieldValue::Number(250)));

        let preset = ws.next_block(wait).unwrap();
        let preset_color = ws.child_expression(preset, input::COLOR).unwrap();
        assert_eq!(ws.kind(preset_color), Some("color_value"));

        let custom = ws.next_block(preset).unwrap();
        let custom_color = ws.child_expression(custom, input::COLOR).unwrap();
        assert_eq!(ws.kind(custom_color), Some("custom_color"));
        assert_eq!(ws.field(custom_color, field::COLOR), Some("#123456".into()));
    }

    #[test]
    fn duplicate_ids_are_materialized_once() {
        let (ws, root, report) = load(json!({
            "id": "s", "type": "start",
            "actions": [{
                "id": "a", "type": "repeat", "times": 2,
                "loop_body": [{ "id": "d", "type": "display_image", "filename": "x.raw" }],
                "next": { "id": "d", "type": "display_image", "filename": "x.raw" }
            }]
        }));
        assert_eq!(report.reused, 1);
        assert_eq!(ws.blocks_of_kind(BlockKind::DisplayImage).len(), 1);

        let repeat = ws.child_statement(root, input::DO).unwrap();
        let image = ws.child_statement(repeat, input::DO).unwrap();
        assert_eq!(ws.block_id(image), Some("b4"));
        assert_eq!(ws.next_block(repeat), None);
    }

    #[test]
    fn failing_child_leaves_the_rest_loaded() {
        // Число на месте оператора: блок создаётся, но соединить его нельзя
        let (ws, root, report) = load(json!({
            "type": "start",
            "actions": [{
                "type": "if", "condition": 1,
                "true_branch": [{ "type": "number", "value": 3 }],
                "false_branch": [{ "type": "display_image", "filename": "b.raw" }]
            }]
        }));
        assert_eq!(report.skipped, 1);
        let branch = ws.child_statement(root, input::DO).unwrap();
        assert_eq!(ws.child_statement(branch, input::TRUE), None);
        let other = ws.child_statement(branch, input::FALSE).unwrap();
        assert_eq!(ws.field(other, field::FILENAME), Some("b.raw".into()));
    }

    #[test]
    fn refused_root_is_fatal() {
        struct Refusing;
        impl BlockSink for Refusing {
            type Block = ();
            fn allocate(&mut self, kind: BlockKind) -> Result<(), SinkError> {
                Err(SinkError::Rejected { kind })
            }
            fn set_field(&mut self, _: (), _: &str, _: FieldValue) -> Result<(), SinkError> {
                Ok(())
            }
            fn connect_statement(&mut self, _: (), _: &str, _: ()) -> Result<(), SinkError> {
                Ok(())
            }
            fn connect_expression(&mut self, _: (), _: &str, _: ()) -> Result<(), SinkError> {
                Ok(())
            }
            fn connect_next(&mut self, _: (), _: ()) -> Result<(), SinkError> {
                Ok(())
            }
        }

        let err = deserialize(r#"{ "type": "start" }"#, &mut Refusing).unwrap_err();
        assert!(matches!(
            err,
            LoadError::RootConstructionError { source: SinkError::Rejected { kind: BlockKind::Start } }
        ));
    }

    #[test]
    fn sentinel_is_not_loaded() {
        let mut workspace = Workspace::new();
        let err = deserialize(r#"{ "error": "No start block found" }"#, &mut workspace).unwrap_err();
        assert!(matches!(err, LoadError::NoProgram { .. }));
        assert!(workspace.is_empty());
    }

    #[test]
    fn visited_ids_do_not_leak_between_calls() {
        let text = json!({ "id": "s", "type": "start",
                           "actions": [{ "id": "w", "type": "wait", "time": 1 }] })
        .to_string();
        let mut workspace = Workspace::new();
        deserialize(&text, &mut workspace).unwrap();
        deserialize(&text, &mut workspace).unwrap();
        assert_eq!(workspace.blocks_of_kind(BlockKind::Wait).len(), 2);
    }
}
