use tracing::{debug, warn};

use crate::editor::{BlockSource, field, input};
use crate::ir::{
    BlockKind, Chain, ColorLiteral, CompareOp, Comparison, DEFAULT_COLOR, DEFAULT_FILENAME,
    DEFAULT_FOLDER, DEFAULT_PLAY_FOR, DEFAULT_RANDOM_MAX, DEFAULT_RANDOM_MIN, DEFAULT_VAR_NAME,
    Document, ExprKind, Expression, MAX_PIN, Node, NodeKind, NumberValue, Operand, PinState,
    Program, RandomRange, RgbColor, Trigger, VariableRef,
};

/// Serializes the program rooted at the first top-level `start` block.
///
/// A workspace without a start block yields the `{"error": ...}` sentinel.
pub fn serialize_workspace<S: BlockSource>(source: &S) -> Document {
    let start = source
        .top_blocks()
        .into_iter()
        .find(|&block| source.kind(block) == Some(BlockKind::Start.name()));

    let Some(start) = start else {
        warn!("No start block among top blocks");
        return Document::no_start_block();
    };

    let serializer = Serializer { source };
    match serializer.statement(start).map(Program::new) {
        Some(Ok(program)) => Document::Program(program),
        _ => Document::no_start_block(),
    }
}

/// Serializes one statement block and the chain hanging off its `next`
pub fn serialize_block<S: BlockSource>(source: &S, block: S::Block) -> Option<Node> {
    Serializer { source }.chain(Some(block)).into_head()
}

struct Serializer<'a, S: BlockSource> {
    source: &'a S,
}

impl<S: BlockSource> Serializer<'_, S> {
    fn chain(&self, head: Option<S::Block>) -> Chain {
        let mut nodes = Vec::new();
        let mut cursor = head;
        while let Some(block) = cursor {
            if let Some(node) = self.statement(block) {
                nodes.push(node);
            }
            cursor = self.source.next_block(block);
        }
        nodes.into_iter().collect()
    }

    fn slot(&self, block: S::Block, name: &str) -> Chain {
        self.chain(self.source.child_statement(block, name))
    }

    /// Один блок без `next`; цепочку собирает `chain`
    fn statement(&self, block: S::Block) -> Option<Node> {
        let kind = self.block_kind(block)?;
        debug!(%kind, "serializing block");

        let kind = match kind {
            BlockKind::Start => NodeKind::Start {
                actions: self.slot(block, input::DO),
            },
            BlockKind::DisplayImage => NodeKind::DisplayImage {
                filename: self.text(block, field::FILENAME).unwrap_or_else(|| DEFAULT_FILENAME.to_string()),
            },
            BlockKind::PlayAnimation => NodeKind::PlayAnimation {
                folder: self.text(block, field::FOLDER).unwrap_or_else(|| DEFAULT_FOLDER.to_string()),
                play_for: self
                    .int(block, field::PLAY_FOR)
                    .map_or(DEFAULT_PLAY_FOR, |ms| ms.max(0).unsigned_abs()),
            },
            BlockKind::Wait => NodeKind::Wait {
                time: self.operand_or(block, input::TIME, || {
                    Operand::Number(self.int(block, field::NUMBER).unwrap_or(0))
                }),
            },
            BlockKind::Number => NodeKind::Number(self.number(block)),
            BlockKind::RandomRange => NodeKind::RandomRange(self.random_range(block)),
            BlockKind::If => NodeKind::If {
                condition: self.operand(block, input::CONDITION),
                true_branch: self.slot(block, input::TRUE),
                false_branch: self.slot(block, input::FALSE),
            },
            BlockKind::Compare => NodeKind::Compare(self.comparison(block)),
            BlockKind::SetVariable => NodeKind::SetVariable {
                var_name: self.variable(block).var_name,
                value: self.operand(block, input::VALUE),
            },
            BlockKind::GetVariable => NodeKind::GetVariable(self.variable(block)),
            BlockKind::Forever => NodeKind::Forever {
                loop_body: self.slot(block, input::DO),
            },
            BlockKind::Repeat => NodeKind::Repeat {
                times: self.operand_or(block, input::TIMES, || Operand::Number(1)),
                loop_body: self.slot(block, input::DO),
            },
            BlockKind::While => NodeKind::While {
                condition: self.operand(block, input::CONDITION),
                loop_body: self.slot(block, input::DO),
            },
            BlockKind::Break => NodeKind::Break,
            BlockKind::Gpio => NodeKind::Gpio {
                pin: self.pin(block),
                state: self.pin_state(block),
            },
            BlockKind::IfGpio => NodeKind::IfGpio {
                pin: self.pin(block),
                state: self.pin_state(block),
                true_branch: self.slot(block, input::TRUE),
                false_branch: self.slot(block, input::FALSE),
            },
            BlockKind::GpioTrigger => NodeKind::GpioTrigger {
                pin: self.pin(block),
                trigger: self
                    .text(block, field::TRIGGER)
                    .and_then(|name| Trigger::from_name(&name))
                    .unwrap_or_default(),
                actions: self.slot(block, input::DO),
            },
            BlockKind::SetColor => NodeKind::SetColor {
                color: match self.source.child_expression(block, input::COLOR) {
                    Some(child) => self.expression(child),
                    None => self.text(block, field::COLOR).map(Operand::Text),
                },
            },
            BlockKind::ColorValue => NodeKind::ColorValue(self.color(block)),
            BlockKind::CustomColor => NodeKind::CustomColor(self.color(block)),
            BlockKind::RgbColor => NodeKind::RgbColor(self.rgb(block)),
        };

        Some(Node {
            id: self.source.block_id(block).map(str::to_string),
            kind,
            next: None,
        })
    }

    /// Connected expression, or `None` when the input is empty
    fn operand(&self, block: S::Block, name: &str) -> Option<Operand> {
        self.source
            .child_expression(block, name)
            .and_then(|child| self.expression(child))
    }

    /// Connected expression; an empty input falls back to the literal default
    fn operand_or(&self, block: S::Block, name: &str, fallback: impl FnOnce() -> Operand) -> Option<Operand> {
        match self.source.child_expression(block, name) {
            Some(child) => self.expression(child),
            None => Some(fallback()),
        }
    }

    fn expression(&self, block: S::Block) -> Option<Operand> {
        let kind = self.block_kind(block)?;
        let expression = match kind {
            // Числа и цвета пишутся литералами
            BlockKind::Number => return Some(Operand::Number(self.number(block).value)),
            BlockKind::ColorValue | BlockKind::CustomColor => {
                return Some(Operand::Text(self.color(block).color));
            }
            BlockKind::RandomRange => ExprKind::RandomRange(self.random_range(block)),
            BlockKind::GetVariable => ExprKind::GetVariable(self.variable(block)),
            BlockKind::Compare => ExprKind::Compare(self.comparison(block)),
            BlockKind::RgbColor => ExprKind::RgbColor(self.rgb(block)),
            other => {
                warn!(kind = %other, "statement block connected to a value input, ignoring");
                return None;
            }
        };
        Some(Operand::Expr(Box::new(Expression {
            id: self.source.block_id(block).map(str::to_string),
            kind: expression,
        })))
    }

    fn block_kind(&self, block: S::Block) -> Option<BlockKind> {
        let name = self.source.kind(block)?;
        match name.parse() {
            Ok(kind) => Some(kind),
            Err(_) => {
                warn!(kind = name, "skipping block of unknown kind");
                None
            }
        }
    }

    fn number(&self, block: S::Block) -> NumberValue {
        NumberValue {
            value: self.int(block, field::NUMBER).unwrap_or(0),
        }
    }

    fn random_range(&self, block: S::Block) -> RandomRange {
        RandomRange {
            min: self.int(block, field::MIN).unwrap_or(DEFAULT_RANDOM_MIN),
            max: self.int(block, field::MAX).unwrap_or(DEFAULT_RANDOM_MAX),
        }
    }

    fn variable(&self, block: S::Block) -> VariableRef {
        VariableRef {
            var_name: self.text(block, field::VAR_NAME).unwrap_or_else(|| DEFAULT_VAR_NAME.to_string()),
        }
    }

    fn comparison(&self, block: S::Block) -> Comparison {
        Comparison {
            left: self.operand(block, input::LEFT),
            operator: self
                .text(block, field::OPERATOR)
                .and_then(|name| CompareOp::from_name(&name))
                .unwrap_or_default(),
            right: self.operand(block, input::RIGHT),
        }
    }

    fn color(&self, block: S::Block) -> ColorLiteral {
        ColorLiteral {
            color: self.text(block, field::COLOR).unwrap_or_else(|| DEFAULT_COLOR.to_string()),
        }
    }

    fn rgb(&self, block: S::Block) -> RgbColor {
        RgbColor {
            red: self.channel(block, field::RED),
            green: self.channel(block, field::GREEN),
            blue: self.channel(block, field::BLUE),
        }
    }

    fn pin(&self, block: S::Block) -> u8 {
        let pin = self.int(block, field::PIN).unwrap_or(0);
        u8::try_from(pin.clamp(0, i64::from(MAX_PIN))).unwrap_or(0)
    }

    fn pin_state(&self, block: S::Block) -> PinState {
        self.text(block, field::STATE)
            .and_then(|name| PinState::from_name(&name))
            .unwrap_or_default()
    }

    fn channel(&self, block: S::Block, name: &str) -> u8 {
        let value = self.int(block, name).unwrap_or(0);
        u8::try_from(value.clamp(0, 255)).unwrap_or(0)
    }

    fn int(&self, block: S::Block, name: &str) -> Option<i64> {
        self.source.field(block, name)?.as_int()
    }

    fn text(&self, block: S::Block, name: &str) -> Option<String> {
        self.source.field(block, name).map(|value| value.as_text())
    }
}
