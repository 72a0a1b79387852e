use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::kind::BlockKind;

/// Запас стека перед очередным уровнем `next` при сериализации
const STACK_RED_ZONE: usize = 64 * 1024;
const STACK_GROWTH: usize = 1024 * 1024;

/// Узел программы: общий `id`, поля конкретного типа и ссылка на следующий оператор
///
/// Clone, equality and drop walk the `next` chain in a loop, so chains of any
/// length are safe to copy, compare and free.
#[derive(Debug, Serialize, Deserialize)]
pub struct Node {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none", serialize_with = "serialize_next")]
    pub next: Option<Box<Node>>,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self { id: None, kind, next: None }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Hangs `chain` off this node's `next`, replacing what was there
    pub fn with_next(mut self, mut chain: Chain) -> Self {
        self.next = chain.0.take();
        self
    }

    /// This node alone, without its `next` chain
    fn detached(&self) -> Self {
        Self {
            id: self.id.clone(),
            kind: self.kind.clone(),
            next: None,
        }
    }

    pub fn kind(&self) -> BlockKind {
        self.kind.block_kind()
    }

    /// Drops every `id` in this node, its operands, slots and `next` chain
    pub fn strip_ids(&mut self) {
        let mut cursor = Some(self);
        while let Some(node) = cursor {
            node.id = None;
            node.kind.strip_ids();
            cursor = node.next.as_deref_mut();
        }
    }

    /// Calls `visit` for every statement and expression reachable from here
    pub fn walk(&self, visit: &mut impl FnMut(BlockKind)) {
        for node in Chain::iter_from(self) {
            visit(node.kind());
            node.kind.walk_children(visit);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    Start {
        #[serde(default, skip_serializing_if = "Chain::is_empty")]
        actions: Chain,
    },
    DisplayImage {
        #[serde(default = "default_filename")]
        filename: String,
    },
    PlayAnimation {
        #[serde(default = "default_folder")]
        folder: String,
        #[serde(default = "default_play_for")]
        play_for: u64,
    },
    Wait {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time: Option<Operand>,
    },
    Number(NumberValue),
    RandomRange(RandomRange),
    If {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        condition: Option<Operand>,
        #[serde(default, skip_serializing_if = "Chain::is_empty")]
        true_branch: Chain,
        #[serde(default, skip_serializing_if = "Chain::is_empty")]
        false_branch: Chain,
    },
    Compare(Comparison),
    SetVariable {
        #[serde(default = "default_var_name")]
        var_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Operand>,
    },
    GetVariable(VariableRef),
    Forever {
        #[serde(default, skip_serializing_if = "Chain::is_empty")]
        loop_body: Chain,
    },
    Repeat {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        times: Option<Operand>,
        #[serde(default, skip_serializing_if = "Chain::is_empty")]
        loop_body: Chain,
    },
    While {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        condition: Option<Operand>,
        #[serde(default, skip_serializing_if = "Chain::is_empty")]
        loop_body: Chain,
    },
    Break,
    Gpio {
        #[serde(default)]
        pin: u8,
        #[serde(default)]
        state: PinState,
    },
    IfGpio {
        #[serde(default)]
        pin: u8,
        #[serde(default)]
        state: PinState,
        #[serde(default, skip_serializing_if = "Chain::is_empty")]
        true_branch: Chain,
        #[serde(default, skip_serializing_if = "Chain::is_empty")]
        false_branch: Chain,
    },
    GpioTrigger {
        #[serde(default)]
        pin: u8,
        #[serde(default)]
        trigger: Trigger,
        #[serde(default, skip_serializing_if = "Chain::is_empty")]
        actions: Chain,
    },
    SetColor {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<Operand>,
    },
    ColorValue(ColorLiteral),
    CustomColor(ColorLiteral),
    RgbColor(RgbColor),
}

impl NodeKind {
    pub fn block_kind(&self) -> BlockKind {
        match self {
            Self::Start { .. } => BlockKind::Start,
            Self::DisplayImage { .. } => BlockKind::DisplayImage,
            Self::PlayAnimation { .. } => BlockKind::PlayAnimation,
            Self::Wait { .. } => BlockKind::Wait,
            Self::Number(_) => BlockKind::Number,
            Self::RandomRange(_) => BlockKind::RandomRange,
            Self::If { .. } => BlockKind::If,
            Self::Compare(_) => BlockKind::Compare,
            Self::SetVariable { .. } => BlockKind::SetVariable,
            Self::GetVariable(_) => BlockKind::GetVariable,
            Self::Forever { .. } => BlockKind::Forever,
            Self::Repeat { .. } => BlockKind::Repeat,
            Self::While { .. } => BlockKind::While,
            Self::Break => BlockKind::Break,
            Self::Gpio { .. } => BlockKind::Gpio,
            Self::IfGpio { .. } => BlockKind::IfGpio,
            Self::GpioTrigger { .. } => BlockKind::GpioTrigger,
            Self::SetColor { .. } => BlockKind::SetColor,
            Self::ColorValue(_) => BlockKind::ColorValue,
            Self::CustomColor(_) => BlockKind::CustomColor,
            Self::RgbColor(_) => BlockKind::RgbColor,
        }
    }

    fn operands_mut(&mut self) -> Vec<&mut Operand> {
        match self {
            Self::Wait { time: operand }
            | Self::SetVariable { value: operand, .. }
            | Self::SetColor { color: operand }
            | Self::If { condition: operand, .. }
            | Self::Repeat { times: operand, .. }
            | Self::While { condition: operand, .. } => operand.iter_mut().collect(),
            Self::Compare(comparison) => comparison.operands_mut(),
            _ => Vec::new(),
        }
    }

    fn operands(&self) -> Vec<&Operand> {
        match self {
            Self::Wait { time: operand }
            | Self::SetVariable { value: operand, .. }
            | Self::SetColor { color: operand }
            | Self::If { condition: operand, .. }
            | Self::Repeat { times: operand, .. }
            | Self::While { condition: operand, .. } => operand.iter().collect(),
            Self::Compare(comparison) => comparison.left.iter().chain(comparison.right.iter()).collect(),
            _ => Vec::new(),
        }
    }

    /// Statement slots of this node, in editor order
    pub fn slots(&self) -> Vec<&Chain> {
        match self {
            Self::If { true_branch, false_branch, .. }
            | Self::IfGpio { true_branch, false_branch, .. } => vec![true_branch, false_branch],
            Self::Forever { loop_body }
            | Self::Repeat { loop_body, .. }
            | Self::While { loop_body, .. } => vec![loop_body],
            Self::Start { actions } | Self::GpioTrigger { actions, .. } => vec![actions],
            _ => Vec::new(),
        }
    }

    /// Statement slot stored under the JSON field `name`, if this kind has it
    pub(crate) fn slot_mut(&mut self, name: &str) -> Option<&mut Chain> {
        match (self, name) {
            (Self::Start { actions } | Self::GpioTrigger { actions, .. }, "actions") => Some(actions),
            (Self::If { true_branch, .. } | Self::IfGpio { true_branch, .. }, "true_branch") => {
                Some(true_branch)
            }
            (Self::If { false_branch, .. } | Self::IfGpio { false_branch, .. }, "false_branch") => {
                Some(false_branch)
            }
            (
                Self::Forever { loop_body } | Self::Repeat { loop_body, .. } | Self::While { loop_body, .. },
                "loop_body",
            ) => Some(loop_body),
            _ => None,
        }
    }

    fn slots_mut(&mut self) -> Vec<&mut Chain> {
        match self {
            Self::If { true_branch, false_branch, .. }
            | Self::IfGpio { true_branch, false_branch, .. } => vec![true_branch, false_branch],
            Self::Forever { loop_body }
            | Self::Repeat { loop_body, .. }
            | Self::While { loop_body, .. } => vec![loop_body],
            Self::Start { actions } | Self::GpioTrigger { actions, .. } => vec![actions],
            _ => Vec::new(),
        }
    }

    fn strip_ids(&mut self) {
        for operand in self.operands_mut() {
            operand.strip_ids();
        }
        for chain in self.slots_mut() {
            if let Some(head) = chain.0.as_deref_mut() {
                head.strip_ids();
            }
        }
    }

    fn walk_children(&self, visit: &mut impl FnMut(BlockKind)) {
        for operand in self.operands() {
            operand.walk(visit);
        }
        for chain in self.slots() {
            if let Some(head) = chain.head() {
                head.walk(visit);
            }
        }
    }
}

impl Clone for Node {
    fn clone(&self) -> Self {
        let rest: Chain = Chain::iter_from(self).skip(1).map(Node::detached).collect();
        self.detached().with_next(rest)
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Chain::iter_from(self)
            .map(|node| (&node.id, &node.kind))
            .eq(Chain::iter_from(other).map(|node| (&node.id, &node.kind)))
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        // Звенья отцепляются по одному, без рекурсии по next
        let mut next = self.next.take();
        while let Some(mut node) = next {
            next = node.next.take();
        }
    }
}

// Каждое звено next добавляет уровень вложенности в выходном JSON
fn serialize_next<S: Serializer>(next: &Option<Box<Node>>, serializer: S) -> Result<S::Ok, S::Error> {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROWTH, || next.serialize(serializer))
}

/// Поле, которое может быть литералом или вложенным выражением
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    Number(i64),
    Text(String),
    Expr(Box<Expression>),
}

impl Operand {
    pub fn expr(kind: ExprKind) -> Self {
        Self::Expr(Box::new(Expression { id: None, kind }))
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    fn strip_ids(&mut self) {
        if let Self::Expr(expression) = self {
            expression.id = None;
            if let ExprKind::Compare(comparison) = &mut expression.kind {
                for operand in comparison.operands_mut() {
                    operand.strip_ids();
                }
            }
        }
    }

    fn walk(&self, visit: &mut impl FnMut(BlockKind)) {
        match self {
            Self::Number(_) => visit(BlockKind::Number),
            Self::Text(_) => visit(BlockKind::CustomColor),
            Self::Expr(expression) => {
                visit(expression.kind.block_kind());
                if let ExprKind::Compare(comparison) = &expression.kind {
                    for operand in comparison.left.iter().chain(comparison.right.iter()) {
                        operand.walk(visit);
                    }
                }
            }
        }
    }
}

/// Value-producing node. Never owns a `next` link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExprKind {
    Number(NumberValue),
    RandomRange(RandomRange),
    GetVariable(VariableRef),
    Compare(Comparison),
    ColorValue(ColorLiteral),
    CustomColor(ColorLiteral),
    RgbColor(RgbColor),
}

impl ExprKind {
    pub fn block_kind(&self) -> BlockKind {
        match self {
            Self::Number(_) => BlockKind::Number,
            Self::RandomRange(_) => BlockKind::RandomRange,
            Self::GetVariable(_) => BlockKind::GetVariable,
            Self::Compare(_) => BlockKind::Compare,
            Self::ColorValue(_) => BlockKind::ColorValue,
            Self::CustomColor(_) => BlockKind::CustomColor,
            Self::RgbColor(_) => BlockKind::RgbColor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumberValue {
    #[serde(default)]
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomRange {
    #[serde(default)]
    pub min: i64,
    #[serde(default = "default_max")]
    pub max: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableRef {
    #[serde(default = "default_var_name")]
    pub var_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<Operand>,
    #[serde(default)]
    pub operator: CompareOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<Operand>,
}

impl Comparison {
    fn operands_mut(&mut self) -> Vec<&mut Operand> {
        self.left.iter_mut().chain(self.right.iter_mut()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorLiteral {
    #[serde(default = "default_color")]
    pub color: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RgbColor {
    #[serde(default)]
    pub red: u8,
    #[serde(default)]
    pub green: u8,
    #[serde(default)]
    pub blue: u8,
}

impl RgbColor {
    /// `#rrggbb`, lower-case
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.red, self.green, self.blue)
    }

    /// `rgb(r, g, b)`
    pub fn to_css(&self) -> String {
        format!("rgb({}, {}, {})", self.red, self.green, self.blue)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CompareOp {
    #[default]
    Eq,
    Neq,
    Lt,
    Gt,
    Lte,
    Gte,
}

impl CompareOp {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Eq => "EQ",
            Self::Neq => "NEQ",
            Self::Lt => "LT",
            Self::Gt => "GT",
            Self::Lte => "LTE",
            Self::Gte => "GTE",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [Self::Eq, Self::Neq, Self::Lt, Self::Gt, Self::Lte, Self::Gte]
            .into_iter()
            .find(|op| op.name() == name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PinState {
    #[default]
    High,
    Low,
}

impl PinState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Low => "LOW",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "HIGH" => Some(Self::High),
            "LOW" => Some(Self::Low),
            _ => None,
        }
    }

    pub fn is_high(&self) -> bool {
        matches!(self, Self::High)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Trigger {
    #[default]
    Rising,
    Falling,
    Both,
    High,
    Low,
}

impl Trigger {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Rising => "RISING",
            Self::Falling => "FALLING",
            Self::Both => "BOTH",
            Self::High => "HIGH",
            Self::Low => "LOW",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [Self::Rising, Self::Falling, Self::Both, Self::High, Self::Low]
            .into_iter()
            .find(|trigger| trigger.name() == name)
    }
}

/// Голова цепочки операторов (ветка, тело цикла, actions)
///
/// On the wire a chain is an array whose first element is the head; the rest
/// of the chain hangs off `next`. A bare object or `null` is also accepted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Chain(Option<Box<Node>>);

impl Chain {
    pub fn empty() -> Self {
        Self(None)
    }

    pub fn new(head: Node) -> Self {
        Self(Some(Box::new(head)))
    }

    pub fn head(&self) -> Option<&Node> {
        self.0.as_deref()
    }

    pub fn into_head(self) -> Option<Node> {
        self.0.map(|head| *head)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    pub fn iter(&self) -> ChainIter<'_> {
        ChainIter { cursor: self.head() }
    }

    fn iter_from(head: &Node) -> ChainIter<'_> {
        ChainIter { cursor: Some(head) }
    }
}

/// Links the nodes through `next` in iteration order
impl FromIterator<Node> for Chain {
    fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Self {
        let nodes: Vec<Node> = iter.into_iter().collect();
        let head = nodes.into_iter().rev().fold(None, |next, mut node| {
            node.next = next;
            Some(Box::new(node))
        });
        Self(head)
    }
}

pub struct ChainIter<'a> {
    cursor: Option<&'a Node>,
}

impl<'a> Iterator for ChainIter<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.cursor?;
        self.cursor = node.next.as_deref();
        Some(node)
    }
}

impl Serialize for Chain {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.head() {
            Some(head) => serializer.collect_seq(std::iter::once(head)),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for Chain {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum ChainRepr {
            List(Vec<Node>),
            Single(Box<Node>),
        }

        let head = match Option::<ChainRepr>::deserialize(deserializer)? {
            // Остальные элементы массива дублируют цепочку через next
            Some(ChainRepr::List(nodes)) => nodes.into_iter().next().map(Box::new),
            Some(ChainRepr::Single(node)) => Some(node),
            None => None,
        };
        Ok(Self(head))
    }
}

/// Highest GPIO pin the editor offers
pub const MAX_PIN: u8 = 40;

// Значения по умолчанию из определений блоков редактора
pub const DEFAULT_FILENAME: &str = "image.bmp";
pub const DEFAULT_FOLDER: &str = "animation_folder";
pub const DEFAULT_PLAY_FOR: u64 = 500;
pub const DEFAULT_RANDOM_MIN: i64 = 0;
pub const DEFAULT_RANDOM_MAX: i64 = 1000;
pub const DEFAULT_VAR_NAME: &str = "myVar";
pub const DEFAULT_COLOR: &str = "#FF0000";

fn default_filename() -> String {
    DEFAULT_FILENAME.to_string()
}

fn default_folder() -> String {
    DEFAULT_FOLDER.to_string()
}

fn default_play_for() -> u64 {
    DEFAULT_PLAY_FOR
}

fn default_max() -> i64 {
    DEFAULT_RANDOM_MAX
}

fn default_var_name() -> String {
    DEFAULT_VAR_NAME.to_string()
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}
