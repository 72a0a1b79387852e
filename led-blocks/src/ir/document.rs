use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::LoadError;

use super::kind::BlockKind;
use super::program::{Chain, Node, NodeKind};

/// Sentinel text the serializer emits when the workspace has no start block
pub const NO_START_BLOCK: &str = "No start block found";

/// Поля, в которых допустимы только выражения
const OPERAND_FIELDS: [&str; 6] = ["time", "value", "condition", "times", "left", "right"];

/// Поля со вложенными цепочками операторов
const SLOT_FIELDS: [&str; 4] = ["actions", "true_branch", "false_branch", "loop_body"];

/// Validated program: the root is always a `start` node
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Program {
    root: Node,
}

impl Program {
    pub fn new(root: Node) -> Result<Self, LoadError> {
        match root.kind {
            NodeKind::Start { .. } => Ok(Self { root }),
            _ => Err(LoadError::NotStart { found: root.kind() }),
        }
    }

    pub fn from_actions(actions: Chain) -> Self {
        Self {
            root: Node::new(NodeKind::Start { actions }),
        }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn actions(&self) -> &Chain {
        match &self.root.kind {
            NodeKind::Start { actions } => actions,
            // Program::new не пропускает другие корни
            _ => unreachable!("program root is always a start node"),
        }
    }

    pub fn strip_ids(&mut self) {
        self.root.strip_ids();
    }

    /// Number of statement and expression nodes in the tree
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.root.walk(&mut |_| count += 1);
        count
    }
}

/// Top-level JSON document: a program or the "no program" sentinel
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    Program(Program),
    NoProgram { error: String },
}

impl Document {
    pub fn no_start_block() -> Self {
        Self::NoProgram {
            error: NO_START_BLOCK.to_string(),
        }
    }

    /// Parses program text of any chain length.
    ///
    /// Every `next` is one more level of JSON nesting, so the recursion
    /// limit is lifted and the stack grows on demand while reading.
    pub fn parse(text: &str) -> Result<Self, LoadError> {
        let mut json = serde_json::Deserializer::from_str(text);
        json.disable_recursion_limit();
        let value = Value::deserialize(serde_stacker::Deserializer::new(&mut json))?;
        json.end()?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, LoadError> {
        if let Some(error) = value.get("error") {
            let error = match error {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            return Ok(Self::NoProgram { error });
        }

        let root = node_chain(value, "$")?;
        Ok(Self::Program(Program::new(root)?))
    }

    pub fn program(&self) -> Option<&Program> {
        match self {
            Self::Program(program) => Some(program),
            Self::NoProgram { .. } => None,
        }
    }

    pub fn into_program(self) -> Result<Program, LoadError> {
        match self {
            Self::Program(program) => Ok(program),
            Self::NoProgram { error } => Err(LoadError::NoProgram { reason: error }),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Program(program) => program.serialize(serializer),
            Self::NoProgram { error } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("error", error)?;
                map.end()
            }
        }
    }
}

/// Builds a node and its `next` chain.
///
/// The `next` links are cut off one by one first and the nodes are relinked
/// afterwards, so a long chain never recurses. Errors inside the chain are
/// reported as `<head>.next[i]`, the i-th block after the head.
fn node_chain(mut value: Value, path: &str) -> Result<Node, LoadError> {
    let mut rest = Vec::new();
    let mut cursor = take_next(&mut value);
    while let Some(mut next) = cursor {
        cursor = take_next(&mut next);
        rest.push(next);
    }

    let head = node(value, path)?;
    let rest = rest
        .into_iter()
        .enumerate()
        .map(|(index, value)| node(value, &format!("{path}.next[{}]", index + 1)))
        .collect::<Result<Chain, _>>()?;
    Ok(head.with_next(rest))
}

fn take_next(value: &mut Value) -> Option<Value> {
    value.as_object_mut()?.remove("next").filter(|next| !next.is_null())
}

/// Один узел без `next`: дискриминатор, операнды, слоты, затем поля через serde
fn node(value: Value, path: &str) -> Result<Node, LoadError> {
    let mut object = match value {
        Value::Object(object) => object,
        other => {
            let message = format!("expected a block, got {}", shape(&other));
            dispose(other);
            return Err(LoadError::SchemaError { path: path.to_string(), message });
        }
    };

    let kind = discriminator(&mut object, path)?;
    operands(&mut object, kind, path)?;

    let mut slots = Vec::new();
    for name in SLOT_FIELDS {
        if let Some(chain) = object.remove(name) {
            slots.push((name, chain_from_value(chain, &format!("{path}.{name}"))?));
        }
    }

    let mut node: Node = serde_json::from_value(Value::Object(object)).map_err(|source| LoadError::SchemaError {
        path: path.to_string(),
        message: source.to_string(),
    })?;
    for (name, chain) in slots {
        // Слот, которого у этого типа нет, просто отбрасывается
        if let Some(slot) = node.kind.slot_mut(name) {
            *slot = chain;
        }
    }
    Ok(node)
}

/// A statement slot: `[head, ...]`, a bare head object, or `null`
fn chain_from_value(value: Value, path: &str) -> Result<Chain, LoadError> {
    match value {
        Value::Null => Ok(Chain::empty()),
        Value::Array(items) => {
            let mut items = items.into_iter();
            let head = items.next();
            // Остальные элементы массива повторяют цепочку головы через next
            items.for_each(dispose);
            match head {
                Some(head) => node_chain(head, &format!("{path}[0]")).map(Chain::new),
                None => Ok(Chain::empty()),
            }
        }
        Value::Object(_) => node_chain(value, path).map(Chain::new),
        other => {
            let message = format!("expected a list of blocks, got {}", shape(&other));
            dispose(other);
            Err(LoadError::SchemaError { path: path.to_string(), message })
        }
    }
}

/// Проверяет операнды узла и выражения внутри них, переименовывая `kind` в `type`
fn operands(object: &mut Map<String, Value>, kind: BlockKind, path: &str) -> Result<(), LoadError> {
    for (key, child) in object.iter_mut() {
        if !OPERAND_FIELDS.contains(&key.as_str()) && !(key == "color" && kind == BlockKind::SetColor) {
            continue;
        }
        let child_path = format!("{path}.{key}");
        check_operand(child, &child_path)?;
        if let Value::Object(inner) = child {
            let inner_kind = discriminator(inner, &child_path)?;
            operands(inner, inner_kind, &child_path)?;
        }
    }
    Ok(())
}

/// Frees a value without recursing into it
fn dispose(value: Value) {
    let mut stack = vec![value];
    while let Some(value) = stack.pop() {
        match value {
            Value::Array(items) => stack.extend(items),
            Value::Object(object) => stack.extend(object.into_iter().map(|(_, child)| child)),
            _ => {}
        }
    }
}

fn shape(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn discriminator(object: &mut Map<String, Value>, path: &str) -> Result<BlockKind, LoadError> {
    if !object.contains_key("type") {
        if let Some(kind) = object.remove("kind") {
            object.insert("type".to_string(), kind);
        }
    }
    match object.get("type") {
        Some(Value::String(name)) => name.parse(),
        Some(other) => Err(LoadError::SchemaError {
            path: path.to_string(),
            message: format!("type must be a string, got {other}"),
        }),
        None => Err(LoadError::MissingKind { path: path.to_string() }),
    }
}

fn check_operand(value: &Value, path: &str) -> Result<(), LoadError> {
    match value {
        Value::Null | Value::String(_) => Ok(()),
        Value::Number(number) if number.is_i64() || number.is_u64() => Ok(()),
        Value::Number(number) => Err(LoadError::SchemaError {
            path: path.to_string(),
            message: format!("expected an integer, got {number}"),
        }),
        Value::Object(object) => {
            let name = object
                .get("type")
                .or_else(|| object.get("kind"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            match name.parse::<BlockKind>() {
                Ok(kind) if kind.is_expression() => Ok(()),
                Ok(kind) => Err(LoadError::SchemaError {
                    path: path.to_string(),
                    message: format!("{kind} cannot be used as a value"),
                }),
                // Неизвестный или пропущенный тип сообщит normalize
                Err(_) => Ok(()),
            }
        }
        other => Err(LoadError::SchemaError {
            path: path.to_string(),
            message: format!("expected a number, string or expression, got {other}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sentinel_is_no_program() {
        let document = Document::parse(r#"{ "error": "No start block found" }"#).unwrap();
        assert_eq!(document, Document::no_start_block());
        let err = document.into_program().unwrap_err();
        assert!(matches!(err, LoadError::NoProgram { .. }));
        assert!(err.is_schema_error());
    }

    #[test]
    fn sentinel_serializes_back() {
        let text = serde_json::to_string(&Document::no_start_block()).unwrap();
        assert_eq!(text, r#"{"error":"No start block found"}"#);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = Document::parse("{ \"type\": \"start\", ").unwrap_err();
        assert!(matches!(err, LoadError::ParseError { .. }));
        assert!(!err.is_schema_error());
    }

    #[test]
    fn unknown_kind_anywhere_is_rejected() {
        let text = json!({
            "type": "start",
            "actions": [{ "type": "wait", "time": 5, "next": { "type": "teleport" } }]
        })
        .to_string();
        let err = Document::parse(&text).unwrap_err();
        assert!(matches!(err, LoadError::UnknownKind { kind } if kind == "teleport"));
    }

    #[test]
    fn missing_discriminator_is_rejected() {
        let text = json!({ "type": "start", "actions": [{ "filename": "a.raw" }] }).to_string();
        let err = Document::parse(&text).unwrap_err();
        assert!(matches!(err, LoadError::MissingKind { path } if path == "$.actions[0]"));
    }

    #[test]
    fn kind_is_accepted_as_discriminator() {
        let text = json!({
            "kind": "start",
            "actions": [{ "kind": "display_image", "filename": "a.raw" }]
        })
        .to_string();
        let program = Document::parse(&text).unwrap().into_program().unwrap();
        assert_eq!(program.actions().head().unwrap().kind(), BlockKind::DisplayImage);
    }

    #[test]
    fn statement_in_value_position_is_rejected() {
        let text = json!({
            "type": "start",
            "actions": [{ "type": "wait", "time": { "type": "gpio", "pin": 1 } }]
        })
        .to_string();
        let err = Document::parse(&text).unwrap_err();
        assert!(
            matches!(&err, LoadError::SchemaError { path, .. } if path == "$.actions[0].time"),
            "{err}"
        );
    }

    #[test]
    fn root_must_be_start() {
        let err = Document::parse(r#"{ "type": "wait", "time": 1 }"#).unwrap_err();
        assert!(matches!(err, LoadError::NotStart { found: BlockKind::Wait }));
    }

    #[test]
    fn program_counts_nodes() {
        let text = json!({
            "type": "start",
            "actions": [{ "type": "set_color", "color": { "type": "rgb_color", "red": 1 },
                          "next": { "type": "break" } }]
        })
        .to_string();
        let program = Document::parse(&text).unwrap().into_program().unwrap();
        assert_eq!(program.node_count(), 4);
    }

    /// `start` с цепочкой из `len` картинок, каждая вложена в `next` предыдущей
    fn nested_chain(len: usize, tail: &str) -> String {
        let mut text = String::from(r#"{"type":"start","actions":["#);
        for index in 0..len {
            text.push_str(&format!(r#"{{"type":"display_image","filename":"f{index}.raw","next":"#));
        }
        text.push_str(tail);
        text.push_str(&"}".repeat(len));
        text.push_str("]}");
        text
    }

    #[test]
    fn deep_next_chains_parse() {
        let text = nested_chain(20_000, "null");
        let program = Document::parse(&text).unwrap().into_program().unwrap();
        assert_eq!(program.actions().iter().count(), 20_000);
        assert_eq!(program.node_count(), 20_001);

        let last = program.actions().iter().last().unwrap();
        assert_eq!(last.kind, NodeKind::DisplayImage { filename: "f19999.raw".to_string() });
    }

    #[test]
    fn errors_deep_in_a_chain_name_their_position() {
        let err = Document::parse(&nested_chain(300, r#"{"type":"teleport"}"#)).unwrap_err();
        assert!(matches!(err, LoadError::UnknownKind { kind } if kind == "teleport"));

        let err = Document::parse(&nested_chain(3, "7")).unwrap_err();
        assert!(
            matches!(&err, LoadError::SchemaError { path, .. } if path == "$.actions[0].next[3]"),
            "{err}"
        );
    }
}
