use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use rand::Rng;

use crate::ir::{CompareOp, Comparison, ExprKind, Operand};

/// Runtime value of an expression
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(i64),
    Bool(bool),
    Text(String),
}

impl Value {
    /// 0, false and the empty string are falsy
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Number(n) => *n != 0,
            Self::Bool(b) => *b,
            Self::Text(text) => !text.is_empty(),
        }
    }

    /// Numeric view; text that is not an integer counts as 0
    pub fn as_number(&self) -> i64 {
        match self {
            Self::Number(n) => *n,
            Self::Bool(b) => i64::from(*b),
            Self::Text(text) => text.trim().parse().unwrap_or(0),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// Переменные одного запуска
#[derive(Debug, Default)]
pub struct Variables {
    values: HashMap<String, Value>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unset and falsy variables read as 0
    pub fn get(&self, name: &str) -> Value {
        match self.values.get(name) {
            Some(value) if value.is_truthy() => value.clone(),
            _ => Value::Number(0),
        }
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Evaluates an operand; an absent operand is 0
pub fn evaluate(operand: Option<&Operand>, variables: &Variables, rng: &mut impl Rng) -> Value {
    match operand {
        None => Value::Number(0),
        Some(Operand::Number(n)) => Value::Number(*n),
        Some(Operand::Text(text)) => Value::Text(text.clone()),
        Some(Operand::Expr(expression)) => evaluate_expression(&expression.kind, variables, rng),
    }
}

pub fn evaluate_expression(expression: &ExprKind, variables: &Variables, rng: &mut impl Rng) -> Value {
    match expression {
        ExprKind::Number(number) => Value::Number(number.value),
        ExprKind::RandomRange(range) => {
            let (low, high) = if range.min <= range.max {
                (range.min, range.max)
            } else {
                (range.max, range.min)
            };
            Value::Number(rng.gen_range(low..=high))
        }
        ExprKind::GetVariable(variable) => variables.get(&variable.var_name),
        ExprKind::Compare(comparison) => Value::Bool(compare(comparison, variables, rng)),
        ExprKind::ColorValue(color) | ExprKind::CustomColor(color) => Value::Text(color.color.clone()),
        ExprKind::RgbColor(rgb) => Value::Text(rgb.to_hex()),
    }
}

fn compare(comparison: &Comparison, variables: &Variables, rng: &mut impl Rng) -> bool {
    let left = evaluate(comparison.left.as_ref(), variables, rng);
    let right = evaluate(comparison.right.as_ref(), variables, rng);

    match comparison.operator {
        // Строгое равенство: 1 и "1" различны
        CompareOp::Eq => left == right,
        CompareOp::Neq => left != right,
        CompareOp::Lt => order(&left, &right) == Ordering::Less,
        CompareOp::Gt => order(&left, &right) == Ordering::Greater,
        CompareOp::Lte => order(&left, &right) != Ordering::Greater,
        CompareOp::Gte => order(&left, &right) != Ordering::Less,
    }
}

/// Two texts compare lexicographically, anything else numerically
fn order(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Text(a), Value::Text(b)) => a.cmp(b),
        _ => left.as_number().cmp(&right.as_number()),
    }
}
