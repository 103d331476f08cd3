//! Step router: evaluates a condition against one content item.
//!
//! Evaluation is three-valued. A leaf that reads data the item does not have
//! (a missing metadata key, a step that has not run, a non-numeric value in
//! a numeric comparison) is [`Truth::Unknown`]. `AND`/`OR` follow Kleene
//! logic and short-circuit left to right, and [`matches`] only accepts
//! [`Truth::True`], so missing data never produces a match.

use clipflow_blueprint::{Atom, Field, Op, Predicate, Value};
use clipflow_core::ContentItem;
use regex_lite::Regex;

use crate::context::ExecutionContext;
use crate::result::StepStatus;

/// Kleene truth value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Truth {
    True,
    False,
    Unknown,
}

impl Truth {
    fn from_bool(b: bool) -> Self {
        if b { Truth::True } else { Truth::False }
    }
}

impl std::ops::Not for Truth {
    type Output = Truth;

    fn not(self) -> Truth {
        match self {
            Truth::True => Truth::False,
            Truth::False => Truth::True,
            Truth::Unknown => Truth::Unknown,
        }
    }
}

/// Where `step.<name>` fields are looked up.
pub trait StepLookup {
    fn step_status(&self, name: &str) -> Option<StepStatus>;
}

/// No earlier steps: every `step.<name>` field is unknown.
pub struct NoSteps;

impl StepLookup for NoSteps {
    fn step_status(&self, _name: &str) -> Option<StepStatus> {
        None
    }
}

impl StepLookup for ExecutionContext {
    fn step_status(&self, name: &str) -> Option<StepStatus> {
        self.status_of(name)
    }
}

/// Does `condition` select `item`? Never fails.
pub fn matches(condition: &Predicate, item: &ContentItem) -> bool {
    matches_with(condition, item, &NoSteps)
}

/// Like [`matches`], resolving `step.<name>` against earlier results.
pub fn matches_with(condition: &Predicate, item: &ContentItem, steps: &dyn StepLookup) -> bool {
    evaluate(condition, item, steps) == Truth::True
}

/// Three-valued evaluation of `condition`.
pub fn evaluate(condition: &Predicate, item: &ContentItem, steps: &dyn StepLookup) -> Truth {
    match condition {
        Predicate::Always => Truth::True,
        Predicate::Atom(atom) => evaluate_atom(atom, item, steps),
        Predicate::Not(inner) => !evaluate(inner, item, steps),
        Predicate::And(a, b) => match evaluate(a, item, steps) {
            Truth::False => Truth::False,
            Truth::True => evaluate(b, item, steps),
            Truth::Unknown => match evaluate(b, item, steps) {
                Truth::False => Truth::False,
                _ => Truth::Unknown,
            },
        },
        Predicate::Or(a, b) => match evaluate(a, item, steps) {
            Truth::True => Truth::True,
            Truth::False => evaluate(b, item, steps),
            Truth::Unknown => match evaluate(b, item, steps) {
                Truth::True => Truth::True,
                _ => Truth::Unknown,
            },
        },
    }
}

fn evaluate_atom(atom: &Atom, item: &ContentItem, steps: &dyn StepLookup) -> Truth {
    let field_value: Option<String> = match &atom.field {
        Field::Category => Some(item.category.as_str().to_string()),
        Field::Text => Some(item.text.clone()),
        Field::Meta(key) => item.meta(key).map(str::to_string),
        Field::Step(name) => steps.step_status(name).map(|s| s.as_str().to_string()),
    };

    if atom.op == Op::Exists {
        return Truth::from_bool(field_value.is_some());
    }

    let (Some(fv), Some(value)) = (field_value, atom.value.as_ref()) else {
        return Truth::Unknown;
    };

    match atom.op {
        Op::Eq => equals(&fv, value),
        Op::NotEq => !equals(&fv, value),
        Op::Contains => Truth::from_bool(fv.contains(value.as_text().as_str())),
        Op::StartsWith => Truth::from_bool(fv.starts_with(value.as_text().as_str())),
        Op::EndsWith => Truth::from_bool(fv.ends_with(value.as_text().as_str())),
        Op::Matches => match Regex::new(&value.as_text()) {
            Ok(re) => Truth::from_bool(re.is_match(&fv)),
            Err(_) => Truth::Unknown,
        },
        Op::Gt => compare_num(&fv, value, |a, b| a > b),
        Op::Lt => compare_num(&fv, value, |a, b| a < b),
        Op::Gte => compare_num(&fv, value, |a, b| a >= b),
        Op::Lte => compare_num(&fv, value, |a, b| a <= b),
        Op::Exists => Truth::True,
    }
}

fn equals(field_value: &str, value: &Value) -> Truth {
    match value {
        Value::Num { value: n, .. } => match field_value.trim().parse::<f64>() {
            Ok(x) => Truth::from_bool((x - n).abs() < f64::EPSILON),
            Err(_) => Truth::Unknown,
        },
        Value::Str(s) => Truth::from_bool(field_value == s),
        Value::Category(c) => Truth::from_bool(field_value == c.as_str()),
    }
}

fn compare_num(field_value: &str, value: &Value, cmp: impl Fn(f64, f64) -> bool) -> Truth {
    match (field_value.trim().parse::<f64>(), value) {
        (Ok(x), Value::Num { value: n, .. }) => Truth::from_bool(cmp(x, *n)),
        _ => Truth::Unknown,
    }
}
