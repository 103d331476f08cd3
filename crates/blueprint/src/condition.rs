//! Routing condition expressions.
//!
//! A step's `when:` line is a small boolean expression over one content item:
//!
//! ```text
//! category == sql
//! text CONTAINS "FROM" AND NOT meta.mime EXISTS
//! meta.lines >= 10 OR (category == code AND meta.language == python)
//! text NOT MATCHES "^--"
//! step.review-sql == succeeded
//! ```
//!
//! Grammar (keywords are case-insensitive):
//! ```text
//! expr     = or
//! or       = and ("OR" and)*
//! and      = unary ("AND" unary)*
//! unary    = "NOT" unary | primary
//! primary  = "(" expr ")" | "ALWAYS" | atom
//! atom     = field ["NOT"] OP [value]
//! field    = "category" | "text" | "meta." KEY | "step." NAME
//! OP       = "==" | "!=" | "CONTAINS" | "STARTS_WITH" | "ENDS_WITH" | "MATCHES"
//!          | ">" | "<" | ">=" | "<=" | "EXISTS"
//! value    = QUOTED_STRING | NUMBER | BARE_WORD
//! ```
//!
//! `field NOT OP value` is sugar for `NOT (field OP value)`. Evaluation lives
//! in the workflow router; this module only parses, validates and prints.

use std::fmt;

use clipflow_core::Category;
use regex_lite::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Terminal step states a `step.<name>` field may be compared against.
pub const STEP_STATES: [&str; 3] = ["succeeded", "failed", "skipped"];

/// A parsed condition tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Matches every item.
    Always,
    /// A single comparison.
    Atom(Atom),
    /// Logical AND of two sub-conditions.
    And(Box<Predicate>, Box<Predicate>),
    /// Logical OR of two sub-conditions.
    Or(Box<Predicate>, Box<Predicate>),
    /// Negation.
    Not(Box<Predicate>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    pub field: Field,
    pub op: Op,
    /// `None` only for [`Op::Exists`].
    pub value: Option<Value>,
}

/// A field reference in a condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    /// The item's category.
    Category,
    /// The item's full text.
    Text,
    /// `meta.<key>`: a metadata value.
    Meta(String),
    /// `step.<name>`: terminal status of an earlier step.
    Step(String),
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    NotEq,
    Contains,
    StartsWith,
    EndsWith,
    Matches,
    Gt,
    Lt,
    Gte,
    Lte,
    Exists,
}

/// A literal value in a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    /// A numeric literal. `raw` is the word as written; text operators and
    /// printing use it, numeric comparisons use `value`.
    Num { value: f64, raw: String },
    Category(Category),
}

impl Predicate {
    /// `a AND b`
    pub fn and(self, other: Predicate) -> Predicate {
        Predicate::And(Box::new(self), Box::new(other))
    }

    /// `a OR b`
    pub fn or(self, other: Predicate) -> Predicate {
        Predicate::Or(Box::new(self), Box::new(other))
    }

    /// `NOT a`
    pub fn negate(self) -> Predicate {
        Predicate::Not(Box::new(self))
    }

    /// `category == <c>`
    pub fn category(category: Category) -> Predicate {
        Predicate::Atom(Atom {
            field: Field::Category,
            op: Op::Eq,
            value: Some(Value::Category(category)),
        })
    }

    /// `text CONTAINS "<needle>"`
    pub fn text_contains(needle: impl Into<String>) -> Predicate {
        Predicate::Atom(Atom {
            field: Field::Text,
            op: Op::Contains,
            value: Some(Value::Str(needle.into())),
        })
    }

    /// `meta.<key> == "<value>"`
    pub fn meta_eq(key: impl Into<String>, value: impl Into<String>) -> Predicate {
        Predicate::Atom(Atom {
            field: Field::Meta(key.into()),
            op: Op::Eq,
            value: Some(Value::Str(value.into())),
        })
    }

    /// `meta.<key> EXISTS`
    pub fn meta_exists(key: impl Into<String>) -> Predicate {
        Predicate::Atom(Atom {
            field: Field::Meta(key.into()),
            op: Op::Exists,
            value: None,
        })
    }

    /// Names of steps this condition depends on, in first-use order.
    pub fn step_refs(&self) -> Vec<&str> {
        let mut refs = Vec::new();
        self.collect_step_refs(&mut refs);
        refs
    }

    fn collect_step_refs<'a>(&'a self, refs: &mut Vec<&'a str>) {
        match self {
            Predicate::Always => {}
            Predicate::Atom(Atom {
                field: Field::Step(name),
                ..
            }) => {
                if !refs.contains(&name.as_str()) {
                    refs.push(name);
                }
            }
            Predicate::Atom(_) => {}
            Predicate::And(a, b) | Predicate::Or(a, b) => {
                a.collect_step_refs(refs);
                b.collect_step_refs(refs);
            }
            Predicate::Not(inner) => inner.collect_step_refs(refs),
        }
    }
}

impl Value {
    /// String form used by text operators.
    pub fn as_text(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Num { raw, .. } => raw.clone(),
            Value::Category(c) => c.as_str().to_string(),
        }
    }
}

// ─── Printing ───────────────────────────────────────────────────────

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Category => f.write_str("category"),
            Field::Text => f.write_str("text"),
            Field::Meta(key) => write!(f, "meta.{key}"),
            Field::Step(name) => write!(f, "step.{name}"),
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Op::Eq => "==",
            Op::NotEq => "!=",
            Op::Contains => "CONTAINS",
            Op::StartsWith => "STARTS_WITH",
            Op::EndsWith => "ENDS_WITH",
            Op::Matches => "MATCHES",
            Op::Gt => ">",
            Op::Lt => "<",
            Op::Gte => ">=",
            Op::Lte => "<=",
            Op::Exists => "EXISTS",
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => {
                f.write_str("\"")?;
                for ch in s.chars() {
                    if ch == '"' || ch == '\\' {
                        f.write_str("\\")?;
                    }
                    write!(f, "{ch}")?;
                }
                f.write_str("\"")
            }
            Value::Num { raw, .. } => f.write_str(raw),
            Value::Category(c) => f.write_str(c.as_str()),
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.op)?;
        if let Some(value) = &self.value {
            write!(f, " {value}")?;
        }
        Ok(())
    }
}

/// Prints the canonical form; parenthesizes only where precedence requires,
/// so printing then parsing yields the same tree.
impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn grouped(p: &Predicate, parens: bool, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            if parens {
                write!(f, "({p})")
            } else {
                write!(f, "{p}")
            }
        }

        match self {
            Predicate::Always => f.write_str("ALWAYS"),
            Predicate::Atom(atom) => write!(f, "{atom}"),
            Predicate::Or(a, b) => {
                grouped(a, false, f)?;
                f.write_str(" OR ")?;
                grouped(b, matches!(**b, Predicate::Or(..)), f)
            }
            Predicate::And(a, b) => {
                grouped(a, matches!(**a, Predicate::Or(..)), f)?;
                f.write_str(" AND ")?;
                grouped(b, matches!(**b, Predicate::Or(..) | Predicate::And(..)), f)
            }
            Predicate::Not(inner) => {
                f.write_str("NOT ")?;
                grouped(inner, matches!(**inner, Predicate::Or(..) | Predicate::And(..)), f)
            }
        }
    }
}

impl Serialize for Predicate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Predicate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        parse_condition(&source).map_err(serde::de::Error::custom)
    }
}

// ─── Parser ─────────────────────────────────────────────────────────

/// Parse a condition expression string into a [`Predicate`] tree.
///
/// Returns `Ok(Predicate::Always)` for empty input.
pub fn parse_condition(input: &str) -> Result<Predicate, String> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(Predicate::Always);
    }
    let tokens = tokenize(input)?;
    let (pred, rest) = parse_or(&tokens)?;
    if let Some(tok) = rest.first() {
        return Err(format!("unexpected {} after expression", tok.describe()));
    }
    Ok(pred)
}

/// Token types for the condition DSL.
#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(f64, String),
    And,
    Or,
    Not,
    Always,
    Op(Op),
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(w) => format!("'{w}'"),
            Token::Str(s) => format!("string \"{s}\""),
            Token::Num(_, raw) => format!("number {raw}"),
            Token::And => "AND".into(),
            Token::Or => "OR".into(),
            Token::Not => "NOT".into(),
            Token::Always => "ALWAYS".into(),
            Token::Op(op) => format!("operator {op}"),
            Token::LParen => "'('".into(),
            Token::RParen => "')'".into(),
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '-' | '/' | '+' | '@' | ':')
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            _ if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '"' | '\'' => {
                let quote = c;
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some('\\') => {
                            if let Some(escaped) = chars.next() {
                                s.push(escaped);
                            }
                        }
                        Some(ch) if ch == quote => break,
                        Some(ch) => s.push(ch),
                        None => return Err("unterminated string literal".into()),
                    }
                }
                tokens.push(Token::Str(s));
            }
            '>' | '<' => {
                chars.next();
                let inclusive = chars.peek() == Some(&'=');
                if inclusive {
                    chars.next();
                }
                tokens.push(Token::Op(match (c, inclusive) {
                    ('>', false) => Op::Gt,
                    ('>', true) => Op::Gte,
                    ('<', false) => Op::Lt,
                    _ => Op::Lte,
                }));
            }
            '=' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                }
                tokens.push(Token::Op(Op::Eq));
            }
            '!' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Op(Op::NotEq));
                } else {
                    tokens.push(Token::Not);
                }
            }
            _ if is_word_char(c) => {
                let mut word = String::new();
                while let Some(&wc) = chars.peek() {
                    if is_word_char(wc) {
                        word.push(wc);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(classify_word(word));
            }
            _ => return Err(format!("unexpected character: {c}")),
        }
    }

    Ok(tokens)
}

fn classify_word(word: String) -> Token {
    if word.starts_with(|c: char| c.is_ascii_digit() || c == '-') {
        if let Ok(n) = word.parse::<f64>() {
            if n.is_finite() {
                return Token::Num(n, word);
            }
        }
    }
    match word.to_ascii_uppercase().as_str() {
        "AND" => Token::And,
        "OR" => Token::Or,
        "NOT" => Token::Not,
        "ALWAYS" => Token::Always,
        "CONTAINS" => Token::Op(Op::Contains),
        "MATCHES" => Token::Op(Op::Matches),
        "STARTS_WITH" => Token::Op(Op::StartsWith),
        "ENDS_WITH" => Token::Op(Op::EndsWith),
        "EXISTS" => Token::Op(Op::Exists),
        _ => Token::Ident(word),
    }
}

type Parsed<'t, T> = Result<(T, &'t [Token]), String>;

fn parse_or(tokens: &[Token]) -> Parsed<'_, Predicate> {
    let (mut left, mut rest) = parse_and(tokens)?;
    while rest.first() == Some(&Token::Or) {
        let (right, remaining) = parse_and(&rest[1..])?;
        left = left.or(right);
        rest = remaining;
    }
    Ok((left, rest))
}

fn parse_and(tokens: &[Token]) -> Parsed<'_, Predicate> {
    let (mut left, mut rest) = parse_unary(tokens)?;
    while rest.first() == Some(&Token::And) {
        let (right, remaining) = parse_unary(&rest[1..])?;
        left = left.and(right);
        rest = remaining;
    }
    Ok((left, rest))
}

fn parse_unary(tokens: &[Token]) -> Parsed<'_, Predicate> {
    if tokens.first() == Some(&Token::Not) {
        let (inner, rest) = parse_unary(&tokens[1..])?;
        return Ok((inner.negate(), rest));
    }
    parse_primary(tokens)
}

fn parse_primary(tokens: &[Token]) -> Parsed<'_, Predicate> {
    match tokens.first() {
        Some(Token::LParen) => {
            let (inner, rest) = parse_or(&tokens[1..])?;
            if rest.first() != Some(&Token::RParen) {
                return Err("expected closing parenthesis".into());
            }
            Ok((inner, &rest[1..]))
        }
        Some(Token::Always) => Ok((Predicate::Always, &tokens[1..])),
        _ => parse_atom(tokens),
    }
}

fn parse_atom(tokens: &[Token]) -> Parsed<'_, Predicate> {
    let (field, rest) = parse_field(tokens)?;

    let (negated, rest) = match rest.first() {
        Some(Token::Not) => (true, &rest[1..]),
        _ => (false, rest),
    };

    let op = match rest.first() {
        Some(Token::Op(op)) => *op,
        other => {
            return Err(format!(
                "expected operator after '{field}', got {}",
                other.map_or("end of input".into(), Token::describe)
            ));
        }
    };
    let rest = &rest[1..];

    let (value, rest) = if op == Op::Exists {
        (None, rest)
    } else {
        let (value, rest) = parse_value(rest)?;
        (Some(value), rest)
    };

    let atom = check_atom(field, op, value)?;
    let pred = Predicate::Atom(atom);
    Ok((if negated { pred.negate() } else { pred }, rest))
}

fn parse_field(tokens: &[Token]) -> Parsed<'_, Field> {
    let Some(Token::Ident(name)) = tokens.first() else {
        return Err(format!(
            "expected field name, got {}",
            tokens.first().map_or("end of input".into(), Token::describe)
        ));
    };

    let lower = name.to_ascii_lowercase();
    let field = if lower == "category" {
        Field::Category
    } else if lower == "text" {
        Field::Text
    } else if lower.starts_with("meta.") && name.len() > 5 {
        Field::Meta(name[5..].to_string())
    } else if lower.starts_with("step.") && name.len() > 5 {
        Field::Step(name[5..].to_string())
    } else {
        return Err(format!(
            "unknown field '{name}' (expected category, text, meta.<key> or step.<name>)"
        ));
    };
    Ok((field, &tokens[1..]))
}

fn parse_value(tokens: &[Token]) -> Parsed<'_, Value> {
    match tokens.first() {
        Some(Token::Str(s)) => Ok((Value::Str(s.clone()), &tokens[1..])),
        Some(Token::Num(value, raw)) => Ok((
            Value::Num {
                value: *value,
                raw: raw.clone(),
            },
            &tokens[1..],
        )),
        // Bare word as a string value.
        Some(Token::Ident(s)) => Ok((Value::Str(s.clone()), &tokens[1..])),
        other => Err(format!(
            "expected value, got {}",
            other.map_or("end of input".into(), Token::describe)
        )),
    }
}

/// Field/operator/value compatibility, normalizing literals.
fn check_atom(field: Field, op: Op, value: Option<Value>) -> Result<Atom, String> {
    let value = match (&field, op, value) {
        (Field::Meta(_), Op::Exists, None) => None,
        (_, Op::Exists, _) => {
            return Err(format!("EXISTS is only valid on meta.<key> fields, not '{field}'"));
        }

        (Field::Category, Op::Eq | Op::NotEq, Some(v)) => {
            let literal = v.as_text();
            let category = literal
                .parse::<Category>()
                .map_err(|_| format!("unknown category '{literal}'"))?;
            Some(Value::Category(category))
        }
        (Field::Category, op, _) => {
            return Err(format!("category only supports == and !=, not {op}"));
        }

        (Field::Step(_), Op::Eq | Op::NotEq, Some(v)) => {
            let state = v.as_text().to_ascii_lowercase();
            if !STEP_STATES.contains(&state.as_str()) {
                return Err(format!(
                    "step status must be one of succeeded, failed, skipped; got '{state}'"
                ));
            }
            Some(Value::Str(state))
        }
        (Field::Step(_), op, _) => {
            return Err(format!("step.<name> only supports == and !=, not {op}"));
        }

        (_, Op::Matches, Some(v)) => {
            let pattern = v.as_text();
            Regex::new(&pattern).map_err(|e| format!("invalid regex '{pattern}': {e}"))?;
            Some(Value::Str(pattern))
        }
        (_, Op::Gt | Op::Lt | Op::Gte | Op::Lte, Some(v @ Value::Num { .. })) => Some(v),
        (_, op @ (Op::Gt | Op::Lt | Op::Gte | Op::Lte), Some(v)) => {
            return Err(format!("{op} needs a number, got {v}"));
        }
        (_, Op::Contains | Op::StartsWith | Op::EndsWith, Some(v)) => {
            Some(Value::Str(v.as_text()))
        }
        (_, _, v) => v,
    };
    Ok(Atom { field, op, value })
}

// ─── Tests ──────────────────────────────────────────────────────────
