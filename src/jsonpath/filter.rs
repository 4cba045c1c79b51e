//! Filter expressions inside `[?( ... )]`.
//!
//! Grammar: a disjunction (`or`, `||`) of conjunctions (`and`, `&&`) of
//! optionally negated (`not`, `!`) comparisons. Parentheses group.

use regex::Regex;
use serde_json::Value;

use super::{JsonPath, JsonPathError};
use crate::utils::regex_cache::compile_user_pattern;

#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    Or(Vec<FilterExpr>),
    And(Vec<FilterExpr>),
    Not(Box<FilterExpr>),
    /// Bare operand: true when it yields a non-null value.
    Exists(Operand),
    Compare(Operand, CompareOp, Operand),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Matches,
}

#[derive(Debug, Clone)]
pub enum Operand {
    /// `@...` relative to the candidate node
    Current(JsonPath),
    /// `$...` relative to the document root
    Root(JsonPath),
    Literal(Value),
    Pattern(Regex),
}

impl PartialEq for Operand {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Operand::Current(a), Operand::Current(b)) | (Operand::Root(a), Operand::Root(b)) => {
                a.expression() == b.expression()
            }
            (Operand::Literal(a), Operand::Literal(b)) => a == b,
            (Operand::Pattern(a), Operand::Pattern(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open,
    Close,
    And,
    Or,
    Not,
    Op(CompareOp),
    Path(String),
    Str(String),
    Regex(String),
    Word(String),
}

pub fn parse_filter(input: &str) -> Result<FilterExpr, JsonPathError> {
    let tokens = tokenize(input)?;
    let mut parser = FilterParser {
        input,
        tokens,
        pos: 0,
    };
    let expr = parser.disjunction()?;
    if parser.pos != parser.tokens.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(expr)
}

fn tokenize(input: &str) -> Result<Vec<Token>, JsonPathError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    let invalid = |reason: &str| JsonPathError::InvalidFilter {
        filter: input.to_string(),
        reason: reason.to_string(),
    };

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            _ if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::Open);
                i += 1;
            }
            ')' => {
                tokens.push(Token::Close);
                i += 1;
            }
            '&' if next == Some('&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if next == Some('|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            '=' if next == Some('=') => {
                tokens.push(Token::Op(CompareOp::Eq));
                i += if chars.get(i + 2) == Some(&'=') { 3 } else { 2 };
            }
            '=' if next == Some('~') => {
                tokens.push(Token::Op(CompareOp::Matches));
                i += 2;
            }
            '!' if next == Some('=') => {
                tokens.push(Token::Op(CompareOp::Ne));
                i += if chars.get(i + 2) == Some(&'=') { 3 } else { 2 };
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '<' | '>' => {
                let op = match (c, next == Some('=')) {
                    ('<', true) => CompareOp::Le,
                    ('<', false) => CompareOp::Lt,
                    (_, true) => CompareOp::Ge,
                    (_, false) => CompareOp::Gt,
                };
                tokens.push(Token::Op(op));
                i += if next == Some('=') { 2 } else { 1 };
            }
            '\'' | '"' => {
                let mut value = String::new();
                let mut j = i + 1;
                let mut closed = false;
                while j < chars.len() {
                    match chars[j] {
                        '\\' if j + 1 < chars.len() => {
                            value.push(chars[j + 1]);
                            j += 2;
                        }
                        ch if ch == c => {
                            closed = true;
                            j += 1;
                            break;
                        }
                        ch => {
                            value.push(ch);
                            j += 1;
                        }
                    }
                }
                if !closed {
                    return Err(invalid("unterminated string literal"));
                }
                tokens.push(Token::Str(value));
                i = j;
            }
            '/' => {
                let mut j = i + 1;
                while j < chars.len() && chars[j] != '/' {
                    if chars[j] == '\\' {
                        j += 1;
                    }
                    j += 1;
                }
                if j >= chars.len() {
                    return Err(invalid("unterminated regex literal"));
                }
                j += 1;
                while j < chars.len() && chars[j].is_ascii_alphabetic() {
                    j += 1;
                }
                tokens.push(Token::Regex(chars[i..j].iter().collect()));
                i = j;
            }
            '@' | '$' => {
                let mut j = i + 1;
                let mut depth = 0usize;
                let mut quote: Option<char> = None;
                while j < chars.len() {
                    let ch = chars[j];
                    if let Some(q) = quote {
                        if ch == '\\' {
                            j += 1;
                        } else if ch == q {
                            quote = None;
                        }
                        j += 1;
                        continue;
                    }
                    match ch {
                        '\'' | '"' if depth > 0 => quote = Some(ch),
                        '[' => depth += 1,
                        ']' => depth = depth.saturating_sub(1),
                        _ if depth == 0
                            && (ch.is_whitespace()
                                || matches!(ch, ')' | '(' | '=' | '!' | '<' | '>' | '&' | '|')) =>
                        {
                            break;
                        }
                        _ => {}
                    }
                    j += 1;
                }
                tokens.push(Token::Path(chars[i..j].iter().collect()));
                i = j;
            }
            _ => {
                let mut j = i;
                while j < chars.len()
                    && !chars[j].is_whitespace()
                    && !matches!(chars[j], '(' | ')' | '=' | '!' | '<' | '>' | '&' | '|')
                {
                    j += 1;
                }
                if j == i {
                    return Err(invalid("unexpected character"));
                }
                let word: String = chars[i..j].iter().collect();
                tokens.push(match word.to_lowercase().as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    _ => Token::Word(word),
                });
                i = j;
            }
        }
    }

    Ok(tokens)
}

struct FilterParser<'a> {
    input: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl FilterParser<'_> {
    fn error(&self, reason: &str) -> JsonPathError {
        JsonPathError::InvalidFilter {
            filter: self.input.to_string(),
            reason: reason.to_string(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn disjunction(&mut self) -> Result<FilterExpr, JsonPathError> {
        let mut terms = vec![self.conjunction()?];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            terms.push(self.conjunction()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            FilterExpr::Or(terms)
        })
    }

    fn conjunction(&mut self) -> Result<FilterExpr, JsonPathError> {
        let mut terms = vec![self.negation()?];
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            terms.push(self.negation()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            FilterExpr::And(terms)
        })
    }

    fn negation(&mut self) -> Result<FilterExpr, JsonPathError> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            return Ok(FilterExpr::Not(Box::new(self.negation()?)));
        }
        if self.peek() == Some(&Token::Open) {
            self.pos += 1;
            let inner = self.disjunction()?;
            if self.peek() != Some(&Token::Close) {
                return Err(self.error("unbalanced parentheses"));
            }
            self.pos += 1;
            return Ok(inner);
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<FilterExpr, JsonPathError> {
        let left = self.operand()?;
        if let Some(Token::Op(op)) = self.peek().cloned() {
            self.pos += 1;
            let right = self.operand()?;
            return Ok(FilterExpr::Compare(left, op, right));
        }
        Ok(FilterExpr::Exists(left))
    }

    fn operand(&mut self) -> Result<Operand, JsonPathError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| self.error("missing operand"))?;
        self.pos += 1;
        match token {
            Token::Path(path) => {
                let parsed = JsonPath::parse(&path)?;
                Ok(if path.starts_with('$') {
                    Operand::Root(parsed)
                } else {
                    Operand::Current(parsed)
                })
            }
            Token::Str(value) => Ok(Operand::Literal(Value::String(value))),
            Token::Regex(pattern) => compile_user_pattern(&pattern)
                .map(Operand::Pattern)
                .map_err(|e| self.error(&format!("invalid regex: {}", e))),
            Token::Word(word) => Ok(Operand::Literal(literal(&word))),
            _ => Err(self.error("expected a path or literal")),
        }
    }
}

fn literal(word: &str) -> Value {
    match word {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => {
            if let Ok(n) = word.parse::<i64>() {
                Value::from(n)
            } else if let Ok(f) = word.parse::<f64>() {
                Value::from(f)
            } else {
                Value::String(word.to_string())
            }
        }
    }
}

impl FilterExpr {
    pub fn matches(&self, node: &Value, root: &Value) -> bool {
        match self {
            FilterExpr::Or(terms) => terms.iter().any(|t| t.matches(node, root)),
            FilterExpr::And(terms) => terms.iter().all(|t| t.matches(node, root)),
            FilterExpr::Not(inner) => !inner.matches(node, root),
            FilterExpr::Exists(operand) => operand
                .values(node, root)
                .iter()
                .any(|v| !v.is_null() && *v != Value::Bool(false)),
            FilterExpr::Compare(left, op, right) => {
                let lefts = left.values(node, root);
                if *op == CompareOp::Matches {
                    let pattern = match right {
                        Operand::Pattern(regex) => Some(regex.clone()),
                        other => other
                            .values(node, root)
                            .first()
                            .and_then(|v| v.as_str().map(str::to_string))
                            .and_then(|p| compile_user_pattern(&p).ok()),
                    };
                    let Some(pattern) = pattern else {
                        return false;
                    };
                    return lefts.iter().any(|v| pattern.is_match(&scalar_text(v)));
                }
                let rights = right.values(node, root);
                lefts
                    .iter()
                    .any(|l| rights.iter().any(|r| compare(l, *op, r)))
            }
        }
    }
}

impl Operand {
    fn values(&self, node: &Value, root: &Value) -> Vec<Value> {
        match self {
            Operand::Current(path) => path.evaluate(node),
            Operand::Root(path) => path.evaluate(root),
            Operand::Literal(value) => vec![value.clone()],
            Operand::Pattern(regex) => vec![Value::String(regex.as_str().to_string())],
        }
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn compare(left: &Value, op: CompareOp, right: &Value) -> bool {
    use std::cmp::Ordering;

    let ordering = match (left, right) {
        (Value::Number(_), _) | (_, Value::Number(_)) => {
            match (as_number(left), as_number(right)) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => None,
            }
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    };

    match op {
        CompareOp::Eq => ordering == Some(Ordering::Equal) || (ordering.is_none() && left == right),
        CompareOp::Ne => !(ordering == Some(Ordering::Equal) || left == right),
        CompareOp::Lt => ordering == Some(Ordering::Less),
        CompareOp::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        CompareOp::Gt => ordering == Some(Ordering::Greater),
        CompareOp::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
        CompareOp::Matches => false,
    }
}
