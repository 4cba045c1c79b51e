//! XPath 1.0 subset evaluator over [`Dom`].
//!
//! Supported: absolute, relative and `//` location paths; the child,
//! descendant(-or-self), attribute, self, parent, ancestor and
//! sibling axes; `*`, `@attr`, `text()`, `node()`, `.` and `..`; predicates
//! (positions, `last()`, `position()`, comparisons, `and`/`or`); the
//! functions `contains`, `starts-with`, `ends-with`, `concat`,
//! `normalize-space`, `string-length`, `not`, `name`, `local-name`, `string`,
//! `count`, `true` and `false`; `|` unions.
//! Prefixed name tests resolve through the document's own `xmlns`
//! declarations; unprefixed tests match on local name.

use thiserror::Error;

use super::dom::{Dom, NodeId, NodeKind};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum XPathError {
    #[error("Invalid XPath '{expression}': {reason}")]
    Syntax { expression: String, reason: String },

    #[error("Unknown XPath function '{0}'")]
    UnknownFunction(String),
}

/// A node reference: element/text node, or one attribute of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NodeRef {
    Node(NodeId),
    Attribute(NodeId, usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum XValue {
    Nodes(Vec<NodeRef>),
    Str(String),
    Num(f64),
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Attribute,
    SelfAxis,
    Parent,
    Ancestor,
    FollowingSibling,
    PrecedingSibling,
}

#[derive(Debug, Clone, PartialEq)]
enum NodeTest {
    Name(String),
    AnyElement,
    Text,
    AnyNode,
}

#[derive(Debug, Clone, PartialEq)]
struct Step {
    axis: Axis,
    test: NodeTest,
    predicates: Vec<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Path { absolute: bool, steps: Vec<Step> },
    Union(Vec<Expr>),
    Binary(Box<Expr>, BinOp, Box<Expr>),
    Negate(Box<Expr>),
    Literal(String),
    Number(f64),
    Call(String, Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Slash,
    DoubleSlash,
    Dot,
    DotDot,
    At,
    Star,
    Open,
    Close,
    OpenBracket,
    CloseBracket,
    Comma,
    Pipe,
    Minus,
    Op(BinOp),
    Axis(String),
    Name(String),
    Str(String),
    Num(f64),
}

/// A compiled XPath expression.
#[derive(Debug, Clone)]
pub struct XPath {
    expression: String,
    root: Expr,
}

impl XPath {
    pub fn compile(expression: &str) -> Result<Self, XPathError> {
        let tokens = tokenize(expression)?;
        let mut parser = Parser {
            expression,
            tokens,
            pos: 0,
        };
        let root = parser.or_expr()?;
        if parser.pos < parser.tokens.len() {
            return Err(parser.error("unexpected trailing tokens"));
        }
        Ok(Self {
            expression: expression.to_string(),
            root,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn evaluate(&self, dom: &Dom) -> Result<XValue, XPathError> {
        let ctx = Context {
            node: NodeRef::Node(Dom::ROOT),
            position: 1,
            size: 1,
        };
        eval(&self.root, dom, &ctx)
    }

    /// String values of the result: one per node, or one for a scalar.
    pub fn values(&self, dom: &Dom) -> Result<Vec<String>, XPathError> {
        Ok(match self.evaluate(dom)? {
            XValue::Nodes(nodes) => nodes.iter().map(|n| string_value(dom, *n)).collect(),
            other => vec![to_string(dom, &other)],
        })
    }
}

fn tokenize(expression: &str) -> Result<Vec<Token>, XPathError> {
    let chars: Vec<char> = expression.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    let syntax = |reason: &str| XPathError::Syntax {
        expression: expression.to_string(),
        reason: reason.to_string(),
    };

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            _ if c.is_whitespace() => i += 1,
            '/' if next == Some('/') => {
                tokens.push(Token::DoubleSlash);
                i += 2;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '.' if next == Some('.') => {
                tokens.push(Token::DotDot);
                i += 2;
            }
            '.' if !next.is_some_and(|n| n.is_ascii_digit()) => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '@' => {
                tokens.push(Token::At);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '(' => {
                tokens.push(Token::Open);
                i += 1;
            }
            ')' => {
                tokens.push(Token::Close);
                i += 1;
            }
            '[' => {
                tokens.push(Token::OpenBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::CloseBracket);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '|' => {
                tokens.push(Token::Pipe);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '=' => {
                tokens.push(Token::Op(BinOp::Eq));
                i += 1;
            }
            '!' if next == Some('=') => {
                tokens.push(Token::Op(BinOp::Ne));
                i += 2;
            }
            '<' | '>' => {
                let op = match (c, next == Some('=')) {
                    ('<', true) => BinOp::Le,
                    ('<', false) => BinOp::Lt,
                    (_, true) => BinOp::Ge,
                    (_, false) => BinOp::Gt,
                };
                tokens.push(Token::Op(op));
                i += if next == Some('=') { 2 } else { 1 };
            }
            '\'' | '"' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|&ch| ch == c)
                    .ok_or_else(|| syntax("unterminated string literal"))?;
                tokens.push(Token::Str(chars[i + 1..i + 1 + end].iter().collect()));
                i += end + 2;
            }
            _ if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let number = text.parse::<f64>().map_err(|_| syntax("invalid number"))?;
                tokens.push(Token::Num(number));
            }
            _ if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || matches!(chars[i], '_' | '-' | '.' | ':'))
                {
                    // `::` ends an axis name
                    if chars[i] == ':' && chars.get(i + 1) == Some(&':') {
                        break;
                    }
                    i += 1;
                }
                let mut name: String = chars[start..i].iter().collect();
                if chars.get(i) == Some(&':') && chars.get(i + 1) == Some(&':') {
                    tokens.push(Token::Axis(name));
                    i += 2;
                    continue;
                }
                // `prefix:*`
                if name.ends_with(':') && chars.get(i) == Some(&'*') {
                    name.push('*');
                    i += 1;
                }
                let operator_position = matches!(
                    tokens.last(),
                    Some(
                        Token::Name(_)
                            | Token::Str(_)
                            | Token::Num(_)
                            | Token::Close
                            | Token::CloseBracket
                            | Token::Star
                            | Token::Dot
                            | Token::DotDot
                    )
                );
                match name.as_str() {
                    "and" if operator_position => tokens.push(Token::Op(BinOp::And)),
                    "or" if operator_position => tokens.push(Token::Op(BinOp::Or)),
                    _ => tokens.push(Token::Name(name)),
                }
            }
            _ => return Err(syntax(&format!("unexpected character '{}'", c))),
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    expression: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, reason: &str) -> XPathError {
        XPathError::Syntax {
            expression: self.expression.to_string(),
            reason: reason.to_string(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn binary(&mut self, ops: &[BinOp], next: fn(&mut Self) -> Result<Expr, XPathError>) -> Result<Expr, XPathError> {
        let mut left = next(self)?;
        while let Some(Token::Op(op)) = self.peek().cloned() {
            if !ops.contains(&op) {
                break;
            }
            self.pos += 1;
            let right = next(self)?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn or_expr(&mut self) -> Result<Expr, XPathError> {
        self.binary(&[BinOp::Or], Self::and_expr)
    }

    fn and_expr(&mut self) -> Result<Expr, XPathError> {
        self.binary(&[BinOp::And], Self::equality_expr)
    }

    fn equality_expr(&mut self) -> Result<Expr, XPathError> {
        self.binary(&[BinOp::Eq, BinOp::Ne], Self::relational_expr)
    }

    fn relational_expr(&mut self) -> Result<Expr, XPathError> {
        self.binary(&[BinOp::Lt, BinOp::Le, BinOp::Gt, BinOp::Ge], Self::unary_expr)
    }

    fn unary_expr(&mut self) -> Result<Expr, XPathError> {
        if self.eat(&Token::Minus) {
            return Ok(Expr::Negate(Box::new(self.unary_expr()?)));
        }
        self.union_expr()
    }

    fn union_expr(&mut self) -> Result<Expr, XPathError> {
        let mut parts = vec![self.primary_or_path()?];
        while self.eat(&Token::Pipe) {
            parts.push(self.primary_or_path()?);
        }
        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            Expr::Union(parts)
        })
    }

    fn primary_or_path(&mut self) -> Result<Expr, XPathError> {
        match self.peek().cloned() {
            Some(Token::Str(s)) => {
                self.pos += 1;
                Ok(Expr::Literal(s))
            }
            Some(Token::Num(n)) => {
                self.pos += 1;
                Ok(Expr::Number(n))
            }
            Some(Token::Open) => {
                self.pos += 1;
                let inner = self.or_expr()?;
                if !self.eat(&Token::Close) {
                    return Err(self.error("unbalanced parentheses"));
                }
                Ok(inner)
            }
            Some(Token::Name(name))
                if self.peek_at(1) == Some(&Token::Open)
                    && !matches!(name.as_str(), "text" | "node") =>
            {
                self.pos += 2;
                let mut args = Vec::new();
                if !self.eat(&Token::Close) {
                    loop {
                        args.push(self.or_expr()?);
                        if self.eat(&Token::Comma) {
                            continue;
                        }
                        if self.eat(&Token::Close) {
                            break;
                        }
                        return Err(self.error("expected ',' or ')' in function call"));
                    }
                }
                Ok(Expr::Call(name, args))
            }
            _ => self.location_path(),
        }
    }

    fn location_path(&mut self) -> Result<Expr, XPathError> {
        let mut steps = Vec::new();
        let absolute = match self.peek() {
            Some(Token::Slash) => {
                self.pos += 1;
                // A lone `/` selects the document.
                if !self.starts_step() {
                    return Ok(Expr::Path {
                        absolute: true,
                        steps,
                    });
                }
                true
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                steps.push(Step {
                    axis: Axis::DescendantOrSelf,
                    test: NodeTest::AnyNode,
                    predicates: Vec::new(),
                });
                true
            }
            _ => false,
        };

        steps.push(self.step()?);
        loop {
            if self.eat(&Token::Slash) {
                steps.push(self.step()?);
            } else if self.eat(&Token::DoubleSlash) {
                steps.push(Step {
                    axis: Axis::DescendantOrSelf,
                    test: NodeTest::AnyNode,
                    predicates: Vec::new(),
                });
                steps.push(self.step()?);
            } else {
                break;
            }
        }
        Ok(Expr::Path { absolute, steps })
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::Name(_) | Token::Star | Token::At | Token::Dot | Token::DotDot | Token::Axis(_))
        )
    }

    fn step(&mut self) -> Result<Step, XPathError> {
        if self.eat(&Token::Dot) {
            return Ok(Step {
                axis: Axis::SelfAxis,
                test: NodeTest::AnyNode,
                predicates: self.predicates()?,
            });
        }
        if self.eat(&Token::DotDot) {
            return Ok(Step {
                axis: Axis::Parent,
                test: NodeTest::AnyNode,
                predicates: self.predicates()?,
            });
        }

        let mut axis = Axis::Child;
        if self.eat(&Token::At) {
            axis = Axis::Attribute;
        } else if let Some(Token::Axis(name)) = self.peek().cloned() {
            self.pos += 1;
            axis = match name.as_str() {
                "child" => Axis::Child,
                "descendant" => Axis::Descendant,
                "descendant-or-self" => Axis::DescendantOrSelf,
                "attribute" => Axis::Attribute,
                "self" => Axis::SelfAxis,
                "parent" => Axis::Parent,
                "ancestor" => Axis::Ancestor,
                "following-sibling" => Axis::FollowingSibling,
                "preceding-sibling" => Axis::PrecedingSibling,
                other => return Err(self.error(&format!("unsupported axis '{}'", other))),
            };
        }

        let test = match self.peek().cloned() {
            Some(Token::Star) => {
                self.pos += 1;
                NodeTest::AnyElement
            }
            Some(Token::Name(name)) => {
                self.pos += 1;
                if (name == "text" || name == "node") && self.eat(&Token::Open) {
                    if !self.eat(&Token::Close) {
                        return Err(self.error("expected ')'"));
                    }
                    if name == "text" {
                        NodeTest::Text
                    } else {
                        NodeTest::AnyNode
                    }
                } else {
                    NodeTest::Name(name)
                }
            }
            _ => return Err(self.error("expected a node test")),
        };

        Ok(Step {
            axis,
            test,
            predicates: self.predicates()?,
        })
    }

    fn predicates(&mut self) -> Result<Vec<Expr>, XPathError> {
        let mut predicates = Vec::new();
        while self.eat(&Token::OpenBracket) {
            predicates.push(self.or_expr()?);
            if !self.eat(&Token::CloseBracket) {
                return Err(self.error("unbalanced brackets"));
            }
        }
        Ok(predicates)
    }
}

struct Context {
    node: NodeRef,
    position: usize,
    size: usize,
}

fn eval(expr: &Expr, dom: &Dom, ctx: &Context) -> Result<XValue, XPathError> {
    match expr {
        Expr::Literal(s) => Ok(XValue::Str(s.clone())),
        Expr::Number(n) => Ok(XValue::Num(*n)),
        Expr::Negate(inner) => Ok(XValue::Num(-to_number(dom, &eval(inner, dom, ctx)?))),
        Expr::Path { absolute, steps } => {
            let start = if *absolute {
                NodeRef::Node(Dom::ROOT)
            } else {
                ctx.node
            };
            let mut selection = vec![start];
            for step in steps {
                selection = apply_step(step, &selection, dom)?;
                if selection.is_empty() {
                    break;
                }
            }
            Ok(XValue::Nodes(selection))
        }
        Expr::Union(parts) => {
            let mut all = Vec::new();
            for part in parts {
                match eval(part, dom, ctx)? {
                    XValue::Nodes(nodes) => all.extend(nodes),
                    _ => {
                        return Err(XPathError::Syntax {
                            expression: String::new(),
                            reason: "union operands must be node sets".into(),
                        });
                    }
                }
            }
            all.sort();
            all.dedup();
            Ok(XValue::Nodes(all))
        }
        Expr::Binary(left, op, right) => {
            let l = eval(left, dom, ctx)?;
            match op {
                BinOp::Or => {
                    if to_bool(&l) {
                        return Ok(XValue::Bool(true));
                    }
                    Ok(XValue::Bool(to_bool(&eval(right, dom, ctx)?)))
                }
                BinOp::And => {
                    if !to_bool(&l) {
                        return Ok(XValue::Bool(false));
                    }
                    Ok(XValue::Bool(to_bool(&eval(right, dom, ctx)?)))
                }
                _ => {
                    let r = eval(right, dom, ctx)?;
                    Ok(XValue::Bool(compare(dom, &l, *op, &r)))
                }
            }
        }
        Expr::Call(name, args) => call(name, args, dom, ctx),
    }
}

fn call(name: &str, args: &[Expr], dom: &Dom, ctx: &Context) -> Result<XValue, XPathError> {
    let arg = |i: usize| -> Result<XValue, XPathError> {
        match args.get(i) {
            Some(expr) => eval(expr, dom, ctx),
            None => Ok(XValue::Nodes(vec![ctx.node])),
        }
    };
    let text = |i: usize| -> Result<String, XPathError> { Ok(to_string(dom, &arg(i)?)) };

    Ok(match name {
        "last" => XValue::Num(ctx.size as f64),
        "position" => XValue::Num(ctx.position as f64),
        "true" => XValue::Bool(true),
        "false" => XValue::Bool(false),
        "not" => XValue::Bool(!to_bool(&arg(0)?)),
        "string" => XValue::Str(text(0)?),
        "contains" => XValue::Bool(text(0)?.contains(&text(1)?)),
        "starts-with" => XValue::Bool(text(0)?.starts_with(&text(1)?)),
        "ends-with" => XValue::Bool(text(0)?.ends_with(&text(1)?)),
        "string-length" => XValue::Num(text(0)?.chars().count() as f64),
        "concat" => {
            let mut out = String::new();
            for i in 0..args.len() {
                out.push_str(&text(i)?);
            }
            XValue::Str(out)
        }
        "normalize-space" => XValue::Str(text(0)?.split_whitespace().collect::<Vec<_>>().join(" ")),
        "count" => match arg(0)? {
            XValue::Nodes(nodes) => XValue::Num(nodes.len() as f64),
            _ => XValue::Num(0.0),
        },
        "name" | "local-name" => {
            let node = match arg(0)? {
                XValue::Nodes(nodes) => nodes.first().copied(),
                _ => None,
            };
            let full = node.map(|n| node_name(dom, n)).unwrap_or_default();
            if name == "local-name" {
                XValue::Str(local_part(&full).to_string())
            } else {
                XValue::Str(full)
            }
        }
        other => return Err(XPathError::UnknownFunction(other.to_string())),
    })
}

fn local_part(name: &str) -> &str {
    name.rsplit_once(':').map(|(_, local)| local).unwrap_or(name)
}

fn node_name(dom: &Dom, node: NodeRef) -> String {
    match node {
        NodeRef::Node(id) => dom.element_name(id).unwrap_or("").to_string(),
        NodeRef::Attribute(id, i) => dom
            .attributes(id)
            .get(i)
            .map(|(k, _)| k.clone())
            .unwrap_or_default(),
    }
}

fn name_matches(dom: &Dom, test: &str, actual: &str, namespace: Option<&str>) -> bool {
    match test.split_once(':') {
        Some((prefix, local)) => {
            let (actual_prefix, actual_local) = actual.split_once(':').unwrap_or(("", actual));
            let local_ok = local == "*" || local == actual_local;
            if !local_ok {
                return false;
            }
            match (dom.namespace_uri(prefix), namespace) {
                (Some(uri), Some(actual_uri)) => uri == actual_uri,
                _ => prefix == actual_prefix,
            }
        }
        None => test == actual || test == local_part(actual),
    }
}

fn candidates(axis: Axis, node: NodeRef, dom: &Dom) -> Vec<NodeRef> {
    let NodeRef::Node(id) = node else {
        let NodeRef::Attribute(owner, _) = node else {
            return Vec::new();
        };
        return match axis {
            Axis::SelfAxis | Axis::DescendantOrSelf => vec![node],
            Axis::Parent => vec![NodeRef::Node(owner)],
            Axis::Ancestor => {
                let mut out = vec![NodeRef::Node(owner)];
                out.extend(candidates(Axis::Ancestor, NodeRef::Node(owner), dom));
                out
            }
            _ => Vec::new(),
        };
    };

    let siblings = || -> (Vec<NodeId>, usize) {
        match dom.node(id).parent {
            Some(parent) => {
                let all = dom.node(parent).children.clone();
                let index = all.iter().position(|c| *c == id).unwrap_or(0);
                (all, index)
            }
            None => (Vec::new(), 0),
        }
    };

    match axis {
        Axis::Child => dom.node(id).children.iter().map(|c| NodeRef::Node(*c)).collect(),
        Axis::Descendant => dom.descendants(id).into_iter().map(NodeRef::Node).collect(),
        Axis::DescendantOrSelf => std::iter::once(id)
            .chain(dom.descendants(id))
            .map(NodeRef::Node)
            .collect(),
        Axis::Attribute => (0..dom.attributes(id).len())
            .map(|i| NodeRef::Attribute(id, i))
            .collect(),
        Axis::SelfAxis => vec![node],
        Axis::Parent => dom.node(id).parent.map(NodeRef::Node).into_iter().collect(),
        Axis::Ancestor => {
            let mut out = Vec::new();
            let mut current = dom.node(id).parent;
            while let Some(parent) = current {
                out.push(NodeRef::Node(parent));
                current = dom.node(parent).parent;
            }
            out
        }
        Axis::FollowingSibling => {
            let (all, index) = siblings();
            all.into_iter().skip(index + 1).map(NodeRef::Node).collect()
        }
        Axis::PrecedingSibling => {
            let (all, index) = siblings();
            all.into_iter().take(index).rev().map(NodeRef::Node).collect()
        }
    }
}

fn test_matches(test: &NodeTest, axis: Axis, node: NodeRef, dom: &Dom) -> bool {
    match node {
        NodeRef::Attribute(id, i) => {
            if axis != Axis::Attribute {
                return matches!(test, NodeTest::AnyNode);
            }
            match test {
                NodeTest::AnyElement | NodeTest::AnyNode => true,
                NodeTest::Text => false,
                NodeTest::Name(name) => dom
                    .attributes(id)
                    .get(i)
                    .is_some_and(|(key, _)| name_matches(dom, name, key, None)),
            }
        }
        NodeRef::Node(id) => match (&dom.node(id).kind, test) {
            (_, NodeTest::AnyNode) => true,
            (NodeKind::Text(_), NodeTest::Text) => true,
            (NodeKind::Element { .. }, NodeTest::AnyElement) => true,
            (
                NodeKind::Element {
                    name, namespace, ..
                },
                NodeTest::Name(test),
            ) => name_matches(dom, test, name, namespace.as_deref()),
            _ => false,
        },
    }
}

fn apply_step(step: &Step, selection: &[NodeRef], dom: &Dom) -> Result<Vec<NodeRef>, XPathError> {
    let mut out = Vec::new();
    for node in selection {
        let mut matched: Vec<NodeRef> = candidates(step.axis, *node, dom)
            .into_iter()
            .filter(|c| test_matches(&step.test, step.axis, *c, dom))
            .collect();

        for predicate in &step.predicates {
            let size = matched.len();
            let mut kept = Vec::new();
            for (i, candidate) in matched.into_iter().enumerate() {
                let ctx = Context {
                    node: candidate,
                    position: i + 1,
                    size,
                };
                let keep = match eval(predicate, dom, &ctx)? {
                    XValue::Num(n) => (n - (i + 1) as f64).abs() < f64::EPSILON,
                    other => to_bool(&other),
                };
                if keep {
                    kept.push(candidate);
                }
            }
            matched = kept;
        }
        out.extend(matched);
    }

    // Document order, no duplicates.
    if step.axis != Axis::Attribute {
        out.sort();
    }
    out.dedup();
    Ok(out)
}

pub fn string_value(dom: &Dom, node: NodeRef) -> String {
    match node {
        NodeRef::Node(id) => dom.text_content(id),
        NodeRef::Attribute(id, i) => dom
            .attributes(id)
            .get(i)
            .map(|(_, v)| v.clone())
            .unwrap_or_default(),
    }
}

fn to_string(dom: &Dom, value: &XValue) -> String {
    match value {
        XValue::Str(s) => s.clone(),
        XValue::Num(n) => {
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                n.to_string()
            }
        }
        XValue::Bool(b) => b.to_string(),
        XValue::Nodes(nodes) => nodes
            .first()
            .map(|n| string_value(dom, *n))
            .unwrap_or_default(),
    }
}

fn to_number(dom: &Dom, value: &XValue) -> f64 {
    match value {
        XValue::Num(n) => *n,
        XValue::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        other => to_string(dom, other).trim().parse().unwrap_or(f64::NAN),
    }
}

fn to_bool(value: &XValue) -> bool {
    match value {
        XValue::Bool(b) => *b,
        XValue::Num(n) => *n != 0.0 && !n.is_nan(),
        XValue::Str(s) => !s.is_empty(),
        XValue::Nodes(nodes) => !nodes.is_empty(),
    }
}

fn compare(dom: &Dom, left: &XValue, op: BinOp, right: &XValue) -> bool {
    // Node sets compare existentially over their string values.
    if let XValue::Nodes(nodes) = left {
        return nodes.iter().any(|n| {
            compare(dom, &XValue::Str(string_value(dom, *n)), op, right)
        });
    }
    if let XValue::Nodes(nodes) = right {
        return nodes.iter().any(|n| {
            compare(dom, left, op, &XValue::Str(string_value(dom, *n)))
        });
    }

    match op {
        BinOp::Eq | BinOp::Ne => {
            let equal = match (left, right) {
                (XValue::Bool(_), _) | (_, XValue::Bool(_)) => to_bool(left) == to_bool(right),
                (XValue::Num(_), _) | (_, XValue::Num(_)) => {
                    to_number(dom, left) == to_number(dom, right)
                }
                _ => to_string(dom, left) == to_string(dom, right),
            };
            if op == BinOp::Eq { equal } else { !equal }
        }
        _ => {
            let (a, b) = (to_number(dom, left), to_number(dom, right));
            match op {
                BinOp::Lt => a < b,
                BinOp::Le => a <= b,
                BinOp::Gt => a > b,
                BinOp::Ge => a >= b,
                _ => false,
            }
        }
    }
}
