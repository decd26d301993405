//! A small XPath 1.0 subset evaluated directly over the parsed tree.
//!
//! Supported: absolute and relative location paths, `//`, `.`, `..`, `*`,
//! `@attr`, `text()`, `node()`, the `child`, `descendant`,
//! `descendant-or-self`, `self`, `parent`, `ancestor`, `ancestor-or-self`,
//! `following-sibling` and `preceding-sibling` axes, `|` unions at the top
//! level, and predicates built from `=`, `!=`, `and`, `or`, literals, numbers
//! and the functions `contains`, `starts-with`, `not`, `normalize-space`,
//! `string`, `name`, `count`, `position`, `last`, `true` and `false`.
//!
//! Anything else is rejected at parse time with
//! [`ErrorKind::InvalidXPath`].

use std::collections::HashMap;
use std::iter::{Peekable, once};
use std::str::CharIndices;

use ego_tree::{NodeId, NodeRef, Tree};
use scraper::Node;

use crate::error::{ErrorKind, Result};

/// A parsed expression that selects elements.
#[derive(Debug, Clone, PartialEq)]
pub struct XPath {
    source: String,
    paths: Vec<Path>,
}

impl XPath {
    pub fn parse(expression: &str) -> Result<Self> {
        let invalid = |reason: String| ErrorKind::InvalidXPath {
            expression: expression.to_string(),
            reason,
        };
        let tokens = match tokenize(expression) {
            Ok(tokens) => tokens,
            Err(reason) => exn::bail!(invalid(reason)),
        };
        let mut parser = Parser {
            tokens,
            position: 0,
            depth: 0,
        };
        let paths = match parser.union() {
            Ok(paths) => paths,
            Err(reason) => exn::bail!(invalid(reason)),
        };
        if let Some(token) = parser.peek() {
            exn::bail!(invalid(format!("unexpected {token:?}")));
        }
        if paths.iter().any(|path| path.steps.last().is_some_and(|step| step.axis == Axis::Attribute)) {
            exn::bail!(invalid("expression must select elements, not attributes".to_string()));
        }
        Ok(Self {
            source: expression.to_string(),
            paths,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Every element the expression selects, in document order.
    pub fn select(&self, tree: &Tree<Node>) -> Vec<NodeId> {
        let evaluator = Evaluator::new(tree);
        let context = Context {
            node: tree.root().id(),
            position: 1,
            size: 1,
        };
        let mut selected = Vec::new();
        for path in &self.paths {
            if let Value::Nodes(nodes) = evaluator.path(path, &context) {
                selected.extend(nodes);
            }
        }
        evaluator
            .sort(selected)
            .into_iter()
            .filter(|id| tree.get(*id).is_some_and(|node| node.value().is_element()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Slash,
    DoubleSlash,
    Dot,
    DotDot,
    At,
    Star,
    Pipe,
    Comma,
    Equals,
    NotEquals,
    DoubleColon,
    OpenBracket,
    CloseBracket,
    OpenParen,
    CloseParen,
    Name(String),
    Literal(String),
    Number(f64),
}

fn tokenize(expression: &str) -> std::result::Result<Vec<Token>, String> {
    let mut chars: Peekable<CharIndices<'_>> = expression.char_indices().peekable();
    let mut tokens = Vec::new();
    while let Some((start, c)) = chars.next() {
        let token = match c {
            c if c.is_whitespace() => continue,
            '/' if chars.next_if(|(_, c)| *c == '/').is_some() => Token::DoubleSlash,
            '/' => Token::Slash,
            '.' if chars.next_if(|(_, c)| *c == '.').is_some() => Token::DotDot,
            '.' => Token::Dot,
            '@' => Token::At,
            '*' => Token::Star,
            '|' => Token::Pipe,
            ',' => Token::Comma,
            '=' => Token::Equals,
            '!' if chars.next_if(|(_, c)| *c == '=').is_some() => Token::NotEquals,
            ':' if chars.next_if(|(_, c)| *c == ':').is_some() => Token::DoubleColon,
            '[' => Token::OpenBracket,
            ']' => Token::CloseBracket,
            '(' => Token::OpenParen,
            ')' => Token::CloseParen,
            '"' | '\'' => {
                let mut literal = String::new();
                loop {
                    match chars.next() {
                        Some((_, end)) if end == c => break,
                        Some((_, next)) => literal.push(next),
                        None => return Err("unterminated string literal".to_string()),
                    }
                }
                Token::Literal(literal)
            },
            c if c.is_ascii_digit() => {
                let mut end = start + c.len_utf8();
                while let Some((index, next)) = chars.next_if(|(_, c)| c.is_ascii_digit() || *c == '.') {
                    end = index + next.len_utf8();
                }
                let number = &expression[start..end];
                Token::Number(number.parse().map_err(|_| format!("invalid number '{number}'"))?)
            },
            c if c.is_alphabetic() || c == '_' => {
                let mut end = start + c.len_utf8();
                while let Some((index, next)) =
                    chars.next_if(|(_, c)| c.is_alphanumeric() || matches!(*c, '_' | '-' | '.'))
                {
                    end = index + next.len_utf8();
                }
                Token::Name(expression[start..end].to_string())
            },
            other => return Err(format!("unsupported character '{other}'")),
        };
        tokens.push(token);
    }
    Ok(tokens)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Itself,
    Parent,
    Ancestor,
    AncestorOrSelf,
    FollowingSibling,
    PrecedingSibling,
    Attribute,
}

impl Axis {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "child" => Self::Child,
            "descendant" => Self::Descendant,
            "descendant-or-self" => Self::DescendantOrSelf,
            "self" => Self::Itself,
            "parent" => Self::Parent,
            "ancestor" => Self::Ancestor,
            "ancestor-or-self" => Self::AncestorOrSelf,
            "following-sibling" => Self::FollowingSibling,
            "preceding-sibling" => Self::PrecedingSibling,
            "attribute" => Self::Attribute,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum NodeTest {
    /// Element or attribute name, lowercased.
    Name(String),
    /// `*`: any element, or any attribute.
    Any,
    Text,
    Node,
}

impl NodeTest {
    fn matches(&self, node: &NodeRef<'_, Node>) -> bool {
        match (self, node.value()) {
            (Self::Name(name), Node::Element(element)) => element.name() == name,
            (Self::Any, Node::Element(_)) => true,
            (Self::Text, Node::Text(_)) => true,
            (Self::Node, _) => true,
            _ => false,
        }
    }

    fn matches_attribute(&self, name: &str) -> bool {
        match self {
            Self::Name(wanted) => wanted == name,
            Self::Any | Self::Node => true,
            Self::Text => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Step {
    axis: Axis,
    test: NodeTest,
    predicates: Vec<Expr>,
}

impl Step {
    fn abbreviated(axis: Axis) -> Self {
        Self {
            axis,
            test: NodeTest::Node,
            predicates: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Path {
    absolute: bool,
    steps: Vec<Step>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Function {
    Contains,
    StartsWith,
    Not,
    NormalizeSpace,
    String,
    Name,
    Count,
    Position,
    Last,
    True,
    False,
}

impl Function {
    /// The function for `name` plus its minimum and maximum arity.
    fn from_name(name: &str) -> Option<(Self, usize, usize)> {
        Some(match name {
            "contains" => (Self::Contains, 2, 2),
            "starts-with" => (Self::StartsWith, 2, 2),
            "not" => (Self::Not, 1, 1),
            "normalize-space" => (Self::NormalizeSpace, 0, 1),
            "string" => (Self::String, 0, 1),
            "name" | "local-name" => (Self::Name, 0, 1),
            "count" => (Self::Count, 1, 1),
            "position" => (Self::Position, 0, 0),
            "last" => (Self::Last, 0, 0),
            "true" => (Self::True, 0, 0),
            "false" => (Self::False, 0, 0),
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Compare {
        negated: bool,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Path(Path),
    Literal(String),
    Number(f64),
    Call(Function, Vec<Expr>),
}

/// How deeply predicates, parentheses and function arguments may nest.
const MAX_NESTING: usize = 32;

struct Parser {
    tokens: Vec<Token>,
    position: usize,
    depth: usize,
}

type ParseResult<T> = std::result::Result<T, String>;

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.position + offset)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        self.position += 1;
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> ParseResult<()> {
        match self.next() {
            Some(ref found) if found == token => Ok(()),
            Some(found) => Err(format!("expected {token:?}, found {found:?}")),
            None => Err(format!("expected {token:?}, found end of expression")),
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if matches!(self.peek(), Some(Token::Name(name)) if name == keyword) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn union(&mut self) -> ParseResult<Vec<Path>> {
        let mut paths = vec![self.path()?];
        while self.eat(&Token::Pipe) {
            paths.push(self.path()?);
        }
        Ok(paths)
    }

    fn or(&mut self) -> ParseResult<Expr> {
        if self.depth == MAX_NESTING {
            return Err(format!("expression nests deeper than {MAX_NESTING} levels"));
        }
        self.depth += 1;
        let expr = self.disjunction();
        self.depth -= 1;
        expr
    }

    fn disjunction(&mut self) -> ParseResult<Expr> {
        let mut expr = self.and()?;
        while self.eat_keyword("or") {
            expr = Expr::Or(Box::new(expr), Box::new(self.and()?));
        }
        Ok(expr)
    }

    fn and(&mut self) -> ParseResult<Expr> {
        let mut expr = self.comparison()?;
        while self.eat_keyword("and") {
            expr = Expr::And(Box::new(expr), Box::new(self.comparison()?));
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        let lhs = self.primary()?;
        let negated = match self.peek() {
            Some(Token::Equals) => false,
            Some(Token::NotEquals) => true,
            _ => return Ok(lhs),
        };
        self.position += 1;
        Ok(Expr::Compare {
            negated,
            lhs: Box::new(lhs),
            rhs: Box::new(self.primary()?),
        })
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        match self.peek() {
            Some(Token::Literal(literal)) => {
                let expr = Expr::Literal(literal.clone());
                self.position += 1;
                Ok(expr)
            },
            Some(Token::Number(number)) => {
                let expr = Expr::Number(*number);
                self.position += 1;
                Ok(expr)
            },
            Some(Token::OpenParen) => {
                self.position += 1;
                let expr = self.or()?;
                self.expect(&Token::CloseParen)?;
                Ok(expr)
            },
            Some(Token::Name(name))
                if self.peek_at(1) == Some(&Token::OpenParen) && !matches!(name.as_str(), "text" | "node") =>
            {
                self.call()
            },
            _ => Ok(Expr::Path(self.path()?)),
        }
    }

    fn call(&mut self) -> ParseResult<Expr> {
        let Some(Token::Name(name)) = self.next() else {
            return Err("expected function name".to_string());
        };
        let (function, min, max) = Function::from_name(&name).ok_or_else(|| format!("unsupported function '{name}'"))?;
        self.expect(&Token::OpenParen)?;
        let mut args = Vec::new();
        if !self.eat(&Token::CloseParen) {
            loop {
                args.push(self.or()?);
                if self.eat(&Token::CloseParen) {
                    break;
                }
                self.expect(&Token::Comma)?;
            }
        }
        if args.len() < min || args.len() > max {
            return Err(format!("{name}() takes {min} to {max} arguments, got {}", args.len()));
        }
        Ok(Expr::Call(function, args))
    }

    fn path(&mut self) -> ParseResult<Path> {
        let mut steps = Vec::new();
        let absolute = match self.peek() {
            Some(Token::Slash) => {
                self.position += 1;
                if !self.at_step() {
                    return Ok(Path { absolute: true, steps });
                }
                true
            },
            Some(Token::DoubleSlash) => {
                self.position += 1;
                steps.push(Step::abbreviated(Axis::DescendantOrSelf));
                true
            },
            _ => false,
        };
        steps.push(self.step()?);
        loop {
            if self.eat(&Token::DoubleSlash) {
                steps.push(Step::abbreviated(Axis::DescendantOrSelf));
            } else if !self.eat(&Token::Slash) {
                break;
            }
            steps.push(self.step()?);
        }
        if steps.iter().rev().skip(1).any(|step| step.axis == Axis::Attribute) {
            return Err("attribute step must be the last step of a path".to_string());
        }
        Ok(Path { absolute, steps })
    }

    fn at_step(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::Dot | Token::DotDot | Token::At | Token::Star | Token::Name(_))
        )
    }

    fn step(&mut self) -> ParseResult<Step> {
        let axis = match self.next() {
            Some(Token::Dot) => return Ok(Step::abbreviated(Axis::Itself)),
            Some(Token::DotDot) => return Ok(Step::abbreviated(Axis::Parent)),
            Some(Token::At) => Axis::Attribute,
            Some(Token::Name(name)) if self.peek() == Some(&Token::DoubleColon) => {
                self.position += 1;
                Axis::from_name(&name).ok_or_else(|| format!("unsupported axis '{name}'"))?
            },
            Some(_) => {
                self.position -= 1;
                Axis::Child
            },
            None => return Err("expected a location step, found end of expression".to_string()),
        };
        let test = match self.next() {
            Some(Token::Star) => NodeTest::Any,
            Some(Token::Name(name)) if self.peek() == Some(&Token::OpenParen) => {
                self.position += 1;
                self.expect(&Token::CloseParen)?;
                match name.as_str() {
                    "text" => NodeTest::Text,
                    "node" => NodeTest::Node,
                    other => return Err(format!("unsupported node test '{other}()'")),
                }
            },
            Some(Token::Name(name)) => NodeTest::Name(name.to_ascii_lowercase()),
            Some(found) => return Err(format!("expected a node test, found {found:?}")),
            None => return Err("expected a node test, found end of expression".to_string()),
        };
        let mut predicates = Vec::new();
        while self.eat(&Token::OpenBracket) {
            predicates.push(self.or()?);
            self.expect(&Token::CloseBracket)?;
        }
        if axis == Axis::Attribute && !predicates.is_empty() {
            return Err("predicates on attribute steps are not supported".to_string());
        }
        Ok(Step { axis, test, predicates })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Nodes(Vec<NodeId>),
    Attributes(Vec<String>),
    String(String),
    Number(f64),
    Boolean(bool),
}

struct Context {
    node: NodeId,
    position: usize,
    size: usize,
}

struct Evaluator<'a> {
    tree: &'a Tree<Node>,
    order: HashMap<NodeId, usize>,
}

impl<'a> Evaluator<'a> {
    fn new(tree: &'a Tree<Node>) -> Self {
        let order = tree.root().descendants().enumerate().map(|(index, node)| (node.id(), index)).collect();
        Self { tree, order }
    }

    fn sort(&self, mut nodes: Vec<NodeId>) -> Vec<NodeId> {
        nodes.sort_by_key(|id| self.order.get(id).copied().unwrap_or(usize::MAX));
        nodes.dedup();
        nodes
    }

    fn path(&self, path: &Path, context: &Context) -> Value {
        let mut nodes = vec![if path.absolute { self.tree.root().id() } else { context.node }];
        for step in &path.steps {
            if step.axis == Axis::Attribute {
                let values = nodes
                    .iter()
                    .filter_map(|id| self.tree.get(*id))
                    .filter_map(|node| node.value().as_element())
                    .flat_map(|element| element.attrs())
                    .filter(|(name, _)| step.test.matches_attribute(name))
                    .map(|(_, value)| value.to_string())
                    .collect();
                return Value::Attributes(values);
            }
            nodes = self.step(&nodes, step);
        }
        Value::Nodes(nodes)
    }

    fn step(&self, context: &[NodeId], step: &Step) -> Vec<NodeId> {
        let mut selected = Vec::new();
        for node in context.iter().filter_map(|id| self.tree.get(*id)) {
            let mut candidates: Vec<NodeId> =
                axis(node, step.axis).filter(|candidate| step.test.matches(candidate)).map(|n| n.id()).collect();
            for predicate in &step.predicates {
                let size = candidates.len();
                candidates = candidates
                    .into_iter()
                    .enumerate()
                    .filter(|(index, id)| {
                        let context = Context {
                            node: *id,
                            position: index + 1,
                            size,
                        };
                        match self.eval(predicate, &context) {
                            Value::Number(number) => number == (index + 1) as f64,
                            value => self.boolean(&value),
                        }
                    })
                    .map(|(_, id)| id)
                    .collect();
            }
            selected.extend(candidates);
        }
        self.sort(selected)
    }

    fn eval(&self, expr: &Expr, context: &Context) -> Value {
        match expr {
            Expr::Or(lhs, rhs) => Value::Boolean(
                self.boolean(&self.eval(lhs, context)) || self.boolean(&self.eval(rhs, context)),
            ),
            Expr::And(lhs, rhs) => Value::Boolean(
                self.boolean(&self.eval(lhs, context)) && self.boolean(&self.eval(rhs, context)),
            ),
            Expr::Compare { negated, lhs, rhs } => {
                Value::Boolean(self.compare(self.eval(lhs, context), self.eval(rhs, context), *negated))
            },
            Expr::Path(path) => self.path(path, context),
            Expr::Literal(literal) => Value::String(literal.clone()),
            Expr::Number(number) => Value::Number(*number),
            Expr::Call(function, args) => self.call(*function, args, context),
        }
    }

    fn call(&self, function: Function, args: &[Expr], context: &Context) -> Value {
        let string_arg = |index: usize| match args.get(index) {
            Some(arg) => self.string(&self.eval(arg, context)),
            None => self.string_value(context.node),
        };
        match function {
            Function::Contains => Value::Boolean(string_arg(0).contains(&string_arg(1))),
            Function::StartsWith => Value::Boolean(string_arg(0).starts_with(&string_arg(1))),
            Function::Not => Value::Boolean(!args.first().is_some_and(|arg| self.boolean(&self.eval(arg, context)))),
            Function::NormalizeSpace => Value::String(string_arg(0).split_whitespace().collect::<Vec<_>>().join(" ")),
            Function::String => Value::String(string_arg(0)),
            Function::Name => {
                let node = match args.first().map(|arg| self.eval(arg, context)) {
                    Some(Value::Nodes(nodes)) => nodes.first().copied(),
                    Some(_) => None,
                    None => Some(context.node),
                };
                let name = node
                    .and_then(|id| self.tree.get(id))
                    .and_then(|node| node.value().as_element().map(|element| element.name().to_string()));
                Value::String(name.unwrap_or_default())
            },
            Function::Count => Value::Number(match args.first().map(|arg| self.eval(arg, context)) {
                Some(Value::Nodes(nodes)) => nodes.len() as f64,
                Some(Value::Attributes(values)) => values.len() as f64,
                _ => 0.0,
            }),
            Function::Position => Value::Number(context.position as f64),
            Function::Last => Value::Number(context.size as f64),
            Function::True => Value::Boolean(true),
            Function::False => Value::Boolean(false),
        }
    }

    /// Existential comparison, as XPath defines it for node-sets.
    fn compare(&self, lhs: Value, rhs: Value, negated: bool) -> bool {
        match (lhs, rhs) {
            (Value::Boolean(flag), other) | (other, Value::Boolean(flag)) => (flag == self.boolean(&other)) != negated,
            (Value::Number(number), other) | (other, Value::Number(number)) => self
                .strings(&other)
                .iter()
                .any(|value| (to_number(value) == number) != negated),
            (lhs, rhs) => {
                let rhs = self.strings(&rhs);
                self.strings(&lhs).iter().any(|a| rhs.iter().any(|b| (a == b) != negated))
            },
        }
    }

    fn boolean(&self, value: &Value) -> bool {
        match value {
            Value::Nodes(nodes) => !nodes.is_empty(),
            Value::Attributes(values) => !values.is_empty(),
            Value::String(string) => !string.is_empty(),
            Value::Number(number) => *number != 0.0 && !number.is_nan(),
            Value::Boolean(flag) => *flag,
        }
    }

    fn string(&self, value: &Value) -> String {
        self.strings(value).into_iter().next().unwrap_or_default()
    }

    fn strings(&self, value: &Value) -> Vec<String> {
        match value {
            Value::Nodes(nodes) => nodes.iter().map(|id| self.string_value(*id)).collect(),
            Value::Attributes(values) => values.clone(),
            Value::String(string) => vec![string.clone()],
            Value::Number(number) => vec![format_number(*number)],
            Value::Boolean(flag) => vec![flag.to_string()],
        }
    }

    /// Concatenated text of the node and its descendants.
    fn string_value(&self, id: NodeId) -> String {
        let Some(node) = self.tree.get(id) else {
            return String::new();
        };
        node.descendants().filter_map(|node| node.value().as_text()).map(|text| &**text).collect()
    }
}

fn axis<'a>(node: NodeRef<'a, Node>, axis: Axis) -> Box<dyn Iterator<Item = NodeRef<'a, Node>> + 'a> {
    match axis {
        Axis::Child => Box::new(node.children()),
        Axis::Descendant => Box::new(node.descendants().skip(1)),
        Axis::DescendantOrSelf => Box::new(node.descendants()),
        Axis::Itself => Box::new(once(node)),
        Axis::Parent => Box::new(node.parent().into_iter()),
        Axis::Ancestor => Box::new(node.ancestors()),
        Axis::AncestorOrSelf => Box::new(once(node).chain(node.ancestors())),
        Axis::FollowingSibling => Box::new(node.next_siblings()),
        Axis::PrecedingSibling => Box::new(node.prev_siblings()),
        Axis::Attribute => Box::new(std::iter::empty()),
    }
}

fn to_number(value: &str) -> f64 {
    value.trim().parse().unwrap_or(f64::NAN)
}

fn format_number(number: f64) -> String {
    if number.is_finite() && number.fract() == 0.0 {
        format!("{}", number as i64)
    } else {
        number.to_string()
    }
}
