//! Simulated expression console
//!
//! A small stand-in for the application under test: a debugger window with an
//! object tree, an expression console with severity filters, a debugger
//! preset combo box and an output pane. Expressions are evaluated against the
//! properties of the object selected in the tree.
//!
//! ```text
//! MainWindow
//! ├── WatchTreeView
//! │   └── TreeItem 'Rectangle'
//! │       ├── TreeItem 'Rectangle'
//! │       ├── TreeItem 'Rectangle'   (anchors.centerIn set)
//! │       └── TreeItem 'Text'
//! ├── ConsolePane
//! │   ├── ConsoleView   (ConsoleItem rows, last row editable)
//! │   ├── ConsoleEdit
//! │   ├── QToolButton 'Clear'
//! │   └── QToolButton x3 (log / warning / error filters)
//! ├── QComboBox         ('Debugger Preset', 'QML Debugger')
//! └── OutputWindow
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use super::{Behavior, InputEvent, MockDriver, WidgetTree};
use crate::actuator::{CHECKED_KEY, RETURN_KEY};
use crate::driver::ElementHandle;
use crate::query::{TEXT_KEY, TOOL_TIP_KEY, TYPE_KEY};
use crate::result::{HarnessError, HarnessResult};

/// Tool tip of the debug/log/info filter button
pub const LOG_FILTER_TOOL_TIP: &str = "Show debug, log, and info messages.";
/// Tool tip of the warning filter button
pub const WARNING_FILTER_TOOL_TIP: &str = "Show warning messages.";
/// Tool tip of the error filter button
pub const ERROR_FILTER_TOOL_TIP: &str = "Show error messages.";
/// Text appended to the output pane when the debuggee quits
pub const FINISHED_MESSAGE: &str = "Debugging has finished";
/// Combo entry removed when the debuggee quits
pub const QML_DEBUGGER_ITEM: &str = "QML Debugger";
/// Combo entry that always stays
pub const PRESET_ITEM: &str = "Debugger Preset";

const SEVERITY_KEY: &str = "severity";
const EDITABLE_KEY: &str = "editable";

/// Value of a console expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// `undefined`
    Undefined,
    /// `null`
    Null,
    /// Boolean
    Bool(bool),
    /// Number
    Number(f64),
    /// String
    Str(String),
    /// Color as six lowercase hex digits
    Color(String),
    /// Object reference; empty name means an unnamed object
    Object(String),
}

impl Value {
    fn to_number(&self) -> f64 {
        match self {
            Self::Number(n) => *n,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Null => 0.0,
            Self::Str(s) => s.trim().parse().unwrap_or(f64::NAN),
            Self::Undefined | Self::Color(_) | Self::Object(_) => f64::NAN,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("<undefined>"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) if n.is_nan() => f.write_str("NaN"),
            Self::Number(n) if n.is_infinite() => {
                f.write_str(if *n > 0.0 { "Infinity" } else { "-Infinity" })
            }
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Self::Number(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
            Self::Color(hex) => write!(f, "#{hex}"),
            Self::Object(name) if name.is_empty() => f.write_str("<unnamed object>"),
            Self::Object(name) => f.write_str(name),
        }
    }
}

/// Severity of a console row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Echo of the submitted input
    Input,
    /// `console.log`, `console.info` and `console.debug`
    Log,
    /// `console.warn`
    Warning,
    /// `console.error` and evaluation errors
    Error,
    /// Value of the last statement
    Result,
}

impl Severity {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Log => "log",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Result => "result",
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    severity: Severity,
    text: String,
}

type Scope = BTreeMap<String, Value>;

fn scope(props: &[(&str, Value)]) -> Scope {
    props
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

fn color(hex: &str) -> Value {
    Value::Color(hex.to_string())
}

const COLOR_NAMES: &[(&str, &str)] = &[
    ("black", "000000"),
    ("white", "ffffff"),
    ("red", "ff0000"),
    ("green", "008000"),
    ("blue", "0000ff"),
    ("silver", "c0c0c0"),
    ("gray", "808080"),
    ("yellow", "ffff00"),
];

fn parse_color(s: &str) -> Option<String> {
    let lower = s.trim().to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix('#') {
        return (hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()))
            .then(|| hex.to_string());
    }
    COLOR_NAMES
        .iter()
        .find(|(name, _)| *name == lower)
        .map(|(_, hex)| (*hex).to_string())
}

/// Simulated debugger console, installed into a [`MockDriver`]
#[derive(Debug)]
pub struct ConsoleApp {
    view: ElementHandle,
    edit: ElementHandle,
    input_row: Option<ElementHandle>,
    clear_button: ElementHandle,
    filters: [(ElementHandle, Severity); 3],
    combo: ElementHandle,
    output_window: ElementHandle,
    scopes: HashMap<u64, Scope>,
    selected: u64,
    entries: Vec<Entry>,
    focused: bool,
    finished: bool,
}

impl ConsoleApp {
    /// Build the widget tree and return a driver running the console
    #[must_use]
    pub fn launch() -> MockDriver {
        let mut tree = WidgetTree::new();
        let window = tree.add_root(&[(TYPE_KEY, "MainWindow"), ("windowTitle", "Debugger")]);

        let watch = tree.add_child(window, &[(TYPE_KEY, "WatchTreeView")]);
        let item = |tree: &mut WidgetTree, parent: ElementHandle, text: &str| {
            tree.add_child(parent, &[(TYPE_KEY, "TreeItem"), (TEXT_KEY, text)])
        };
        let main = item(&mut tree, watch, "Rectangle");
        let framed = item(&mut tree, main, "Rectangle");
        let centered = item(&mut tree, main, "Rectangle");
        let label = item(&mut tree, main, "Text");

        let pane = tree.add_child(window, &[(TYPE_KEY, "ConsolePane")]);
        let view = tree.add_child(pane, &[(TYPE_KEY, "ConsoleView")]);
        let edit = tree.add_child(pane, &[(TYPE_KEY, "ConsoleEdit"), (TEXT_KEY, "")]);
        let clear_button = tree.add_child(pane, &[(TYPE_KEY, "QToolButton"), (TEXT_KEY, "Clear")]);
        let filter = |tree: &mut WidgetTree, tip: &str| {
            tree.add_child(
                pane,
                &[
                    (TYPE_KEY, "QToolButton"),
                    (TOOL_TIP_KEY, tip),
                    ("checkable", "1"),
                    (CHECKED_KEY, "1"),
                ],
            )
        };
        let filters = [
            (filter(&mut tree, LOG_FILTER_TOOL_TIP), Severity::Log),
            (filter(&mut tree, WARNING_FILTER_TOOL_TIP), Severity::Warning),
            (filter(&mut tree, ERROR_FILTER_TOOL_TIP), Severity::Error),
        ];

        let combo = tree.add_child(window, &[(TYPE_KEY, "QComboBox"), (TEXT_KEY, PRESET_ITEM)]);
        let _ = tree.add_child(combo, &[(TYPE_KEY, "ComboItem"), (TEXT_KEY, PRESET_ITEM)]);
        let _ = tree.add_child(combo, &[(TYPE_KEY, "ComboItem"), (TEXT_KEY, QML_DEBUGGER_ITEM)]);
        let output_window = tree.add_child(
            window,
            &[(TYPE_KEY, "OutputWindow"), (TEXT_KEY, "Debugging starts\n")],
        );

        let mut scopes = HashMap::new();
        let _ = scopes.insert(
            main.id(),
            scope(&[
                ("width", Value::Number(360.0)),
                ("height", Value::Number(360.0)),
                ("x", Value::Number(0.0)),
                ("y", Value::Number(0.0)),
                ("color", color("ffffff")),
            ]),
        );
        let _ = scopes.insert(
            framed.id(),
            scope(&[
                ("width", Value::Number(100.0)),
                ("height", Value::Number(62.0)),
                ("x", Value::Number(20.0)),
                ("y", Value::Number(20.0)),
                ("color", color("ff0000")),
                ("border.width", Value::Number(1.0)),
                ("border.color", color("000000")),
            ]),
        );
        let _ = scopes.insert(
            centered.id(),
            scope(&[
                ("width", Value::Number(60.0)),
                ("height", Value::Number(60.0)),
                ("x", Value::Number(150.0)),
                ("y", Value::Number(150.0)),
                ("color", color("008000")),
                ("anchors.centerIn", Value::Object(String::new())),
            ]),
        );
        let _ = scopes.insert(
            label.id(),
            scope(&[
                ("text", Value::Str("Hello World".to_string())),
                ("color", color("000000")),
                ("font.pixelSize", Value::Number(12.0)),
                ("x", Value::Number(10.0)),
                ("y", Value::Number(300.0)),
            ]),
        );

        let mut app = Self {
            view,
            edit,
            input_row: None,
            clear_button,
            filters,
            combo,
            output_window,
            scopes,
            selected: main.id(),
            entries: Vec::new(),
            focused: false,
            finished: false,
        };
        app.render(&mut tree);
        MockDriver::from_tree(tree).with_behavior(app)
    }

    fn shown(&self, tree: &WidgetTree, severity: Severity) -> bool {
        self.filters
            .iter()
            .find(|(_, s)| *s == severity)
            .map_or(true, |(button, _)| {
                tree.get_property(*button, CHECKED_KEY) == Some("1")
            })
    }

    fn render(&mut self, tree: &mut WidgetTree) {
        tree.clear_children(self.view);
        for entry in &self.entries {
            if self.shown(tree, entry.severity) {
                let _ = tree.add_child(
                    self.view,
                    &[
                        (TYPE_KEY, "ConsoleItem"),
                        (TEXT_KEY, entry.text.as_str()),
                        (EDITABLE_KEY, "0"),
                        (SEVERITY_KEY, entry.severity.as_str()),
                    ],
                );
            }
        }
        self.input_row = Some(tree.add_child(
            self.view,
            &[(TYPE_KEY, "ConsoleItem"), (TEXT_KEY, ""), (EDITABLE_KEY, "1")],
        ));
    }

    fn push(&mut self, severity: Severity, text: impl Into<String>) {
        self.entries.push(Entry {
            severity,
            text: text.into(),
        });
    }

    fn submit(&mut self, tree: &mut WidgetTree, input: &str) {
        self.push(Severity::Input, input);
        let mut last = Value::Undefined;
        for statement in split_statements(input) {
            match self.execute(statement) {
                Ok(value) => last = value,
                Err(message) => {
                    self.push(Severity::Error, message);
                    self.render(tree);
                    return;
                }
            }
        }
        self.push(Severity::Result, last.to_string());
        if self.finished {
            self.quit(tree);
        }
        self.render(tree);
    }

    fn quit(&mut self, tree: &mut WidgetTree) {
        let items: Vec<_> = tree
            .node(self.combo)
            .map(|n| n.children)
            .unwrap_or_default();
        for item in items {
            if tree.get_property(item, TEXT_KEY) == Some(QML_DEBUGGER_ITEM) {
                tree.remove(item);
            }
        }
        let log = tree
            .get_property(self.output_window, TEXT_KEY)
            .unwrap_or_default()
            .to_string();
        tree.set_property(
            self.output_window,
            TEXT_KEY,
            format!("{log}{FINISHED_MESSAGE}\n"),
        );
    }

    fn execute(&mut self, statement: &str) -> Result<Value, String> {
        match split_assignment(statement) {
            Some((path, rhs)) => {
                let value = self.evaluate(rhs)?;
                self.assign(path, &value)?;
                Ok(value)
            }
            None => self.evaluate(statement),
        }
    }

    fn evaluate(&mut self, source: &str) -> Result<Value, String> {
        let tokens = tokenize(source)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.expression()?;
        if let Some(token) = parser.tokens.get(parser.pos) {
            return Err(format!("SyntaxError: unexpected {token:?}"));
        }
        self.eval(&expr)
    }

    fn assign(&mut self, path: &str, value: &Value) -> Result<(), String> {
        let scope = self.scopes.entry(self.selected).or_default();
        // anchored items ignore explicit positions
        if matches!(path, "x" | "y") && matches!(scope.get("anchors.centerIn"), Some(Value::Object(_))) {
            return Ok(());
        }
        let stored = if path == "color" || path.ends_with(".color") {
            match value {
                Value::Str(s) => Value::Color(
                    parse_color(s).ok_or_else(|| format!("Error: Cannot assign \"{s}\" to color"))?,
                ),
                other => other.clone(),
            }
        } else {
            value.clone()
        };
        let _ = scope.insert(path.to_string(), stored);
        Ok(())
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, String> {
        match expr {
            Expr::Lit(value) => Ok(value.clone()),
            Expr::Path(path) => self
                .scopes
                .get(&self.selected)
                .and_then(|s| s.get(path))
                .cloned()
                .ok_or_else(|| format!("ReferenceError: {path} is not defined")),
            Expr::Neg(inner) => Ok(Value::Number(-self.eval(inner)?.to_number())),
            Expr::Binary(op, lhs, rhs) => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                Ok(match *op {
                    '+' => match (&lhs, &rhs) {
                        (Value::Number(a), Value::Number(b)) => Value::Number(a + b),
                        _ => Value::Str(format!("{lhs}{rhs}")),
                    },
                    '-' => Value::Number(lhs.to_number() - rhs.to_number()),
                    '*' => Value::Number(lhs.to_number() * rhs.to_number()),
                    _ => Value::Number(lhs.to_number() / rhs.to_number()),
                })
            }
            Expr::Call(name, args) => {
                let args = args
                    .iter()
                    .map(|a| self.eval(a))
                    .collect::<Result<Vec<_>, _>>()?;
                self.call(name, &args)
            }
        }
    }

    fn call(&mut self, name: &str, args: &[Value]) -> Result<Value, String> {
        let joined = || {
            args.iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" ")
        };
        match name {
            "console.log" | "console.info" | "console.debug" => {
                self.push(Severity::Log, joined());
                Ok(Value::Undefined)
            }
            "console.warn" => {
                self.push(Severity::Warning, joined());
                Ok(Value::Undefined)
            }
            "console.error" => {
                self.push(Severity::Error, joined());
                Ok(Value::Undefined)
            }
            "Math.min" => Ok(Value::Number(
                args.iter().map(Value::to_number).fold(f64::INFINITY, f64::min),
            )),
            "Math.max" => Ok(Value::Number(
                args.iter()
                    .map(Value::to_number)
                    .fold(f64::NEG_INFINITY, f64::max),
            )),
            "Qt.quit" => {
                self.finished = true;
                Ok(Value::Undefined)
            }
            other => Err(format!("TypeError: {other} is not a function")),
        }
    }

    fn is_editor(&self, handle: ElementHandle) -> bool {
        handle.id() == self.edit.id()
    }
}

impl Behavior for ConsoleApp {
    fn on_input(&mut self, tree: &mut WidgetTree, event: &InputEvent) -> HarnessResult<()> {
        match event {
            InputEvent::Click(h) => {
                if self.input_row.is_some_and(|row| row.id() == h.id()) || self.is_editor(*h) {
                    self.focused = true;
                } else if h.id() == self.clear_button.id() {
                    self.entries.clear();
                    self.focused = false;
                    self.render(tree);
                } else if self.filters.iter().any(|(b, _)| b.id() == h.id()) {
                    self.render(tree);
                } else if self.scopes.contains_key(&h.id()) {
                    self.selected = h.id();
                    self.focused = false;
                }
                Ok(())
            }
            InputEvent::Text(h, text) if self.is_editor(*h) => {
                if self.finished {
                    return Err(HarnessError::dispatch("type", "debugging has finished"));
                }
                if !self.focused {
                    return Err(HarnessError::dispatch("type", "console editor has no focus"));
                }
                let buffer = tree.get_property(self.edit, TEXT_KEY).unwrap_or_default();
                let buffer = format!("{buffer}{text}");
                tree.set_property(self.edit, TEXT_KEY, buffer);
                Ok(())
            }
            InputEvent::Key(h, key) if self.is_editor(*h) && key == RETURN_KEY => {
                if !self.focused || self.finished {
                    return Ok(());
                }
                let buffer = tree
                    .get_property(self.edit, TEXT_KEY)
                    .unwrap_or_default()
                    .to_string();
                if buffer.trim().is_empty() {
                    return Ok(());
                }
                tree.set_property(self.edit, TEXT_KEY, "");
                tracing::trace!(input = %buffer, "console evaluates");
                self.submit(tree, &buffer);
                Ok(())
            }
            InputEvent::Text(..) | InputEvent::Key(..) => Ok(()),
        }
    }
}

// =============================================================================
// EXPRESSIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Str(String),
    Ident(String),
    Op(char),
}

#[derive(Debug, Clone)]
enum Expr {
    Lit(Value),
    Path(String),
    Neg(Box<Expr>),
    Binary(char, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

/// Split on `;` outside string literals, dropping empty statements
fn split_statements(source: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut quote = None;
    let mut start = 0;
    let mut escaped = false;
    for (i, c) in source.char_indices() {
        match (quote, c) {
            (Some(_), '\\') if !escaped => {
                escaped = true;
                continue;
            }
            (Some(q), c) if c == q && !escaped => quote = None,
            (None, '\'' | '"') => quote = Some(c),
            (None, ';') => {
                out.push(&source[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        escaped = false;
    }
    out.push(&source[start..]);
    out.into_iter().map(str::trim).filter(|s| !s.is_empty()).collect()
}

fn is_path(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with(|c: char| c.is_ascii_digit() || c == '.')
        && !s.ends_with('.')
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.'))
}

/// `path = expr` with a single `=` outside string literals
fn split_assignment(statement: &str) -> Option<(&str, &str)> {
    let bytes = statement.as_bytes();
    let mut quote = None;
    for (i, &b) in bytes.iter().enumerate() {
        match (quote, b) {
            (Some(q), b) if b == q => quote = None,
            (None, b'\'' | b'"') => quote = Some(b),
            (None, b'=') => {
                let prev = i.checked_sub(1).map(|p| bytes[p]);
                let next = bytes.get(i + 1).copied();
                if next == Some(b'=') || matches!(prev, Some(b'=' | b'!' | b'<' | b'>')) {
                    return None;
                }
                let path = statement[..i].trim();
                return is_path(path).then(|| (path, &statement[i + 1..]));
            }
            _ => {}
        }
    }
    None
}

fn tokenize(source: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            let _ = chars.next();
        } else if c.is_ascii_digit() {
            let mut number = String::new();
            while let Some(&d) = chars.peek() {
                if !(d.is_ascii_digit() || d == '.') {
                    break;
                }
                number.push(d);
                let _ = chars.next();
            }
            let value = number
                .parse()
                .map_err(|_| format!("SyntaxError: bad number {number}"))?;
            tokens.push(Token::Num(value));
        } else if c == '\'' || c == '"' {
            let _ = chars.next();
            let mut text = String::new();
            loop {
                match chars.next() {
                    None => return Err("SyntaxError: unterminated string".to_string()),
                    Some('\\') => text.extend(chars.next()),
                    Some(q) if q == c => break,
                    Some(other) => text.push(other),
                }
            }
            tokens.push(Token::Str(text));
        } else if c.is_ascii_alphabetic() || c == '_' || c == '$' {
            let mut ident = String::new();
            while let Some(&d) = chars.peek() {
                if !(d.is_ascii_alphanumeric() || matches!(d, '_' | '$' | '.')) {
                    break;
                }
                ident.push(d);
                let _ = chars.next();
            }
            tokens.push(Token::Ident(ident));
        } else if "+-*/(),".contains(c) {
            tokens.push(Token::Op(c));
            let _ = chars.next();
        } else {
            return Err(format!("SyntaxError: unexpected character '{c}'"));
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek_op(&self) -> Option<char> {
        match self.tokens.get(self.pos) {
            Some(Token::Op(c)) => Some(*c),
            _ => None,
        }
    }

    fn expect_op(&mut self, op: char) -> Result<(), String> {
        if self.peek_op() == Some(op) {
            self.pos += 1;
            Ok(())
        } else {
            Err(format!("SyntaxError: expected '{op}'"))
        }
    }

    fn expression(&mut self) -> Result<Expr, String> {
        let mut lhs = self.term()?;
        while let Some(op @ ('+' | '-')) = self.peek_op() {
            self.pos += 1;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(self.term()?));
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, String> {
        let mut lhs = self.unary()?;
        while let Some(op @ ('*' | '/')) = self.peek_op() {
            self.pos += 1;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(self.unary()?));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, String> {
        if self.peek_op() == Some('-') {
            self.pos += 1;
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, String> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| "SyntaxError: unexpected end of input".to_string())?;
        self.pos += 1;
        match token {
            Token::Num(n) => Ok(Expr::Lit(Value::Number(n))),
            Token::Str(s) => Ok(Expr::Lit(Value::Str(s))),
            Token::Op('(') => {
                let inner = self.expression()?;
                self.expect_op(')')?;
                Ok(inner)
            }
            Token::Op(c) => Err(format!("SyntaxError: unexpected '{c}'")),
            Token::Ident(name) => {
                if self.peek_op() == Some('(') {
                    self.pos += 1;
                    let mut args = Vec::new();
                    if self.peek_op() != Some(')') {
                        loop {
                            args.push(self.expression()?);
                            if self.peek_op() != Some(',') {
                                break;
                            }
                            self.pos += 1;
                        }
                    }
                    self.expect_op(')')?;
                    return Ok(Expr::Call(name, args));
                }
                Ok(match name.as_str() {
                    "undefined" => Expr::Lit(Value::Undefined),
                    "null" => Expr::Lit(Value::Null),
                    "true" => Expr::Lit(Value::Bool(true)),
                    "false" => Expr::Lit(Value::Bool(false)),
                    _ => Expr::Path(name),
                })
            }
        }
    }
}
