//! Chunk-resumable JSON parser.
//!
//! The parser is an explicit state machine: no recursion, no lookahead
//! beyond the current character, and every piece of in-flight scanning
//! state (string escapes, number shape, literal progress) lives in
//! [`ParserState`]. That is what lets a chunk boundary fall on any byte,
//! including between the two halves of a `\uXXXX` surrogate pair.

use crate::error::ParserError;
use crate::node::{Node, NodeId, NodeKind, number_to_json};
use serde_json::Value;
use tracing::trace;

/// What the parser expects next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// A value (document root, or after `:` / `,` inside an array).
    Value,
    /// First array slot: a value or an immediate `]`.
    ElementOrEnd,
    /// Array slot after a comma: a value only.
    Element,
    /// First object slot: a key or an immediate `}`.
    KeyOrEnd,
    /// Object slot after a comma: a key only.
    Key,
    /// `:` after an object key.
    Colon,
    /// `,` or the closing bracket of the innermost container.
    CommaOrEnd,
    /// Inside a string (value or key).
    InString,
    /// Inside a number.
    InNumber,
    /// Inside `true`, `false` or `null`.
    InLiteral,
    /// Root value closed; only trailing whitespace is allowed.
    Done,
}

/// Escape progress inside a string.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
enum Escape {
    /// Not inside an escape.
    #[default]
    None,
    /// Saw `\`, selector pending.
    Started,
    /// Saw `\u`, collecting up to four hex digits.
    Unicode(String),
    /// A high surrogate was decoded; the next character must be `\`.
    SurrogateBackslash,
    /// ...followed by `u`, then four more hex digits.
    SurrogateU,
}

/// In-flight string scanning state.
#[derive(Debug, Clone, Default)]
struct StringScan {
    /// True when scanning an object key rather than a value.
    key: bool,
    /// Decoded key characters. Value characters go straight to the node.
    key_buf: String,
    escape: Escape,
    /// Decoded high surrogate waiting for its low half.
    high_surrogate: Option<u16>,
}

/// Where we are in the number grammar `-?(0|[1-9][0-9]*)(\.[0-9]+)?([eE][+-]?[0-9]+)?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumberScan {
    Sign,
    Zero,
    Int,
    Dot,
    Frac,
    ExpMark,
    ExpSign,
    Exp,
}

impl NumberScan {
    /// Whether the digits seen so far form a complete number.
    fn is_terminal(self) -> bool {
        matches!(
            self,
            NumberScan::Zero | NumberScan::Int | NumberScan::Frac | NumberScan::Exp
        )
    }

    /// Consume one more character, or report that the number ends here.
    fn step(self, c: char) -> Option<NumberScan> {
        match (self, c) {
            (NumberScan::Sign, '0') => Some(NumberScan::Zero),
            (NumberScan::Sign, '1'..='9') => Some(NumberScan::Int),
            (NumberScan::Zero, '.') => Some(NumberScan::Dot),
            (NumberScan::Zero, 'e' | 'E') => Some(NumberScan::ExpMark),
            (NumberScan::Int, '0'..='9') => Some(NumberScan::Int),
            (NumberScan::Int, '.') => Some(NumberScan::Dot),
            (NumberScan::Int, 'e' | 'E') => Some(NumberScan::ExpMark),
            (NumberScan::Dot, '0'..='9') => Some(NumberScan::Frac),
            (NumberScan::Frac, '0'..='9') => Some(NumberScan::Frac),
            (NumberScan::Frac, 'e' | 'E') => Some(NumberScan::ExpMark),
            (NumberScan::ExpMark, '+' | '-') => Some(NumberScan::ExpSign),
            (NumberScan::ExpMark, '0'..='9') => Some(NumberScan::Exp),
            (NumberScan::ExpSign, '0'..='9') => Some(NumberScan::Exp),
            (NumberScan::Exp, '0'..='9') => Some(NumberScan::Exp),
            _ => None,
        }
    }
}

/// Progress through `true`, `false` or `null`.
#[derive(Debug, Clone)]
struct LiteralScan {
    expect: &'static str,
    matched: usize,
}

/// Outcome of feeding one character to the state machine.
enum Step {
    /// The character was consumed.
    Consumed,
    /// The character ended the previous token; run it again in the new mode.
    Again,
}

/// Incremental parser state for one JSON document.
///
/// Create with [`ParserState::new`], feed text with [`parse_chunk`] or
/// [`update_source`], and seal with [`finalize`]. Errors are sticky.
///
/// [`parse_chunk`]: ParserState::parse_chunk
/// [`update_source`]: ParserState::update_source
/// [`finalize`]: ParserState::finalize
#[derive(Debug, Clone)]
pub struct ParserState {
    nodes: Vec<Node>,
    root: Option<NodeId>,
    /// Open containers, innermost last.
    stack: Vec<NodeId>,
    mode: Mode,
    /// The open scalar node while in a string/number/literal mode.
    current: Option<NodeId>,
    /// Completed object key waiting for its value.
    pending_key: Option<String>,
    string: StringScan,
    number: NumberScan,
    literal: LiteralScan,
    error: Option<ParserError>,
    complete: bool,
    /// Everything fed so far, verbatim.
    consumed: String,
    /// Byte offset of the character being processed.
    offset: usize,
    line: u32,
    column: u32,
    /// Bumped whenever anything observable changes.
    version: u64,
}

impl Default for ParserState {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserState {
    /// An empty, error-free, incomplete parser.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
            stack: Vec::new(),
            mode: Mode::Value,
            current: None,
            pending_key: None,
            string: StringScan::default(),
            number: NumberScan::Sign,
            literal: LiteralScan {
                expect: "",
                matched: 0,
            },
            error: None,
            complete: false,
            consumed: String::new(),
            offset: 0,
            line: 0,
            column: 0,
            version: 0,
        }
    }

    /// Root node id, once the first character of the root value has
    /// arrived.
    #[inline]
    pub fn root_id(&self) -> Option<NodeId> {
        self.root
    }

    /// Access a node by id. Ids are only ever handed out by this state,
    /// so the lookup is infallible.
    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// The sticky error, if one occurred.
    #[inline]
    pub fn error(&self) -> Option<&ParserError> {
        self.error.as_ref()
    }

    /// Whether the root value has closed with no containers left open.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Counter that changes exactly when something observable changed.
    /// Compare across calls to detect no-op chunks.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// All text fed so far, verbatim.
    #[inline]
    pub fn source(&self) -> &str {
        &self.consumed
    }

    /// Current line (zero-based) of the next character.
    #[inline]
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Current column (zero-based, in characters) of the next character.
    #[inline]
    pub fn column(&self) -> u32 {
        self.column
    }

    /// Feed the next fragment of the document.
    ///
    /// Fragments concatenate: `parse_chunk("[1,")` then `parse_chunk("2]")`
    /// parses `[1,2]`. After an error this is a no-op.
    pub fn parse_chunk(&mut self, text: &str) {
        if self.error.is_some() {
            return;
        }
        self.consumed.push_str(text);
        for c in text.chars() {
            loop {
                if self.error.is_some() {
                    return;
                }
                match self.step(c) {
                    Step::Consumed => break,
                    Step::Again => continue,
                }
            }
            if self.error.is_some() {
                return;
            }
            self.offset += c.len_utf8();
            if c == '\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
    }

    /// Feed the full document text as known so far.
    ///
    /// When `text` extends what has already been consumed, only the new
    /// suffix is parsed. Otherwise the bound source was replaced, so all
    /// state is discarded and `text` is parsed as a fresh document. The
    /// version counter survives the rebuild: a replacement is always an
    /// observable change, so it never lands back on an old version.
    pub fn update_source(&mut self, text: &str) {
        if text.len() >= self.consumed.len() && text.starts_with(self.consumed.as_str()) {
            let split = self.consumed.len();
            self.parse_chunk(&text[split..]);
        } else {
            trace!("source replaced, reparsing from scratch");
            let version = self.version;
            *self = ParserState::new();
            self.version = version + 1;
            self.parse_chunk(text);
        }
    }

    /// Declare end of input.
    ///
    /// A trailing open string or syntactically complete number is closed
    /// in place. Anything else still open (containers, literals, numbers
    /// ending in `-` or `.`, dangling escapes) is an error.
    pub fn finalize(&mut self) {
        if self.error.is_some() {
            return;
        }
        match self.mode {
            Mode::Done => {}
            Mode::InString => {
                if self.string.escape != Escape::None || self.string.high_surrogate.is_some() {
                    self.fail_unexpected_end();
                } else if self.string.key {
                    // The enclosing object is necessarily still open.
                    self.fail_unexpected_end();
                } else {
                    self.close_current_string();
                    if !self.stack.is_empty() {
                        self.fail_unexpected_end();
                    }
                }
            }
            Mode::InNumber => {
                if self.number.is_terminal() {
                    self.close_current_number();
                    if !self.stack.is_empty() {
                        self.fail_unexpected_end();
                    }
                } else {
                    self.fail_syntax("incomplete number");
                }
            }
            _ => self.fail_unexpected_end(),
        }
    }

    /// Best-effort value of the document root.
    ///
    /// Open strings contribute their characters so far; open numbers and
    /// literals contribute nothing yet. `None` while no root exists or
    /// after an error.
    pub fn resolved_value(&self) -> Option<Value> {
        if self.error.is_some() {
            return None;
        }
        self.root.and_then(|id| self.node_value(id))
    }

    /// Best-effort value of an arbitrary node, with the same rules as
    /// [`resolved_value`](ParserState::resolved_value).
    pub fn node_value(&self, id: NodeId) -> Option<Value> {
        let node = self.node(id);
        match &node.kind {
            NodeKind::String { buf } => Some(Value::String(buf.clone())),
            NodeKind::Number { value, .. } => value.and_then(number_to_json),
            NodeKind::Boolean { value } => node.closed.then_some(Value::Bool(*value)),
            NodeKind::Null => node.closed.then_some(Value::Null),
            NodeKind::Object { keys, children } => {
                let mut map = serde_json::Map::new();
                for (key, child) in keys.iter().zip(children) {
                    if let Some(value) = self.node_value(*child) {
                        map.insert(key.clone(), value);
                    }
                }
                Some(Value::Object(map))
            }
            NodeKind::Array { children } => Some(Value::Array(
                children.iter().filter_map(|c| self.node_value(*c)).collect(),
            )),
        }
    }

    // ---- state machine ----------------------------------------------------

    fn step(&mut self, c: char) -> Step {
        match self.mode {
            Mode::Value | Mode::Element | Mode::ElementOrEnd => self.step_value(c),
            Mode::KeyOrEnd => self.step_key(c, true),
            Mode::Key => self.step_key(c, false),
            Mode::Colon => self.step_colon(c),
            Mode::CommaOrEnd => self.step_comma_or_end(c),
            Mode::InString => self.step_string(c),
            Mode::InNumber => self.step_number(c),
            Mode::InLiteral => self.step_literal(c),
            Mode::Done => self.step_done(c),
        }
    }

    fn step_value(&mut self, c: char) -> Step {
        if is_whitespace(c) {
            return Step::Consumed;
        }
        match c {
            '{' => {
                let id = self.open_node(NodeKind::Object {
                    keys: Vec::new(),
                    children: Vec::new(),
                });
                self.stack.push(id);
                self.mode = Mode::KeyOrEnd;
            }
            '[' => {
                let id = self.open_node(NodeKind::Array {
                    children: Vec::new(),
                });
                self.stack.push(id);
                self.mode = Mode::ElementOrEnd;
            }
            '"' => {
                let id = self.open_node(NodeKind::String { buf: String::new() });
                self.current = Some(id);
                self.string = StringScan::default();
                self.mode = Mode::InString;
            }
            '-' | '0'..='9' => {
                let id = self.open_node(NodeKind::Number {
                    raw: c.to_string(),
                    value: None,
                });
                self.current = Some(id);
                self.number = match c {
                    '-' => NumberScan::Sign,
                    '0' => NumberScan::Zero,
                    _ => NumberScan::Int,
                };
                self.mode = Mode::InNumber;
            }
            't' | 'f' | 'n' => {
                let (expect, kind) = match c {
                    't' => ("true", NodeKind::Boolean { value: true }),
                    'f' => ("false", NodeKind::Boolean { value: false }),
                    _ => ("null", NodeKind::Null),
                };
                let id = self.open_node(kind);
                self.current = Some(id);
                self.literal = LiteralScan { expect, matched: 1 };
                self.mode = Mode::InLiteral;
            }
            ']' if self.mode == Mode::ElementOrEnd => self.close_container(),
            _ => self.fail_syntax(format!("expected a value, found {:?}", c)),
        }
        Step::Consumed
    }

    fn step_key(&mut self, c: char, allow_end: bool) -> Step {
        if is_whitespace(c) {
            return Step::Consumed;
        }
        match c {
            '"' => {
                self.string = StringScan {
                    key: true,
                    ..StringScan::default()
                };
                self.mode = Mode::InString;
            }
            '}' if allow_end => self.close_container(),
            _ if allow_end => self.fail_syntax(format!("expected a key or '}}', found {:?}", c)),
            _ => self.fail_syntax(format!("expected a key, found {:?}", c)),
        }
        Step::Consumed
    }

    fn step_colon(&mut self, c: char) -> Step {
        if is_whitespace(c) {
            return Step::Consumed;
        }
        if c == ':' {
            self.mode = Mode::Value;
        } else {
            self.fail_syntax(format!("expected ':', found {:?}", c));
        }
        Step::Consumed
    }

    fn step_comma_or_end(&mut self, c: char) -> Step {
        if is_whitespace(c) {
            return Step::Consumed;
        }
        // CommaOrEnd only exists inside a container.
        let in_object = self
            .stack
            .last()
            .map(|id| matches!(self.node(*id).kind, NodeKind::Object { .. }))
            .unwrap_or(false);
        match c {
            ',' => self.mode = if in_object { Mode::Key } else { Mode::Element },
            '}' if in_object => self.close_container(),
            ']' if !in_object => self.close_container(),
            _ => {
                let end = if in_object { '}' } else { ']' };
                self.fail_syntax(format!("expected ',' or {:?}, found {:?}", end, c));
            }
        }
        Step::Consumed
    }

    fn step_string(&mut self, c: char) -> Step {
        match std::mem::take(&mut self.string.escape) {
            Escape::None => match c {
                '"' => self.end_string(),
                '\\' => self.string.escape = Escape::Started,
                _ if (c as u32) < 0x20 => {
                    self.fail_syntax(format!("control character {:?} in string", c))
                }
                _ => self.push_string_char(c),
            },
            Escape::Started => match c {
                '"' => self.push_string_char('"'),
                '\\' => self.push_string_char('\\'),
                '/' => self.push_string_char('/'),
                'b' => self.push_string_char('\u{8}'),
                'f' => self.push_string_char('\u{c}'),
                'n' => self.push_string_char('\n'),
                'r' => self.push_string_char('\r'),
                't' => self.push_string_char('\t'),
                'u' => self.string.escape = Escape::Unicode(String::new()),
                _ => self.fail_syntax(format!("invalid escape character {:?}", c)),
            },
            Escape::Unicode(mut digits) => {
                if !c.is_ascii_hexdigit() {
                    self.fail_syntax(format!("invalid hex digit {:?} in unicode escape", c));
                    return Step::Consumed;
                }
                digits.push(c);
                if digits.len() < 4 {
                    self.string.escape = Escape::Unicode(digits);
                } else {
                    self.finish_unicode_escape(&digits);
                }
            }
            Escape::SurrogateBackslash => {
                if c == '\\' {
                    self.string.escape = Escape::SurrogateU;
                } else {
                    self.fail_syntax("unpaired surrogate in unicode escape");
                }
            }
            Escape::SurrogateU => {
                if c == 'u' {
                    self.string.escape = Escape::Unicode(String::new());
                } else {
                    self.fail_syntax("unpaired surrogate in unicode escape");
                }
            }
        }
        Step::Consumed
    }

    fn finish_unicode_escape(&mut self, digits: &str) {
        // Four hex digits always parse.
        let code = u16::from_str_radix(digits, 16).unwrap_or(0);
        if let Some(high) = self.string.high_surrogate.take() {
            if (0xDC00..=0xDFFF).contains(&code) {
                let combined =
                    0x10000 + (((high as u32) - 0xD800) << 10) + ((code as u32) - 0xDC00);
                match char::from_u32(combined) {
                    Some(c) => self.push_string_char(c),
                    None => self.fail_syntax("invalid unicode escape"),
                }
            } else {
                self.fail_syntax("unpaired surrogate in unicode escape");
            }
        } else if (0xD800..=0xDBFF).contains(&code) {
            self.string.high_surrogate = Some(code);
            self.string.escape = Escape::SurrogateBackslash;
        } else if (0xDC00..=0xDFFF).contains(&code) {
            self.fail_syntax("unpaired surrogate in unicode escape");
        } else {
            match char::from_u32(code as u32) {
                Some(c) => self.push_string_char(c),
                None => self.fail_syntax("invalid unicode escape"),
            }
        }
    }

    fn push_string_char(&mut self, c: char) {
        if self.string.key {
            self.string.key_buf.push(c);
        } else if let Some(id) = self.current {
            if let NodeKind::String { buf } = &mut self.nodes[id.index()].kind {
                buf.push(c);
            }
            self.touch(id);
        }
    }

    fn end_string(&mut self) {
        if self.string.key {
            self.pending_key = Some(std::mem::take(&mut self.string.key_buf));
            self.string.key = false;
            self.mode = Mode::Colon;
        } else {
            self.close_current_string();
        }
    }

    fn close_current_string(&mut self) {
        if let Some(id) = self.current.take() {
            self.nodes[id.index()].closed = true;
            self.touch(id);
            trace!("closed string node {:?}", id);
            self.after_value();
        }
    }

    fn step_number(&mut self, c: char) -> Step {
        if let Some(next) = self.number.step(c) {
            self.number = next;
            if let Some(id) = self.current {
                if let NodeKind::Number { raw, .. } = &mut self.nodes[id.index()].kind {
                    raw.push(c);
                }
                self.touch(id);
            }
            return Step::Consumed;
        }
        // The number ends before this character.
        if self.number.is_terminal() {
            self.close_current_number();
            Step::Again
        } else {
            self.fail_syntax("incomplete number");
            Step::Consumed
        }
    }

    fn close_current_number(&mut self) {
        if let Some(id) = self.current.take() {
            let node = &mut self.nodes[id.index()];
            if let NodeKind::Number { raw, value } = &mut node.kind {
                *value = raw.parse().ok();
            }
            node.closed = true;
            self.touch(id);
            trace!("closed number node {:?}", id);
            self.after_value();
        }
    }

    fn step_literal(&mut self, c: char) -> Step {
        let expected = self.literal.expect.as_bytes()[self.literal.matched] as char;
        if c != expected {
            let expect = self.literal.expect;
            self.fail_syntax(format!("expected {:?}, found {:?}", expect, c));
            return Step::Consumed;
        }
        self.literal.matched += 1;
        if let Some(id) = self.current {
            self.touch(id);
        }
        if self.literal.matched == self.literal.expect.len() {
            if let Some(id) = self.current.take() {
                self.nodes[id.index()].closed = true;
                self.touch(id);
                trace!("closed literal node {:?}", id);
                self.after_value();
            }
        }
        Step::Consumed
    }

    fn step_done(&mut self, c: char) -> Step {
        if !is_whitespace(c) {
            self.fail_syntax(format!("unexpected trailing content {:?}", c));
        }
        Step::Consumed
    }

    // ---- node bookkeeping -------------------------------------------------

    fn open_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        let parent = self.stack.last().copied();
        self.nodes.push(Node {
            id,
            parent,
            closed: false,
            version: 0,
            kind,
        });
        if let Some(parent_id) = parent {
            let key = self.pending_key.take();
            match &mut self.nodes[parent_id.index()].kind {
                NodeKind::Object { keys, children } => {
                    if let Some(key) = key {
                        keys.push(key);
                    }
                    children.push(id);
                }
                NodeKind::Array { children } => children.push(id),
                _ => {}
            }
        } else {
            self.root = Some(id);
        }
        self.touch(id);
        trace!("opened node {:?} (parent {:?})", id, parent);
        id
    }

    fn close_container(&mut self) {
        if let Some(id) = self.stack.pop() {
            self.nodes[id.index()].closed = true;
            self.touch(id);
            trace!("closed container node {:?}", id);
            self.after_value();
        }
    }

    /// A value just closed; decide what comes next.
    fn after_value(&mut self) {
        if self.stack.is_empty() {
            self.mode = Mode::Done;
            self.complete = true;
            self.version += 1;
        } else {
            self.mode = Mode::CommaOrEnd;
        }
    }

    /// Bump the version of `id` and every ancestor, plus the state's own
    /// observable version.
    fn touch(&mut self, id: NodeId) {
        let mut cursor = Some(id);
        while let Some(id) = cursor {
            let node = &mut self.nodes[id.index()];
            node.version += 1;
            cursor = node.parent;
        }
        self.version += 1;
    }

    fn fail_syntax(&mut self, message: impl Into<String>) {
        let message = message.into();
        trace!("syntax error at {}: {}", self.offset, message);
        self.error = Some(ParserError::Syntax {
            offset: self.offset,
            message,
        });
        self.version += 1;
    }

    fn fail_unexpected_end(&mut self) {
        trace!("unexpected end of input at {}", self.offset);
        self.error = Some(ParserError::UnexpectedEnd {
            offset: self.offset,
        });
        self.version += 1;
    }
}

#[inline]
fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}
