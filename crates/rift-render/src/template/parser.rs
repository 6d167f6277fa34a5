//! Handlebars-style template parser.
//!
//! Supported syntax: `{{path}}`, `{{{raw}}}`, helper calls with positional
//! and `key=value` arguments, `(sub expressions)`, `{{#block}}...{{else}}...{{/block}}`,
//! comments, and `~` whitespace control. Path segments are separated by `.`
//! or `/`; `[...]` quotes a segment containing any other characters.

use super::value::Value;
use crate::error::TemplateError;

/// Block helpers implemented by the renderer itself.
pub const BUILTIN_BLOCKS: [&str; 4] = ["if", "unless", "each", "with"];

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Expression { expr: Expr, escape: bool },
    Block(Box<Block>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub name: String,
    pub params: Vec<Expr>,
    pub hash: Vec<(String, Expr)>,
    pub body: Vec<Node>,
    pub inverse: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Path(PathExpr),
    Helper {
        name: String,
        params: Vec<Expr>,
        hash: Vec<(String, Expr)>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathRoot {
    /// Resolve the first segment through the scope chain.
    Lookup,
    /// `this` / `.`: the innermost block context.
    This,
    /// `@index`, `@key`, ...: block iteration data.
    Data,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathExpr {
    pub root: PathRoot,
    pub segments: Vec<String>,
}

/// Parse `source` into nodes. `is_helper` tells registered helper names apart
/// from context lookups.
pub fn parse(source: &str, is_helper: &dyn Fn(&str) -> bool) -> Result<Vec<Node>, TemplateError> {
    let mut parser = Parser {
        source,
        pos: 0,
        trim_next: false,
        is_helper,
    };
    let (nodes, _) = parser.parse_sequence(None)?;
    Ok(nodes)
}

struct Parser<'a> {
    source: &'a str,
    pos: usize,
    trim_next: bool,
    is_helper: &'a dyn Fn(&str) -> bool,
}

enum Tag<'a> {
    Comment,
    Raw(&'a str),
    Escaped(&'a str),
}

impl<'a> Parser<'a> {
    fn error(&self, offset: usize, message: impl Into<String>) -> TemplateError {
        TemplateError::at(self.source, offset, message)
    }

    /// Parse until end of input, or until `{{/name}}` when inside a block.
    /// Returns the body and the `{{else}}` branch.
    fn parse_sequence(
        &mut self,
        open: Option<(&str, usize)>,
    ) -> Result<(Vec<Node>, Vec<Node>), TemplateError> {
        let mut current: Vec<Node> = Vec::new();
        let mut body: Option<Vec<Node>> = None;

        loop {
            let start = match self.source[self.pos..].find("{{") {
                Some(rel) => self.pos + rel,
                None => {
                    self.push_text(&mut current, self.pos, self.source.len());
                    self.pos = self.source.len();
                    if let Some((name, offset)) = open {
                        return Err(self.error(offset, format!("unclosed block '{{{{#{name}}}}}'")));
                    }
                    return Ok((current, Vec::new()));
                }
            };
            self.push_text(&mut current, self.pos, start);

            let (tag, end) = self.read_tag(start)?;
            self.pos = end;

            let content = match tag {
                Tag::Comment => continue,
                Tag::Raw(inner) => {
                    let inner = self.whitespace_control(&mut current, inner);
                    let expr = self.parse_expression(inner, start + 3)?;
                    current.push(Node::Expression { expr, escape: false });
                    continue;
                }
                Tag::Escaped(inner) => self.whitespace_control(&mut current, inner),
            };
            let content_offset = start + 2;

            if let Some(rest) = content.strip_prefix('#') {
                let block = self.parse_block(rest.trim(), start, content_offset + 1)?;
                current.push(Node::Block(Box::new(block)));
            } else if let Some(rest) = content.strip_prefix('/') {
                let name = rest.trim();
                return match open {
                    Some((expected, _)) if expected == name => match body.take() {
                        Some(body) => Ok((body, current)),
                        None => Ok((current, Vec::new())),
                    },
                    Some((expected, _)) => Err(self.error(
                        start,
                        format!("'{{{{/{name}}}}}' does not close '{{{{#{expected}}}}}'"),
                    )),
                    None => Err(self.error(start, format!("unexpected '{{{{/{name}}}}}'"))),
                };
            } else if content == "else" || content == "^" {
                if open.is_none() || body.is_some() {
                    return Err(self.error(start, "unexpected '{{else}}'"));
                }
                body = Some(std::mem::take(&mut current));
            } else if content.starts_with('>') {
                return Err(self.error(start, "partials are not supported"));
            } else if content.is_empty() {
                return Err(self.error(start, "empty expression"));
            } else {
                let expr = self.parse_expression(content, content_offset)?;
                current.push(Node::Expression { expr, escape: true });
            }
        }
    }

    fn push_text(&mut self, nodes: &mut Vec<Node>, from: usize, to: usize) {
        let mut text = &self.source[from..to];
        if self.trim_next {
            text = text.trim_start();
            self.trim_next = false;
        }
        if !text.is_empty() {
            nodes.push(Node::Text(text.to_string()));
        }
    }

    /// Apply `{{~` / `~}}` markers and return the trimmed tag content.
    fn whitespace_control<'s>(&mut self, nodes: &mut Vec<Node>, inner: &'s str) -> &'s str {
        let mut content = inner;
        if let Some(rest) = content.strip_prefix('~') {
            if let Some(Node::Text(text)) = nodes.last_mut() {
                let trimmed_len = text.trim_end().len();
                text.truncate(trimmed_len);
                if text.is_empty() {
                    nodes.pop();
                }
            }
            content = rest;
        }
        if let Some(rest) = content.strip_suffix('~') {
            self.trim_next = true;
            content = rest;
        }
        content.trim()
    }

    fn read_tag(&self, start: usize) -> Result<(Tag<'a>, usize), TemplateError> {
        let rest = &self.source[start..];
        if rest.starts_with("{{!--") {
            let end = rest
                .find("--}}")
                .ok_or_else(|| self.error(start, "unclosed comment"))?;
            return Ok((Tag::Comment, start + end + 4));
        }
        if rest.starts_with("{{!") {
            let end = rest
                .find("}}")
                .ok_or_else(|| self.error(start, "unclosed comment"))?;
            return Ok((Tag::Comment, start + end + 2));
        }
        if rest.starts_with("{{{") {
            let inner_start = start + 3;
            let close = self
                .find_close(inner_start, "}}}")
                .ok_or_else(|| self.error(start, "unclosed '{{{'"))?;
            return Ok((Tag::Raw(&self.source[inner_start..close]), close + 3));
        }
        let inner_start = start + 2;
        let close = self
            .find_close(inner_start, "}}")
            .ok_or_else(|| self.error(start, "unclosed '{{'"))?;
        Ok((Tag::Escaped(&self.source[inner_start..close]), close + 2))
    }

    /// Find `delimiter`, skipping over quoted string literals. Works on bytes;
    /// `delimiter` is ASCII so a match always lands on a char boundary.
    fn find_close(&self, from: usize, delimiter: &str) -> Option<usize> {
        let bytes = self.source.as_bytes();
        let delimiter = delimiter.as_bytes();
        let mut i = from;
        let mut quote: Option<u8> = None;
        while i < bytes.len() {
            let b = bytes[i];
            match quote {
                Some(q) => {
                    if b == b'\\' {
                        i += 1;
                    } else if b == q {
                        quote = None;
                    }
                }
                None => {
                    if b == b'\'' || b == b'"' {
                        quote = Some(b);
                    } else if bytes[i..].starts_with(delimiter) {
                        return Some(i);
                    }
                }
            }
            i += 1;
        }
        None
    }

    fn parse_block(
        &mut self,
        content: &str,
        tag_start: usize,
        content_offset: usize,
    ) -> Result<Block, TemplateError> {
        let mut lexer = Lexer::new(self.source, content, content_offset);
        let name = match lexer.next_token()? {
            Some(Token::Word(word, _)) if is_identifier(&word) => word,
            _ => return Err(self.error(tag_start, "block is missing a helper name")),
        };
        if !BUILTIN_BLOCKS.contains(&name.as_str()) && !(self.is_helper)(&name) {
            return Err(self.error(tag_start, format!("unknown block helper '{name}'")));
        }
        let (params, hash) = self.parse_arguments(&mut lexer, false)?;
        if BUILTIN_BLOCKS.contains(&name.as_str()) && params.is_empty() {
            return Err(self.error(tag_start, format!("'{{{{#{name}}}}}' requires a parameter")));
        }

        let (body, inverse) = self.parse_sequence(Some((&name, tag_start)))?;
        Ok(Block {
            name,
            params,
            hash,
            body,
            inverse,
        })
    }

    fn parse_expression(&self, content: &str, offset: usize) -> Result<Expr, TemplateError> {
        let mut lexer = Lexer::new(self.source, content, offset);
        let expr = self.parse_call(&mut lexer, false)?;
        Ok(expr)
    }

    /// Parse `head args...` up to end of input, or to `)` for sub-expressions.
    fn parse_call(&self, lexer: &mut Lexer<'_>, nested: bool) -> Result<Expr, TemplateError> {
        let head_offset = lexer.offset();
        let head = match lexer.next_token()? {
            Some(token) => token,
            None => return Err(self.error(head_offset, "empty expression")),
        };

        match head {
            Token::Word(word, offset) => {
                if is_identifier(&word) && (self.is_helper)(&word) {
                    let (params, hash) = self.parse_arguments(lexer, nested)?;
                    return Ok(Expr::Helper {
                        name: word,
                        params,
                        hash,
                    });
                }
                let expr = word_to_expr(&word).map_err(|msg| self.error(offset, msg))?;
                let (params, hash) = self.parse_arguments(lexer, nested)?;
                if !params.is_empty() || !hash.is_empty() {
                    return Err(self.error(offset, format!("unknown helper '{word}'")));
                }
                Ok(expr)
            }
            Token::Str(s) => {
                let (params, hash) = self.parse_arguments(lexer, nested)?;
                if !params.is_empty() || !hash.is_empty() {
                    return Err(self.error(head_offset, "a literal cannot take arguments"));
                }
                Ok(Expr::Literal(Value::String(s)))
            }
            Token::OpenParen => Err(self.error(head_offset, "unexpected '('")),
            Token::CloseParen => Err(self.error(head_offset, "unexpected ')'")),
            Token::HashKey(key) => Err(self.error(head_offset, format!("unexpected '{key}='"))),
        }
    }

    #[allow(clippy::type_complexity)]
    fn parse_arguments(
        &self,
        lexer: &mut Lexer<'_>,
        nested: bool,
    ) -> Result<(Vec<Expr>, Vec<(String, Expr)>), TemplateError> {
        let mut params = Vec::new();
        let mut hash = Vec::new();
        loop {
            let offset = lexer.offset();
            match lexer.next_token()? {
                None => {
                    if nested {
                        return Err(self.error(offset, "unclosed '('"));
                    }
                    return Ok((params, hash));
                }
                Some(Token::CloseParen) => {
                    if nested {
                        return Ok((params, hash));
                    }
                    return Err(self.error(offset, "unexpected ')'"));
                }
                Some(Token::HashKey(key)) => {
                    let value_offset = lexer.offset();
                    let value = self.parse_argument(lexer)?.ok_or_else(|| {
                        self.error(value_offset, format!("missing value for '{key}'"))
                    })?;
                    hash.push((key, value));
                }
                Some(token) => {
                    if !hash.is_empty() {
                        return Err(
                            self.error(offset, "positional arguments must precede key=value")
                        );
                    }
                    params.push(self.token_to_argument(lexer, token, offset)?);
                }
            }
        }
    }

    fn parse_argument(&self, lexer: &mut Lexer<'_>) -> Result<Option<Expr>, TemplateError> {
        let offset = lexer.offset();
        match lexer.next_token()? {
            None => Ok(None),
            Some(token) => self.token_to_argument(lexer, token, offset).map(Some),
        }
    }

    fn token_to_argument(
        &self,
        lexer: &mut Lexer<'_>,
        token: Token,
        offset: usize,
    ) -> Result<Expr, TemplateError> {
        match token {
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::Word(word, offset) => word_to_expr(&word).map_err(|msg| self.error(offset, msg)),
            Token::OpenParen => {
                let expr = self.parse_call(lexer, true)?;
                match &expr {
                    Expr::Helper { .. } => Ok(expr),
                    _ => Err(self.error(offset, "sub-expression must call a helper")),
                }
            }
            Token::CloseParen => Err(self.error(offset, "unexpected ')'")),
            Token::HashKey(key) => Err(self.error(offset, format!("unexpected '{key}='"))),
        }
    }
}

fn is_identifier(word: &str) -> bool {
    !word.is_empty()
        && !word.contains(['.', '/', '[', ']'])
        && !word.starts_with('@')
        && word.parse::<f64>().is_err()
}

/// Turn a bare word into a literal or a path.
fn word_to_expr(word: &str) -> Result<Expr, String> {
    match word {
        "true" => return Ok(Expr::Literal(Value::Bool(true))),
        "false" => return Ok(Expr::Literal(Value::Bool(false))),
        "null" | "undefined" => return Ok(Expr::Literal(Value::Null)),
        _ => {}
    }
    if looks_numeric(word) {
        if let Ok(i) = word.parse::<i64>() {
            return Ok(Expr::Literal(Value::Int(i)));
        }
        if let Ok(f) = word.parse::<f64>() {
            return Ok(Expr::Literal(Value::Float(f)));
        }
    }
    parse_path(word).map(Expr::Path)
}

fn looks_numeric(word: &str) -> bool {
    let digits = word.strip_prefix('-').unwrap_or(word);
    !digits.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.chars().next().is_some_and(|c| c.is_ascii_digit())
}

fn parse_path(word: &str) -> Result<PathExpr, String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = word.chars().peekable();
    let mut bracketed = false;

    while let Some(c) = chars.next() {
        match c {
            '[' if current.is_empty() => {
                let mut segment = String::new();
                let mut closed = false;
                for inner in chars.by_ref() {
                    if inner == ']' {
                        closed = true;
                        break;
                    }
                    segment.push(inner);
                }
                if !closed {
                    return Err(format!("unclosed '[' in '{word}'"));
                }
                current = segment;
                bracketed = true;
            }
            '.' | '/' => {
                if current.is_empty() && !bracketed {
                    if segments.is_empty() && c == '.' && chars.peek().is_none() {
                        // bare `.`
                        return Ok(PathExpr {
                            root: PathRoot::This,
                            segments: Vec::new(),
                        });
                    }
                    if segments.is_empty() && c == '.' {
                        // `./name`
                        segments.push("this".to_string());
                        if chars.peek() == Some(&'/') {
                            chars.next();
                        }
                        continue;
                    }
                    return Err(format!("invalid path '{word}'"));
                }
                segments.push(std::mem::take(&mut current));
                bracketed = false;
            }
            _ => {
                if bracketed {
                    return Err(format!("invalid path '{word}'"));
                }
                current.push(c);
            }
        }
    }
    if current.is_empty() && !bracketed {
        if segments.is_empty() {
            return Err("empty path".to_string());
        }
        return Err(format!("path '{word}' ends with a separator"));
    }
    segments.push(current);

    let root = if segments[0] == "this" && !word.starts_with('[') {
        segments.remove(0);
        PathRoot::This
    } else if let Some(stripped) = segments[0].strip_prefix('@') {
        segments[0] = stripped.to_string();
        PathRoot::Data
    } else {
        PathRoot::Lookup
    };
    Ok(PathExpr { root, segments })
}

#[derive(Debug, PartialEq)]
enum Token {
    Word(String, usize),
    Str(String),
    HashKey(String),
    OpenParen,
    CloseParen,
}

/// Tokenizer for the inside of a `{{ ... }}` tag.
struct Lexer<'a> {
    source: &'a str,
    chars: Vec<(usize, char)>,
    index: usize,
    base: usize,
    end: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str, content: &str, base: usize) -> Self {
        Self {
            source,
            chars: content.char_indices().collect(),
            index: 0,
            base,
            end: content.len(),
        }
    }

    fn offset(&self) -> usize {
        self.base + self.chars.get(self.index).map(|(i, _)| *i).unwrap_or(self.end)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.index).map(|(_, c)| *c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.index += 1;
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, TemplateError> {
        self.skip_whitespace();
        let start = self.offset();
        let c = match self.peek() {
            Some(c) => c,
            None => return Ok(None),
        };
        match c {
            '(' => {
                self.index += 1;
                Ok(Some(Token::OpenParen))
            }
            ')' => {
                self.index += 1;
                Ok(Some(Token::CloseParen))
            }
            '\'' | '"' => {
                self.index += 1;
                let mut value = String::new();
                loop {
                    match self.peek() {
                        None => {
                            return Err(TemplateError::at(
                                self.source,
                                start,
                                "unterminated string literal",
                            ))
                        }
                        Some('\\') => {
                            self.index += 1;
                            if let Some(escaped) = self.peek() {
                                value.push(escaped);
                                self.index += 1;
                            }
                        }
                        Some(q) if q == c => {
                            self.index += 1;
                            break;
                        }
                        Some(other) => {
                            value.push(other);
                            self.index += 1;
                        }
                    }
                }
                Ok(Some(Token::Str(value)))
            }
            _ => {
                let mut word = String::new();
                while let Some(ch) = self.peek() {
                    if ch == '[' {
                        // bracketed segment may contain anything but ']'
                        while let Some(inner) = self.peek() {
                            word.push(inner);
                            self.index += 1;
                            if inner == ']' {
                                break;
                            }
                        }
                        continue;
                    }
                    if ch.is_whitespace() || matches!(ch, '(' | ')' | '=' | '\'' | '"') {
                        break;
                    }
                    word.push(ch);
                    self.index += 1;
                }
                if self.peek() == Some('=') && is_identifier(&word) {
                    self.index += 1;
                    return Ok(Some(Token::HashKey(word)));
                }
                if word.is_empty() {
                    return Err(TemplateError::at(
                        self.source,
                        start,
                        format!("unexpected character '{c}'"),
                    ));
                }
                Ok(Some(Token::Word(word, start)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn helpers(name: &str) -> bool {
        matches!(name, "trim" | "eq" | "base64" | "size" | "now")
    }

    fn parse_ok(source: &str) -> Vec<Node> {
        parse(source, &helpers).unwrap()
    }

    fn path(segments: &[&str]) -> Expr {
        Expr::Path(PathExpr {
            root: PathRoot::Lookup,
            segments: segments.iter().map(|s| s.to_string()).collect(),
        })
    }

    #[test]
    fn test_text_and_paths() {
        let nodes = parse_ok("Hello {{request.query.name}}!");
        assert_eq!(
            nodes,
            vec![
                Node::Text("Hello ".to_string()),
                Node::Expression {
                    expr: path(&["request", "query", "name"]),
                    escape: true
                },
                Node::Text("!".to_string()),
            ]
        );
    }

    #[test]
    fn test_bracket_segments() {
        let nodes = parse_ok("{{{request.query.[123$%$^&__why_o_why]}}}{{things.[-1]}}");
        assert_eq!(
            nodes[0],
            Node::Expression {
                expr: path(&["request", "query", "123$%$^&__why_o_why"]),
                escape: false
            }
        );
        assert_eq!(
            nodes[1],
            Node::Expression {
                expr: path(&["things", "-1"]),
                escape: true
            }
        );
    }

    #[test]
    fn test_slash_separator_and_hyphen_ids() {
        let nodes = parse_ok("{{request/headers/X-Request-Id}}");
        assert_eq!(
            nodes[0],
            Node::Expression {
                expr: path(&["request", "headers", "X-Request-Id"]),
                escape: true
            }
        );
    }

    #[test]
    fn test_helper_call_with_literals_and_hash() {
        let nodes = parse_ok("{{eq 5 5.5 'x' yes='y' no=false}}");
        assert_eq!(
            nodes[0],
            Node::Expression {
                expr: Expr::Helper {
                    name: "eq".to_string(),
                    params: vec![
                        Expr::Literal(Value::Int(5)),
                        Expr::Literal(Value::Float(5.5)),
                        Expr::Literal(Value::String("x".to_string())),
                    ],
                    hash: vec![
                        ("yes".to_string(), Expr::Literal(Value::String("y".to_string()))),
                        ("no".to_string(), Expr::Literal(Value::Bool(false))),
                    ],
                },
                escape: true
            }
        );
    }

    #[test]
    fn test_sub_expression() {
        let nodes = parse_ok("{{eq (size request.path) 2}}");
        match &nodes[0] {
            Node::Expression {
                expr: Expr::Helper { params, .. },
                ..
            } => {
                assert!(matches!(&params[0], Expr::Helper { name, .. } if name == "size"));
            }
            other => panic!("unexpected node {other:?}"),
        }
    }

    #[test]
    fn test_block_with_else() {
        let nodes = parse_ok("{{#eq a 'b'}}ONE{{else}}MANY{{/eq}}");
        match &nodes[0] {
            Node::Block(block) => {
                assert_eq!(block.name, "eq");
                assert_eq!(block.body, vec![Node::Text("ONE".to_string())]);
                assert_eq!(block.inverse, vec![Node::Text("MANY".to_string())]);
            }
            other => panic!("unexpected node {other:?}"),
        }
    }

    #[test]
    fn test_nested_blocks() {
        let nodes = parse_ok("{{#each items}}{{#if this}}[{{this}}]{{/if}}{{/each}}");
        match &nodes[0] {
            Node::Block(outer) => {
                assert_eq!(outer.name, "each");
                assert!(matches!(&outer.body[0], Node::Block(inner) if inner.name == "if"));
            }
            other => panic!("unexpected node {other:?}"),
        }
    }

    #[test]
    fn test_comments_and_whitespace_control() {
        let nodes = parse_ok("a {{! note }}b{{!-- {{ignored}} --}}c   {{~name~}}   d");
        assert_eq!(
            nodes,
            vec![
                Node::Text("a ".to_string()),
                Node::Text("b".to_string()),
                Node::Text("c".to_string()),
                Node::Expression {
                    expr: path(&["name"]),
                    escape: true
                },
                Node::Text("d".to_string()),
            ]
        );
    }

    #[test]
    fn test_this_and_data_paths() {
        let nodes = parse_ok("{{this}}{{.}}{{@index}}{{this.name}}");
        let exprs: Vec<&Expr> = nodes
            .iter()
            .map(|n| match n {
                Node::Expression { expr, .. } => expr,
                other => panic!("unexpected node {other:?}"),
            })
            .collect();
        assert!(
            matches!(exprs[0], Expr::Path(p) if p.root == PathRoot::This && p.segments.is_empty())
        );
        assert!(matches!(exprs[1], Expr::Path(p) if p.root == PathRoot::This));
        assert!(
            matches!(exprs[2], Expr::Path(p) if p.root == PathRoot::Data && p.segments == ["index"])
        );
        assert!(
            matches!(exprs[3], Expr::Path(p) if p.root == PathRoot::This && p.segments == ["name"])
        );
    }

    #[test]
    fn test_closing_braces_inside_string() {
        let nodes = parse_ok("{{eq '}}' '}}'}}");
        assert_eq!(nodes.len(), 1);
    }

    #[test]
    fn test_syntax_errors() {
        assert!(parse("{{#trim}}unclosed", &helpers).is_err());
        assert!(parse("{{#trim}}x{{/eq}}", &helpers).is_err());
        assert!(parse("{{/trim}}", &helpers).is_err());
        assert!(parse("{{else}}", &helpers).is_err());
        assert!(parse("{{request.path", &helpers).is_err());
        assert!(parse("{{#unknownHelper}}x{{/unknownHelper}}", &helpers).is_err());
        assert!(parse("{{notAHelper 'arg'}}", &helpers).is_err());
        assert!(parse("{{eq 'unterminated}}", &helpers).is_err());
        assert!(parse("{{eq (size x}}", &helpers).is_err());
        assert!(parse("{{}}", &helpers).is_err());
    }

    #[test]
    fn test_non_ascii_inside_tags() {
        let nodes = parse_ok("{{parameters.café}} {{request.headers.x-naïve}}");
        assert_eq!(
            nodes[0],
            Node::Expression {
                expr: path(&["parameters", "café"]),
                escape: true
            }
        );
        assert_eq!(
            nodes[2],
            Node::Expression {
                expr: path(&["request", "headers", "x-naïve"]),
                escape: true
            }
        );

        let err = parse("{{ é", &helpers).unwrap_err();
        assert_eq!(err.line, 1);
        assert_eq!(err.column, 1);
        assert!(parse("é {{{ é", &helpers).is_err());
    }

    #[test]
    fn test_error_position() {
        let err = parse("line\n  {{#trim}}", &helpers).unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.column, 3);
    }
}
