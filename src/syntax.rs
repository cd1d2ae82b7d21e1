//! Lexical checks on the raw query text.
//!
//! The SPARQL parser rewrites sequence (`a/b`) and inverse (`^a`) paths into
//! plain triple patterns, and a `(expr AS ?v)` SELECT item ends up as the same
//! algebra node as a trailing `BIND(expr AS ?v)`. Both are told apart here,
//! on the token stream, before the algebra loses them.

/// Facts about a query that its algebra does not keep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceSyntax {
    /// A `/`, `^` or `|` path operator sits in a triple pattern
    pub path_operator: bool,
    /// The outer SELECT clause holds a `(expr AS ?v)` item
    pub projected_expression: bool,
}

impl SurfaceSyntax {
    /// Scan a query that already parsed successfully.
    pub fn scan(query: &str) -> Self {
        let tokens = tokenize(query);
        let mut syntax = SurfaceSyntax::default();
        // One entry per open bracket: true when its content is triple patterns
        let mut stack: Vec<bool> = Vec::new();
        let mut select_clause = false;
        let mut select_seen = false;
        let mut prev: Option<&Token> = None;

        for token in &tokens {
            let in_triples = stack.last().copied().unwrap_or(false);
            match &token.kind {
                Kind::Word(word)
                    if stack.is_empty() && !select_seen && word.eq_ignore_ascii_case("SELECT") =>
                {
                    select_seen = true;
                    select_clause = true;
                }
                Kind::Word(word) if select_clause && word.eq_ignore_ascii_case("WHERE") => {
                    select_clause = false;
                }
                Kind::Open('{') => {
                    select_clause = false;
                    stack.push(true);
                }
                Kind::Open('[') => stack.push(in_triples),
                Kind::Open(_) => {
                    if select_clause {
                        syntax.projected_expression = true;
                    }
                    stack.push(in_triples && !opens_call(prev, token));
                }
                Kind::Close => {
                    stack.pop();
                }
                Kind::Punct('/' | '^' | '|') if in_triples => syntax.path_operator = true,
                _ => {}
            }
            prev = Some(token);
        }
        syntax
    }
}

/// Whether `(` starts an argument list (FILTER, BIND, functions) rather than
/// a path group or an RDF collection.
fn opens_call(prev: Option<&Token>, open: &Token) -> bool {
    match prev.map(|t| &t.kind) {
        Some(Kind::Word(word)) if !word.contains(':') => {
            word.starts_with(|c: char| c.is_ascii_alphabetic())
        }
        // ex:fn(...) is only a call when written without a space
        Some(Kind::Word(_)) => open.glued,
        Some(Kind::Iri) => open.glued,
        _ => false,
    }
}

// =============================================================================
// TOKENS
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Kind {
    /// Keyword, prefixed name, blank node label or number
    Word(String),
    Iri,
    Variable,
    Literal,
    Open(char),
    Close,
    Punct(char),
    /// `^^` and `||`
    Operator,
}

#[derive(Debug, Clone)]
struct Token {
    kind: Kind,
    /// No whitespace between this token and the previous one
    glued: bool,
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':' | '%')
}

fn tokenize(query: &str) -> Vec<Token> {
    let chars: Vec<char> = query.chars().collect();
    let mut tokens = Vec::new();
    let mut glued = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            glued = false;
            i += 1;
            continue;
        }
        if c == '#' {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            glued = false;
            continue;
        }

        let (kind, next) = match c {
            '"' | '\'' => (Kind::Literal, skip_string(&chars, i)),
            '<' => match iri_end(&chars, i) {
                Some(end) => (Kind::Iri, end),
                None => (Kind::Punct('<'), i + 1),
            },
            '?' | '$' if chars.get(i + 1).is_some_and(|n| n.is_alphanumeric() || *n == '_') => {
                let mut j = i + 1;
                while j < chars.len() && (chars[j].is_alphanumeric() || chars[j] == '_') {
                    j += 1;
                }
                (Kind::Variable, j)
            }
            '{' | '(' | '[' => (Kind::Open(c), i + 1),
            '}' | ')' | ']' => (Kind::Close, i + 1),
            '^' | '|' if chars.get(i + 1) == Some(&c) => (Kind::Operator, i + 2),
            c if is_name_char(c) && c != '.' => {
                let mut j = i;
                while j < chars.len() && (is_name_char(chars[j]) || chars[j] == '\\') {
                    // PN_LOCAL_ESC, e.g. ex:a\/b
                    j += if chars[j] == '\\' { 2 } else { 1 };
                }
                let j = j.min(chars.len());
                (Kind::Word(chars[i..j].iter().collect()), j)
            }
            other => (Kind::Punct(other), i + 1),
        };
        tokens.push(Token { kind, glued });
        glued = true;
        i = next;
    }
    tokens
}

/// Index just past the string literal starting at `start`.
fn skip_string(chars: &[char], start: usize) -> usize {
    let quote = chars[start];
    let long = chars.get(start + 1) == Some(&quote) && chars.get(start + 2) == Some(&quote);
    let mut i = if long { start + 3 } else { start + 1 };
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            c if c == quote => {
                if !long {
                    return i + 1;
                }
                if chars.get(i + 1) == Some(&quote) && chars.get(i + 2) == Some(&quote) {
                    return i + 3;
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    chars.len()
}

/// Index just past `<...>` when it is an IRI, `None` when `<` is an operator.
fn iri_end(chars: &[char], start: usize) -> Option<usize> {
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '>' => return Some(i + 1),
            c if c.is_whitespace() || matches!(c, '<' | '"' | '{' | '}' | '|' | '^' | '`') => {
                return None;
            }
            _ => i += 1,
        }
    }
    None
}
