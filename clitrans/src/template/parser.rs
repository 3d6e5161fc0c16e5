//! Template parsing: source text to a tree of [`Node`]s.

use regex::Regex;

use crate::error::TemplateError;

/// Text transformation applied to a value before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Filter {
    Lower,
    Upper,
    Trim,
}

impl Filter {
    fn parse(name: &str, offset: usize) -> Result<Self, TemplateError> {
        match name {
            "lc" | "lower" => Ok(Filter::Lower),
            "uc" | "upper" => Ok(Filter::Upper),
            "trim" => Ok(Filter::Trim),
            _ => Err(TemplateError::UnknownFilter {
                filter: name.to_string(),
                offset,
            }),
        }
    }

    pub(crate) fn apply(self, text: &str) -> String {
        match self {
            Filter::Lower => text.to_lowercase(),
            Filter::Upper => text.to_uppercase(),
            Filter::Trim => text.trim().to_string(),
        }
    }
}

/// `$name.field.field|filter`
#[derive(Debug, Clone)]
pub(crate) struct Expr {
    pub name: String,
    pub fields: Vec<String>,
    pub filters: Vec<Filter>,
    pub offset: usize,
}

impl Expr {
    /// Dotted path of the first `depth` segments (`depth == 0` is the name).
    pub(crate) fn path(&self, depth: usize) -> String {
        let mut path = self.name.clone();
        for field in self.fields.iter().take(depth) {
            path.push('.');
            path.push_str(field);
        }
        path
    }

    pub(crate) fn full_path(&self) -> String {
        self.path(self.fields.len())
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Cond {
    Truthy(Expr),
    Not(Box<Cond>),
    Equals(Expr, String),
    NotEquals(Expr, String),
    Matches(Expr, Regex),
}

#[derive(Debug, Clone)]
pub(crate) struct Branch {
    pub cond: Cond,
    pub body: Vec<Node>,
}

#[derive(Debug, Clone)]
pub(crate) enum Node {
    Text(String),
    Var(Expr),
    If {
        branches: Vec<Branch>,
        otherwise: Option<Vec<Node>>,
    },
    Loop {
        source: Expr,
        key: Option<String>,
        item: String,
        body: Vec<Node>,
        divider: Option<Vec<Node>>,
        on_empty: Option<Vec<Node>>,
    },
}

#[derive(Debug)]
enum Token {
    Text(String),
    Var(Expr),
    If(Cond),
    ElseIf(Cond),
    Else,
    EndIf,
    Loop {
        source: Expr,
        key: Option<String>,
        item: String,
    },
    Divider,
    OnEmpty,
    EndLoop,
}

impl Token {
    fn directive(&self) -> &'static str {
        match self {
            Token::Text(_) | Token::Var(_) => "text",
            Token::If(_) => "if",
            Token::ElseIf(_) => "elseIf",
            Token::Else => "else",
            Token::EndIf => "endif",
            Token::Loop { .. } => "loop",
            Token::Divider => "divider",
            Token::OnEmpty => "onEmpty",
            Token::EndLoop => "endloop",
        }
    }
}

/// Parse template source into nodes.
pub(crate) fn parse(source: &str) -> Result<Vec<Node>, TemplateError> {
    let mut parser = Parser {
        tokens: tokenize(source)?.into_iter(),
    };
    match parser.block()? {
        (nodes, None) => Ok(nodes),
        (_, Some((offset, token))) => Err(unbalanced(&token, offset)),
    }
}

fn syntax(message: impl Into<String>, offset: usize) -> TemplateError {
    TemplateError::Syntax {
        message: message.into(),
        offset,
    }
}

fn unbalanced(token: &Token, offset: usize) -> TemplateError {
    TemplateError::Unbalanced {
        directive: token.directive().to_string(),
        offset,
    }
}

fn tokenize(source: &str) -> Result<Vec<(usize, Token)>, TemplateError> {
    let mut tokens: Vec<(usize, Token)> = Vec::new();
    let mut pos = 0;

    while pos < source.len() {
        let rest = &source[pos..];
        let brace = rest.find('{').unwrap_or(rest.len());
        if brace > 0 {
            push_text(&mut tokens, pos, &rest[..brace]);
            pos += brace;
            continue;
        }

        if rest.starts_with("{$") {
            let close = rest
                .find('}')
                .ok_or_else(|| syntax("unterminated placeholder", pos))?;
            let (expr, trailing) = parse_expr(&rest[1..close], pos)?;
            if !trailing.trim().is_empty() {
                return Err(syntax(format!("unexpected '{}' in placeholder", trailing.trim()), pos));
            }
            tokens.push((pos, Token::Var(expr)));
            pos += close + 1;
        } else if rest.starts_with("{%") {
            let close = rest
                .find("%}")
                .ok_or_else(|| syntax("unterminated directive", pos))?;
            let directive = parse_directive(rest[2..close].trim(), pos)?;
            tokens.push((pos, directive));
            pos += close + 2;
        } else {
            push_text(&mut tokens, pos, "{");
            pos += 1;
        }
    }

    Ok(tokens)
}

fn push_text(tokens: &mut Vec<(usize, Token)>, at: usize, text: &str) {
    if let Some((_, Token::Text(last))) = tokens.last_mut() {
        last.push_str(text);
    } else {
        tokens.push((at, Token::Text(text.to_string())));
    }
}

fn parse_directive(inner: &str, offset: usize) -> Result<Token, TemplateError> {
    let keyword_end = inner
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(inner.len());
    let (keyword, rest) = (&inner[..keyword_end], inner[keyword_end..].trim());

    let token = match keyword {
        "if" => Token::If(parse_cond(rest, offset)?),
        "elseIf" | "elseif" => Token::ElseIf(parse_cond(rest, offset)?),
        "else" if rest.is_empty() => Token::Else,
        "endif" if rest.is_empty() => Token::EndIf,
        "loop" => parse_loop(rest, offset)?,
        "divider" if rest.is_empty() => Token::Divider,
        "onEmpty" | "onempty" if rest.is_empty() => Token::OnEmpty,
        "endloop" if rest.is_empty() => Token::EndLoop,
        _ => return Err(syntax(format!("unknown directive '{}'", inner), offset)),
    };
    Ok(token)
}

/// `in $source as $item` or `in $source as $key:item`
fn parse_loop(text: &str, offset: usize) -> Result<Token, TemplateError> {
    let after_in = text
        .strip_prefix("in")
        .filter(|rest| rest.starts_with(char::is_whitespace))
        .ok_or_else(|| syntax("expected 'loop in $source as $item'", offset))?;

    let (source, rest) = parse_expr(after_in, offset)?;
    if !source.filters.is_empty() {
        return Err(syntax("filters are not allowed on a loop source", offset));
    }

    let binding = rest
        .trim_start()
        .strip_prefix("as")
        .filter(|rest| rest.starts_with(char::is_whitespace))
        .ok_or_else(|| syntax("expected 'as' after loop source", offset))?
        .trim();

    let (key, item) = match binding.split_once(':') {
        Some((key, item)) => (Some(variable_name(key, offset)?), variable_name(item, offset)?),
        None => (None, variable_name(binding, offset)?),
    };

    Ok(Token::Loop { source, key, item })
}

fn variable_name(text: &str, offset: usize) -> Result<String, TemplateError> {
    let text = text.trim();
    let name = text.strip_prefix('$').unwrap_or(text);
    if name.is_empty() || ident_len(name) != name.len() {
        return Err(syntax(format!("invalid loop variable '{}'", text), offset));
    }
    Ok(name.to_string())
}

fn parse_cond(text: &str, offset: usize) -> Result<Cond, TemplateError> {
    let mut text = text.trim();
    if text.starts_with('(') && text.ends_with(')') {
        text = text[1..text.len() - 1].trim();
    }

    if let Some(negated) = text.strip_prefix('!') {
        return Ok(Cond::Not(Box::new(parse_cond(negated, offset)?)));
    }

    let (expr, rest) = parse_expr(text, offset)?;
    let rest = rest.trim();

    if rest.is_empty() {
        Ok(Cond::Truthy(expr))
    } else if let Some(rhs) = rest.strip_prefix("==") {
        Ok(Cond::Equals(expr, parse_literal(rhs, offset)?))
    } else if let Some(rhs) = rest.strip_prefix("!=") {
        Ok(Cond::NotEquals(expr, parse_literal(rhs, offset)?))
    } else if let Some(rhs) = rest.strip_prefix("=~") {
        let rhs = rhs.trim();
        let pattern = rhs
            .strip_prefix('/')
            .and_then(|r| r.strip_suffix('/'))
            .ok_or_else(|| syntax(format!("expected /regex/, found '{}'", rhs), offset))?;
        let regex = Regex::new(pattern).map_err(|e| TemplateError::InvalidRegex {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        Ok(Cond::Matches(expr, regex))
    } else {
        Err(syntax(format!("unexpected '{}' in condition", rest), offset))
    }
}

fn parse_literal(text: &str, offset: usize) -> Result<String, TemplateError> {
    let text = text.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = text.strip_prefix(quote).and_then(|t| t.strip_suffix(quote)) {
            return Ok(inner.to_string());
        }
    }
    if text.is_empty() || text.contains(char::is_whitespace) {
        return Err(syntax(format!("invalid literal '{}'", text), offset));
    }
    Ok(text.to_string())
}

fn ident_len(text: &str) -> usize {
    text.find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '-'))
        .unwrap_or(text.len())
}

/// Parse `$name.field|filter` from the start of `text`; returns the
/// unparsed remainder.
fn parse_expr(text: &str, offset: usize) -> Result<(Expr, &str), TemplateError> {
    let text = text.trim_start();
    let body = text
        .strip_prefix('$')
        .ok_or_else(|| syntax(format!("expected '$' variable, found '{}'", text), offset))?;

    let len = ident_len(body);
    if len == 0 {
        return Err(syntax("empty variable name", offset));
    }
    let name = body[..len].to_string();
    let mut rest = &body[len..];

    let mut fields = Vec::new();
    while let Some(after_dot) = rest.strip_prefix('.') {
        let len = ident_len(after_dot);
        if len == 0 {
            return Err(syntax(format!("empty field name after '${}'", name), offset));
        }
        fields.push(after_dot[..len].to_string());
        rest = &after_dot[len..];
    }

    let mut filters = Vec::new();
    while let Some(after_bar) = rest.trim_start().strip_prefix('|') {
        let after_bar = after_bar.trim_start();
        let len = ident_len(after_bar);
        if len == 0 {
            return Err(syntax("empty filter name", offset));
        }
        filters.push(Filter::parse(&after_bar[..len], offset)?);
        rest = &after_bar[len..];
    }

    Ok((
        Expr {
            name,
            fields,
            filters,
            offset,
        },
        rest,
    ))
}

struct Parser {
    tokens: std::vec::IntoIter<(usize, Token)>,
}

impl Parser {
    /// Nodes up to the next structural token, which is returned unconsumed
    /// by the tree (None at end of input).
    fn block(&mut self) -> Result<(Vec<Node>, Option<(usize, Token)>), TemplateError> {
        let mut nodes = Vec::new();
        while let Some((offset, token)) = self.tokens.next() {
            match token {
                Token::Text(text) => nodes.push(Node::Text(text)),
                Token::Var(expr) => nodes.push(Node::Var(expr)),
                Token::If(cond) => nodes.push(self.if_block(cond, offset)?),
                Token::Loop { source, key, item } => {
                    nodes.push(self.loop_block(source, key, item, offset)?)
                }
                other => return Ok((nodes, Some((offset, other)))),
            }
        }
        Ok((nodes, None))
    }

    fn if_block(&mut self, first: Cond, offset: usize) -> Result<Node, TemplateError> {
        let unclosed = || TemplateError::Unbalanced {
            directive: "if".to_string(),
            offset,
        };

        let mut branches = Vec::new();
        let mut cond = first;
        loop {
            let (body, end) = self.block()?;
            branches.push(Branch { cond, body });
            match end {
                Some((_, Token::ElseIf(next))) => cond = next,
                Some((_, Token::Else)) => {
                    let (otherwise, end) = self.block()?;
                    return match end {
                        Some((_, Token::EndIf)) => Ok(Node::If {
                            branches,
                            otherwise: Some(otherwise),
                        }),
                        Some((at, token)) => Err(unbalanced(&token, at)),
                        None => Err(unclosed()),
                    };
                }
                Some((_, Token::EndIf)) => {
                    return Ok(Node::If {
                        branches,
                        otherwise: None,
                    });
                }
                Some((at, token)) => return Err(unbalanced(&token, at)),
                None => return Err(unclosed()),
            }
        }
    }

    fn loop_block(
        &mut self,
        source: Expr,
        key: Option<String>,
        item: String,
        offset: usize,
    ) -> Result<Node, TemplateError> {
        let (body, mut end) = self.block()?;
        let mut divider = None;
        let mut on_empty = None;

        loop {
            end = match end {
                Some((_, Token::Divider)) if divider.is_none() && on_empty.is_none() => {
                    let (nodes, next) = self.block()?;
                    divider = Some(nodes);
                    next
                }
                Some((_, Token::OnEmpty)) if on_empty.is_none() => {
                    let (nodes, next) = self.block()?;
                    on_empty = Some(nodes);
                    next
                }
                Some((_, Token::EndLoop)) => {
                    return Ok(Node::Loop {
                        source,
                        key,
                        item,
                        body,
                        divider,
                        on_empty,
                    });
                }
                Some((at, token)) => return Err(unbalanced(&token, at)),
                None => {
                    return Err(TemplateError::Unbalanced {
                        directive: "loop".to_string(),
                        offset,
                    });
                }
            };
        }
    }
}
