//! Template evaluation.

use super::parser::{Cond, Expr, Node};
use super::value::{Context, Value};
use crate::error::TemplateError;

static NULL: Value = Value::Null;

/// Context plus loop variables bound by enclosing loops.
pub(crate) struct Scope<'a> {
    ctx: &'a Context,
    locals: Vec<(String, Value)>,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(ctx: &'a Context) -> Self {
        Self {
            ctx,
            locals: Vec::new(),
        }
    }

    fn lookup(&self, name: &str) -> Option<&Value> {
        self.locals
            .iter()
            .rev()
            .find(|(local, _)| local == name)
            .map(|(_, value)| value)
            .or_else(|| self.ctx.get(name))
    }
}

pub(crate) fn render_nodes(
    nodes: &[Node],
    scope: &mut Scope<'_>,
    out: &mut String,
) -> Result<(), TemplateError> {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),

            Node::Var(expr) => {
                let value = eval(expr, scope)?;
                if value.is_null() {
                    return Err(TemplateError::NullSubstitution {
                        name: expr.full_path(),
                        offset: expr.offset,
                    });
                }
                out.push_str(&value.to_string());
            }

            Node::If {
                branches,
                otherwise,
            } => {
                let mut taken = None;
                for branch in branches {
                    if eval_cond(&branch.cond, scope)? {
                        taken = Some(&branch.body);
                        break;
                    }
                }
                if let Some(body) = taken.or(otherwise.as_ref()) {
                    render_nodes(body, scope, out)?;
                }
            }

            Node::Loop {
                source,
                key,
                item,
                body,
                divider,
                on_empty,
            } => {
                let entries: Vec<(Value, Value)> = match eval(source, scope)? {
                    Value::Null => Vec::new(),
                    Value::List(items) => items
                        .into_iter()
                        .enumerate()
                        .map(|(i, v)| (Value::from(i), v))
                        .collect(),
                    Value::Map(fields) => fields
                        .into_iter()
                        .map(|(k, v)| (Value::Str(k), v))
                        .collect(),
                    _ => {
                        return Err(TemplateError::NotIterable {
                            name: source.full_path(),
                            offset: source.offset,
                        });
                    }
                };

                if entries.is_empty() {
                    if let Some(on_empty) = on_empty {
                        render_nodes(on_empty, scope, out)?;
                    }
                    continue;
                }

                for (i, (entry_key, entry_value)) in entries.into_iter().enumerate() {
                    if i > 0 {
                        if let Some(divider) = divider {
                            render_nodes(divider, scope, out)?;
                        }
                    }

                    let depth = scope.locals.len();
                    if let Some(key) = key {
                        scope.locals.push((key.clone(), entry_key));
                    }
                    scope.locals.push((item.clone(), entry_value));
                    let result = render_nodes(body, scope, out);
                    scope.locals.truncate(depth);
                    result?;
                }
            }
        }
    }
    Ok(())
}

fn eval(expr: &Expr, scope: &Scope<'_>) -> Result<Value, TemplateError> {
    let mut current = scope
        .lookup(&expr.name)
        .ok_or_else(|| TemplateError::UnresolvedVariable {
            name: expr.name.clone(),
            offset: expr.offset,
        })?;

    for (depth, field) in expr.fields.iter().enumerate() {
        current = match current {
            Value::Map(fields) => fields.get(field).unwrap_or(&NULL),
            Value::Null => &NULL,
            _ => {
                return Err(TemplateError::NotAMap {
                    name: expr.path(depth),
                    field: field.clone(),
                    offset: expr.offset,
                });
            }
        };
    }

    let mut value = current.clone();
    for filter in &expr.filters {
        if !value.is_null() {
            value = Value::Str(filter.apply(&value.to_string()));
        }
    }
    Ok(value)
}

fn eval_cond(cond: &Cond, scope: &Scope<'_>) -> Result<bool, TemplateError> {
    let result = match cond {
        Cond::Truthy(expr) => eval(expr, scope)?.is_truthy(),
        Cond::Not(inner) => !eval_cond(inner, scope)?,
        Cond::Equals(expr, literal) => {
            let value = eval(expr, scope)?;
            !value.is_null() && value.to_string() == *literal
        }
        Cond::NotEquals(expr, literal) => {
            let value = eval(expr, scope)?;
            value.is_null() || value.to_string() != *literal
        }
        Cond::Matches(expr, regex) => {
            let value = eval(expr, scope)?;
            !value.is_null() && regex.is_match(&value.to_string())
        }
    };
    Ok(result)
}
