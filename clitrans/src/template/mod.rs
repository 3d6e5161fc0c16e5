//! Command template renderer.
//!
//! Vendor writers describe the commands they send as templates rendered
//! against an explicit [`Context`]:
//!
//! | Syntax | Meaning |
//! |--------|---------|
//! | `{$name}`, `{$name.field}` | substitution; nested fields of map values |
//! | `{$name\|lc}` | filters: `lc`, `uc`, `trim` |
//! | `{% if ($x) %}..{% elseIf ($y) %}..{% else %}..{% endif %}` | conditionals |
//! | `($x)`, `(!$x)`, `($x == "a")`, `($x != "a")`, `($x =~ /re/)` | conditions |
//! | `{% loop in $list as $item %}..{% divider %}..{% onEmpty %}..{% endloop %}` | loops |
//! | `{% loop in $map as $key:value %}` | key/value loop over a map |
//!
//! Null, `false`, and empty lists are falsy. A loop over a map bound to a
//! single variable iterates its values; a key variable on a list gets the
//! index. `onEmpty` renders once when the source is empty or null.
//!
//! Rendering never emits partial text: a name missing from the context, a
//! null value in a substitution, or a field access on a scalar is an error.
//! Missing fields of a map (or fields of null) are null, so optional data
//! can be tested in conditions.

mod parser;
mod render;
mod value;

use std::str::FromStr;

pub use value::{Context, Value};

use crate::error::TemplateError;
use parser::Node;
use render::{Scope, render_nodes};

/// A parsed template.
///
/// # Example
///
/// ```rust
/// use clitrans::template::{Context, Template, Value};
///
/// let template = Template::parse(
///     "interface {$name}\n\
///      {% if ($mtu) %}mtu {$mtu}\n{% endif %}\
///      {% if ($shutdown) %}shutdown\n{% else %}no shutdown\n{% endif %}",
/// )
/// .unwrap();
///
/// let ctx = Context::new()
///     .insert("name", "eth0")
///     .insert("mtu", 1500)
///     .insert("shutdown", Value::TRUE);
///
/// assert_eq!(template.render(&ctx).unwrap(), "interface eth0\nmtu 1500\nshutdown\n");
/// ```
#[derive(Debug, Clone)]
pub struct Template {
    source: String,
    nodes: Vec<Node>,
}

impl Template {
    /// Parse a template, checking directive nesting and filter names.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        Ok(Self {
            source: source.to_string(),
            nodes: parser::parse(source)?,
        })
    }

    /// Render against `ctx`. Pure: the same context always yields the same
    /// text.
    pub fn render(&self, ctx: &Context) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.source.len());
        render_nodes(&self.nodes, &mut Scope::new(ctx), &mut out)?;
        Ok(out)
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl FromStr for Template {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Template::parse(s)
    }
}

/// Parse and render in one step.
pub fn render(template: &str, ctx: &Context) -> Result<String, TemplateError> {
    Template::parse(template)?.render(ctx)
}
