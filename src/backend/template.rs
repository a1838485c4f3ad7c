//! # Statement Templates
//!
//! Backend statements are written as templates with named placeholders
//! (`{name}`, `{password}`, `{role}`). Rendering never splices values into
//! the SQL text: each placeholder becomes a positional bind marker (`$1`,
//! `$2`, ...) and the values are returned alongside, in bind order.
//!
//! A placeholder used twice reuses its marker. `{{` and `}}` produce literal
//! braces.

use thiserror::Error;

/// Named template parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    Name,
    Password,
    Role,
}

impl Param {
    fn parse(placeholder: &str) -> Option<Self> {
        match placeholder {
            "name" => Some(Self::Name),
            "password" => Some(Self::Password),
            "role" => Some(Self::Role),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Password => "password",
            Self::Role => "role",
        }
    }
}

/// Values available to a template
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct Params<'a> {
    pub name: Option<&'a str>,
    pub password: Option<&'a str>,
    pub role: Option<&'a str>,
}

impl std::fmt::Debug for Params<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Params")
            .field("name", &self.name)
            .field("password", &self.password.map(|_| "<redacted>"))
            .field("role", &self.role)
            .finish()
    }
}

impl<'a> Params<'a> {
    #[must_use]
    pub fn name(name: &'a str) -> Self {
        Self {
            name: Some(name),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn user(name: &'a str, password: &'a str, role: &'a str) -> Self {
        Self {
            name: Some(name),
            password: Some(password),
            role: Some(role),
        }
    }

    fn get(&self, param: Param) -> Option<&'a str> {
        match param {
            Param::Name => self.name,
            Param::Password => self.password,
            Param::Role => self.role,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unknown placeholder `{{{0}}}`")]
    UnknownPlaceholder(String),
    #[error("no value supplied for `{{{}}}`", .0.as_str())]
    MissingValue(Param),
    #[error("unterminated placeholder starting at byte {0}")]
    Unterminated(usize),
    #[error("unmatched `}}` at byte {0}")]
    UnmatchedClose(usize),
}

/// A rendered statement: SQL with bind markers plus the values to bind, in order
#[derive(Clone, PartialEq, Eq)]
pub struct Rendered<'a> {
    pub sql: String,
    pub binds: Vec<&'a str>,
}

impl std::fmt::Debug for Rendered<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rendered")
            .field("sql", &self.sql)
            .field("binds", &self.binds.len())
            .finish()
    }
}

/// Render `template` against `params`
///
/// # Errors
///
/// Fails on unknown placeholders, placeholders without a value, and unbalanced braces.
pub fn render<'a>(template: &str, params: &Params<'a>) -> Result<Rendered<'a>, TemplateError> {
    let mut sql = String::with_capacity(template.len());
    let mut order: Vec<Param> = Vec::new();
    let mut binds = Vec::new();
    let mut rest = template.char_indices().peekable();

    while let Some((at, c)) = rest.next() {
        match c {
            '{' if rest.peek().map(|&(_, next)| next) == Some('{') => {
                rest.next();
                sql.push('{');
            }
            '{' => {
                let start = at + 1;
                let end = template[start..]
                    .find('}')
                    .map(|offset| start + offset)
                    .ok_or(TemplateError::Unterminated(at))?;
                let placeholder = &template[start..end];
                let param = Param::parse(placeholder)
                    .ok_or_else(|| TemplateError::UnknownPlaceholder(placeholder.to_string()))?;
                let position = if let Some(existing) = order.iter().position(|&p| p == param) {
                    existing
                } else {
                    binds.push(params.get(param).ok_or(TemplateError::MissingValue(param))?);
                    order.push(param);
                    order.len() - 1
                };
                sql.push('$');
                sql.push_str(&(position + 1).to_string());
                while rest.peek().is_some_and(|&(i, _)| i <= end) {
                    rest.next();
                }
            }
            '}' if rest.peek().map(|&(_, next)| next) == Some('}') => {
                rest.next();
                sql.push('}');
            }
            '}' => return Err(TemplateError::UnmatchedClose(at)),
            other => sql.push(other),
        }
    }

    Ok(Rendered { sql, binds })
}
