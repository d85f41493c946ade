//! Evaluation of custom join constraints.
//!
//! Constraint expressions are pure boolean predicates over a typed
//! variable context: no I/O, no mutation, bounded execution, and every
//! evaluation is independent. The engine is an explicitly constructed,
//! injected instance so there is no hidden process-global state.

mod eval;
mod lexer;
mod parser;


use std::collections::BTreeMap;

use elevia_core::{AppError, AppResult};

/// A typed value bound to a context variable or produced by evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextValue {
    /// UTF-8 text.
    Text(String),
    /// Signed integer.
    Int(i64),
    /// Boolean.
    Bool(bool),
}

impl ContextValue {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Int(_) => "int",
            Self::Bool(_) => "bool",
        }
    }
}

/// Variables visible to one expression evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationContext {
    variables: BTreeMap<String, ContextValue>,
}

impl EvaluationContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a text variable.
    pub fn set_text(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.variables
            .insert(name.into(), ContextValue::Text(value.into()));
    }

    /// Binds an integer variable.
    pub fn set_int(&mut self, name: impl Into<String>, value: i64) {
        self.variables.insert(name.into(), ContextValue::Int(value));
    }

    /// Binds a boolean variable.
    pub fn set_bool(&mut self, name: impl Into<String>, value: bool) {
        self.variables.insert(name.into(), ContextValue::Bool(value));
    }

    fn get(&self, name: &str) -> Option<&ContextValue> {
        self.variables.get(name)
    }
}

/// One authoring-time problem found in an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpressionIssue {
    /// Stable machine-readable code.
    pub code: String,
    /// Byte offset into the expression text.
    pub offset: usize,
    /// Human-readable description.
    pub message: String,
}

/// A compile- or evaluation-time expression failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExpressionError {
    pub(crate) offset: usize,
    pub(crate) message: String,
}

impl ExpressionError {
    pub(crate) fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

/// Evaluates and lints custom join-constraint expressions.
#[derive(Debug, Clone)]
pub struct ConstraintEngine {
    max_expression_length: usize,
}

impl ConstraintEngine {
    /// Creates an engine with the default expression length cap.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_expression_length: 2048,
        }
    }

    /// Evaluates an expression against a context.
    ///
    /// Fails with [`AppError::InvalidExpression`] on any compile or
    /// evaluation error; a failure is never silently treated as `false`.
    pub fn evaluate(&self, expression: &str, context: &EvaluationContext) -> AppResult<bool> {
        let ast = self.compile(expression).map_err(|error| {
            AppError::InvalidExpression(format!(
                "'{expression}' failed to compile at offset {}: {}",
                error.offset, error.message
            ))
        })?;

        match eval::evaluate(&ast, context) {
            Ok(ContextValue::Bool(value)) => Ok(value),
            Ok(other) => Err(AppError::InvalidExpression(format!(
                "'{expression}' evaluates to {} instead of bool",
                other.type_name()
            ))),
            Err(error) => Err(AppError::InvalidExpression(format!(
                "'{expression}' failed to evaluate at offset {}: {}",
                error.offset, error.message
            ))),
        }
    }

    /// Reports authoring-time problems without executing the expression.
    #[must_use]
    pub fn lint(&self, expression: &str) -> Vec<ExpressionIssue> {
        match self.compile(expression) {
            Ok(_) => Vec::new(),
            Err(error) => vec![ExpressionIssue {
                code: "invalid-expression".to_owned(),
                offset: error.offset,
                message: error.message,
            }],
        }
    }

    fn compile(&self, expression: &str) -> Result<parser::Expr, ExpressionError> {
        if expression.trim().is_empty() {
            return Err(ExpressionError::new(0, "expression is empty"));
        }
        if expression.len() > self.max_expression_length {
            return Err(ExpressionError::new(
                self.max_expression_length,
                format!(
                    "expression exceeds the {} character limit",
                    self.max_expression_length
                ),
            ));
        }

        let tokens = lexer::tokenize(expression)?;
        parser::parse(&tokens)
    }
}

impl Default for ConstraintEngine {
    fn default() -> Self {
        Self::new()
    }
}
