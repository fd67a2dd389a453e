// src/core/evaluator/calculator.rs

//! A small arithmetic evaluator with variables, used by the standalone server.

use super::expr::{self, Statement};
use super::{Evaluator, EvaluatorError};
use crate::connection::{ConnectionInfo, SessionOutput};
use crate::server::ConsoleHandler;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

const HELP_TEXT: &str = "\
Enter an arithmetic expression to evaluate it, e.g. (1 + 2) * 3
Assign with  name = expression  and reuse the name later.
Operators: + - * / % ^ and parentheses.
End a line with \\ or leave a parenthesis open to continue on the next line;
an empty line evaluates what has been entered so far.
Type exit or quit (or press Ctrl-D) to leave.
";

/// Variable storage. Clones share the same underlying map, so every session
/// created from one `CalculatorHandler` sees the same variables.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    vars: Arc<DashMap<String, f64>>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.vars.get(name).map(|v| *v.value())
    }

    pub fn set(&self, name: impl Into<String>, value: f64) {
        self.vars.insert(name.into(), value);
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// One session's calculator: its partially entered statement plus a handle to the shared namespace.
///
/// The partial statement is not capped while it is continued. It is only
/// bounded by the expression limits once it completes and is parsed.
#[derive(Debug)]
pub struct Calculator {
    namespace: Namespace,
    pending: Vec<String>,
}

impl Calculator {
    pub fn new(namespace: Namespace) -> Self {
        Self {
            namespace,
            pending: Vec::new(),
        }
    }

    /// True while a statement spans more than one line.
    pub fn is_continuing(&self) -> bool {
        !self.pending.is_empty()
    }

    fn run(&self, source: &str, out: &mut SessionOutput) {
        let statement = match expr::parse_statement(source) {
            Ok(stmt) => stmt,
            Err(e) => {
                out.write(&format!("Error: {e}\n"));
                return;
            }
        };

        let lookup = |name: &str| self.namespace.get(name);
        match statement {
            Statement::Assign(name, expr) => match expr::evaluate(&expr, &lookup) {
                Ok(value) => {
                    debug!("calculator: {} = {}", name, value);
                    self.namespace.set(name, value);
                }
                Err(e) => out.write(&format!("Error: {e}\n")),
            },
            Statement::Expr(expr) => match expr::evaluate(&expr, &lookup) {
                Ok(value) => out.write(&format!("{}\n", expr::format_number(value))),
                Err(e) => out.write(&format!("Error: {e}\n")),
            },
        }
    }
}

impl Evaluator for Calculator {
    fn push(&mut self, line: &str, out: &mut SessionOutput) -> Result<bool, EvaluatorError> {
        let trimmed = line.trim();

        if self.pending.is_empty() {
            match trimmed {
                "" => return Ok(false),
                "exit" | "quit" => return Err(EvaluatorError::Exit),
                "help" => {
                    out.write(HELP_TEXT);
                    return Ok(false);
                }
                _ => {}
            }
        } else if trimmed.is_empty() {
            let source = self.pending.join(" ");
            self.pending.clear();
            self.run(&source, out);
            return Ok(false);
        }

        let (text, continued) = match trimmed.strip_suffix('\\') {
            Some(head) => (head, true),
            None => (trimmed, false),
        };
        self.pending.push(text.to_string());

        let source = self.pending.join(" ");
        if continued || expr::paren_depth(&source) > 0 {
            return Ok(true);
        }

        self.pending.clear();
        self.run(&source, out);
        Ok(false)
    }

    fn banner(&self) -> String {
        format!(
            "{} {} calculator on {}\nType \"help\" for more information.",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS
        )
    }
}

/// Builds one `Calculator` per connection, all sharing a single namespace.
#[derive(Debug, Clone, Default)]
pub struct CalculatorHandler {
    namespace: Namespace,
}

impl CalculatorHandler {
    pub fn new(namespace: Namespace) -> Self {
        Self { namespace }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }
}

impl ConsoleHandler for CalculatorHandler {
    type Evaluator = Calculator;

    fn evaluator(&self, _info: &ConnectionInfo) -> Calculator {
        Calculator::new(self.namespace.clone())
    }
}
