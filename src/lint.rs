//! Script linting
//!
//! A small rule set evaluated over the `oxc` AST. Findings never stop a
//! build on their own; the script task decides what to do with them.

use crate::config::{LintConfig, RuleLevel};
use oxc_allocator::Allocator;
use oxc_ast::ast::{Expression, VariableDeclarationKind};
use oxc_ast::{AstKind, Visit};
use oxc_parser::Parser;
use oxc_span::SourceType;
use oxc_syntax::operator::BinaryOperator;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Names of every built-in rule.
pub const RULE_NAMES: &[&str] = &["no-debugger", "no-eval", "no-console", "no-var", "eqeqeq"];

/// Rule name used for syntax errors.
pub const PARSE_ERROR: &str = "parse-error";

/// Severity of a reported finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A single lint finding with a 1-based position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintFinding {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
    pub rule: &'static str,
    pub severity: Severity,
    pub message: String,
}

impl LintFinding {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for LintFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {} [{}] {}",
            self.file.display(),
            self.line,
            self.column,
            self.severity,
            self.rule,
            self.message
        )
    }
}

/// Severity a rule has when the configuration does not mention it.
pub fn default_level(rule: &str) -> RuleLevel {
    match rule {
        "no-debugger" | "no-eval" => RuleLevel::Error,
        _ => RuleLevel::Warn,
    }
}

/// Configured linter
#[derive(Debug, Clone)]
pub struct Linter {
    enabled: bool,
    levels: HashMap<&'static str, RuleLevel>,
}

impl Linter {
    /// Build a linter from `[scripts.lint]`. Unknown rule names are ignored
    /// here; config validation reports them.
    pub fn new(config: &LintConfig) -> Self {
        let levels = RULE_NAMES
            .iter()
            .map(|&rule| {
                let level = config.rules.get(rule).copied().unwrap_or_else(|| default_level(rule));
                (rule, level)
            })
            .collect();
        Self { enabled: config.enabled, levels }
    }

    /// Severity of a rule, or `None` when it is off.
    pub fn severity(&self, rule: &str) -> Option<Severity> {
        match self.levels.get(rule).copied().unwrap_or(RuleLevel::Off) {
            RuleLevel::Error => Some(Severity::Error),
            RuleLevel::Warn => Some(Severity::Warning),
            RuleLevel::Off => None,
        }
    }

    /// Lint one script. Findings are ordered by position.
    pub fn lint(&self, path: &Path, source: &str) -> Vec<LintFinding> {
        if !self.enabled {
            return Vec::new();
        }

        let index = LineIndex::new(source);
        let allocator = Allocator::default();
        let source_type = SourceType::from_path(path).unwrap_or_default();
        let ret = Parser::new(&allocator, source, source_type).parse();

        if !ret.errors.is_empty() {
            return ret
                .errors
                .iter()
                .map(|error| {
                    let offset = error
                        .labels
                        .as_ref()
                        .and_then(|labels| labels.first())
                        .map(|label| label.offset())
                        .unwrap_or(0);
                    let (line, column) = index.position(offset);
                    LintFinding {
                        file: path.to_path_buf(),
                        line,
                        column,
                        rule: PARSE_ERROR,
                        severity: Severity::Error,
                        message: error.message.to_string(),
                    }
                })
                .collect();
        }

        let mut visitor = RuleVisitor { linter: self, hits: Vec::new() };
        visitor.visit_program(&ret.program);

        let mut findings: Vec<LintFinding> = visitor
            .hits
            .into_iter()
            .map(|hit| {
                let (line, column) = index.position(hit.offset as usize);
                LintFinding {
                    file: path.to_path_buf(),
                    line,
                    column,
                    rule: hit.rule,
                    severity: hit.severity,
                    message: hit.message,
                }
            })
            .collect();
        findings.sort_by_key(|f| (f.line, f.column));
        findings
    }
}

struct Hit {
    rule: &'static str,
    severity: Severity,
    offset: u32,
    message: String,
}

struct RuleVisitor<'l> {
    linter: &'l Linter,
    hits: Vec<Hit>,
}

impl RuleVisitor<'_> {
    fn hit(&mut self, rule: &'static str, offset: u32, message: String) {
        if let Some(severity) = self.linter.severity(rule) {
            self.hits.push(Hit { rule, severity, offset, message });
        }
    }
}

impl<'a> Visit<'a> for RuleVisitor<'_> {
    fn enter_node(&mut self, kind: AstKind<'a>) {
        match kind {
            AstKind::DebuggerStatement(stmt) => {
                self.hit("no-debugger", stmt.span.start, "Unexpected 'debugger' statement".into());
            }
            AstKind::VariableDeclaration(decl) => {
                if decl.kind == VariableDeclarationKind::Var {
                    self.hit(
                        "no-var",
                        decl.span.start,
                        "Unexpected var, use let or const instead".into(),
                    );
                }
            }
            AstKind::BinaryExpression(expr) => {
                let (found, wanted) = match expr.operator {
                    BinaryOperator::Equality => ("==", "==="),
                    BinaryOperator::Inequality => ("!=", "!=="),
                    _ => return,
                };
                self.hit(
                    "eqeqeq",
                    expr.span.start,
                    format!("Expected '{}' and instead saw '{}'", wanted, found),
                );
            }
            AstKind::CallExpression(call) => match &call.callee {
                Expression::Identifier(id) if id.name == "eval" => {
                    self.hit("no-eval", call.span.start, "eval can be harmful".into());
                }
                Expression::StaticMemberExpression(member) => {
                    if let Expression::Identifier(object) = &member.object {
                        if object.name == "console" {
                            self.hit(
                                "no-console",
                                call.span.start,
                                format!("Unexpected console.{} statement", member.property.name),
                            );
                        }
                    }
                }
                _ => {}
            },
            _ => {}
        }
    }
}

/// Maps byte offsets to 1-based line and column numbers.
struct LineIndex<'s> {
    source: &'s str,
    starts: Vec<usize>,
}

impl<'s> LineIndex<'s> {
    fn new(source: &'s str) -> Self {
        let mut starts = vec![0];
        starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
        Self { source, starts }
    }

    fn position(&self, offset: usize) -> (usize, usize) {
        let offset = offset.min(self.source.len());
        let line = self.starts.partition_point(|&start| start <= offset) - 1;
        let start = self.starts[line];
        let column = self.source.get(start..offset).map(|s| s.chars().count()).unwrap_or(0);
        (line + 1, column + 1)
    }
}
