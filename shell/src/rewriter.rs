//! Turns shell literal markers into calls to the process executor.
//!
//! A marker is `~` applied directly to a string or f-string literal. Where it
//! sits decides how the command runs:
//!
//! | position                                     | variant                  |
//! |----------------------------------------------|--------------------------|
//! | whole expression statement                   | [`CaptureVariant::Stream`] |
//! | value assigned to a single name              | [`CaptureVariant::Single`] |
//! | value assigned to a tuple, list or `*rest`   | [`CaptureVariant::Triple`] |
//! | call argument, keyword value, attribute base | [`CaptureVariant::Single`] |
//!
//! Markers anywhere else, and `~` on anything but a string literal, are left
//! to mean bitwise inversion.

use crate::ast::{Expr, FStringPart, Handler, Module, Stmt, StmtKind, UnaryOp};
use crate::command::{CaptureVariant, SHELL_QUOTE};
use crate::quoting::is_inside_single_quotes;
use log::{debug, warn};
use std::mem;

/// Field format spec that splices a value into the command unquoted.
pub const RAW_SPEC: &str = "raw";

/// Rewrites every shell literal marker in `module`, in place.
///
/// Interpolated fields of f-string commands are wrapped in the quoting
/// utility unless their format spec is [`RAW_SPEC`], which is removed.
/// Returns the number of markers rewritten.
pub fn rewrite(module: &mut Module) -> usize {
    let mut rewriter = ShellRunner::default();
    rewriter.visit_body(&mut module.body);
    rewriter.rewritten
}

#[derive(Default)]
struct ShellRunner {
    line: usize,
    rewritten: usize,
}

impl ShellRunner {
    fn visit_body(&mut self, body: &mut [Stmt]) {
        for stmt in body {
            self.visit_stmt(stmt);
        }
    }

    fn visit_stmt(&mut self, stmt: &mut Stmt) {
        self.line = stmt.line;
        match &mut stmt.kind {
            StmtKind::Expr(value) => {
                self.modify_expr(value, CaptureVariant::Stream);
                self.visit_expr(value);
            }
            StmtKind::Assign { target, value } => {
                let variant = if target.is_sequence() {
                    CaptureVariant::Triple
                } else {
                    CaptureVariant::Single
                };
                self.modify_expr(value, variant);
                self.visit_expr(value);
            }
            StmtKind::Assert { test, msg } => {
                self.visit_expr(test);
                if let Some(msg) = msg {
                    self.visit_expr(msg);
                }
            }
            StmtKind::If { test, body, orelse } => {
                self.visit_expr(test);
                self.visit_body(body);
                self.visit_body(orelse);
            }
            StmtKind::While { test, body } => {
                self.visit_expr(test);
                self.visit_body(body);
            }
            StmtKind::For { iter, body, .. } => {
                self.visit_expr(iter);
                self.visit_body(body);
            }
            StmtKind::Try { body, handlers } => {
                self.visit_body(body);
                for Handler { body, .. } in handlers {
                    self.visit_body(body);
                }
            }
            StmtKind::Pass | StmtKind::Break | StmtKind::Continue => {}
        }
    }

    fn visit_expr(&mut self, expr: &mut Expr) {
        match expr {
            Expr::Call {
                func,
                args,
                keywords,
            } => {
                for arg in args.iter_mut() {
                    self.modify_expr(arg, CaptureVariant::Single);
                }
                for keyword in keywords.iter_mut() {
                    self.modify_expr(&mut keyword.value, CaptureVariant::Single);
                }
                self.visit_expr(func);
                for arg in args {
                    self.visit_expr(arg);
                }
                for keyword in keywords {
                    self.visit_expr(&mut keyword.value);
                }
            }
            Expr::Attribute { value, .. } => {
                self.modify_expr(value, CaptureVariant::Single);
                self.visit_expr(value);
            }
            Expr::Unary { operand, .. } => self.visit_expr(operand),
            Expr::Starred(inner) => self.visit_expr(inner),
            Expr::Binary { left, right, .. }
            | Expr::Compare { left, right, .. }
            | Expr::Logical { left, right, .. } => {
                self.visit_expr(left);
                self.visit_expr(right);
            }
            Expr::Subscript { value, index } => {
                self.visit_expr(value);
                self.visit_expr(index);
            }
            Expr::Tuple(items) | Expr::List(items) => {
                for item in items {
                    self.visit_expr(item);
                }
            }
            Expr::FString(parts) => {
                for part in parts {
                    if let FStringPart::Field { expr, .. } = part {
                        self.visit_expr(expr);
                    }
                }
            }
            Expr::Name(_) | Expr::Int(_) | Expr::Bool(_) | Expr::None | Expr::Str(_) => {}
        }
    }

    /// Replaces `expr` with a runner call if it is a marker.
    fn modify_expr(&mut self, expr: &mut Expr, variant: CaptureVariant) {
        let Expr::Unary {
            op: UnaryOp::Invert,
            operand,
        } = expr
        else {
            return;
        };
        if !matches!(**operand, Expr::Str(_) | Expr::FString(_)) {
            return;
        }

        let mut command = mem::replace(&mut **operand, Expr::None);
        if let Expr::FString(parts) = &mut command {
            self.quote_fields(parts);
        }
        debug!("line {}: shell literal runs as {:?}", self.line, variant);
        *expr = Expr::call(variant.runner(), vec![command]);
        self.rewritten += 1;
    }

    fn quote_fields(&mut self, parts: &mut [FStringPart]) {
        // Command text seen so far, with one placeholder character per field.
        let mut seen = String::new();
        for part in parts {
            match part {
                FStringPart::Literal(text) => seen.push_str(text),
                FStringPart::Field { expr, spec } => {
                    if spec.as_deref() == Some(RAW_SPEC) {
                        *spec = None;
                    } else {
                        if is_inside_single_quotes(&seen, usize::MAX) {
                            warn!(
                                "line {}: interpolated value is inside single quotes and will be quoted twice",
                                self.line
                            );
                        }
                        let value = mem::replace(&mut **expr, Expr::None);
                        let formatted = Expr::FString(vec![FStringPart::Field {
                            expr: Box::new(value),
                            spec: spec.take(),
                        }]);
                        **expr = Expr::call(SHELL_QUOTE, vec![formatted]);
                    }
                    seen.push('x');
                }
            }
        }
    }
}
