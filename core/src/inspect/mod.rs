//! Cursor-sensitive analysis of a parsed document: which call the cursor sits
//! in, and which `let` names are visible there.

use tracing::trace;

use crate::{
    ast::{BinaryOp, Binding, Expr, ExprKind, Invocation, ParseResult, UnaryOp},
    settings::Settings,
    token::{CommonError, Position, Span},
    typ::{ExternalTypeRequest, TypeKind},
};


#[derive(Debug, Clone, PartialEq)]
pub struct Inspection {
    pub position: Position,
    pub invoke_expression: Option<InvokeExpression>,
    pub scope: Vec<ScopeItem>,
}

impl Inspection {
    pub fn scope_item(&self, name: &str) -> Option<&ScopeItem> {
        self.scope.iter().find(|item| item.name == name)
    }
}

/// The innermost call surrounding the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeExpression {
    /// Callee name, when the callee is a plain identifier
    pub name: Option<String>,
    /// Zero-based index of the argument the cursor is in
    pub argument_ordinal: u32,
    /// Arguments written so far
    pub num_arguments: u32,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeItemKind {
    LetVariable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeItem {
    pub name: String,
    pub name_span: Span,
    pub kind: ScopeItemKind,
    pub ty: TypeKind,
}

pub fn inspect(settings: &Settings, parse: &ParseResult, position: Position) -> Result<Inspection, CommonError> {
    let line_len = parse
        .line_lengths
        .get(position.line as usize)
        .copied()
        .ok_or(CommonError::InvalidPosition(position))?;
    if position.character > line_len {
        return Err(CommonError::InvalidPosition(position));
    }

    let mut best = None;
    find_invocation(&parse.root, position, &mut best);
    let invoke_expression = best.map(|(inv, span)| InvokeExpression {
        name: match &inv.callee.kind {
            ExprKind::Identifier(name) => Some(name.clone()),
            _ => None,
        },
        argument_ordinal: inv.separators.iter().filter(|sep| **sep < position).count() as u32,
        num_arguments: inv.arguments.iter().filter(|arg| !arg.is_missing()).count() as u32,
        span,
    });

    let mut scope = Vec::new();
    collect_scope(&parse.root, position, settings, &mut scope);

    trace!(
        %position,
        invoke = ?invoke_expression.as_ref().and_then(|i| i.name.as_deref()),
        scope = scope.len(),
        "inspect"
    );

    Ok(Inspection {
        position,
        invoke_expression,
        scope,
    })
}

fn contains(span: &Span, position: Position) -> bool {
    span.start <= position && position <= span.end
}

fn children(expr: &Expr) -> Vec<&Expr> {
    match &expr.kind {
        ExprKind::Missing
        | ExprKind::Identifier(_)
        | ExprKind::Number(_)
        | ExprKind::Text(_)
        | ExprKind::Logical(_)
        | ExprKind::Null => Vec::new(),
        ExprKind::List(items) => items.iter().collect(),
        ExprKind::Record(fields) => fields.iter().map(|f| &f.value).collect(),
        ExprKind::Let { bindings, body } => bindings
            .iter()
            .map(|b| &b.value)
            .chain(std::iter::once(body.as_ref()))
            .collect(),
        ExprKind::If {
            condition,
            then_branch,
            else_branch,
        } => vec![condition.as_ref(), then_branch.as_ref(), else_branch.as_ref()],
        ExprKind::Binary { lhs, rhs, .. } => vec![lhs.as_ref(), rhs.as_ref()],
        ExprKind::Unary { operand, .. } => vec![operand.as_ref()],
        ExprKind::Parenthesized(inner) => vec![inner.as_ref()],
        ExprKind::Invoke(inv) => std::iter::once(inv.callee.as_ref())
            .chain(inv.arguments.iter())
            .collect(),
    }
}

/// Children are visited after their parent, so the deepest match wins.
fn find_invocation<'e>(expr: &'e Expr, position: Position, best: &mut Option<(&'e Invocation, Span)>) {
    if let ExprKind::Invoke(inv) = &expr.kind {
        let after_open = inv.open < position;
        let before_close = inv.close.is_none_or(|close| position <= close);
        if after_open && before_close {
            *best = Some((inv, expr.span));
        }
    }
    for child in children(expr) {
        find_invocation(child, position, best);
    }
}

fn push_scope_item(scope: &mut Vec<ScopeItem>, item: ScopeItem) {
    // Inner bindings shadow outer ones
    scope.retain(|existing| existing.name != item.name);
    scope.push(item);
}

fn binding_span(binding: &Binding) -> Span {
    binding.name_span.cover(&binding.value.span)
}

fn collect_scope(expr: &Expr, position: Position, settings: &Settings, scope: &mut Vec<ScopeItem>) {
    if !contains(&expr.span, position) {
        return;
    }

    if let ExprKind::Let { bindings, body } = &expr.kind {
        let current = bindings.iter().position(|b| contains(&binding_span(b), position));
        for (idx, binding) in bindings.iter().enumerate() {
            if Some(idx) == current {
                continue;
            }
            let ty = infer_type(&binding.value, scope, settings);
            push_scope_item(
                scope,
                ScopeItem {
                    name: binding.name.clone(),
                    name_span: binding.name_span,
                    kind: ScopeItemKind::LetVariable,
                    ty,
                },
            );
        }
        match current {
            Some(idx) => collect_scope(&bindings[idx].value, position, settings, scope),
            None => collect_scope(body, position, settings, scope),
        }
        return;
    }

    for child in children(expr) {
        collect_scope(child, position, settings, scope);
    }
}

fn resolve_external(settings: &Settings, request: ExternalTypeRequest) -> TypeKind {
    settings
        .external_type_resolver
        .as_ref()
        .and_then(|resolver| resolver(&request))
        .unwrap_or(TypeKind::Any)
}

/// Shallow type inference; anything not obvious is `Any`.
pub fn infer_type(expr: &Expr, scope: &[ScopeItem], settings: &Settings) -> TypeKind {
    match &expr.kind {
        ExprKind::Missing => TypeKind::Any,
        ExprKind::Number(_) => TypeKind::Number,
        ExprKind::Text(_) => TypeKind::Text,
        ExprKind::Logical(_) => TypeKind::Logical,
        ExprKind::Null => TypeKind::Null,
        ExprKind::List(_) => TypeKind::List,
        ExprKind::Record(_) => TypeKind::Record,
        ExprKind::Identifier(name) => match scope.iter().rev().find(|item| &item.name == name) {
            Some(item) => item.ty,
            None => resolve_external(
                settings,
                ExternalTypeRequest::Value {
                    identifier: name.clone(),
                },
            ),
        },
        ExprKind::Parenthesized(inner) => infer_type(inner, scope, settings),
        ExprKind::Unary { op, operand } => match op {
            UnaryOp::Not => TypeKind::Logical,
            UnaryOp::Negate => match infer_type(operand, scope, settings) {
                TypeKind::Number => TypeKind::Number,
                _ => TypeKind::Any,
            },
        },
        ExprKind::Binary { op, lhs, rhs } => {
            let lhs = infer_type(lhs, scope, settings);
            let rhs = infer_type(rhs, scope, settings);
            match op {
                BinaryOp::Or
                | BinaryOp::And
                | BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::LessThan
                | BinaryOp::LessThanEqual
                | BinaryOp::GreaterThan
                | BinaryOp::GreaterThanEqual => TypeKind::Logical,
                BinaryOp::Add | BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide => {
                    if lhs == TypeKind::Number && rhs == TypeKind::Number {
                        TypeKind::Number
                    } else {
                        TypeKind::Any
                    }
                }
                BinaryOp::Concatenate => match (lhs, rhs) {
                    (TypeKind::Text, TypeKind::Text) => TypeKind::Text,
                    (TypeKind::List, TypeKind::List) => TypeKind::List,
                    (TypeKind::Record, TypeKind::Record) => TypeKind::Record,
                    _ => TypeKind::Any,
                },
            }
        }
        ExprKind::If {
            then_branch,
            else_branch,
            ..
        } => {
            let then_ty = infer_type(then_branch, scope, settings);
            let else_ty = infer_type(else_branch, scope, settings);
            if then_ty == else_ty { then_ty } else { TypeKind::Any }
        }
        ExprKind::Let { bindings, body } => {
            let mut inner: Vec<ScopeItem> = scope.to_vec();
            for binding in bindings {
                let ty = infer_type(&binding.value, &inner, settings);
                push_scope_item(
                    &mut inner,
                    ScopeItem {
                        name: binding.name.clone(),
                        name_span: binding.name_span,
                        kind: ScopeItemKind::LetVariable,
                        ty,
                    },
                );
            }
            infer_type(body, &inner, settings)
        }
        ExprKind::Invoke(inv) => match &inv.callee.kind {
            ExprKind::Identifier(name) if !scope.iter().any(|item| &item.name == name) => {
                let arguments = inv
                    .arguments
                    .iter()
                    .map(|arg| infer_type(arg, scope, settings))
                    .collect();
                resolve_external(
                    settings,
                    ExternalTypeRequest::Invocation {
                        identifier: name.clone(),
                        arguments,
                    },
                )
            }
            _ => TypeKind::Any,
        },
    }
}
