//! Parser implementation: converts pest output to AST

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use crate::ast::*;
use crate::error::{ParseError, ParseResult};

#[derive(Parser)]
#[grammar = "grammar.pest"]
pub struct FlintParser;

/// Parse a flint program from source text
pub fn parse_program(source: &str) -> ParseResult<Program> {
    let pairs = FlintParser::parse(Rule::program, source)?;
    let pair = pairs.into_iter().next().unwrap();
    build_program(pair)
}

/// Parse a single expression (requires full input consumption)
pub fn parse_expression(source: &str) -> ParseResult<Expr> {
    let pairs = FlintParser::parse(Rule::standalone_expression, source)?;
    let pair = pairs.into_iter().next().unwrap();
    // The standalone_expression contains SOI ~ expression ~ EOI, extract the expression
    let inner = pair
        .into_inner()
        .find(|p| p.as_rule() == Rule::expression)
        .unwrap();
    build_expression(inner)
}

// =============================================================================
// Helper functions
// =============================================================================

fn span_from_pair(pair: &Pair<Rule>) -> Span {
    let pest_span = pair.as_span();
    Span::new(pest_span.start(), pest_span.end())
}

fn build_identifier(pair: Pair<Rule>) -> Identifier {
    debug_assert_eq!(pair.as_rule(), Rule::identifier);
    Identifier {
        name: pair.as_str().to_string(),
        span: span_from_pair(&pair),
    }
}

fn build_type_name(pair: Pair<Rule>) -> TypeName {
    debug_assert_eq!(pair.as_rule(), Rule::type_name);
    match pair.as_str() {
        "int" => TypeName::Int,
        "float" => TypeName::Float,
        "double" => TypeName::Double,
        "bool" => TypeName::Bool,
        "string" => TypeName::Str,
        "anon" => TypeName::Anon,
        "func" => TypeName::Func,
        "array" => TypeName::Array,
        "instance" => TypeName::Instance,
        "reflection" => TypeName::Reflection,
        "void" => TypeName::Void,
        other => unreachable!("unexpected type name: {other}"),
    }
}

fn build_modifier(pair: Pair<Rule>) -> Modifier {
    debug_assert_eq!(pair.as_rule(), Rule::modifier);
    match pair.as_str() {
        "const" => Modifier::Const,
        "readonly" => Modifier::Readonly,
        other => unreachable!("unexpected modifier: {other}"),
    }
}

/// Decode a string literal, resolving the escape sequences the grammar admits.
fn decode_string(pair: Pair<Rule>) -> String {
    debug_assert_eq!(pair.as_rule(), Rule::string_lit);
    let inner = pair.into_inner().next().unwrap();

    let mut result = String::new();
    let mut chars = inner.as_str().chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('t') => result.push('\t'),
                Some('r') => result.push('\r'),
                Some('"') => result.push('"'),
                Some('\\') => result.push('\\'),
                _ => {}
            }
        } else {
            result.push(c);
        }
    }
    result
}

// =============================================================================
// Program and statements
// =============================================================================

fn build_program(pair: Pair<Rule>) -> ParseResult<Program> {
    debug_assert_eq!(pair.as_rule(), Rule::program);
    let span = span_from_pair(&pair);

    let mut statements = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::statement => statements.push(build_statement(inner)?),
            Rule::EOI => {}
            _ => {}
        }
    }

    Ok(Program { statements, span })
}

fn build_statement(pair: Pair<Rule>) -> ParseResult<Stmt> {
    debug_assert_eq!(pair.as_rule(), Rule::statement);

    let inner = pair.into_inner().next().unwrap();
    let span = span_from_pair(&inner);

    let kind = match inner.as_rule() {
        Rule::block => StmtKind::Block(build_block(inner)?),
        Rule::if_stmt => build_if_stmt(inner)?,
        Rule::for_stmt => build_for_stmt(inner)?,
        Rule::while_stmt => {
            let mut parts = inner.into_inner();
            let condition = build_expression(parts.next().unwrap())?;
            let body = build_statement(parts.next().unwrap())?;
            StmtKind::While {
                condition,
                body: Box::new(body),
            }
        }
        Rule::fn_def => StmtKind::FnDef(build_fn_def(inner)?),
        Rule::class_def => StmtKind::ClassDef(build_class_def(inner)?),
        Rule::interface_def => StmtKind::InterfaceDef(build_interface_def(inner)?),
        Rule::print_stmt => {
            let expr = build_expression(inner.into_inner().next().unwrap())?;
            StmtKind::Print(expr)
        }
        Rule::quit_stmt => StmtKind::Quit,
        Rule::var_decl => build_var_decl_inner(inner.into_inner().next().unwrap())?,
        Rule::assign_stmt => build_assign_inner(inner.into_inner().next().unwrap())?,
        Rule::expr_stmt => {
            let expr = build_expression(inner.into_inner().next().unwrap())?;
            StmtKind::Expr(expr)
        }
        _ => unreachable!("unexpected statement: {:?}", inner.as_rule()),
    };

    Ok(Stmt { kind, span })
}

fn build_block(pair: Pair<Rule>) -> ParseResult<Vec<Stmt>> {
    debug_assert_eq!(pair.as_rule(), Rule::block);

    pair.into_inner()
        .filter(|p| p.as_rule() == Rule::statement)
        .map(build_statement)
        .collect()
}

fn build_var_decl_inner(pair: Pair<Rule>) -> ParseResult<StmtKind> {
    debug_assert_eq!(pair.as_rule(), Rule::var_decl_inner);

    let mut inner = pair.into_inner().peekable();

    let modifier = if inner.peek().map(|p| p.as_rule()) == Some(Rule::modifier) {
        build_modifier(inner.next().unwrap())
    } else {
        Modifier::None
    };
    let ty = build_type_name(inner.next().unwrap());
    let name = build_identifier(inner.next().unwrap());
    let init = inner.next().map(build_expression).transpose()?;

    Ok(StmtKind::VarDecl {
        modifier,
        ty,
        name,
        init,
    })
}

fn build_assign_inner(pair: Pair<Rule>) -> ParseResult<StmtKind> {
    debug_assert_eq!(pair.as_rule(), Rule::assign_inner);

    let mut inner = pair.into_inner();
    let target = build_lvalue(inner.next().unwrap())?;
    let value = build_expression(inner.next().unwrap())?;

    Ok(StmtKind::Assign { target, value })
}

fn build_if_stmt(pair: Pair<Rule>) -> ParseResult<StmtKind> {
    debug_assert_eq!(pair.as_rule(), Rule::if_stmt);

    let mut inner = pair.into_inner();
    let condition = build_expression(inner.next().unwrap())?;
    let then_branch = build_statement(inner.next().unwrap())?;
    let else_branch = inner
        .next()
        .map(build_statement)
        .transpose()?
        .map(Box::new);

    Ok(StmtKind::If {
        condition,
        then_branch: Box::new(then_branch),
        else_branch,
    })
}

fn build_for_stmt(pair: Pair<Rule>) -> ParseResult<StmtKind> {
    debug_assert_eq!(pair.as_rule(), Rule::for_stmt);

    let mut inner = pair.into_inner();
    let init = build_for_init(inner.next().unwrap())?;
    let condition = build_expression(inner.next().unwrap())?;
    let update = build_for_update(inner.next().unwrap())?;
    let body = build_statement(inner.next().unwrap())?;

    Ok(StmtKind::For {
        init: Box::new(init),
        condition,
        update: Box::new(update),
        body: Box::new(body),
    })
}

fn build_for_init(pair: Pair<Rule>) -> ParseResult<Stmt> {
    debug_assert_eq!(pair.as_rule(), Rule::for_init);
    let span = span_from_pair(&pair);

    let inner = pair.into_inner().next().unwrap();
    let kind = match inner.as_rule() {
        Rule::var_decl_inner => build_var_decl_inner(inner)?,
        Rule::assign_inner => build_assign_inner(inner)?,
        Rule::expression => StmtKind::Expr(build_expression(inner)?),
        _ => unreachable!("unexpected for initialiser: {:?}", inner.as_rule()),
    };

    Ok(Stmt { kind, span })
}

fn build_for_update(pair: Pair<Rule>) -> ParseResult<Stmt> {
    debug_assert_eq!(pair.as_rule(), Rule::for_update);
    let span = span_from_pair(&pair);

    let inner = pair.into_inner().next().unwrap();
    let kind = match inner.as_rule() {
        Rule::assign_inner => build_assign_inner(inner)?,
        Rule::expression => StmtKind::Expr(build_expression(inner)?),
        _ => unreachable!("unexpected for update: {:?}", inner.as_rule()),
    };

    Ok(Stmt { kind, span })
}

// =============================================================================
// Functions, classes and interfaces
// =============================================================================

fn build_fn_def(pair: Pair<Rule>) -> ParseResult<FnDef> {
    debug_assert_eq!(pair.as_rule(), Rule::fn_def);
    let span = span_from_pair(&pair);

    let mut inner = pair.into_inner();
    let return_type = build_type_name(inner.next().unwrap());
    let name = build_identifier(inner.next().unwrap());
    let params = build_param_list(inner.next().unwrap())?;
    let (body, return_expr) = build_fn_body(inner.next().unwrap())?;

    Ok(FnDef {
        return_type,
        name: Some(name),
        params,
        body,
        return_expr,
        span,
    })
}

fn build_param_list(pair: Pair<Rule>) -> ParseResult<Vec<Param>> {
    debug_assert_eq!(pair.as_rule(), Rule::param_list);

    let mut params = Vec::new();
    for param in pair.into_inner() {
        if param.as_rule() == Rule::param {
            let mut parts = param.into_inner();
            let ty = build_type_name(parts.next().unwrap());
            let name = build_identifier(parts.next().unwrap());
            params.push(Param { ty, name });
        }
    }
    Ok(params)
}

fn build_fn_body(pair: Pair<Rule>) -> ParseResult<(Vec<Stmt>, Option<Expr>)> {
    debug_assert_eq!(pair.as_rule(), Rule::fn_body);

    let mut body = Vec::new();
    let mut return_expr = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::statement => body.push(build_statement(inner)?),
            Rule::return_clause => {
                return_expr = Some(build_expression(inner.into_inner().next().unwrap())?);
            }
            _ => {}
        }
    }
    Ok((body, return_expr))
}

fn build_class_def(pair: Pair<Rule>) -> ParseResult<ClassDef> {
    debug_assert_eq!(pair.as_rule(), Rule::class_def);
    let span = span_from_pair(&pair);

    let mut inner = pair.into_inner();
    let name = build_identifier(inner.next().unwrap());

    let mut implements = Vec::new();
    let mut members = Vec::new();
    for part in inner {
        match part.as_rule() {
            Rule::implements_clause => {
                implements = part
                    .into_inner()
                    .filter(|p| p.as_rule() == Rule::identifier)
                    .map(build_identifier)
                    .collect();
            }
            Rule::class_member => members.push(build_class_member(part)?),
            _ => {}
        }
    }

    Ok(ClassDef {
        name,
        implements,
        members,
        span,
    })
}

fn build_class_member(pair: Pair<Rule>) -> ParseResult<ClassMember> {
    debug_assert_eq!(pair.as_rule(), Rule::class_member);

    let inner = pair.into_inner().next().unwrap();
    match inner.as_rule() {
        Rule::fn_def => Ok(ClassMember::Method(build_fn_def(inner)?)),
        Rule::class_def => Ok(ClassMember::NestedClass(build_class_def(inner)?)),
        Rule::constructor_def => {
            let span = span_from_pair(&inner);
            let mut parts = inner.into_inner();
            let name = build_identifier(parts.next().unwrap());
            let params = build_param_list(parts.next().unwrap())?;
            let body = build_block(parts.next().unwrap())?;
            Ok(ClassMember::Constructor {
                name,
                params,
                body,
                span,
            })
        }
        Rule::field_decl => {
            let mut parts = inner.into_inner().peekable();
            let modifier = if parts.peek().map(|p| p.as_rule()) == Some(Rule::modifier) {
                build_modifier(parts.next().unwrap())
            } else {
                Modifier::None
            };
            let ty = build_type_name(parts.next().unwrap());
            let name = build_identifier(parts.next().unwrap());
            let init = parts.next().map(build_expression).transpose()?;
            Ok(ClassMember::Field {
                modifier,
                ty,
                name,
                init,
            })
        }
        _ => unreachable!("unexpected class member: {:?}", inner.as_rule()),
    }
}

fn build_interface_def(pair: Pair<Rule>) -> ParseResult<InterfaceDef> {
    debug_assert_eq!(pair.as_rule(), Rule::interface_def);
    let span = span_from_pair(&pair);

    let mut inner = pair.into_inner();
    let name = build_identifier(inner.next().unwrap());

    let mut methods = Vec::new();
    for method in inner {
        if method.as_rule() == Rule::interface_method {
            let mut parts = method.into_inner();
            let return_type = build_type_name(parts.next().unwrap());
            let method_name = build_identifier(parts.next().unwrap());
            let params = build_param_list(parts.next().unwrap())?;
            methods.push(InterfaceMethod {
                return_type,
                name: method_name,
                param_types: params.into_iter().map(|p| p.ty).collect(),
            });
        }
    }

    Ok(InterfaceDef {
        name,
        methods,
        span,
    })
}

// =============================================================================
// Assignment targets
// =============================================================================

fn build_lvalue(pair: Pair<Rule>) -> ParseResult<LValue> {
    debug_assert_eq!(pair.as_rule(), Rule::lvalue);
    let span = span_from_pair(&pair);

    let mut inner = pair.into_inner();
    let root = build_identifier(inner.next().unwrap());

    let mut accessors = Vec::new();
    for accessor in inner {
        accessors.push(build_accessor(accessor)?);
    }

    Ok(LValue {
        root,
        accessors,
        span,
    })
}

fn build_accessor(pair: Pair<Rule>) -> ParseResult<Accessor> {
    debug_assert_eq!(pair.as_rule(), Rule::accessor);

    let inner = pair.into_inner().next().unwrap();
    match inner.as_rule() {
        Rule::member_accessor => {
            let ident = build_identifier(inner.into_inner().next().unwrap());
            Ok(Accessor::Member(ident))
        }
        Rule::index_accessor => {
            let index = build_expression(inner.into_inner().next().unwrap())?;
            Ok(Accessor::Index(index))
        }
        _ => unreachable!("unexpected accessor: {:?}", inner.as_rule()),
    }
}

/// Rewrite an already-built expression into an assignment target. Only plain
/// member/index chains rooted at an identifier qualify.
fn expr_to_lvalue(expr: Expr) -> ParseResult<LValue> {
    let span = expr.span;
    let mut accessors = Vec::new();
    let mut current = expr;

    loop {
        match current.kind {
            ExprKind::Identifier(root) => {
                accessors.reverse();
                return Ok(LValue {
                    root,
                    accessors,
                    span,
                });
            }
            ExprKind::MemberAccess { base, member } => {
                accessors.push(Accessor::Member(member));
                current = *base;
            }
            ExprKind::Index { base, index } => {
                accessors.push(Accessor::Index(*index));
                current = *base;
            }
            ExprKind::IncDec { .. } => return Err(ParseError::MixedIncrement),
            _ => return Err(ParseError::InvalidIncrementTarget),
        }
    }
}

// =============================================================================
// Expressions
// =============================================================================

fn build_expression(pair: Pair<Rule>) -> ParseResult<Expr> {
    debug_assert_eq!(pair.as_rule(), Rule::expression);

    let mut inner = pair.into_inner();
    let first = inner.next().unwrap();

    // Collect the flat operand/operator list
    let mut exprs = vec![build_prefix_expr(first)?];
    let mut ops = Vec::new();
    while let Some(op_pair) = inner.next() {
        ops.push(parse_binary_op(&op_pair)?);
        let right = inner.next().unwrap();
        exprs.push(build_prefix_expr(right)?);
    }

    // Reduce one precedence tier at a time, tightest first; runs of equal
    // precedence merge left to right.
    for precedence in (0..=5).rev() {
        let mut i = 0;
        while i < ops.len() {
            if ops[i].precedence() == precedence {
                let op = ops[i];
                let left = exprs.remove(i);
                let right = exprs.remove(i);
                let span = left.span.merge(right.span);
                exprs.insert(
                    i,
                    Expr {
                        kind: ExprKind::Binary {
                            op,
                            left: Box::new(left),
                            right: Box::new(right),
                        },
                        span,
                    },
                );
                ops.remove(i);
            } else {
                i += 1;
            }
        }
    }

    debug_assert_eq!(exprs.len(), 1);
    debug_assert!(ops.is_empty());

    Ok(exprs.pop().unwrap())
}

fn parse_binary_op(pair: &Pair<Rule>) -> ParseResult<BinaryOp> {
    let op = match pair.as_str() {
        "||" => BinaryOp::Or,
        "&&" => BinaryOp::And,
        "==" => BinaryOp::Eq,
        "!=" => BinaryOp::Ne,
        "<" => BinaryOp::Lt,
        "<=" => BinaryOp::Le,
        ">" => BinaryOp::Gt,
        ">=" => BinaryOp::Ge,
        "+" => BinaryOp::Add,
        "-" => BinaryOp::Sub,
        "*" => BinaryOp::Mul,
        "/" => BinaryOp::Div,
        "%" => BinaryOp::Mod,
        other => return Err(ParseError::UnknownOperator(other.to_string())),
    };
    Ok(op)
}

fn build_prefix_expr(pair: Pair<Rule>) -> ParseResult<Expr> {
    debug_assert_eq!(pair.as_rule(), Rule::prefix_expr);
    let span = span_from_pair(&pair);

    let mut inner = pair.into_inner().peekable();
    let mut ops = Vec::new();
    while inner.peek().map(|p| p.as_rule()) == Some(Rule::prefix_op) {
        ops.push(inner.next().unwrap());
    }

    let postfix = inner.next().unwrap();
    let mut expr = build_postfix_expr(postfix)?;

    // Apply prefix operators innermost-first
    for op_pair in ops.into_iter().rev() {
        expr = match op_pair.as_str() {
            "!" => unary(UnaryOp::Not, expr, span),
            "-" => unary(UnaryOp::Neg, expr, span),
            "+" => unary(UnaryOp::Plus, expr, span),
            "++" => incdec(IncDecOp::Increment, expr, span, true)?,
            "--" => incdec(IncDecOp::Decrement, expr, span, true)?,
            other => unreachable!("unexpected prefix operator: {other}"),
        };
    }

    Ok(expr)
}

fn unary(op: UnaryOp, operand: Expr, span: Span) -> Expr {
    Expr {
        kind: ExprKind::Unary {
            op,
            operand: Box::new(operand),
        },
        span,
    }
}

fn incdec(op: IncDecOp, operand: Expr, span: Span, prefix: bool) -> ParseResult<Expr> {
    let target = expr_to_lvalue(operand)?;
    Ok(Expr {
        kind: ExprKind::IncDec { target, op, prefix },
        span,
    })
}

fn build_postfix_expr(pair: Pair<Rule>) -> ParseResult<Expr> {
    debug_assert_eq!(pair.as_rule(), Rule::postfix_expr);

    let mut inner = pair.into_inner();
    let primary = inner.next().unwrap();
    let mut expr = build_primary(primary)?;

    for suffix in inner {
        expr = apply_postfix_suffix(expr, suffix)?;
    }

    Ok(expr)
}

fn apply_postfix_suffix(base: Expr, suffix: Pair<Rule>) -> ParseResult<Expr> {
    debug_assert_eq!(suffix.as_rule(), Rule::postfix_suffix);
    let span = base.span.merge(span_from_pair(&suffix));

    let inner = suffix.into_inner().next().unwrap();
    match inner.as_rule() {
        Rule::call_suffix => {
            let args = match inner.into_inner().next() {
                Some(list) => build_arg_list(list)?,
                None => Vec::new(),
            };
            Ok(Expr {
                kind: ExprKind::Call {
                    callee: Box::new(base),
                    args,
                },
                span,
            })
        }
        Rule::member_suffix => {
            let member = build_identifier(inner.into_inner().next().unwrap());
            Ok(Expr {
                kind: ExprKind::MemberAccess {
                    base: Box::new(base),
                    member,
                },
                span,
            })
        }
        Rule::index_suffix => {
            let index = build_expression(inner.into_inner().next().unwrap())?;
            Ok(Expr {
                kind: ExprKind::Index {
                    base: Box::new(base),
                    index: Box::new(index),
                },
                span,
            })
        }
        Rule::incdec_suffix => {
            let op = match inner.as_str() {
                "++" => IncDecOp::Increment,
                "--" => IncDecOp::Decrement,
                other => unreachable!("unexpected postfix operator: {other}"),
            };
            let target = expr_to_lvalue(base)?;
            Ok(Expr {
                kind: ExprKind::IncDec {
                    target,
                    op,
                    prefix: false,
                },
                span,
            })
        }
        _ => unreachable!("unexpected postfix suffix: {:?}", inner.as_rule()),
    }
}

fn build_arg_list(pair: Pair<Rule>) -> ParseResult<Vec<Expr>> {
    debug_assert_eq!(pair.as_rule(), Rule::arg_list);

    pair.into_inner()
        .filter(|p| p.as_rule() == Rule::expression)
        .map(build_expression)
        .collect()
}

fn build_primary(pair: Pair<Rule>) -> ParseResult<Expr> {
    debug_assert_eq!(pair.as_rule(), Rule::primary);
    let span = span_from_pair(&pair);

    let inner = pair.into_inner().next().unwrap();
    match inner.as_rule() {
        Rule::cast_expr => build_cast_expr(inner),
        Rule::new_expr => build_new_expr(inner),
        Rule::reflection_handle => {
            let class = decode_string(inner.into_inner().next().unwrap());
            Ok(Expr {
                kind: ExprKind::ReflectionHandle { class },
                span,
            })
        }
        Rule::lambda_expr => build_lambda_expr(inner),
        Rule::anon_literal => {
            let mut fields = Vec::new();
            for field in inner.into_inner() {
                if field.as_rule() == Rule::anon_field {
                    let mut parts = field.into_inner();
                    let name = build_identifier(parts.next().unwrap());
                    let value = build_expression(parts.next().unwrap())?;
                    fields.push((name, value));
                }
            }
            Ok(Expr {
                kind: ExprKind::AnonRecord { fields },
                span,
            })
        }
        Rule::literal => build_literal(inner),
        Rule::paren_expr => build_expression(inner.into_inner().next().unwrap()),
        Rule::identifier => Ok(Expr {
            kind: ExprKind::Identifier(build_identifier(inner)),
            span,
        }),
        _ => unreachable!("unexpected primary: {:?}", inner.as_rule()),
    }
}

fn build_cast_expr(pair: Pair<Rule>) -> ParseResult<Expr> {
    debug_assert_eq!(pair.as_rule(), Rule::cast_expr);
    let span = span_from_pair(&pair);

    let mut inner = pair.into_inner();
    let target_pair = inner.next().unwrap().into_inner().next().unwrap();
    let target = match target_pair.as_rule() {
        Rule::reflection_cast_target => {
            let class = decode_string(target_pair.into_inner().next().unwrap());
            CastTarget::HostClass(class)
        }
        Rule::type_name => CastTarget::Type(build_type_name(target_pair)),
        _ => unreachable!("unexpected cast target: {:?}", target_pair.as_rule()),
    };
    let operand = build_prefix_expr(inner.next().unwrap())?;

    Ok(Expr {
        kind: ExprKind::Cast {
            target,
            operand: Box::new(operand),
        },
        span,
    })
}

fn build_new_expr(pair: Pair<Rule>) -> ParseResult<Expr> {
    debug_assert_eq!(pair.as_rule(), Rule::new_expr);
    let span = span_from_pair(&pair);

    let inner = pair.into_inner().next().unwrap();
    match inner.as_rule() {
        Rule::reflection_ctor => {
            let mut class = None;
            let mut args = Vec::new();
            for part in inner.into_inner() {
                match part.as_rule() {
                    Rule::string_lit => class = Some(decode_string(part)),
                    Rule::expression => args.push(build_expression(part)?),
                    _ => {}
                }
            }
            Ok(Expr {
                kind: ExprKind::NewReflection {
                    class: class.unwrap(),
                    args,
                },
                span,
            })
        }
        Rule::array_ctor => {
            let mut parts = inner.into_inner();
            let elem_type = build_type_name(parts.next().unwrap());
            let length = build_expression(parts.next().unwrap())?;
            Ok(Expr {
                kind: ExprKind::NewArray {
                    elem_type,
                    length: Box::new(length),
                },
                span,
            })
        }
        Rule::instance_ctor => {
            let mut class_path = Vec::new();
            let mut args = Vec::new();
            for part in inner.into_inner() {
                match part.as_rule() {
                    Rule::identifier => class_path.push(build_identifier(part)),
                    Rule::member_accessor => {
                        class_path.push(build_identifier(part.into_inner().next().unwrap()));
                    }
                    Rule::arg_list => args = build_arg_list(part)?,
                    _ => {}
                }
            }
            Ok(Expr {
                kind: ExprKind::NewInstance { class_path, args },
                span,
            })
        }
        _ => unreachable!("unexpected constructor: {:?}", inner.as_rule()),
    }
}

fn build_lambda_expr(pair: Pair<Rule>) -> ParseResult<Expr> {
    debug_assert_eq!(pair.as_rule(), Rule::lambda_expr);
    let span = span_from_pair(&pair);

    let mut inner = pair.into_inner();
    let return_type = build_type_name(inner.next().unwrap());
    let params = build_param_list(inner.next().unwrap())?;
    let (body, return_expr) = build_fn_body(inner.next().unwrap())?;

    Ok(Expr {
        kind: ExprKind::Lambda(Box::new(FnDef {
            return_type,
            name: None,
            params,
            body,
            return_expr,
            span,
        })),
        span,
    })
}

fn build_literal(pair: Pair<Rule>) -> ParseResult<Expr> {
    debug_assert_eq!(pair.as_rule(), Rule::literal);
    let span = span_from_pair(&pair);

    let inner = pair.into_inner().next().unwrap();
    let kind = match inner.as_rule() {
        Rule::float_lit => {
            let text = inner.as_str();
            let digits = &text[..text.len() - 1];
            let value: f32 = digits
                .parse()
                .map_err(|_| ParseError::NumberOutOfRange(text.to_string()))?;
            ExprKind::Literal(Literal::Float(value))
        }
        Rule::double_lit => {
            let text = inner.as_str();
            let value: f64 = text
                .parse()
                .map_err(|_| ParseError::NumberOutOfRange(text.to_string()))?;
            ExprKind::Literal(Literal::Double(value))
        }
        Rule::int_lit => {
            let text = inner.as_str();
            let value: i64 = text
                .parse()
                .map_err(|_| ParseError::NumberOutOfRange(text.to_string()))?;
            ExprKind::Literal(Literal::Int(value))
        }
        Rule::bool_lit => ExprKind::Literal(Literal::Bool(inner.as_str() == "true")),
        Rule::string_lit => ExprKind::Literal(Literal::Str(decode_string(inner))),
        _ => unreachable!("unexpected literal: {:?}", inner.as_rule()),
    };

    Ok(Expr { kind, span })
}
