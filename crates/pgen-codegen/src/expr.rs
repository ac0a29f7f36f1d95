//! Expression code generation.
//!
//! Every function here returns the Rust text of one expression. Values are
//! produced owned: reading a non-`Copy` variable yields a `.clone()`.
//! [`emit_borrow`] is the exception, used where the result is only read
//! (indexing, `len()`, iteration).

use pgen_types::ast::*;
use pgen_types::ty::PType;

use crate::context::{EmitContext, FnKind, FuncScope};
use crate::error::{CodegenError, CodegenResult};
use crate::runtime::*;
use crate::types::*;

/// Emit an expression as an owned value of its own type.
pub fn emit_expr(expr: &Expr, ctx: &mut EmitContext<'_>, fs: &FuncScope<'_>) -> CodegenResult<String> {
    match &expr.kind {
        // ── Literals ──
        ExprKind::IntLit(v) => Ok(int_literal(*v)),
        ExprKind::FloatLit(v) => Ok(float_literal(*v)),
        ExprKind::BoolLit(b) => Ok(b.to_string()),
        ExprKind::StringLit(s) => Ok(string_literal(s)),
        ExprKind::NullLit => default_value(&expr.ty),
        ExprKind::Format { base, args } => emit_format(base, args, ctx, fs),

        // ── References ──
        ExprKind::Var(id) => emit_var(*id, ctx, fs, true),
        ExprKind::LinearRef { var, linear } => match linear {
            LinearKind::Move => emit_move(*var, ctx, fs),
            LinearKind::Swap => Err(CodegenError::unsupported(
                "swap",
                "swapped references have no lowering in the Rust target",
            )),
        },
        ExprKind::EnumElem(id) => Ok(int_literal(ctx.enum_elem(*id)?.value)),
        ExprKind::EventRef(id) => {
            ctx.event(*id)?;
            Ok(event_variant(&ctx.name(*id)?))
        }
        ExprKind::This => match fs.kind {
            FnKind::Method | FnKind::Free => Ok(format!("{}.index()", fs.receiver())),
            FnKind::Monitor => Err(CodegenError::unsupported(
                "this",
                "monitors have no machine identity",
            )),
        },

        // ── Operators ──
        ExprKind::Binary { op, left, right } => emit_binary(*op, left, right, &expr.ty, ctx, fs),
        ExprKind::Unary { op, operand } => {
            let operand = emit_expr(operand, ctx, fs)?;
            Ok(format!("({}{operand})", op.as_str()))
        }
        ExprKind::Cast(inner) | ExprKind::Coerce(inner) => emit_conversion(inner, &expr.ty, ctx, fs),
        ExprKind::Clone(inner) => emit_expr(inner, ctx, fs),

        // ── Nondeterminism ──
        ExprKind::Choose(None) | ExprKind::Nondet | ExprKind::FairNondet => {
            Ok(RANDOM_BOOL.to_string())
        }
        ExprKind::Choose(Some(bound)) => emit_choose(bound, ctx, fs),

        // ── Calls & Construction ──
        ExprKind::Call { function, args } => emit_call(*function, args, ctx, fs),
        ExprKind::Ctor { interface, args } => emit_create(*interface, args, ctx, fs),
        ExprKind::Default => default_value(&expr.ty),
        ExprKind::NamedTuple(values) => emit_named_tuple(values, &expr.ty, ctx, fs),
        ExprKind::Tuple(values) => emit_tuple(values, &expr.ty, ctx, fs),

        // ── Collections ──
        ExprKind::Contains { item, collection } => emit_contains(item, collection, ctx, fs),
        ExprKind::Sizeof(collection) => match collection.ty.canonical() {
            PType::Seq(_) | PType::NamedTuple(_) | PType::Tuple(_) => {
                Ok(format!("({}.len() as i32)", emit_borrow(collection, ctx, fs)?))
            }
            other => Err(unsupported_collection("sizeof", other)),
        },
        ExprKind::Keys(collection) | ExprKind::Values(collection) => {
            Err(unsupported_collection(expr.kind.tag(), &collection.ty))
        }

        // ── Access ──
        ExprKind::MapAccess { map, .. } => Err(unsupported_collection("map access", &map.ty)),
        ExprKind::SetAccess { set, .. } => Err(unsupported_collection("set access", &set.ty)),
        ExprKind::NamedTupleAccess { tuple, field } => {
            let tuple = emit_borrow(tuple, ctx, fs)?;
            Ok(format!("{tuple}[{field:?}]{}", unbox_accessor(&expr.ty)?))
        }
        ExprKind::TupleAccess { tuple, index } => {
            let tuple = emit_borrow(tuple, ctx, fs)?;
            Ok(format!("{tuple}[\"{index}\"]{}", unbox_accessor(&expr.ty)?))
        }
        ExprKind::SeqAccess { seq, index } => {
            let seq = emit_borrow(seq, ctx, fs)?;
            let index = emit_expr(index, ctx, fs)?;
            Ok(format!("{seq}[&({index})]{}", unbox_accessor(&expr.ty)?))
        }
    }
}

/// Emit an expression converted to `expected`: `null` becomes the default of
/// `expected`, and int/float cross with `as`.
pub fn emit_expr_as(
    expr: &Expr,
    expected: &PType,
    ctx: &mut EmitContext<'_>,
    fs: &FuncScope<'_>,
) -> CodegenResult<String> {
    if expected.is_null() {
        return emit_expr(expr, ctx, fs);
    }
    if expr.ty.is_null() || matches!(expr.kind, ExprKind::NullLit) {
        return default_value(expected);
    }
    let code = emit_expr(expr, ctx, fs)?;
    Ok(match (expr.ty.canonical(), expected.canonical()) {
        (PType::Int | PType::Enum(_), PType::Float) => format!("({code} as f64)"),
        (PType::Float, PType::Int | PType::Enum(_)) => format!("({code} as i32)"),
        _ => code,
    })
}

/// Emit an expression that is only read from. Variables are not cloned.
pub fn emit_borrow(expr: &Expr, ctx: &mut EmitContext<'_>, fs: &FuncScope<'_>) -> CodegenResult<String> {
    match &expr.kind {
        ExprKind::Var(id) => emit_var(*id, ctx, fs, false),
        _ => emit_expr(expr, ctx, fs),
    }
}

/// The value-union form of an expression.
pub fn emit_boxed(expr: &Expr, ctx: &mut EmitContext<'_>, fs: &FuncScope<'_>) -> CodegenResult<String> {
    if expr.ty.is_null() {
        return Ok(VALUE_DEFAULT.to_string());
    }
    let code = emit_expr(expr, ctx, fs)?;
    box_value(&expr.ty, &code)
}

/// The payload of an event or creation request built from `args`: nothing,
/// the single boxed argument, or a tuple with keys `"0"`, `"1"`, ...
pub fn emit_payload(args: &[Expr], ctx: &mut EmitContext<'_>, fs: &FuncScope<'_>) -> CodegenResult<String> {
    match args {
        [] => Ok(VALUE_DEFAULT.to_string()),
        [single] => emit_boxed(single, ctx, fs),
        many => {
            let keys: Vec<String> = (0..many.len()).map(|i| i.to_string()).collect();
            let mut entries = Vec::with_capacity(many.len());
            for (key, arg) in keys.iter().zip(many) {
                entries.push((key.as_str(), emit_boxed(arg, ctx, fs)?));
            }
            Ok(format!("{VALUE_NAMED_TUPLE}({})", hashmap_literal(&entries)))
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Variables
// ══════════════════════════════════════════════════════════════════════════════

/// The place expression of a variable (`self.count` or `count`).
pub fn var_place(id: DeclId, ctx: &EmitContext<'_>, fs: &FuncScope<'_>) -> CodegenResult<String> {
    let var = ctx.variable(id)?;
    let name = ctx.name(id)?;
    match var.role {
        VariableRole::Field => {
            if fs.is_free() {
                return Err(CodegenError::internal(format!(
                    "field {} used outside its machine",
                    var.name
                )));
            }
            Ok(format!("self.{name}"))
        }
        VariableRole::Param | VariableRole::Local => Ok(name),
    }
}

fn emit_var(id: DeclId, ctx: &EmitContext<'_>, fs: &FuncScope<'_>, owned: bool) -> CodegenResult<String> {
    let place = var_place(id, ctx, fs)?;
    let ty = &ctx.variable(id)?.ty;
    if owned && !is_copy(ty) {
        Ok(format!("{place}.clone()"))
    } else {
        Ok(place)
    }
}

/// Read a variable by moving its value out, leaving a default behind.
pub fn emit_move(id: DeclId, ctx: &EmitContext<'_>, fs: &FuncScope<'_>) -> CodegenResult<String> {
    let place = var_place(id, ctx, fs)?;
    let ty = &ctx.variable(id)?.ty;
    if is_copy(ty) {
        Ok(place)
    } else if ty.is_machine_ref() {
        Ok(format!("{place}.clone()"))
    } else {
        map_type(ty)?;
        Ok(format!("std::mem::take(&mut {place})"))
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Literals
// ══════════════════════════════════════════════════════════════════════════════

pub fn float_literal(v: f64) -> String {
    if v.is_nan() {
        return "f64::NAN".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "f64::INFINITY" } else { "f64::NEG_INFINITY" }.to_string();
    }
    let text = format!("{v:?}");
    if text.starts_with('-') {
        format!("({text})")
    } else {
        text
    }
}

pub fn string_literal(s: &str) -> String {
    format!("String::from({s:?})")
}

/// `format("{0} of {1}", a, b)` → `format!("{} of {}", a, b)`.
fn emit_format(base: &str, args: &[Expr], ctx: &mut EmitContext<'_>, fs: &FuncScope<'_>) -> CodegenResult<String> {
    let mut rendered = Vec::with_capacity(args.len());
    for arg in args {
        let spec = if is_displayable(&arg.ty) { "{}" } else { "{:?}" };
        rendered.push((spec, emit_expr(arg, ctx, fs)?));
    }

    let mut template = String::new();
    let mut used = Vec::new();
    let mut rest = base;
    while let Some(c) = rest.chars().next() {
        match c {
            '{' => {
                let close = rest.find('}');
                let index = close.and_then(|end| rest[1..end].parse::<usize>().ok());
                match (close, index) {
                    (Some(end), Some(i)) => {
                        let (spec, code) = rendered.get(i).ok_or_else(|| {
                            CodegenError::internal(format!(
                                "format placeholder {{{i}}} has no argument"
                            ))
                        })?;
                        template.push_str(spec);
                        used.push(code.clone());
                        rest = &rest[end + 1..];
                    }
                    _ => {
                        template.push_str("{{");
                        rest = &rest[1..];
                    }
                }
            }
            '}' => {
                template.push_str("}}");
                rest = &rest[1..];
            }
            other => {
                template.push(other);
                rest = &rest[other.len_utf8()..];
            }
        }
    }

    if used.is_empty() {
        Ok(format!("format!({template:?})"))
    } else {
        Ok(format!("format!({template:?}, {})", used.join(", ")))
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Operators & Conversions
// ══════════════════════════════════════════════════════════════════════════════

fn emit_binary(
    op: BinOp,
    left: &Expr,
    right: &Expr,
    result: &PType,
    ctx: &mut EmitContext<'_>,
    fs: &FuncScope<'_>,
) -> CodegenResult<String> {
    if op.is_equality() {
        return emit_equality(op, left, right, ctx, fs);
    }
    let l = emit_expr(left, ctx, fs)?;
    let r = emit_expr(right, ctx, fs)?;
    if op == BinOp::Add && matches!(result.canonical(), PType::String) {
        return Ok(format!("format!(\"{{}}{{}}\", {l}, {r})"));
    }
    Ok(format!("({l} {} {r})", op.as_str()))
}

/// Primitive operands compare natively; everything else through the value
/// union's structural comparison. A `null` operand takes the other side's
/// type, so it equals what `x = null` stores.
fn emit_equality(
    op: BinOp,
    left: &Expr,
    right: &Expr,
    ctx: &mut EmitContext<'_>,
    fs: &FuncScope<'_>,
) -> CodegenResult<String> {
    let (left_ty, right_ty) = match (is_null_operand(left), is_null_operand(right)) {
        (true, false) => (&right.ty, &right.ty),
        (false, true) => (&left.ty, &left.ty),
        _ => (&left.ty, &right.ty),
    };
    if is_natively_comparable(left_ty) && is_natively_comparable(right_ty) {
        let l = emit_expr_as(left, left_ty, ctx, fs)?;
        let r = emit_expr_as(right, right_ty, ctx, fs)?;
        return Ok(format!("({l} {} {r})", op.as_str()));
    }
    let l = emit_boxed_as(left, left_ty, ctx, fs)?;
    let r = emit_boxed_as(right, right_ty, ctx, fs)?;
    let equals = format!("{VALUE_EQUALS}(&{l}, &{r})");
    Ok(match op {
        BinOp::Ne => format!("(!{equals})"),
        _ => equals,
    })
}

fn is_null_operand(expr: &Expr) -> bool {
    expr.ty.is_null() || matches!(expr.kind, ExprKind::NullLit)
}

fn emit_boxed_as(
    expr: &Expr,
    ty: &PType,
    ctx: &mut EmitContext<'_>,
    fs: &FuncScope<'_>,
) -> CodegenResult<String> {
    if ty.is_null() {
        return emit_boxed(expr, ctx, fs);
    }
    let code = emit_expr_as(expr, ty, ctx, fs)?;
    box_value(ty, &code)
}

fn emit_conversion(
    inner: &Expr,
    target: &PType,
    ctx: &mut EmitContext<'_>,
    fs: &FuncScope<'_>,
) -> CodegenResult<String> {
    if inner.ty.is_null() && !target.is_null() {
        return default_value(target);
    }
    let code = emit_expr(inner, ctx, fs)?;
    let (src, dst) = (inner.ty.canonical(), target.canonical());
    match (src, dst) {
        (PType::Int | PType::Enum(_), PType::Float) => Ok(format!("({code} as f64)")),
        (PType::Float, PType::Int | PType::Enum(_)) => Ok(format!("({code} as i32)")),
        _ if src == dst => Ok(code),
        (PType::Int | PType::Enum(_), PType::Int | PType::Enum(_)) => Ok(code),
        _ if src.is_machine_ref() && dst.is_machine_ref() => Ok(code),
        _ if map_type(src)? == map_type(dst)? => Ok(code),
        _ => Err(CodegenError::unsupported(
            "cast",
            format!("no conversion from {src} to {dst}"),
        )),
    }
}

fn emit_choose(bound: &Expr, ctx: &mut EmitContext<'_>, fs: &FuncScope<'_>) -> CodegenResult<String> {
    match bound.ty.canonical() {
        PType::Int => Ok(format!("{RANDOM_INT}({})", emit_expr(bound, ctx, fs)?)),
        PType::Seq(elem) => {
            let accessor = unbox_accessor(elem)?;
            let seq = emit_borrow(bound, ctx, fs)?;
            let tmp_seq = ctx.names.fresh_temp("seq");
            let tmp_idx = ctx.names.fresh_temp("idx");
            Ok(format!(
                "{{ let {tmp_seq} = &{seq}; let {tmp_idx} = {RANDOM_INT}({tmp_seq}.len() as i32); {tmp_seq}[&{tmp_idx}]{accessor} }}"
            ))
        }
        other => Err(unsupported_collection("choose", other)),
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Calls & Construction
// ══════════════════════════════════════════════════════════════════════════════

/// A call to a method (`self.f(..)`) or a free function, which receives the
/// calling machine as a trailing argument.
pub fn emit_call(
    function: DeclId,
    args: &[Expr],
    ctx: &mut EmitContext<'_>,
    fs: &FuncScope<'_>,
) -> CodegenResult<String> {
    let callee = ctx.function(function)?;
    if callee.is_foreign {
        return Err(CodegenError::unsupported(
            "foreign function",
            format!("{} has no body to call in the Rust target", callee.name),
        ));
    }
    if args.len() != callee.params.len() {
        return Err(CodegenError::internal(format!(
            "{} takes {} arguments but {} were supplied",
            callee.name,
            callee.params.len(),
            args.len()
        )));
    }
    let mut codes = Vec::with_capacity(args.len() + 1);
    for (arg, param) in args.iter().zip(&callee.params) {
        codes.push(emit_expr_as(arg, &param.ty, ctx, fs)?);
    }
    let name = ctx.name(function)?;

    match callee.owner {
        Some(owner) => {
            if fs.machine.map(|m| m.id) != Some(owner) {
                return Err(CodegenError::internal(format!(
                    "method {} called outside its machine",
                    callee.name
                )));
            }
            Ok(format!("self.{name}({})", codes.join(", ")))
        }
        None => match fs.kind {
            FnKind::Free => {
                codes.push(CURRENT_MACHINE.to_string());
                Ok(format!("{name}({})", codes.join(", ")))
            }
            FnKind::Method => {
                codes.push("self".to_string());
                Ok(format!(
                    "{}::{name}({})",
                    ctx.options.global_functions_module,
                    codes.join(", ")
                ))
            }
            FnKind::Monitor => Err(CodegenError::unsupported(
                "call",
                format!("monitors cannot call the free function {}", callee.name),
            )),
        },
    }
}

/// `new M(args)`: a synchronous create round trip yielding the new index.
pub fn emit_create(
    interface: DeclId,
    args: &[Expr],
    ctx: &mut EmitContext<'_>,
    fs: &FuncScope<'_>,
) -> CodegenResult<String> {
    if fs.is_monitor() {
        return Err(CodegenError::unsupported("new", "monitors cannot create machines"));
    }
    let machine = ctx.creatable_machine(interface)?;
    let payload = emit_payload(args, ctx, fs)?;
    Ok(format!("{}.create_machine({machine:?}, {payload})", fs.receiver()))
}

fn emit_named_tuple(
    values: &[Expr],
    ty: &PType,
    ctx: &mut EmitContext<'_>,
    fs: &FuncScope<'_>,
) -> CodegenResult<String> {
    let PType::NamedTuple(fields) = ty.canonical() else {
        return Err(CodegenError::internal(format!("named tuple literal typed as {ty}")));
    };
    if fields.len() != values.len() {
        return Err(CodegenError::internal(format!(
            "named tuple literal has {} values for type {ty}",
            values.len()
        )));
    }
    let mut entries = Vec::with_capacity(values.len());
    for (field, value) in fields.iter().zip(values) {
        let code = emit_expr_as(value, &field.ty, ctx, fs)?;
        entries.push((field.name.as_str(), box_value(&field.ty, &code)?));
    }
    Ok(hashmap_literal(&entries))
}

fn emit_tuple(
    values: &[Expr],
    ty: &PType,
    ctx: &mut EmitContext<'_>,
    fs: &FuncScope<'_>,
) -> CodegenResult<String> {
    let elem_types: Vec<PType> = match ty.canonical() {
        PType::Tuple(elems) if elems.len() == values.len() => elems.clone(),
        _ => values.iter().map(|v| v.ty.clone()).collect(),
    };
    let keys: Vec<String> = (0..values.len()).map(|i| i.to_string()).collect();
    let mut entries = Vec::with_capacity(values.len());
    for ((key, value), elem_ty) in keys.iter().zip(values).zip(&elem_types) {
        let code = emit_expr_as(value, elem_ty, ctx, fs)?;
        entries.push((key.as_str(), box_value(elem_ty, &code)?));
    }
    Ok(hashmap_literal(&entries))
}

// ══════════════════════════════════════════════════════════════════════════════
// Collections
// ══════════════════════════════════════════════════════════════════════════════

fn emit_contains(
    item: &Expr,
    collection: &Expr,
    ctx: &mut EmitContext<'_>,
    fs: &FuncScope<'_>,
) -> CodegenResult<String> {
    let PType::Seq(elem) = collection.ty.canonical() else {
        return Err(unsupported_collection("in", &collection.ty));
    };
    let needle = emit_expr_as(item, elem, ctx, fs)?;
    let needle = box_value(elem, &needle)?;
    let haystack = emit_borrow(collection, ctx, fs)?;
    let v = ctx.names.fresh_temp("v");
    Ok(format!(
        "{haystack}.values().any(|{v}| {VALUE_EQUALS}({v}, &{needle}))"
    ))
}

fn unsupported_collection(construct: &str, ty: &PType) -> CodegenError {
    CodegenError::unsupported(construct, format!("not available on {ty} in the Rust target"))
}
