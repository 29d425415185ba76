//! Expression evaluation.

use plwasm_ast::{BinaryOp, Expr, ExprKind, Literal, Position, TypeRef, UnaryOp};

use super::{Evaluator, ResolvedKind};
use crate::error::EvalError;
use crate::pattern::{Pattern, PatternValue};
use crate::value::Value;

impl<'p> Evaluator<'p, '_> {
    pub(super) fn eval_expr(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        self.nest(expr.pos)?;
        let value = self.eval_expr_kind(expr);
        self.nesting -= 1;
        value
    }

    fn eval_expr_kind(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        let pos = expr.pos;
        match &expr.kind {
            ExprKind::Literal(literal) => Ok(match literal {
                Literal::Integer(v) => Value::Unsigned(*v),
                Literal::Float(v) => Value::Float(*v),
                Literal::Str(s) => Value::Str(s.clone()),
                Literal::Char(c) => Value::Char(*c),
                Literal::Bool(b) => Value::Bool(*b),
            }),
            ExprKind::Ident(name) => self.lookup(name, pos),
            ExprKind::Cursor => Ok(Value::Unsigned(self.cursor.into())),
            ExprKind::Member { base, field } => {
                let base = self.eval_expr(base)?;
                member(base, field, pos)
            }
            ExprKind::Index { base, index } => {
                let base = self.eval_expr(base)?;
                let index = self.eval_u64(index)?;
                element(base, index, pos)
            }
            ExprKind::Call { callee, args } => self.call(callee, args, pos),
            ExprKind::Unary { op, operand } => {
                let value = self.eval_expr(operand)?;
                unary_op(*op, value, pos)
            }
            ExprKind::Binary {
                op: BinaryOp::And,
                lhs,
                rhs,
            } => Ok(Value::Bool(
                self.eval_condition(lhs)? && self.eval_condition(rhs)?,
            )),
            ExprKind::Binary {
                op: BinaryOp::Or,
                lhs,
                rhs,
            } => Ok(Value::Bool(
                self.eval_condition(lhs)? || self.eval_condition(rhs)?,
            )),
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.eval_expr(lhs)?;
                let rhs = self.eval_expr(rhs)?;
                self.binary_op(*op, lhs, rhs, pos)
            }
            ExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => {
                if self.eval_condition(cond)? {
                    self.eval_expr(then_expr)
                } else {
                    self.eval_expr(else_expr)
                }
            }
            ExprKind::SizeOf(operand) => self.size_of(operand, pos),
            ExprKind::AddressOf(operand) => match self.pattern_of(operand)? {
                Some(pattern) => Ok(Value::Unsigned(pattern.offset.into())),
                None => Err(EvalError::evaluation(
                    "addressof requires a placed pattern",
                    pos,
                )),
            },
        }
    }

    pub(super) fn eval_condition(&mut self, expr: &Expr) -> Result<bool, EvalError> {
        let value = self.eval_expr(expr)?;
        value.truthy().ok_or_else(|| {
            EvalError::evaluation(
                format!("{} cannot be used as a condition", value.type_name()),
                expr.pos,
            )
        })
    }

    pub(super) fn eval_integer(&mut self, expr: &Expr) -> Result<u128, EvalError> {
        let value = self.eval_expr(expr)?;
        match value {
            Value::Float(_) | Value::Str(_) | Value::Pattern(_) | Value::Void => {
                Err(EvalError::evaluation(
                    format!("expected an integer, got {}", value.type_name()),
                    expr.pos,
                ))
            }
            other => other.as_u128().ok_or_else(|| {
                EvalError::evaluation("expected an integer", expr.pos)
            }),
        }
    }

    pub(super) fn eval_u64(&mut self, expr: &Expr) -> Result<u64, EvalError> {
        let value = self.eval_expr(expr)?;
        self.value_to_u64(&value, expr.pos)
    }

    pub(super) fn value_to_u64(&self, value: &Value, pos: Position) -> Result<u64, EvalError> {
        match value {
            Value::Signed(v) if *v < 0 => Err(EvalError::evaluation(
                format!("expected a non-negative value, got {v}"),
                pos,
            )),
            Value::Float(_) | Value::Str(_) | Value::Pattern(_) | Value::Void => {
                Err(EvalError::evaluation(
                    format!("expected an integer, got {}", value.type_name()),
                    pos,
                ))
            }
            other => other
                .as_u128()
                .and_then(|v| u64::try_from(v).ok())
                .ok_or_else(|| EvalError::evaluation("value does not fit in 64 bits", pos)),
        }
    }

    /// Resolves a name to a local, a placed pattern or an enum variant.
    pub(super) fn lookup(&mut self, name: &str, pos: Position) -> Result<Value, EvalError> {
        for index in self.visible_frames() {
            let frame = &self.frames[index];
            if let Some(local) = frame.locals.get(name) {
                return Ok(local.value.clone());
            }
            if let Some(pattern) = frame.field(name) {
                return Ok(Value::from_pattern(pattern));
            }
        }

        if let Some((type_name, variant)) = name.rsplit_once("::") {
            return self.enum_variant(type_name, variant, pos);
        }

        Err(EvalError::evaluation(
            format!("unknown variable '{name}'"),
            pos,
        ))
    }

    fn enum_variant(
        &mut self,
        type_name: &str,
        variant: &str,
        pos: Position,
    ) -> Result<Value, EvalError> {
        let ty = self.resolve_type(&TypeRef::new(type_name, pos))?;
        let ResolvedKind::Enum(decl, _) = ty.kind else {
            return Err(EvalError::evaluation(
                format!("type '{type_name}' is not an enum"),
                pos,
            ));
        };
        self.enum_variants(decl)?
            .into_iter()
            .find(|(name, _)| name == variant)
            .map(|(_, value)| Value::Unsigned(value))
            .ok_or_else(|| {
                EvalError::evaluation(
                    format!("enum '{type_name}' has no variant '{variant}'"),
                    pos,
                )
            })
    }

    /// Returns the placed pattern an expression names, if it names one.
    pub(super) fn pattern_of(&mut self, expr: &Expr) -> Result<Option<Pattern>, EvalError> {
        match &expr.kind {
            ExprKind::Ident(name) => {
                for index in self.visible_frames() {
                    let frame = &self.frames[index];
                    if frame.locals.contains_key(name) {
                        return Ok(None);
                    }
                    if let Some(pattern) = frame.field(name) {
                        return Ok(Some(pattern.clone()));
                    }
                }
                Ok(None)
            }
            ExprKind::Member { base, field } => Ok(self
                .pattern_of(base)?
                .and_then(|pattern| pattern.member(field).cloned())),
            ExprKind::Index { base, index } => {
                let Some(pattern) = self.pattern_of(base)? else {
                    return Ok(None);
                };
                let index = self.eval_u64(index)?;
                Ok(match pattern.value {
                    PatternValue::Array(mut entries) if (index as usize) < entries.len() => {
                        Some(entries.swap_remove(index as usize))
                    }
                    _ => None,
                })
            }
            _ => Ok(None),
        }
    }

    fn is_variable(&self, name: &str) -> bool {
        self.visible_frames().into_iter().any(|index| {
            let frame = &self.frames[index];
            frame.locals.contains_key(name) || frame.field(name).is_some()
        })
    }

    fn size_of(&mut self, operand: &Expr, pos: Position) -> Result<Value, EvalError> {
        if let ExprKind::Ident(name) = &operand.kind {
            if !self.is_variable(name) {
                if let Ok(ty) = self.resolve_type(&TypeRef::new(name.as_str(), pos)) {
                    return self.type_size(ty.kind, name, pos).map(Value::Unsigned);
                }
            }
        }

        if let Some(pattern) = self.pattern_of(operand)? {
            return Ok(Value::Unsigned(pattern.size.into()));
        }
        match self.eval_expr(operand)? {
            Value::Str(s) => Ok(Value::Unsigned(s.len() as u128)),
            other => Err(EvalError::evaluation(
                format!("cannot take the size of a {}", other.type_name()),
                pos,
            )),
        }
    }

    fn type_size(
        &mut self,
        kind: ResolvedKind<'p>,
        name: &str,
        pos: Position,
    ) -> Result<u128, EvalError> {
        match kind {
            ResolvedKind::Builtin(b) => Ok(b.size.into()),
            ResolvedKind::Enum(_, underlying) => Ok(underlying.size.into()),
            ResolvedKind::Bitfield(decl) => {
                let mut bits: u64 = 0;
                for entry in &decl.entries {
                    bits = bits.saturating_add(self.eval_u64(&entry.bits)?);
                }
                Ok(bits.div_ceil(8).into())
            }
            ResolvedKind::Struct(_) => Err(EvalError::evaluation(
                format!("size of type '{name}' depends on the data it is placed on"),
                pos,
            )),
        }
    }

    pub(super) fn binary_op(
        &self,
        op: BinaryOp,
        lhs: Value,
        rhs: Value,
        pos: Position,
    ) -> Result<Value, EvalError> {
        let value = binary_op(op, lhs, rhs, pos)?;
        self.check_string(value, pos)
    }
}

fn member(base: Value, field: &str, pos: Position) -> Result<Value, EvalError> {
    let Value::Pattern(pattern) = base else {
        return Err(EvalError::evaluation(
            format!("cannot access member '{field}' of a {}", base.type_name()),
            pos,
        ));
    };
    if let PatternValue::Bitfield(fields) = &pattern.value {
        if let Some(entry) = fields.iter().find(|f| f.name == field) {
            return Ok(Value::Unsigned(entry.value));
        }
    }
    pattern.member(field).map(Value::from_pattern).ok_or_else(|| {
        EvalError::evaluation(
            format!("'{}' has no member '{field}'", pattern.variable_name),
            pos,
        )
    })
}

fn element(base: Value, index: u64, pos: Position) -> Result<Value, EvalError> {
    match base {
        Value::Pattern(pattern) => match &pattern.value {
            PatternValue::Array(entries) => usize::try_from(index)
                .ok()
                .and_then(|i| entries.get(i))
                .map(Value::from_pattern)
                .ok_or_else(|| {
                    EvalError::evaluation(
                        format!(
                            "index {index} is out of bounds for '{}' with {} entries",
                            pattern.variable_name,
                            entries.len()
                        ),
                        pos,
                    )
                }),
            _ => Err(EvalError::evaluation(
                format!("'{}' is not an array", pattern.variable_name),
                pos,
            )),
        },
        Value::Str(s) => usize::try_from(index)
            .ok()
            .and_then(|i| s.chars().nth(i))
            .map(Value::Char)
            .ok_or_else(|| {
                EvalError::evaluation(format!("index {index} is out of bounds for string"), pos)
            }),
        other => Err(EvalError::evaluation(
            format!("cannot index a {}", other.type_name()),
            pos,
        )),
    }
}

fn unary_op(op: UnaryOp, value: Value, pos: Position) -> Result<Value, EvalError> {
    let invalid = |value: &Value| {
        let symbol = match op {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
        };
        EvalError::evaluation(
            format!("invalid operand type for '{symbol}': {}", value.type_name()),
            pos,
        )
    };

    match op {
        UnaryOp::Not => value
            .truthy()
            .map(|b| Value::Bool(!b))
            .ok_or_else(|| invalid(&value)),
        UnaryOp::Neg => match value {
            Value::Float(v) => Ok(Value::Float(-v)),
            Value::Signed(v) => Ok(Value::Signed(v.wrapping_neg())),
            ref other => other
                .as_i128()
                .map(|v| Value::Signed(v.wrapping_neg()))
                .ok_or_else(|| invalid(other)),
        },
        UnaryOp::BitNot => match value {
            Value::Signed(v) => Ok(Value::Signed(!v)),
            Value::Unsigned(v) => Ok(Value::Unsigned(!v)),
            Value::Bool(b) => Ok(Value::Bool(!b)),
            ref other => Err(invalid(other)),
        },
    }
}

pub(super) fn binary_op(
    op: BinaryOp,
    lhs: Value,
    rhs: Value,
    pos: Position,
) -> Result<Value, EvalError> {
    let invalid = |lhs: &Value, rhs: &Value| {
        EvalError::evaluation(
            format!(
                "invalid operand types for '{}': {} and {}",
                op.symbol(),
                lhs.type_name(),
                rhs.type_name()
            ),
            pos,
        )
    };

    if matches!(lhs, Value::Str(_)) || matches!(rhs, Value::Str(_)) {
        return match op {
            BinaryOp::Add => Ok(Value::Str(format!("{lhs}{rhs}"))),
            BinaryOp::Eq => Ok(Value::Bool(lhs.to_string() == rhs.to_string())),
            BinaryOp::Ne => Ok(Value::Bool(lhs.to_string() != rhs.to_string())),
            _ => Err(invalid(&lhs, &rhs)),
        };
    }

    if lhs.is_float() || rhs.is_float() {
        let (Some(a), Some(b)) = (lhs.as_f64(), rhs.as_f64()) else {
            return Err(invalid(&lhs, &rhs));
        };
        return Ok(match op {
            BinaryOp::Add => Value::Float(a + b),
            BinaryOp::Sub => Value::Float(a - b),
            BinaryOp::Mul => Value::Float(a * b),
            BinaryOp::Div | BinaryOp::Rem if b == 0.0 => {
                return Err(EvalError::evaluation("division by zero", pos));
            }
            BinaryOp::Div => Value::Float(a / b),
            BinaryOp::Rem => Value::Float(a % b),
            BinaryOp::Eq => Value::Bool(a == b),
            BinaryOp::Ne => Value::Bool(a != b),
            BinaryOp::Lt => Value::Bool(a < b),
            BinaryOp::Le => Value::Bool(a <= b),
            BinaryOp::Gt => Value::Bool(a > b),
            BinaryOp::Ge => Value::Bool(a >= b),
            _ => return Err(invalid(&lhs, &rhs)),
        });
    }

    if lhs.is_signed() || rhs.is_signed() {
        let (Some(a), Some(b)) = (lhs.as_i128(), rhs.as_i128()) else {
            return Err(invalid(&lhs, &rhs));
        };
        let shift = u32::try_from(b).ok();
        return Ok(match op {
            BinaryOp::Add => Value::Signed(a.wrapping_add(b)),
            BinaryOp::Sub => Value::Signed(a.wrapping_sub(b)),
            BinaryOp::Mul => Value::Signed(a.wrapping_mul(b)),
            BinaryOp::Div | BinaryOp::Rem if b == 0 => {
                return Err(EvalError::evaluation("division by zero", pos));
            }
            BinaryOp::Div => Value::Signed(a.wrapping_div(b)),
            BinaryOp::Rem => Value::Signed(a.wrapping_rem(b)),
            BinaryOp::Shl => Value::Signed(shift.and_then(|s| a.checked_shl(s)).unwrap_or(0)),
            BinaryOp::Shr => Value::Signed(
                shift
                    .and_then(|s| a.checked_shr(s))
                    .unwrap_or(if a < 0 { -1 } else { 0 }),
            ),
            BinaryOp::BitAnd => Value::Signed(a & b),
            BinaryOp::BitOr => Value::Signed(a | b),
            BinaryOp::BitXor => Value::Signed(a ^ b),
            BinaryOp::Eq => Value::Bool(a == b),
            BinaryOp::Ne => Value::Bool(a != b),
            BinaryOp::Lt => Value::Bool(a < b),
            BinaryOp::Le => Value::Bool(a <= b),
            BinaryOp::Gt => Value::Bool(a > b),
            BinaryOp::Ge => Value::Bool(a >= b),
            BinaryOp::And | BinaryOp::Or => return Err(invalid(&lhs, &rhs)),
        });
    }

    let (Some(a), Some(b)) = (lhs.as_u128(), rhs.as_u128()) else {
        return Err(invalid(&lhs, &rhs));
    };
    let shift = u32::try_from(b).ok();
    Ok(match op {
        BinaryOp::Add => Value::Unsigned(a.wrapping_add(b)),
        BinaryOp::Sub => Value::Unsigned(a.wrapping_sub(b)),
        BinaryOp::Mul => Value::Unsigned(a.wrapping_mul(b)),
        BinaryOp::Div | BinaryOp::Rem if b == 0 => {
            return Err(EvalError::evaluation("division by zero", pos));
        }
        BinaryOp::Div => Value::Unsigned(a / b),
        BinaryOp::Rem => Value::Unsigned(a % b),
        BinaryOp::Shl => Value::Unsigned(shift.and_then(|s| a.checked_shl(s)).unwrap_or(0)),
        BinaryOp::Shr => Value::Unsigned(shift.and_then(|s| a.checked_shr(s)).unwrap_or(0)),
        BinaryOp::BitAnd => Value::Unsigned(a & b),
        BinaryOp::BitOr => Value::Unsigned(a | b),
        BinaryOp::BitXor => Value::Unsigned(a ^ b),
        BinaryOp::Eq => Value::Bool(a == b),
        BinaryOp::Ne => Value::Bool(a != b),
        BinaryOp::Lt => Value::Bool(a < b),
        BinaryOp::Le => Value::Bool(a <= b),
        BinaryOp::Gt => Value::Bool(a > b),
        BinaryOp::Ge => Value::Bool(a >= b),
        BinaryOp::And | BinaryOp::Or => return Err(invalid(&lhs, &rhs)),
    })
}
