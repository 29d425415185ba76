//! The `std::` function library.

use plwasm_ast::{Endian, Expr, Position};
use tracing::warn;

use super::Evaluator;
use crate::error::EvalError;
use crate::log::LogLevel;
use crate::types::{read_unsigned, sign_extend};
use crate::value::Value;

/// Widest padding a format specifier may request.
pub(crate) const MAX_FORMAT_WIDTH: usize = 4096;

/// Functions that reach outside the data source and need host approval.
pub(crate) const DANGEROUS_FUNCTIONS: &[&str] = &["std::file::read", "std::file::exists"];

impl Evaluator<'_, '_> {
    pub(super) fn call(
        &mut self,
        callee: &str,
        args: &[Expr],
        pos: Position,
    ) -> Result<Value, EvalError> {
        if DANGEROUS_FUNCTIONS.contains(&callee) && !self.ctx.gate.allow(callee) {
            warn!(function = callee, "dangerous function denied");
            return Err(EvalError::DangerousFunctionDenied {
                function: callee.to_string(),
                pos,
            });
        }

        let values = args
            .iter()
            .map(|arg| self.eval_expr(arg))
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(decl) = self.functions.get(callee).copied() {
            return self.call_function(decl, values, pos);
        }

        match callee {
            "std::print" => {
                let message = format_call(callee, &values, pos)?;
                self.log(LogLevel::Info, message, pos)?;
                Ok(Value::Void)
            }
            "std::format" => {
                let text = format_call(callee, &values, pos)?;
                self.check_string(Value::Str(text), pos)
            }
            "std::warning" => {
                let [message] = expect_args::<1>(callee, values, pos)?;
                self.log(LogLevel::Warning, message.to_string(), pos)?;
                Ok(Value::Void)
            }
            "std::error" => {
                let [message] = expect_args::<1>(callee, values, pos)?;
                Err(EvalError::aborted(message.to_string(), pos))
            }
            "std::assert" | "std::assert_warn" => {
                let [cond, message] = expect_args::<2>(callee, values, pos)?;
                let holds = cond.truthy().ok_or_else(|| {
                    EvalError::evaluation(
                        format!("{} cannot be used as a condition", cond.type_name()),
                        pos,
                    )
                })?;
                if !holds {
                    let message = format!("assertion failed: {message}");
                    if callee == "std::assert" {
                        return Err(EvalError::aborted(message, pos));
                    }
                    self.log(LogLevel::Warning, message, pos)?;
                }
                Ok(Value::Void)
            }
            "std::mem::size" => {
                expect_args::<0>(callee, values, pos)?;
                Ok(Value::Unsigned(self.ctx.data.size().into()))
            }
            "std::mem::base_address" => {
                expect_args::<0>(callee, values, pos)?;
                Ok(Value::Unsigned(self.base().into()))
            }
            "std::mem::eof" => {
                expect_args::<0>(callee, values, pos)?;
                Ok(Value::Bool(self.cursor >= self.data_end()))
            }
            "std::mem::read_unsigned" | "std::mem::read_signed" => {
                let (address, size, endian) = self.read_request(callee, &values, pos)?;
                if size > 16 {
                    return Err(EvalError::evaluation(
                        format!("{callee} can read at most 16 bytes, got {size}"),
                        pos,
                    ));
                }
                let bytes = self.read_bytes("", address, size, pos)?;
                let raw = read_unsigned(&bytes, endian);
                Ok(if callee == "std::mem::read_signed" {
                    Value::Signed(sign_extend(raw, (size * 8) as u32))
                } else {
                    Value::Unsigned(raw)
                })
            }
            "std::mem::read_string" => {
                let (address, size, _) = self.read_request(callee, &values, pos)?;
                let limit = self.limits().array_limit;
                if size > limit {
                    return Err(EvalError::limit("array", limit, pos));
                }
                let bytes = self.read_bytes("", address, size, pos)?;
                Ok(Value::Str(String::from_utf8_lossy(&bytes).into_owned()))
            }
            "std::file::read" => {
                let [path] = expect_args::<1>(callee, values, pos)?;
                let path = path.to_string();
                self.ctx
                    .vfs
                    .read(&path)
                    .map(|contents| Value::Str(contents.to_string()))
                    .ok_or_else(|| {
                        EvalError::evaluation(format!("file '{path}' does not exist"), pos)
                    })
            }
            "std::file::exists" => {
                let [path] = expect_args::<1>(callee, values, pos)?;
                Ok(Value::Bool(self.ctx.vfs.exists(&path.to_string())))
            }
            _ => Err(EvalError::evaluation(
                format!("unknown function '{callee}'"),
                pos,
            )),
        }
    }

    /// Decodes `(address, size[, endian])`, where endian is 0 native, 1 big, 2 little.
    fn read_request(
        &self,
        callee: &str,
        values: &[Value],
        pos: Position,
    ) -> Result<(u64, u64, Endian), EvalError> {
        if !(2..=3).contains(&values.len()) {
            return Err(arity_error(callee, "2 or 3", values.len(), pos));
        }
        let address = self.value_to_u64(&values[0], pos)?;
        let size = self.value_to_u64(&values[1], pos)?;
        let endian = match values.get(2).map(|v| self.value_to_u64(v, pos)).transpose()? {
            None => self.endian,
            Some(0) => Endian::native(),
            Some(1) => Endian::Big,
            Some(2) => Endian::Little,
            Some(other) => {
                return Err(EvalError::evaluation(
                    format!("invalid endian value {other}"),
                    pos,
                ));
            }
        };
        Ok((address, size, endian))
    }
}

fn arity_error(callee: &str, expected: &str, got: usize, pos: Position) -> EvalError {
    EvalError::evaluation(
        format!("function '{callee}' expects {expected} argument(s), got {got}"),
        pos,
    )
}

fn expect_args<const N: usize>(
    callee: &str,
    values: Vec<Value>,
    pos: Position,
) -> Result<[Value; N], EvalError> {
    let got = values.len();
    values
        .try_into()
        .map_err(|_| arity_error(callee, &N.to_string(), got, pos))
}

fn format_call(callee: &str, values: &[Value], pos: Position) -> Result<String, EvalError> {
    let Some((template, args)) = values.split_first() else {
        return Err(arity_error(callee, "at least 1", 0, pos));
    };
    let Value::Str(template) = template else {
        return Err(EvalError::evaluation(
            format!("{callee} expects a format string as its first argument"),
            pos,
        ));
    };
    format_template(template, args).map_err(|message| EvalError::evaluation(message, pos))
}

/// Expands `{}` style placeholders.
///
/// Supported specs are `{}`, `{:x}`, `{:X}`, `{:#x}`, `{:b}`, `{:o}` and
/// `{:d}` with an optional zero-padded width such as `{:08X}`.
pub(crate) fn format_template(template: &str, args: &[Value]) -> Result<String, String> {
    let mut out = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => return Err("unmatched '}' in format string".to_string()),
            '{' => {
                let mut spec = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => spec.push(c),
                        None => return Err("unterminated '{' in format string".to_string()),
                    }
                }
                let arg = args
                    .next()
                    .ok_or_else(|| "too few arguments for format string".to_string())?;
                out.push_str(&format_value(arg, &spec)?);
            }
            c => out.push(c),
        }
    }
    Ok(out)
}

fn format_value(value: &Value, spec: &str) -> Result<String, String> {
    let invalid = || format!("invalid format specifier '{{{spec}}}'");
    let Some(spec) = spec.strip_prefix(':').or(spec.is_empty().then_some("")) else {
        return Err(invalid());
    };

    let (alternate, spec) = match spec.strip_prefix('#') {
        Some(rest) => (true, rest),
        None => (false, spec),
    };
    let (zero, spec) = match spec.strip_prefix('0') {
        Some(rest) if !rest.is_empty() => (true, rest),
        _ => (false, spec),
    };
    let width_len = spec.chars().take_while(char::is_ascii_digit).count();
    let width: usize = if width_len == 0 {
        0
    } else {
        spec[..width_len]
            .parse()
            .ok()
            .filter(|width| *width <= MAX_FORMAT_WIDTH)
            .ok_or_else(invalid)?
    };
    let kind = &spec[width_len..];

    let (prefix, digits) = match kind {
        "" | "d" => match value {
            Value::Signed(v) if *v < 0 => ("-", v.unsigned_abs().to_string()),
            Value::Unsigned(_) | Value::Signed(_) => ("", value.to_string()),
            _ if kind.is_empty() => ("", value.to_string()),
            _ => return Err(format!("cannot format a {} as an integer", value.type_name())),
        },
        "x" | "X" | "b" | "o" => {
            let raw = match value {
                Value::Unsigned(_) | Value::Signed(_) | Value::Bool(_) | Value::Char(_) => {
                    value.as_u128().ok_or_else(invalid)?
                }
                _ => return Err(format!("cannot format a {} as an integer", value.type_name())),
            };
            match kind {
                "x" => (if alternate { "0x" } else { "" }, format!("{raw:x}")),
                "X" => (if alternate { "0x" } else { "" }, format!("{raw:X}")),
                "b" => (if alternate { "0b" } else { "" }, format!("{raw:b}")),
                _ => (if alternate { "0o" } else { "" }, format!("{raw:o}")),
            }
        }
        _ => return Err(invalid()),
    };

    let len = prefix.len() + digits.chars().count();
    let fill = width.saturating_sub(len);
    Ok(if zero {
        format!("{prefix}{}{digits}", "0".repeat(fill))
    } else if matches!(value, Value::Str(_)) {
        format!("{prefix}{digits}{}", " ".repeat(fill))
    } else {
        format!("{}{prefix}{digits}", " ".repeat(fill))
    })
}
