//! Per-execution settings derived from `#pragma` directives.

use plwasm_ast::{Endian, Pragma, Program};

use crate::error::EvalError;
use crate::limits::RuntimeLimits;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Settings {
    pub limits: RuntimeLimits,
    pub endian: Endian,
    /// Emit a debug log entry for every placement.
    pub debug: bool,
    /// Address the first byte of the data source is exposed at.
    pub base_address: u64,
}

impl Settings {
    pub fn new(limits: RuntimeLimits, base_address: u64) -> Self {
        Self {
            limits,
            endian: Endian::Little,
            debug: false,
            base_address,
        }
    }

    /// Applies the program's pragmas in source order.
    ///
    /// `data_size` is the size of the bound data source, which has to fit
    /// below the end of the address space wherever it is based.
    pub fn apply(&mut self, program: &Program, data_size: u64) -> Result<(), EvalError> {
        let ceiling = RuntimeLimits::CEILING;
        for pragma in &program.pragmas {
            match pragma.key.as_str() {
                "endian" => {
                    self.endian = match pragma.value.as_deref() {
                        Some("little") => Endian::Little,
                        Some("big") => Endian::Big,
                        Some("native") => Endian::native(),
                        _ => return Err(invalid(pragma)),
                    }
                }
                "eval_depth" => self.limits.eval_depth = bounded(pragma, ceiling.eval_depth)?,
                "array_limit" => self.limits.array_limit = bounded(pragma, ceiling.array_limit)?,
                "pattern_limit" => {
                    self.limits.pattern_limit = bounded(pragma, ceiling.pattern_limit)?
                }
                "loop_limit" => self.limits.loop_limit = bounded(pragma, ceiling.loop_limit)?,
                "base_address" => {
                    let base = number(pragma)?;
                    if base.checked_add(data_size).is_none() {
                        return Err(EvalError::evaluation(
                            format!(
                                "base address 0x{base:X} leaves no room for 0x{data_size:X} bytes of data"
                            ),
                            pragma.pos,
                        ));
                    }
                    self.base_address = base;
                }
                "debug" => self.debug = true,
                // Handled while splicing includes.
                "once" => {}
                _ => {
                    return Err(EvalError::evaluation(
                        format!("unknown pragma '{}'", pragma.key),
                        pragma.pos,
                    ));
                }
            }
        }
        Ok(())
    }
}

fn invalid(pragma: &Pragma) -> EvalError {
    EvalError::evaluation(
        format!(
            "invalid value '{}' for pragma '{}'",
            pragma.value.as_deref().unwrap_or_default(),
            pragma.key
        ),
        pragma.pos,
    )
}

fn number(pragma: &Pragma) -> Result<u64, EvalError> {
    pragma
        .value
        .as_deref()
        .and_then(parse_integer)
        .ok_or_else(|| invalid(pragma))
}

fn bounded(pragma: &Pragma, max: u64) -> Result<u64, EvalError> {
    let value = number(pragma)?;
    if value > max {
        return Err(EvalError::evaluation(
            format!(
                "value {value} for pragma '{}' exceeds the maximum of {max}",
                pragma.key
            ),
            pragma.pos,
        ));
    }
    Ok(value)
}

/// Parses decimal, `0x`, `0b` and `0o` integers with optional `_` separators.
pub(crate) fn parse_integer(text: &str) -> Option<u64> {
    let text = text.replace('_', "");
    let (digits, radix) = match text.get(..2) {
        Some("0x" | "0X") => (&text[2..], 16),
        Some("0b" | "0B") => (&text[2..], 2),
        Some("0o" | "0O") => (&text[2..], 8),
        _ => (text.as_str(), 10),
    };
    u64::from_str_radix(digits, radix).ok()
}
