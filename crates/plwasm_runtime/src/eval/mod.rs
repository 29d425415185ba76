//! Tree-walking evaluator.
//!
//! Evaluation runs in two passes over a parsed [`Program`]: declarations
//! (types and functions) are registered first so that items can refer to
//! each other regardless of order, then top-level statements execute in
//! source order. Every placement produces a [`Pattern`]; the patterns
//! placed in the global scope form the result tree.

mod builtins;
mod expr;
mod settings;

use std::collections::HashMap;

use plwasm_ast::{
    ArraySize, AssignTarget, Attribute, BitfieldDecl, Block, Endian, EnumDecl, FunctionDecl, Item, Position,
    Program, Stmt, StmtKind, StructDecl, TypeRef, VarDecl,
};
use tracing::{debug, trace};

use crate::data_source::DataSource;
use crate::error::EvalError;
use crate::gate::DangerousFunctionGate;
use crate::limits::RuntimeLimits;
use crate::log::{ENTRY_OVERHEAD, LogConsole, LogLevel};
use crate::pattern::{BitfieldField, Pattern, PatternAttributes, PatternValue};
use crate::types::{BuiltinKind, BuiltinType, read_unsigned, truncate};
use crate::value::Value;
use crate::vfs::VirtualFileSystem;

pub(crate) use settings::Settings;

/// Maximum length of a `using` alias chain.
const MAX_ALIAS_DEPTH: usize = 64;

/// Deepest combined statement and expression recursion, across function calls.
const MAX_NESTING: u64 = 192;

/// Largest console log one execution may produce, in encoded bytes.
const MAX_CONSOLE_SIZE: usize = 8 << 20;

/// Host state an evaluation runs against.
pub(crate) struct EvalContext<'a> {
    pub data: &'a dyn DataSource,
    pub gate: &'a dyn DangerousFunctionGate,
    pub vfs: &'a VirtualFileSystem,
    pub console: &'a mut LogConsole,
    pub settings: Settings,
}

/// Evaluates `program` and returns the patterns placed in the global scope.
pub(crate) fn evaluate(program: &Program, ctx: EvalContext<'_>) -> Result<Vec<Pattern>, EvalError> {
    let mut evaluator = Evaluator::new(ctx);
    evaluator.register_declarations(program)?;

    for item in &program.items {
        if let Item::Statement(stmt) = item {
            if let Flow::Return(_) = evaluator.exec_stmt(stmt)? {
                break;
            }
        }
    }

    let global = evaluator.frames.swap_remove(0);
    debug!(patterns = global.fields.len(), "evaluation finished");
    Ok(global.fields)
}

#[derive(Debug, Clone, PartialEq)]
enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

#[derive(Debug, Clone, Copy)]
enum FrameKind {
    Global,
    Struct { start: u64, is_union: bool, max_end: u64 },
    Function,
}

#[derive(Debug, Clone)]
struct Local {
    ty: Option<BuiltinType>,
    value: Value,
}

#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    locals: HashMap<String, Local>,
    fields: Vec<Pattern>,
}

impl Frame {
    fn new(kind: FrameKind) -> Self {
        Self {
            kind,
            locals: HashMap::new(),
            fields: Vec::new(),
        }
    }

    fn field(&self, name: &str) -> Option<&Pattern> {
        self.fields.iter().rev().find(|p| p.variable_name == name)
    }
}

#[derive(Debug, Clone, Copy)]
enum TypeDef<'p> {
    Struct(&'p StructDecl),
    Enum(&'p EnumDecl),
    Bitfield(&'p BitfieldDecl),
    Alias(&'p TypeRef),
}

/// A type reference with aliases followed to their target.
#[derive(Debug, Clone)]
struct ResolvedType<'p> {
    /// Name as written at the use site.
    name: String,
    endian: Option<Endian>,
    kind: ResolvedKind<'p>,
}

#[derive(Debug, Clone, Copy)]
enum ResolvedKind<'p> {
    Builtin(BuiltinType),
    Struct(&'p StructDecl),
    Enum(&'p EnumDecl, BuiltinType),
    Bitfield(&'p BitfieldDecl),
}

struct Evaluator<'p, 'a> {
    ctx: EvalContext<'a>,
    types: HashMap<&'p str, TypeDef<'p>>,
    functions: HashMap<&'p str, &'p FunctionDecl>,
    enum_values: HashMap<&'p str, Vec<(String, u128)>>,
    frames: Vec<Frame>,
    /// Absolute address of the next sequential read.
    cursor: u64,
    endian: Endian,
    depth: u64,
    /// Statements and expressions currently being evaluated.
    nesting: u64,
    pattern_count: u64,
}

impl<'p, 'a> Evaluator<'p, 'a> {
    fn new(ctx: EvalContext<'a>) -> Self {
        let cursor = ctx.settings.base_address;
        let endian = ctx.settings.endian;
        Self {
            ctx,
            types: HashMap::new(),
            functions: HashMap::new(),
            enum_values: HashMap::new(),
            frames: vec![Frame::new(FrameKind::Global)],
            cursor,
            endian,
            depth: 0,
            nesting: 0,
            pattern_count: 0,
        }
    }

    fn limits(&self) -> RuntimeLimits {
        self.ctx.settings.limits
    }

    fn base(&self) -> u64 {
        self.ctx.settings.base_address
    }

    fn data_end(&self) -> u64 {
        self.base().saturating_add(self.ctx.data.size())
    }

    // ---- declarations ----

    fn register_declarations(&mut self, program: &'p Program) -> Result<(), EvalError> {
        for item in &program.items {
            let (name, def, pos) = match item {
                Item::Struct(decl) => (decl.name.as_str(), TypeDef::Struct(decl), decl.pos),
                Item::Enum(decl) => (decl.name.as_str(), TypeDef::Enum(decl), decl.pos),
                Item::Bitfield(decl) => (decl.name.as_str(), TypeDef::Bitfield(decl), decl.pos),
                Item::Using(decl) => (decl.name.as_str(), TypeDef::Alias(&decl.target), decl.pos),
                Item::Function(decl) => {
                    if self.functions.insert(decl.name.as_str(), decl).is_some() {
                        return Err(EvalError::evaluation(
                            format!("redefinition of function '{}'", decl.name),
                            decl.pos,
                        ));
                    }
                    continue;
                }
                Item::Statement(_) => continue,
            };
            if BuiltinType::lookup(name).is_some() || self.types.insert(name, def).is_some() {
                return Err(EvalError::evaluation(
                    format!("redefinition of type '{name}'"),
                    pos,
                ));
            }
        }
        trace!(
            types = self.types.len(),
            functions = self.functions.len(),
            "registered declarations"
        );
        Ok(())
    }

    fn resolve_type(&self, tref: &TypeRef) -> Result<ResolvedType<'p>, EvalError> {
        let mut endian = tref.endian;
        let mut name = tref.name.as_str();

        for _ in 0..MAX_ALIAS_DEPTH {
            if let Some(builtin) = BuiltinType::lookup(name) {
                return Ok(ResolvedType {
                    name: tref.name.clone(),
                    endian,
                    kind: ResolvedKind::Builtin(builtin),
                });
            }
            let kind = match self.types.get(name).copied() {
                Some(TypeDef::Alias(target)) => {
                    endian = endian.or(target.endian);
                    name = target.name.as_str();
                    continue;
                }
                Some(TypeDef::Struct(decl)) => ResolvedKind::Struct(decl),
                Some(TypeDef::Bitfield(decl)) => ResolvedKind::Bitfield(decl),
                Some(TypeDef::Enum(decl)) => {
                    let underlying = self.resolve_type(&decl.underlying)?;
                    match underlying.kind {
                        ResolvedKind::Builtin(b)
                            if matches!(b.kind, BuiltinKind::Unsigned | BuiltinKind::Signed) =>
                        {
                            endian = endian.or(underlying.endian);
                            ResolvedKind::Enum(decl, b)
                        }
                        _ => {
                            return Err(EvalError::evaluation(
                                format!("enum '{}' must have an integer underlying type", decl.name),
                                decl.pos,
                            ));
                        }
                    }
                }
                None => {
                    return Err(EvalError::evaluation(
                        format!("unknown type '{name}'"),
                        tref.pos,
                    ));
                }
            };
            return Ok(ResolvedType {
                name: tref.name.clone(),
                endian,
                kind,
            });
        }

        Err(EvalError::evaluation(
            format!("type alias '{}' is nested too deeply", tref.name),
            tref.pos,
        ))
    }

    fn enum_variants(&mut self, decl: &'p EnumDecl) -> Result<Vec<(String, u128)>, EvalError> {
        if let Some(values) = self.enum_values.get(decl.name.as_str()) {
            return Ok(values.clone());
        }

        let mut values = Vec::with_capacity(decl.variants.len());
        let mut next: u128 = 0;
        for variant in &decl.variants {
            let value = match &variant.value {
                Some(expr) => self.eval_integer(expr)?,
                None => next,
            };
            values.push((variant.name.clone(), value));
            next = value.wrapping_add(1);
        }

        self.enum_values.insert(decl.name.as_str(), values.clone());
        Ok(values)
    }

    // ---- statements ----

    fn exec_block(&mut self, block: &'p Block) -> Result<Flow, EvalError> {
        for stmt in block {
            let flow = self.exec_stmt(stmt)?;
            if flow != Flow::Normal {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &'p Stmt) -> Result<Flow, EvalError> {
        self.nest(stmt.pos)?;
        let flow = self.exec_stmt_kind(stmt);
        self.nesting -= 1;
        flow
    }

    fn exec_stmt_kind(&mut self, stmt: &'p Stmt) -> Result<Flow, EvalError> {
        match &stmt.kind {
            StmtKind::Var(decl) => self.exec_var(decl, stmt.pos)?,
            StmtKind::Padding(size) => {
                let size = self.eval_u64(size)?;
                let FrameKind::Struct { .. } = self.current_frame().kind else {
                    return Err(EvalError::evaluation(
                        "padding is only allowed inside structs",
                        stmt.pos,
                    ));
                };
                let end = self.cursor.saturating_add(size);
                self.advance_field_cursor(end);
            }
            StmtKind::Assign { target, op, value } => {
                let mut value = self.eval_expr(value)?;
                match target {
                    AssignTarget::Variable(name) => {
                        if let Some(binary) = op.binary() {
                            let current = self.lookup(name, stmt.pos)?;
                            value = self.binary_op(binary, current, value, stmt.pos)?;
                        }
                        self.assign_local(name, value, stmt.pos)?;
                    }
                    AssignTarget::Cursor => {
                        if let Some(binary) = op.binary() {
                            let cursor = Value::Unsigned(self.cursor.into());
                            value = self.binary_op(binary, cursor, value, stmt.pos)?;
                        }
                        self.cursor = self.value_to_u64(&value, stmt.pos)?;
                    }
                }
            }
            StmtKind::Expr(expr) => {
                self.eval_expr(expr)?;
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                if self.eval_condition(cond)? {
                    return self.exec_block(then_branch);
                } else if let Some(else_branch) = else_branch {
                    return self.exec_block(else_branch);
                }
            }
            StmtKind::While { cond, body } => {
                let limit = self.limits().loop_limit;
                let mut iterations: u64 = 0;
                while self.eval_condition(cond)? {
                    iterations += 1;
                    if iterations > limit {
                        return Err(EvalError::limit("loop", limit, stmt.pos));
                    }
                    match self.exec_block(body)? {
                        Flow::Break => break,
                        Flow::Normal | Flow::Continue => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
            }
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval_expr(expr)?,
                    None => Value::Void,
                };
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_var(&mut self, decl: &'p VarDecl, pos: Position) -> Result<(), EvalError> {
        let kind = self.current_frame().kind;

        if let Some(placement) = &decl.placement {
            if let FrameKind::Function = kind {
                return Err(EvalError::evaluation(
                    format!("placement of variable '{}' is not allowed inside functions", decl.name),
                    pos,
                ));
            }
            let address = self.eval_u64(placement)?;
            let pattern = self.create_pattern(decl, address, pos)?;
            self.push_field(pattern);
            return Ok(());
        }

        match kind {
            FrameKind::Struct { .. } if decl.init.is_none() => {
                let pattern = self.create_pattern(decl, self.cursor, pos)?;
                let end = pattern.end();
                self.push_field(pattern);
                self.advance_field_cursor(end);
                Ok(())
            }
            _ => self.declare_local(decl, pos),
        }
    }

    fn declare_local(&mut self, decl: &'p VarDecl, pos: Position) -> Result<(), EvalError> {
        if decl.array.is_some() {
            return Err(EvalError::evaluation(
                format!("local variable '{}' cannot be an array", decl.name),
                pos,
            ));
        }
        let ty = match self.resolve_type(&decl.ty)?.kind {
            ResolvedKind::Builtin(b) => b,
            ResolvedKind::Enum(_, underlying) => underlying,
            ResolvedKind::Struct(_) | ResolvedKind::Bitfield(_) => {
                return Err(EvalError::evaluation(
                    format!(
                        "custom type variables must be placed with '@' ('{}' of type '{}')",
                        decl.name, decl.ty.name
                    ),
                    pos,
                ));
            }
        };

        let value = match &decl.init {
            Some(init) => {
                let value = self.eval_expr(init)?;
                cast(value, ty, pos)?
            }
            None => Value::default_for(ty),
        };
        self.current_frame_mut().locals.insert(
            decl.name.clone(),
            Local {
                ty: Some(ty),
                value,
            },
        );
        Ok(())
    }

    fn assign_local(&mut self, name: &str, value: Value, pos: Position) -> Result<(), EvalError> {
        for index in self.visible_frames() {
            if let Some(local) = self.frames[index].locals.get_mut(name) {
                local.value = match local.ty {
                    Some(ty) => cast(value, ty, pos)?,
                    None => value,
                };
                return Ok(());
            }
            if self.frames[index].field(name).is_some() {
                return Err(EvalError::evaluation(
                    format!("cannot assign to pattern '{name}'"),
                    pos,
                ));
            }
        }
        Err(EvalError::evaluation(
            format!("unknown variable '{name}'"),
            pos,
        ))
    }

    // ---- frames ----

    fn current_frame(&self) -> &Frame {
        &self.frames[self.frames.len() - 1]
    }

    fn current_frame_mut(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    /// Frame indices visible from the current scope, innermost first.
    ///
    /// Functions see their own frame and the global frame only.
    fn visible_frames(&self) -> Vec<usize> {
        let mut visible = Vec::new();
        for index in (0..self.frames.len()).rev() {
            visible.push(index);
            if let FrameKind::Function = self.frames[index].kind {
                if index != 0 {
                    visible.push(0);
                }
                break;
            }
        }
        visible
    }

    fn push_field(&mut self, pattern: Pattern) {
        let end = pattern.end();
        let frame = self.current_frame_mut();
        if let FrameKind::Struct {
            is_union: true,
            max_end,
            ..
        } = &mut frame.kind
        {
            *max_end = (*max_end).max(end);
        }
        frame.fields.push(pattern);
    }

    /// Moves the cursor past a field; union members all start at the union's start.
    fn advance_field_cursor(&mut self, end: u64) {
        let next = match &mut self.current_frame_mut().kind {
            FrameKind::Struct {
                start,
                is_union: true,
                max_end,
            } => {
                *max_end = (*max_end).max(end);
                *start
            }
            _ => end,
        };
        self.cursor = next;
    }

    fn enter(&mut self, pos: Position) -> Result<(), EvalError> {
        let limit = self.limits().eval_depth;
        if self.depth >= limit {
            return Err(EvalError::limit("evaluation depth", limit, pos));
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Counts one level of statement or expression recursion.
    ///
    /// Callers decrement `nesting` once the nested evaluation returns.
    fn nest(&mut self, pos: Position) -> Result<(), EvalError> {
        if self.nesting >= MAX_NESTING {
            return Err(EvalError::limit("nesting depth", MAX_NESTING, pos));
        }
        self.nesting += 1;
        Ok(())
    }

    fn log(&mut self, level: LogLevel, message: String, pos: Position) -> Result<(), EvalError> {
        if self.ctx.console.size() + message.len() + ENTRY_OVERHEAD > MAX_CONSOLE_SIZE {
            return Err(EvalError::limit(
                "console output",
                MAX_CONSOLE_SIZE as u64,
                pos,
            ));
        }
        self.ctx.console.log(level, message);
        Ok(())
    }

    /// Rejects strings longer than the array limit.
    fn check_string(&self, value: Value, pos: Position) -> Result<Value, EvalError> {
        let limit = self.limits().array_limit;
        match &value {
            Value::Str(s) if s.len() as u64 > limit => {
                Err(EvalError::limit("string length", limit, pos))
            }
            _ => Ok(value),
        }
    }

    // ---- placement ----

    fn create_pattern(
        &mut self,
        decl: &'p VarDecl,
        offset: u64,
        pos: Position,
    ) -> Result<Pattern, EvalError> {
        let ty = self.resolve_type(&decl.ty)?;
        let attributes = self.attributes(&decl.attributes)?;

        if self.ctx.settings.debug {
            self.log(
                LogLevel::Debug,
                format!(
                    "placing '{}' of type '{}' at 0x{offset:X}",
                    decl.name, decl.ty.name
                ),
                pos,
            )?;
        }

        let mut pattern = match &decl.array {
            None => self.place(&ty, &decl.name, offset, pos)?,
            Some(size) => self.place_array(&ty, &decl.name, size, offset, pos)?,
        };
        pattern.attributes = attributes;
        Ok(pattern)
    }

    fn place(
        &mut self,
        ty: &ResolvedType<'p>,
        name: &str,
        offset: u64,
        pos: Position,
    ) -> Result<Pattern, EvalError> {
        self.pattern_count += 1;
        let limit = self.limits().pattern_limit;
        if self.pattern_count > limit {
            return Err(EvalError::limit("pattern", limit, pos));
        }

        let endian = ty.endian.unwrap_or(self.endian);
        let (size, value) = match ty.kind {
            ResolvedKind::Builtin(builtin) => {
                if !builtin.is_placeable() {
                    return Err(EvalError::evaluation(
                        format!("type '{}' cannot be placed", builtin.name),
                        pos,
                    ));
                }
                let bytes = self.read_bytes(name, offset, builtin.size, pos)?;
                (builtin.size, builtin.decode(&bytes, endian))
            }
            ResolvedKind::Enum(decl, underlying) => {
                let bytes = self.read_bytes(name, offset, underlying.size, pos)?;
                let value = read_unsigned(&bytes, endian);
                let variant = self
                    .enum_variants(decl)?
                    .into_iter()
                    .find(|(_, v)| truncate(*v, (underlying.size * 8) as u32) == value)
                    .map(|(n, _)| n);
                (underlying.size, PatternValue::Enum { value, variant })
            }
            ResolvedKind::Bitfield(decl) => self.place_bitfield(decl, name, offset, endian, pos)?,
            ResolvedKind::Struct(decl) => {
                return self.place_struct(decl, ty, name, offset, pos);
            }
        };

        Ok(Pattern {
            variable_name: name.to_string(),
            type_name: ty.name.clone(),
            offset,
            size,
            endian,
            value,
            attributes: PatternAttributes::default(),
        })
    }

    fn place_struct(
        &mut self,
        decl: &'p StructDecl,
        ty: &ResolvedType<'p>,
        name: &str,
        offset: u64,
        pos: Position,
    ) -> Result<Pattern, EvalError> {
        self.enter(pos)?;
        let saved_cursor = self.cursor;
        let saved_endian = self.endian;
        self.cursor = offset;
        if let Some(endian) = ty.endian {
            self.endian = endian;
        }
        self.frames.push(Frame::new(FrameKind::Struct {
            start: offset,
            is_union: decl.is_union,
            max_end: offset,
        }));

        let result = self.exec_block(&decl.body);

        let end_cursor = self.cursor;
        let frame = self.frames.pop();
        self.cursor = saved_cursor;
        self.endian = saved_endian;
        self.leave();
        result?;

        let Some(frame) = frame else {
            return Err(EvalError::evaluation("scope stack underflow", pos));
        };
        let end = match frame.kind {
            FrameKind::Struct {
                is_union: true,
                max_end,
                ..
            } => max_end,
            _ => end_cursor,
        };
        let value = if decl.is_union {
            PatternValue::Union(frame.fields)
        } else {
            PatternValue::Struct(frame.fields)
        };

        Ok(Pattern {
            variable_name: name.to_string(),
            type_name: ty.name.clone(),
            offset,
            size: end.saturating_sub(offset),
            endian: ty.endian.unwrap_or(saved_endian),
            value,
            attributes: PatternAttributes::default(),
        })
    }

    fn place_bitfield(
        &mut self,
        decl: &'p BitfieldDecl,
        name: &str,
        offset: u64,
        endian: Endian,
        pos: Position,
    ) -> Result<(u64, PatternValue), EvalError> {
        let mut widths = Vec::with_capacity(decl.entries.len());
        let mut total: u64 = 0;
        for entry in &decl.entries {
            let bits = self.eval_u64(&entry.bits)?;
            total = total.saturating_add(bits);
            widths.push(bits);
        }
        if total > 128 {
            return Err(EvalError::evaluation(
                format!("bitfield '{}' is larger than 128 bits", decl.name),
                decl.pos,
            ));
        }

        let size = total.div_ceil(8);
        let bytes = self.read_bytes(name, offset, size, pos)?;
        let raw = read_unsigned(&bytes, endian);

        let mut fields = Vec::new();
        let mut bit_offset: u32 = 0;
        for (entry, bits) in decl.entries.iter().zip(widths) {
            let bits = bits as u32;
            if let Some(field) = &entry.name {
                let value = if bits == 0 {
                    0
                } else {
                    truncate(raw >> bit_offset, bits)
                };
                fields.push(BitfieldField {
                    name: field.clone(),
                    bit_offset,
                    bit_size: bits,
                    value,
                });
            }
            bit_offset += bits;
        }

        Ok((size, PatternValue::Bitfield(fields)))
    }

    fn place_array(
        &mut self,
        ty: &ResolvedType<'p>,
        name: &str,
        size: &'p ArraySize,
        offset: u64,
        pos: Position,
    ) -> Result<Pattern, EvalError> {
        let limit = self.limits().array_limit;

        if let (ResolvedKind::Builtin(builtin), ArraySize::Count(count)) = (ty.kind, size) {
            if builtin.kind == BuiltinKind::Char {
                let len = self.eval_u64(count)?;
                if len > limit {
                    return Err(EvalError::limit("array", limit, pos));
                }
                let bytes = self.read_bytes(name, offset, len, pos)?;
                let text = String::from_utf8_lossy(&bytes);
                return Ok(Pattern {
                    variable_name: name.to_string(),
                    type_name: format!("{}[{len}]", ty.name),
                    offset,
                    size: len,
                    endian: ty.endian.unwrap_or(self.endian),
                    value: PatternValue::String(text.trim_end_matches('\0').to_string()),
                    attributes: PatternAttributes::default(),
                });
            }
        }

        let saved_cursor = self.cursor;
        let mut entries = Vec::new();
        let result = self.fill_array(ty, size, offset, pos, &mut entries);
        self.cursor = saved_cursor;
        let next = result?;

        Ok(Pattern {
            variable_name: name.to_string(),
            type_name: format!("{}[{}]", ty.name, entries.len()),
            offset,
            size: next.saturating_sub(offset),
            endian: ty.endian.unwrap_or(self.endian),
            value: PatternValue::Array(entries),
            attributes: PatternAttributes::default(),
        })
    }

    /// Places array entries starting at `offset`; returns the end of the last entry.
    fn fill_array(
        &mut self,
        ty: &ResolvedType<'p>,
        size: &'p ArraySize,
        offset: u64,
        pos: Position,
        entries: &mut Vec<Pattern>,
    ) -> Result<u64, EvalError> {
        let limit = self.limits().array_limit;
        let mut next = offset;
        match size {
            ArraySize::Count(count) => {
                let count = self.eval_u64(count)?;
                if count > limit {
                    return Err(EvalError::limit("array", limit, pos));
                }
                for index in 0..count {
                    let entry = self.place(ty, &format!("[{index}]"), next, pos)?;
                    next = entry.end();
                    entries.push(entry);
                }
            }
            ArraySize::While(cond) => loop {
                // The condition sees `$` at the entry about to be placed.
                self.cursor = next;
                if !self.eval_condition(cond)? {
                    break;
                }
                if entries.len() as u64 >= limit {
                    return Err(EvalError::limit("array", limit, pos));
                }
                let entry = self.place(ty, &format!("[{}]", entries.len()), next, pos)?;
                next = entry.end();
                entries.push(entry);
            },
        }
        Ok(next)
    }

    fn read_bytes(
        &self,
        name: &str,
        offset: u64,
        size: u64,
        pos: Position,
    ) -> Result<Vec<u8>, EvalError> {
        let out_of_bounds = || EvalError::OutOfBounds {
            what: if name.is_empty() {
                "memory read".to_string()
            } else {
                format!("pattern '{name}'")
            },
            offset,
            size,
            base: self.base(),
            end: self.data_end(),
            pos,
        };
        if size == 0 {
            return Ok(Vec::new());
        }
        let within = offset >= self.base()
            && offset
                .checked_add(size)
                .is_some_and(|end| end <= self.data_end());
        let len = usize::try_from(size).map_err(|_| out_of_bounds())?;
        if !within {
            return Err(out_of_bounds());
        }

        let mut buffer = vec![0u8; len];
        if !self.ctx.data.read(offset - self.base(), &mut buffer) {
            return Err(out_of_bounds());
        }
        Ok(buffer)
    }

    fn attributes(&mut self, attributes: &'p [Attribute]) -> Result<PatternAttributes, EvalError> {
        let mut result = PatternAttributes::default();
        for attribute in attributes {
            let expected = match attribute.name.as_str() {
                "hidden" => 0,
                "name" | "color" | "comment" => 1,
                other => {
                    return Err(EvalError::evaluation(
                        format!("unknown attribute '{other}'"),
                        attribute.pos,
                    ));
                }
            };
            if attribute.args.len() != expected {
                return Err(EvalError::evaluation(
                    format!(
                        "attribute '{}' expects {expected} argument(s), got {}",
                        attribute.name,
                        attribute.args.len()
                    ),
                    attribute.pos,
                ));
            }

            match attribute.name.as_str() {
                "hidden" => result.hidden = true,
                "name" => {
                    result.display_name = Some(self.eval_expr(&attribute.args[0])?.to_string());
                }
                "comment" => {
                    result.comment = Some(self.eval_expr(&attribute.args[0])?.to_string());
                }
                _ => {
                    let color = match self.eval_expr(&attribute.args[0])? {
                        Value::Str(hex) => u32::from_str_radix(&hex, 16)
                            .ok()
                            .filter(|_| hex.len() == 6),
                        other => other.as_u128().and_then(|v| u32::try_from(v).ok()),
                    };
                    result.color = Some(color.filter(|c| *c <= 0xFF_FFFF).ok_or_else(|| {
                        EvalError::evaluation("invalid color, expected \"RRGGBB\"", attribute.pos)
                    })?);
                }
            }
        }
        Ok(result)
    }

    // ---- functions ----

    fn call_function(
        &mut self,
        decl: &'p FunctionDecl,
        args: Vec<Value>,
        pos: Position,
    ) -> Result<Value, EvalError> {
        if args.len() != decl.params.len() {
            return Err(EvalError::evaluation(
                format!(
                    "function '{}' expects {} argument(s), got {}",
                    decl.name,
                    decl.params.len(),
                    args.len()
                ),
                pos,
            ));
        }

        let mut frame = Frame::new(FrameKind::Function);
        for (param, value) in decl.params.iter().zip(args) {
            let ty = match self.resolve_type(&param.ty)?.kind {
                ResolvedKind::Builtin(b) | ResolvedKind::Enum(_, b) => Some(b),
                _ => None,
            };
            let value = match ty {
                Some(ty) => cast(value, ty, pos)?,
                None => value,
            };
            frame.locals.insert(param.name.clone(), Local { ty, value });
        }

        self.enter(pos)?;
        self.frames.push(frame);
        let result = self.exec_block(&decl.body);
        self.frames.pop();
        self.leave();

        Ok(match result? {
            Flow::Return(value) => value,
            _ => Value::Void,
        })
    }
}

fn cast(value: Value, ty: BuiltinType, pos: Position) -> Result<Value, EvalError> {
    let from = value.type_name();
    value.cast(ty).ok_or_else(|| {
        EvalError::evaluation(format!("cannot convert {from} to '{}'", ty.name), pos)
    })
}

#[cfg(test)]
mod tests;
