//! Temporaries: the SSA-ish value slots IR ops read and write.

use crate::types::{TempVal, Type};

/// Index of a [`Temp`] within a [`crate::context::Context`]'s temp
/// table. Doubles as the encoding for a constant `carg` slot on an
/// [`crate::op::Op`] (e.g. a label id, a shift count) — those never
/// reference an actual temp, they just reuse the same 32-bit slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TempIdx(pub u32);

/// What a temp represents and how long it lives.
///
/// Maps to QEMU's `TCGTempKind`. Ordering matters for serialization
/// (`core/src/serialize.rs` encodes this as a `u8` by discriminant) —
/// do not reorder without updating the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempKind {
    /// Scoped to the extended basic block; dies at the next label.
    Ebb,
    /// Scoped to the whole translation block.
    Tb,
    /// A CPU state field, persistent across the whole translation
    /// block and synced to memory at block boundaries.
    Global,
    /// Bound to a specific host register for its entire lifetime
    /// (e.g. the env pointer).
    Fixed,
    /// A compile-time constant value, materialized into a register
    /// on first use.
    Const,
}

/// A single temporary value slot.
///
/// Maps to QEMU's `TCGTemp`. Holds both the static description (type,
/// kind, optional backing global) and the register allocator's mutable
/// working state (`val_type`, `reg`, `mem_coherent`).
#[derive(Debug, Clone)]
pub struct Temp {
    pub idx: TempIdx,
    /// The temp's IR type.
    pub ty: Type,
    /// For a sub-register alias of a global (unused by any generator
    /// in this workspace today, kept for parity with the global table
    /// layout), the type of the full backing global; equal to `ty`
    /// otherwise.
    pub base_type: Type,
    pub kind: TempKind,

    /// Where the current value lives right now. Mutated continuously
    /// by the register allocator as it walks the op stream.
    pub val_type: TempVal,
    /// Host register currently holding the value, if any.
    pub reg: Option<u8>,
    /// Whether the in-memory copy (for a `Global`) matches the
    /// register's value.
    pub mem_coherent: bool,
    /// Whether a `Global`'s backing memory slot has ever been written.
    pub mem_allocated: bool,
    /// Constant value, valid only when `kind == Const`.
    pub val: u64,
    /// Base temp to compute this temp's memory address from (the env
    /// pointer, for a `Global`; the frame pointer, for a spilled local).
    pub mem_base: Option<TempIdx>,
    /// Byte offset from `mem_base`.
    pub mem_offset: i64,
    /// Debug/display name, e.g. a global's CPU-state field name.
    pub name: Option<&'static str>,
}

impl Temp {
    fn blank(idx: TempIdx, ty: Type, kind: TempKind) -> Temp {
        Temp {
            idx,
            ty,
            base_type: ty,
            kind,
            val_type: TempVal::Dead,
            reg: None,
            mem_coherent: false,
            mem_allocated: false,
            val: 0,
            mem_base: None,
            mem_offset: 0,
            name: None,
        }
    }

    pub fn new_ebb(idx: TempIdx, ty: Type) -> Temp {
        Temp::blank(idx, ty, TempKind::Ebb)
    }

    pub fn new_tb(idx: TempIdx, ty: Type) -> Temp {
        Temp::blank(idx, ty, TempKind::Tb)
    }

    pub fn new_const(idx: TempIdx, ty: Type, val: u64) -> Temp {
        let mut t = Temp::blank(idx, ty, TempKind::Const);
        t.val_type = TempVal::Const;
        t.val = val;
        t
    }

    pub fn new_global(
        idx: TempIdx,
        ty: Type,
        base: TempIdx,
        offset: i64,
        name: &'static str,
    ) -> Temp {
        let mut t = Temp::blank(idx, ty, TempKind::Global);
        t.val_type = TempVal::Mem;
        t.mem_base = Some(base);
        t.mem_offset = offset;
        t.mem_coherent = true;
        t.mem_allocated = true;
        t.name = Some(name);
        t
    }

    pub fn new_fixed(idx: TempIdx, ty: Type, reg: u8, name: &'static str) -> Temp {
        let mut t = Temp::blank(idx, ty, TempKind::Fixed);
        t.val_type = TempVal::Reg;
        t.reg = Some(reg);
        t.name = Some(name);
        t
    }

    /// Whether this temp is read-only from the allocator's point of
    /// view: a constant never needs an input register freed for
    /// reuse, and a global/fixed temp is never "dead" the way a local
    /// is — it just gets synced back to memory.
    pub fn is_const(&self) -> bool {
        self.kind == TempKind::Const
    }

    pub fn is_global_or_fixed(&self) -> bool {
        matches!(self.kind, TempKind::Global | TempKind::Fixed)
    }
}
