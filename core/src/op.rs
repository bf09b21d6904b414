//! IR instructions: opcode, type, constant/argument slots, and the
//! liveness bits the register allocator consumes.

use crate::opcode::Opcode;
use crate::temp::TempIdx;
use crate::types::{RegSet, Type};

/// Index of an [`Op`] within a [`crate::context::Context`]'s op
/// stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpIdx(pub u32);

/// Upper bound on an op's total argument count (outputs + inputs +
/// constants). `call` is the widest op in `OPCODE_DEFS`, at
/// 1 output + 6 inputs + 2 constants = 9; rounded up to a clean power
/// of two so `Op::args` has a little headroom.
pub const MAX_OP_ARGS: usize = 16;

/// Per-op liveness bits, one pair per argument slot, computed by
/// `tcg-backend::liveness` and consumed by `tcg-backend::regalloc`.
///
/// Bit `2*i` of `dead` set means "argument `i` dies at this op, its
/// register can be freed right after"; bit `i` of `sync` means
/// "argument `i` is a global whose memory copy must be refreshed after
/// this op" (used at basic-block boundaries). A single `u32` covers
/// the `MAX_OP_ARGS` slots twice over, which is all liveness ever asks
/// of it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifeData {
    dead: u32,
    sync: u32,
}

impl LifeData {
    pub const EMPTY: LifeData = LifeData { dead: 0, sync: 0 };

    pub fn set_dead(&mut self, arg_pos: u32) {
        self.dead |= 1 << arg_pos;
    }

    pub fn set_sync(&mut self, arg_pos: u32) {
        self.sync |= 1 << arg_pos;
    }

    pub fn is_dead(self, arg_pos: u32) -> bool {
        self.dead & (1 << arg_pos) != 0
    }

    pub fn is_sync(self, arg_pos: u32) -> bool {
        self.sync & (1 << arg_pos) != 0
    }
}

/// A single IR instruction.
///
/// Maps to QEMU's `TCGOp`. Arguments are laid out in one flat array in
/// a fixed order — outputs, then inputs, then constants — with counts
/// coming from the opcode's static [`crate::opcode::OpDef`] rather than
/// being stored per-instance.
#[derive(Debug, Clone)]
pub struct Op {
    pub idx: OpIdx,
    pub opc: Opcode,
    /// The op's polymorphic type (`_i32`/`_i64` variants share one
    /// `Opcode`, distinguished by this field — see
    /// [`crate::opcode::Opcode::is_int_polymorphic`]).
    pub op_type: Type,
    /// First opcode-specific byte parameter outside the arg array
    /// (e.g. vector element size). Unused by most opcodes.
    pub param1: u8,
    /// Second opcode-specific byte parameter.
    pub param2: u8,
    /// Number of argument slots actually in use in `args`.
    pub nargs: u8,
    pub args: [TempIdx; MAX_OP_ARGS],
    /// Liveness info, filled in by `tcg-backend::liveness` after the
    /// op stream is final.
    pub life: LifeData,
    /// Per-output preferred registers, filled in by
    /// `tcg-backend::liveness` from the aliased input's own preferred
    /// set — lets the allocator keep a value in the same register
    /// across a chain of aliasing ops instead of bouncing it around.
    pub output_pref: [RegSet; 2],
}

impl Op {
    /// A bare op with no arguments set — used by the deserializer,
    /// which fills `nargs`/`args` in afterward.
    pub fn new(idx: OpIdx, opc: Opcode, ty: Type) -> Op {
        Op {
            idx,
            opc,
            op_type: ty,
            param1: 0,
            param2: 0,
            nargs: 0,
            args: [TempIdx(0); MAX_OP_ARGS],
            life: LifeData::EMPTY,
            output_pref: [RegSet::EMPTY; 2],
        }
    }

    pub fn with_args(idx: OpIdx, opc: Opcode, ty: Type, args: &[TempIdx]) -> Op {
        let mut op = Op::new(idx, opc, ty);
        op.nargs = args.len() as u8;
        op.args[..args.len()].copy_from_slice(args);
        op
    }

    fn nb_oargs(&self) -> usize {
        self.opc.def().nb_oargs as usize
    }

    fn nb_iargs(&self) -> usize {
        self.opc.def().nb_iargs as usize
    }

    fn nb_cargs(&self) -> usize {
        self.opc.def().nb_cargs as usize
    }

    pub fn oargs(&self) -> &[TempIdx] {
        &self.args[..self.nb_oargs()]
    }

    pub fn iargs(&self) -> &[TempIdx] {
        let start = self.nb_oargs();
        &self.args[start..start + self.nb_iargs()]
    }

    pub fn cargs(&self) -> &[TempIdx] {
        let start = self.nb_oargs() + self.nb_iargs();
        &self.args[start..start + self.nb_cargs()]
    }
}
