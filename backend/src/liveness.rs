//! Backward liveness pass.
//!
//! Walks the op stream from the end of the translation block backward,
//! filling in each op's [`tcg_core::LifeData`]: which argument slots hold
//! a value that is never read again ("dead") and which global-backed
//! inputs need their in-memory copy refreshed right after the op runs.
//!
//! Mirrors QEMU's `liveness_pass_1()`, scoped down to the information
//! actually available at this layer: register constraints live in
//! `tcg-backend`'s per-target `OpConstraint` tables, one layer below
//! this pass, so cross-op register preferences (`Op::output_pref`) are
//! left empty rather than guessed at — an empty preferred set just
//! falls through to "any free register" in `regalloc::reg_alloc`,
//! never a correctness issue, only a missed optimization.

use tcg_core::temp::TempKind;
use tcg_core::{Context, LifeData, OpFlags, OpIdx, RegSet, TempIdx, OPCODE_DEFS};

/// Run the liveness pass over every op currently in `ctx`, overwriting
/// each op's `life` and `output_pref` fields in place.
pub fn liveness_analysis(ctx: &mut Context) {
    let num_ops = ctx.num_ops();
    let num_temps = ctx.nb_temps() as usize;

    // `live[t]` holds as the scan proceeds backward through the op
    // stream: is temp `t` read by some op strictly later in program
    // order than the one currently being processed?
    let mut live = vec![false; num_temps];

    for oi in (0..num_ops).rev() {
        let op = ctx.ops()[oi].clone();
        let def = &OPCODE_DEFS[op.opc as usize];
        let nb_oargs = def.nb_oargs as usize;
        let nb_iargs = def.nb_iargs as usize;

        // A label is a potential forward-jump target: anything only
        // kept alive by code between here and the end of the block
        // that we've already walked cannot be assumed live across it,
        // unless it's a global or fixed temp (those are always live,
        // the whole point of `sync_globals` at block boundaries).
        if matches!(op.opc, tcg_core::Opcode::SetLabel) {
            for t in 0..num_temps {
                if ctx.temp(TempIdx(t as u32)).kind == TempKind::Ebb {
                    live[t] = false;
                }
            }
        }

        let mut life = LifeData::EMPTY;

        for k in 0..nb_oargs {
            let tidx = op.args[k].0 as usize;
            if !live[tidx] {
                life.set_dead(k as u32);
            }
            // The def point ends this temp's liveness going further back.
            live[tidx] = false;
        }

        for i in 0..nb_iargs {
            let arg_pos = (nb_oargs + i) as u32;
            let tidx_raw = op.args[nb_oargs + i];
            let tidx = tidx_raw.0 as usize;
            let kind = ctx.temp(tidx_raw).kind;
            let is_global = matches!(kind, TempKind::Global | TempKind::Fixed);

            // A const temp is dedup'd in the context's const table and
            // may be reused verbatim by a later op; never mark it
            // dead; it has no register lifetime to free, just a value
            // that is always available to rematerialize.
            if !live[tidx] && kind != TempKind::Const {
                life.set_dead(arg_pos);
            }
            if is_global && def.flags.contains(OpFlags::SIDE_EFFECTS) {
                life.set_sync(arg_pos);
            }
            live[tidx] = true;
        }

        let op_mut = ctx.op_mut(OpIdx(oi as u32));
        op_mut.life = life;
        op_mut.output_pref = [RegSet::EMPTY; 2];
    }
}
