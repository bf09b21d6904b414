//! Raw x86-64 instruction encoding.
//!
//! One routine per instruction shape (register-register, register-memory,
//! register-immediate, ...), built on a small REX/ModRM/SIB core. Mirrors
//! QEMU's `tcg/i386/tcg-target.c.inc` opcode-as-bitmask convention: an
//! opcode constant packs the raw opcode byte together with prefix flags
//! (`P_REXW`, `P_DATA16`, `P_EXT`, ...), and the low-level emitters pull
//! those flags back out rather than taking them as separate arguments.

use crate::code_buffer::CodeBuffer;
use crate::x86_64::regs::Reg;
use tcg_core::Cond;

// -- Opcode prefix/escape bits, ORed into an opcode constant --

/// Two-byte opcode: emit a `0F` escape before the opcode byte.
pub const P_EXT: u32 = 0x0100;
/// 16-bit operand size override (`66` prefix).
pub const P_DATA16: u32 = 0x0200;
/// REX.W: 64-bit operand size.
pub const P_REXW: u32 = 0x0800;
/// Force a REX prefix because the reg field addresses a byte register
/// that needs one to disambiguate from ah/ch/dh/bh (sil, dil, bpl,
/// spl, or r8b-r15b).
pub const P_REXB_R: u32 = 0x1000;
/// Same, for the rm field.
pub const P_REXB_RM: u32 = 0x2000;

pub const OPC_MOVZBL: u32 = P_EXT | 0xB6;
pub const OPC_MOVSBL: u32 = P_EXT | 0xBE;
pub const OPC_MOVZWL: u32 = P_EXT | 0xB7;
pub const OPC_MOVSWL: u32 = P_EXT | 0xBF;
pub const OPC_MOVSLQ: u32 = P_REXW | 0x63;
pub const OPC_JCC_long: u32 = P_EXT | 0x80;
pub const OPC_MOVB_EvGv: u32 = 0x88;
pub const OPC_MOVL_EvGv: u32 = 0x89;

/// x86 arithmetic-group opcode extension (`/digit` in the group-1/2/3
/// encoding tables).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ArithOp {
    Add = 0,
    Or = 1,
    Adc = 2,
    Sbb = 3,
    And = 4,
    Sub = 5,
    Xor = 6,
    Cmp = 7,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ShiftOp {
    Rol = 0,
    Ror = 1,
    Shl = 4,
    Shr = 5,
    Sar = 7,
}

/// x86 condition-code nibble, as used in `Jcc`/`SETcc`/`CMOVcc`
/// opcodes (`0F80+cc`, `0F90+cc`, `0F40+cc`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum X86Cond {
    O = 0x0,
    No = 0x1,
    B = 0x2,
    Ae = 0x3,
    E = 0x4,
    Ne = 0x5,
    Be = 0x6,
    A = 0x7,
    S = 0x8,
    Ns = 0x9,
    L = 0xC,
    Ge = 0xD,
    Le = 0xE,
    G = 0xF,
}

impl X86Cond {
    /// Translate an IR [`Cond`] to the x86 flag test it maps to after
    /// a `cmp`/`test`. `TstEq`/`TstNe` are handled by the caller
    /// emitting a `test` instead of a `cmp` before this and then
    /// reusing the `Eq`/`Ne` mapping.
    pub fn from_tcg(cond: Cond) -> X86Cond {
        match cond {
            Cond::Eq | Cond::TstEq => X86Cond::E,
            Cond::Ne | Cond::TstNe => X86Cond::Ne,
            Cond::Lt => X86Cond::L,
            Cond::Ge => X86Cond::Ge,
            Cond::Le => X86Cond::Le,
            Cond::Gt => X86Cond::G,
            Cond::Ltu => X86Cond::B,
            Cond::Geu => X86Cond::Ae,
            Cond::Leu => X86Cond::Be,
            Cond::Gtu => X86Cond::A,
            Cond::Always | Cond::Never => {
                panic!("Always/Never must be resolved before codegen")
            }
        }
    }

    pub fn invert(self) -> X86Cond {
        match self {
            X86Cond::O => X86Cond::No,
            X86Cond::No => X86Cond::O,
            X86Cond::B => X86Cond::Ae,
            X86Cond::Ae => X86Cond::B,
            X86Cond::E => X86Cond::Ne,
            X86Cond::Ne => X86Cond::E,
            X86Cond::Be => X86Cond::A,
            X86Cond::A => X86Cond::Be,
            X86Cond::S => X86Cond::Ns,
            X86Cond::Ns => X86Cond::S,
            X86Cond::L => X86Cond::Ge,
            X86Cond::Ge => X86Cond::L,
            X86Cond::Le => X86Cond::G,
            X86Cond::G => X86Cond::Le,
        }
    }
}

// -- REX/ModRM/SIB core --

fn emit_rex(buf: &mut CodeBuffer, w: bool, r: bool, x: bool, b: bool, force: bool) {
    if w || r || x || b || force {
        buf.emit_u8(0x40 | (w as u8) << 3 | (r as u8) << 2 | (x as u8) << 1 | b as u8);
    }
}

fn emit_opc_bytes(buf: &mut CodeBuffer, opc: u32) {
    if opc & P_DATA16 != 0 {
        buf.emit_u8(0x66);
    }
    if opc & P_EXT != 0 {
        buf.emit_u8(0x0F);
    }
    buf.emit_u8((opc & 0xFF) as u8);
}

/// Register-direct ModRM form: `opc /r` with both operands in
/// registers. `reg` fills the ModRM reg field, `rm` the ModRM rm
/// field with mod=11.
fn emit_rm_reg(buf: &mut CodeBuffer, opc: u32, reg: Reg, rm: Reg) {
    let w = opc & P_REXW != 0;
    let force = opc & (P_REXB_R | P_REXB_RM) != 0;
    emit_rex(buf, w, reg.needs_rex(), false, rm.needs_rex(), force);
    emit_opc_bytes(buf, opc);
    buf.emit_u8(0xC0 | reg.low_bits() << 3 | rm.low_bits());
}

/// Register-direct ModRM form with a fixed `/digit` extension in the
/// reg field instead of a second register operand (group-1/2/3 ops).
fn emit_rm_ext(buf: &mut CodeBuffer, opc: u32, ext: u8, rm: Reg) {
    let w = opc & P_REXW != 0;
    emit_rex(buf, w, false, false, rm.needs_rex(), false);
    emit_opc_bytes(buf, opc);
    buf.emit_u8(0xC0 | ext << 3 | rm.low_bits());
}

/// `[base + disp]` memory ModRM form.
fn emit_rm_mem(buf: &mut CodeBuffer, opc: u32, reg_or_ext: u8, base: Reg, disp: i32) {
    let w = opc & P_REXW != 0;
    let force = opc & (P_REXB_R | P_REXB_RM) != 0;
    emit_rex(
        buf,
        w,
        reg_or_ext >= 8,
        false,
        base.needs_rex(),
        force,
    );
    emit_opc_bytes(buf, opc);
    write_modrm_mem(buf, reg_or_ext & 0x7, base, disp);
}

fn write_modrm_mem(buf: &mut CodeBuffer, reg_bits: u8, base: Reg, disp: i32) {
    let base_low = base.low_bits();
    let needs_sib = base_low == 4; // rsp/r12 require a SIB byte
    let no_disp = disp == 0 && base_low != 5; // rbp/r13 can't omit disp
    let mode = if no_disp {
        0u8
    } else if (-128..=127).contains(&disp) {
        1u8
    } else {
        2u8
    };
    let rm = if needs_sib { 4 } else { base_low };
    buf.emit_u8(mode << 6 | reg_bits << 3 | rm);
    if needs_sib {
        buf.emit_u8(0x24); // scale=1, index=none, base=base_low
    }
    if mode == 1 {
        buf.emit_u8(disp as i8 as u8);
    } else if mode == 2 || no_disp && base_low == 5 {
        buf.emit_u32(disp as u32);
    }
}

/// `[base + index*1 + disp]` SIB memory form, used for guest loads
/// and stores through the guest-base register.
fn emit_rm_sib(
    buf: &mut CodeBuffer,
    opc: u32,
    reg_or_ext: u8,
    base: Reg,
    index: Reg,
    scale: u8,
    disp: i32,
) {
    let w = opc & P_REXW != 0;
    let force = opc & (P_REXB_R | P_REXB_RM) != 0;
    emit_rex(
        buf,
        w,
        reg_or_ext >= 8,
        index.needs_rex(),
        base.needs_rex(),
        force,
    );
    emit_opc_bytes(buf, opc);
    let base_low = base.low_bits();
    let no_disp = disp == 0 && base_low != 5;
    let mode = if no_disp {
        0u8
    } else if (-128..=127).contains(&disp) {
        1u8
    } else {
        2u8
    };
    buf.emit_u8(mode << 6 | (reg_or_ext & 0x7) << 3 | 4);
    buf.emit_u8(scale << 6 | index.low_bits() << 3 | base_low);
    if mode == 1 {
        buf.emit_u8(disp as i8 as u8);
    } else if mode == 2 {
        buf.emit_u32(disp as u32);
    }
}

// -- Stack / data movement --

pub fn emit_push(buf: &mut CodeBuffer, reg: Reg) {
    emit_rex(buf, false, false, false, reg.needs_rex(), false);
    buf.emit_u8(0x50 | reg.low_bits());
}

pub fn emit_pop(buf: &mut CodeBuffer, reg: Reg) {
    emit_rex(buf, false, false, false, reg.needs_rex(), false);
    buf.emit_u8(0x58 | reg.low_bits());
}

pub fn emit_mov_rr(buf: &mut CodeBuffer, rexw: bool, dst: Reg, src: Reg) {
    let opc = 0x89 | if rexw { P_REXW } else { 0 };
    emit_rm_reg(buf, opc, src, dst);
}

pub fn emit_mov_ri(buf: &mut CodeBuffer, rexw: bool, dst: Reg, val: u64) {
    if rexw {
        emit_rex(buf, true, false, false, dst.needs_rex(), false);
        buf.emit_u8(0xB8 | dst.low_bits());
        buf.emit_u64(val);
    } else {
        emit_rex(buf, false, false, false, dst.needs_rex(), false);
        buf.emit_u8(0xB8 | dst.low_bits());
        buf.emit_u32(val as u32);
    }
}

pub fn emit_load(buf: &mut CodeBuffer, rexw: bool, dst: Reg, base: Reg, offset: i32) {
    let opc = 0x8B | if rexw { P_REXW } else { 0 };
    emit_rm_mem(buf, opc, dst as u8, base, offset);
}

pub fn emit_store(buf: &mut CodeBuffer, rexw: bool, src: Reg, base: Reg, offset: i32) {
    let opc = 0x89 | if rexw { P_REXW } else { 0 };
    emit_rm_mem(buf, opc, src as u8, base, offset);
}

pub fn emit_store_byte(buf: &mut CodeBuffer, src: Reg, base: Reg, offset: i32) {
    emit_rm_mem(buf, OPC_MOVB_EvGv | P_REXB_R, src as u8, base, offset);
}

pub fn emit_store_word(buf: &mut CodeBuffer, src: Reg, base: Reg, offset: i32) {
    emit_rm_mem(buf, OPC_MOVL_EvGv | P_DATA16, src as u8, base, offset);
}

pub fn emit_load_zx(buf: &mut CodeBuffer, opc: u32, dst: Reg, base: Reg, offset: i32) {
    emit_rm_mem(buf, opc, dst as u8, base, offset);
}

pub fn emit_load_sx(buf: &mut CodeBuffer, opc: u32, dst: Reg, base: Reg, offset: i32) {
    emit_rm_mem(buf, opc, dst as u8, base, offset);
}

pub fn emit_movzx(buf: &mut CodeBuffer, opc: u32, dst: Reg, src: Reg) {
    emit_rm_reg(buf, opc, dst, src);
}

pub fn emit_movsx(buf: &mut CodeBuffer, opc: u32, dst: Reg, src: Reg) {
    emit_rm_reg(buf, opc, dst, src);
}

/// Generic register-direct `opc /r` emitter, for spots (like
/// `Deposit`'s byte/word store) that build a ModRM directly rather
/// than going through one of the named shapes above.
pub fn emit_modrm(buf: &mut CodeBuffer, opc: u32, reg: Reg, rm: Reg) {
    emit_rm_reg(buf, opc, reg, rm);
}

// -- Arithmetic --

pub fn emit_arith_rr(buf: &mut CodeBuffer, op: ArithOp, rexw: bool, dst: Reg, src: Reg) {
    let base = 0x01 | (op as u32) << 3;
    let opc = base | if rexw { P_REXW } else { 0 };
    emit_rm_reg(buf, opc, src, dst);
}

pub fn emit_arith_ri(buf: &mut CodeBuffer, op: ArithOp, rexw: bool, dst: Reg, imm: i32) {
    let opc = 0x81 | if rexw { P_REXW } else { 0 };
    let w = opc & P_REXW != 0;
    emit_rex(buf, w, false, false, dst.needs_rex(), false);
    emit_opc_bytes(buf, opc);
    buf.emit_u8(0xC0 | (op as u8) << 3 | dst.low_bits());
    buf.emit_u32(imm as u32);
}

pub fn emit_test_rr(buf: &mut CodeBuffer, rexw: bool, a: Reg, b: Reg) {
    let opc = 0x85 | if rexw { P_REXW } else { 0 };
    emit_rm_reg(buf, opc, b, a);
}

pub fn emit_imul_rr(buf: &mut CodeBuffer, rexw: bool, dst: Reg, src: Reg) {
    let opc = P_EXT | 0xAF | if rexw { P_REXW } else { 0 };
    emit_rm_reg(buf, opc, dst, src);
}

pub fn emit_neg(buf: &mut CodeBuffer, rexw: bool, reg: Reg) {
    let opc = 0xF7 | if rexw { P_REXW } else { 0 };
    emit_rm_ext(buf, opc, 3, reg);
}

pub fn emit_not(buf: &mut CodeBuffer, rexw: bool, reg: Reg) {
    let opc = 0xF7 | if rexw { P_REXW } else { 0 };
    emit_rm_ext(buf, opc, 2, reg);
}

pub fn emit_stc(buf: &mut CodeBuffer) {
    buf.emit_u8(0xF9);
}

/// `ANDN dst, src1, src2` (BMI1, VEX.NDS): `dst = src2 & !src1`.
pub fn emit_andn(buf: &mut CodeBuffer, rexw: bool, dst: Reg, src1: Reg, src2: Reg) {
    // VEX.NDS.LZ.0F38.W{0,1} F2 /r
    let r = !dst.needs_rex();
    let x = true;
    let b = !src2.needs_rex();
    let vvvv = !(src1 as u8) & 0xF;
    if !src2.needs_rex() && rexw {
        // 3-byte VEX required whenever W=1
        buf.emit_u8(0xC4);
        buf.emit_u8((r as u8) << 7 | (x as u8) << 6 | (b as u8) << 5 | 0x02);
        buf.emit_u8((rexw as u8) << 7 | vvvv << 3);
    } else {
        buf.emit_u8(0xC4);
        buf.emit_u8((r as u8) << 7 | (x as u8) << 6 | (b as u8) << 5 | 0x02);
        buf.emit_u8((rexw as u8) << 7 | vvvv << 3);
    }
    buf.emit_u8(0xF2);
    buf.emit_u8(0xC0 | dst.low_bits() << 3 | src2.low_bits());
}

pub fn emit_lzcnt(buf: &mut CodeBuffer, rexw: bool, dst: Reg, src: Reg) {
    buf.emit_u8(0xF3);
    let opc = P_EXT | 0xBD | if rexw { P_REXW } else { 0 };
    emit_rm_reg(buf, opc, dst, src);
}

pub fn emit_tzcnt(buf: &mut CodeBuffer, rexw: bool, dst: Reg, src: Reg) {
    buf.emit_u8(0xF3);
    let opc = P_EXT | 0xBC | if rexw { P_REXW } else { 0 };
    emit_rm_reg(buf, opc, dst, src);
}

pub fn emit_popcnt(buf: &mut CodeBuffer, rexw: bool, dst: Reg, src: Reg) {
    buf.emit_u8(0xF3);
    let opc = P_EXT | 0xB8 | if rexw { P_REXW } else { 0 };
    emit_rm_reg(buf, opc, dst, src);
}

pub fn emit_bswap(buf: &mut CodeBuffer, rexw: bool, reg: Reg) {
    emit_rex(buf, rexw, false, false, reg.needs_rex(), false);
    buf.emit_u8(0x0F);
    buf.emit_u8(0xC8 | reg.low_bits());
}

/// 16-bit `ROL reg, 8` — byte-swaps the low word in place.
pub fn emit_rolw_8(buf: &mut CodeBuffer, reg: Reg) {
    let opc = 0xC1 | P_DATA16;
    emit_rm_ext(buf, opc, ShiftOp::Rol as u8, reg);
    buf.emit_u8(8);
}

pub fn emit_shift_cl(buf: &mut CodeBuffer, op: ShiftOp, rexw: bool, reg: Reg) {
    let opc = 0xD3 | if rexw { P_REXW } else { 0 };
    emit_rm_ext(buf, opc, op as u8, reg);
}

pub fn emit_shift_ri(buf: &mut CodeBuffer, op: ShiftOp, rexw: bool, reg: Reg, imm: u8) {
    let opc = 0xC1 | if rexw { P_REXW } else { 0 };
    emit_rm_ext(buf, opc, op as u8, reg);
    buf.emit_u8(imm);
}

/// `SHRD dst, src, imm8`.
pub fn emit_shrd_ri(buf: &mut CodeBuffer, rexw: bool, dst: Reg, src: Reg, imm: u8) {
    let opc = P_EXT | 0xAC | if rexw { P_REXW } else { 0 };
    emit_rm_reg(buf, opc, src, dst);
    buf.emit_u8(imm);
}

/// Three-operand `LEA dst, [base + index*(1<<scale_shift) + disp]`,
/// used to implement non-destructive `add dst, a, b`.
pub fn emit_lea_sib(
    buf: &mut CodeBuffer,
    rexw: bool,
    dst: Reg,
    base: Reg,
    index: Reg,
    scale_shift: u8,
    disp: i32,
) {
    let opc = 0x8D | if rexw { P_REXW } else { 0 };
    emit_rm_sib(buf, opc, dst as u8, base, index, scale_shift, disp);
}

// -- Multiply / divide (one-operand, implicit rax:rdx) --

pub fn emit_imul1(buf: &mut CodeBuffer, rexw: bool, src: Reg) {
    let opc = 0xF7 | if rexw { P_REXW } else { 0 };
    emit_rm_ext(buf, opc, 5, src);
}

pub fn emit_mul(buf: &mut CodeBuffer, rexw: bool, src: Reg) {
    let opc = 0xF7 | if rexw { P_REXW } else { 0 };
    emit_rm_ext(buf, opc, 4, src);
}

pub fn emit_idiv(buf: &mut CodeBuffer, rexw: bool, src: Reg) {
    let opc = 0xF7 | if rexw { P_REXW } else { 0 };
    emit_rm_ext(buf, opc, 7, src);
}

pub fn emit_div(buf: &mut CodeBuffer, rexw: bool, src: Reg) {
    let opc = 0xF7 | if rexw { P_REXW } else { 0 };
    emit_rm_ext(buf, opc, 6, src);
}

// -- Compare-and-branch --

pub fn emit_setcc(buf: &mut CodeBuffer, cond: X86Cond, reg: Reg) {
    let opc = P_EXT | (0x90 + cond as u32) | P_REXB_RM;
    emit_rm_ext(buf, opc, 0, reg);
}

pub fn emit_cmovcc(buf: &mut CodeBuffer, cond: X86Cond, rexw: bool, dst: Reg, src: Reg) {
    let opc = P_EXT | (0x40 + cond as u32) | if rexw { P_REXW } else { 0 };
    emit_rm_reg(buf, opc, dst, src);
}

/// Near `Jcc rel32` to an already-resolved target offset.
pub fn emit_jcc(buf: &mut CodeBuffer, cond: X86Cond, target_offset: usize) {
    emit_opc(buf, OPC_JCC_long + cond as u32, 0, 0);
    let disp = target_offset as i64 - (buf.offset() as i64 + 4);
    buf.emit_u32(disp as u32);
}

/// Emit a bare opcode (REX + optional `0F` escape + opcode byte) with
/// no ModRM — used for instructions like `Jcc rel32` whose only
/// "operand" is the immediate that follows, written separately by the
/// caller so it can be left as a placeholder and patched later.
pub fn emit_opc(buf: &mut CodeBuffer, opc: u32, r: u8, rm: u8) {
    let w = opc & P_REXW != 0;
    let force = opc & (P_REXB_R | P_REXB_RM) != 0;
    emit_rex(buf, w, r >= 8, false, rm >= 8, force);
    emit_opc_bytes(buf, opc);
}

/// Near unconditional `JMP rel32` to an already-resolved target
/// offset.
pub fn emit_jmp(buf: &mut CodeBuffer, target_offset: usize) {
    buf.emit_u8(0xE9);
    let disp = target_offset as i64 - (buf.offset() as i64 + 4);
    buf.emit_u32(disp as u32);
}

pub fn emit_jmp_reg(buf: &mut CodeBuffer, reg: Reg) {
    emit_rm_ext(buf, 0xFF, 4, reg);
}

pub fn emit_call_reg(buf: &mut CodeBuffer, reg: Reg) {
    emit_rm_ext(buf, 0xFF, 2, reg);
}

pub fn emit_ret(buf: &mut CodeBuffer) {
    buf.emit_u8(0xC3);
}

pub fn emit_mfence(buf: &mut CodeBuffer) {
    buf.emit_u8(0x0F);
    buf.emit_u8(0xAE);
    buf.emit_u8(0xF0);
}

// -- SIB-addressed guest memory access (base=R14, index=addr reg) --

pub fn emit_load_zx_sib(buf: &mut CodeBuffer, opc: u32, dst: Reg, base: Reg, index: Reg) {
    emit_rm_sib(buf, opc, dst as u8, base, index, 0, 0);
}

pub fn emit_load_sx_sib(buf: &mut CodeBuffer, opc: u32, dst: Reg, base: Reg, index: Reg) {
    emit_rm_sib(buf, opc, dst as u8, base, index, 0, 0);
}

#[allow(clippy::too_many_arguments)]
pub fn emit_load_sib(
    buf: &mut CodeBuffer,
    rexw: bool,
    dst: Reg,
    base: Reg,
    index: Reg,
    scale: u8,
    disp: i32,
) {
    let opc = 0x8B | if rexw { P_REXW } else { 0 };
    emit_rm_sib(buf, opc, dst as u8, base, index, scale, disp);
}

#[allow(clippy::too_many_arguments)]
pub fn emit_store_sib(
    buf: &mut CodeBuffer,
    rexw: bool,
    src: Reg,
    base: Reg,
    index: Reg,
    scale: u8,
    disp: i32,
) {
    let opc = 0x89 | if rexw { P_REXW } else { 0 };
    emit_rm_sib(buf, opc, src as u8, base, index, scale, disp);
}

pub fn emit_store_byte_sib(buf: &mut CodeBuffer, src: Reg, base: Reg, index: Reg) {
    emit_rm_sib(buf, OPC_MOVB_EvGv | P_REXB_R, src as u8, base, index, 0, 0);
}

pub fn emit_store_word_sib(buf: &mut CodeBuffer, src: Reg, base: Reg, index: Reg) {
    emit_rm_sib(
        buf,
        OPC_MOVL_EvGv | P_DATA16,
        src as u8,
        base,
        index,
        0,
        0,
    );
}
