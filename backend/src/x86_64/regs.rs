//! x86-64 register numbering and the fixed roles the backend assigns
//! to a handful of them.
//!
//! Reference: `~/qemu/tcg/i386/tcg-target.h`.

use tcg_core::RegSet;

/// General-purpose x86-64 registers, numbered by their encoding (the
/// value that goes in a ModRM reg/rm field, extended by REX.B/R).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Reg {
    Rax = 0,
    Rcx = 1,
    Rdx = 2,
    Rbx = 3,
    Rsp = 4,
    Rbp = 5,
    Rsi = 6,
    Rdi = 7,
    R8 = 8,
    R9 = 9,
    R10 = 10,
    R11 = 11,
    R12 = 12,
    R13 = 13,
    R14 = 14,
    R15 = 15,
}

impl Reg {
    pub fn from_u8(v: u8) -> Reg {
        assert!(v < 16, "invalid register number {v}");
        // SAFETY: Reg is repr(u8) over 0..16 and v was just checked.
        unsafe { std::mem::transmute::<u8, Reg>(v) }
    }

    /// Whether encoding this register requires a REX prefix byte
    /// even with no other REX bit set (r8-r15).
    pub fn needs_rex(self) -> bool {
        self as u8 >= 8
    }

    /// Low 3 bits of the encoding, as goes in a ModRM/SIB field;
    /// the high bit is carried separately in the REX prefix.
    pub fn low_bits(self) -> u8 {
        self as u8 & 0x7
    }
}

/// Callee-saved registers the prologue pushes and the epilogue pops,
/// in push order. `Rbp` is excluded: it's repurposed as the env
/// pointer for the whole TB, so the slot that would save it is folded
/// into this list's own push/pop pair via the explicit `mov` in
/// `emit_prologue` instead of a second save.
pub const CALLEE_SAVED: &[Reg] =
    &[Reg::Rbp, Reg::Rbx, Reg::R12, Reg::R13, Reg::R14, Reg::R15];

/// System V AMD64 integer argument registers, in order.
pub const CALL_ARG_REGS: [Reg; 6] =
    [Reg::Rdi, Reg::Rsi, Reg::Rdx, Reg::Rcx, Reg::R8, Reg::R9];

/// Extra stack space reserved below the return address so helper
/// calls have a System V-compliant 16-byte-aligned frame without
/// needing a dedicated push/pop around every call.
pub const STACK_ADDEND: i64 = 0x18;

/// Byte offset from `frame_reg` (rsp) where the spill area starts —
/// skips past the stack slots reserved for the first handful of
/// stack-passed call arguments.
pub const STATIC_CALL_ARGS_SIZE: i64 = 0x20;

/// Number of 8-byte spill slots reserved in the stack frame.
pub const CPU_TEMP_BUF_NLONGS: i64 = 128;

/// Registers the backend reserves for fixed roles: `rsp` (spill
/// frame pointer), `rbp` (env pointer, see [`CALLEE_SAVED`]), and
/// `r14` (guest memory base, loaded once in the prologue).
pub const RESERVED_REGS: RegSet = RegSet::from_raw(
    (1 << Reg::Rsp as u8) | (1 << Reg::Rbp as u8) | (1 << Reg::R14 as u8),
);

/// Registers available to the generic allocator: everything except
/// [`RESERVED_REGS`].
pub const ALLOCATABLE_REGS: RegSet = RegSet::from_raw(0xFFFF & !RESERVED_REGS.bits());
