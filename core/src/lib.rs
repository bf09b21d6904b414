pub mod context;
pub mod cpu_state;
pub mod dump;
pub mod error;
pub mod interrupt;
pub mod ir_builder;
pub mod label;
pub mod op;
pub mod opcode;
pub mod rom;
pub mod tb;
pub mod temp;
pub mod tlb;
pub mod types;

pub use context::Context;
pub use cpu_state::CoreCpuState;
pub use error::{
    cpu_loop_exit, cpu_loop_exit_restore, cpu_resume_from_signal, cpu_set_debug_excp_handler,
    debug_excp_handler, DebugExcpHandler, LoopExit, TlbFault,
};
pub use interrupt::{ArchHooks, InterruptRequest};
pub use label::{Label, LabelUse, RelocKind};
pub use op::{LifeData, Op, OpIdx, MAX_OP_ARGS};
pub use opcode::{OpDef, OpFlags, Opcode, OPCODE_DEFS};
pub use rom::{RomEntry, RomTable};
pub use tb::{JumpCache, TranslationBlock, TB_HASH_SIZE, TB_JMP_CACHE_SIZE};
pub use temp::{Temp, TempIdx, TempKind};
pub use tlb::{Instrumentation, TlbEntry, TlbTable, TlbTables};
pub use types::{Cond, MemOp, RegSet, TempVal, Type};
