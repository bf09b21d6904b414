use std::sync::atomic::AtomicBool;
use std::sync::Mutex;

/// Chaining state for a TB's two `goto_tb` exit slots.
///
/// Split out from `TranslationBlock` into its own `Mutex` because
/// `jmp_dest`/`jmp_list` are mutated concurrently with other TBs'
/// chaining during invalidation (see `tcg_exec::tb_store::invalidate`),
/// whereas the rest of a TB's fields are write-once at generation
/// time and read-only afterward.
#[derive(Debug, Default)]
pub struct JmpState {
    /// The TB patched into each exit slot, if chained.
    pub jmp_dest: [Option<usize>; 2],
    /// Reverse edges: `(src_tb, slot)` pairs that chain into this TB.
    /// Walked on invalidation to unlink incoming jumps.
    pub jmp_list: Vec<(usize, usize)>,
}

/// A cached translated code block.
///
/// Maps to QEMU's `TranslationBlock`. Represents the mapping from a
/// guest code region to generated host machine code.
#[derive(Debug)]
pub struct TranslationBlock {
    /// Guest virtual PC where this TB starts.
    pub pc: u64,
    /// CS base (x86) or 0 for other architectures. Part of the
    /// translation key alongside `pc` and `flags`.
    pub cs_base: u64,
    /// CPU state flags that affect translation (e.g. privilege level, ISA mode).
    pub flags: u32,
    /// Compile flags (instruction count limit, single-step, etc.).
    pub cflags: u32,
    /// Size of guest code covered by this TB, in bytes.
    pub size: u32,
    /// Number of guest instructions in this TB.
    pub icount: u16,

    /// Offset into the global code buffer where host code starts.
    pub host_offset: usize,
    /// Size of generated host code in bytes.
    pub host_size: usize,

    /// Offset of the `goto_tb` jump instruction for each exit (up to 2).
    /// Used by TB chaining to atomically patch the jump target.
    /// `None` means the slot is unused.
    pub jmp_insn_offset: [Option<u32>; 2],

    /// Offset right after the `goto_tb` instruction for each exit.
    /// Used to reset the jump when unlinking.
    pub jmp_reset_offset: [Option<u32>; 2],

    /// Physical address of the first guest page this TB covers.
    pub phys_pc: u64,

    /// Physical pages spanned by this TB. `page_addr[1] == -1` when
    /// the TB does not cross a page boundary. A page-spanning TB is
    /// never patched as a direct-jump target (enforced by the
    /// execution loop, not by this struct — §3 invariant 3).
    pub page_addr: [i64; 2],

    /// Index of the next TB in the same hash bucket, or `None`.
    pub hash_next: Option<usize>,

    /// Whether this TB has been invalidated. Atomic because a reader
    /// walking the hash chain may race a writer flushing the cache
    /// (see `tcg_exec::tb_store`).
    pub invalid: AtomicBool,

    /// Direct-jump chaining state; see `JmpState`.
    pub jmp: Mutex<JmpState>,
}

/// Compile flags for TranslationBlock.cflags.
pub mod cflags {
    /// Mask for the instruction count limit (0 = no limit).
    pub const CF_COUNT_MASK: u32 = 0x0000_FFFF;
    /// Last I/O instruction in the TB.
    pub const CF_LAST_IO: u32 = 0x0001_0000;
    /// TB is being single-stepped.
    pub const CF_SINGLE_STEP: u32 = 0x0002_0000;
    /// Use icount (deterministic execution).
    pub const CF_USE_ICOUNT: u32 = 0x0004_0000;
}

/// goto_tb exit slots: chainable direct-jump targets. Values 0/1 are
/// reserved by the host-execute calling convention (the low bits of
/// its return word), so loop-exit exception numbers are kept above
/// `TB_EXIT_MASK`.
pub const TB_EXIT_IDX0: usize = 0;
pub const TB_EXIT_IDX1: usize = 1;
pub const TB_EXIT_IDXMAX: usize = TB_EXIT_IDX1;
/// Indirect-jump exit (e.g. a guest `jalr`/`ret`): looked up through
/// a single-entry per-TB cache rather than a patched direct jump.
pub const TB_EXIT_NOCHAIN: usize = 2;
pub const TB_EXIT_MASK: usize = 3;

/// Loop-exit exception numbers a TB can request directly, used by
/// the linux-user demo frontend to signal a guest syscall/trap
/// without a full architectural exception delivery. Chosen above
/// `TB_EXIT_MASK` so they never collide with the goto_tb slots.
pub const EXCP_ECALL: i32 = 8;
pub const EXCP_EBREAK: i32 = 9;
pub const EXCP_UNDEF: i32 = 10;

impl TranslationBlock {
    pub fn new(pc: u64, cs_base: u64, flags: u32, cflags: u32) -> Self {
        Self {
            pc,
            cs_base,
            flags,
            cflags,
            size: 0,
            icount: 0,
            host_offset: 0,
            host_size: 0,
            jmp_insn_offset: [None; 2],
            jmp_reset_offset: [None; 2],
            phys_pc: 0,
            page_addr: [-1, -1],
            hash_next: None,
            invalid: AtomicBool::new(false),
            jmp: Mutex::new(JmpState::default()),
        }
    }

    /// Compute hash bucket index for TB lookup. Folds in `cs_base`
    /// alongside `pc`/`flags` so two TBs that share a PC but differ
    /// in segment base (x86) don't collide in the common case.
    pub fn hash(pc: u64, cs_base: u64, flags: u32) -> usize {
        let h = pc.wrapping_mul(0x9e3779b97f4a7c15)
            ^ cs_base.wrapping_mul(0xff51afd7ed558ccd)
            ^ (flags as u64);
        (h as usize) & (TB_HASH_SIZE - 1)
    }

    /// True iff this TB's page is still `phys_page1` (and, if it
    /// spans two pages, `phys_page2` still matches the second page).
    /// Step 3 of the C2 slow-tier lookup (§4.2).
    pub fn pages_coherent(&self, phys_page1: u64, phys_page2: Option<u64>) -> bool {
        if self.page_addr[0] != phys_page1 as i64 {
            return false;
        }
        match (self.page_addr[1], phys_page2) {
            (-1, _) => true,
            (p1, Some(p2)) => p1 == p2 as i64,
            (_, None) => false,
        }
    }

    /// Record the offset of a `goto_tb` jump instruction for exit slot `n`.
    pub fn set_jmp_insn_offset(&mut self, n: usize, offset: u32) {
        assert!(n < 2);
        self.jmp_insn_offset[n] = Some(offset);
    }

    /// Record the reset offset for exit slot `n`.
    pub fn set_jmp_reset_offset(&mut self, n: usize, offset: u32) {
        assert!(n < 2);
        self.jmp_reset_offset[n] = Some(offset);
    }

    /// Maximum number of guest instructions per TB.
    pub fn max_insns(cflags: u32) -> u32 {
        let count = cflags & cflags::CF_COUNT_MASK;
        if count == 0 {
            512
        } else {
            count
        }
    }
}

/// Number of buckets in the global TB hash table.
pub const TB_HASH_SIZE: usize = 1 << 15; // 32768

/// Number of entries in the per-CPU jump cache.
pub const TB_JMP_CACHE_SIZE: usize = 1 << 12; // 4096

/// Per-CPU direct-mapped TB jump cache.
///
/// Indexed by `(pc >> 2) & (TB_JMP_CACHE_SIZE - 1)`.
/// Provides O(1) lookup for the common case of re-executing the same PC.
pub struct JumpCache {
    entries: Box<[Option<usize>; TB_JMP_CACHE_SIZE]>,
}

impl JumpCache {
    pub fn new() -> Self {
        Self {
            entries: Box::new([None; TB_JMP_CACHE_SIZE]),
        }
    }

    fn index(pc: u64) -> usize {
        (pc as usize >> 2) & (TB_JMP_CACHE_SIZE - 1)
    }

    pub fn lookup(&self, pc: u64) -> Option<usize> {
        self.entries[Self::index(pc)]
    }

    pub fn insert(&mut self, pc: u64, tb_idx: usize) {
        self.entries[Self::index(pc)] = Some(tb_idx);
    }

    pub fn remove(&mut self, pc: u64) {
        self.entries[Self::index(pc)] = None;
    }

    pub fn invalidate(&mut self) {
        self.entries.fill(None);
    }
}

impl Default for JumpCache {
    fn default() -> Self {
        Self::new()
    }
}
