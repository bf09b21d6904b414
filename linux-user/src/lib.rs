mod elf;

pub use elf::{
    Elf64Ehdr, Elf64Phdr, ElfError, AT_ENTRY, AT_NULL, AT_PAGESZ, AT_PHDR,
    AT_PHENT, AT_PHNUM, AT_RANDOM, EM_RISCV, ET_EXEC, PF_R, PF_W, PF_X,
    PT_LOAD, PT_PHDR,
};
