use serde::Serialize;

/// Default size of the byte-addressable memory.
pub const DEFAULT_MEMORY_SIZE: usize = 65536;

/// General-purpose 32-bit registers plus the instruction pointer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct Registers {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
    pub esi: u32,
    pub edi: u32,
    pub ebp: u32,
    pub esp: u32,
    pub eip: u32,
}

/// Single-bit status flags. Declaration order is the PUSHF/POPF bit order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct Flags {
    pub zf: u8,
    pub cf: u8,
    pub sf: u8,
    pub of: u8,
    pub pf: u8,
    pub af: u8,
}

impl Flags {
    /// Pack the flags into a word, bit i holding the i-th flag in
    /// declaration order.
    pub fn word(&self) -> u32 {
        u32::from(self.zf)
            | u32::from(self.cf) << 1
            | u32::from(self.sf) << 2
            | u32::from(self.of) << 3
            | u32::from(self.pf) << 4
            | u32::from(self.af) << 5
    }

    pub fn set_word(&mut self, word: u32) {
        self.zf = (word & 1) as u8;
        self.cf = (word >> 1 & 1) as u8;
        self.sf = (word >> 2 & 1) as u8;
        self.of = (word >> 3 & 1) as u8;
        self.pf = (word >> 4 & 1) as u8;
        self.af = (word >> 5 & 1) as u8;
    }
}

/// Architectural state of the opcode VM: registers, flags, linear
/// little-endian memory and the halted latch.
pub struct Machine {
    pub registers: Registers,
    pub flags: Flags,
    memory: Vec<u8>,
    pub halted: bool,
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

impl Machine {
    pub fn new() -> Self {
        Self::with_memory_size(DEFAULT_MEMORY_SIZE)
    }

    pub fn with_memory_size(size: usize) -> Self {
        let size = size.max(16);
        Machine {
            registers: Registers {
                eax: 0,
                ebx: 0,
                ecx: 0,
                edx: 0,
                esi: 0,
                edi: 0,
                ebp: 0,
                // The stack grows down from the top of memory.
                esp: (size - 4) as u32,
                eip: 0,
            },
            flags: Flags::default(),
            memory: vec![0; size],
            halted: false,
        }
    }

    pub fn memory_size(&self) -> usize {
        self.memory.len()
    }

    // Addresses wrap modulo the memory size; every handler is total.
    fn index(&self, addr: u32) -> usize {
        addr as usize % self.memory.len()
    }

    pub fn read_byte(&self, addr: u32) -> u8 {
        self.memory[self.index(addr)]
    }

    pub fn write_byte(&mut self, addr: u32, value: u8) {
        let i = self.index(addr);
        self.memory[i] = value;
    }

    /// Little-endian read of `size` bytes (at most 4).
    pub fn read_mem(&self, addr: u32, size: usize) -> u32 {
        let mut out = 0u32;
        for i in 0..size.min(4) {
            out |= u32::from(self.read_byte(addr.wrapping_add(i as u32))) << (8 * i);
        }
        out
    }

    /// Little-endian write of `size` bytes (at most 4).
    pub fn write_mem(&mut self, addr: u32, value: u32, size: usize) {
        for i in 0..size.min(4) {
            self.write_byte(addr.wrapping_add(i as u32), (value >> (8 * i)) as u8);
        }
    }

    /// Push a 32-bit value on the stack.
    pub fn push(&mut self, value: u32) {
        self.registers.esp = self.registers.esp.wrapping_sub(4);
        self.write_mem(self.registers.esp, value, 4);
    }

    /// Pop a 32-bit value from the stack.
    pub fn pop(&mut self) -> u32 {
        let value = self.read_mem(self.registers.esp, 4);
        self.registers.esp = self.registers.esp.wrapping_add(4);
        value
    }

    /// Set ZF, SF, CF and PF for an arithmetic result at the given width.
    /// CF records truncation; OF and AF are not computed.
    pub(crate) fn update_flags(&mut self, result: i128, bits: u32) {
        let mask = (1i128 << bits) - 1;
        let sign = 1i128 << (bits - 1);
        let res = result & mask;

        self.flags.zf = u8::from(res == 0);
        self.flags.sf = u8::from(res & sign != 0);
        self.flags.cf = u8::from(result != res);
        self.flags.pf = u8::from((res & 0xFF).count_ones() % 2 == 0);
        self.flags.of = 0;
        self.flags.af = 0;
    }

    pub fn dump_state(&self) -> serde_json::Value {
        serde_json::json!({
            "registers": self.registers,
            "flags": self.flags,
        })
    }
}
