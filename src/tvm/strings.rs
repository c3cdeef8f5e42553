//! Moves, stack traffic, string ops over `[ESI]`/`[EDI]`, flag transfers and
//! the SETcc family.

use super::decode::{Cond, Reg};
use super::executor::Executor;

impl Executor {
    pub(super) fn op_mov_imm_eax(&mut self) -> String {
        // Placeholder immediate; the instruction stream is not decoded.
        self.vm.registers.eax = 1;
        format!("MOV EAX, imm32 -> {}", self.vm.registers.eax)
    }

    pub(super) fn op_mov_eax_ebx(&mut self) -> String {
        self.vm.registers.eax = self.vm.registers.ebx;
        format!("MOV EAX, EBX -> {}", self.vm.registers.eax)
    }

    pub(super) fn op_mov_ebx_eax(&mut self) -> String {
        self.vm.registers.ebx = self.vm.registers.eax;
        format!("MOV EBX, EAX -> {}", self.vm.registers.ebx)
    }

    pub(super) fn op_push(&mut self, reg: Reg) -> String {
        let value = self.vm.reg(reg);
        self.vm.push(value);
        format!("PUSH {} -> {}", reg.name(), value)
    }

    pub(super) fn op_pop(&mut self, reg: Reg) -> String {
        let value = self.vm.pop();
        self.vm.set_reg(reg, value);
        format!("POP {} -> {}", reg.name(), value)
    }

    // The r/m32 forms default to EAX.
    pub(super) fn op_push_rm32(&mut self) -> String {
        let value = self.vm.registers.eax;
        self.vm.push(value);
        format!("PUSH R/M32 -> {value}")
    }

    pub(super) fn op_pop_rm32(&mut self) -> String {
        self.vm.registers.eax = self.vm.pop();
        format!("POP R/M32 -> {}", self.vm.registers.eax)
    }

    pub(super) fn op_stosb(&mut self) -> String {
        let addr = self.vm.registers.edi;
        let value = (self.vm.registers.eax & 0xFF) as u8;
        self.vm.write_byte(addr, value);
        self.vm.registers.edi = addr.wrapping_add(1);
        format!("STOSB -> MEM[{addr}]={value}")
    }

    pub(super) fn op_stosd(&mut self) -> String {
        let addr = self.vm.registers.edi;
        let value = self.vm.registers.eax;
        self.vm.write_mem(addr, value, 4);
        self.vm.registers.edi = addr.wrapping_add(4);
        format!("STOSD -> MEM[{addr}]={value}")
    }

    pub(super) fn op_movsb(&mut self) -> String {
        let value = self.vm.read_byte(self.vm.registers.esi);
        self.vm.write_byte(self.vm.registers.edi, value);
        self.vm.registers.esi = self.vm.registers.esi.wrapping_add(1);
        self.vm.registers.edi = self.vm.registers.edi.wrapping_add(1);
        format!("MOVSB -> copied byte {value:#04x}")
    }

    pub(super) fn op_movsd(&mut self) -> String {
        let value = self.vm.read_mem(self.vm.registers.esi, 4);
        self.vm.write_mem(self.vm.registers.edi, value, 4);
        self.vm.registers.esi = self.vm.registers.esi.wrapping_add(4);
        self.vm.registers.edi = self.vm.registers.edi.wrapping_add(4);
        format!("MOVSD -> copied dword {value:#010x}")
    }

    pub(super) fn op_cmpsb(&mut self) -> String {
        let a = self.vm.read_byte(self.vm.registers.esi);
        let b = self.vm.read_byte(self.vm.registers.edi);
        self.vm.update_flags(i128::from(a) - i128::from(b), 8);
        self.vm.registers.esi = self.vm.registers.esi.wrapping_add(1);
        self.vm.registers.edi = self.vm.registers.edi.wrapping_add(1);
        format!("CMPSB -> compared {a:#04x} vs {b:#04x}")
    }

    pub(super) fn op_cmpsd(&mut self) -> String {
        let a = self.vm.read_mem(self.vm.registers.esi, 4);
        let b = self.vm.read_mem(self.vm.registers.edi, 4);
        self.vm.update_flags(i128::from(a) - i128::from(b), 32);
        self.vm.registers.esi = self.vm.registers.esi.wrapping_add(4);
        self.vm.registers.edi = self.vm.registers.edi.wrapping_add(4);
        format!("CMPSD -> compared {a:#010x} vs {b:#010x}")
    }

    pub(super) fn op_lodsb(&mut self) -> String {
        let value = self.vm.read_byte(self.vm.registers.esi);
        self.vm.registers.eax = (self.vm.registers.eax & 0xFFFF_FF00) | u32::from(value);
        self.vm.registers.esi = self.vm.registers.esi.wrapping_add(1);
        format!("LODSB -> loaded AL={value:#04x}")
    }

    pub(super) fn op_lodsd(&mut self) -> String {
        let value = self.vm.read_mem(self.vm.registers.esi, 4);
        self.vm.registers.eax = value;
        self.vm.registers.esi = self.vm.registers.esi.wrapping_add(4);
        format!("LODSD -> loaded EAX={value:#010x}")
    }

    pub(super) fn op_scasb(&mut self) -> String {
        let a = self.vm.registers.eax & 0xFF;
        let b = self.vm.read_byte(self.vm.registers.edi);
        self.vm.update_flags(i128::from(a) - i128::from(b), 8);
        self.vm.registers.edi = self.vm.registers.edi.wrapping_add(1);
        format!("SCASB -> compared AL={a:#04x} vs {b:#04x}")
    }

    pub(super) fn op_scasd(&mut self) -> String {
        let a = self.vm.registers.eax;
        let b = self.vm.read_mem(self.vm.registers.edi, 4);
        self.vm.update_flags(i128::from(a) - i128::from(b), 32);
        self.vm.registers.edi = self.vm.registers.edi.wrapping_add(4);
        format!("SCASD -> compared EAX={a:#010x} vs {b:#010x}")
    }

    pub(super) fn op_pushf(&mut self) -> String {
        let word = self.vm.flags.word();
        self.vm.push(word);
        format!("PUSHF -> {word:#010x}")
    }

    pub(super) fn op_popf(&mut self) -> String {
        let word = self.vm.pop();
        self.vm.flags.set_word(word);
        "POPF -> flags restored".to_string()
    }

    // SAHF/LAHF use the x86 AH layout: SF,ZF,AF,PF,CF in bits 7,6,4,2,0.
    pub(super) fn op_sahf(&mut self) -> String {
        let ah = (self.vm.registers.eax >> 8) & 0xFF;
        self.vm.flags.sf = (ah >> 7 & 1) as u8;
        self.vm.flags.zf = (ah >> 6 & 1) as u8;
        self.vm.flags.af = (ah >> 4 & 1) as u8;
        self.vm.flags.pf = (ah >> 2 & 1) as u8;
        self.vm.flags.cf = (ah & 1) as u8;
        "SAHF -> flags updated from AH".to_string()
    }

    pub(super) fn op_lahf(&mut self) -> String {
        let ah = u32::from(self.vm.flags.sf) << 7
            | u32::from(self.vm.flags.zf) << 6
            | u32::from(self.vm.flags.af) << 4
            | u32::from(self.vm.flags.pf) << 2
            | u32::from(self.vm.flags.cf);
        self.vm.registers.eax = (self.vm.registers.eax & 0xFFFF_00FF) | (ah << 8);
        "LAHF -> AH loaded with flags".to_string()
    }

    pub(super) fn op_cbw(&mut self) -> String {
        let al = self.vm.registers.eax & 0xFF;
        if al & 0x80 != 0 {
            self.vm.registers.eax |= 0xFF00;
        } else {
            self.vm.registers.eax &= 0xFFFF_00FF;
        }
        "CBW -> sign-extended AL into AX".to_string()
    }

    pub(super) fn op_cwd(&mut self) -> String {
        let ax = self.vm.registers.eax & 0xFFFF;
        self.vm.registers.edx = if ax & 0x8000 != 0 { 0xFFFF } else { 0 };
        "CWD -> sign-extended AX into DX".to_string()
    }

    pub(super) fn op_xchg(&mut self, reg: Reg) -> String {
        let eax = self.vm.registers.eax;
        let other = self.vm.reg(reg);
        self.vm.registers.eax = other;
        self.vm.set_reg(reg, eax);
        format!(
            "XCHG EAX, {} -> EAX={} {}={}",
            reg.name(),
            self.vm.registers.eax,
            reg.name(),
            self.vm.reg(reg)
        )
    }

    pub(super) fn op_setcc(&mut self, cond: Cond) -> String {
        let bit = u32::from(cond.holds(&self.vm.flags));
        self.vm.registers.eax = (self.vm.registers.eax & 0xFFFF_FF00) | bit;
        format!(
            "{} AL -> AL={}",
            cond.setcc_name(),
            self.vm.registers.eax & 0xFF
        )
    }
}
