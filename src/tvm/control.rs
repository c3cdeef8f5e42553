//! Control transfers, terminators and flag latches. Encoded displacements
//! are not decoded; transfers advance `EIP` by the width of the form.

use super::decode::Cond;
use super::executor::Executor;

// Interrupt trap vectors.
const INT_VECTOR: u32 = 0x80;
const INT3_VECTOR: u32 = 0xCC;
const CALLF_TARGET: u32 = 0x1000;

impl Executor {
    pub(super) fn op_jmp_rel8(&mut self) -> String {
        self.vm.registers.eip = self.vm.registers.eip.wrapping_add(1);
        format!("JMP rel8 -> EIP={}", self.vm.registers.eip)
    }

    pub(super) fn op_jmp_rel32(&mut self) -> String {
        self.vm.registers.eip = self.vm.registers.eip.wrapping_add(4);
        format!("JMP rel32 -> EIP={}", self.vm.registers.eip)
    }

    // Indirect forms take their target from EAX.
    pub(super) fn op_jmp_rm32(&mut self) -> String {
        self.vm.registers.eip = self.vm.registers.eax;
        format!("JMP R/M32 -> EIP={}", self.vm.registers.eip)
    }

    pub(super) fn op_call_rel32(&mut self) -> String {
        let eip = self.vm.registers.eip;
        self.vm.push(eip);
        self.vm.registers.eip = eip.wrapping_add(4);
        format!("CALL rel32 -> pushed return, EIP={}", self.vm.registers.eip)
    }

    pub(super) fn op_call_rm32(&mut self) -> String {
        let eip = self.vm.registers.eip;
        self.vm.push(eip);
        self.vm.registers.eip = self.vm.registers.eax;
        format!("CALL R/M32 -> EIP={}", self.vm.registers.eip)
    }

    pub(super) fn op_ret(&mut self) -> String {
        self.vm.registers.eip = self.vm.pop();
        format!("RET -> EIP={}", self.vm.registers.eip)
    }

    pub(super) fn op_ret_imm16(&mut self) -> String {
        self.vm.registers.eip = self.vm.pop();
        self.vm.registers.esp = self.vm.registers.esp.wrapping_add(2);
        format!("RET imm16 -> EIP={}", self.vm.registers.eip)
    }

    pub(super) fn op_int(&mut self) -> String {
        let eip = self.vm.registers.eip;
        self.vm.push(eip);
        self.vm.registers.eip = INT_VECTOR;
        "INT imm8 -> simulated interrupt".to_string()
    }

    pub(super) fn op_int3(&mut self) -> String {
        let eip = self.vm.registers.eip;
        self.vm.push(eip);
        self.vm.registers.eip = INT3_VECTOR;
        "INT3 -> simulated breakpoint".to_string()
    }

    pub(super) fn op_iret(&mut self) -> String {
        self.vm.registers.eip = self.vm.pop();
        format!("IRET -> EIP={}", self.vm.registers.eip)
    }

    pub(super) fn op_jcc(&mut self, cond: Cond) -> String {
        if cond.holds(&self.vm.flags) {
            self.vm.registers.eip = self.vm.registers.eip.wrapping_add(1);
            format!(
                "{} rel8 -> taken, EIP={}",
                cond.jcc_name(),
                self.vm.registers.eip
            )
        } else {
            format!("{} rel8 -> not taken", cond.jcc_name())
        }
    }

    pub(super) fn op_loop(&mut self) -> String {
        self.vm.registers.ecx = self.vm.registers.ecx.wrapping_sub(1);
        if self.vm.registers.ecx != 0 {
            self.vm.registers.eip = self.vm.registers.eip.wrapping_add(1);
            format!("LOOP -> ECX={} (taken)", self.vm.registers.ecx)
        } else {
            format!("LOOP -> ECX={} (not taken)", self.vm.registers.ecx)
        }
    }

    pub(super) fn op_loope(&mut self) -> String {
        self.vm.registers.ecx = self.vm.registers.ecx.wrapping_sub(1);
        if self.vm.registers.ecx != 0 && self.vm.flags.zf == 1 {
            self.vm.registers.eip = self.vm.registers.eip.wrapping_add(1);
            format!("LOOPE -> ECX={} ZF=1 (taken)", self.vm.registers.ecx)
        } else {
            "LOOPE -> not taken".to_string()
        }
    }

    pub(super) fn op_loopne(&mut self) -> String {
        self.vm.registers.ecx = self.vm.registers.ecx.wrapping_sub(1);
        if self.vm.registers.ecx != 0 && self.vm.flags.zf == 0 {
            self.vm.registers.eip = self.vm.registers.eip.wrapping_add(1);
            format!("LOOPNE -> ECX={} ZF=0 (taken)", self.vm.registers.ecx)
        } else {
            "LOOPNE -> not taken".to_string()
        }
    }

    pub(super) fn op_callf(&mut self) -> String {
        // No segment registers are modelled; a zero placeholder is pushed.
        let eip = self.vm.registers.eip;
        self.vm.push(0);
        self.vm.push(eip.wrapping_add(4));
        self.vm.registers.eip = CALLF_TARGET;
        "CALLF -> simulated far call".to_string()
    }

    pub(super) fn op_hlt(&mut self) -> String {
        self.vm.halted = true;
        "HLT -> execution halted".to_string()
    }

    pub(super) fn op_cmc(&mut self) -> String {
        self.vm.flags.cf ^= 1;
        format!("CMC -> CF={}", self.vm.flags.cf)
    }

    pub(super) fn op_clc(&mut self) -> String {
        self.vm.flags.cf = 0;
        "CLC -> CF=0".to_string()
    }

    pub(super) fn op_stc(&mut self) -> String {
        self.vm.flags.cf = 1;
        "STC -> CF=1".to_string()
    }

    pub(super) fn op_cli(&mut self) -> String {
        "CLI -> interrupts disabled (simulated)".to_string()
    }

    pub(super) fn op_sti(&mut self) -> String {
        "STI -> interrupts enabled (simulated)".to_string()
    }

    pub(super) fn op_cld(&mut self) -> String {
        "CLD -> direction flag cleared (simulated)".to_string()
    }

    pub(super) fn op_std(&mut self) -> String {
        "STD -> direction flag set (simulated)".to_string()
    }

    pub(super) fn op_wait(&mut self) -> String {
        "WAIT -> simulated FPU wait".to_string()
    }
}
