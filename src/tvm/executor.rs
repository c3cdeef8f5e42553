use tracing::debug;

use super::decode::{decode, Op};
use super::machine::Machine;

/// Drives a [`Machine`] one opcode at a time. Each step returns a short
/// status string summarising the handler's action.
pub struct Executor {
    pub vm: Machine,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor {
    pub fn new() -> Self {
        Self::with_machine(Machine::new())
    }

    pub fn with_machine(vm: Machine) -> Self {
        Executor { vm }
    }

    /// Execute one opcode. Unknown opcodes report without mutating state and
    /// a halted machine refuses further work.
    pub fn execute(&mut self, opcode: u8) -> String {
        if self.vm.halted {
            return format!("Halted: opcode {opcode:#04x} ignored");
        }
        let Some(op) = decode(opcode) else {
            return format!("Unknown opcode: {opcode:#04x}");
        };
        debug!(opcode, ?op, "step");
        self.step(op)
    }

    fn step(&mut self, op: Op) -> String {
        match op {
            Op::Nop => "NOP".to_string(),

            Op::Add => self.op_add(),
            Op::Sub => self.op_sub(),
            Op::Mul => self.op_mul(),
            Op::IMul => self.op_imul(),
            Op::Div => self.op_div(),
            Op::IDiv => self.op_idiv(),
            Op::Inc => self.op_inc(),
            Op::Dec => self.op_dec(),

            Op::And => self.op_and(),
            Op::Or => self.op_or(),
            Op::Xor => self.op_xor(),
            Op::Not => self.op_not(),
            Op::Shl => self.op_shl(),
            Op::Shr => self.op_shr(),
            Op::Sar => self.op_sar(),

            Op::JmpRel8 => self.op_jmp_rel8(),
            Op::JmpRel32 => self.op_jmp_rel32(),
            Op::JmpRm32 => self.op_jmp_rm32(),
            Op::CallRel32 => self.op_call_rel32(),
            Op::CallRm32 => self.op_call_rm32(),
            Op::Ret => self.op_ret(),
            Op::RetImm16 => self.op_ret_imm16(),
            Op::Int => self.op_int(),
            Op::Int3 => self.op_int3(),
            Op::Jcc(cond) => self.op_jcc(cond),

            Op::Hlt => self.op_hlt(),
            Op::Cmc => self.op_cmc(),
            Op::Clc => self.op_clc(),
            Op::Stc => self.op_stc(),
            Op::Cli => self.op_cli(),
            Op::Sti => self.op_sti(),
            Op::Cld => self.op_cld(),
            Op::Std => self.op_std(),
            Op::Iret => self.op_iret(),
            Op::Loop => self.op_loop(),
            Op::Loope => self.op_loope(),
            Op::Loopne => self.op_loopne(),

            Op::MovImmEax => self.op_mov_imm_eax(),
            Op::MovEaxEbx => self.op_mov_eax_ebx(),
            Op::MovEbxEax => self.op_mov_ebx_eax(),
            Op::Push(reg) => self.op_push(reg),
            Op::Pop(reg) => self.op_pop(reg),
            Op::PushRm32 => self.op_push_rm32(),
            Op::PopRm32 => self.op_pop_rm32(),
            Op::TestAlImm8 => self.op_test_al_imm8(),
            Op::TestEaxImm32 => self.op_test_eax_imm32(),
            Op::TestRm8R8 => self.op_test_rm8_r8(),
            Op::TestRm32R32 => self.op_test_rm32_r32(),
            Op::IncEdi => self.op_inc_edi(),
            Op::DecEcx => self.op_dec_ecx(),

            Op::Pushf => self.op_pushf(),
            Op::Popf => self.op_popf(),
            Op::Sahf => self.op_sahf(),
            Op::Lahf => self.op_lahf(),
            Op::Cbw => self.op_cbw(),
            Op::Cwd => self.op_cwd(),
            Op::Callf => self.op_callf(),
            Op::Wait => self.op_wait(),

            Op::Movsb => self.op_movsb(),
            Op::Movsd => self.op_movsd(),
            Op::Cmpsb => self.op_cmpsb(),
            Op::Cmpsd => self.op_cmpsd(),
            Op::Lodsb => self.op_lodsb(),
            Op::Lodsd => self.op_lodsd(),
            Op::Scasb => self.op_scasb(),
            Op::Scasd => self.op_scasd(),
            Op::Stosb => self.op_stosb(),
            Op::Stosd => self.op_stosd(),

            Op::Xchg(reg) => self.op_xchg(reg),
            Op::CmpRm32Imm32 => self.op_cmp_rm32_imm32(),
            Op::CmpRm32R32 => self.op_cmp_rm32_r32(),
            Op::MulWide => self.op_mul_wide(),
            Op::IMulWide => self.op_imul_wide(),
            Op::DivWide => self.op_div_wide(),
            Op::IDivWide => self.op_idiv_wide(),

            Op::Setcc(cond) => self.op_setcc(cond),
        }
    }
}
