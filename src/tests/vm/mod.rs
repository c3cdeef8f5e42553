use anyhow::Result;

use crate::tvm::{decode, table, Cond, Executor, Machine, Op};

fn executor() -> Executor {
    Executor::new()
}

#[test]
fn add_then_inc() -> Result<()> {
    let mut ex = executor();
    ex.vm.registers.eax = 7;
    ex.vm.registers.ebx = 3;

    let status = ex.execute(0x0B);
    assert_eq!(status, "ADD EAX, EBX -> 10");
    assert_eq!(ex.vm.registers.eax, 10);
    assert_eq!(ex.vm.flags.zf, 0);
    assert_eq!(ex.vm.flags.sf, 0);

    ex.execute(0x78);
    assert_eq!(ex.vm.registers.eax, 11);
    Ok(())
}

#[test]
fn call_and_ret_round_trip() -> Result<()> {
    let mut ex = executor();
    ex.vm.registers.eip = 0x100;
    let esp0 = ex.vm.registers.esp;

    ex.execute(0x30);
    assert_eq!(ex.vm.registers.esp, esp0 - 4);
    assert_eq!(ex.vm.registers.eip, 0x104);
    assert_eq!(ex.vm.read_mem(ex.vm.registers.esp, 4), 0x100);

    ex.execute(0x32);
    assert_eq!(ex.vm.registers.eip, 0x100);
    assert_eq!(ex.vm.registers.esp, esp0);
    Ok(())
}

#[test]
fn push_pop_restores_stack_pointer() {
    let mut vm = Machine::new();
    let esp0 = vm.registers.esp;
    let probe = vm.read_mem(esp0, 4);

    vm.push(0xDEAD_BEEF);
    assert_eq!(vm.registers.esp, esp0 - 4);
    let popped = vm.pop();
    assert_eq!(popped, 0xDEAD_BEEF);
    assert_eq!(vm.registers.esp, esp0);
    // Memory outside the pushed word is untouched.
    assert_eq!(vm.read_mem(esp0, 4), probe);
}

#[test]
fn arithmetic_flag_law() {
    let mut ex = executor();

    // Zero result: ZF set, parity of 0x00 is even.
    ex.vm.registers.eax = 0;
    ex.vm.registers.ebx = 0;
    ex.execute(0x0B);
    assert_eq!(ex.vm.flags.zf, 1);
    assert_eq!(ex.vm.flags.sf, 0);
    assert_eq!(ex.vm.flags.pf, 1);

    // 3 = 0b11: two set bits, even parity.
    ex.vm.registers.eax = 1;
    ex.vm.registers.ebx = 2;
    ex.execute(0x0B);
    assert_eq!(ex.vm.flags.zf, 0);
    assert_eq!(ex.vm.flags.pf, 1);

    // 7 = 0b111: odd parity.
    ex.vm.registers.eax = 3;
    ex.vm.registers.ebx = 4;
    ex.execute(0x0B);
    assert_eq!(ex.vm.flags.pf, 0);

    // Negative result: sign set, carry records the truncation.
    ex.vm.registers.eax = 0;
    ex.vm.registers.ebx = 1;
    ex.execute(0x0C);
    assert_eq!(ex.vm.registers.eax, 0xFFFF_FFFF);
    assert_eq!(ex.vm.flags.sf, 1);
    assert_eq!(ex.vm.flags.cf, 1);
    assert_eq!(ex.vm.flags.of, 0);
    assert_eq!(ex.vm.flags.af, 0);
}

#[test]
fn divide_by_zero_halts_without_clobbering() {
    let mut ex = executor();
    ex.vm.registers.eax = 5;
    ex.vm.registers.edx = 7;
    ex.vm.registers.ebx = 0;

    let status = ex.execute(0x0F);
    assert_eq!(status, "DIV by zero -> HALT");
    assert!(ex.vm.halted);
    assert_eq!(ex.vm.registers.eax, 5);
    assert_eq!(ex.vm.registers.edx, 7);

    // Same law for the wide form.
    let mut ex = executor();
    ex.vm.registers.eax = 5;
    ex.vm.registers.edx = 7;
    ex.vm.registers.ebx = 0;
    ex.execute(0xAC);
    assert!(ex.vm.halted);
    assert_eq!(ex.vm.registers.eax, 5);
    assert_eq!(ex.vm.registers.edx, 7);
}

#[test]
fn division_places_quotient_and_remainder() {
    let mut ex = executor();
    ex.vm.registers.eax = 17;
    ex.vm.registers.ebx = 5;
    ex.execute(0x0F);
    assert_eq!(ex.vm.registers.eax, 3);
    assert_eq!(ex.vm.registers.edx, 2);
}

#[test]
fn wide_multiply_spills_into_edx() {
    let mut ex = executor();
    ex.vm.registers.eax = 0x8000_0000;
    ex.vm.registers.ebx = 4;
    ex.execute(0xAA);
    assert_eq!(ex.vm.registers.eax, 0);
    assert_eq!(ex.vm.registers.edx, 2);
}

#[test]
fn unknown_opcode_reports_without_mutating() {
    let mut ex = executor();
    ex.vm.registers.eax = 42;
    let before = ex.vm.dump_state();

    let status = ex.execute(0x01);
    assert_eq!(status, "Unknown opcode: 0x01");
    assert_eq!(ex.vm.dump_state(), before);
    assert!(!ex.vm.halted);
}

#[test]
fn halted_machine_refuses_work() {
    let mut ex = executor();
    ex.vm.registers.eax = 1;
    ex.vm.registers.ebx = 1;
    assert_eq!(ex.execute(0x40), "HLT -> execution halted");
    assert!(ex.vm.halted);

    let status = ex.execute(0x0B);
    assert!(status.starts_with("Halted"));
    assert_eq!(ex.vm.registers.eax, 1);
}

#[test]
fn shifts_and_sar_sign_preservation() {
    let mut ex = executor();
    ex.vm.registers.eax = 0x8000_0001;
    ex.execute(0x21);
    assert_eq!(ex.vm.registers.eax, 0xC000_0000);

    ex.vm.registers.eax = 3;
    ex.execute(0x1F);
    assert_eq!(ex.vm.registers.eax, 6);
    ex.execute(0x20);
    assert_eq!(ex.vm.registers.eax, 3);
}

#[test]
fn logic_ops_update_eax() {
    let mut ex = executor();
    ex.vm.registers.eax = 0b1100;
    ex.vm.registers.ebx = 0b1010;
    ex.execute(0x1B);
    assert_eq!(ex.vm.registers.eax, 0b1000);
    ex.execute(0x1C);
    assert_eq!(ex.vm.registers.eax, 0b1010);
    ex.execute(0x1D);
    assert_eq!(ex.vm.registers.eax, 0);
    assert_eq!(ex.vm.flags.zf, 1);
    ex.execute(0x1E);
    assert_eq!(ex.vm.registers.eax, 0xFFFF_FFFF);
}

#[test]
fn conditional_branches_follow_flags() {
    let mut ex = executor();
    ex.vm.flags.zf = 1;
    let eip0 = ex.vm.registers.eip;

    let status = ex.execute(0x36);
    assert_eq!(status, format!("JE rel8 -> taken, EIP={}", eip0 + 1));

    let status = ex.execute(0x37);
    assert_eq!(status, "JNE rel8 -> not taken");
    assert_eq!(ex.vm.registers.eip, eip0 + 1);

    // Signed predicates: SF != OF means less-than.
    ex.vm.flags = Default::default();
    ex.vm.flags.sf = 1;
    let status = ex.execute(0x79);
    assert!(status.starts_with("JL rel8 -> taken"));
    let status = ex.execute(0x7C);
    assert_eq!(status, "JGE rel8 -> not taken");
}

#[test]
fn loop_family_decrements_ecx() {
    let mut ex = executor();
    ex.vm.registers.ecx = 2;
    assert_eq!(ex.execute(0x49), "LOOP -> ECX=1 (taken)");
    assert_eq!(ex.execute(0x49), "LOOP -> ECX=0 (not taken)");

    ex.vm.registers.ecx = 2;
    ex.vm.flags.zf = 1;
    assert_eq!(ex.execute(0x4A), "LOOPE -> ECX=1 ZF=1 (taken)");
    ex.vm.flags.zf = 0;
    assert_eq!(ex.execute(0x4A), "LOOPE -> not taken");

    ex.vm.registers.ecx = 2;
    assert_eq!(ex.execute(0x4B), "LOOPNE -> ECX=1 ZF=0 (taken)");
}

#[test]
fn interrupts_push_return_address() {
    let mut ex = executor();
    ex.vm.registers.eip = 0x42;
    ex.execute(0x34);
    assert_eq!(ex.vm.registers.eip, 0x80);
    assert_eq!(ex.vm.read_mem(ex.vm.registers.esp, 4), 0x42);

    ex.execute(0x48);
    assert_eq!(ex.vm.registers.eip, 0x42);

    ex.execute(0x35);
    assert_eq!(ex.vm.registers.eip, 0xCC);
}

#[test]
fn ret_imm16_adjusts_esp() {
    let mut ex = executor();
    let esp0 = ex.vm.registers.esp;
    ex.vm.registers.eip = 0x10;
    ex.execute(0x30);
    ex.execute(0x33);
    assert_eq!(ex.vm.registers.eip, 0x10);
    assert_eq!(ex.vm.registers.esp, esp0 + 2);
}

#[test]
fn register_push_pop_bank() {
    let mut ex = executor();
    ex.vm.registers.ecx = 0x1111;
    ex.vm.registers.edx = 0x2222;
    ex.execute(0x57);
    ex.execute(0x59);
    // Stack order: EDX on top.
    ex.execute(0x58);
    assert_eq!(ex.vm.registers.ecx, 0x2222);
    ex.execute(0x5A);
    assert_eq!(ex.vm.registers.edx, 0x1111);
}

#[test]
fn pushf_popf_round_trip() {
    let mut ex = executor();
    ex.vm.flags.zf = 1;
    ex.vm.flags.sf = 1;
    ex.vm.flags.pf = 1;
    ex.execute(0x94);

    ex.vm.flags = Default::default();
    ex.execute(0x95);
    assert_eq!(ex.vm.flags.zf, 1);
    assert_eq!(ex.vm.flags.sf, 1);
    assert_eq!(ex.vm.flags.pf, 1);
    assert_eq!(ex.vm.flags.cf, 0);
}

#[test]
fn sahf_lahf_use_ah_layout() {
    let mut ex = executor();
    ex.vm.flags.sf = 1;
    ex.vm.flags.zf = 1;
    ex.vm.flags.cf = 1;
    ex.execute(0x97);
    let ah = (ex.vm.registers.eax >> 8) & 0xFF;
    assert_eq!(ah, 0b1100_0001);

    ex.vm.flags = Default::default();
    ex.execute(0x96);
    assert_eq!(ex.vm.flags.sf, 1);
    assert_eq!(ex.vm.flags.zf, 1);
    assert_eq!(ex.vm.flags.cf, 1);
    assert_eq!(ex.vm.flags.pf, 0);
}

#[test]
fn string_ops_move_and_advance() {
    let mut ex = executor();
    ex.vm.registers.esi = 0x100;
    ex.vm.registers.edi = 0x200;
    ex.vm.write_byte(0x100, 0xAB);

    assert_eq!(ex.execute(0x9C), "MOVSB -> copied byte 0xab");
    assert_eq!(ex.vm.read_byte(0x200), 0xAB);
    assert_eq!(ex.vm.registers.esi, 0x101);
    assert_eq!(ex.vm.registers.edi, 0x201);

    ex.vm.registers.esi = 0x110;
    ex.vm.write_mem(0x110, 0xCAFE_F00D, 4);
    ex.execute(0xA1);
    assert_eq!(ex.vm.registers.eax, 0xCAFE_F00D);
    assert_eq!(ex.vm.registers.esi, 0x114);

    ex.vm.registers.edi = 0x300;
    ex.vm.registers.eax = 0x44;
    ex.execute(0x69);
    assert_eq!(ex.vm.read_byte(0x300), 0x44);
    assert_eq!(ex.vm.registers.edi, 0x301);
}

#[test]
fn compare_strings_set_zero_flag() {
    let mut ex = executor();
    ex.vm.registers.esi = 0x100;
    ex.vm.registers.edi = 0x200;
    ex.vm.write_byte(0x100, 7);
    ex.vm.write_byte(0x200, 7);
    ex.execute(0x9E);
    assert_eq!(ex.vm.flags.zf, 1);

    ex.vm.write_byte(0x101, 9);
    ex.vm.write_byte(0x201, 3);
    ex.execute(0x9E);
    assert_eq!(ex.vm.flags.zf, 0);
}

#[test]
fn setcc_writes_low_byte_of_eax() {
    let mut ex = executor();
    ex.vm.registers.eax = 0xFFFF_FF00;
    ex.vm.flags.zf = 1;
    assert_eq!(ex.execute(0xB4), "SETE AL -> AL=1");
    assert_eq!(ex.vm.registers.eax & 0xFF, 1);
    assert_eq!(ex.execute(0xB5), "SETNE AL -> AL=0");
    assert_eq!(ex.vm.registers.eax & 0xFF, 0);

    ex.vm.flags = Default::default();
    ex.vm.flags.sf = 1;
    ex.execute(0xB6);
    assert_eq!(ex.vm.registers.eax & 0xFF, 1);
}

#[test]
fn cbw_and_cwd_sign_extend() {
    let mut ex = executor();
    ex.vm.registers.eax = 0x80;
    ex.execute(0x98);
    assert_eq!(ex.vm.registers.eax & 0xFF00, 0xFF00);

    ex.vm.registers.eax = 0x8000;
    ex.execute(0x99);
    assert_eq!(ex.vm.registers.edx, 0xFFFF);

    ex.vm.registers.eax = 0x7F00;
    ex.execute(0x99);
    assert_eq!(ex.vm.registers.edx, 0);
}

#[test]
fn xchg_swaps_with_eax() {
    let mut ex = executor();
    ex.vm.registers.eax = 1;
    ex.vm.registers.esi = 2;
    ex.execute(0xA6);
    assert_eq!(ex.vm.registers.eax, 2);
    assert_eq!(ex.vm.registers.esi, 1);
}

#[test]
fn cmp_sets_flags_without_writing() {
    let mut ex = executor();
    ex.vm.registers.eax = 5;
    ex.vm.registers.ebx = 5;
    ex.execute(0xA9);
    assert_eq!(ex.vm.registers.eax, 5);
    assert_eq!(ex.vm.flags.zf, 1);

    ex.vm.registers.ebx = 9;
    ex.execute(0xA9);
    assert_eq!(ex.vm.flags.zf, 0);
    assert_eq!(ex.vm.flags.sf, 1);
}

#[test]
fn memory_addresses_wrap() {
    let mut ex = Executor::with_machine(Machine::with_memory_size(64));
    ex.vm.registers.edi = 64;
    ex.vm.registers.eax = 0x5A;
    ex.execute(0x69);
    assert_eq!(ex.vm.read_byte(0), 0x5A);
}

#[test]
fn mov_forms() {
    let mut ex = executor();
    ex.vm.registers.ebx = 9;
    assert_eq!(ex.execute(0x55), "MOV EAX, EBX -> 9");
    ex.vm.registers.eax = 4;
    assert_eq!(ex.execute(0x56), "MOV EBX, EAX -> 4");
    assert_eq!(ex.execute(0x54), "MOV EAX, imm32 -> 1");
}

#[test]
fn dispatch_matches_scenario_pins() {
    // The table bytes the end-to-end scenarios rely on.
    assert_eq!(decode(0x0B), Some(Op::Add));
    assert_eq!(decode(0x78), Some(Op::Inc));
    assert_eq!(decode(0x30), Some(Op::CallRel32));
    assert_eq!(decode(0x32), Some(Op::Ret));
    assert_eq!(decode(0x36), Some(Op::Jcc(Cond::E)));
    assert_eq!(decode(0xBB), Some(Op::Setcc(Cond::No)));
    // Reference-table-only bytes decode to nothing.
    assert_eq!(decode(0x01), None);
    assert_eq!(decode(0x8C), None);
    assert_eq!(decode(0xBC), None);
}

#[test]
fn reference_table_is_contiguous() {
    assert_eq!(table::OPCODE_TABLE.len(), 0xBC);
    for (i, (op, _)) in table::OPCODE_TABLE.iter().enumerate() {
        assert_eq!(usize::from(*op), i);
    }
    let nop = table::lookup(0x00).unwrap();
    assert_eq!(nop.ir, "nop");
    assert_eq!(nop.asm, "NOP");
    let last = table::lookup(0xBB).unwrap();
    assert_eq!(last.asm, "SETNO R/M8");
    assert!(table::lookup(0xBC).is_none());
}

#[test]
fn groups_cover_the_catalogue() {
    use table::Group;
    assert_eq!(Group::of(0x00), Some(Group::Memory));
    assert_eq!(Group::of(0x0B), Some(Group::Arithmetic));
    assert_eq!(Group::of(0x1B), Some(Group::Logic));
    assert_eq!(Group::of(0x2E), Some(Group::ControlFlow));
    assert_eq!(Group::of(0x40), Some(Group::Terminators));
    assert_eq!(Group::of(0xBB), Some(Group::LanguageOps));
    assert_eq!(Group::of(0xBC), None);

    let total: usize = table::stats().into_iter().map(|(_, n)| n).sum();
    assert_eq!(total, table::OPCODE_TABLE.len());
}

#[test]
fn table_search_spans_fields() {
    let hits = table::search("lodsb");
    assert!(hits.iter().any(|(op, _)| *op == 0xA0));

    // Search by assembly operand text.
    let hits = table::search("setno");
    assert!(hits.iter().any(|(op, _)| *op == 0xBB));

    assert!(table::search("no-such-mnemonic").is_empty());
}

#[test]
fn dumps_serialize_to_json() -> Result<()> {
    let flat = table::dump();
    assert!(flat.get("0x00").is_some());
    assert_eq!(flat["0x00"]["ir"], "nop");

    let grouped = table::grouped_dump();
    assert!(grouped.get("Arithmetic").is_some());
    assert_eq!(grouped["ControlFlow"]["0x2e"]["asm"], "JMP rel8");

    let mut vm = Machine::new();
    vm.registers.eax = 3;
    let dump = vm.dump_state();
    assert_eq!(dump["registers"]["EAX"], 3);
    assert_eq!(dump["flags"]["ZF"], 0);
    Ok(())
}
