//! End-to-end decode+execute scenarios exercising more than one
//! instruction at a time.

use super::*;

#[test]
fn small_program_runs_to_halt() {
    // LD A,5 ; ADD A,3 ; HALT
    let mut cpu = cpu_with(&[0x3E, 0x05, 0xC6, 0x03, 0x76]);
    step(&mut cpu, "LD A,5");
    step(&mut cpu, "ADD A,3");
    assert_eq!(cpu.a, 8);

    cpu.fetch().unwrap();
    let err = cpu.execute().unwrap_err();
    assert!(matches!(err, CpuError::CpuHalted));
}

#[test]
fn fdcb_path_and_result_agree() {
    // FD CB AB 10 -- RL (IY-0x55), with the undocumented copy into B.
    let mut cpu = cpu_with(&[0xFD, 0xCB, 0xAB, 0x10]);
    cpu.iy = 0x2055;
    cpu.memory.write(0x2000, 0x80);
    cpu.fetch().unwrap();
    assert_eq!(cpu.peek_prepared().path, vec![0xFD, 0xCB, 0x10]);
    assert_eq!(cpu.peek_prepared().displacement, Some(-85));
    cpu.execute().unwrap();
    assert_eq!(cpu.memory.read(0x2000), 0x00);
    assert_eq!(cpu.b(), 0x00);
    assert!(cpu.flag_c(), "bit 7 of 0x80 rotates into carry");
    assert!(cpu.flag_z());
}

#[test]
fn djnz_loop_sums_three_bytes() {
    // B = 3; HL points at a 3-byte block; accumulate into A via a
    // decrement loop (LD A,(HL); INC HL; DJNZ loop; HALT is unreachable
    // here -- the loop exits by falling through).
    let program = [
        0x7E, // 0: LD A,(HL)   -- overwritten on every pass, last wins; just exercises the branch
        0x23, // 1: INC HL
        0x10, 0xFC, // 2: DJNZ -4 (back to offset 0)
    ];
    let mut cpu = cpu_with(&program);
    cpu.hl = 0x4000;
    cpu.memory.write(0x4000, 0x10);
    cpu.memory.write(0x4001, 0x20);
    cpu.memory.write(0x4002, 0x30);
    cpu.set_b(3);

    for _ in 0..3 {
        step(&mut cpu, "LD A,(HL)");
        step(&mut cpu, "INC HL");
        step(&mut cpu, "DJNZ");
    }

    assert_eq!(cpu.b(), 0);
    assert_eq!(cpu.a, 0x30);
    assert_eq!(cpu.hl, 0x4003);
    assert_eq!(cpu.pc, 4, "loop falls through once B reaches 0");
}

#[test]
fn call_preserves_caller_stack_depth() {
    let program = [
        0xCD, 0x05, 0x00, // 0: CALL 0x0005
        0x76, // 3: HALT (should never execute if CALL/RET work)
        0x00, // 4: padding
        0xC9, // 5: RET
    ];
    let mut cpu = cpu_with(&program);
    cpu.sp = 0xFFF0;
    step(&mut cpu, "CALL 0x0005");
    assert_eq!(cpu.pc, 5);
    step(&mut cpu, "RET");
    assert_eq!(cpu.pc, 3);
    assert_eq!(cpu.sp, 0xFFF0, "stack depth restored after CALL/RET");
}

#[test]
fn interrupt_enable_takes_effect_after_following_instruction() {
    // EI ; NOP ; NOP -- IFF1/IFF2 flip true only once the instruction
    // after EI has executed, not immediately.
    let mut cpu = cpu_with(&[0xFB, 0x00, 0x00]);
    cpu.iff1 = false;
    cpu.iff2 = false;
    step(&mut cpu, "EI");
    assert!(!cpu.get_interrupt_state(), "EI delays enabling by one instruction");
    step(&mut cpu, "NOP");
    assert!(cpu.get_interrupt_state());
}

#[test]
fn snapshot_round_trip_preserves_state() {
    let mut cpu = cpu_with(&[0x00]);
    cpu.a = 0x42;
    cpu.bc = 0x1234;
    cpu.memory.write(0x8000, 0x99);
    let snapshot = cpu.to_bytes();

    let mut restored = Cpu::new(None);
    restored.from_bytes(&snapshot).unwrap();
    assert_eq!(restored.get_registers().af >> 8, 0x42);
    assert_eq!(restored.get_registers().bc, 0x1234);
    assert_eq!(restored.peek(0x8000), 0x99);
}
