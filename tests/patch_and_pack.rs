//! End-to-end Patch Set flush (through a real run, not `MockEngine`) and
//! the pack/unpack helpers exposed on `Emulator`.

use binsim::engine::unicorn_adapter::UnicornEngine;
use binsim::{Emulator, EmulatorOptions};
use unicorn_engine::unicorn_const::{Arch, Mode};

#[test]
fn queued_patch_overwrites_shellcode_byte_before_run() {
    // `mov eax, 1; int 0x80` (exit with whatever's in ebx); patch the
    // immediate operand of a preceding `mov ebx, 7` down to 0 so the
    // observed exit code proves the patch, not the original byte, ran.
    let shellcode: Vec<u8> = vec![
        0xbb, 0x07, 0x00, 0x00, 0x00, // mov ebx, 7
        0xb8, 0x01, 0x00, 0x00, 0x00, // mov eax, 1
        0xcd, 0x80, // int 0x80
    ];

    let options = EmulatorOptions::builder()
        .shellcoder(shellcode)
        .archtype("x86")
        .ostype("linux")
        .build()
        .expect("valid options");
    let engine = Box::new(UnicornEngine::new(Arch::X86, Mode::MODE_32).expect("unicorn engine"));
    let mut emu = Emulator::new(options, engine).expect("construction");

    // Overwrite the `mov ebx, 7` immediate (offset 1, little-endian dword)
    // with 0.
    emu.patch(1, vec![0x00, 0x00, 0x00, 0x00], None);

    emu.run().expect("run");

    assert_eq!(emu.exit_code(), 0);
}

#[test]
fn pack_unpack_round_trips_through_active_profile() {
    let options = EmulatorOptions::builder().shellcoder(vec![0x90]).archtype("x86_64").ostype("linux").build().unwrap();
    let engine = Box::new(UnicornEngine::new(Arch::X86, Mode::MODE_64).expect("unicorn x86-64 engine"));
    let emu = Emulator::new(options, engine).expect("construction");

    let packed = emu.pack(0x1122_3344_5566_7788).unwrap();
    assert_eq!(packed.len(), 8);
    assert_eq!(emu.unpack(&packed).unwrap(), 0x1122_3344_5566_7788);

    let packed_negative = emu.pack((-1i64) as u64).unwrap();
    assert_eq!(emu.unpacks(&packed_negative).unwrap(), -1);
}
