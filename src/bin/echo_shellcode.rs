//! Minimal host binary: run a tiny x86 shellcode payload that writes "hi"
//! to fd 1 and exits, printing the captured output and exit code.
//!
//! This is a harness binary, not library surface, so `anyhow` is fine here
//! even though the library itself never returns it.

use anyhow::Context;
use binsim::engine::unicorn_adapter::UnicornEngine;
use binsim::{Emulator, EmulatorOptions};
use unicorn_engine::unicorn_const::{Arch, Mode};

/// `push "hi"; mov ecx, esp; xor ebx, ebx; inc ebx; mov edx, 2;
/// mov eax, 4; int 0x80; xor ebx, ebx; mov eax, 1; int 0x80`
/// i.e. `write(1, "hi", 2); exit(0)` for 32-bit Linux `int 0x80`, with the
/// string pushed straight onto the stack instead of relying on a data
/// section.
const SHELLCODE: &[u8] = &[
    0x68, 0x68, 0x69, 0x00, 0x00, // push "hi\0\0"
    0x89, 0xe1, // mov ecx, esp
    0x31, 0xdb, // xor ebx, ebx
    0x43, // inc ebx      (fd = 1)
    0xba, 0x02, 0x00, 0x00, 0x00, // mov edx, 2   (count)
    0xb8, 0x04, 0x00, 0x00, 0x00, // mov eax, 4   (sys_write)
    0xcd, 0x80, // int 0x80
    0x31, 0xdb, // xor ebx, ebx (exit code 0)
    0xb8, 0x01, 0x00, 0x00, 0x00, // mov eax, 1   (sys_exit)
    0xcd, 0x80, // int 0x80
];

fn main() -> anyhow::Result<()> {
    binsim::init_tracing();

    let options = EmulatorOptions::builder()
        .shellcoder(SHELLCODE.to_vec())
        .archtype("x86")
        .ostype("linux")
        .build()
        .context("invalid emulator options")?;

    let engine = Box::new(UnicornEngine::new(Arch::X86, Mode::MODE_32).context("failed to construct CPU engine")?);
    let mut emu = Emulator::new(options, engine).context("failed to construct emulator")?;

    emu.run().context("run failed")?;

    println!("exit_code = {}", emu.exit_code());
    Ok(())
}
