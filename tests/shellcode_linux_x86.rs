//! End-to-end scenarios driven through the real `unicorn-engine` backend:
//! a guest `write`/`exit` round trip, a single-address hook firing exactly
//! once, and a timeout cutting off an infinite loop.

use std::cell::RefCell;
use std::rc::Rc;

use binsim::engine::unicorn_adapter::UnicornEngine;
use binsim::{Emulator, EmulatorOptions, StopReason};
use unicorn_engine::unicorn_const::{Arch, Mode};

/// `push "hi\0\0"; mov ecx, esp; xor ebx, ebx; inc ebx; mov edx, 2;
/// mov eax, 4; int 0x80; xor ebx, ebx; mov eax, 1; int 0x80`, i.e.
/// `write(1, "hi", 2); exit(0)`.
const ECHO_SHELLCODE: &[u8] = &[
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

fn x86_linux_shellcode(code: &[u8]) -> Emulator {
    let options = EmulatorOptions::builder()
        .shellcoder(code.to_vec())
        .archtype("x86")
        .ostype("linux")
        .build()
        .expect("valid shellcode options");
    let engine = Box::new(UnicornEngine::new(Arch::X86, Mode::MODE_32).expect("unicorn x86 engine"));
    Emulator::new(options, engine).expect("shellcode construction")
}

#[test]
fn shellcode_echo_writes_and_exits() {
    let mut emu = x86_linux_shellcode(ECHO_SHELLCODE);

    let captured = Rc::new(RefCell::new(Vec::new()));
    let sink = captured.clone();
    emu.set_syscall(
        4i64,
        Box::new(move |emu, args| {
            let (buf_addr, count) = (args[1], args[2] as usize);
            let data = emu.mem_read(buf_addr, count)?;
            sink.borrow_mut().extend_from_slice(&data);
            Ok(count as i64)
        }),
    );

    emu.run().expect("run");

    assert_eq!(&*captured.borrow(), b"hi");
    assert_eq!(emu.exit_code(), 0);
    assert_eq!(emu.stop_reason(), Some(StopReason::ExitGroup(0)));
}

#[test]
fn hook_address_fires_exactly_once() {
    // Four NOPs, nothing else; bounded by `set_exit` rather than an exit
    // syscall, so the only thing that can stop the run is reaching the
    // `until` address.
    let mut emu = x86_linux_shellcode(&[0x90, 0x90, 0x90, 0x90]);
    let entry = emu.load_base();
    emu.set_exit(entry + 4);

    let count = Rc::new(RefCell::new(0u32));
    let counted = count.clone();
    emu.hook_address(
        Box::new(move |_emu| {
            *counted.borrow_mut() += 1;
        }),
        entry,
    )
    .expect("hook_address registers");

    emu.run().expect("run");

    assert_eq!(*count.borrow(), 1);
}

#[test]
fn timeout_stops_an_infinite_loop() {
    // `jmp $` (EB FE): a two-byte infinite loop.
    let mut emu = x86_linux_shellcode(&[0xeb, 0xfe]);
    emu.set_timeout(10_000);

    emu.run().expect("run returns once the timeout elapses");

    assert_eq!(emu.stop_reason(), Some(StopReason::Timeout));
}

#[test]
fn panicking_hook_halts_the_real_engine_immediately() {
    // Four NOPs followed by a fifth: the hook at the first NOP panics, so
    // if the panic actually stops Unicorn (not just this crate's own
    // bookkeeping), the counter never sees the later addresses.
    let mut emu = x86_linux_shellcode(&[0x90, 0x90, 0x90, 0x90, 0x90]);
    let entry = emu.load_base();

    let seen = Rc::new(RefCell::new(Vec::new()));
    let recorder = seen.clone();
    emu.hook_code(Box::new(move |_emu, addr, _size| recorder.borrow_mut().push(addr))).expect("hook_code registers");
    emu.hook_address(Box::new(|_emu| panic!("boom")), entry).expect("hook_address registers");

    emu.run().expect("run catches the panic and returns");

    assert_eq!(emu.stop_reason(), Some(StopReason::Unexpected));
    assert!(emu.internal_exception());
    assert_eq!(&*seen.borrow(), &[entry]);
}
