//! Machine code of the first user task.

use crate::task::UserProgram;

/// Calls the `GetChar` system call forever.
#[rustfmt::skip]
static ECHO_LOOP: [u8; 15] = [
    // get_char:
    0xb8, 0x00, 0x00, 0x00, 0x00,   // mov eax, 0
    0xcd, 0x80,                     // int 0x80
    0xc3,                           // ret
    // entry:
    0xe8, 0xf3, 0xff, 0xff, 0xff,   // call get_char
    0xeb, 0xf9,                     // jmp entry
];

pub static FIRST_USER_PROGRAM: UserProgram = UserProgram {
    image: &ECHO_LOOP,
    entry_offset: 8,
};
