//! Scan-code set 1 to code-point translation.
//!
//! Each row is indexed by the make code; each column by the modifier combination in
//! effect. A code point carries the scan code in its high byte and the ASCII/control
//! value in its low byte. An entry of zero produces nothing.

use super::modifiers::ModifierState;

/// Modifier combination selecting a column of [`SCAN_ASCII`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum Column {
    Plain = 0,
    Shift = 1,
    Ctrl = 2,
    Alt = 3,
    NumLock = 4,
    CapsLock = 5,
    CapsLockShift = 6,
    NumLockShift = 7,
}

/// First scan code of the navigation / numeric-pad block.
pub const KEYPAD_FIRST: u8 = 0x47;

/// Prefix bytes of the extended (E0) and pause (E1) sequences.
pub const EXTENDED_PREFIXES: [u8; 2] = [0xE0, 0xE1];

pub const RELEASE_BIT: u8 = 0x80;

pub const ROWS: usize = 89;

#[rustfmt::skip]
pub static SCAN_ASCII: [[u16; 8]; ROWS] = [
    //                          plain   shift   ctrl    alt     num     caps    shcaps  shnum
    /* 00                  */ [0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000],
    /* 01 Esc              */ [0x011B, 0x011B, 0x011B, 0x011B, 0x011B, 0x011B, 0x011B, 0x011B],
    /* 02 1 !              */ [0x0231, 0x0221, 0x0000, 0x7800, 0x0231, 0x0231, 0x0231, 0x0321],
    /* 03 2 @              */ [0x0332, 0x0340, 0x0300, 0x7900, 0x0332, 0x0332, 0x0332, 0x0332],
    /* 04 3 #              */ [0x0433, 0x0423, 0x0000, 0x7A00, 0x0433, 0x0433, 0x0423, 0x0423],
    /* 05 4 $              */ [0x0534, 0x0524, 0x0000, 0x7B00, 0x0534, 0x0534, 0x0524, 0x0524],
    /* 06 5 %              */ [0x0635, 0x0625, 0x0000, 0x7C00, 0x0635, 0x0635, 0x0625, 0x0625],
    /* 07 6 ^              */ [0x0736, 0x075E, 0x071E, 0x7D00, 0x0736, 0x0736, 0x075E, 0x075E],
    /* 08 7 &              */ [0x0837, 0x0826, 0x0000, 0x7E00, 0x0837, 0x0837, 0x0826, 0x0826],
    /* 09 8 *              */ [0x0938, 0x092A, 0x0000, 0x7F00, 0x0938, 0x0938, 0x092A, 0x092A],
    /* 0A 9 (              */ [0x0A39, 0x0A28, 0x0000, 0x8000, 0x0A39, 0x0A39, 0x0A28, 0x0A28],
    /* 0B 0 )              */ [0x0B30, 0x0B29, 0x0000, 0x8100, 0x0B30, 0x0B30, 0x0B29, 0x0B29],
    /* 0C - _              */ [0x0C2D, 0x0C5F, 0x0000, 0x8200, 0x0C2D, 0x0C2D, 0x0C5F, 0x0C5F],
    /* 0D = +              */ [0x0D3D, 0x0D2B, 0x0000, 0x8300, 0x0D3D, 0x0D3D, 0x0D2B, 0x0D2B],
    /* 0E Backspace        */ [0x0E08, 0x0E08, 0x0E7F, 0x0000, 0x0E08, 0x0E08, 0x0E08, 0x0E08],
    /* 0F Tab              */ [0x0F09, 0x0F00, 0x0000, 0x0000, 0x0F09, 0x0F09, 0x0F00, 0x0F00],
    /* 10 Q                */ [0x1071, 0x1051, 0x1011, 0x1000, 0x1071, 0x1051, 0x1051, 0x1071],
    /* 11 W                */ [0x1177, 0x1057, 0x1017, 0x1100, 0x1077, 0x1057, 0x1057, 0x1077],
    /* 12 E                */ [0x1265, 0x1245, 0x1205, 0x1200, 0x1265, 0x1245, 0x1245, 0x1265],
    /* 13 R                */ [0x1372, 0x1352, 0x1312, 0x1300, 0x1272, 0x1252, 0x1252, 0x1272],
    /* 14 T                */ [0x1474, 0x1454, 0x1414, 0x1400, 0x1474, 0x1454, 0x1454, 0x1474],
    /* 15 Y                */ [0x1579, 0x1559, 0x1519, 0x1500, 0x1579, 0x1559, 0x1579, 0x1559],
    /* 16 U                */ [0x1675, 0x1655, 0x1615, 0x1600, 0x1675, 0x1655, 0x1675, 0x1655],
    /* 17 I                */ [0x1769, 0x1749, 0x1709, 0x1700, 0x1769, 0x1749, 0x1769, 0x1749],
    /* 18 O                */ [0x186F, 0x184F, 0x180F, 0x1800, 0x186F, 0x184F, 0x186F, 0x184F],
    /* 19 P                */ [0x1970, 0x1950, 0x1910, 0x1900, 0x1970, 0x1950, 0x1970, 0x1950],
    /* 1A [ {              */ [0x1A5B, 0x1A7B, 0x1A1B, 0x0000, 0x1A5B, 0x1A5B, 0x1A7B, 0x1A7B],
    /* 1B ] }              */ [0x1B5D, 0x1B7D, 0x1B1D, 0x0000, 0x1B5D, 0x1B5D, 0x1B7D, 0x1B7D],
    /* 1C Enter            */ [0x1C0D, 0x1C0D, 0x1C0A, 0x0000, 0x1C0D, 0x1C0D, 0x1C0A, 0x1C0A],
    /* 1D Ctrl             */ [0x1D00, 0x1D00, 0x1D00, 0x1D00, 0x1D00, 0x1D00, 0x1D00, 0x1D00],
    /* 1E A                */ [0x1E61, 0x1E41, 0x1E01, 0x1E00, 0x1E61, 0x1E41, 0x1E61, 0x1E41],
    /* 1F S                */ [0x1F73, 0x1F53, 0x1F13, 0x1F00, 0x1F73, 0x1F53, 0x1F73, 0x1F53],
    /* 20 D                */ [0x2064, 0x2044, 0x2004, 0x2000, 0x2064, 0x2044, 0x2064, 0x2044],
    /* 21 F                */ [0x2166, 0x2146, 0x2106, 0x2100, 0x2166, 0x2146, 0x2166, 0x2146],
    /* 22 G                */ [0x2267, 0x2247, 0x2207, 0x2200, 0x2267, 0x2247, 0x2267, 0x2247],
    /* 23 H                */ [0x2368, 0x2348, 0x2308, 0x2300, 0x2368, 0x2348, 0x2368, 0x2348],
    /* 24 J                */ [0x246A, 0x244A, 0x240A, 0x2400, 0x246A, 0x244A, 0x246A, 0x244A],
    /* 25 K                */ [0x256B, 0x254B, 0x250B, 0x2500, 0x256B, 0x254B, 0x256B, 0x254B],
    /* 26 L                */ [0x266C, 0x264C, 0x260C, 0x2600, 0x266C, 0x264C, 0x266C, 0x264C],
    /* 27 ; :              */ [0x273B, 0x273A, 0x0000, 0x0000, 0x273B, 0x273B, 0x273A, 0x273A],
    /* 28 ' "              */ [0x2827, 0x2822, 0x0000, 0x0000, 0x2827, 0x2827, 0x2822, 0x2822],
    /* 29 ` ~              */ [0x2960, 0x297E, 0x0000, 0x0000, 0x2960, 0x2960, 0x297E, 0x297E],
    /* 2A Left shift       */ [0x2A00, 0x2A00, 0x2A00, 0x2A00, 0x2A00, 0x2A00, 0x2A00, 0x2A00],
    /* 2B \ |              */ [0x2B5C, 0x2B7C, 0x2B1C, 0x0000, 0x2B5C, 0x2B5C, 0x2B7C, 0x2B7C],
    /* 2C Z                */ [0x2C7A, 0x2C5A, 0x2C1A, 0x2C00, 0x2C7A, 0x2C5A, 0x2C7A, 0x2C5A],
    /* 2D X                */ [0x2D78, 0x2D58, 0x2D18, 0x2D00, 0x2D78, 0x2D58, 0x2D78, 0x2D58],
    /* 2E C                */ [0x2E63, 0x2E43, 0x2E03, 0x2E00, 0x2E63, 0x2E43, 0x2E63, 0x2E43],
    /* 2F V                */ [0x2F76, 0x2F56, 0x2F16, 0x2F00, 0x2F76, 0x2F56, 0x2F76, 0x2F56],
    /* 30 B                */ [0x3062, 0x3042, 0x3002, 0x3000, 0x3062, 0x3042, 0x3062, 0x3042],
    /* 31 N                */ [0x316E, 0x314E, 0x310E, 0x3100, 0x316E, 0x314E, 0x316E, 0x314E],
    /* 32 M                */ [0x326D, 0x324D, 0x320D, 0x3200, 0x326D, 0x324D, 0x326D, 0x324D],
    /* 33 , <              */ [0x332C, 0x333C, 0x0000, 0x0000, 0x332C, 0x332C, 0x333C, 0x333C],
    /* 34 . >              */ [0x342E, 0x343E, 0x0000, 0x0000, 0x342E, 0x342E, 0x343E, 0x343E],
    /* 35 / ?              */ [0x352F, 0x353F, 0x0000, 0x0000, 0x352F, 0x352F, 0x353F, 0x353F],
    /* 36 Right shift      */ [0x3600, 0x3600, 0x3600, 0x3600, 0x3600, 0x3600, 0x3600, 0x3600],
    /* 37 Keypad * / PrtSc */ [0x372A, 0x0000, 0x3710, 0x0000, 0x372A, 0x372A, 0x0000, 0x0000],
    /* 38 Alt              */ [0x3800, 0x3800, 0x3800, 0x3800, 0x3800, 0x3800, 0x3800, 0x3800],
    /* 39 Space            */ [0x3920, 0x3920, 0x3920, 0x0000, 0x3920, 0x3920, 0x3920, 0x3920],
    /* 3A CapsLock         */ [0x3A00, 0x3A00, 0x3A00, 0x3A00, 0x3A00, 0x3A00, 0x3A00, 0x3A00],
    /* 3B F1               */ [0x3B00, 0x5400, 0x5E00, 0x6800, 0x3B00, 0x3B00, 0x5400, 0x5400],
    /* 3C F2               */ [0x3C00, 0x5500, 0x5F00, 0x6900, 0x3C00, 0x3C00, 0x5500, 0x5500],
    /* 3D F3               */ [0x3D00, 0x5600, 0x6000, 0x6A00, 0x3D00, 0x3D00, 0x5600, 0x5600],
    /* 3E F4               */ [0x3E00, 0x5700, 0x6100, 0x6B00, 0x3E00, 0x3E00, 0x5700, 0x5700],
    /* 3F F5               */ [0x3F00, 0x5800, 0x6200, 0x6C00, 0x3F00, 0x3F00, 0x5800, 0x5800],
    /* 40 F6               */ [0x4000, 0x5900, 0x6300, 0x6D00, 0x4000, 0x4000, 0x5900, 0x5900],
    /* 41 F7               */ [0x4100, 0x5A00, 0x6400, 0x6E00, 0x4100, 0x4100, 0x5A00, 0x5A00],
    /* 42 F8               */ [0x4200, 0x5B00, 0x6500, 0x6F00, 0x4200, 0x4200, 0x5B00, 0x5B00],
    /* 43 F9               */ [0x4300, 0x5C00, 0x6600, 0x7000, 0x4300, 0x4300, 0x5C00, 0x5C00],
    /* 44 F10              */ [0x4400, 0x5D00, 0x6700, 0x7100, 0x4400, 0x4400, 0x5D00, 0x5D00],
    /* 45 NumLock          */ [0x4500, 0x4500, 0x4500, 0x4500, 0x4500, 0x4500, 0x4500, 0x4500],
    /* 46 ScrollLock       */ [0x4600, 0x4600, 0x4600, 0x4600, 0x4600, 0x4600, 0x4600, 0x4600],
    /* 47 Home / 7         */ [0x4700, 0x4737, 0x7700, 0x0000, 0x4737, 0x4700, 0x4737, 0x4700],
    /* 48 Up / 8           */ [0x4800, 0x4838, 0x0000, 0x0000, 0x4838, 0x4800, 0x4838, 0x4800],
    /* 49 PgUp / 9         */ [0x4900, 0x4939, 0x8400, 0x0000, 0x4939, 0x4900, 0x4939, 0x4900],
    /* 4A Keypad -         */ [0x4A2D, 0x4A2D, 0x0000, 0x0000, 0x4A2D, 0x4A2D, 0x4A2D, 0x4A2D],
    /* 4B Left / 4         */ [0x4B00, 0x4B34, 0x7300, 0x0000, 0x4B34, 0x4B00, 0x4B34, 0x4B00],
    /* 4C Center / 5       */ [0x4C00, 0x4C35, 0x0000, 0x0000, 0x4C35, 0x4C00, 0x4C35, 0x4C00],
    /* 4D Right / 6        */ [0x4D00, 0x4D36, 0x7400, 0x0000, 0x4D36, 0x4D00, 0x4D36, 0x4D00],
    /* 4E Keypad +         */ [0x4E2B, 0x4E2B, 0x0000, 0x0000, 0x4E2B, 0x4E2B, 0x4E2B, 0x4E2B],
    /* 4F End / 1          */ [0x4F00, 0x4F31, 0x7500, 0x0000, 0x4F31, 0x4F00, 0x4F31, 0x4F00],
    /* 50 Down / 2         */ [0x5000, 0x5032, 0x0000, 0x0000, 0x5032, 0x5000, 0x5032, 0x5000],
    /* 51 PgDn / 3         */ [0x5100, 0x5133, 0x7600, 0x0000, 0x5133, 0x5100, 0x5133, 0x5100],
    /* 52 Ins / 0          */ [0x5200, 0x5230, 0x0000, 0x0000, 0x5230, 0x5200, 0x5230, 0x5200],
    /* 53 Del / .          */ [0x5300, 0x532E, 0x0000, 0x0000, 0x532E, 0x5300, 0x532E, 0x5300],
    /* 54                  */ [0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000],
    /* 55                  */ [0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000],
    /* 56                  */ [0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000],
    /* 57 F11              */ [0x5700, 0x0000, 0x0000, 0x0000, 0x5700, 0x5700, 0x0000, 0x0000],
    /* 58 F12              */ [0x5800, 0x0000, 0x0000, 0x0000, 0x5800, 0x5800, 0x0000, 0x0000],
];

/// Translates one scan code under `state`.
///
/// Release codes come back as `scan << 8` (never zero, low byte zero). Everything else
/// is a table lookup, and a zero result means the key produces no character.
pub fn translate(scan: u8, state: &ModifierState) -> u16 {
    if EXTENDED_PREFIXES.contains(&scan) {
        return 0;
    }
    if scan & RELEASE_BIT != 0 {
        return u16::from(scan) << 8;
    }
    let Some(row) = SCAN_ASCII.get(usize::from(scan)) else {
        return 0;
    };
    row[column_for(scan, state) as usize]
}

/// Picks the table column for a make code.
///
/// Alt beats Ctrl beats the lock keys beats Shift. NumLock only applies to the keypad
/// block and CapsLock only outside it; a keypad key with NumLock off ignores CapsLock.
pub fn column_for(scan: u8, state: &ModifierState) -> Column {
    let shift = state.shift();

    if state.alt {
        return Column::Alt;
    }
    if state.ctrl {
        return Column::Ctrl;
    }
    if scan >= KEYPAD_FIRST {
        if state.num_lock {
            return if shift { Column::NumLockShift } else { Column::NumLock };
        }
    } else if state.caps_lock {
        return if shift { Column::CapsLockShift } else { Column::CapsLock };
    }
    if shift {
        Column::Shift
    } else {
        Column::Plain
    }
}

/// True when the raw `scan` byte is a break code.
///
/// Decided on the byte the controller sent, never on the translated code: some make
/// codes (Alt+9, Ctrl+PgUp) translate to the same shape as a release.
pub fn is_release(scan: u8) -> bool {
    scan & RELEASE_BIT != 0 && !EXTENDED_PREFIXES.contains(&scan)
}
