//! Opcode byte values and their ASM names.

pub const OP_0: u8 = 0x00;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_PUSHDATA4: u8 = 0x4e;
pub const OP_1NEGATE: u8 = 0x4f;
pub const OP_1: u8 = 0x51;
pub const OP_2: u8 = 0x52;
pub const OP_16: u8 = 0x60;
pub const OP_NOP: u8 = 0x61;
pub const OP_IF: u8 = 0x63;
pub const OP_NOTIF: u8 = 0x64;
pub const OP_ELSE: u8 = 0x67;
pub const OP_ENDIF: u8 = 0x68;
pub const OP_VERIFY: u8 = 0x69;
pub const OP_RETURN: u8 = 0x6a;
pub const OP_DROP: u8 = 0x75;
pub const OP_DUP: u8 = 0x76;
pub const OP_SWAP: u8 = 0x7c;
pub const OP_SIZE: u8 = 0x82;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_ADD: u8 = 0x93;
pub const OP_NUMEQUAL: u8 = 0x9c;
pub const OP_NUMEQUALVERIFY: u8 = 0x9d;
pub const OP_GREATERTHANOREQUAL: u8 = 0xa2;
pub const OP_SHA256: u8 = 0xa8;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_HASH256: u8 = 0xaa;
pub const OP_CODESEPARATOR: u8 = 0xab;
pub const OP_CHECKSIG: u8 = 0xac;
pub const OP_CHECKSIGVERIFY: u8 = 0xad;
pub const OP_CHECKMULTISIG: u8 = 0xae;
pub const OP_CHECKMULTISIGVERIFY: u8 = 0xaf;
pub const OP_CHECKLOCKTIMEVERIFY: u8 = 0xb1;
pub const OP_CHECKSEQUENCEVERIFY: u8 = 0xb2;
pub const OP_CHECKSIGADD: u8 = 0xba;

const NAMED: &[(&str, u8)] = &[
    ("OP_0", OP_0),
    ("OP_FALSE", OP_0),
    ("OP_PUSHDATA1", OP_PUSHDATA1),
    ("OP_PUSHDATA2", OP_PUSHDATA2),
    ("OP_PUSHDATA4", OP_PUSHDATA4),
    ("OP_1NEGATE", OP_1NEGATE),
    ("OP_TRUE", OP_1),
    ("OP_NOP", OP_NOP),
    ("OP_IF", OP_IF),
    ("OP_NOTIF", OP_NOTIF),
    ("OP_ELSE", OP_ELSE),
    ("OP_ENDIF", OP_ENDIF),
    ("OP_VERIFY", OP_VERIFY),
    ("OP_RETURN", OP_RETURN),
    ("OP_DROP", OP_DROP),
    ("OP_DUP", OP_DUP),
    ("OP_SWAP", OP_SWAP),
    ("OP_SIZE", OP_SIZE),
    ("OP_EQUAL", OP_EQUAL),
    ("OP_EQUALVERIFY", OP_EQUALVERIFY),
    ("OP_ADD", OP_ADD),
    ("OP_NUMEQUAL", OP_NUMEQUAL),
    ("OP_NUMEQUALVERIFY", OP_NUMEQUALVERIFY),
    ("OP_GREATERTHANOREQUAL", OP_GREATERTHANOREQUAL),
    ("OP_SHA256", OP_SHA256),
    ("OP_HASH160", OP_HASH160),
    ("OP_HASH256", OP_HASH256),
    ("OP_CODESEPARATOR", OP_CODESEPARATOR),
    ("OP_CHECKSIG", OP_CHECKSIG),
    ("OP_CHECKSIGVERIFY", OP_CHECKSIGVERIFY),
    ("OP_CHECKMULTISIG", OP_CHECKMULTISIG),
    ("OP_CHECKMULTISIGVERIFY", OP_CHECKMULTISIGVERIFY),
    ("OP_CHECKLOCKTIMEVERIFY", OP_CHECKLOCKTIMEVERIFY),
    ("OP_CHECKSEQUENCEVERIFY", OP_CHECKSEQUENCEVERIFY),
    ("OP_CHECKSIGADD", OP_CHECKSIGADD),
];

/// `OP_1`..`OP_16` for `n` in 1..=16
pub fn op_pushnum(n: u8) -> Option<u8> {
    (1..=16).contains(&n).then(|| OP_1 + n - 1)
}

/// Look up an opcode by ASM name (`OP_CHECKSIG`, `OP_2`, ...)
pub fn opcode_from_name(name: &str) -> Option<u8> {
    if let Some(n) = name.strip_prefix("OP_").and_then(|n| n.parse::<u8>().ok()) {
        return if n == 0 { Some(OP_0) } else { op_pushnum(n) };
    }
    NAMED
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, op)| *op)
}

/// ASM name of an opcode byte, `None` for unnamed opcodes
pub fn opcode_name(op: u8) -> Option<String> {
    if (OP_1..=OP_16).contains(&op) {
        return Some(format!("OP_{}", op - OP_1 + 1));
    }
    NAMED
        .iter()
        .find(|(name, byte)| *byte == op && *name != "OP_FALSE")
        .map(|(name, _)| name.to_string())
}
