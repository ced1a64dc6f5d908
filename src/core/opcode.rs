// Script opcodes

macro_rules! opcodes {
    ($($(#[$doc:meta])* $variant:ident = $byte:literal => $name:literal,)*) => {
        /// Every opcode the interpreter understands
        ///
        /// Bytes with no variant are still representable inside a `Script`
        /// chunk; they fail with an invalid-opcode error when executed.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Opcode {
            $($(#[$doc])* $variant = $byte,)*
        }

        impl Opcode {
            /// All defined opcodes in byte order
            pub const ALL: &'static [Opcode] = &[$(Opcode::$variant,)*];

            /// Convert byte to opcode
            pub fn from_byte(byte: u8) -> Option<Self> {
                match byte {
                    $($byte => Some(Opcode::$variant),)*
                    _ => None,
                }
            }

            /// Canonical `OP_*` name used by the script text form
            pub fn name(self) -> &'static str {
                match self {
                    $(Opcode::$variant => $name,)*
                }
            }

            /// Look an opcode up by its `OP_*` name
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(Opcode::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

opcodes! {
    /// Push the empty byte string
    Op0 = 0x00 => "OP_0",
    /// Push data with a 1-byte length
    OpPushData1 = 0x4c => "OP_PUSHDATA1",
    /// Push data with a 2-byte length
    OpPushData2 = 0x4d => "OP_PUSHDATA2",
    /// Push data with a 4-byte length
    OpPushData4 = 0x4e => "OP_PUSHDATA4",
    Op1Negate = 0x4f => "OP_1NEGATE",
    Op1 = 0x51 => "OP_1",
    Op2 = 0x52 => "OP_2",
    Op3 = 0x53 => "OP_3",
    Op4 = 0x54 => "OP_4",
    Op5 = 0x55 => "OP_5",
    Op6 = 0x56 => "OP_6",
    Op7 = 0x57 => "OP_7",
    Op8 = 0x58 => "OP_8",
    Op9 = 0x59 => "OP_9",
    Op10 = 0x5a => "OP_10",
    Op11 = 0x5b => "OP_11",
    Op12 = 0x5c => "OP_12",
    Op13 = 0x5d => "OP_13",
    Op14 = 0x5e => "OP_14",
    Op15 = 0x5f => "OP_15",
    Op16 = 0x60 => "OP_16",
    OpIf = 0x63 => "OP_IF",
    OpNotIf = 0x64 => "OP_NOTIF",
    OpElse = 0x67 => "OP_ELSE",
    OpEndIf = 0x68 => "OP_ENDIF",
    OpVerify = 0x69 => "OP_VERIFY",
    OpReturn = 0x6a => "OP_RETURN",
    OpToAltStack = 0x6b => "OP_TOALTSTACK",
    OpFromAltStack = 0x6c => "OP_FROMALTSTACK",
    Op2Drop = 0x6d => "OP_2DROP",
    Op2Dup = 0x6e => "OP_2DUP",
    Op3Dup = 0x6f => "OP_3DUP",
    Op2Over = 0x70 => "OP_2OVER",
    Op2Rot = 0x71 => "OP_2ROT",
    Op2Swap = 0x72 => "OP_2SWAP",
    OpIfDup = 0x73 => "OP_IFDUP",
    OpDepth = 0x74 => "OP_DEPTH",
    OpDrop = 0x75 => "OP_DROP",
    /// Duplicate the top stack item
    OpDup = 0x76 => "OP_DUP",
    OpNip = 0x77 => "OP_NIP",
    OpOver = 0x78 => "OP_OVER",
    OpPick = 0x79 => "OP_PICK",
    OpRoll = 0x7a => "OP_ROLL",
    OpRot = 0x7b => "OP_ROT",
    OpSwap = 0x7c => "OP_SWAP",
    OpTuck = 0x7d => "OP_TUCK",
    OpCat = 0x7e => "OP_CAT",
    OpSubstr = 0x7f => "OP_SUBSTR",
    OpLeft = 0x80 => "OP_LEFT",
    OpRight = 0x81 => "OP_RIGHT",
    OpSize = 0x82 => "OP_SIZE",
    OpInvert = 0x83 => "OP_INVERT",
    OpAnd = 0x84 => "OP_AND",
    OpOr = 0x85 => "OP_OR",
    OpXor = 0x86 => "OP_XOR",
    OpEqual = 0x87 => "OP_EQUAL",
    /// Verify that the top two items are equal
    OpEqualVerify = 0x88 => "OP_EQUALVERIFY",
    Op1Add = 0x8b => "OP_1ADD",
    Op1Sub = 0x8c => "OP_1SUB",
    Op2Mul = 0x8d => "OP_2MUL",
    Op2Div = 0x8e => "OP_2DIV",
    OpNegate = 0x8f => "OP_NEGATE",
    OpAbs = 0x90 => "OP_ABS",
    OpNot = 0x91 => "OP_NOT",
    Op0NotEqual = 0x92 => "OP_0NOTEQUAL",
    OpAdd = 0x93 => "OP_ADD",
    OpSub = 0x94 => "OP_SUB",
    OpMul = 0x95 => "OP_MUL",
    OpDiv = 0x96 => "OP_DIV",
    OpMod = 0x97 => "OP_MOD",
    OpLShift = 0x98 => "OP_LSHIFT",
    OpRShift = 0x99 => "OP_RSHIFT",
    OpBoolAnd = 0x9a => "OP_BOOLAND",
    OpBoolOr = 0x9b => "OP_BOOLOR",
    OpNumEqual = 0x9c => "OP_NUMEQUAL",
    OpNumEqualVerify = 0x9d => "OP_NUMEQUALVERIFY",
    OpNumNotEqual = 0x9e => "OP_NUMNOTEQUAL",
    OpLessThan = 0x9f => "OP_LESSTHAN",
    OpGreaterThan = 0xa0 => "OP_GREATERTHAN",
    OpLessThanOrEqual = 0xa1 => "OP_LESSTHANOREQUAL",
    OpGreaterThanOrEqual = 0xa2 => "OP_GREATERTHANOREQUAL",
    OpMin = 0xa3 => "OP_MIN",
    OpMax = 0xa4 => "OP_MAX",
    OpWithin = 0xa5 => "OP_WITHIN",
    /// Replace the top stack item with its BLAKE3 hash
    OpBlake3 = 0xa6 => "OP_BLAKE3",
    /// Replace the top stack item with its double BLAKE3 hash
    OpDoubleBlake3 = 0xa7 => "OP_DOUBLEBLAKE3",
    /// Check signature
    OpCheckSig = 0xac => "OP_CHECKSIG",
    OpCheckSigVerify = 0xad => "OP_CHECKSIGVERIFY",
    OpCheckMultiSig = 0xae => "OP_CHECKMULTISIG",
    OpCheckMultiSigVerify = 0xaf => "OP_CHECKMULTISIGVERIFY",
    /// Require the transaction's absolute lock time to reach the top value
    OpCheckLockAbsVerify = 0xb1 => "OP_CHECKLOCKABSVERIFY",
    /// Require the input's relative lock time to reach the top value
    OpCheckLockRelVerify = 0xb2 => "OP_CHECKLOCKRELVERIFY",
}

impl Opcode {
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// `OP_1`..`OP_16` for `n` in 1..=16
    pub fn small_int(n: u8) -> Option<Self> {
        match n {
            1..=16 => Self::from_byte(Opcode::Op1 as u8 + n - 1),
            _ => None,
        }
    }

    /// Inverse of [`Opcode::small_int`]
    pub fn to_small_int(self) -> Option<u8> {
        let byte = self as u8;
        if (Opcode::Op1 as u8..=Opcode::Op16 as u8).contains(&byte) {
            Some(byte - Opcode::Op1 as u8 + 1)
        } else {
            None
        }
    }

    pub fn is_push_data(self) -> bool {
        matches!(self, Opcode::OpPushData1 | Opcode::OpPushData2 | Opcode::OpPushData4)
    }

    /// Opcodes that only push a constant or literal data
    pub fn is_push(self) -> bool {
        self.is_push_data()
            || self == Opcode::Op0
            || self == Opcode::Op1Negate
            || self.to_small_int().is_some()
    }
}
