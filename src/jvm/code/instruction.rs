//! Straight-line instructions
//!
//! The representation is slightly different from the usual presentation of the [instruction
//! set][0]:
//!
//!   - `wide` doesn't show up at all, but instead gets merged into the instructions it is allowed
//!     to modify
//!
//!   - the short forms of loads and stores (eg. `iload_2`) are folded into the general form, as
//!     are `ldc` and `ldc_w`
//!
//!   - invocations, `new`, and branching instructions are not here (see [`super::Insn`])
//!
//! [0]: https://docs.oracle.com/javase/specs/jvms/se18/html/jvms-6.html#jvms-6.5

use crate::jvm::class_file::{ClassConstantIndex, ConstantIndex, FieldRefConstantIndex};
use crate::jvm::{BaseType, BinaryName, FieldType};

/// Field reference operand, along with the type of the field (so that the width of the value
/// moved on or off the stack is known without going back to the constant pool)
#[derive(Clone, Debug, PartialEq)]
pub struct FieldOperand {
    pub index: FieldRefConstantIndex,
    pub field_type: FieldType<BinaryName>,
}

/// Defines [`Instruction`] along with the opcode and stack effect of every instruction that has
/// no operands. Instructions with operands are listed in the enum body and handled by hand.
macro_rules! instruction_set {
    ($($simple:ident = $opcode:literal, $delta:literal;)*) => {
        /// Non-branching JVM bytecode instruction
        #[derive(Clone, Debug, PartialEq)]
        pub enum Instruction {
            $($simple,)*
            BiPush(i8),
            SiPush(i16),
            Ldc(ConstantIndex), // covers both `ldc` and `ldc_w`
            Ldc2(ConstantIndex),
            ILoad(u16), // covers `iload`, `iload{0,3}`, and `wide iload`
            LLoad(u16),
            FLoad(u16),
            DLoad(u16),
            ALoad(u16),
            IStore(u16), // covers `istore`, `istore{0,3}`, and `wide istore`
            LStore(u16),
            FStore(u16),
            DStore(u16),
            AStore(u16),
            IInc(u16, i16), // covers `iinc` and `wide iinc`
            GetStatic(FieldOperand),
            PutStatic(FieldOperand),
            GetField(FieldOperand),
            PutField(FieldOperand),
            NewArray(BaseType),
            ANewArray(ClassConstantIndex),
            CheckCast(ClassConstantIndex),
            InstanceOf(ClassConstantIndex),
            MultiANewArray(ClassConstantIndex, u8),
        }

        impl Instruction {
            /// Look up an instruction that has no operands by its opcode
            pub(crate) fn from_simple_opcode(opcode: u8) -> Option<Instruction> {
                match opcode {
                    $($opcode => Some(Instruction::$simple),)*
                    _ => None,
                }
            }

            /// Opcode, if this is an instruction with no operands
            pub(crate) fn simple_opcode(&self) -> Option<u8> {
                match self {
                    $(Instruction::$simple => Some($opcode),)*
                    _ => None,
                }
            }

            /// Stack effect (in slots), if this is an instruction with no operands
            pub(crate) fn simple_stack_delta(&self) -> Option<i32> {
                match self {
                    $(Instruction::$simple => Some($delta),)*
                    _ => None,
                }
            }
        }
    };
}

instruction_set! {
    Nop = 0x00, 0;
    AConstNull = 0x01, 1;
    IConstM1 = 0x02, 1;
    IConst0 = 0x03, 1;
    IConst1 = 0x04, 1;
    IConst2 = 0x05, 1;
    IConst3 = 0x06, 1;
    IConst4 = 0x07, 1;
    IConst5 = 0x08, 1;
    LConst0 = 0x09, 2;
    LConst1 = 0x0a, 2;
    FConst0 = 0x0b, 1;
    FConst1 = 0x0c, 1;
    FConst2 = 0x0d, 1;
    DConst0 = 0x0e, 2;
    DConst1 = 0x0f, 2;
    IALoad = 0x2e, -1;
    LALoad = 0x2f, 0;
    FALoad = 0x30, -1;
    DALoad = 0x31, 0;
    AALoad = 0x32, -1;
    BALoad = 0x33, -1;
    CALoad = 0x34, -1;
    SALoad = 0x35, -1;
    IAStore = 0x4f, -3;
    LAStore = 0x50, -4;
    FAStore = 0x51, -3;
    DAStore = 0x52, -4;
    AAStore = 0x53, -3;
    BAStore = 0x54, -3;
    CAStore = 0x55, -3;
    SAStore = 0x56, -3;
    Pop = 0x57, -1;
    Pop2 = 0x58, -2;
    Dup = 0x59, 1;
    DupX1 = 0x5a, 1;
    DupX2 = 0x5b, 1;
    Dup2 = 0x5c, 2;
    Dup2X1 = 0x5d, 2;
    Dup2X2 = 0x5e, 2;
    Swap = 0x5f, 0;
    IAdd = 0x60, -1;
    LAdd = 0x61, -2;
    FAdd = 0x62, -1;
    DAdd = 0x63, -2;
    ISub = 0x64, -1;
    LSub = 0x65, -2;
    FSub = 0x66, -1;
    DSub = 0x67, -2;
    IMul = 0x68, -1;
    LMul = 0x69, -2;
    FMul = 0x6a, -1;
    DMul = 0x6b, -2;
    IDiv = 0x6c, -1;
    LDiv = 0x6d, -2;
    FDiv = 0x6e, -1;
    DDiv = 0x6f, -2;
    IRem = 0x70, -1;
    LRem = 0x71, -2;
    FRem = 0x72, -1;
    DRem = 0x73, -2;
    INeg = 0x74, 0;
    LNeg = 0x75, 0;
    FNeg = 0x76, 0;
    DNeg = 0x77, 0;
    IShl = 0x78, -1;
    LShl = 0x79, -1;
    IShr = 0x7a, -1;
    LShr = 0x7b, -1;
    IUShr = 0x7c, -1;
    LUShr = 0x7d, -1;
    IAnd = 0x7e, -1;
    LAnd = 0x7f, -2;
    IOr = 0x80, -1;
    LOr = 0x81, -2;
    IXor = 0x82, -1;
    LXor = 0x83, -2;
    I2L = 0x85, 1;
    I2F = 0x86, 0;
    I2D = 0x87, 1;
    L2I = 0x88, -1;
    L2F = 0x89, -1;
    L2D = 0x8a, 0;
    F2I = 0x8b, 0;
    F2L = 0x8c, 1;
    F2D = 0x8d, 1;
    D2I = 0x8e, -1;
    D2L = 0x8f, 0;
    D2F = 0x90, -1;
    I2B = 0x91, 0;
    I2C = 0x92, 0;
    I2S = 0x93, 0;
    LCmp = 0x94, -3;
    FCmpL = 0x95, -1;
    FCmpG = 0x96, -1;
    DCmpL = 0x97, -3;
    DCmpG = 0x98, -3;
    ArrayLength = 0xbe, 0;
    MonitorEnter = 0xc2, -1;
    MonitorExit = 0xc3, -1;
}

/// `atype` operand of `newarray`
impl BaseType {
    pub(crate) fn from_array_type_code(code: u8) -> Option<BaseType> {
        match code {
            4 => Some(BaseType::Boolean),
            5 => Some(BaseType::Char),
            6 => Some(BaseType::Float),
            7 => Some(BaseType::Double),
            8 => Some(BaseType::Byte),
            9 => Some(BaseType::Short),
            10 => Some(BaseType::Int),
            11 => Some(BaseType::Long),
            _ => None,
        }
    }

    pub(crate) fn array_type_code(&self) -> u8 {
        match self {
            BaseType::Boolean => 4,
            BaseType::Char => 5,
            BaseType::Float => 6,
            BaseType::Double => 7,
            BaseType::Byte => 8,
            BaseType::Short => 9,
            BaseType::Int => 10,
            BaseType::Long => 11,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn simple_opcode_table_is_consistent() {
        for opcode in 0..=u8::MAX {
            if let Some(insn) = Instruction::from_simple_opcode(opcode) {
                assert_eq!(insn.simple_opcode(), Some(opcode));
                assert!(insn.simple_stack_delta().is_some());
            }
        }
        assert_eq!(Instruction::from_simple_opcode(0x10), None);
        assert_eq!(Instruction::ILoad(0).simple_opcode(), None);
    }

    #[test]
    fn array_type_codes() {
        for code in 4..=11 {
            let base_type = BaseType::from_array_type_code(code).unwrap();
            assert_eq!(base_type.array_type_code(), code);
        }
        assert_eq!(BaseType::from_array_type_code(3), None);
    }
}
