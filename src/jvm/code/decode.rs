//! Byte code to instructions
//!
//! Decoding happens one instruction at a time, producing the offset each instruction started at.
//! Jump targets are turned into labels named after the target offset, but whether those offsets
//! actually land on instruction boundaries is only checked once all instructions are known (see
//! [`super::Code::decode`]).

use super::{Branch, Call, EqComparison, FieldOperand, Insn, Instruction, InvokeKind, Label};
use super::OrdComparison;
use crate::jvm::class_file::{
    ClassConstantIndex, ConstantIndex, ConstantsPool, FieldRefConstantIndex,
};
use crate::jvm::{BaseType, BinaryName, Error, FieldType, MethodDescriptor, ParseDescriptor};
use byteorder::{BigEndian, ReadBytesExt};

/// `wide` prefix
pub(super) const WIDE: u8 = 0xc4;

/// Constructors for the five kinds of loads, in opcode order
const LOADS: [fn(u16) -> Instruction; 5] = [
    Instruction::ILoad,
    Instruction::LLoad,
    Instruction::FLoad,
    Instruction::DLoad,
    Instruction::ALoad,
];

/// Constructors for the five kinds of stores, in opcode order
const STORES: [fn(u16) -> Instruction; 5] = [
    Instruction::IStore,
    Instruction::LStore,
    Instruction::FStore,
    Instruction::DStore,
    Instruction::AStore,
];

/// Cursor over the code array which knows the offset of the instruction being read
struct CodeReader<'a> {
    code: &'a [u8],
    position: usize,

    /// Offset of the opcode of the current instruction
    instruction_start: usize,
}

impl<'a> CodeReader<'a> {
    fn remaining(&self) -> &'a [u8] {
        &self.code[self.position.min(self.code.len())..]
    }

    fn truncated(&self) -> Error {
        Error::TruncatedCode(self.instruction_start)
    }

    fn u8(&mut self) -> Result<u8, Error> {
        let value = self.remaining().read_u8().map_err(|_| self.truncated())?;
        self.position += 1;
        Ok(value)
    }

    fn i8(&mut self) -> Result<i8, Error> {
        let value = self.remaining().read_i8().map_err(|_| self.truncated())?;
        self.position += 1;
        Ok(value)
    }

    fn u16(&mut self) -> Result<u16, Error> {
        let value = self
            .remaining()
            .read_u16::<BigEndian>()
            .map_err(|_| self.truncated())?;
        self.position += 2;
        Ok(value)
    }

    fn i16(&mut self) -> Result<i16, Error> {
        let value = self
            .remaining()
            .read_i16::<BigEndian>()
            .map_err(|_| self.truncated())?;
        self.position += 2;
        Ok(value)
    }

    fn i32(&mut self) -> Result<i32, Error> {
        let value = self
            .remaining()
            .read_i32::<BigEndian>()
            .map_err(|_| self.truncated())?;
        self.position += 4;
        Ok(value)
    }

    /// Fail unless `count` operands of `size` bytes each are left
    fn expect_operands(&self, count: usize, size: usize) -> Result<(), Error> {
        if self.remaining().len() / size < count {
            Err(self.truncated())
        } else {
            Ok(())
        }
    }

    fn constant_index(&mut self) -> Result<ConstantIndex, Error> {
        Ok(ConstantIndex(self.u16()?))
    }

    /// Switch operands are aligned to a multiple of four bytes from the start of the code
    fn skip_switch_padding(&mut self) -> Result<(), Error> {
        while self.position % 4 != 0 {
            self.u8()?;
        }
        Ok(())
    }

    /// Resolve a jump relative to the start of the current instruction
    fn target(&self, relative: i32) -> Result<Label, Error> {
        let target = self.instruction_start as i64 + relative as i64;
        if target < 0 || target >= self.code.len() as i64 {
            Err(Error::BadCodeOffset(target.max(0) as usize))
        } else {
            Ok(Label(target as u32))
        }
    }

    fn short_target(&mut self) -> Result<Label, Error> {
        let relative = self.i16()?;
        self.target(relative as i32)
    }

    fn wide_target(&mut self) -> Result<Label, Error> {
        let relative = self.i32()?;
        self.target(relative)
    }
}

/// Decode all instructions in a code array, along with the offset at which each one starts
pub(super) fn decode_instructions(
    code: &[u8],
    constants: &ConstantsPool,
) -> Result<Vec<(usize, Insn)>, Error> {
    let mut reader = CodeReader {
        code,
        position: 0,
        instruction_start: 0,
    };
    let mut instructions = vec![];
    while reader.position < code.len() {
        reader.instruction_start = reader.position;
        let insn = decode_instruction(&mut reader, constants)?;
        instructions.push((reader.instruction_start, insn));
    }
    Ok(instructions)
}

fn decode_instruction(reader: &mut CodeReader, constants: &ConstantsPool) -> Result<Insn, Error> {
    let opcode = reader.u8()?;
    if let Some(simple) = Instruction::from_simple_opcode(opcode) {
        return Ok(Insn::Generic(simple));
    }

    let insn = match opcode {
        0x10 => Insn::Generic(Instruction::BiPush(reader.i8()?)),
        0x11 => Insn::Generic(Instruction::SiPush(reader.i16()?)),
        0x12 => Insn::Generic(Instruction::Ldc(ConstantIndex(reader.u8()? as u16))),
        0x13 => Insn::Generic(Instruction::Ldc(reader.constant_index()?)),
        0x14 => Insn::Generic(Instruction::Ldc2(reader.constant_index()?)),
        0x15..=0x19 => {
            let index = reader.u8()? as u16;
            Insn::Generic(LOADS[(opcode - 0x15) as usize](index))
        }
        0x1a..=0x2d => {
            let relative = opcode - 0x1a;
            Insn::Generic(LOADS[(relative / 4) as usize]((relative % 4) as u16))
        }
        0x36..=0x3a => {
            let index = reader.u8()? as u16;
            Insn::Generic(STORES[(opcode - 0x36) as usize](index))
        }
        0x3b..=0x4e => {
            let relative = opcode - 0x3b;
            Insn::Generic(STORES[(relative / 4) as usize]((relative % 4) as u16))
        }
        0x84 => {
            let index = reader.u8()? as u16;
            let increment = reader.i8()? as i16;
            Insn::Generic(Instruction::IInc(index, increment))
        }

        // Branches
        0x99..=0x9e => {
            let comparison = OrdComparison::ALL[(opcode - 0x99) as usize];
            Insn::Branch(Branch::If(comparison, reader.short_target()?))
        }
        0x9f..=0xa4 => {
            let comparison = OrdComparison::ALL[(opcode - 0x9f) as usize];
            Insn::Branch(Branch::IfICmp(comparison, reader.short_target()?))
        }
        0xa5 => Insn::Branch(Branch::IfACmp(EqComparison::EQ, reader.short_target()?)),
        0xa6 => Insn::Branch(Branch::IfACmp(EqComparison::NE, reader.short_target()?)),
        0xa7 => Insn::Branch(Branch::Goto(reader.short_target()?)),
        0xa8 => Insn::Branch(Branch::Jsr(reader.short_target()?)),
        0xa9 => Insn::Branch(Branch::Ret(reader.u8()? as u16)),
        0xaa => {
            reader.skip_switch_padding()?;
            let default = reader.wide_target()?;
            let low = reader.i32()?;
            let high = reader.i32()?;
            if high < low {
                return Err(Error::BadCodeOffset(reader.instruction_start));
            }
            reader.expect_operands((high as i64 - low as i64 + 1) as usize, 4)?;
            let targets = (low..=high)
                .map(|_| reader.wide_target())
                .collect::<Result<Vec<_>, Error>>()?;
            Insn::Branch(Branch::TableSwitch {
                default,
                low,
                targets,
            })
        }
        0xab => {
            reader.skip_switch_padding()?;
            let default = reader.wide_target()?;
            let pairs = reader.i32()?;
            if pairs < 0 {
                return Err(Error::BadCodeOffset(reader.instruction_start));
            }
            reader.expect_operands(pairs as usize, 8)?;
            let mut targets = Vec::with_capacity(pairs as usize);
            for _ in 0..pairs {
                let key = reader.i32()?;
                targets.push((key, reader.wide_target()?));
            }
            Insn::Branch(Branch::LookupSwitch { default, targets })
        }
        0xac => Insn::Branch(Branch::IReturn),
        0xad => Insn::Branch(Branch::LReturn),
        0xae => Insn::Branch(Branch::FReturn),
        0xaf => Insn::Branch(Branch::DReturn),
        0xb0 => Insn::Branch(Branch::AReturn),
        0xb1 => Insn::Branch(Branch::Return),
        0xbf => Insn::Branch(Branch::AThrow),
        0xc6 => Insn::Branch(Branch::IfNull(EqComparison::EQ, reader.short_target()?)),
        0xc7 => Insn::Branch(Branch::IfNull(EqComparison::NE, reader.short_target()?)),
        0xc8 => Insn::Branch(Branch::GotoW(reader.wide_target()?)),
        0xc9 => Insn::Branch(Branch::JsrW(reader.wide_target()?)),

        // Fields
        0xb2 => Insn::Generic(Instruction::GetStatic(field_operand(reader, constants)?)),
        0xb3 => Insn::Generic(Instruction::PutStatic(field_operand(reader, constants)?)),
        0xb4 => Insn::Generic(Instruction::GetField(field_operand(reader, constants)?)),
        0xb5 => Insn::Generic(Instruction::PutField(field_operand(reader, constants)?)),

        // Invocations
        0xb6 => Insn::Call(method_call(reader, constants, InvokeKind::Virtual)?),
        0xb7 => Insn::Call(method_call(reader, constants, InvokeKind::Special)?),
        0xb8 => Insn::Call(method_call(reader, constants, InvokeKind::Static)?),
        0xb9 => {
            let call = method_call(reader, constants, InvokeKind::Interface)?;
            let _count = reader.u8()?;
            let _zero = reader.u8()?;
            Insn::Call(call)
        }
        0xba => {
            let index = reader.constant_index()?;
            let _zeros = reader.u16()?;
            let (bootstrap_method, name, descriptor) = constants.invoke_dynamic(index)?;
            Insn::Call(Call {
                kind: InvokeKind::Dynamic { bootstrap_method },
                owner: String::new(),
                name: name.to_owned(),
                descriptor: method_descriptor(descriptor)?,
                interface: false,
            })
        }

        // Objects and arrays
        0xbb => {
            let class = ClassConstantIndex(reader.constant_index()?);
            Insn::Construct(constants.class_name(class)?.to_owned())
        }
        0xbc => {
            let code = reader.u8()?;
            let element_type = BaseType::from_array_type_code(code).ok_or(Error::UnknownOpcode {
                opcode,
                offset: reader.instruction_start,
            })?;
            Insn::Generic(Instruction::NewArray(element_type))
        }
        0xbd => Insn::Generic(Instruction::ANewArray(ClassConstantIndex(
            reader.constant_index()?,
        ))),
        0xc0 => Insn::Generic(Instruction::CheckCast(ClassConstantIndex(
            reader.constant_index()?,
        ))),
        0xc1 => Insn::Generic(Instruction::InstanceOf(ClassConstantIndex(
            reader.constant_index()?,
        ))),
        0xc5 => {
            let class = ClassConstantIndex(reader.constant_index()?);
            let dimensions = reader.u8()?;
            Insn::Generic(Instruction::MultiANewArray(class, dimensions))
        }

        WIDE => decode_wide(reader)?,

        _ => {
            return Err(Error::UnknownOpcode {
                opcode,
                offset: reader.instruction_start,
            })
        }
    };
    Ok(insn)
}

/// Instruction following a `wide` prefix (the prefix has already been read)
fn decode_wide(reader: &mut CodeReader) -> Result<Insn, Error> {
    let opcode = reader.u8()?;
    let insn = match opcode {
        0x15..=0x19 => Insn::Generic(LOADS[(opcode - 0x15) as usize](reader.u16()?)),
        0x36..=0x3a => Insn::Generic(STORES[(opcode - 0x36) as usize](reader.u16()?)),
        0x84 => {
            let index = reader.u16()?;
            let increment = reader.i16()?;
            Insn::Generic(Instruction::IInc(index, increment))
        }
        0xa9 => Insn::Branch(Branch::Ret(reader.u16()?)),
        _ => {
            return Err(Error::UnknownOpcode {
                opcode,
                offset: reader.instruction_start,
            })
        }
    };
    Ok(insn)
}

fn field_operand(reader: &mut CodeReader, constants: &ConstantsPool) -> Result<FieldOperand, Error> {
    let index = reader.constant_index()?;
    let field = constants.member_ref(index)?;
    let field_type = FieldType::<BinaryName>::parse(field.descriptor)
        .map_err(|_| Error::BadDescriptor(field.descriptor.to_owned()))?;
    Ok(FieldOperand {
        index: FieldRefConstantIndex(index),
        field_type,
    })
}

fn method_call(
    reader: &mut CodeReader,
    constants: &ConstantsPool,
    kind: InvokeKind,
) -> Result<Call, Error> {
    let index = reader.constant_index()?;
    let method = constants.member_ref(index)?;
    Ok(Call {
        kind,
        owner: method.owner.to_owned(),
        name: method.name.to_owned(),
        descriptor: method_descriptor(method.descriptor)?,
        interface: method.is_interface,
    })
}

fn method_descriptor(descriptor: &str) -> Result<MethodDescriptor<BinaryName>, Error> {
    MethodDescriptor::parse(descriptor).map_err(|_| Error::BadDescriptor(descriptor.to_owned()))
}

#[cfg(test)]
mod test {
    use super::*;

    fn decode(code: &[u8]) -> Result<Vec<(usize, Insn)>, Error> {
        decode_instructions(code, &ConstantsPool::new())
    }

    #[test]
    fn short_and_wide_forms_fold_together() {
        let code = [
            0x1c, // iload_2
            0x15, 0x07, // iload 7
            0xc4, 0x15, 0x01, 0x00, // wide iload 256
            0x4e, // astore_3
            0x84, 0x01, 0xff, // iinc 1 -1
            0xc4, 0x84, 0x01, 0x00, 0x01, 0x00, // wide iinc 256 256
        ];
        let decoded = decode(&code).unwrap();
        let expected = vec![
            (0, Insn::Generic(Instruction::ILoad(2))),
            (1, Insn::Generic(Instruction::ILoad(7))),
            (3, Insn::Generic(Instruction::ILoad(256))),
            (7, Insn::Generic(Instruction::AStore(3))),
            (8, Insn::Generic(Instruction::IInc(1, -1))),
            (11, Insn::Generic(Instruction::IInc(256, 256))),
        ];
        assert_eq!(decoded, expected);
    }

    #[test]
    fn branch_targets_become_labels() {
        let code = [
            0x03, // iconst_0
            0x99, 0x00, 0x04, // ifeq +4
            0x04, // iconst_1
            0xac, // ireturn
            0xa7, 0xff, 0xfa, // goto -6
        ];
        let decoded = decode(&code).unwrap();
        assert_eq!(decoded[1].1, Insn::Branch(Branch::If(OrdComparison::EQ, Label(5))));
        assert_eq!(decoded[4].1, Insn::Branch(Branch::Goto(Label(0))));
    }

    #[test]
    fn switches_skip_padding() {
        let code = [
            0x03, // iconst_0
            0xaa, 0x00, 0x00, // tableswitch + padding
            0x00, 0x00, 0x00, 0x18, // default +24
            0x00, 0x00, 0x00, 0x01, // low 1
            0x00, 0x00, 0x00, 0x02, // high 2
            0x00, 0x00, 0x00, 0x17, // +23
            0x00, 0x00, 0x00, 0x18, // +24
            0xb1, // return
            0xb1, // return
        ];
        let decoded = decode(&code).unwrap();
        assert_eq!(
            decoded[1],
            (
                1,
                Insn::Branch(Branch::TableSwitch {
                    default: Label(25),
                    low: 1,
                    targets: vec![Label(24), Label(25)],
                })
            )
        );
        assert_eq!(decoded.len(), 4);
    }

    #[test]
    fn malformed_code() {
        assert!(matches!(decode(&[0x10]), Err(Error::TruncatedCode(0))));
        assert!(matches!(
            decode(&[0x00, 0xcb]),
            Err(Error::UnknownOpcode {
                opcode: 0xcb,
                offset: 1
            })
        ));
        assert!(matches!(
            decode(&[0xa7, 0x00, 0x10]),
            Err(Error::BadCodeOffset(16))
        ));
        assert!(matches!(
            decode(&[0xc4, 0x10, 0x00]),
            Err(Error::UnknownOpcode { opcode: 0x10, .. })
        ));
    }

    #[test]
    fn switch_sizes_are_checked_against_the_code() {
        let lookup = [
            0xab, 0x00, 0x00, 0x00, // lookupswitch + padding
            0x00, 0x00, 0x00, 0x00, // default +0
            0x7f, 0xff, 0xff, 0xff, // npairs
        ];
        assert!(matches!(decode(&lookup), Err(Error::TruncatedCode(0))));

        let table = [
            0xaa, 0x00, 0x00, 0x00, // tableswitch + padding
            0x00, 0x00, 0x00, 0x00, // default +0
            0x80, 0x00, 0x00, 0x00, // low
            0x7f, 0xff, 0xff, 0xff, // high
        ];
        assert!(matches!(decode(&table), Err(Error::TruncatedCode(0))));
    }
}
