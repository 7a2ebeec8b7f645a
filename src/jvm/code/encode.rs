//! Instructions to byte code
//!
//! Encoding is done in two passes. The first pass lays out the instructions, computing the offset
//! of every instruction and label. The width of an instruction depends only on its operands and
//! (for switches) on its own offset, so one forward pass is enough. The second pass emits bytes,
//! resolving jump targets against the offsets of their labels.

use super::decode::WIDE;
use super::{Branch, Call, EqComparison, Insn, Instruction, InvokeKind, Label};
use crate::jvm::class_file::{ConstantIndex, ConstantsPool, Serialize};
use crate::jvm::{Error, RenderDescriptor};
use std::collections::HashMap;

/// Offsets of every instruction and label
pub(super) struct Layout {
    /// Offset of each entry of the instruction sequence (markers share the offset of the next
    /// real instruction)
    pub offsets: Vec<usize>,

    /// Offset of every label placed in the sequence
    labels: HashMap<Label, usize>,

    /// Total length of the code array
    pub code_length: usize,
}

impl Layout {
    pub fn compute(instructions: &[Insn]) -> Layout {
        let mut offsets = Vec::with_capacity(instructions.len());
        let mut labels = HashMap::new();
        let mut offset = 0;
        for insn in instructions {
            offsets.push(offset);
            if let Insn::Label(label) = insn {
                labels.insert(*label, offset);
            }
            offset += insn_width(insn, offset);
        }
        Layout {
            offsets,
            labels,
            code_length: offset,
        }
    }

    /// Offset of a label
    pub fn offset(&self, label: Label) -> Result<usize, Error> {
        self.labels
            .get(&label)
            .copied()
            .ok_or(Error::MissingLabel(label))
    }
}

/// Padding after a switch opcode at this offset so that its operands are 4-byte aligned
fn switch_padding(offset: usize) -> usize {
    3 - (offset % 4)
}

/// Load and store indices (also used for `ret`) have a short form, a normal form, and a `wide`
/// form
fn local_index_width(index: u16, has_short_form: bool) -> usize {
    match index {
        0..=3 if has_short_form => 1,
        0..=255 => 2,
        _ => 4,
    }
}

fn insn_width(insn: &Insn, offset: usize) -> usize {
    match insn {
        Insn::Label(_) | Insn::LineMarker(_) => 0,
        Insn::Construct(_) => 3,
        Insn::Call(Call {
            kind: InvokeKind::Interface | InvokeKind::Dynamic { .. },
            ..
        }) => 5,
        Insn::Call(_) => 3,
        Insn::Generic(insn) => instruction_width(insn),
        Insn::Branch(branch) => branch_width(branch, offset),
    }
}

fn instruction_width(insn: &Instruction) -> usize {
    if insn.simple_opcode().is_some() {
        return 1;
    }
    match insn {
        Instruction::BiPush(_) | Instruction::NewArray(_) => 2,
        Instruction::Ldc(ConstantIndex(index)) if *index <= 255 => 2,
        Instruction::ILoad(index)
        | Instruction::LLoad(index)
        | Instruction::FLoad(index)
        | Instruction::DLoad(index)
        | Instruction::ALoad(index)
        | Instruction::IStore(index)
        | Instruction::LStore(index)
        | Instruction::FStore(index)
        | Instruction::DStore(index)
        | Instruction::AStore(index) => local_index_width(*index, true),
        Instruction::IInc(index, increment) => {
            if *index <= 255 && i8::try_from(*increment).is_ok() {
                3
            } else {
                6
            }
        }
        Instruction::MultiANewArray(_, _) => 4,
        _ => 3,
    }
}

fn branch_width(branch: &Branch, offset: usize) -> usize {
    match branch {
        Branch::If(_, _)
        | Branch::IfICmp(_, _)
        | Branch::IfACmp(_, _)
        | Branch::IfNull(_, _)
        | Branch::Goto(_)
        | Branch::Jsr(_) => 3,
        Branch::GotoW(_) | Branch::JsrW(_) => 5,
        Branch::Ret(index) => local_index_width(*index, false),
        Branch::TableSwitch { targets, .. } => 1 + switch_padding(offset) + 4 * (3 + targets.len()),
        Branch::LookupSwitch { targets, .. } => {
            1 + switch_padding(offset) + 4 * (2 + 2 * targets.len())
        }
        Branch::IReturn
        | Branch::LReturn
        | Branch::FReturn
        | Branch::DReturn
        | Branch::AReturn
        | Branch::Return
        | Branch::AThrow => 1,
    }
}

/// Emit the code array for a laid out sequence of instructions
///
/// Calls and `new` are the only instructions that refer to the constant pool by name rather than
/// by index, so they may add constants to the pool.
pub(super) fn emit(
    instructions: &[Insn],
    layout: &Layout,
    constants: &mut ConstantsPool,
) -> Result<Vec<u8>, Error> {
    let mut code = Vec::with_capacity(layout.code_length);
    for (insn, offset) in instructions.iter().zip(&layout.offsets) {
        let mut emitter = Emitter {
            code: &mut code,
            offset: *offset,
            layout,
        };
        match insn {
            Insn::Label(_) | Insn::LineMarker(_) => (),
            Insn::Construct(class_name) => {
                let class = constants.get_class(class_name)?;
                emitter.opcode(0xbb)?;
                class.serialize(emitter.code)?;
            }
            Insn::Call(call) => emitter.call(call, constants)?,
            Insn::Generic(insn) => emitter.instruction(insn)?,
            Insn::Branch(branch) => emitter.branch(branch)?,
        }
    }
    Ok(code)
}

struct Emitter<'a> {
    code: &'a mut Vec<u8>,

    /// Offset of the instruction being emitted
    offset: usize,
    layout: &'a Layout,
}

impl<'a> Emitter<'a> {
    fn opcode(&mut self, opcode: u8) -> Result<(), Error> {
        opcode.serialize(self.code)?;
        Ok(())
    }

    /// The load/store instructions follow the same pattern:
    ///
    ///   - short form (0-3) have special opcodes
    ///   - normal form (0-255) use the opcode plus a byte operand
    ///   - wide form (256-65535) use `wide`, the opcode, and two byte operands
    fn local_index(&mut self, index: u16, short_form_start: u8, normal_form: u8) -> Result<(), Error> {
        match u8::try_from(index) {
            Ok(n @ 0..=3) => self.opcode(short_form_start + n)?,
            Ok(n) => {
                self.opcode(normal_form)?;
                n.serialize(self.code)?;
            }
            Err(_) => {
                self.opcode(WIDE)?;
                self.opcode(normal_form)?;
                index.serialize(self.code)?;
            }
        }
        Ok(())
    }

    fn short_jump(&mut self, opcode: u8, target: Label) -> Result<(), Error> {
        let to = self.layout.offset(target)?;
        let relative = i16::try_from(to as i64 - self.offset as i64).map_err(|_| {
            Error::JumpOutOfRange {
                from: self.offset,
                to,
            }
        })?;
        self.opcode(opcode)?;
        relative.serialize(self.code)?;
        Ok(())
    }

    fn wide_jump_operand(&mut self, target: Label) -> Result<(), Error> {
        let to = self.layout.offset(target)?;
        let relative = (to as i64 - self.offset as i64) as i32;
        relative.serialize(self.code)?;
        Ok(())
    }

    fn call(&mut self, call: &Call, constants: &mut ConstantsPool) -> Result<(), Error> {
        let descriptor = call.descriptor.render();
        if let InvokeKind::Dynamic { bootstrap_method } = call.kind {
            let index = constants.get_invoke_dynamic(bootstrap_method, &call.name, &descriptor)?;
            self.opcode(0xba)?;
            index.serialize(self.code)?;
            0u16.serialize(self.code)?;
            return Ok(());
        }

        let index = constants.get_method_ref(&call.owner, &call.name, &descriptor, call.interface)?;
        match call.kind {
            InvokeKind::Virtual => self.opcode(0xb6)?,
            InvokeKind::Special => self.opcode(0xb7)?,
            InvokeKind::Static => self.opcode(0xb8)?,
            InvokeKind::Interface | InvokeKind::Dynamic { .. } => self.opcode(0xb9)?,
        }
        index.serialize(self.code)?;
        if call.kind == InvokeKind::Interface {
            (call.parameter_slots() as u8).serialize(self.code)?;
            0u8.serialize(self.code)?;
        }
        Ok(())
    }

    fn instruction(&mut self, insn: &Instruction) -> Result<(), Error> {
        if let Some(opcode) = insn.simple_opcode() {
            return self.opcode(opcode);
        }
        match insn {
            Instruction::BiPush(byte) => {
                self.opcode(0x10)?;
                byte.serialize(self.code)?;
            }
            Instruction::SiPush(short) => {
                self.opcode(0x11)?;
                short.serialize(self.code)?;
            }
            Instruction::Ldc(ConstantIndex(index)) => match u8::try_from(*index) {
                Ok(byte) => {
                    self.opcode(0x12)?;
                    byte.serialize(self.code)?;
                }
                Err(_) => {
                    self.opcode(0x13)?;
                    index.serialize(self.code)?;
                }
            },
            Instruction::Ldc2(index) => {
                self.opcode(0x14)?;
                index.serialize(self.code)?;
            }
            Instruction::ILoad(index) => self.local_index(*index, 0x1a, 0x15)?,
            Instruction::LLoad(index) => self.local_index(*index, 0x1e, 0x16)?,
            Instruction::FLoad(index) => self.local_index(*index, 0x22, 0x17)?,
            Instruction::DLoad(index) => self.local_index(*index, 0x26, 0x18)?,
            Instruction::ALoad(index) => self.local_index(*index, 0x2a, 0x19)?,
            Instruction::IStore(index) => self.local_index(*index, 0x3b, 0x36)?,
            Instruction::LStore(index) => self.local_index(*index, 0x3f, 0x37)?,
            Instruction::FStore(index) => self.local_index(*index, 0x43, 0x38)?,
            Instruction::DStore(index) => self.local_index(*index, 0x47, 0x39)?,
            Instruction::AStore(index) => self.local_index(*index, 0x4b, 0x3a)?,
            Instruction::IInc(index, increment) => {
                match (u8::try_from(*index), i8::try_from(*increment)) {
                    (Ok(index), Ok(increment)) => {
                        self.opcode(0x84)?;
                        index.serialize(self.code)?;
                        increment.serialize(self.code)?;
                    }
                    _ => {
                        self.opcode(WIDE)?;
                        self.opcode(0x84)?;
                        index.serialize(self.code)?;
                        increment.serialize(self.code)?;
                    }
                }
            }
            Instruction::GetStatic(field) => {
                self.opcode(0xb2)?;
                field.index.serialize(self.code)?;
            }
            Instruction::PutStatic(field) => {
                self.opcode(0xb3)?;
                field.index.serialize(self.code)?;
            }
            Instruction::GetField(field) => {
                self.opcode(0xb4)?;
                field.index.serialize(self.code)?;
            }
            Instruction::PutField(field) => {
                self.opcode(0xb5)?;
                field.index.serialize(self.code)?;
            }
            Instruction::NewArray(element_type) => {
                self.opcode(0xbc)?;
                element_type.array_type_code().serialize(self.code)?;
            }
            Instruction::ANewArray(class) => {
                self.opcode(0xbd)?;
                class.serialize(self.code)?;
            }
            Instruction::CheckCast(class) => {
                self.opcode(0xc0)?;
                class.serialize(self.code)?;
            }
            Instruction::InstanceOf(class) => {
                self.opcode(0xc1)?;
                class.serialize(self.code)?;
            }
            Instruction::MultiANewArray(class, dimensions) => {
                self.opcode(0xc5)?;
                class.serialize(self.code)?;
                dimensions.serialize(self.code)?;
            }
            _ => (),
        }
        Ok(())
    }

    fn branch(&mut self, branch: &Branch) -> Result<(), Error> {
        match branch {
            Branch::If(comparison, target) => {
                self.short_jump(0x99 + comparison.opcode_offset(), *target)?
            }
            Branch::IfICmp(comparison, target) => {
                self.short_jump(0x9f + comparison.opcode_offset(), *target)?
            }
            Branch::IfACmp(comparison, target) => {
                self.short_jump(0xa5 + comparison.opcode_offset(), *target)?
            }
            Branch::IfNull(comparison, target) => {
                let opcode = match comparison {
                    EqComparison::EQ => 0xc6,
                    EqComparison::NE => 0xc7,
                };
                self.short_jump(opcode, *target)?
            }
            Branch::Goto(target) => self.short_jump(0xa7, *target)?,
            Branch::Jsr(target) => self.short_jump(0xa8, *target)?,
            Branch::GotoW(target) => {
                self.opcode(0xc8)?;
                self.wide_jump_operand(*target)?;
            }
            Branch::JsrW(target) => {
                self.opcode(0xc9)?;
                self.wide_jump_operand(*target)?;
            }
            Branch::Ret(index) => match u8::try_from(*index) {
                Ok(byte) => {
                    self.opcode(0xa9)?;
                    byte.serialize(self.code)?;
                }
                Err(_) => {
                    self.opcode(WIDE)?;
                    self.opcode(0xa9)?;
                    index.serialize(self.code)?;
                }
            },
            Branch::TableSwitch {
                default,
                low,
                targets,
            } => {
                self.opcode(0xaa)?;
                self.switch_padding()?;
                self.wide_jump_operand(*default)?;
                low.serialize(self.code)?;
                (low + targets.len() as i32 - 1).serialize(self.code)?;
                for target in targets {
                    self.wide_jump_operand(*target)?;
                }
            }
            Branch::LookupSwitch { default, targets } => {
                self.opcode(0xab)?;
                self.switch_padding()?;
                self.wide_jump_operand(*default)?;
                (targets.len() as i32).serialize(self.code)?;
                for (key, target) in targets {
                    key.serialize(self.code)?;
                    self.wide_jump_operand(*target)?;
                }
            }
            Branch::IReturn => self.opcode(0xac)?,
            Branch::LReturn => self.opcode(0xad)?,
            Branch::FReturn => self.opcode(0xae)?,
            Branch::DReturn => self.opcode(0xaf)?,
            Branch::AReturn => self.opcode(0xb0)?,
            Branch::Return => self.opcode(0xb1)?,
            Branch::AThrow => self.opcode(0xbf)?,
        }
        Ok(())
    }

    fn switch_padding(&mut self) -> Result<(), Error> {
        for _ in 0..switch_padding(self.offset) {
            self.opcode(0x00)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::OrdComparison;

    fn encode(instructions: &[Insn]) -> Result<Vec<u8>, Error> {
        let layout = Layout::compute(instructions);
        emit(instructions, &layout, &mut ConstantsPool::new())
    }

    #[test]
    fn compact_forms_are_chosen() {
        let instructions = vec![
            Insn::Generic(Instruction::ILoad(2)),
            Insn::Generic(Instruction::ALoad(9)),
            Insn::Generic(Instruction::DStore(300)),
            Insn::Generic(Instruction::Ldc(ConstantIndex(7))),
            Insn::Generic(Instruction::Ldc(ConstantIndex(700))),
            Insn::Generic(Instruction::IInc(1, 200)),
        ];
        let expected = vec![
            0x1c, // iload_2
            0x19, 0x09, // aload 9
            0xc4, 0x39, 0x01, 0x2c, // wide dstore 300
            0x12, 0x07, // ldc 7
            0x13, 0x02, 0xbc, // ldc_w 700
            0xc4, 0x84, 0x00, 0x01, 0x00, 0xc8, // wide iinc 1 200
        ];
        assert_eq!(encode(&instructions).unwrap(), expected);
    }

    #[test]
    fn jumps_are_relative_to_labels() {
        let instructions = vec![
            Insn::Label(Label(40)),
            Insn::Generic(Instruction::IConst0),
            Insn::Branch(Branch::If(OrdComparison::NE, Label(41))),
            Insn::Branch(Branch::Goto(Label(40))),
            Insn::LineMarker(3),
            Insn::Label(Label(41)),
            Insn::Branch(Branch::Return),
        ];
        let expected = vec![
            0x03, // iconst_0
            0x9a, 0x00, 0x06, // ifne +6
            0xa7, 0xff, 0xfc, // goto -4
            0xb1, // return
        ];
        assert_eq!(encode(&instructions).unwrap(), expected);
    }

    #[test]
    fn switch_padding_depends_on_offset() {
        let instructions = vec![
            Insn::Generic(Instruction::IConst0),
            Insn::Branch(Branch::LookupSwitch {
                default: Label(1),
                targets: vec![(5, Label(1))],
            }),
            Insn::Label(Label(1)),
            Insn::Branch(Branch::Return),
        ];
        let layout = Layout::compute(&instructions);
        assert_eq!(layout.offsets, vec![0, 1, 20, 20]);
        assert_eq!(layout.offset(Label(1)).unwrap(), 20);
        let code = encode(&instructions).unwrap();
        assert_eq!(code.len(), 21);
        assert_eq!(&code[1..4], &[0xab, 0x00, 0x00]);
    }

    #[test]
    fn missing_labels_are_reported() {
        let instructions = vec![Insn::Branch(Branch::Goto(Label(9)))];
        assert!(matches!(
            encode(&instructions),
            Err(Error::MissingLabel(Label(9)))
        ));
    }
}
