//! Net operand stack effect of instructions, in stack slots
//!
//! `long` and `double` values take up two slots everywhere (constants, loads, field values,
//! parameters, and return values). The effect of a branch is the effect on the path that does not
//! jump, so `athrow` counts as popping its exception only.

use super::{Branch, Call, Instruction, Insn};
use crate::util::Width;

impl Insn {
    /// Net change in operand stack depth caused by the instruction
    pub fn stack_delta(&self) -> i32 {
        match self {
            Insn::Call(call) => call.stack_delta(),
            Insn::Construct(_) => 1,
            Insn::LineMarker(_) | Insn::Label(_) => 0,
            Insn::Generic(insn) => insn.stack_delta(),
            Insn::Branch(branch) => branch.stack_delta(),
        }
    }
}

impl Call {
    /// Arguments (and the receiver, if any) are popped and the return value is pushed
    pub fn stack_delta(&self) -> i32 {
        self.return_slots() as i32 - self.parameter_slots() as i32
    }
}

impl Instruction {
    pub fn stack_delta(&self) -> i32 {
        if let Some(delta) = self.simple_stack_delta() {
            return delta;
        }
        match self {
            Instruction::BiPush(_) | Instruction::SiPush(_) | Instruction::Ldc(_) => 1,
            Instruction::Ldc2(_) => 2,
            Instruction::ILoad(_) | Instruction::FLoad(_) | Instruction::ALoad(_) => 1,
            Instruction::LLoad(_) | Instruction::DLoad(_) => 2,
            Instruction::IStore(_) | Instruction::FStore(_) | Instruction::AStore(_) => -1,
            Instruction::LStore(_) | Instruction::DStore(_) => -2,
            Instruction::IInc(_, _) => 0,
            Instruction::GetStatic(field) => field.field_type.width() as i32,
            Instruction::PutStatic(field) => -(field.field_type.width() as i32),
            Instruction::GetField(field) => field.field_type.width() as i32 - 1,
            Instruction::PutField(field) => -(field.field_type.width() as i32) - 1,
            Instruction::NewArray(_)
            | Instruction::ANewArray(_)
            | Instruction::CheckCast(_)
            | Instruction::InstanceOf(_) => 0,
            Instruction::MultiANewArray(_, dimensions) => 1 - *dimensions as i32,
            _ => 0,
        }
    }
}

impl Branch {
    pub fn stack_delta(&self) -> i32 {
        match self {
            Branch::If(_, _) | Branch::IfNull(_, _) => -1,
            Branch::IfICmp(_, _) | Branch::IfACmp(_, _) => -2,
            Branch::Goto(_) | Branch::GotoW(_) | Branch::Ret(_) | Branch::Return => 0,
            Branch::Jsr(_) | Branch::JsrW(_) => 1,
            Branch::TableSwitch { .. } | Branch::LookupSwitch { .. } => -1,
            Branch::IReturn | Branch::FReturn | Branch::AReturn | Branch::AThrow => -1,
            Branch::LReturn | Branch::DReturn => -2,
        }
    }
}
