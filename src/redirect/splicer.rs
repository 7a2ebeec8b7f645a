//! Rewrite a call site so that it calls a substitute
//!
//! Splices only ever touch the operand range of one call site, and always leave the call site
//! with the same net stack effect it had before. The stack may still grow temporarily, when a
//! placeholder receiver is pushed under the arguments.

use super::matcher::{is_companion_owner, Match};
use super::resolver::{receiver_range_end, Unresolved};
use super::Substitute;
use crate::jvm::code::{Call, Code, Insn, Instruction, InvokeKind, Label};
use crate::jvm::Name;

/// Extra stack slots a member splice may need (for a placeholder receiver)
pub const MEMBER_STACK_DELTA: u16 = 1;

/// Constructions only ever remove stack entries
pub const CONSTRUCTION_STACK_DELTA: u16 = 0;

/// What to do with the receiver of the original call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverPlan {
    /// Leave operands alone (the receiver, if any, becomes the first argument)
    Keep,

    /// Remove the instructions computing the receiver
    Excise,

    /// Push `null` under the arguments, for a leading parameter the call doesn't supply
    Placeholder,

    /// Remove the instructions computing the receiver and push `null` instead
    ReplaceWithPlaceholder,
}

/// Result of a splice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Splice {
    /// First instruction of the rewritten range
    pub range_start: usize,

    /// Index of the call to the substitute
    pub call_index: usize,

    /// How much higher the stack may get than before
    pub stack_delta: u16,
}

/// Decide how the operands on the stack line up with the substitute's parameters
///
/// The substitute may take one more leading parameter than the call supplies arguments for. For
/// instance calls, that parameter receives the receiver. For static calls and calls on a Kotlin
/// companion object (whose receiver is just the companion singleton), it receives `null`.
pub fn plan_receiver(call: &Call, found: &Match) -> Result<ReceiverPlan, Unresolved> {
    let substitute = &found.substitute.substitute_descriptor;
    let expected = substitute.parameter_length(false);
    let arguments = call.descriptor.parameter_length(false);
    let leading_reference = substitute
        .parameters
        .first()
        .map_or(false, |parameter| parameter.is_reference());

    let plan = match call.kind {
        InvokeKind::Static if expected == arguments + 1 && leading_reference => {
            Some(ReceiverPlan::Placeholder)
        }
        InvokeKind::Static if expected == arguments => Some(ReceiverPlan::Keep),
        InvokeKind::Virtual if found.companion || is_companion_owner(&call.owner) => {
            if expected == arguments + 1 && leading_reference {
                Some(ReceiverPlan::ReplaceWithPlaceholder)
            } else if expected == arguments {
                Some(ReceiverPlan::Excise)
            } else {
                None
            }
        }
        InvokeKind::Virtual | InvokeKind::Special | InvokeKind::Interface => {
            if expected == arguments {
                Some(ReceiverPlan::Excise)
            } else if expected == arguments + 1 && leading_reference {
                Some(ReceiverPlan::Keep)
            } else {
                None
            }
        }
        _ => None,
    };
    plan.ok_or(Unresolved::ReceiverMismatch {
        expected,
        found: call.parameter_slots(),
    })
}

fn substitute_call(substitute: &Substitute, substitute_owner: &str) -> Insn {
    Insn::Call(Call::invoke_static(
        substitute_owner,
        substitute.substitute_name.as_str(),
        substitute.substitute_descriptor.clone(),
    ))
}

/// Redirect the member call at `call_index`, whose operands are computed from `range_start` on
pub fn splice_member(
    code: &mut Code,
    call_index: usize,
    range_start: usize,
    plan: ReceiverPlan,
    substitute: &Substitute,
    substitute_owner: &str,
) -> Splice {
    let excised = match plan {
        ReceiverPlan::Excise | ReceiverPlan::ReplaceWithPlaceholder => {
            let end = receiver_range_end(&code.instructions, range_start, call_index);
            range_start..end + 1
        }
        ReceiverPlan::Keep | ReceiverPlan::Placeholder => range_start..range_start,
    };
    let placeholder = matches!(
        plan,
        ReceiverPlan::Placeholder | ReceiverPlan::ReplaceWithPlaceholder
    );

    let old = std::mem::take(&mut code.instructions);
    let mut instructions = Vec::with_capacity(old.len() + 1);
    let mut new_call_index = 0;
    for (index, insn) in old.into_iter().enumerate() {
        if index == range_start && placeholder {
            instructions.push(Insn::Generic(Instruction::AConstNull));
        }
        if index == call_index {
            new_call_index = instructions.len();
            instructions.push(substitute_call(substitute, substitute_owner));
        } else if !excised.contains(&index) || insn.is_marker() {
            instructions.push(insn);
        }
    }
    code.instructions = instructions;

    Splice {
        range_start,
        call_index: new_call_index,
        stack_delta: MEMBER_STACK_DELTA,
    }
}

/// Replace `new T; dup; <args>; invokespecial T.<init>` with `<args>; invokestatic substitute`
///
/// Stack map frames between the `new` and the constructor call may refer to the uninitialized
/// object through the label of the `new`, so those entries are dropped.
pub fn splice_construction(
    code: &mut Code,
    new_index: usize,
    duplicate_index: usize,
    init_index: usize,
    substitute: &Substitute,
    substitute_owner: &str,
) -> Splice {
    let created_at: Vec<Label> = code.instructions[..new_index]
        .iter()
        .rev()
        .take_while(|insn| insn.is_marker())
        .filter_map(|insn| match insn {
            Insn::Label(label) => Some(*label),
            _ => None,
        })
        .collect();
    for label in created_at {
        code.forget_uninitialized(label);
    }

    code.instructions[init_index] = substitute_call(substitute, substitute_owner);
    code.instructions.remove(duplicate_index);
    code.instructions.remove(new_index);

    Splice {
        range_start: new_index,
        call_index: init_index - 2,
        stack_delta: CONSTRUCTION_STACK_DELTA,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_file::{
        ConstantIndex, FieldRefConstantIndex, FrameKind, VerificationType,
    };
    use crate::jvm::code::{Branch, FieldOperand, Frame};
    use crate::jvm::{
        BinaryName, FieldType, MethodDescriptor, Name, ParseDescriptor, UnqualifiedName,
    };

    fn call(kind: InvokeKind, owner: &str, name: &str, descriptor: &str) -> Call {
        Call {
            kind,
            owner: owner.to_owned(),
            name: name.to_owned(),
            descriptor: MethodDescriptor::parse(descriptor).unwrap(),
            interface: false,
        }
    }

    fn substitute(owner: &str, name: &str, original: &str, replacement: &str) -> Substitute {
        Substitute {
            owner: BinaryName::from_string(owner.to_owned()).unwrap(),
            name: UnqualifiedName::from_string(name.to_owned()).unwrap(),
            original_descriptor: MethodDescriptor::parse(original).unwrap(),
            substitute_name: UnqualifiedName::from_string(String::from("sub")).unwrap(),
            substitute_descriptor: MethodDescriptor::parse(replacement).unwrap(),
        }
    }

    fn plan(call: &Call, substitute: &Substitute) -> Result<ReceiverPlan, Unresolved> {
        let found = Match {
            substitute,
            companion: call.kind == InvokeKind::Virtual && is_companion_owner(&call.owner),
        };
        plan_receiver(call, &found)
    }

    #[test]
    fn receiver_plans() {
        let statik = call(InvokeKind::Static, "a/B", "foo", "(I)I");
        let same = substitute("a/B", "foo", "(I)I", "(I)I");
        let extra = substitute("a/B", "foo", "(I)I", "(La/B;I)I");
        let wide = substitute("a/B", "foo", "(I)I", "(JI)I");
        assert_eq!(plan(&statik, &same), Ok(ReceiverPlan::Keep));
        assert_eq!(plan(&statik, &extra), Ok(ReceiverPlan::Placeholder));
        assert_eq!(
            plan(&statik, &wide),
            Err(Unresolved::ReceiverMismatch {
                expected: 3,
                found: 1
            })
        );

        let instance = call(InvokeKind::Virtual, "a/B", "foo", "(I)I");
        assert_eq!(plan(&instance, &same), Ok(ReceiverPlan::Excise));
        assert_eq!(plan(&instance, &extra), Ok(ReceiverPlan::Keep));

        let companion = call(InvokeKind::Virtual, "a/B$Companion", "foo", "(I)I");
        assert_eq!(plan(&companion, &same), Ok(ReceiverPlan::Excise));
        assert_eq!(
            plan(&companion, &extra),
            Ok(ReceiverPlan::ReplaceWithPlaceholder)
        );

        let dynamic = call(
            InvokeKind::Dynamic {
                bootstrap_method: 0,
            },
            "",
            "foo",
            "(I)I",
        );
        assert!(plan(&dynamic, &same).is_err());
    }

    #[test]
    fn static_placeholder() {
        let foo = call(InvokeKind::Static, "a/B", "foo", "(II)I");
        let sub = substitute("a/B", "foo", "(II)I", "(La/B;II)I");
        let mut code = Code::from_instructions(
            2,
            0,
            vec![
                Insn::LineMarker(3),
                Insn::Generic(Instruction::IConst1),
                Insn::Generic(Instruction::IConst2),
                Insn::Call(foo),
                Insn::Branch(Branch::IReturn),
            ],
        );
        let splice = splice_member(&mut code, 3, 1, ReceiverPlan::Placeholder, &sub, "a/BTest");
        assert_eq!(
            splice,
            Splice {
                range_start: 1,
                call_index: 4,
                stack_delta: 1
            }
        );
        assert_eq!(
            code.instructions[..4],
            [
                Insn::LineMarker(3),
                Insn::Generic(Instruction::AConstNull),
                Insn::Generic(Instruction::IConst1),
                Insn::Generic(Instruction::IConst2),
            ]
        );
        match &code.instructions[4] {
            Insn::Call(call) => {
                assert_eq!(call.kind, InvokeKind::Static);
                assert_eq!(call.to_string(), "a/BTest.sub(La/B;II)I");
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn receiver_excision_keeps_markers() {
        let get = call(InvokeKind::Virtual, "a/Db", "get", "(I)I");
        let sub = substitute("a/Db", "get", "(I)I", "(I)I");
        let mut code = Code::from_instructions(
            2,
            1,
            vec![
                Insn::Generic(Instruction::ALoad(0)),
                Insn::LineMarker(9),
                Insn::Generic(Instruction::GetField(FieldOperand {
                    index: FieldRefConstantIndex(ConstantIndex(7)),
                    field_type: FieldType::parse("La/Db;").unwrap(),
                })),
                Insn::Generic(Instruction::IConst2),
                Insn::Call(get),
                Insn::Branch(Branch::IReturn),
            ],
        );
        let splice = splice_member(&mut code, 4, 0, ReceiverPlan::Excise, &sub, "a/DbTest");
        assert_eq!(splice.call_index, 2);
        assert_eq!(code.instructions[0], Insn::LineMarker(9));
        assert_eq!(code.instructions[1], Insn::Generic(Instruction::IConst2));
        assert_eq!(code.instructions[3], Insn::Branch(Branch::IReturn));
    }

    #[test]
    fn construction() {
        let init = call(InvokeKind::Special, "a/Conn", "<init>", "(I)V");
        let sub = substitute("a/Conn", "<init>", "(I)V", "(I)La/Conn;");
        let mut code = Code::from_instructions(
            3,
            1,
            vec![
                Insn::Label(Label(0)),
                Insn::Construct(String::from("a/Conn")),
                Insn::Generic(Instruction::Dup),
                Insn::Label(Label(4)),
                Insn::Generic(Instruction::ILoad(0)),
                Insn::Call(init),
                Insn::Branch(Branch::AReturn),
            ],
        );
        code.frames.push(Frame {
            label: Label(4),
            kind: FrameKind::Full {
                locals: vec![VerificationType::Integer],
                stack: vec![
                    VerificationType::Uninitialized(Label(0)),
                    VerificationType::Uninitialized(Label(0)),
                ],
            },
        });

        let splice = splice_construction(&mut code, 1, 2, 5, &sub, "a/ConnTest");
        assert_eq!(splice.range_start, 1);
        assert_eq!(splice.call_index, 3);
        assert_eq!(splice.stack_delta, 0);
        assert_eq!(code.instructions.len(), 5);
        match &code.instructions[3] {
            Insn::Call(call) => assert_eq!(call.to_string(), "a/ConnTest.sub(I)La/Conn;"),
            other => panic!("expected call, got {:?}", other),
        }
        assert_eq!(
            code.frames[0].kind,
            FrameKind::Full {
                locals: vec![VerificationType::Integer],
                stack: vec![],
            }
        );
    }
}
