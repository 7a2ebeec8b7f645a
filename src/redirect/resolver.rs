//! Find the instructions that compute the operands of a call
//!
//! The resolver doesn't build a control flow graph. It relies on the fact that compilers evaluate
//! the receiver and arguments of a call in straight-line code right before the call, so walking
//! backwards while adding up the stack effect of every instruction eventually reaches the
//! instruction which pushed the first operand. If the walk hits a jump, a jump target, or the
//! start of the method first, the range is unresolved.

use crate::jvm::code::{Call, Insn, Instruction, Label};
use std::collections::HashSet;
use std::fmt;

/// Reason a call site was left untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unresolved {
    /// The operands are not computed in straight-line code before the call
    ControlFlowBoundary { index: usize },

    /// The start of the method was reached with operand slots still unaccounted for
    ExhaustedMethod { missing: i32 },

    /// No `new` of the constructed type precedes the constructor call (eg. a `super(..)` call)
    MissingConstruction,

    /// The `new` is not immediately followed by `dup`
    MissingDuplicate { index: usize },

    /// The substitute's parameters don't line up with the operands of the call
    ReceiverMismatch { expected: usize, found: usize },
}

impl fmt::Display for Unresolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unresolved::ControlFlowBoundary { index } => {
                write!(f, "control flow boundary at instruction {}", index)
            }
            Unresolved::ExhaustedMethod { missing } => {
                write!(f, "reached start of method missing {} operand slots", missing)
            }
            Unresolved::MissingConstruction => f.write_str("no matching `new`"),
            Unresolved::MissingDuplicate { index } => {
                write!(f, "`new` at instruction {} is not followed by `dup`", index)
            }
            Unresolved::ReceiverMismatch { expected, found } => write!(
                f,
                "substitute takes {} parameter slots, call site has {}",
                expected, found
            ),
        }
    }
}

/// Find the first instruction computing the receiver or arguments of the call at `call_index`
///
/// Calls without any operands get an empty range, starting at the call itself. `boundaries` are
/// the labels at which control flow may enter the method body (see
/// [`Code::control_flow_labels`](crate::jvm::code::Code::control_flow_labels)).
pub fn member_range_start(
    instructions: &[Insn],
    call_index: usize,
    call: &Call,
    boundaries: &HashSet<Label>,
) -> Result<usize, Unresolved> {
    let mut needed = call.parameter_slots() as i32;
    if needed == 0 {
        return Ok(call_index);
    }
    for index in (0..call_index).rev() {
        let insn = &instructions[index];
        match insn {
            Insn::Branch(_) => return Err(Unresolved::ControlFlowBoundary { index }),
            Insn::Label(label) if boundaries.contains(label) => {
                return Err(Unresolved::ControlFlowBoundary { index })
            }
            _ => (),
        }
        needed -= insn.stack_delta();
        if needed <= 0 {
            return Ok(index);
        }
    }
    Err(Unresolved::ExhaustedMethod { missing: needed })
}

/// Find the `new` paired with the constructor call at `init_index`
///
/// Constructions of the same type may be nested in the arguments (eg. `new A(new A())`), so
/// constructor calls seen on the way back have to be paired off first.
pub fn construction_range_start(
    instructions: &[Insn],
    init_index: usize,
    class_name: &str,
) -> Result<usize, Unresolved> {
    let mut nested = 0;
    for index in (0..init_index).rev() {
        match &instructions[index] {
            Insn::Call(call) if call.is_constructor() && call.owner == class_name => nested += 1,
            Insn::Construct(constructed) if constructed == class_name => {
                if nested == 0 {
                    return Ok(index);
                }
                nested -= 1;
            }
            _ => (),
        }
    }
    Err(Unresolved::MissingConstruction)
}

/// Index of the `dup` following the `new` at `new_index` (skipping markers)
pub fn duplicate_index(instructions: &[Insn], new_index: usize) -> Result<usize, Unresolved> {
    let missing = Unresolved::MissingDuplicate { index: new_index };
    let (offset, insn) = instructions[new_index + 1..]
        .iter()
        .enumerate()
        .find(|(_, insn)| !insn.is_marker())
        .ok_or(missing)?;
    if *insn == Insn::Generic(Instruction::Dup) {
        Ok(new_index + 1 + offset)
    } else {
        Err(missing)
    }
}

/// Last instruction computing the receiver, given the range computing receiver and arguments
///
/// Simulates the stack forward from `start` and returns the last position (before `end`) at
/// which exactly one slot (the receiver) is on the stack.
pub fn receiver_range_end(instructions: &[Insn], start: usize, end: usize) -> usize {
    let mut depth = 0;
    let mut edge = start;
    for (index, insn) in instructions.iter().enumerate().take(end).skip(start) {
        depth += insn.stack_delta();
        if depth == 1 {
            edge = index;
        }
    }
    edge
}
