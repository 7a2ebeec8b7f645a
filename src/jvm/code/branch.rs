use super::Label;

/// Instruction which may transfer control somewhere other than the next instruction
///
/// Jump targets are labels. They only become offsets again when the code is encoded, at which
/// point each target must still fit in the instruction's encoding (16 bits for everything but
/// `goto_w`, `jsr_w`, and the switches).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Branch {
    If(OrdComparison, Label), // covers `ifeq`, `ifne`, `iflt`, `ifge`, `ifgt`, `ifle`
    IfICmp(OrdComparison, Label), // covers `if_icmpeq`, `if_icmpne`, `if_icmplt`, ... `if_icmple`
    IfACmp(EqComparison, Label), // covers `if_acmpeq`, `if_acmpne`
    IfNull(EqComparison, Label), // covers `ifnull`, `ifnonnull`
    Goto(Label),
    GotoW(Label),
    Jsr(Label),
    JsrW(Label),
    Ret(u16), // covers `ret` and `wide ret`
    TableSwitch {
        /// Jump target if the argument is less than `low` or greater than
        /// `low + targets.len() - 1`
        default: Label,

        /// Value associated with the first jump target
        low: i32,

        /// Jump targets
        targets: Vec<Label>,
    },
    LookupSwitch {
        /// Jump target if there is no corresponding key
        default: Label,

        /// Jump targets (sorted so that the keys are ascending)
        targets: Vec<(i32, Label)>,
    },
    IReturn,
    LReturn,
    FReturn,
    DReturn,
    AReturn,
    Return,
    AThrow,
}

impl Branch {
    /// Every label this instruction may jump to
    pub fn jump_targets(&self) -> Vec<Label> {
        match self {
            Branch::If(_, lbl)
            | Branch::IfICmp(_, lbl)
            | Branch::IfACmp(_, lbl)
            | Branch::IfNull(_, lbl)
            | Branch::Goto(lbl)
            | Branch::GotoW(lbl)
            | Branch::Jsr(lbl)
            | Branch::JsrW(lbl) => vec![*lbl],
            Branch::TableSwitch {
                default, targets, ..
            } => std::iter::once(*default)
                .chain(targets.iter().copied())
                .collect(),
            Branch::LookupSwitch { default, targets } => std::iter::once(*default)
                .chain(targets.iter().map(|(_, lbl)| *lbl))
                .collect(),
            Branch::Ret(_)
            | Branch::IReturn
            | Branch::LReturn
            | Branch::FReturn
            | Branch::DReturn
            | Branch::AReturn
            | Branch::Return
            | Branch::AThrow => vec![],
        }
    }
}

/// Binary comparison operators available for `int` branches
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum OrdComparison {
    EQ,
    NE,
    LT,
    GE,
    GT,
    LE,
}

impl OrdComparison {
    /// In opcode order, starting from `ifeq`/`if_icmpeq`
    pub(crate) const ALL: [OrdComparison; 6] = [
        OrdComparison::EQ,
        OrdComparison::NE,
        OrdComparison::LT,
        OrdComparison::GE,
        OrdComparison::GT,
        OrdComparison::LE,
    ];

    /// Distance of the opcode from the `eq` variant of the same instruction
    pub(crate) fn opcode_offset(&self) -> u8 {
        *self as u8
    }
}

/// Equality/inequality comparison operators
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum EqComparison {
    EQ,
    NE,
}

impl EqComparison {
    pub(crate) fn opcode_offset(&self) -> u8 {
        *self as u8
    }
}
