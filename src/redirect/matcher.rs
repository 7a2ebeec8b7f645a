//! Decide which calls have substitutes
//!
//! Kotlin compiles some calls into something other than what appears in the source:
//!
//!   - functions in a `companion object` of `Outer` are instance methods of `Outer$Companion`,
//!     called on the `Outer.Companion` static field
//!
//!   - private members accessed from a lambda or nested class go through a synthetic static
//!     `access$name` method on the outer class, which takes the outer instance as an extra first
//!     parameter
//!
//! Substitutes are registered under the source-level names, so those calls are first normalized
//! through an ordered list of rewrite rules.

use super::{Catalog, Substitute};
use crate::jvm::code::{Call, InvokeKind};
use crate::jvm::{BinaryName, MethodDescriptor, RenderDescriptor};

const COMPANION_SUFFIX: &str = "$Companion";
const ACCESSOR_PREFIX: &str = "access$";

/// Call target, as it is looked up in the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub owner: String,
    pub name: String,
    pub descriptor: MethodDescriptor<BinaryName>,
}

/// Rewrite rule: when the guard holds, the rewrite produces the normalized target
struct Rule {
    guard: fn(&Target) -> bool,
    rewrite: fn(Target) -> Target,
}

const RULES: [Rule; 2] = [
    Rule {
        guard: is_companion_target,
        rewrite: strip_companion,
    },
    Rule {
        guard: is_accessor_target,
        rewrite: strip_accessor,
    },
];

fn is_companion_target(target: &Target) -> bool {
    is_companion_owner(&target.owner)
}

/// `pkg/Outer$Companion` is `pkg/Outer`
fn strip_companion(target: Target) -> Target {
    let owner_length = target.owner.len() - COMPANION_SUFFIX.len();
    Target {
        owner: target.owner[..owner_length].to_owned(),
        ..target
    }
}

fn is_accessor_target(target: &Target) -> bool {
    target.name.len() > ACCESSOR_PREFIX.len() && target.name.starts_with(ACCESSOR_PREFIX)
}

/// `access$foo(LOuter;I)V` is `foo(I)V`
fn strip_accessor(target: Target) -> Target {
    Target {
        name: target.name[ACCESSOR_PREFIX.len()..].to_owned(),
        descriptor: target.descriptor.without_first_parameter(),
        owner: target.owner,
    }
}

impl Target {
    fn of(call: &Call) -> Target {
        Target {
            owner: call.owner.clone(),
            name: call.name.clone(),
            descriptor: call.descriptor.clone(),
        }
    }

    /// Apply every rule whose guard holds, in order
    pub fn normalize(call: &Call) -> Target {
        RULES.iter().fold(Target::of(call), |target, rule| {
            if (rule.guard)(&target) {
                (rule.rewrite)(target)
            } else {
                target
            }
        })
    }
}

/// Substitute found for a call
#[derive(Debug, Clone, Copy)]
pub struct Match<'a> {
    pub substitute: &'a Substitute,

    /// The call is an instance call on a companion object
    pub companion: bool,
}

/// Is the call owner a Kotlin companion object class?
pub fn is_companion_owner(owner: &str) -> bool {
    owner.ends_with(COMPANION_SUFFIX)
}

/// Find the substitute for a call, if there is one
///
/// Calls to the substitute class itself are never matched, since those are exactly the calls
/// that splicing introduces. `invokedynamic` has no owner, so it is never matched either.
pub fn find_substitute<'a>(
    call: &Call,
    catalog: &'a Catalog,
    substitute_owner: &str,
) -> Option<Match<'a>> {
    if call.owner == substitute_owner {
        return None;
    }
    match call.kind {
        InvokeKind::Dynamic { .. } => None,
        InvokeKind::Special if call.is_constructor() => {
            let substitute = catalog.construction(&call.owner, &call.descriptor.render())?;
            Some(Match {
                substitute,
                companion: false,
            })
        }
        _ if call.is_constructor() => None,
        kind => {
            let target = Target::normalize(call);
            let substitute =
                catalog.member(&target.owner, &target.name, &target.descriptor.render())?;
            Some(Match {
                substitute,
                companion: kind == InvokeKind::Virtual && is_companion_owner(&call.owner),
            })
        }
    }
}
