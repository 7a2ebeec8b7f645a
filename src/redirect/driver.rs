use super::matcher::{find_substitute, Match};
use super::resolver::{
    construction_range_start, duplicate_index, member_range_start, Unresolved,
};
use super::splicer::{plan_receiver, splice_construction, splice_member, Splice};
use super::{Catalog, Error, Outcome, Settings, SiteEvent, TransformReport};
use crate::jvm::code::{Call, Code, Insn, Label};
use crate::jvm::model::Class;
use crate::jvm::{Name, RenderDescriptor, UnqualifiedName};
use std::collections::HashSet;

/// Redirects calls in classes to substitutes from a catalog
///
/// The transformer only holds read-only state, so one instance can be shared between threads
/// transforming different classes.
#[derive(Debug, Clone)]
pub struct ClassTransformer {
    settings: Settings,
    catalog: Catalog,
}

impl ClassTransformer {
    pub fn new(settings: Settings, catalog: Catalog) -> ClassTransformer {
        ClassTransformer { settings, catalog }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Redirect every call site of the class that has a substitute
    ///
    /// Classes that already carry the marker field are left alone. The marker field is added
    /// once some method was modified.
    pub fn transform_class(&self, class: &mut Class) -> Result<TransformReport, Error> {
        let class_name = class.name()?.to_owned();
        let mut report = TransformReport::new(&class_name);

        let marker_name = self.settings.marker_field_name.as_str();
        let marker_descriptor = self.settings.marker_field_descriptor();
        if class.has_field(marker_name, &marker_descriptor)? {
            log::debug!("Skipping {}, which is already transformed", class_name);
            report.already_transformed = true;
            return Ok(report);
        }

        let substitute_owner = self.settings.substitute_owner(&class_name)?;
        for method in &mut class.methods {
            let code = match &mut method.code {
                Some(code) => code,
                None => continue,
            };
            let method_name = format!("{}{}", method.name, method.descriptor.render());
            let in_constructor = method.name == UnqualifiedName::INIT.as_str();
            if self.transform_code(
                code,
                &method_name,
                in_constructor,
                substitute_owner.as_str(),
                &mut report.events,
            ) {
                method.modified = true;
            }
        }

        if class.is_modified() {
            class.add_marker_field(marker_name, &marker_descriptor)?;
        }
        log::debug!(
            "Transformed {}: {} call sites substituted, {} left untouched",
            class_name,
            report.substituted(),
            report.unresolved().count()
        );
        Ok(report)
    }

    /// Transform the class in `bytes`, returning the new class bytes if anything changed
    pub fn transform_bytes(&self, bytes: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        let mut class = Class::parse(bytes)?;
        self.transform_class(&mut class)?;
        if !class.is_modified() {
            return Ok(None);
        }
        let class_file = class.into_class_file()?;
        Ok(Some(class_file.to_bytes()?))
    }

    /// Redirect call sites in one method body, returning whether anything changed
    ///
    /// After every splice, scanning resumes at the start of the rewritten range. Calls up to the
    /// inserted substitute call have already been examined, so they don't produce events again.
    fn transform_code(
        &self,
        code: &mut Code,
        method_name: &str,
        in_constructor: bool,
        substitute_owner: &str,
        events: &mut Vec<SiteEvent>,
    ) -> bool {
        let boundaries = code.control_flow_labels();
        let mut max_stack_delta: u16 = 0;
        let mut modified = false;
        let mut examined = 0;
        let mut index = 0;

        while index < code.instructions.len() {
            let call = match &code.instructions[index] {
                Insn::Call(call) => call.clone(),
                _ => {
                    index += 1;
                    continue;
                }
            };
            let revisited = index < examined;
            examined = examined.max(index + 1);
            let line = code.line_before(index);
            if !revisited {
                log::trace!(
                    "{}: examining call to {} at instruction {}",
                    describe_site(method_name, line),
                    call,
                    index
                );
            }

            let found = match find_substitute(&call, &self.catalog, substitute_owner) {
                Some(found) => found,
                None => {
                    index += 1;
                    continue;
                }
            };

            match splice_site(code, index, &call, &found, &boundaries, substitute_owner) {
                Ok(splice) => {
                    log::debug!(
                        "{}: substituted call to {} with {}.{}",
                        describe_site(method_name, line),
                        call,
                        substitute_owner,
                        found.substitute.substitute_name
                    );
                    events.push(SiteEvent {
                        method: method_name.to_owned(),
                        line,
                        target: call.to_string(),
                        outcome: Outcome::Substituted,
                    });
                    max_stack_delta = max_stack_delta.max(splice.stack_delta);
                    modified = true;
                    examined = splice.call_index + 1;
                    index = splice.range_start;
                }
                Err(reason) => {
                    if !revisited {
                        report_unresolved(method_name, line, &call, reason, in_constructor);
                        events.push(SiteEvent {
                            method: method_name.to_owned(),
                            line,
                            target: call.to_string(),
                            outcome: Outcome::Unresolved(reason),
                        });
                    }
                    index += 1;
                }
            }
        }

        if modified {
            code.max_stack = code.max_stack.saturating_add(max_stack_delta);
        }
        modified
    }
}

fn splice_site(
    code: &mut Code,
    index: usize,
    call: &Call,
    found: &Match,
    boundaries: &HashSet<Label>,
    substitute_owner: &str,
) -> Result<Splice, Unresolved> {
    if found.substitute.is_construction() {
        let new_index = construction_range_start(&code.instructions, index, &call.owner)?;
        let duplicate = duplicate_index(&code.instructions, new_index)?;
        Ok(splice_construction(
            code,
            new_index,
            duplicate,
            index,
            found.substitute,
            substitute_owner,
        ))
    } else {
        let plan = plan_receiver(call, found)?;
        let range_start = member_range_start(&code.instructions, index, call, boundaries)?;
        Ok(splice_member(
            code,
            index,
            range_start,
            plan,
            found.substitute,
            substitute_owner,
        ))
    }
}

/// Method and (if known) source line of a call site, for log messages
fn describe_site(method_name: &str, line: Option<u16>) -> String {
    match line {
        Some(line) => format!("{} (line {})", method_name, line),
        None => method_name.to_owned(),
    }
}

/// Constructors call the constructor of their super class (or another constructor of the same
/// class) without any `new`, so those are expected to go unmatched
fn report_unresolved(
    method_name: &str,
    line: Option<u16>,
    call: &Call,
    reason: Unresolved,
    in_constructor: bool,
) {
    let site = describe_site(method_name, line);
    if in_constructor && reason == Unresolved::MissingConstruction {
        log::debug!("{}: call to {} is not a construction", site, call);
    } else {
        log::warn!("{}: leaving call to {} untouched, {}", site, call, reason);
    }
}
