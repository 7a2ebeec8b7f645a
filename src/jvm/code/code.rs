use super::decode::decode_instructions;
use super::encode::{emit, Layout};
use super::{Insn, Label};
use crate::jvm::class_file::{
    self, Attribute, AttributeLike, ClassConstantIndex, ConstantsPool, ExceptionHandler,
    FrameKind, LineNumber, LineNumberTable, LocalVariable, LocalVariableTable,
    LocalVariableTypeTable, StackMapFrame, StackMapTable, Utf8ConstantIndex, VerificationType,
};
use crate::jvm::Error;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Decoded body of a method
///
/// Everything that refers to a position in the byte code refers to a [`Label`] in
/// `instructions` instead, so instructions can be added or removed without invalidating
/// handlers, debug tables, or stack map frames.
#[derive(Debug, Clone, PartialEq)]
pub struct Code {
    pub max_stack: u16,
    pub max_locals: u16,
    pub instructions: Vec<Insn>,
    pub exception_handlers: Vec<Handler>,
    pub local_variables: Vec<LocalRange>,
    pub frames: Vec<Frame>,

    /// Attributes of the `Code` attribute which are carried over unchanged
    pub attributes: Vec<Attribute>,
}

/// Entry in the exception table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handler {
    pub start: Label,
    pub end: Label,
    pub handler: Label,
    pub catch_type: ClassConstantIndex,
}

/// Entry in the local variable table or local variable type table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalRange {
    pub start: Label,
    pub end: Label,
    pub name_index: Utf8ConstantIndex,
    pub descriptor_index: Utf8ConstantIndex,
    pub index: u16,

    /// Entry comes from `LocalVariableTypeTable` (so `descriptor_index` is a signature)
    pub typed: bool,
}

/// Stack map frame, positioned at a label instead of an offset delta
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub label: Label,
    pub kind: FrameKind<Label>,
}

/// Type annotations refer to raw offsets which we don't track
const DROPPED_ATTRIBUTES: [&str; 2] = [
    "RuntimeVisibleTypeAnnotations",
    "RuntimeInvisibleTypeAnnotations",
];

/// Offsets which instructions start at, and the ones among those that need a label
struct Labeller {
    boundaries: HashSet<usize>,
    used: BTreeSet<usize>,
}

impl Labeller {
    fn label(&mut self, offset: usize) -> Result<Label, Error> {
        if self.boundaries.contains(&offset) {
            self.used.insert(offset);
            Ok(Label(offset as u32))
        } else {
            Err(Error::BadCodeOffset(offset))
        }
    }
}

impl Code {
    /// Code with no handlers, debug tables, or frames
    pub fn from_instructions(max_stack: u16, max_locals: u16, instructions: Vec<Insn>) -> Code {
        Code {
            max_stack,
            max_locals,
            instructions,
            exception_handlers: vec![],
            local_variables: vec![],
            frames: vec![],
            attributes: vec![],
        }
    }

    /// Decode the body of a method
    pub fn decode(code: &class_file::Code, constants: &ConstantsPool) -> Result<Code, Error> {
        let code_length = code.code_array.len();
        let decoded = decode_instructions(&code.code_array, constants)?;

        let mut labeller = Labeller {
            boundaries: decoded
                .iter()
                .map(|(offset, _)| *offset)
                .chain(std::iter::once(code_length))
                .collect(),
            used: BTreeSet::new(),
        };

        for (_, insn) in &decoded {
            if let Insn::Branch(branch) = insn {
                for target in branch.jump_targets() {
                    labeller.label(target.0 as usize)?;
                }
            }
        }

        let mut exception_handlers = vec![];
        for handler in &code.exception_table {
            exception_handlers.push(Handler {
                start: labeller.label(handler.start_pc as usize)?,
                end: labeller.label(handler.end_pc as usize)?,
                handler: labeller.label(handler.handler_pc as usize)?,
                catch_type: handler.catch_type,
            });
        }

        let mut lines: BTreeMap<usize, Vec<u16>> = BTreeMap::new();
        let mut local_variables = vec![];
        let mut frames = vec![];
        let mut attributes = vec![];
        for attribute in &code.attributes {
            let name = attribute.name(constants)?;
            if name == LineNumberTable::NAME {
                for line in attribute.decode::<LineNumberTable>()?.0 {
                    let offset = line.start_pc as usize;
                    if offset < code_length && labeller.boundaries.contains(&offset) {
                        lines.entry(offset).or_default().push(line.line_number);
                    } else {
                        log::debug!("Dropping line {} at offset {}", line.line_number, offset);
                    }
                }
            } else if name == LocalVariableTable::NAME {
                for local in attribute.decode::<LocalVariableTable>()?.0 {
                    local_variables.push(LocalRange::decode(&local, false, &mut labeller)?);
                }
            } else if name == LocalVariableTypeTable::NAME {
                for local in attribute.decode::<LocalVariableTypeTable>()?.0 {
                    local_variables.push(LocalRange::decode(&local, true, &mut labeller)?);
                }
            } else if name == StackMapTable::NAME {
                let mut previous: Option<usize> = None;
                for frame in attribute.decode::<StackMapTable>()?.0 {
                    let offset = match previous {
                        None => frame.offset_delta as usize,
                        Some(previous) => previous + frame.offset_delta as usize + 1,
                    };
                    previous = Some(offset);
                    let label = labeller.label(offset)?;
                    let kind = frame
                        .kind
                        .try_map(|uninitialized| labeller.label(uninitialized as usize))?;
                    frames.push(Frame { label, kind });
                }
            } else if DROPPED_ATTRIBUTES.contains(&name) {
                log::debug!("Dropping {} attribute of code", name);
            } else {
                attributes.push(attribute.clone());
            }
        }

        let mut instructions = Vec::with_capacity(decoded.len() + labeller.used.len());
        for (offset, insn) in decoded {
            if labeller.used.contains(&offset) {
                instructions.push(Insn::Label(Label(offset as u32)));
            }
            if let Some(lines) = lines.get(&offset) {
                instructions.extend(lines.iter().map(|line| Insn::LineMarker(*line)));
            }
            instructions.push(insn);
        }
        if labeller.used.contains(&code_length) {
            instructions.push(Insn::Label(Label(code_length as u32)));
        }

        Ok(Code {
            max_stack: code.max_stack,
            max_locals: code.max_locals,
            instructions,
            exception_handlers,
            local_variables,
            frames,
            attributes,
        })
    }

    /// Encode the method body, adding any constants needed to the pool
    pub fn encode(&self, constants: &mut ConstantsPool) -> Result<class_file::Code, Error> {
        let layout = Layout::compute(&self.instructions);
        if layout.code_length > u16::MAX as usize {
            return Err(Error::MethodCodeOverflow(layout.code_length));
        }
        let code_array = emit(&self.instructions, &layout, constants)?;

        // All offsets fit in `u16` since the code length does
        let pc = |label: Label| -> Result<u16, Error> { Ok(layout.offset(label)? as u16) };

        let exception_table = self
            .exception_handlers
            .iter()
            .map(|handler| {
                Ok(ExceptionHandler {
                    start_pc: pc(handler.start)?,
                    end_pc: pc(handler.end)?,
                    handler_pc: pc(handler.handler)?,
                    catch_type: handler.catch_type,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let mut attributes = vec![];

        let line_numbers: Vec<LineNumber> = self
            .instructions
            .iter()
            .zip(&layout.offsets)
            .filter_map(|(insn, offset)| match insn {
                Insn::LineMarker(line) if *offset < layout.code_length => Some(LineNumber {
                    start_pc: *offset as u16,
                    line_number: *line,
                }),
                _ => None,
            })
            .collect();
        if !line_numbers.is_empty() {
            attributes.push(constants.get_attribute(&LineNumberTable(line_numbers))?);
        }

        let mut locals = vec![];
        let mut typed_locals = vec![];
        for local in &self.local_variables {
            let start_pc = pc(local.start)?;
            let entry = LocalVariable {
                start_pc,
                length: pc(local.end)?.saturating_sub(start_pc),
                name_index: local.name_index,
                descriptor_index: local.descriptor_index,
                index: local.index,
            };
            if local.typed {
                typed_locals.push(entry);
            } else {
                locals.push(entry);
            }
        }
        if !locals.is_empty() {
            attributes.push(constants.get_attribute(&LocalVariableTable(locals))?);
        }
        if !typed_locals.is_empty() {
            attributes.push(constants.get_attribute(&LocalVariableTypeTable(typed_locals))?);
        }

        if !self.frames.is_empty() {
            let mut encoded = vec![];
            let mut previous: Option<u16> = None;
            for frame in &self.frames {
                let offset = pc(frame.label)?;
                let offset_delta = match previous {
                    None => offset,
                    Some(previous) if offset > previous => offset - previous - 1,
                    Some(_) => return Err(Error::FrameOrder(offset as usize)),
                };
                previous = Some(offset);
                let kind = frame.kind.clone().try_map(pc)?;
                encoded.push(StackMapFrame { offset_delta, kind });
            }
            attributes.push(constants.get_attribute(&StackMapTable(encoded))?);
        }

        attributes.extend(self.attributes.iter().cloned());

        Ok(class_file::Code {
            max_stack: self.max_stack,
            max_locals: self.max_locals,
            code_array,
            exception_table,
            attributes,
        })
    }

    /// Source line of the instruction at this index, if known
    pub fn line_before(&self, index: usize) -> Option<u16> {
        self.instructions[..index.min(self.instructions.len())]
            .iter()
            .rev()
            .find_map(|insn| match insn {
                Insn::LineMarker(line) => Some(*line),
                _ => None,
            })
    }

    /// Labels at which control flow may enter or leave straight-line code: jump targets, the
    /// boundaries of exception handler ranges, and the positions of stack map frames
    pub fn control_flow_labels(&self) -> HashSet<Label> {
        let mut labels = HashSet::new();
        for insn in &self.instructions {
            if let Insn::Branch(branch) = insn {
                labels.extend(branch.jump_targets());
            }
        }
        for handler in &self.exception_handlers {
            labels.extend([handler.start, handler.end, handler.handler]);
        }
        labels.extend(self.frames.iter().map(|frame| frame.label));
        labels
    }

    /// Forget about the object created by the `new` at `label`, after that `new` instruction has
    /// been removed
    ///
    /// Stack entries referring to the object are dropped and locals are turned into `Top`.
    pub fn forget_uninitialized(&mut self, label: Label) {
        let is_target = |typ: &VerificationType<Label>| *typ == VerificationType::Uninitialized(label);
        let forget = |typ: VerificationType<Label>| {
            if is_target(&typ) {
                VerificationType::Top
            } else {
                typ
            }
        };
        for frame in &mut self.frames {
            if let FrameKind::SameLocalsOneStack(typ) = &frame.kind {
                if is_target(typ) {
                    frame.kind = FrameKind::Same;
                    continue;
                }
            }
            match &mut frame.kind {
                FrameKind::Append(locals) => {
                    for local in locals.iter_mut() {
                        *local = forget(*local);
                    }
                }
                FrameKind::Full { locals, stack } => {
                    for local in locals.iter_mut() {
                        *local = forget(*local);
                    }
                    stack.retain(|typ| !is_target(typ));
                }
                _ => (),
            }
        }
    }
}

impl LocalRange {
    fn decode(local: &LocalVariable, typed: bool, labeller: &mut Labeller) -> Result<LocalRange, Error> {
        let start = local.start_pc as usize;
        Ok(LocalRange {
            start: labeller.label(start)?,
            end: labeller.label(start + local.length as usize)?,
            name_index: local.name_index,
            descriptor_index: local.descriptor_index,
            index: local.index,
            typed,
        })
    }
}
