use crate::jvm::class_file::{self, AttributeLike, ConstantsPool};
use crate::jvm::code::Code;
use crate::jvm::{BinaryName, Error, MethodAccessFlags, MethodDescriptor, ParseDescriptor};

/// Method of a class, with its body decoded
#[derive(Debug, Clone)]
pub struct Method {
    pub name: String,
    pub descriptor: MethodDescriptor<BinaryName>,
    pub access_flags: MethodAccessFlags,

    /// Body of the method (`None` for abstract and native methods)
    pub code: Option<Code>,

    /// Set when `code` has been changed and needs to be encoded again
    pub modified: bool,

    /// Position of the `Code` attribute among the method's attributes
    code_attribute: Option<usize>,
}

impl Method {
    /// Decode a method, along with its code
    pub fn decode(method: &class_file::Method, constants: &ConstantsPool) -> Result<Method, Error> {
        let name = constants.utf8(method.name_index)?.to_owned();
        let descriptor = constants.utf8(method.descriptor_index)?;
        let descriptor = MethodDescriptor::parse(descriptor)
            .map_err(|_| Error::BadDescriptor(descriptor.to_owned()))?;

        let mut code = None;
        let mut code_attribute = None;
        for (index, attribute) in method.attributes.iter().enumerate() {
            if attribute.name(constants)? == class_file::Code::NAME {
                let raw = attribute.decode::<class_file::Code>()?;
                code = Some(Code::decode(&raw, constants)?);
                code_attribute = Some(index);
                break;
            }
        }

        Ok(Method {
            name,
            descriptor,
            access_flags: method.access_flags,
            code,
            modified: false,
            code_attribute,
        })
    }

    /// Write modified code back into the class file method
    ///
    /// Methods that have not been modified are left alone, so their code stays byte for byte the
    /// same.
    pub(super) fn encode_into(
        &self,
        method: &mut class_file::Method,
        constants: &mut ConstantsPool,
    ) -> Result<(), Error> {
        if !self.modified {
            return Ok(());
        }
        if let (Some(code), Some(position)) = (&self.code, self.code_attribute) {
            let encoded = code.encode(constants)?;
            method.attributes[position] = constants.get_attribute(&encoded)?;
        }
        Ok(())
    }
}
