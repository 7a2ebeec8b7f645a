use super::Method;
use crate::jvm::class_file::{ClassFile, Field};
use crate::jvm::{ClassAccessFlags, Error, FieldAccessFlags};

/// Class with decoded methods
#[derive(Debug)]
pub struct Class {
    /// Underlying class file (its methods are only updated in [`Class::into_class_file`])
    pub class_file: ClassFile,

    /// Methods, in the same order as in the class file
    pub methods: Vec<Method>,
}

impl Class {
    /// Decode all of the methods of a class file
    pub fn from_class_file(class_file: ClassFile) -> Result<Class, Error> {
        let methods = class_file
            .methods
            .iter()
            .map(|method| Method::decode(method, &class_file.constants))
            .collect::<Result<Vec<_>, Error>>()?;
        Ok(Class {
            class_file,
            methods,
        })
    }

    /// Parse and decode a class from bytes
    pub fn parse(bytes: &[u8]) -> Result<Class, Error> {
        Class::from_class_file(ClassFile::parse(bytes)?)
    }

    /// Binary name of the class
    pub fn name(&self) -> Result<&str, Error> {
        self.class_file.this_class_name()
    }

    /// Does the class declare a field with this name and descriptor?
    pub fn has_field(&self, name: &str, descriptor: &str) -> Result<bool, Error> {
        let constants = &self.class_file.constants;
        for field in &self.class_file.fields {
            if constants.utf8(field.name_index)? == name
                && constants.utf8(field.descriptor_index)? == descriptor
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Add a field with no attributes, used to recognize the class later on
    ///
    /// Interfaces can only have `public static final` fields, everything else gets a `private`
    /// instance field.
    pub fn add_marker_field(&mut self, name: &str, descriptor: &str) -> Result<(), Error> {
        let access_flags = if self
            .class_file
            .access_flags
            .contains(ClassAccessFlags::INTERFACE)
        {
            FieldAccessFlags::PUBLIC | FieldAccessFlags::STATIC | FieldAccessFlags::FINAL
        } else {
            FieldAccessFlags::PRIVATE
        };
        let name_index = self.class_file.constants.get_utf8(name)?;
        let descriptor_index = self.class_file.constants.get_utf8(descriptor)?;
        self.class_file.fields.push(Field {
            access_flags,
            name_index,
            descriptor_index,
            attributes: vec![],
        });
        Ok(())
    }

    /// Has the code of any method been modified?
    pub fn is_modified(&self) -> bool {
        self.methods.iter().any(|method| method.modified)
    }

    /// Write modified method bodies back into the class file
    pub fn into_class_file(self) -> Result<ClassFile, Error> {
        let Class {
            mut class_file,
            methods,
        } = self;
        for (method, raw) in methods.iter().zip(class_file.methods.iter_mut()) {
            method.encode_into(raw, &mut class_file.constants)?;
        }
        Ok(class_file)
    }
}
