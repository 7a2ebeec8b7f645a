use super::Error;
use crate::jvm::{BinaryName, FieldType, Name, RenderDescriptor, UnqualifiedName};

#[derive(Debug, Clone)]
pub struct Settings {
    /// Suffix appended to the name of a class to get the class holding its substitutes (eg.
    /// `Test`, so that substitutes for `my/pkg/Service` live in `my/pkg/ServiceTest`)
    pub substitute_class_suffix: UnqualifiedName,

    /// Class holding all substitutes, regardless of the class being transformed
    ///
    /// When this is set, `substitute_class_suffix` is ignored.
    pub substitute_class: Option<BinaryName>,

    /// Name of the field added to transformed classes
    pub marker_field_name: UnqualifiedName,

    /// Type of the field added to transformed classes
    pub marker_field_type: FieldType<BinaryName>,
}

fn make_name<N: Name>(name: impl Into<String>) -> Result<N, Error> {
    N::from_string(name.into()).map_err(Error::MalformedName)
}

impl Settings {
    pub fn new() -> Settings {
        Settings {
            substitute_class_suffix: UnqualifiedName::TEST,
            substitute_class: None,
            marker_field_name: UnqualifiedName::CALLSWAP_MARKER,
            marker_field_type: FieldType::int(),
        }
    }

    /// Use one class (written as `my/pkg/Substitutes`) for all substitutes
    pub fn with_substitute_class(mut self, class_name: impl Into<String>) -> Result<Settings, Error> {
        self.substitute_class = Some(make_name(class_name)?);
        Ok(self)
    }

    pub fn with_substitute_class_suffix(mut self, suffix: impl Into<String>) -> Result<Settings, Error> {
        self.substitute_class_suffix = make_name(suffix)?;
        Ok(self)
    }

    pub fn with_marker_field_name(mut self, name: impl Into<String>) -> Result<Settings, Error> {
        self.marker_field_name = make_name(name)?;
        Ok(self)
    }

    /// Class holding the substitutes used by the given class
    pub fn substitute_owner(&self, class_name: &str) -> Result<BinaryName, Error> {
        match &self.substitute_class {
            Some(class) => Ok(class.clone()),
            None => {
                let class: BinaryName = make_name(class_name)?;
                Ok(class.concat(&self.substitute_class_suffix))
            }
        }
    }

    /// Descriptor of the marker field
    pub fn marker_field_descriptor(&self) -> String {
        self.marker_field_type.render()
    }
}

impl Default for Settings {
    fn default() -> Settings {
        Settings::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn substitute_owner() {
        let settings = Settings::new();
        assert_eq!(
            settings.substitute_owner("com/example/Service").unwrap().as_str(),
            "com/example/ServiceTest"
        );
        assert!(settings.substitute_owner("com//Service").is_err());

        let settings = settings.with_substitute_class("com/example/Doubles").unwrap();
        assert_eq!(
            settings.substitute_owner("com/example/Service").unwrap().as_str(),
            "com/example/Doubles"
        );
    }

    #[test]
    fn names_are_validated() {
        assert!(matches!(
            Settings::new().with_marker_field_name("a.b"),
            Err(Error::MalformedName(_))
        ));
        assert!(Settings::new().with_substitute_class_suffix("Mock").is_ok());
        assert!(Settings::new().with_substitute_class_suffix("").is_err());
        assert_eq!(Settings::new().marker_field_descriptor(), "I");
        assert_eq!(Settings::new().marker_field_name.as_str(), "__callswap");
    }
}
