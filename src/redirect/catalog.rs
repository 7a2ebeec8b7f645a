use super::Error;
use crate::jvm::{
    BinaryName, FieldType, MethodDescriptor, Name, ParseDescriptor, RenderDescriptor,
    UnqualifiedName,
};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Substitute for calls to one method (or for constructions of one type, if `name` is `<init>`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Substitute {
    /// Class owning the original method
    pub owner: BinaryName,

    /// Name of the original method
    pub name: UnqualifiedName,

    /// Descriptor of the original method
    pub original_descriptor: MethodDescriptor<BinaryName>,

    /// Name of the static substitute method
    pub substitute_name: UnqualifiedName,

    /// Descriptor of the static substitute method
    ///
    /// For constructions, this takes the constructor arguments and returns the constructed type.
    /// For instance methods, this may take the receiver as an extra leading parameter. For static
    /// methods, this may take an extra leading reference, which will always be `null`.
    pub substitute_descriptor: MethodDescriptor<BinaryName>,
}

impl Substitute {
    /// Does this substitute object constructions (as opposed to method calls)?
    pub fn is_construction(&self) -> bool {
        self.name == UnqualifiedName::INIT
    }
}

/// Substitutes, indexed for lookup by call site
///
/// Constructions are keyed by the constructed type and the constructor descriptor, everything
/// else by owner, name, and descriptor. When two substitutes share a key, the first one wins.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    substitutes: Vec<Substitute>,
    members: HashMap<(String, String, String), usize>,
    constructions: HashMap<(String, String), usize>,
}

impl Catalog {
    pub fn new(substitutes: impl IntoIterator<Item = Substitute>) -> Catalog {
        let mut catalog = Catalog::default();
        for substitute in substitutes {
            catalog.insert(substitute);
        }
        catalog
    }

    /// Register a substitute, unless one is already registered for the same call sites
    ///
    /// Returns whether the substitute was registered.
    pub fn insert(&mut self, substitute: Substitute) -> bool {
        let index = self.substitutes.len();
        let owner = substitute.owner.as_str().to_owned();
        let descriptor = substitute.original_descriptor.render();
        let existing = if substitute.is_construction() {
            *self.constructions.entry((owner, descriptor)).or_insert(index)
        } else {
            let name = substitute.name.as_str().to_owned();
            *self.members.entry((owner, name, descriptor)).or_insert(index)
        };

        if existing == index {
            self.substitutes.push(substitute);
            true
        } else {
            log::warn!(
                "Ignoring substitute {} for {}.{}{} (already substituted by {})",
                substitute.substitute_name,
                substitute.owner,
                substitute.name,
                substitute.original_descriptor.render(),
                self.substitutes[existing].substitute_name,
            );
            false
        }
    }

    /// Parse the text form of a catalog
    ///
    /// Each non-empty line holds five fields separated by whitespace: the owner, name, and
    /// descriptor of the original method, then the name and descriptor of the substitute. Lines
    /// starting with `#` are comments.
    ///
    /// ```text
    /// com/example/Db    query   (Ljava/lang/String;)I  query  (Lcom/example/Db;Ljava/lang/String;)I
    /// com/example/Conn  <init>  (I)V                   conn   (I)Lcom/example/Conn;
    /// ```
    pub fn parse(text: &str) -> Result<Catalog, Error> {
        let mut catalog = Catalog::default();
        for (line_index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let substitute = parse_line(line).map_err(|message| Error::MalformedCatalog {
                line: line_index + 1,
                message,
            })?;
            catalog.insert(substitute);
        }
        Ok(catalog)
    }

    /// Read and parse a catalog file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Catalog, Error> {
        let text = fs::read_to_string(path)?;
        Catalog::parse(&text)
    }

    /// Number of registered substitutes
    pub fn len(&self) -> usize {
        self.substitutes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.substitutes.is_empty()
    }

    pub fn substitutes(&self) -> &[Substitute] {
        &self.substitutes
    }

    /// Substitute for a method call
    pub fn member(&self, owner: &str, name: &str, descriptor: &str) -> Option<&Substitute> {
        let key = (owner.to_owned(), name.to_owned(), descriptor.to_owned());
        self.members.get(&key).map(|index| &self.substitutes[*index])
    }

    /// Substitute for a construction of `owner` through the constructor with this descriptor
    pub fn construction(&self, owner: &str, descriptor: &str) -> Option<&Substitute> {
        let key = (owner.to_owned(), descriptor.to_owned());
        self.constructions
            .get(&key)
            .map(|index| &self.substitutes[*index])
    }
}

fn parse_line(line: &str) -> Result<Substitute, String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let (owner, name, original, substitute_name, substitute) = match fields.as_slice() {
        [owner, name, original, substitute_name, substitute] => {
            (*owner, *name, *original, *substitute_name, *substitute)
        }
        _ => return Err(format!("expected 5 fields, found {}", fields.len())),
    };

    let owner = BinaryName::from_string(owner.to_owned())?;
    let name = UnqualifiedName::from_string(name.to_owned())?;
    let substitute_name = UnqualifiedName::from_string(substitute_name.to_owned())?;
    if substitute_name == UnqualifiedName::INIT || substitute_name == UnqualifiedName::CLINIT {
        return Err(format!("substitute cannot be named '{}'", substitute_name));
    }
    let original_descriptor = MethodDescriptor::parse(original)
        .map_err(|err| format!("bad descriptor '{}': {}", original, err))?;
    let substitute_descriptor = MethodDescriptor::parse(substitute)
        .map_err(|err| format!("bad descriptor '{}': {}", substitute, err))?;

    let substitute = Substitute {
        owner,
        name,
        original_descriptor,
        substitute_name,
        substitute_descriptor,
    };
    if substitute.is_construction() {
        check_construction(&substitute)?;
    }
    Ok(substitute)
}

/// Substitute constructions take the constructor arguments and return the constructed type
fn check_construction(substitute: &Substitute) -> Result<(), String> {
    let expected = substitute
        .original_descriptor
        .returning(Some(FieldType::object(substitute.owner.clone())));
    if substitute.original_descriptor.return_type.is_some() {
        Err(String::from("constructors must return void"))
    } else if substitute.substitute_descriptor != expected {
        Err(format!(
            "substitute for constructor should have descriptor '{}'",
            expected.render()
        ))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const CATALOG: &str = "
        # owner            name    original               substitute  descriptor
        com/example/Db     query   (Ljava/lang/String;)I  query       (Lcom/example/Db;Ljava/lang/String;)I
        com/example/Conn   <init>  (I)V                   conn        (I)Lcom/example/Conn;

        com/example/Db     query   (Ljava/lang/String;)I  other       (Ljava/lang/String;)I
    ";

    #[test]
    fn parse_and_lookup() {
        let catalog = Catalog::parse(CATALOG).unwrap();
        assert_eq!(catalog.len(), 2);

        let query = catalog
            .member("com/example/Db", "query", "(Ljava/lang/String;)I")
            .unwrap();
        assert_eq!(query.substitute_name.as_str(), "query");
        assert!(!query.is_construction());
        assert!(catalog.member("com/example/Db", "query", "()I").is_none());

        let conn = catalog.construction("com/example/Conn", "(I)V").unwrap();
        assert!(conn.is_construction());
        assert_eq!(conn.substitute_descriptor.render(), "(I)Lcom/example/Conn;");
        assert!(catalog.member("com/example/Conn", "<init>", "(I)V").is_none());
    }

    #[test]
    fn first_registration_wins() {
        let catalog = Catalog::parse(CATALOG).unwrap();
        let query = catalog
            .member("com/example/Db", "query", "(Ljava/lang/String;)I")
            .unwrap();
        assert_eq!(query.substitute_name.as_str(), "query");
        let duplicate = query.clone();

        let mut catalog = catalog;
        assert!(!catalog.insert(duplicate));
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn malformed_lines() {
        let line_of = |text: &str| match Catalog::parse(text) {
            Err(Error::MalformedCatalog { line, .. }) => line,
            other => panic!("expected malformed catalog, got {:?}", other),
        };
        assert_eq!(line_of("a/B foo ()V bar"), 1);
        assert_eq!(line_of("\n\na/B foo (V bar ()V"), 3);
        assert_eq!(line_of("a.B foo ()V bar ()V"), 1);
        assert_eq!(line_of("a/B foo ()V <init> ()V"), 1);
        assert_eq!(line_of("a/B <init> (I)V make (I)La/C;"), 1);
        assert_eq!(line_of("a/B <init> (I)I make (I)La/B;"), 1);
    }
}
