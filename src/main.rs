use callswap::jvm;
use callswap::jvm::model::Class;
use callswap::redirect::{Catalog, ClassTransformer, Error, Settings};

use clap::{crate_version, value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::{Path, PathBuf};

fn main() -> Result<(), Error> {
    env_logger::init();
    run(&command().get_matches())
}

fn command() -> Command {
    Command::new("callswap")
        .version(crate_version!())
        .author("Alec Theriault <alec.theriault@gmail.com>")
        .about("Redirects call sites in compiled JVM classes to substitute methods")
        .arg(
            Arg::new("catalog")
                .long("catalog")
                .value_name("FILE")
                .required(true)
                .action(ArgAction::Append)
                .value_parser(value_parser!(PathBuf))
                .help("Catalog of substitutes, one per line (may be repeated)"),
        )
        .arg(
            Arg::new("substitute class")
                .long("substitute-class")
                .value_name("CLASS_NAME")
                .help("Class holding all substitutes (eg. `com/example/Doubles`)"),
        )
        .arg(
            Arg::new("substitute suffix")
                .long("substitute-suffix")
                .value_name("SUFFIX")
                .help("Suffix appended to a class name to get its substitute class [default: Test]"),
        )
        .arg(
            Arg::new("marker field")
                .long("marker-field")
                .value_name("NAME")
                .help("Name of the field marking transformed classes [default: __callswap]"),
        )
        .arg(
            Arg::new("output directory")
                .long("output-dir")
                .value_name("DIRECTORY")
                .value_parser(value_parser!(PathBuf))
                .help("Write transformed classes here instead of overwriting the inputs"),
        )
        .arg(
            Arg::new("CLASS_FILE")
                .help("Class files to transform")
                .required(true)
                .num_args(1..)
                .action(ArgAction::Append)
                .value_parser(value_parser!(PathBuf)),
        )
}

fn run(matches: &ArgMatches) -> Result<(), Error> {
    let mut settings = Settings::new();
    if let Some(class_name) = matches.get_one::<String>("substitute class") {
        settings = settings.with_substitute_class(class_name.as_str())?;
    }
    if let Some(suffix) = matches.get_one::<String>("substitute suffix") {
        settings = settings.with_substitute_class_suffix(suffix.as_str())?;
    }
    if let Some(name) = matches.get_one::<String>("marker field") {
        settings = settings.with_marker_field_name(name.as_str())?;
    }

    let mut catalog = Catalog::default();
    for path in matches.get_many::<PathBuf>("catalog").into_iter().flatten() {
        log::info!("Reading catalog '{}'", path.display());
        for substitute in Catalog::from_path(path)?.substitutes() {
            catalog.insert(substitute.clone());
        }
    }
    log::info!("Loaded {} substitutes", catalog.len());

    let transformer = ClassTransformer::new(settings, catalog);
    let output_directory = matches.get_one::<PathBuf>("output directory");
    for class_path in matches.get_many::<PathBuf>("CLASS_FILE").into_iter().flatten() {
        transform_file(&transformer, class_path, output_directory.map(PathBuf::as_path))?;
    }

    Ok(())
}

/// Transform one class file, writing it back out if anything changed
fn transform_file(
    transformer: &ClassTransformer,
    class_path: &Path,
    output_directory: Option<&Path>,
) -> Result<(), Error> {
    log::info!("Reading and transforming '{}'", class_path.display());
    let mut class = Class::from_class_file(jvm::class_file::ClassFile::from_path(class_path)?)?;
    let report = transformer.transform_class(&mut class)?;
    for event in report.unresolved() {
        log::info!("{}: {}", report.class_name, event);
    }
    if !class.is_modified() {
        log::info!("Nothing to change in '{}'", report.class_name);
        return Ok(());
    }

    let output_path = match output_directory {
        Some(directory) => directory.join(format!("{}.class", report.class_name)),
        None => class_path.to_owned(),
    };
    log::info!(
        "Writing '{}' ({} call sites substituted)",
        output_path.display(),
        report.substituted()
    );
    class.into_class_file()?.save_to_path(&output_path, true)?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn catalogs_are_required_and_repeatable() {
        assert!(command()
            .try_get_matches_from(["callswap", "A.class"])
            .is_err());

        let matches = command()
            .try_get_matches_from([
                "callswap",
                "--catalog",
                "db.txt",
                "--catalog",
                "net.txt",
                "A.class",
                "B.class",
            ])
            .unwrap();
        let catalogs: Vec<&PathBuf> = matches.get_many("catalog").unwrap().collect();
        assert_eq!(catalogs, [&PathBuf::from("db.txt"), &PathBuf::from("net.txt")]);
        assert_eq!(matches.get_many::<PathBuf>("CLASS_FILE").unwrap().count(), 2);
    }

    #[test]
    fn cli_is_well_formed() {
        command().debug_assert();
    }
}
