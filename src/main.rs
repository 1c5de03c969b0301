use medialib::{import, Category, Library, LibraryConfig, Result};
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage:
    medialib import <folder> [category]   import every file below <folder>
    medialib list                          list media files, newest first
    medialib categories                    list categories

The configuration file is read from $MEDIALIB_CONFIG when set.";

fn main() -> ExitCode {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match args.first().map(String::as_str) {
        Some("import") if args.len() == 2 || args.len() == 3 => Command::Import {
            folder: &args[1],
            category: args.get(2).map(String::as_str),
        },
        Some("list") if args.len() == 1 => Command::List,
        Some("categories") if args.len() == 1 => Command::Categories,
        _ => {
            eprintln!("{USAGE}");
            return ExitCode::from(2);
        }
    };

    match run(command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

enum Command<'a> {
    Import {
        folder: &'a str,
        category: Option<&'a str>,
    },
    List,
    Categories,
}

fn run(command: Command<'_>) -> Result<()> {
    let config = LibraryConfig::from_env()?;
    let library = Library::open(&config)?;

    match command {
        Command::Import { folder, category } => {
            let category = category
                .map(|title| root_category(&library, title))
                .transpose()?;
            let result = import::import_folder(&library, Path::new(folder), category.as_ref())?;
            println!(
                "Import complete! Added {} files, {} failed.",
                result.imported_count, result.failed_count
            );
        }
        Command::List => {
            for file in library.media_files()? {
                let created = file
                    .created
                    .map(|c| c.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                let size = file.file_size.map(|s| s.to_string()).unwrap_or_else(|| "?".into());
                println!(
                    "{:>5}  {:<6} {:>10}  {}  {}  {}",
                    file.id.unwrap_or_default(),
                    file.file_type,
                    size,
                    created,
                    file.display_name(library.default_language(), library.default_language()),
                    file.absolute_url(library.storage()),
                );
            }
        }
        Command::Categories => {
            for category in library.categories()? {
                println!(
                    "{:>5}  {}  ({})",
                    category.id.unwrap_or_default(),
                    category.path(),
                    category.slug
                );
            }
        }
    }
    Ok(())
}

/// Find a root category by title, creating it when missing
fn root_category(library: &Library, title: &str) -> Result<Category> {
    let existing = library
        .categories()?
        .into_iter()
        .find(|c| c.is_root() && c.title == title);
    match existing {
        Some(category) => Ok(category),
        None => {
            let mut category = Category::new(title);
            library.save_category(&mut category)?;
            Ok(category)
        }
    }
}
