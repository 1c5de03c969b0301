use medialib::media::filetype::{self, FileType, FileTypeRegistry, Matcher};
use medialib::{FileSystemStorage, Library, MediaError};

// Runs as its own test binary: the process-wide registry can be installed once.
#[test]
fn configured_registry_is_used_by_new_libraries() {
    let mut registry = FileTypeRegistry::with_defaults();
    let raw = Matcher::pattern(r"\.(nef|cr2|arw|dng)$").unwrap();
    registry
        .register(vec![FileType::new("raw", "Camera RAW", raw)])
        .unwrap();
    filetype::configure(registry).unwrap();

    let again = filetype::configure(FileTypeRegistry::with_defaults());
    assert!(matches!(again, Err(MediaError::Config(_))));

    assert_eq!(filetype::global().determine("DSC_0001.NEF"), "raw");
    assert_eq!(filetype::global().choices()[0], ("raw", "Camera RAW"));

    let dir = tempfile::tempdir().unwrap();
    let library = Library::open_in_memory(FileSystemStorage::new(dir.path(), "/media/")).unwrap();
    let mut file = library.upload("DSC_0001.NEF", b"raw sensor dump").unwrap();
    library.save_media_file(&mut file).unwrap();
    assert_eq!(file.file_type, "raw");
    assert_eq!(file.type_label(library.filetypes()), Some("Camera RAW"));
}
