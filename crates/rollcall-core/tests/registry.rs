use rollcall_core::{Frame, Registry, RegistryError, ValidationError};
use std::fs;

fn dir_count(path: &std::path::Path) -> usize {
    fs::read_dir(path)
        .map(|entries| entries.filter_map(Result::ok).filter(|e| e.path().is_dir()).count())
        .unwrap_or(0)
}

#[test]
fn blank_names_are_rejected_without_directories() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::new(dir.path().join("FaceData"));

    for name in ["", "   ", "\t\n"] {
        let err = registry.register(name).unwrap_err();
        assert!(matches!(err, RegistryError::Invalid(ValidationError::EmptyName)));
    }
    assert_eq!(dir_count(registry.root()), 0);
    assert!(!registry.has_any().unwrap());
}

#[test]
fn registered_name_lists_in_display_form() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::new(dir.path().join("FaceData"));

    let identity = registry.register("  Ann Lee ").unwrap();
    assert_eq!(identity.name, "Ann Lee");
    assert_eq!(identity.key, "Ann_Lee");
    assert!(registry.root().join("Ann_Lee").is_dir());

    assert_eq!(registry.list().unwrap(), vec!["Ann Lee"]);
    assert!(registry.has_any().unwrap());
}

#[test]
fn reregistering_reuses_the_directory() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::new(dir.path().join("FaceData"));

    let first = registry.register("Ann Lee").unwrap();
    let second = registry.register("Ann   Lee").unwrap();
    assert_eq!(first, second);
    assert_eq!(dir_count(registry.root()), 1);
}

#[test]
fn missing_root_lists_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::new(dir.path().join("nope"));
    assert!(registry.list().unwrap().is_empty());
    assert!(!registry.has_any().unwrap());
}

#[test]
fn list_ignores_plain_files_and_sorts() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::new(dir.path());
    registry.register("Cara").unwrap();
    registry.register("Bob").unwrap();
    fs::write(dir.path().join("notes.txt"), "not a person").unwrap();

    assert_eq!(registry.list().unwrap(), vec!["Bob", "Cara"]);
}

#[test]
fn reference_images_are_indexed_sequentially() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::new(dir.path());
    let identity = registry.register("Alice").unwrap();
    let frame = Frame::filled(32, 24, 90);

    let first = registry.save_reference(&identity, &frame).unwrap();
    let second = registry.save_reference(&identity, &frame).unwrap();
    assert!(first.ends_with("Alice/face_0.jpg"));
    assert!(second.ends_with("Alice/face_1.jpg"));

    // A later registration of the same person keeps adding.
    let again = registry.register("Alice").unwrap();
    let third = registry.save_reference(&again, &frame).unwrap();
    assert!(third.ends_with("Alice/face_2.jpg"));

    assert_eq!(
        registry.reference_images(&again).unwrap(),
        vec![first, second, third]
    );
}

#[test]
fn saved_reference_decodes_with_frame_dimensions() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::new(dir.path());
    let identity = registry.register("Alice").unwrap();

    let path = registry
        .save_reference(&identity, &Frame::filled(40, 30, 200))
        .unwrap();
    let (width, height) = image::image_dimensions(&path).unwrap();
    assert_eq!((width, height), (40, 30));
}

#[test]
fn mismatched_frame_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::new(dir.path());
    let identity = registry.register("Alice").unwrap();

    let frame = Frame::new(vec![0; 10], 40, 30, 0);
    let err = registry.save_reference(&identity, &frame).unwrap_err();
    assert!(matches!(err, RegistryError::FrameSize { len: 10, .. }));
    assert!(registry.reference_images(&identity).unwrap().is_empty());
}
