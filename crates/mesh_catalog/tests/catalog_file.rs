use mesh_catalog::{CachedMeshFinder, CatalogError, MeshLibrary, MeshResolver, ShapeRewrite, ANY_TYPE};
use std::io::Write;
use std::sync::Arc;

const CATALOG: &str = r#"{
    "FixedWing": [
        { "Name": ["F-16C", "Viper"], "Type": ["Air+FixedWing"], "Shape": ["Meshes/F-16C.obj"] },
        { "Name": ["Su-27", "Flanker"], "Type": ["Air+FixedWing"], "AdditionalType": ["Medium"], "Shape": ["Meshes/Su-27.obj"] }
    ],
    "Rotorcraft": [
        { "Name": ["*"], "Type": ["Air+Rotorcraft"], "Shape": ["Meshes/Generic-Helo.obj"] }
    ],
    "Armor": [
        { "Name": ["T-72"], "Type": ["Ground+Heavy+Armor+Tank"], "Shape": ["Meshes/T-72.obj"] }
    ]
}"#;

fn library_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(CATALOG.as_bytes()).unwrap();
    file
}

#[test]
fn resolves_model_paths_from_file() {
    let file = library_file();
    let library = Arc::new(MeshLibrary::from_path(file.path()).unwrap());
    assert_eq!(library.len(), 4);

    let finder = CachedMeshFinder::new(library);
    let rewrite = ShapeRewrite::default();

    let viper = finder.resolve("Air+FixedWing", "Viper");
    assert_eq!(rewrite.model_path(viper.as_deref()), "/Meshes/F-16C.glb");

    // Medium attribute on the Flanker entry excludes targets without it.
    let flanker = finder.resolve("Air+FixedWing", "Flanker");
    assert_eq!(flanker.as_deref().and_then(|e| e.primary_shape()), Some("Meshes/F-16C.obj"));
    let flanker = finder.resolve("Air+Medium+FixedWing", "Flanker");
    assert_eq!(flanker.as_deref().and_then(|e| e.primary_shape()), Some("Meshes/Su-27.obj"));

    let helo = finder.resolve("Air+Rotorcraft", "UH-60");
    assert_eq!(rewrite.model_path(helo.as_deref()), "/Meshes/Generic-Helo.glb");

    let anything = finder.resolve(ANY_TYPE, "T72");
    assert_eq!(anything.map(|e| e.category.clone()).as_deref(), Some("Armor"));

    assert_eq!(rewrite.model_path(finder.resolve("Sea+Watercraft", "Boat").as_deref()), "");
}

#[test]
fn missing_file_reports_path() {
    let err = MeshLibrary::from_path("/nonexistent/meshes.json").unwrap_err();
    assert!(matches!(err, CatalogError::Io { .. }));
    assert!(err.to_string().contains("/nonexistent/meshes.json"));
}

#[test]
fn concurrent_lookups_share_one_cache() {
    let file = library_file();
    let finder = CachedMeshFinder::new(Arc::new(MeshLibrary::from_path(file.path()).unwrap()));

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..100 {
                    assert!(finder.find("Air+FixedWing", "Viper").is_some());
                    assert!(finder.find("Ground+Heavy+Armor+Tank", "T-72").is_some());
                }
            });
        }
    });

    let stats = finder.stats();
    assert_eq!(stats.size, 2);
    assert_eq!(stats.hits + stats.misses, 800);
}
