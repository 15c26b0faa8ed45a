//! End-to-end tests driving a real engine through a packed image written to
//! and reopened from an actual temporary file, exercising the memory-mapped
//! read path rather than just the in-memory builder shortcut.

use std::io::Write;

use modfs_core::{Node, NodeEngine};
use modfs_image::builder::ImageBuilder;
use modfs_image::PackedImageProvider;

fn open_engine(bytes: Vec<u8>, preview: bool) -> NodeEngine {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&bytes).unwrap();
    file.flush().unwrap();
    let provider = PackedImageProvider::open(file.path()).unwrap();
    NodeEngine::new(Box::new(provider), preview)
}

#[test]
fn basic_lazy_creation_reaches_the_same_directory_node_either_way() {
    let mut builder = ImageBuilder::new();
    builder.add_file("mod.one", "java/foo/Foo.class", b"foo".to_vec());
    builder.add_file("mod.two", "java/bar/Bar.class", b"bar".to_vec());
    let engine = open_engine(builder.build(), false);

    let file_node = engine
        .find_node("/modules/mod.one/java/foo/Foo.class")
        .unwrap();
    assert!(file_node.is_file());

    let via_direct_lookup = engine.find_node("/modules/mod.one/java/foo").unwrap();
    let modules = engine.find_node("/modules").unwrap();
    let mod_one = modules
        .children()
        .into_iter()
        .find(|n| n.path() == "/modules/mod.one")
        .unwrap();
    let java = mod_one
        .children()
        .into_iter()
        .find(|n| n.path() == "/modules/mod.one/java")
        .unwrap();
    let foo = java
        .children()
        .into_iter()
        .find(|n| n.path() == "/modules/mod.one/java/foo")
        .unwrap();
    assert_eq!(via_direct_lookup, foo);

    let link = engine.find_node("/packages/java.bar/mod.two").unwrap();
    assert!(link.is_link());
    assert_eq!(
        link.resolve_link(false),
        engine.find_node("/modules/mod.two").unwrap()
    );
}

#[test]
fn preview_file_replace_shadows_only_the_shared_name() {
    let mut builder = ImageBuilder::new();
    builder.add_file("a", "b/c/First", b"base-first".to_vec());
    builder.add_file("a", "b/c/Second", b"base-second".to_vec());
    builder.add_file("a", "b/c/Third", b"base-third".to_vec());
    builder.add_file("a", "META-INF/preview/b/c/Second", b"preview-second".to_vec());
    let bytes = builder.build();

    let preview_on = open_engine(bytes.clone(), true);
    let dir = preview_on.find_node("/modules/a/b/c").unwrap();
    let names: Vec<&str> = dir.children().iter().map(Node::path).collect();
    assert_eq!(
        names,
        vec!["/modules/a/b/c/First", "/modules/a/b/c/Second", "/modules/a/b/c/Third"]
    );
    let second = preview_on.find_node("/modules/a/b/c/Second").unwrap();
    assert_eq!(second.content().unwrap(), b"preview-second");

    let preview_off = open_engine(bytes, false);
    let second = preview_off.find_node("/modules/a/b/c/Second").unwrap();
    assert_eq!(second.content().unwrap(), b"base-second");
}

#[test]
fn preview_file_addition_is_invisible_without_preview() {
    let mut builder = ImageBuilder::new();
    builder.add_file("a", "b/c/First", b"first".to_vec());
    builder.add_file("a", "b/c/Third", b"third".to_vec());
    builder.add_file("a", "META-INF/preview/b/c/Second", b"second".to_vec());
    builder.add_file("a", "META-INF/preview/b/c/Xtra", b"xtra".to_vec());
    let bytes = builder.build();

    let preview_on = open_engine(bytes.clone(), true);
    let dir = preview_on.find_node("/modules/a/b/c").unwrap();
    let names: Vec<&str> = dir.children().iter().map(Node::path).collect();
    assert_eq!(
        names,
        vec![
            "/modules/a/b/c/First",
            "/modules/a/b/c/Second",
            "/modules/a/b/c/Third",
            "/modules/a/b/c/Xtra"
        ]
    );

    let preview_off = open_engine(bytes, false);
    assert!(preview_off.find_node("/modules/a/b/c/Second").is_none());
}

#[test]
fn preview_directory_addition_surfaces_a_new_package() {
    let mut builder = ImageBuilder::new();
    builder.add_file("a", "b/c/First", b"first".to_vec());
    builder.add_file("a", "b/c/Second", b"second".to_vec());
    builder.add_file("a", "META-INF/preview/b/c/bar/SubDirFile", b"sub".to_vec());
    builder.add_file("a", "META-INF/preview/b/gus/OtherDirFile", b"other".to_vec());
    let bytes = builder.build();

    let preview_on = open_engine(bytes.clone(), true);
    let dir = preview_on.find_node("/modules/a/b/c").unwrap();
    let names: Vec<&str> = dir.children().iter().map(Node::path).collect();
    assert_eq!(
        names,
        vec!["/modules/a/b/c/First", "/modules/a/b/c/Second", "/modules/a/b/c/bar"]
    );
    assert!(preview_on.find_node("/modules/a/b/gus").is_some());

    let link = preview_on.find_node("/packages/b.gus/a").unwrap();
    assert_eq!(link.resolve_link(false).path(), "/modules/a");

    let preview_off = open_engine(bytes, false);
    assert!(preview_off.find_node("/modules/a/b/c/bar").is_none());
    assert!(preview_off.find_node("/modules/a/b/gus").is_none());
    assert!(preview_off.find_node("/packages/b.gus/a").is_none());
}

#[test]
fn bad_and_good_paths() {
    let mut builder = ImageBuilder::new();
    builder.add_file("a", "b/c/First", b"first".to_vec());
    builder.add_file("a", "b/c/Second", b"second".to_vec());
    let engine = open_engine(builder.build(), false);

    for bad in [
        ".",
        "..",
        "//",
        "/modules/",
        "/modules/.",
        "/modules/a..b",
        "/modules/.a",
        "/modules/a.",
        "/modules/not.here",
        "/packages/",
        "/packages/a..b",
        "/packages/not.here",
        "/packages/b.c/missing",
        "/modules/a/b/c/First/xxx",
        "/packages/b.c/a/xxx",
    ] {
        assert!(engine.find_node(bad).is_none(), "expected {bad:?} to be absent");
    }

    for good in [
        "",
        "/modules",
        "/modules/a",
        "/modules/a/b",
        "/modules/a/b/c",
        "/modules/a/b/c/First",
        "/packages",
        "/packages/b.c",
        "/packages/b.c/a",
    ] {
        assert!(engine.find_node(good).is_some(), "expected {good:?} to be present");
    }
}

#[test]
fn package_links_are_uniform_across_preview_contributed_modules() {
    let mut builder = ImageBuilder::new();
    builder.add_file("one", "j/foo/F", b"f".to_vec());
    builder.add_file("two", "j/bar/B", b"b".to_vec());
    builder.add_file("three", "META-INF/preview/j/foo/P", b"p".to_vec());
    let engine = open_engine(builder.build(), true);

    let dir = engine.find_node("/packages/j.foo").unwrap();
    let children = dir.children();
    assert!(!children.is_empty());
    assert!(children.iter().all(Node::is_link));

    let mut targets: Vec<String> = children
        .iter()
        .map(|n| n.resolve_link(false).path().to_string())
        .collect();
    targets.sort_unstable();
    assert_eq!(targets, vec!["/modules/one", "/modules/three"]);
}

#[test]
fn modules_root_listing_snapshot() {
    let mut builder = ImageBuilder::new();
    for module in ["java.base", "java.desktop", "java.logging", "java.sql", "jdk.compiler"] {
        builder.add_file(module, "module-info.class", b"x".to_vec());
    }
    let engine = open_engine(builder.build(), false);
    let names: Vec<&str> = engine
        .find_node("/modules")
        .unwrap()
        .children()
        .iter()
        .map(Node::path)
        .collect::<Vec<_>>()
        .into_iter()
        .collect();
    insta::assert_debug_snapshot!(names, @r###"
    [
        "/modules/java.base",
        "/modules/java.desktop",
        "/modules/java.logging",
        "/modules/java.sql",
        "/modules/jdk.compiler",
    ]
    "###);
}

#[test]
fn closing_the_provider_fails_new_content_reads_only() {
    let mut builder = ImageBuilder::new();
    builder.add_file("a", "b/First", b"content".to_vec());
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&builder.build()).unwrap();
    file.flush().unwrap();

    let provider = std::sync::Arc::new(PackedImageProvider::open(file.path()).unwrap());
    let engine = NodeEngine::new(Box::new(std::sync::Arc::clone(&provider)), false);
    provider.close();

    assert!(engine.find_node("/modules/a/b").is_some());
    let file_node = engine.find_node("/modules/a/b/First").unwrap();
    assert!(file_node.content().is_err());
}
