use std::path::PathBuf;

use mo_tree_core::parse_file;

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(path)
}

#[test]
fn parses_a_full_fabric_export() {
    let root = parse_file(&fixture("fixtures/aci-dc1.json")).expect("parse should succeed");
    assert_eq!(root.class, "imdata");

    let tenant = root.get_child("fvTenant").expect("tenant should exist");
    assert_eq!(tenant.attr("name"), Some("datacenter"));
    assert_eq!(tenant.get_children("fvBD").len(), 3);
    assert_eq!(tenant.get_children("fvCtx").len(), 4);
}

#[test]
fn finds_nested_classes_across_the_tree() {
    let root = parse_file(&fixture("fixtures/aci-dc1.json")).expect("parse should succeed");

    let l3out = root.find_class("l3extOut").expect("l3out should exist");
    assert_eq!(l3out.attr("name"), Some("internet"));

    let vpc = root.find_class("fabricExplicitGEp").expect("vpc group should exist");
    assert_eq!(vpc.attr("name"), Some("vpc-101-102"));
}
