use nodeprops::repo::memory::{MemoryNode, NodeMetricsSnapshot};
use nodeprops::repo::Node;
use nodeprops::{HelperData, MapError, MapOptions, PropertyMap, Result, Value, ValueMap};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn page() -> MemoryNode {
    let node = MemoryNode::new("/content/page");
    node.insert("string", "test").expect("string");
    node.insert("count", 42_i64).expect("count");
    node.insert("tags", vec!["a", "b"]).expect("tags");
    node
}

#[test]
fn typed_reads_with_defaults() -> Result<()> {
    let node = page();
    let helper = HelperData::default();
    let map = PropertyMap::new(&node, &helper);

    assert_eq!(map.get_or("string", String::from("default"))?, "test");
    assert_eq!(
        map.get_or("nonexistent", String::from("default"))?,
        "default"
    );
    assert_eq!(map.get_or_value("nonexistent", None)?, None);
    assert_eq!(
        map.get_or_value("count", Some(Value::Int(0)))?,
        Some(Value::Int(42))
    );
    assert_eq!(map.get::<String>("count")?.as_deref(), Some("42"));
    assert_eq!(
        map.get::<Vec<String>>("tags")?,
        Some(vec!["a".into(), "b".into()])
    );
    assert_eq!(map.get::<String>("tags")?.as_deref(), Some("a"));
    assert_eq!(map.get::<i64>("./count")?, Some(42));
    Ok(())
}

#[test]
fn fresh_node_has_two_synthetic_entries() -> Result<()> {
    let node = MemoryNode::new("/content/empty");
    let helper = HelperData::default();
    let map = PropertyMap::new(&node, &helper);

    let first = map.entries()?;
    let second = map.entries()?;
    assert_eq!(first, second);
    assert_eq!(
        first,
        vec![
            ("jcr:primaryType".to_string(), Value::from("nt:unstructured")),
            ("sling:resourceType".to_string(), Value::from("nt:unstructured")),
        ]
    );
    assert_eq!(node.metrics().snapshot().enumerations, 1);
    Ok(())
}

#[test]
fn full_read_is_idempotent_and_answers_misses() -> Result<()> {
    let node = page();
    let helper = HelperData::default();
    let map = PropertyMap::new(&node, &helper);

    map.read_fully()?;
    map.read_fully()?;
    assert!(map.is_fully_read());
    let after_read = node.metrics().snapshot();
    assert_eq!(after_read.enumerations, 1);

    assert_eq!(map.get_value("missing")?, None);
    assert!(!map.contains_key("missing")?);
    assert!(map.contains_key("count")?);
    assert!(map.contains_value(&Value::from("test"))?);
    assert_eq!(map.len()?, 5);
    assert_eq!(node.metrics().snapshot(), after_read);
    Ok(())
}

#[test]
fn full_read_keeps_entries_cached_earlier() -> Result<()> {
    let node = page();
    let helper = HelperData::default();
    let map = PropertyMap::new(&node, &helper);

    assert_eq!(map.get_value("count")?, Some(Value::Long(42)));
    node.insert("count", 7_i64).expect("count");
    node.insert("string", "changed").expect("string");
    map.read_fully()?;

    assert_eq!(map.get_value("count")?, Some(Value::Long(42)));
    assert_eq!(map.get_value("string")?, Some(Value::from("changed")));
    assert_eq!(map.keys()?.first().map(String::as_str), Some("count"));
    Ok(())
}

#[test]
fn cached_reads_do_not_query_again() -> Result<()> {
    let node = page();
    let helper = HelperData::default();
    let map = PropertyMap::new(&node, &helper);

    assert_eq!(map.get::<i64>("count")?, Some(42));
    let lookups = node.metrics().snapshot().lookups;
    assert_eq!(lookups, 1);
    assert_eq!(map.get::<i32>("count")?, Some(42));
    assert_eq!(map.get::<f64>("count")?, Some(42.0));
    assert_eq!(node.metrics().snapshot().lookups, lookups);
    assert!(!map.is_fully_read());
    Ok(())
}

#[test]
fn resource_type_falls_back_to_primary_type() -> Result<()> {
    let node = page();
    let helper = HelperData::default();
    let map = PropertyMap::new(&node, &helper);
    assert_eq!(
        map.get::<String>("sling:resourceType")?.as_deref(),
        Some("nt:unstructured")
    );

    node.insert("sling:resourceType", "app/components/page")
        .expect("resource type");
    let map = PropertyMap::new(&node, &helper);
    assert_eq!(
        map.get::<String>("sling:resourceType")?.as_deref(),
        Some("app/components/page")
    );

    let plain = MemoryNode::new("/plain");
    let helper = HelperData::new(MapOptions::new().synthesize_resource_type(false));
    let map = PropertyMap::new(&plain, &helper);
    assert_eq!(map.get_value("sling:resourceType")?, None);
    assert_eq!(map.keys()?, vec!["jcr:primaryType".to_string()]);
    Ok(())
}

#[test]
fn hidden_primary_type_comes_from_the_registry() -> Result<()> {
    let node = MemoryNode::new("/hidden");
    node.hide_primary_type_property(true);
    let helper = HelperData::default();

    let map = PropertyMap::new(&node, &helper);
    assert_eq!(
        map.get::<String>("jcr:primaryType")?.as_deref(),
        Some("nt:unstructured")
    );
    assert_eq!(node.metrics().snapshot().type_lookups, 1);

    let map = PropertyMap::new(&node, &helper);
    assert_eq!(
        map.keys()?,
        vec!["jcr:primaryType".to_string(), "sling:resourceType".to_string()]
    );
    Ok(())
}

#[test]
fn path_keys_bypass_the_cache() -> Result<()> {
    let node = page();
    let child = node.add_child("child");
    child.insert("title", "Child").expect("title");
    let helper = HelperData::default();
    let map = PropertyMap::new(&node, &helper);

    assert_eq!(map.get::<String>("child/title")?.as_deref(), Some("Child"));
    assert_eq!(map.get_value("child/missing")?, None);
    assert_eq!(map.get_value("other/title")?, None);
    assert!(!map.keys()?.iter().any(|key| key.contains('/')));
    Ok(())
}

#[test]
fn legacy_encoded_names_are_decoded() -> Result<()> {
    let node = MemoryNode::new("/legacy");
    node.insert("my_x0020_title", "old").expect("legacy name");
    let helper = HelperData::default();
    let map = PropertyMap::new(&node, &helper);
    assert!(map.keys()?.contains(&"my title".to_string()));

    let helper = HelperData::new(MapOptions::new().legacy_path_encoding(false));
    let map = PropertyMap::new(&node, &helper);
    assert!(map.keys()?.contains(&"my_x0020_title".to_string()));
    Ok(())
}

#[test]
fn prefixed_keys_escape_only_the_local_part() -> Result<()> {
    init_tracing();
    let node = MemoryNode::new("/ns");
    node.insert("jcr:title", "Title").expect("prefixed");
    node.insert("foo%3Abar", "escaped").expect("unregistered prefix");
    node.insert("a%2Fb", "slash").expect("escaped slash");
    let helper = HelperData::default();
    let map = PropertyMap::new(&node, &helper);

    assert_eq!(map.get::<String>("jcr:title")?.as_deref(), Some("Title"));
    assert_eq!(map.get::<String>("foo:bar")?.as_deref(), Some("escaped"));
    assert_eq!(node.memory_session().prefix_calls(), 1);

    let keys = map.keys()?;
    assert!(keys.contains(&"foo:bar".to_string()));
    assert!(keys.contains(&"a/b".to_string()));
    assert_eq!(map.get::<String>("a/b")?, None);
    Ok(())
}

#[test]
fn display_lists_every_entry() {
    let node = MemoryNode::new("/content/page");
    node.insert("title", "Hello").expect("title");
    let helper = HelperData::default();
    let map = PropertyMap::new(&node, &helper);

    assert_eq!(
        map.to_string(),
        "PropertyMap [node=/content/page, values={jcr:primaryType=nt:unstructured, \
         title=Hello, sling:resourceType=nt:unstructured}]"
    );
}

#[test]
fn read_only_map_rejects_mutation() {
    let node = page();
    let helper = HelperData::default();
    let mut map = PropertyMap::new(&node, &helper);

    assert!(matches!(
        map.put("string", Value::from("x")),
        Err(MapError::Unsupported("put"))
    ));
    assert!(matches!(
        map.put_all([("string", Value::from("x"))]),
        Err(MapError::Unsupported("put_all"))
    ));
    assert!(matches!(
        map.remove("string"),
        Err(MapError::Unsupported("remove"))
    ));
    assert!(matches!(map.clear(), Err(MapError::Unsupported("clear"))));
    assert_eq!(node.metrics().snapshot().writes, 3);
}

#[test]
fn enumeration_failure_is_a_state_error() {
    init_tracing();
    let node = page();
    node.fail_enumeration(true);
    let helper = HelperData::default();
    let map = PropertyMap::new(&node, &helper);

    let err = map.len().expect_err("enumeration fails");
    assert!(matches!(err, MapError::State { .. }), "{err}");
    assert!(err.to_string().contains("/content/page"));
    assert!(!map.is_fully_read());

    assert_eq!(map.get::<i64>("count").expect("single lookup"), Some(42));
    assert_eq!(node.path().expect("path"), map.path().expect("map path"));
}

#[test]
fn path_failure_is_a_state_error() {
    let node = page();
    node.fail_path(true);
    let helper = HelperData::default();
    let map = PropertyMap::new(&node, &helper);

    let err = map.path().expect_err("path fails");
    assert!(matches!(err, MapError::State { .. }), "{err}");
    assert!(err.to_string().contains("node is no longer valid"), "{err}");
    assert_eq!(map.get::<i64>("count").expect("lookup"), Some(42));
    let rendered = map.to_string();
    assert!(
        rendered.starts_with("PropertyMap [node=<unavailable>"),
        "{rendered}"
    );
}

#[test]
fn untouched_map_makes_no_calls() {
    let node = page();
    let before = node.metrics().snapshot();
    let helper = HelperData::default();
    let _map = PropertyMap::new(&node, &helper);
    assert_eq!(node.metrics().snapshot(), before);
    assert_ne!(before, NodeMetricsSnapshot::default());
}
