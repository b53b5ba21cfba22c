use nodeprops::map::handle_mixin_types;
use nodeprops::repo::memory::MemoryNode;
use nodeprops::repo::{Node, Property};
use nodeprops::value::{Calendar, ObjectValue};
use nodeprops::{
    HelperData, MapError, ModifiablePropertyMap, PropertyMap, Result, Value, ValueMap, ValueType,
};

#[test]
fn mixin_types_are_reconciled() -> Result<()> {
    let node = MemoryNode::new("/content/versioned");
    node.add_mixin("mix:versionable")?;
    let helper = HelperData::default();
    let mut map = ModifiablePropertyMap::new(&node, &helper);

    map.put("jcr:mixinTypes", Value::from(vec!["mix:referenceable"]))?;
    assert_eq!(
        node.mixin_node_types()?,
        vec!["mix:referenceable".to_string()]
    );
    assert_eq!(
        map.get::<Vec<String>>("jcr:mixinTypes")?,
        Some(vec!["mix:referenceable".to_string()])
    );

    map.put(
        "jcr:mixinTypes",
        Value::from(vec!["mix:title", "mix:referenceable", "mix:created"]),
    )?;
    assert_eq!(
        node.mixin_node_types()?,
        vec![
            "mix:referenceable".to_string(),
            "mix:title".to_string(),
            "mix:created".to_string()
        ]
    );
    Ok(())
}

#[test]
fn clearing_mixins_removes_them_all() -> Result<()> {
    let node = MemoryNode::new("/content/mixins");
    node.add_mixin("mix:title")?;
    node.add_mixin("mix:created")?;
    handle_mixin_types(&node, None)?;
    assert!(node.mixin_node_types()?.is_empty());
    Ok(())
}

#[test]
fn removing_an_unbacked_key_writes_nothing() -> Result<()> {
    let node = MemoryNode::new("/content/page");
    let helper = HelperData::default();
    let mut map = ModifiablePropertyMap::new(&node, &helper);

    assert_eq!(map.remove("missing")?, None);
    assert_eq!(node.metrics().snapshot().writes, 0);
    Ok(())
}

#[test]
fn remove_deletes_the_property() -> Result<()> {
    let node = MemoryNode::new("/content/page");
    node.insert("title", "Hello")?;
    let helper = HelperData::default();
    let mut map = ModifiablePropertyMap::new(&node, &helper);
    let writes = node.metrics().snapshot().writes;

    assert_eq!(map.remove("title")?, Some(Value::from("Hello")));
    assert!(!node.has_property("title")?);
    assert_eq!(node.metrics().snapshot().writes, writes + 1);
    assert_eq!(map.get_value("title")?, None);
    assert!(!map.keys()?.contains(&"title".to_string()));
    Ok(())
}

#[test]
fn put_writes_through_and_returns_the_previous_value() -> Result<()> {
    let node = MemoryNode::new("/content/page");
    node.insert("count", 1_i64)?;
    let helper = HelperData::default();
    let mut map = ModifiablePropertyMap::new(&node, &helper);

    assert_eq!(map.put("count", Value::Int(5))?, Some(Value::Long(1)));
    assert_eq!(map.put("title", Value::from("Hello"))?, None);
    assert_eq!(map.get_value("count")?, Some(Value::Int(5)));
    assert_eq!(
        map.get_or_value("count", Some(Value::from("")))?,
        Some(Value::from("5"))
    );

    let fresh = PropertyMap::new(&node, &helper);
    assert_eq!(fresh.get_value("count")?, Some(Value::Long(5)));
    assert_eq!(fresh.get::<i32>("count")?, Some(5));
    assert_eq!(fresh.get::<String>("title")?.as_deref(), Some("Hello"));
    Ok(())
}

#[test]
fn put_round_trips_every_scalar_kind() -> Result<()> {
    let node = MemoryNode::new("/content/kinds");
    let helper = HelperData::default();
    let mut map = ModifiablePropertyMap::new(&node, &helper);
    let calendar = Calendar::from_unix_millis(1_660_924_957_000).expect("calendar");
    let values = vec![
        ("long", Value::Long(-7)),
        ("double", Value::Double(2.5)),
        ("flag", Value::Bool(true)),
        ("initial", Value::Char('c')),
        ("text", Value::from("plain")),
        ("when", Value::Calendar(calendar)),
        ("decimal", Value::Decimal("12.50".parse().expect("decimal"))),
        ("list", Value::from(vec![1_i64, 2, 3])),
    ];
    map.put_all(values.clone())?;

    let fresh = PropertyMap::new(&node, &helper);
    for (key, value) in values {
        let read = fresh
            .get_as(key, &ValueType::of(&value))?
            .and_then(|converted| converted.into_value());
        assert_eq!(read, Some(value), "{key}");
    }
    assert_eq!(fresh.get::<char>("initial")?, Some('c'));
    assert_eq!(fresh.get::<String>("initial")?.as_deref(), Some("c"));
    assert_eq!(fresh.get::<char>("text")?, None);
    Ok(())
}

#[test]
fn multi_valued_put_stores_every_element() -> Result<()> {
    let node = MemoryNode::new("/content/multi");
    let helper = HelperData::default();
    let mut map = ModifiablePropertyMap::new(&node, &helper);

    map.put("tags", Value::from(vec!["a", "b"]))?;
    let property = node.property("tags")?;
    assert!(property.is_multiple());
    assert_eq!(property.value()?, Value::from(vec!["a", "b"]));

    map.put("empty", Value::Array(Vec::new()))?;
    assert!(node.property("empty")?.is_multiple());
    Ok(())
}

#[test]
fn keys_are_escaped_on_write() -> Result<()> {
    let node = MemoryNode::new("/content/escaped");
    let helper = HelperData::default();
    let mut map = ModifiablePropertyMap::new(&node, &helper);

    map.put("jcr:title", Value::from("Title"))?;
    map.put("foo:bar", Value::from("value"))?;
    map.put("./rating*", Value::Long(3))?;
    assert!(node.has_property("jcr:title")?);
    assert!(node.has_property("foo%3Abar")?);
    assert!(node.has_property("rating%2A")?);
    assert_eq!(node.memory_session().prefix_calls(), 1);

    let fresh = PropertyMap::new(&node, &helper);
    assert_eq!(fresh.get::<String>("foo:bar")?.as_deref(), Some("value"));
    assert!(fresh.keys()?.contains(&"rating*".to_string()));
    Ok(())
}

#[test]
fn path_keys_are_rejected() {
    let node = MemoryNode::new("/content/page");
    let helper = HelperData::default();
    let mut map = ModifiablePropertyMap::new(&node, &helper);

    let err = map
        .put("child/title", Value::from("x"))
        .expect_err("path key");
    assert!(matches!(err, MapError::InvalidArgument(_)));
    assert_eq!(node.metrics().snapshot().writes, 0);
}

#[test]
fn unstorable_values_are_rejected() {
    let node = MemoryNode::new("/content/page");
    let helper = HelperData::default();
    let mut map = ModifiablePropertyMap::new(&node, &helper);

    let err = map
        .put("object", Value::Object(ObjectValue::opaque("TestClass")))
        .expect_err("opaque object");
    match err {
        MapError::InvalidArgument(message) => {
            assert!(message.contains("object"), "{message}");
            assert!(message.contains("TestClass"), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(map.get_value("object").expect("read"), None);
}

#[test]
fn protected_writes_surface_as_invalid_argument() -> Result<()> {
    let node = MemoryNode::new("/content/page");
    let helper = HelperData::default();
    let mut map = ModifiablePropertyMap::new(&node, &helper);

    map.put("jcr:primaryType", Value::from("nt:folder"))?;
    assert_eq!(node.primary_node_type()?, "nt:folder");

    let err = map.remove("jcr:primaryType").expect_err("protected");
    assert!(matches!(err, MapError::InvalidArgument(_)));
    Ok(())
}

#[test]
fn failed_remove_keeps_the_cached_entry() -> Result<()> {
    let node = MemoryNode::new("/content/page");
    let helper = HelperData::default();
    let mut map = ModifiablePropertyMap::new(&node, &helper);

    map.remove("jcr:primaryType").expect_err("protected");
    assert!(node.has_property("jcr:primaryType")?);
    assert_eq!(
        map.get_value("jcr:primaryType")?,
        Some(Value::from("nt:unstructured"))
    );
    assert_eq!(
        map.keys()?,
        vec!["jcr:primaryType".to_string(), "sling:resourceType".to_string()]
    );
    Ok(())
}

#[test]
fn put_all_keeps_entries_written_before_a_failure() {
    let node = MemoryNode::new("/content/page");
    let helper = HelperData::default();
    let mut map = ModifiablePropertyMap::new(&node, &helper);

    let result = map.put_all([
        ("first", Value::Long(1)),
        ("bad/key", Value::Long(2)),
        ("third", Value::Long(3)),
    ]);
    assert!(matches!(result, Err(MapError::InvalidArgument(_))));
    assert!(node.has_property("first").expect("first"));
    assert!(!node.has_property("third").expect("third"));
}

#[test]
fn clear_is_unsupported() {
    let node = MemoryNode::new("/content/page");
    let helper = HelperData::default();
    let mut map = ModifiablePropertyMap::new(&node, &helper);
    assert!(matches!(map.clear(), Err(MapError::Unsupported("clear"))));
}

#[test]
fn display_reflects_writes() -> Result<()> {
    let node = MemoryNode::new("/content/page");
    let helper = HelperData::default();
    let mut map = ModifiablePropertyMap::new(&node, &helper);
    map.put("title", Value::from("Hello"))?;

    let rendered = map.to_string();
    assert!(
        rendered.starts_with("ModifiablePropertyMap [node=/content/page, values={"),
        "{rendered}"
    );
    assert!(rendered.contains("title=Hello"));
    assert_eq!(map.as_property_map().len()?, 3);
    Ok(())
}
