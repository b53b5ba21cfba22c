use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::Arc;

use nodeprops::repo::memory::MemoryNode;
use nodeprops::repo::TypeLoader;
use nodeprops::value::{Binary, ObjectStream, ObjectValue, OBJECT_STREAM_MAGIC};
use nodeprops::{
    HelperData, MapOptions, ModifiablePropertyMap, PropertyMap, Result, Value, ValueMap,
};

struct OnlyMaps;

impl TypeLoader for OnlyMaps {
    fn resolves(&self, type_name: &str) -> bool {
        type_name == "map"
    }
}

fn settings() -> ObjectValue {
    let mut map = BTreeMap::new();
    map.insert("theme".to_string(), "dark".to_string());
    ObjectValue::serialize("map", &map).expect("serialize")
}

#[test]
fn stream_property_converts_to_its_length() -> Result<()> {
    let node = MemoryNode::new("/content/files");
    node.insert("data", Binary::from_reader(Cursor::new(b"1234567".to_vec())))?;
    let helper = HelperData::default();
    let map = PropertyMap::new(&node, &helper);

    assert_eq!(map.get::<i64>("data")?, Some(7));
    assert_eq!(map.get::<f64>("data")?, Some(7.0));
    assert_eq!(map.get::<Vec<i32>>("data")?, Some(vec![7]));
    Ok(())
}

#[test]
fn multi_valued_binaries_convert_per_element() -> Result<()> {
    let node = MemoryNode::new("/content/files");
    node.insert(
        "parts",
        Value::Array(vec![
            Value::Binary(Binary::from_bytes(&b"abc"[..])),
            Value::Binary(Binary::from_bytes(&b"hello"[..])),
        ]),
    )?;
    let helper = HelperData::default();
    let map = PropertyMap::new(&node, &helper);

    assert_eq!(map.get::<Vec<i64>>("parts")?, Some(vec![3, 5]));
    assert_eq!(map.get::<i64>("parts")?, Some(3));
    Ok(())
}

#[test]
fn binary_reads_as_text() -> Result<()> {
    let node = MemoryNode::new("/content/files");
    node.insert("text", Binary::from_bytes(&b"hello world"[..]))?;
    let helper = HelperData::new(MapOptions::new().stream_buffer_size(4));
    let map = PropertyMap::new(&node, &helper);

    assert_eq!(map.get::<String>("text")?.as_deref(), Some("hello world"));
    assert_eq!(map.get::<Binary>("text")?.map(|b| b.len()), Some(Some(11)));
    Ok(())
}

#[test]
fn serialized_objects_round_trip_through_the_node() -> Result<()> {
    let node = MemoryNode::new("/content/settings");
    let helper = HelperData::default();
    let mut writer = ModifiablePropertyMap::new(&node, &helper);
    writer.put("settings", Value::Object(settings()))?;
    assert_eq!(writer.get::<ObjectValue>("settings")?, Some(settings()));

    let reader = PropertyMap::new(&node, &helper);
    let object = reader
        .get::<ObjectValue>("settings")?
        .expect("stored object");
    assert_eq!(object.type_name(), "map");
    let decoded: BTreeMap<String, String> = object
        .deserialize()
        .expect("payload")
        .expect("decode");
    assert_eq!(decoded.get("theme").map(String::as_str), Some("dark"));

    let raw = reader.get::<Binary>("settings")?.expect("binary");
    assert_eq!(raw.read_to_end().expect("read")[..4], OBJECT_STREAM_MAGIC);
    Ok(())
}

#[test]
fn object_streams_open_only_on_serialized_content() -> Result<()> {
    let node = MemoryNode::new("/content/settings");
    node.insert("plain", Binary::from_bytes(&b"value"[..]))?;
    node.insert("object", Value::Object(settings()))?;
    let helper = HelperData::default();
    let map = PropertyMap::new(&node, &helper);

    assert!(map.get::<ObjectStream>("plain")?.is_none());
    let mut stream = map.get::<ObjectStream>("object")?.expect("object stream");
    assert_eq!(stream.read_object().expect("read object"), settings());
    Ok(())
}

#[test]
fn type_loader_filters_deserialization() -> Result<()> {
    let node = MemoryNode::new("/content/settings");
    node.insert("allowed", Value::Object(settings()))?;
    let list = ObjectValue::serialize("list", &vec![1, 2, 3]).expect("serialize");
    node.insert("denied", Value::Object(list))?;
    let helper = HelperData::default().with_type_loader(Arc::new(OnlyMaps));
    let map = PropertyMap::new(&node, &helper);

    assert_eq!(map.get::<ObjectValue>("allowed")?, Some(settings()));
    assert_eq!(map.get::<ObjectValue>("denied")?, None);
    Ok(())
}
