use serde_json::{Map, Value};
use uuid::Uuid;

/// Build a seed document: `id` plus `Property1..=Property{property_count}`,
/// each holding a fresh random string.
pub fn build_document(id: &str, property_count: usize) -> Value {
    let mut fields = Map::with_capacity(property_count + 1);
    fields.insert("id".to_string(), Value::String(id.to_string()));
    for i in 1..=property_count {
        fields.insert(
            format!("Property{i}"),
            Value::String(Uuid::new_v4().to_string()),
        );
    }
    Value::Object(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_properties_give_four_fields() {
        let doc = build_document("abc", 3);
        let obj = doc.as_object().unwrap();
        assert_eq!(obj.len(), 4);
        assert_eq!(obj["id"], "abc");
        for key in ["Property1", "Property2", "Property3"] {
            assert!(obj[key].is_string(), "{key} should be a string");
        }
        assert!(!obj.contains_key("Property4"));
    }

    #[test]
    fn zero_properties_is_id_only() {
        let doc = build_document("only-id", 0);
        assert_eq!(doc.as_object().unwrap().len(), 1);
    }

    #[test]
    fn values_are_fresh() {
        let a = build_document("x", 2);
        let b = build_document("x", 2);
        assert_ne!(a["Property1"], b["Property1"]);
        assert_ne!(a["Property1"], a["Property2"]);
    }
}
