//! BSON interop: documents read from a BSON store can be searched directly.
use bson::{Bson, Document as BsonDocument};

use super::{Map, Value};

impl From<Bson> for Value {
    fn from(b: Bson) -> Self {
        match b {
            Bson::Null | Bson::Undefined => Self::Null,
            Bson::Boolean(v) => Self::Bool(v),
            Bson::Int32(i) => Self::Int(i64::from(i)),
            Bson::Int64(i) => Self::Int(i),
            Bson::Double(f) => Self::Float(f),
            Bson::String(s) | Bson::Symbol(s) => Self::Str(s),
            Bson::Array(a) => Self::List(a.into_iter().map(Self::from).collect()),
            Bson::Document(d) => Self::from(d),
            Bson::DateTime(dt) => Self::Int(dt.timestamp_millis()),
            Bson::ObjectId(oid) => Self::Str(oid.to_hex()),
            other => Self::Str(other.to_string()),
        }
    }
}

impl From<BsonDocument> for Value {
    fn from(d: BsonDocument) -> Self {
        Self::Map(d.into_iter().map(|(k, v)| (k, Self::from(v))).collect::<Map>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn nested_bson_document() {
        let v = Value::from(doc! {"fy": 2011i32, "liab": {"cur": 3265i64}, "tags": ["a"]});
        assert_eq!(v.get_path("fy"), Some(&Value::Int(2011)));
        assert_eq!(v.get_path("liab.cur"), Some(&Value::Int(3265)));
        assert_eq!(v.get_path("tags.0"), Some(&Value::from("a")));
    }
}
