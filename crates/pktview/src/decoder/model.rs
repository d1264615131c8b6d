use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Column header shown by the presentation layer for a protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub header: String,
    /// Preferred width in characters
    pub width: u16,
}

impl Column {
    pub fn new(header: impl Into<String>, width: u16) -> Self {
        Self {
            header: header.into(),
            width,
        }
    }
}

/// Structured result of decoding one packet.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DecodedPacket {
    /// One-line description for list views
    pub summary: Option<String>,

    /// Cell values, one per protocol column
    pub cells: Vec<String>,

    /// Additional named fields in decode order
    /// Serialized as a JSON object
    #[serde(serialize_with = "serialize_fields_as_map")]
    pub fields: Vec<(String, String)>,
}

impl DecodedPacket {
    pub fn with_summary(summary: impl Into<String>) -> Self {
        Self {
            summary: Some(summary.into()),
            ..Self::default()
        }
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

fn serialize_fields_as_map<S>(fields: &[(String, String)], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(fields.len()))?;
    for (k, v) in fields {
        map.serialize_entry(k, v)?;
    }
    map.end()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_serialize_as_object() {
        let packet = DecodedPacket {
            summary: Some("GET /".to_string()),
            cells: vec!["1".to_string()],
            fields: vec![
                ("method".to_string(), "GET".to_string()),
                ("path".to_string(), "/".to_string()),
            ],
        };

        let json = serde_json::to_string(&packet).unwrap();
        assert_eq!(
            json,
            r#"{"summary":"GET /","cells":["1"],"fields":{"method":"GET","path":"/"}}"#
        );
    }

    #[test]
    fn test_field_lookup() {
        let mut packet = DecodedPacket::with_summary("x");
        packet.fields.push(("level".to_string(), "info".to_string()));

        assert_eq!(packet.field("level"), Some("info"));
        assert_eq!(packet.field("missing"), None);
    }
}
