use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Configured data source as listed by GET /datasets/sources
///
/// Timestamps are passed through as the backend formats them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataSourceSummary {
    pub source_id: i64,
    pub name: String,
    #[serde(default)]
    pub source_type: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub last_updated: Option<JsonValue>,
    #[serde(default)]
    pub record_count: i64,
    #[serde(default)]
    pub earliest_record: Option<JsonValue>,
    #[serde(default)]
    pub latest_record: Option<JsonValue>,
}

/// Envelope of the data source listing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataSourceList {
    #[serde(default)]
    pub items: Vec<DataSourceSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_data_source_list_deserialization() {
        let list: DataSourceList = serde_json::from_value(json!({
            "items": [
                {
                    "source_id": 3,
                    "name": "Woo orders",
                    "source_type": "woocommerce",
                    "base_url": "https://shop.example.com/wp-json/wc/v3/orders",
                    "last_updated": "Tue, 14 Oct 2025 09:12:00 GMT",
                    "record_count": 1204,
                    "earliest_record": null,
                    "latest_record": null
                },
                {"source_id": 4, "name": "Leads"}
            ]
        }))
        .unwrap();

        assert_eq!(list.items.len(), 2);
        assert_eq!(list.items[0].record_count, 1204);
        assert_eq!(list.items[1].record_count, 0);
        assert!(list.items[1].source_type.is_none());
    }
}
