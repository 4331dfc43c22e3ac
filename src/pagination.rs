use serde::{Deserialize, Serialize};

/// Query parameters shared by the list endpoints.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

/// List envelope: full row count plus the requested window.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub total: i64,
    pub results: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults() {
        let p: Pagination = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(p.limit, 20);
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn page_envelope_shape() {
        let page = Page {
            total: 3,
            results: vec![1, 2, 3],
        };
        let value = serde_json::to_value(&page).unwrap();
        assert_eq!(value["total"], 3);
        assert_eq!(value["results"].as_array().unwrap().len(), 3);
    }
}
