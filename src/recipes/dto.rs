use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::tags::dto::{TagOut, TagPayload};

use super::repo::Recipe;

/// Row shape for the list endpoint. Description stays detail-only.
#[derive(Debug, Serialize)]
pub struct RecipeListItem {
    pub id: i64,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: Option<String>,
}

impl From<Recipe> for RecipeListItem {
    fn from(recipe: Recipe) -> Self {
        Self {
            id: recipe.id,
            title: recipe.title,
            time_minutes: recipe.time_minutes,
            price: recipe.price,
            link: recipe.link,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecipeDetail {
    pub id: i64,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<TagOut>,
    /// Presigned URL into the media store, when an image is attached.
    pub image: Option<String>,
}

/// Body for POST and PUT. Omitted optional fields take their defaults, so a
/// full update resets description/link/tags that the client left out.
#[derive(Debug, Deserialize)]
pub struct RecipeWrite {
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub tags: Vec<TagPayload>,
}

/// PATCH body. Absent fields stay untouched; an explicit null clears an
/// optional field, hence the nested Option.
#[derive(Debug, Default, Deserialize)]
pub struct RecipePatch {
    pub title: Option<String>,
    pub time_minutes: Option<i32>,
    pub price: Option<Decimal>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub link: Option<Option<String>>,
    pub tags: Option<Vec<TagPayload>>,
}

fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_body_defaults_optional_fields() {
        let body: RecipeWrite = serde_json::from_value(serde_json::json!({
            "title": "X",
            "time_minutes": 5,
            "price": 1.00,
        }))
        .unwrap();
        assert_eq!(body.title, "X");
        assert_eq!(body.time_minutes, 5);
        assert_eq!(body.price.to_string(), "1");
        assert!(body.description.is_none());
        assert!(body.link.is_none());
        assert!(body.tags.is_empty());
    }

    #[test]
    fn write_body_accepts_string_prices() {
        let body: RecipeWrite = serde_json::from_value(serde_json::json!({
            "title": "Pongal",
            "time_minutes": 50,
            "price": "2.50",
            "tags": [{"name": "Indian"}, {"name": "Breakfast"}],
        }))
        .unwrap();
        assert_eq!(body.price.to_string(), "2.50");
        assert_eq!(body.tags.len(), 2);
        assert_eq!(body.tags[0].name, "Indian");
    }

    #[test]
    fn patch_distinguishes_absent_from_null() {
        let patch: RecipePatch = serde_json::from_value(serde_json::json!({
            "title": "New title",
            "description": null,
        }))
        .unwrap();
        assert_eq!(patch.title.as_deref(), Some("New title"));
        assert_eq!(patch.description, Some(None));
        assert_eq!(patch.link, None);
        assert!(patch.tags.is_none());
    }

    #[test]
    fn list_item_omits_description() {
        let value = serde_json::to_value(RecipeListItem {
            id: 3,
            title: "Sample".into(),
            time_minutes: 22,
            price: "5.25".parse().unwrap(),
            link: None,
        })
        .unwrap();
        assert!(value.get("description").is_none());
        assert_eq!(value["id"], 3);
        assert_eq!(value["price"], "5.25");
    }
}
