use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};
use crate::media::MediaRecordId;

const MAX_TITLE_CHARS: usize = 100;
const MAX_CAPTION_CHARS: usize = 500;

/// Text fields of the compose form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecipeForm {
    pub title: String,
    pub caption: Option<String>,
    pub ingredients: Vec<String>,
    pub steps: Vec<String>,
    pub tags: Vec<String>,
}

/// Arguments of the backend's create-post mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    pub ingredients: Vec<String>,
    pub steps: Vec<String>,
    pub media_ids: Vec<MediaRecordId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl RecipeForm {
    pub fn validate(&self) -> AppResult<()> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(AppError::validation("title", "Title is required"));
        }
        if title.chars().count() > MAX_TITLE_CHARS {
            return Err(AppError::validation(
                "title",
                "Title too long (max 100 characters)",
            ));
        }

        if let Some(caption) = &self.caption {
            if caption.chars().count() > MAX_CAPTION_CHARS {
                return Err(AppError::validation(
                    "caption",
                    "Caption too long (max 500 characters)",
                ));
            }
        }

        if self.ingredients.iter().any(|i| i.trim().is_empty()) {
            return Err(AppError::validation(
                "ingredients",
                "Ingredient can't be empty",
            ));
        }

        if self.steps.iter().any(|s| s.trim().is_empty()) {
            return Err(AppError::validation("steps", "Step can't be empty"));
        }

        if self.tags.iter().any(|t| t.trim().is_empty()) {
            return Err(AppError::validation("tags", "Tag can't be empty"));
        }

        Ok(())
    }

    pub fn into_request(self, media_ids: Vec<MediaRecordId>) -> CreatePostRequest {
        fn cleaned(values: Vec<String>) -> Vec<String> {
            values
                .into_iter()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect()
        }

        let caption = self
            .caption
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        let tags = cleaned(self.tags);

        CreatePostRequest {
            title: self.title.trim().to_string(),
            caption,
            ingredients: cleaned(self.ingredients),
            steps: cleaned(self.steps),
            media_ids,
            tags: if tags.is_empty() { None } else { Some(tags) },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> RecipeForm {
        RecipeForm {
            title: "  Shakshuka ".to_string(),
            caption: Some("   ".to_string()),
            ingredients: vec![" eggs ".into(), "tomatoes".into()],
            steps: vec!["Simmer".into(), " Crack eggs ".into()],
            tags: vec![],
        }
    }

    #[test]
    fn test_valid_form() {
        assert!(form().validate().is_ok());
    }

    #[test]
    fn test_title_rules() {
        let mut f = form();
        f.title = "   ".into();
        assert!(matches!(
            f.validate(),
            Err(AppError::Validation { field, .. }) if field == "title"
        ));

        f.title = "x".repeat(101);
        assert!(f.validate().is_err());
    }

    #[test]
    fn test_blank_step_is_invalid() {
        let mut f = form();
        f.steps.push(" ".into());
        assert!(matches!(
            f.validate(),
            Err(AppError::Validation { field, .. }) if field == "steps"
        ));
    }

    #[test]
    fn test_into_request_trims_and_orders_media() {
        let request = form().into_request(vec![
            MediaRecordId::from("m1"),
            MediaRecordId::from("m2"),
        ]);
        assert_eq!(request.title, "Shakshuka");
        assert_eq!(request.caption, None);
        assert_eq!(request.ingredients, vec!["eggs", "tomatoes"]);
        assert_eq!(request.steps, vec!["Simmer", "Crack eggs"]);
        assert_eq!(request.tags, None);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["mediaIds"], serde_json::json!(["m1", "m2"]));
        assert!(json.get("tags").is_none());
    }
}
