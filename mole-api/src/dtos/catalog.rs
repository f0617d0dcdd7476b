use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BodyPartInput {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[serde(default)]
    pub displayed: bool,
    /// Older clients send the image under `type`.
    #[serde(default, alias = "type")]
    pub image: String,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub parent: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct QuestionInput {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[serde(rename = "type")]
    #[validate(length(min = 1, message = "Type is required"))]
    pub kind: String,
    #[serde(default = "empty_answers")]
    pub answers: serde_json::Value,
    #[serde(default)]
    pub displayed: bool,
    #[serde(default)]
    pub order: i64,
}

fn empty_answers() -> serde_json::Value {
    serde_json::Value::Array(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn body_part_accepts_legacy_image_key() {
        let input: BodyPartInput =
            serde_json::from_value(json!({"name": "Arm", "type": "arm.png", "order": 3})).unwrap();
        assert_eq!(input.image, "arm.png");
        assert!(!input.displayed);
        assert!(input.validate().is_ok());
    }

    #[test]
    fn question_requires_name_and_type() {
        let input: QuestionInput =
            serde_json::from_value(json!({"name": "", "type": "radio"})).unwrap();
        assert!(input.validate().is_err());
        assert_eq!(input.answers, json!([]));
    }
}
