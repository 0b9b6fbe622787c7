//! Validation flow: is the uploaded image actually a medical X-ray?

use super::{parse_output, FlowError};
use crate::services::genai::{GenerationParams, InlineImage, TextModel};
use crate::utils::data_uri::{validate_image_data_uri, DataUri};
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

const PROMPT: &str = "You are an image classification expert. Your task is to determine if the provided image is a medical X-ray.

Analyze the image and respond with a JSON object.

- If the image is a medical X-ray, set 'isXray' to true.
- If the image is NOT a medical X-ray, set 'isXray' to false and provide a brief 'reason'.";

#[derive(Debug, Validate)]
pub struct ValidateXrayInput {
    /// The image as a data URI with MIME type and base64 payload.
    #[validate(custom(function = validate_image_data_uri))]
    pub xray_image_data_uri: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateXrayOutput {
    /// Whether or not the image is a medical X-ray.
    pub is_xray: bool,
    /// A brief explanation for the decision, especially if it is not an X-ray.
    pub reason: String,
}

fn output_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "isXray": { "type": "BOOLEAN" },
            "reason": { "type": "STRING" },
        },
        "required": ["isXray", "reason"],
    })
}

pub async fn run(
    model: &dyn TextModel,
    input: ValidateXrayInput,
) -> Result<ValidateXrayOutput, FlowError> {
    input.validate()?;

    // Safe after validation.
    let image = DataUri::parse(&input.xray_image_data_uri)
        .map(|uri| InlineImage::from(&uri))
        .map_err(|e| FlowError::MalformedOutput(e.to_string()))?;

    let params = GenerationParams {
        output_schema: Some(output_schema()),
        ..Default::default()
    };

    let response = model.generate(PROMPT, Some(&image), &params).await?;
    parse_output(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::genai::mock::MockTextModel;

    fn image_uri() -> String {
        DataUri::from_bytes("image/png", b"xray bytes").to_string()
    }

    #[tokio::test]
    async fn rejects_bad_input_before_model_call() {
        let model = MockTextModel::new(Vec::<String>::new());
        let input = ValidateXrayInput {
            xray_image_data_uri: "not a data uri".to_string(),
        };

        let result = run(&model, input).await;
        assert!(matches!(result, Err(FlowError::InvalidInput(_))));
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn parses_verdict() {
        let model =
            MockTextModel::new([r#"{"isXray": false, "reason": "not a medical image"}"#]);
        let input = ValidateXrayInput {
            xray_image_data_uri: image_uri(),
        };

        let output = run(&model, input).await.unwrap();
        assert!(!output.is_xray);
        assert_eq!(output.reason, "not a medical image");
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn malformed_reply_is_an_error() {
        let model = MockTextModel::new(["this is not json"]);
        let input = ValidateXrayInput {
            xray_image_data_uri: image_uri(),
        };

        let result = run(&model, input).await;
        assert!(matches!(result, Err(FlowError::MalformedOutput(_))));
    }
}
