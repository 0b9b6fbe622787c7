//! Report flow: a structured markdown diagnostic report for an X-ray.

use super::{parse_output, FlowError};
use crate::services::genai::{GenerationParams, InlineImage, TextModel};
use crate::utils::data_uri::{validate_image_data_uri, DataUri};
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

const PROMPT_TEMPLATE: &str = "You are a highly skilled medical imaging expert with extensive knowledge in radiology and diagnostic imaging. Analyze the patient's medical image and structure your response as follows:

## 1. Image Type & Region
- Specify imaging modality (X-ray/MRI/CT/Ultrasound/etc.)
- Identify the patient's anatomical region and positioning
- Comment on image quality and technical adequacy

## 2. Key Findings
- List primary observations systematically
- Note any abnormalities in the patient's imaging with precise descriptions
- Include measurements and densities where relevant
- Describe location, size, shape, and characteristics
- Rate severity: Normal/Mild/Moderate/Severe

## 3. Diagnostic Assessment
- Provide primary diagnosis with confidence level
- List differential diagnoses in order of likelihood
- Support each diagnosis with observed evidence from the patient's imaging
- Note any critical or urgent findings

## 4. Patient-Friendly Explanation
- Explain the findings in simple, clear language that the patient can understand
- Avoid medical jargon or provide clear definitions
- Include visual analogies if helpful
- Address common patient concerns related to these findings

Format your response using clear markdown headers and bullet points. Be concise yet thorough.

Generate the report in the specified language ({language}).

Patient Details: {patient_details}";

#[derive(Debug, Validate)]
pub struct GenerateReportInput {
    /// The X-ray image as a data URI with MIME type and base64 payload.
    #[validate(custom(function = validate_image_data_uri))]
    pub xray_image_data_uri: String,
    /// Additional details about the patient, if available.
    pub patient_details: Option<String>,
    /// The language for the report (e.g. "en" or "es").
    pub language: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateReportOutput {
    /// The generated diagnostic report, as markdown.
    pub report: String,
}

fn output_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "report": { "type": "STRING" },
        },
        "required": ["report"],
    })
}

fn build_prompt(patient_details: Option<&str>, language: Option<&str>) -> String {
    PROMPT_TEMPLATE
        .replace("{language}", language.unwrap_or("en"))
        .replace("{patient_details}", patient_details.unwrap_or("none"))
}

pub async fn run(
    model: &dyn TextModel,
    input: GenerateReportInput,
) -> Result<GenerateReportOutput, FlowError> {
    input.validate()?;

    let image = DataUri::parse(&input.xray_image_data_uri)
        .map(|uri| InlineImage::from(&uri))
        .map_err(|e| FlowError::MalformedOutput(e.to_string()))?;

    let prompt = build_prompt(input.patient_details.as_deref(), input.language.as_deref());

    let params = GenerationParams {
        output_schema: Some(output_schema()),
        ..Default::default()
    };

    let response = model.generate(&prompt, Some(&image), &params).await?;
    parse_output(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::genai::mock::MockTextModel;

    fn image_uri() -> String {
        DataUri::from_bytes("image/jpeg", b"xray bytes").to_string()
    }

    #[test]
    fn prompt_carries_language_and_details() {
        let prompt = build_prompt(Some("adult male, persistent cough"), Some("es"));
        assert!(prompt.contains("specified language (es)"));
        assert!(prompt.contains("Patient Details: adult male, persistent cough"));
    }

    #[test]
    fn prompt_defaults_to_english_without_details() {
        let prompt = build_prompt(None, None);
        assert!(prompt.contains("specified language (en)"));
        assert!(prompt.contains("Patient Details: none"));
    }

    #[tokio::test]
    async fn rejects_unsupported_image_type_before_model_call() {
        let model = MockTextModel::new(Vec::<String>::new());
        let input = GenerateReportInput {
            xray_image_data_uri: DataUri::from_bytes("application/pdf", b"%PDF").to_string(),
            patient_details: None,
            language: None,
        };

        let result = run(&model, input).await;
        assert!(matches!(result, Err(FlowError::InvalidInput(_))));
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn parses_report() {
        let model =
            MockTextModel::new([r###"{"report": "## 1. Image Type & Region\nChest X-ray"}"###]);
        let input = GenerateReportInput {
            xray_image_data_uri: image_uri(),
            patient_details: None,
            language: Some("en".to_string()),
        };

        let output = run(&model, input).await.unwrap();
        assert!(output.report.starts_with("## 1. Image Type & Region"));
    }
}
