//! Summarization flow: condense an existing diagnostic report.

use super::{parse_output, FlowError};
use crate::services::genai::{GenerationParams, InlineImage, TextModel};
use crate::utils::data_uri::{validate_image_data_uri, DataUri};
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

const PROMPT_TEMPLATE: &str = "You are an expert medical summarizer. You will be provided with an X-ray image and a pre-existing diagnostic report. Your task is to summarize the key findings from the report.

Report: {report}";

#[derive(Debug, Validate)]
pub struct SummarizeReportInput {
    /// The X-ray image the report describes, as a data URI.
    #[validate(custom(function = validate_image_data_uri))]
    pub photo_data_uri: String,
    /// The pre-existing diagnostic report to summarize.
    #[validate(length(min = 1))]
    pub report: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SummarizeReportOutput {
    /// The summarized diagnostic report.
    pub summary: String,
}

fn output_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "summary": { "type": "STRING" },
        },
        "required": ["summary"],
    })
}

pub async fn run(
    model: &dyn TextModel,
    input: SummarizeReportInput,
) -> Result<SummarizeReportOutput, FlowError> {
    input.validate()?;

    let image = DataUri::parse(&input.photo_data_uri)
        .map(|uri| InlineImage::from(&uri))
        .map_err(|e| FlowError::MalformedOutput(e.to_string()))?;

    let prompt = PROMPT_TEMPLATE.replace("{report}", &input.report);

    let params = GenerationParams {
        output_schema: Some(output_schema()),
        ..Default::default()
    };

    let response = model.generate(&prompt, Some(&image), &params).await?;
    parse_output(response)
}
