use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Prompt used when the client does not send one.
pub const DEFAULT_PROMPT: &str = "page.";

/// Output encodings the service can return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    #[default]
    B64Json,
}

impl ResponseFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseFormat::B64Json => "b64_json",
        }
    }
}

impl fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "b64_json" => Ok(ResponseFormat::B64Json),
            other => Err(other.to_string()),
        }
    }
}

/// An image edit request as received from the client.
#[derive(Debug, Clone)]
pub struct EditRequest {
    /// Raw uploaded image files, in upload order.
    pub images: Vec<Vec<u8>>,
    pub prompt: String,
    /// Requested response format, unvalidated.
    pub response_format: String,
}

impl EditRequest {
    pub fn new(images: Vec<Vec<u8>>) -> Self {
        Self {
            images,
            prompt: DEFAULT_PROMPT.to_string(),
            response_format: ResponseFormat::default().to_string(),
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn with_response_format(mut self, format: impl Into<String>) -> Self {
        self.response_format = format.into();
        self
    }
}

/// One cropped image in the response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditedImage {
    /// Base64-encoded PNG.
    pub b64_json: String,
}

/// Response body, one `data` entry per input image in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditResponse {
    /// Unix seconds at which the response was assembled.
    pub created: i64,
    pub data: Vec<EditedImage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_format_parses_only_b64_json() {
        assert_eq!("b64_json".parse::<ResponseFormat>(), Ok(ResponseFormat::B64Json));
        assert_eq!("url".parse::<ResponseFormat>(), Err("url".to_string()));
        assert!("B64_JSON".parse::<ResponseFormat>().is_err());
    }

    #[test]
    fn request_defaults() {
        let req = EditRequest::new(vec![vec![1, 2, 3]]);
        assert_eq!(req.prompt, "page.");
        assert_eq!(req.response_format, "b64_json");
    }

    #[test]
    fn response_serializes_in_openai_shape() {
        let resp = EditResponse {
            created: 1_700_000_000,
            data: vec![EditedImage {
                b64_json: "AAAA".into(),
            }],
        };
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"created": 1_700_000_000, "data": [{"b64_json": "AAAA"}]})
        );
    }
}
