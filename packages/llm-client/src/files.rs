//! File inputs attached to LLM requests.
//!
//! Images travel as data URLs at low detail. PDFs arrive already decoded to
//! one image per page and are flattened into the user message at high
//! detail, one part per page.

use serde::{Deserialize, Serialize};

use crate::types::{ContentPart, ImageUrl};

/// A file attached to a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FileInput {
    /// A single image, as a data URL (`data:image/png;base64,...`).
    Image { url: String },

    /// A PDF decoded to per-page images, each a data URL.
    Pdf { pages: Vec<String> },
}

impl FileInput {
    /// Expand this file into message content parts.
    pub fn to_content_parts(&self) -> Vec<ContentPart> {
        match self {
            FileInput::Image { url } => vec![ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: url.clone(),
                    detail: Some("low".to_string()),
                },
            }],
            FileInput::Pdf { pages } => pages
                .iter()
                .map(|page| ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: page.clone(),
                        detail: Some("high".to_string()),
                    },
                })
                .collect(),
        }
    }
}

/// Flatten a question plus attached files into message content parts.
pub fn build_content_parts(question: &str, files: &[FileInput]) -> Vec<ContentPart> {
    let mut parts = vec![ContentPart::Text {
        text: question.to_string(),
    }];
    for file in files {
        parts.extend(file.to_content_parts());
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_is_low_detail() {
        let file = FileInput::Image {
            url: "data:image/png;base64,AAAA".into(),
        };
        let parts = file.to_content_parts();
        assert_eq!(parts.len(), 1);
        match &parts[0] {
            ContentPart::ImageUrl { image_url } => {
                assert_eq!(image_url.detail.as_deref(), Some("low"));
            }
            other => panic!("unexpected part: {other:?}"),
        }
    }

    #[test]
    fn test_pdf_pages_are_high_detail() {
        let file = FileInput::Pdf {
            pages: vec![
                "data:image/png;base64,AAAA".into(),
                "data:image/png;base64,BBBB".into(),
            ],
        };
        let parts = file.to_content_parts();
        assert_eq!(parts.len(), 2);
        for part in parts {
            match part {
                ContentPart::ImageUrl { image_url } => {
                    assert_eq!(image_url.detail.as_deref(), Some("high"));
                }
                other => panic!("unexpected part: {other:?}"),
            }
        }
    }

    #[test]
    fn test_build_content_parts_leads_with_question() {
        let parts = build_content_parts(
            "what is on this receipt?",
            &[FileInput::Image {
                url: "data:image/jpeg;base64,CCCC".into(),
            }],
        );
        assert_eq!(parts.len(), 2);
        match &parts[0] {
            ContentPart::Text { text } => assert_eq!(text, "what is on this receipt?"),
            other => panic!("unexpected part: {other:?}"),
        }
    }

    #[test]
    fn test_wire_format_round_trip() {
        let json = r#"{"type":"pdf","pages":["data:image/png;base64,AAAA"]}"#;
        let file: FileInput = serde_json::from_str(json).unwrap();
        match &file {
            FileInput::Pdf { pages } => assert_eq!(pages.len(), 1),
            other => panic!("unexpected file: {other:?}"),
        }
    }
}
