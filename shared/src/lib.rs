use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PredictionResponse {
    pub predicted_yield: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DiagnosisResponse {
    pub result: String,
    #[serde(rename = "plantType")]
    pub plant_type: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// A single feed entry as exposed by the news endpoints.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NewsArticle {
    pub id: usize,
    pub title: String,
    pub link: String,
    pub published: String,
    pub summary: String,
    pub source: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NewsResponse {
    pub success: bool,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub query: Option<String>,
    pub articles: Vec<NewsArticle>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NewsErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}
