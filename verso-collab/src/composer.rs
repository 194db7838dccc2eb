use std::env;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const MODEL: &str = "gemini-2.5-flash";

/// Single-turn client for the external generative text API.
///
/// Everything here treats the model as a black box that turns a prompt into
/// plain text. Formatting fails open: without a configured key, or on any
/// request failure, the caller gets their input back unchanged.
pub struct Composer {
    client: Client,
    api_key: Option<String>,
    base: String,
}

#[derive(Debug, Error)]
pub enum ComposerError {
    /// No API key is configured
    #[error("Generative API key is not configured")]
    MissingKey,
    #[error("FetchError: {0}")]
    FetchError(String),
    #[error("ParseError: {0}")]
    ParseError(String),
}

/// Parameters for a full song composition
#[derive(Debug, Clone)]
pub struct CompositionParams {
    pub key: String,
    pub scale: String,
    pub style: String,
    pub mood: String,
    pub speed: String,
    pub complexity: String,
    pub topics: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl Composer {
    pub fn new(api_key: Option<String>, base: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base: base.into(),
        }
    }

    /// Reads `VERSO_GENAI_KEY` and `VERSO_GENAI_URL` from the environment.
    /// A missing key is fine; formatting degrades to a pass-through.
    pub fn from_env() -> Self {
        let api_key = env::var("VERSO_GENAI_KEY").ok().filter(|k| !k.is_empty());
        let base = env::var("VERSO_GENAI_URL").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());

        Self::new(api_key, base)
    }

    /// Cleans up raw pasted lyrics and chords. Returns the input unchanged
    /// when no key is configured or the request fails.
    pub async fn format_song_content(&self, raw: &str) -> String {
        let prompt = format!(
            "You are a professional music editor. I will provide you with raw text \
             that contains lyrics and chords, likely copied from a website. \
             Please format this text to be clean and readable for a musician.\n\n\
             Rules:\n\
             1. Place chords strictly above the lyrics they correspond to.\n\
             2. Use standard chord notation (e.g., C, Am, F#m7).\n\
             3. If there are sections (Verse, Chorus), label them clearly in [Brackets].\n\
             4. Remove any website UI artifacts (like \"Menu\", \"Search\", \"Print\", advertisements).\n\
             5. Return ONLY the formatted plain text content. No markdown code blocks, just the text.\n\n\
             Raw Text:\n{raw}"
        );

        match self.generate(prompt).await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => raw.to_string(),
            Err(ComposerError::MissingKey) => {
                log::warn!("Generative API key is missing, skipping formatting");
                raw.to_string()
            }
            Err(e) => {
                log::warn!("Could not format song content: {e}");
                raw.to_string()
            }
        }
    }

    /// Composes a complete song chord sheet from the given parameters
    pub async fn generate_song(&self, params: &CompositionParams) -> Result<String, ComposerError> {
        let prompt = format!(
            "Act as a professional songwriter and composer. I need you to compose a complete song.\n\n\
             Parameters:\n\
             - Key: {} {}\n\
             - Style/Genre: {}\n\
             - Mood: {}\n\
             - Tempo: {}\n\
             - Harmonic Complexity: {}\n\
             - Lyrical Themes/Keywords: {}\n\n\
             Instructions:\n\
             1. Create a full song structure (Intro, Verse 1, Chorus, Verse 2, Bridge, Chorus, Outro).\n\
             2. Write original lyrics based on the themes provided.\n\
             3. Provide the Chords above the lyrics.\n\
             4. Include performance notes for each section (e.g., \"Drums enter here\", \"Soft piano only\").\n\
             5. Return the result in plain text format suitable for a chord sheet.",
            params.key,
            params.scale,
            params.style,
            params.mood,
            params.speed,
            params.complexity,
            params.topics
        );

        self.generate(prompt).await
    }

    /// Suggests song titles for a genre. Empty on any failure.
    pub async fn suggest_setlist_ideas(&self, genre: &str) -> Vec<String> {
        let prompt = format!(
            "Suggest 5 popular songs for a band playing {genre} music. \
             Return only the song titles separated by commas."
        );

        match self.generate(prompt).await {
            Ok(text) => split_titles(&text),
            Err(e) => {
                log::warn!("Could not suggest setlist ideas: {e}");
                vec![]
            }
        }
    }

    async fn generate(&self, prompt: String) -> Result<String, ComposerError> {
        let api_key = self.api_key.as_ref().ok_or(ComposerError::MissingKey)?;

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base, MODEL, api_key
        );
        let url = Url::parse(&url).map_err(|e| ComposerError::FetchError(e.to_string()))?;

        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ComposerError::FetchError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ComposerError::FetchError(format!("{status}: {text}")));
        }

        let result: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ComposerError::ParseError(e.to_string()))?;

        let text = result
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        Ok(text)
    }
}

fn split_titles(text: &str) -> Vec<String> {
    text.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_format_fails_open_without_key() {
        let composer = Composer::new(None, DEFAULT_API_BASE);

        let raw = "Am       F\nHello darkness my old friend";
        assert_eq!(composer.format_song_content(raw).await, raw);
    }

    #[tokio::test]
    async fn test_suggestions_are_empty_without_key() {
        let composer = Composer::new(None, DEFAULT_API_BASE);
        assert!(composer.suggest_setlist_ideas("grunge").await.is_empty());
    }

    #[tokio::test]
    async fn test_generate_song_requires_key() {
        let composer = Composer::new(None, DEFAULT_API_BASE);

        let params = CompositionParams {
            key: "E".to_string(),
            scale: "minor".to_string(),
            style: "grunge".to_string(),
            mood: "brooding".to_string(),
            speed: "mid".to_string(),
            complexity: "simple".to_string(),
            topics: "rain".to_string(),
        };

        let result = composer.generate_song(&params).await;
        assert!(matches!(result, Err(ComposerError::MissingKey)));
    }

    #[test]
    fn test_split_titles() {
        assert_eq!(
            split_titles("Black, Creep , Alive,,"),
            vec!["Black", "Creep", "Alive"]
        );
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{
            "candidates": [
                { "content": { "parts": [ { "text": "formatted" } ] } }
            ]
        }"#;

        let parsed: GenerateResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.candidates[0].content.parts[0].text, "formatted");
    }
}
