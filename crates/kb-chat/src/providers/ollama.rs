//! Ollama generation provider with NDJSON streaming

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{Error, Result};

use super::llm::{FragmentStream, LlmProvider};

/// Ollama LLM provider for streamed answer generation
pub struct OllamaLlm {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

impl OllamaLlm {
    /// Create a new Ollama provider
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.generate_model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl LlmProvider for OllamaLlm {
    async fn generate_stream(&self, prompt: &str) -> Result<FragmentStream> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: true,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };

        tracing::info!("Generating answer with model: {}", self.model);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::generation(format!("Stream request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::generation(format!(
                "Stream failed: HTTP {} - {}",
                status, body
            )));
        }

        Ok(decode_ndjson(Box::pin(response.bytes_stream())).boxed())
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// What a single NDJSON line contributes to the answer
#[derive(Debug, PartialEq)]
enum Line {
    Fragment(String),
    Done(String),
    Blank,
}

fn parse_line(line: &[u8]) -> Result<Line> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim();
    if line.is_empty() {
        return Ok(Line::Blank);
    }

    let chunk: StreamChunk = serde_json::from_str(line)
        .map_err(|e| Error::generation(format!("Malformed stream line: {}", e)))?;

    if let Some(error) = chunk.error {
        return Err(Error::generation(format!("Model error: {}", error)));
    }

    if chunk.done {
        Ok(Line::Done(chunk.response))
    } else {
        Ok(Line::Fragment(chunk.response))
    }
}

struct DecoderState<S> {
    inner: S,
    buffer: Vec<u8>,
    /// Trailing fragment carried by the `done` line
    tail: Option<String>,
    eof: bool,
    finished: bool,
}

/// Reassemble NDJSON lines split across network chunks into fragments.
///
/// Ends after the `done` line; a stream that stops before it, a transport
/// error or a malformed line yields one error and then ends.
fn decode_ndjson<S, E>(inner: S) -> impl Stream<Item = Result<String>>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: Display,
{
    let state = DecoderState {
        inner,
        buffer: Vec::new(),
        tail: None,
        eof: false,
        finished: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if state.finished {
                return state
                    .tail
                    .take()
                    .filter(|t| !t.is_empty())
                    .map(|t| (Ok(t), state));
            }

            if let Some(pos) = state.buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = state.buffer.drain(..=pos).collect();
                match parse_line(&line) {
                    Ok(Line::Fragment(text)) if !text.is_empty() => return Some((Ok(text), state)),
                    Ok(Line::Fragment(_)) | Ok(Line::Blank) => continue,
                    Ok(Line::Done(text)) => {
                        state.finished = true;
                        state.tail = Some(text);
                        continue;
                    }
                    Err(e) => {
                        state.finished = true;
                        return Some((Err(e), state));
                    }
                }
            }

            let next = if state.eof {
                None
            } else {
                state.inner.next().await
            };

            match next {
                Some(Ok(bytes)) => state.buffer.extend_from_slice(&bytes),
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(Error::generation(format!("Stream error: {}", e))), state));
                }
                None => {
                    state.eof = true;
                    // Last line may lack a trailing newline
                    if !state.buffer.iter().all(u8::is_ascii_whitespace) {
                        state.buffer.push(b'\n');
                        continue;
                    }
                    state.finished = true;
                    return Some((
                        Err(Error::generation("Stream ended before completion")),
                        state,
                    ));
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn byte_stream(parts: Vec<&'static str>) -> impl Stream<Item = std::result::Result<Bytes, String>> + Unpin {
        futures::stream::iter(parts.into_iter().map(|p| Ok(Bytes::from_static(p.as_bytes()))))
    }

    async fn collect(parts: Vec<&'static str>) -> Vec<Result<String>> {
        decode_ndjson(byte_stream(parts)).collect().await
    }

    #[tokio::test]
    async fn test_fragments_in_order() {
        let out = collect(vec![
            "{\"response\":\"The \",\"done\":false}\n",
            "{\"response\":\"answer \",\"done\":false}\n{\"response\":\"is 42.\",\"done\":false}\n",
            "{\"response\":\"\",\"done\":true}\n",
        ])
        .await;

        let fragments: Vec<String> = out.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(fragments, vec!["The ", "answer ", "is 42."]);
    }

    #[tokio::test]
    async fn test_lines_split_across_chunks() {
        let out = collect(vec![
            "{\"response\":\"Hel",
            "lo\",\"done\":false}\n{\"resp",
            "onse\":\" world\",\"done\":true}",
        ])
        .await;

        let fragments: Vec<String> = out.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(fragments, vec!["Hello", " world"]);
    }

    #[tokio::test]
    async fn test_truncated_stream_is_an_error() {
        let out = collect(vec!["{\"response\":\"partial\",\"done\":false}\n"]).await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].as_ref().unwrap(), "partial");
        assert!(matches!(out[1], Err(Error::Generation(_))));
    }

    #[tokio::test]
    async fn test_malformed_line_stops_stream() {
        let out = collect(vec![
            "not json\n",
            "{\"response\":\"never seen\",\"done\":true}\n",
        ])
        .await;
        assert_eq!(out.len(), 1);
        assert!(out[0].is_err());
    }

    #[tokio::test]
    async fn test_model_error_line() {
        let out = collect(vec!["{\"error\":\"model not found\"}\n"]).await;
        assert_eq!(out.len(), 1);
        assert!(out[0].as_ref().unwrap_err().to_string().contains("model not found"));
    }

    #[test]
    fn test_parse_blank_line() {
        assert_eq!(parse_line(b"  \r\n").unwrap(), Line::Blank);
    }
}
