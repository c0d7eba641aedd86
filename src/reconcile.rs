use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::Context;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::util::write_json_pretty;

pub const MAX_ATTEMPTS: u32 = 3;

/// The text-generation collaborator. Implementations may return empty text;
/// the reconciler treats that as a terminal failure, not a retry.
pub trait Completion {
    fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("completion service returned no usable output")]
    EmptyCompletion,
    #[error("completion output was not valid JSON after {attempts} attempts: {last_error}")]
    InvalidJson { attempts: u32, last_error: String },
    #[error("completion request failed")]
    Completion(#[source] anyhow::Error),
    #[error("failed to persist reconciled document to {path}")]
    Persist {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

/// What the collaborator is asked to produce: a blank template filled from
/// scratch, or an existing specification document verified and corrected.
#[derive(Debug, Clone)]
pub enum FillTarget {
    Template(Value),
    Existing(Value),
}

#[derive(Debug)]
pub struct ReconcileOutcome {
    pub document: Value,
    pub attempts: u32,
}

enum State {
    Compose,
    Generate { attempt: u32, prompt: String },
    Validate { attempt: u32, prompt: String, output: String },
}

pub struct Reconciler<'a> {
    completion: &'a dyn Completion,
    artifact_path: PathBuf,
    fence_pattern: Regex,
    max_attempts: u32,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        completion: &'a dyn Completion,
        artifact_path: impl Into<PathBuf>,
    ) -> anyhow::Result<Self> {
        let fence_pattern = Regex::new(r"(?m)^```[A-Za-z]*[ \t]*\r?\n?")
            .context("failed to compile code fence pattern")?;
        Ok(Self {
            completion,
            artifact_path: artifact_path.into(),
            fence_pattern,
            max_attempts: MAX_ATTEMPTS,
        })
    }

    /// Drives the Compose → Generate → Validate loop until a parseable
    /// document is produced or the attempt cap is reached. The prompt is
    /// composed once and re-sent verbatim on every retry. On success the
    /// parsed document fully overwrites the output artifact.
    pub fn reconcile(
        &self,
        product_name: &str,
        scraped: &[(String, String)],
        target: &FillTarget,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let mut state = State::Compose;

        loop {
            state = match state {
                State::Compose => State::Generate {
                    attempt: 1,
                    prompt: compose_prompt(product_name, scraped, target),
                },
                State::Generate { attempt, prompt } => {
                    let output = self
                        .completion
                        .complete(&prompt)
                        .map_err(ReconcileError::Completion)?;
                    State::Validate {
                        attempt,
                        prompt,
                        output,
                    }
                }
                State::Validate {
                    attempt,
                    prompt,
                    output,
                } => {
                    if output.trim().is_empty() {
                        return Err(ReconcileError::EmptyCompletion);
                    }

                    let stripped = self.strip_code_fences(&output);
                    match serde_json::from_str::<Value>(stripped.trim()) {
                        Ok(document) => {
                            self.persist(&document)?;
                            info!(
                                attempts = attempt,
                                path = %self.artifact_path.display(),
                                "reconciled document persisted"
                            );
                            return Ok(ReconcileOutcome {
                                document,
                                attempts: attempt,
                            });
                        }
                        Err(parse_error) => {
                            if attempt >= self.max_attempts {
                                return Err(ReconcileError::InvalidJson {
                                    attempts: attempt,
                                    last_error: parse_error.to_string(),
                                });
                            }
                            warn!(
                                attempt,
                                error = %parse_error,
                                "completion output was not valid JSON, regenerating"
                            );
                            State::Generate {
                                attempt: attempt + 1,
                                prompt,
                            }
                        }
                    }
                }
            };
        }
    }

    fn strip_code_fences(&self, text: &str) -> String {
        self.fence_pattern.replace_all(text.trim(), "").into_owned()
    }

    fn persist(&self, document: &Value) -> Result<(), ReconcileError> {
        write_json_pretty(&self.artifact_path, document).map_err(|source| {
            ReconcileError::Persist {
                path: self.artifact_path.clone(),
                source,
            }
        })
    }
}

/// Builds the instruction for the collaborator: the product identifier, the
/// per-source scraped specification text, and either the blank template or
/// the existing document to correct. Field names must survive verbatim and
/// unknown fields stay blank or unchanged.
pub fn compose_prompt(
    product_name: &str,
    scraped: &[(String, String)],
    target: &FillTarget,
) -> String {
    let mut prompt = String::new();

    let _ = writeln!(
        prompt,
        "We are assembling specifications for the following product: {product_name}."
    );
    let _ = writeln!(
        prompt,
        "These specification texts were collected from trusted sources:\n"
    );
    for (source, text) in scraped {
        let _ = writeln!(prompt, "### {source}\n{text}\n");
    }

    match target {
        FillTarget::Template(template) => {
            let _ = writeln!(
                prompt,
                "Using this information, fill in the JSON template as best as you can. \
                 You must focus on filling it in."
            );
            let _ = writeln!(prompt, "If something is unknown, leave it blank.");
            let _ = writeln!(
                prompt,
                "Keep every field name exactly as written, without changing case or delimiters.\n"
            );
            let _ = writeln!(prompt, "Template:\n{}\n", pretty_json(template));
        }
        FillTarget::Existing(document) => {
            let _ = writeln!(
                prompt,
                "Using this information, verify and correct the existing specification \
                 document below."
            );
            let _ = writeln!(
                prompt,
                "Keep every field name exactly as written, without changing case or delimiters."
            );
            let _ = writeln!(prompt, "Leave fields you cannot confirm unchanged.\n");
            let _ = writeln!(prompt, "Current document:\n{}\n", pretty_json(document));
        }
    }

    prompt.push_str("Return only valid JSON.");
    prompt
}

fn pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::fs;

    use serde_json::json;

    use super::{Completion, FillTarget, ReconcileError, Reconciler, compose_prompt};

    struct ScriptedCompletion {
        responses: RefCell<VecDeque<String>>,
        calls: Cell<u32>,
    }

    impl ScriptedCompletion {
        fn new(responses: &[&str]) -> Self {
            Self {
                responses: RefCell::new(
                    responses.iter().map(|response| response.to_string()).collect(),
                ),
                calls: Cell::new(0),
            }
        }
    }

    impl Completion for ScriptedCompletion {
        fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
            self.calls.set(self.calls.get() + 1);
            Ok(self
                .responses
                .borrow_mut()
                .pop_front()
                .unwrap_or_default())
        }
    }

    fn scraped_fixture() -> Vec<(String, String)> {
        vec![(
            "nvidia.com".to_string(),
            "Video Memory: 8 GB GDDR6".to_string(),
        )]
    }

    fn template_target() -> FillTarget {
        FillTarget::Template(json!({"Memory": {"Video_Memory": ""}}))
    }

    #[test]
    fn fenced_valid_json_succeeds_on_first_attempt() {
        let dir = tempfile::tempdir().expect("tempdir");
        let artifact = dir.path().join("output.json");
        let completion = ScriptedCompletion::new(&[
            "```json\n{\"Memory\": {\"Video_Memory\": \"8 GB\"}}\n```",
        ]);

        let reconciler = Reconciler::new(&completion, &artifact).expect("reconciler");
        let outcome = reconciler
            .reconcile("RTX 4060 Ti", &scraped_fixture(), &template_target())
            .expect("reconcile should succeed");

        assert_eq!(outcome.attempts, 1);
        assert_eq!(completion.calls.get(), 1);
        assert_eq!(outcome.document, json!({"Memory": {"Video_Memory": "8 GB"}}));

        let persisted: serde_json::Value =
            serde_json::from_slice(&fs::read(&artifact).expect("read artifact"))
                .expect("artifact should parse");
        assert_eq!(persisted, outcome.document);
    }

    #[test]
    fn malformed_output_is_retried_with_the_same_prompt() {
        let dir = tempfile::tempdir().expect("tempdir");
        let artifact = dir.path().join("output.json");
        let completion =
            ScriptedCompletion::new(&["not json at all", "{\"Memory\": broken", "{\"ok\": true}"]);

        let reconciler = Reconciler::new(&completion, &artifact).expect("reconciler");
        let outcome = reconciler
            .reconcile("RTX 4060 Ti", &scraped_fixture(), &template_target())
            .expect("third attempt should succeed");

        assert_eq!(outcome.attempts, 3);
        assert_eq!(completion.calls.get(), 3);
    }

    #[test]
    fn exhausted_attempts_surface_the_last_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let artifact = dir.path().join("output.json");
        let completion = ScriptedCompletion::new(&["nope", "still nope", "never json"]);

        let reconciler = Reconciler::new(&completion, &artifact).expect("reconciler");
        let error = reconciler
            .reconcile("RTX 4060 Ti", &scraped_fixture(), &template_target())
            .expect_err("reconcile should fail");

        assert_eq!(completion.calls.get(), 3);
        match error {
            ReconcileError::InvalidJson {
                attempts,
                last_error,
            } => {
                assert_eq!(attempts, 3);
                assert!(!last_error.is_empty());
            }
            other => panic!("expected InvalidJson, got {other:?}"),
        }
        assert!(!artifact.exists());
    }

    #[test]
    fn empty_output_fails_immediately_without_retry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let artifact = dir.path().join("output.json");
        let completion = ScriptedCompletion::new(&["", "{\"ok\": true}"]);

        let reconciler = Reconciler::new(&completion, &artifact).expect("reconciler");
        let error = reconciler
            .reconcile("RTX 4060 Ti", &scraped_fixture(), &template_target())
            .expect_err("reconcile should fail");

        assert_eq!(completion.calls.get(), 1);
        assert!(matches!(error, ReconcileError::EmptyCompletion));
    }

    #[test]
    fn artifact_is_fully_overwritten_on_each_success() {
        let dir = tempfile::tempdir().expect("tempdir");
        let artifact = dir.path().join("output.json");

        let first = ScriptedCompletion::new(&["{\"run\": 1}"]);
        Reconciler::new(&first, &artifact)
            .expect("reconciler")
            .reconcile("RTX 4060 Ti", &scraped_fixture(), &template_target())
            .expect("first run");

        let second = ScriptedCompletion::new(&["{\"run\": 2}"]);
        Reconciler::new(&second, &artifact)
            .expect("reconciler")
            .reconcile("RTX 4060 Ti", &scraped_fixture(), &template_target())
            .expect("second run");

        let persisted: serde_json::Value =
            serde_json::from_slice(&fs::read(&artifact).expect("read artifact"))
                .expect("artifact should parse");
        assert_eq!(persisted, json!({"run": 2}));
    }

    #[test]
    fn prompt_embeds_product_sources_and_template() {
        let prompt = compose_prompt(
            "RTX 4060 Ti",
            &scraped_fixture(),
            &FillTarget::Template(json!({"Memory": {"Video_Memory": ""}})),
        );

        assert!(prompt.contains("RTX 4060 Ti"));
        assert!(prompt.contains("### nvidia.com"));
        assert!(prompt.contains("Video Memory: 8 GB GDDR6"));
        assert!(prompt.contains("Video_Memory"));
        assert!(prompt.contains("Return only valid JSON."));
    }

    #[test]
    fn repair_prompt_embeds_the_existing_document() {
        let prompt = compose_prompt(
            "RTX 4060 Ti",
            &scraped_fixture(),
            &FillTarget::Existing(json!({"specs": [{"spec": "Video_Memory", "value": "8 GB"}]})),
        );

        assert!(prompt.contains("existing specification"));
        assert!(prompt.contains("Video_Memory"));
        assert!(prompt.contains("Leave fields you cannot confirm unchanged."));
    }
}
