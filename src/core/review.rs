use tracing::{info, warn};

use crate::adapters::llm::{AnalysisError, LLMAdapter, LLMRequest, ModelConfig, ProviderKind};
use crate::config::ConfigError;
use crate::core::diff::{DiffError, DiffGenerator};
use crate::core::git::{FetchError, RevisionSource};
use crate::core::prompt::{FileDiff, PromptBuilder};

/// Everything one run needs. Only constructible through [`AnalysisRequest::new`],
/// which rejects an empty file list or blank revisions.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    files: Vec<String>,
    source_revision: String,
    target_revision: String,
    provider: ProviderKind,
    model: String,
    credential: String,
}

impl AnalysisRequest {
    pub fn new(
        files: Vec<String>,
        source_revision: impl Into<String>,
        target_revision: impl Into<String>,
        provider: ProviderKind,
        model: impl Into<String>,
        credential: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let source_revision = source_revision.into();
        let target_revision = target_revision.into();
        let files: Vec<String> = files
            .into_iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();

        if files.is_empty()
            || source_revision.trim().is_empty()
            || target_revision.trim().is_empty()
        {
            return Err(ConfigError::MissingInput);
        }

        Ok(Self {
            files,
            source_revision,
            target_revision,
            provider,
            model: model.into(),
            credential: credential.into(),
        })
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn source_revision(&self) -> &str {
        &self.source_revision
    }

    pub fn target_revision(&self) -> &str {
        &self.target_revision
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    pub fn model_config(&self) -> ModelConfig {
        ModelConfig::new(self.provider, self.model.clone(), self.credential.clone())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FileFailure {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("failed to generate diff: {0}")]
    Diff(#[from] DiffError),
}

/// Outcome of the per-file stage for one path.
#[derive(Debug)]
pub struct FileDiffResult {
    pub path: String,
    pub diff: String,
    pub failure: Option<FileFailure>,
}

impl FileDiffResult {
    pub fn is_usable(&self) -> bool {
        self.failure.is_none() && !self.diff.is_empty()
    }

    /// Why this file was left out of the batch, if it was.
    pub fn skip_reason(&self) -> Option<String> {
        match &self.failure {
            Some(failure) => Some(failure.to_string()),
            None if self.diff.is_empty() => Some("no change".to_string()),
            None => None,
        }
    }
}

#[derive(Debug)]
pub enum RunOutcome {
    /// Nothing usable was found; no provider call was made.
    NoChanges { skipped: Vec<FileDiffResult> },
    Analyzed {
        analysis: String,
        reviewed: Vec<String>,
        skipped: Vec<FileDiffResult>,
    },
}

impl RunOutcome {
    pub fn skipped(&self) -> &[FileDiffResult] {
        match self {
            RunOutcome::NoChanges { skipped } | RunOutcome::Analyzed { skipped, .. } => skipped,
        }
    }
}

/// Walks the requested files in order, then makes a single analysis call
/// covering every file that actually changed.
pub struct BatchOrchestrator<'a> {
    source: &'a dyn RevisionSource,
    differ: &'a DiffGenerator,
    prompt_builder: PromptBuilder,
}

impl<'a> BatchOrchestrator<'a> {
    pub fn new(source: &'a dyn RevisionSource, differ: &'a DiffGenerator) -> Self {
        Self {
            source,
            differ,
            prompt_builder: PromptBuilder::new(),
        }
    }

    pub fn collect_diffs(&self, request: &AnalysisRequest) -> Vec<FileDiffResult> {
        request
            .files()
            .iter()
            .map(|path| self.process_file(request, path))
            .collect()
    }

    fn process_file(&self, request: &AnalysisRequest, path: &str) -> FileDiffResult {
        let failed = |failure: FileFailure| {
            warn!("Skipping {}: {}", path, failure);
            FileDiffResult {
                path: path.to_string(),
                diff: String::new(),
                failure: Some(failure),
            }
        };

        let before = match self.source.fetch(path, request.source_revision()) {
            Ok(content) => content,
            Err(err) => return failed(err.into()),
        };
        let after = match self.source.fetch(path, request.target_revision()) {
            Ok(content) => content,
            Err(err) => return failed(err.into()),
        };

        let diff = match self.differ.diff(
            &before,
            &after,
            &format!("{}:{}", request.source_revision(), path),
            &format!("{}:{}", request.target_revision(), path),
        ) {
            Ok(diff) => diff,
            Err(err) => return failed(err.into()),
        };

        if diff.is_empty() {
            info!("No changes in {}", path);
        } else {
            info!("Diff generated for {} ({} characters)", path, diff.len());
        }

        FileDiffResult {
            path: path.to_string(),
            diff,
            failure: None,
        }
    }

    pub async fn run(
        &self,
        request: &AnalysisRequest,
        adapter: &dyn LLMAdapter,
    ) -> Result<RunOutcome, AnalysisError> {
        let (usable, skipped): (Vec<_>, Vec<_>) = self
            .collect_diffs(request)
            .into_iter()
            .partition(FileDiffResult::is_usable);

        if usable.is_empty() {
            info!("No changes detected across {} file(s)", request.files().len());
            return Ok(RunOutcome::NoChanges { skipped });
        }

        let file_diffs: Vec<FileDiff> = usable
            .into_iter()
            .map(|result| FileDiff::new(result.path, result.diff))
            .collect();
        let prompt = self.prompt_builder.build(&file_diffs);

        info!(
            "Requesting analysis of {} file(s) from {} ({})",
            file_diffs.len(),
            request.provider(),
            adapter.model_name()
        );
        let response = adapter
            .complete(LLMRequest {
                system_prompt: prompt.system_prompt,
                user_prompt: prompt.user_prompt,
            })
            .await?;

        info!("Analysis received from {}", response.model);
        if let Some(usage) = response.usage {
            info!(
                "Token usage: {} prompt, {} completion, {} total",
                usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
            );
        }

        Ok(RunOutcome::Analyzed {
            analysis: response.content,
            reviewed: file_diffs.into_iter().map(|d| d.path).collect(),
            skipped,
        })
    }
}
