//! Token-budgeted context assembly with citation metadata.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RagConfig;
use crate::document::{Candidate, CandidateContent};

/// How many characters of document content appear in a citation preview.
const DOCUMENT_PREVIEW_CHARS: usize = 200;
/// How many characters of an answer appear in a citation preview.
const ANSWER_PREVIEW_CHARS: usize = 100;

/// A citation entry for one candidate, regardless of whether its block fit
/// the context budget.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceRef {
    /// A document-sourced candidate (public or private).
    Document {
        /// Parent document id.
        doc_id: String,
        /// Parent document title.
        title: String,
        /// Parent document category.
        doc_type: String,
        /// Position within the parent document.
        chunk_index: usize,
        /// The candidate's weighted score.
        score: f32,
        /// Char-truncated content preview.
        preview: String,
    },
    /// A conversation-sourced candidate.
    Conversation {
        /// Conversation id.
        conv_id: String,
        /// The recovered question.
        question: String,
        /// The candidate's weighted score.
        score: f32,
        /// Char-truncated answer preview.
        preview: String,
    },
}

/// Assembled context plus the structured source list for citation display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContextBundle {
    /// Concatenated reference blocks, within the token budget.
    pub text: String,
    /// One entry per candidate handed to the builder, in rank order.
    pub sources: Vec<SourceRef>,
    /// Estimated token cost of the included blocks.
    pub estimated_tokens: f32,
}

impl ContextBundle {
    /// Whether no block fit the budget (or no candidates were given).
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Packs ranked candidates into a single context string bounded by an
/// approximate token budget.
///
/// Blocks are included whole, in rank order, until the next block would
/// overflow the budget; the remainder is omitted. A block is never cut
/// mid-content.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    token_limit: usize,
    token_cost_multiplier: f32,
}

impl ContextBuilder {
    /// Create a builder with the given budget and character-to-token
    /// multiplier.
    pub fn new(token_limit: usize, token_cost_multiplier: f32) -> Self {
        Self { token_limit, token_cost_multiplier }
    }

    /// Create a builder from the engine configuration.
    pub fn from_config(config: &RagConfig) -> Self {
        Self::new(config.token_limit, config.token_cost_multiplier)
    }

    /// Estimate the token cost of a piece of text.
    ///
    /// Currently `char_count × multiplier`. Isolated here so a real
    /// tokenizer can replace the heuristic without touching the packing
    /// loop.
    pub fn estimate_tokens(&self, text: &str) -> f32 {
        text.chars().count() as f32 * self.token_cost_multiplier
    }

    /// Render candidates into a context bundle.
    ///
    /// The source list covers every candidate given, in rank order, even
    /// those whose blocks were omitted for budget; scores cited are the
    /// weighted scores used for ranking.
    pub fn build(&self, candidates: &[Candidate]) -> ContextBundle {
        let mut blocks: Vec<String> = Vec::new();
        let mut total = 0.0f32;
        let budget = self.token_limit as f32;

        for (i, candidate) in candidates.iter().enumerate() {
            let body = render_body(candidate);
            let cost = self.estimate_tokens(&body);
            if total + cost > budget {
                debug!(
                    included = blocks.len(),
                    omitted = candidates.len() - blocks.len(),
                    "context budget reached"
                );
                break;
            }
            blocks.push(format!("[Reference {}]\n{body}\n", i + 1));
            total += cost;
        }

        ContextBundle {
            text: blocks.join("\n"),
            sources: candidates.iter().map(source_ref).collect(),
            estimated_tokens: total,
        }
    }
}

fn render_body(candidate: &Candidate) -> String {
    match &candidate.content {
        CandidateContent::Exchange { question, answer, .. } => {
            format!("Past exchange:\nQ: {question}\nA: {answer}")
        }
        CandidateContent::Excerpt { title, doc_type, content, .. } => {
            format!("Document excerpt ({doc_type} - {title}):\n{content}")
        }
    }
}

fn source_ref(candidate: &Candidate) -> SourceRef {
    match &candidate.content {
        CandidateContent::Exchange { conv_id, question, answer } => SourceRef::Conversation {
            conv_id: conv_id.clone(),
            question: question.clone(),
            score: candidate.weighted_score,
            preview: preview(answer, ANSWER_PREVIEW_CHARS),
        },
        CandidateContent::Excerpt { doc_id, title, doc_type, chunk_index, content } => {
            SourceRef::Document {
                doc_id: doc_id.clone(),
                title: title.clone(),
                doc_type: doc_type.clone(),
                chunk_index: *chunk_index,
                score: candidate.weighted_score,
                preview: preview(content, DOCUMENT_PREVIEW_CHARS),
            }
        }
    }
}

/// Char-truncated preview with an ellipsis marker when cut.
fn preview(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}
