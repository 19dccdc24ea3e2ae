//! Grounded answer assembly.
//!
//! Builds a prompt from retrieved context, invokes the generation backend,
//! and appends a deduplicated, human-readable source list. Every failure
//! mode is a variant of [`AnswerOutcome`] rather than an error: the caller
//! always gets something renderable for the end user.

use tracing::{error, info};

use crate::generate::GenerationClient;
use crate::models::{ContextRecord, SourceKind};
use crate::retrieval::{RetrievalEngine, Scope};

/// Result of one answer request, with failure modes explicit in the type.
#[derive(Debug, Clone)]
pub enum AnswerOutcome {
    /// The backend produced an answer grounded in `sources`.
    Grounded { text: String, sources: Vec<String> },
    /// Retrieval found nothing; the designed fallback for an empty or
    /// mismatched corpus, not an error.
    NoContext,
    /// The backend was unreachable or timed out; the message embeds the
    /// configured endpoint and is rendered directly to the user.
    BackendFailure(String),
}

/// Assembles grounded prompts and synthesizes answers for one technology
/// corpus.
pub struct AnswerSynthesizer {
    technology: String,
    retrieval: RetrievalEngine,
    backend: GenerationClient,
    top_k: usize,
}

impl AnswerSynthesizer {
    pub fn new(
        technology: impl Into<String>,
        retrieval: RetrievalEngine,
        backend: GenerationClient,
        top_k: usize,
    ) -> Self {
        Self {
            technology: technology.into(),
            retrieval,
            backend,
            top_k,
        }
    }

    /// Answer `question` from the indexed corpus, restricted to `scope`.
    pub async fn answer(&self, question: &str, scope: Scope) -> AnswerOutcome {
        info!(technology = %self.technology, scope = scope.as_str(), "answering question");

        let records = self.retrieval.retrieve(question, self.top_k, scope).await;
        if records.is_empty() {
            return AnswerOutcome::NoContext;
        }

        let prompt = build_prompt(&self.technology, question, &records);
        let sources = source_list(&records);

        match self.backend.generate(&prompt).await {
            Ok(text) => AnswerOutcome::Grounded { text, sources },
            Err(e) => {
                error!(error = %e, "generation backend failed");
                AnswerOutcome::BackendFailure(format!(
                    "Error: could not reach the generation backend at {} ({})",
                    e.base_url, e.reason
                ))
            }
        }
    }

    /// The external string contract: `answer` rendered for direct display.
    pub async fn answer_text(&self, question: &str, scope: Scope) -> String {
        let outcome = self.answer(question, scope).await;
        self.render(&outcome)
    }

    /// Render an outcome into the final user-facing string.
    pub fn render(&self, outcome: &AnswerOutcome) -> String {
        render_outcome(&self.technology, outcome)
    }
}

/// Render an [`AnswerOutcome`] for `technology` into the final user-facing
/// string.
pub fn render_outcome(technology: &str, outcome: &AnswerOutcome) -> String {
    match outcome {
        AnswerOutcome::NoContext => format!(
            "No relevant {} documentation found for your question.",
            technology
        ),
        AnswerOutcome::BackendFailure(message) => message.clone(),
        AnswerOutcome::Grounded { text, sources } => {
            let mut out = text.clone();
            out.push_str(&format!("\n\n{} Sources:\n", technology.to_uppercase()));
            for source in sources {
                out.push_str(&format!("- {}\n", source));
            }
            out
        }
    }
}

/// One block per retrieved record in ranked order, then the verbatim
/// question, then the instruction block constraining the generator to the
/// supplied context.
pub fn build_prompt(technology: &str, question: &str, records: &[ContextRecord]) -> String {
    let tech = technology.to_uppercase();

    let mut context = String::new();
    for record in records {
        context.push_str(&format!("Source: {}\n", record.metadata.title));
        context.push_str(&format!("Content: {}\n", record.content));
        context.push_str("---\n");
    }

    format!(
        "You are a {tech} expert. Answer the user's question using ONLY the provided \
         documentation context.\n\
         \n\
         DOCUMENTATION CONTEXT:\n\
         {context}\n\
         USER QUESTION: {question}\n\
         \n\
         INSTRUCTIONS:\n\
         - Answer based ONLY on the provided {tech} documentation\n\
         - Include specific commands, procedures, or examples when available\n\
         - Be concise but thorough\n\
         - Include relevant warnings or prerequisites\n\
         \n\
         ANSWER:"
    )
}

/// Build the citation list: one display string per distinct source, first
/// seen order. Two chunks from the same book or page collapse to one line.
pub fn source_list(records: &[ContextRecord]) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for record in records {
        let display = match record.metadata.source_kind {
            SourceKind::Pdf => format!("\u{1F4D6} {}", record.metadata.filename),
            SourceKind::Web => format!("\u{1F310} {}", record.metadata.title),
        };
        if !sources.contains(&display) {
            sources.push(display);
        }
    }
    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;

    fn record(kind: SourceKind, title: &str, filename: &str, content: &str) -> ContextRecord {
        ContextRecord {
            content: content.to_string(),
            metadata: ChunkMetadata {
                technology: "rhel".to_string(),
                title: title.to_string(),
                origin_url: String::new(),
                source_kind: kind,
                chunk_index: 0,
                filename: filename.to_string(),
                source: None,
                guide: None,
                author: None,
                page_count: None,
            },
            distance: Some(0.2),
        }
    }

    #[test]
    fn chunks_from_same_book_produce_one_citation() {
        let records = vec![
            record(SourceKind::Pdf, "Ch 1", "admin-guide.pdf", "a"),
            record(SourceKind::Pdf, "Ch 7", "admin-guide.pdf", "b"),
            record(SourceKind::Web, "Networking", "net.json", "c"),
        ];
        let sources = source_list(&records);
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0], "\u{1F4D6} admin-guide.pdf");
        assert_eq!(sources[1], "\u{1F310} Networking");
    }

    #[test]
    fn citation_order_is_first_seen() {
        let records = vec![
            record(SourceKind::Web, "Beta", "b.json", "x"),
            record(SourceKind::Web, "Alpha", "a.json", "y"),
            record(SourceKind::Web, "Beta", "b.json", "z"),
        ];
        let sources = source_list(&records);
        assert_eq!(sources.len(), 2);
        assert!(sources[0].contains("Beta"));
        assert!(sources[1].contains("Alpha"));
    }

    #[test]
    fn prompt_contains_context_question_and_instructions() {
        let records = vec![record(
            SourceKind::Web,
            "Firewalld",
            "fw.json",
            "Use firewall-cmd.",
        )];
        let prompt = build_prompt("rhel", "How do I open a port?", &records);
        assert!(prompt.contains("Source: Firewalld"));
        assert!(prompt.contains("Content: Use firewall-cmd."));
        assert!(prompt.contains("---"));
        assert!(prompt.contains("USER QUESTION: How do I open a port?"));
        assert!(prompt.contains("ONLY the provided"));
        assert!(prompt.contains("RHEL"));
        assert!(prompt.trim_end().ends_with("ANSWER:"));
    }

    #[test]
    fn prompt_orders_records_as_ranked() {
        let records = vec![
            record(SourceKind::Web, "First", "1.json", "best match"),
            record(SourceKind::Web, "Second", "2.json", "runner up"),
        ];
        let prompt = build_prompt("python", "q", &records);
        let first = prompt.find("Source: First").unwrap();
        let second = prompt.find("Source: Second").unwrap();
        assert!(first < second);
    }

    #[test]
    fn no_context_renders_fixed_fallback_message() {
        let rendered = render_outcome("checkmk", &AnswerOutcome::NoContext);
        assert_eq!(
            rendered,
            "No relevant checkmk documentation found for your question."
        );
    }

    #[test]
    fn backend_failure_renders_as_plain_message() {
        let outcome =
            AnswerOutcome::BackendFailure("Error: could not reach the generation backend at http://localhost:11434 (timeout)".to_string());
        let rendered = render_outcome("rhel", &outcome);
        assert!(rendered.contains("http://localhost:11434"));
    }

    #[test]
    fn grounded_answer_appends_source_block() {
        let outcome = AnswerOutcome::Grounded {
            text: "Open the port with firewall-cmd.".to_string(),
            sources: vec![
                "\u{1F310} Firewalld".to_string(),
                "\u{1F4D6} security-guide.pdf".to_string(),
            ],
        };
        let rendered = render_outcome("rhel", &outcome);
        assert!(rendered.starts_with("Open the port with firewall-cmd."));
        assert!(rendered.contains("RHEL Sources:"));
        assert!(rendered.contains("- \u{1F310} Firewalld"));
        assert!(rendered.contains("- \u{1F4D6} security-guide.pdf"));
    }
}
