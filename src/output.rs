//! Data types flowing through the pipeline and handed back to callers.

use serde::{Deserialize, Serialize};
use std::fmt;

// ── Fetch / extract ──────────────────────────────────────────────────────

/// Bytes downloaded by [`crate::pipeline::fetch::ContentFetcher`].
///
/// Consumed by extraction; nothing keeps it alive afterwards.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub bytes: Vec<u8>,
    /// `Content-Type` as declared by the server, if any.
    pub content_type: Option<String>,
}

impl RawDocument {
    pub fn new(bytes: Vec<u8>, content_type: Option<String>) -> Self {
        Self { bytes, content_type }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Flat text recovered from a document.
///
/// Line order follows the PDF content streams, which is usually but not
/// always reading order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedText {
    pub lines: Vec<String>,
    /// Page count, for diagnostics only.
    pub page_count: usize,
}

impl ExtractedText {
    pub fn new(lines: Vec<String>, page_count: usize) -> Self {
        Self { lines, page_count }
    }

    /// Build from in-memory lines (tests, pre-extracted text).
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            page_count: 0,
        }
    }

    /// Size of the text when joined with `\n`.
    pub fn byte_size(&self) -> usize {
        let content: usize = self.lines.iter().map(String::len).sum();
        content + self.lines.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(|l| l.trim().is_empty())
    }
}

// ── Structure ────────────────────────────────────────────────────────────

/// Classification of one line of reconstructed output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    /// Document title, rendered as `# …`.
    Title,
    /// Canonical paper section, rendered as `## …`.
    Section,
    /// Numbered subsection (`2.1 …`), rendered as `### …`.
    Subsection,
    ListItem,
    Paragraph,
    Blank,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub kind: BlockKind,
    pub text: String,
}

impl Block {
    pub fn new(kind: BlockKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    pub fn blank() -> Self {
        Self::new(BlockKind::Blank, "")
    }

    pub fn is_blank(&self) -> bool {
        self.kind == BlockKind::Blank
    }

    /// Markdown rendering of this block, without a trailing newline.
    pub fn to_markdown(&self) -> String {
        match self.kind {
            BlockKind::Title => format!("# {}", self.text),
            BlockKind::Section => format!("## {}", self.text),
            BlockKind::Subsection => format!("### {}", self.text),
            BlockKind::ListItem => format!("- {}", self.text),
            BlockKind::Paragraph => self.text.clone(),
            BlockKind::Blank => String::new(),
        }
    }
}

/// Output of [`crate::pipeline::structure::reconstruct`].
///
/// Holds at most one [`BlockKind::Title`], and if present it is the first
/// non-blank block. Never starts or ends with a blank block and never holds
/// two blank blocks in a row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredDocument {
    pub blocks: Vec<Block>,
}

impl StructuredDocument {
    pub fn title(&self) -> Option<&str> {
        self.blocks
            .iter()
            .find(|b| b.kind == BlockKind::Title)
            .map(|b| b.text.as_str())
    }

    /// Blocks with blank separators filtered out.
    pub fn content_blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter().filter(|b| !b.is_blank())
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn to_markdown(&self) -> String {
        crate::pipeline::structure::render_markdown(self)
    }
}

// ── Analysis ─────────────────────────────────────────────────────────────

/// The fixed set of paper categories the model may choose from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Computer Science")]
    ComputerScience,
    Physics,
    Mathematics,
    Biology,
    Chemistry,
    Medicine,
    Economics,
    Psychology,
    Engineering,
    #[serde(rename = "Environmental Science")]
    EnvironmentalScience,
    #[default]
    Other,
}

impl Category {
    pub const ALL: [Category; 11] = [
        Category::ComputerScience,
        Category::Physics,
        Category::Mathematics,
        Category::Biology,
        Category::Chemistry,
        Category::Medicine,
        Category::Economics,
        Category::Psychology,
        Category::Engineering,
        Category::EnvironmentalScience,
        Category::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::ComputerScience => "Computer Science",
            Category::Physics => "Physics",
            Category::Mathematics => "Mathematics",
            Category::Biology => "Biology",
            Category::Chemistry => "Chemistry",
            Category::Medicine => "Medicine",
            Category::Economics => "Economics",
            Category::Psychology => "Psychology",
            Category::Engineering => "Engineering",
            Category::EnvironmentalScience => "Environmental Science",
            Category::Other => "Other",
        }
    }

    /// Case-insensitive lookup by display name.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured full-paper analysis, already normalised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperAnalysis {
    pub summary: String,
    /// Always within `1..=10`.
    pub rating: u8,
    pub category: Category,
    /// At most [`crate::pipeline::normalize::MAX_TAGS`] entries.
    pub tags: Vec<String>,
    pub key_findings: Vec<String>,
}

impl Default for PaperAnalysis {
    fn default() -> Self {
        Self {
            summary: String::new(),
            rating: crate::pipeline::normalize::DEFAULT_RATING,
            category: Category::Other,
            tags: Vec::new(),
            key_findings: Vec::new(),
        }
    }
}

/// What a persistence layer stores for a model call: a full analysis, or
/// the plain response of an annotation or chat turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum AnalysisResult {
    Analysis(PaperAnalysis),
    Response {
        #[serde(rename = "responseText")]
        response_text: String,
    },
}

impl AnalysisResult {
    pub fn as_analysis(&self) -> Option<&PaperAnalysis> {
        match self {
            AnalysisResult::Analysis(a) => Some(a),
            AnalysisResult::Response { .. } => None,
        }
    }

    pub fn response_text(&self) -> Option<&str> {
        match self {
            AnalysisResult::Response { response_text } => Some(response_text),
            AnalysisResult::Analysis(_) => None,
        }
    }
}

/// Speaker of a prior chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ── Composed outputs ─────────────────────────────────────────────────────

/// Output of [`crate::ingest::ingest`].
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutput {
    /// Size of the extracted text in bytes.
    pub text_bytes: usize,
    pub page_count: usize,
    pub document: StructuredDocument,
    /// `document` rendered as Markdown.
    pub markdown: String,
    pub stats: IngestStats,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestStats {
    pub downloaded_bytes: usize,
    pub fetch_duration_ms: u64,
    pub extract_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything the persistence collaborator stores for an analysed paper.
#[derive(Debug, Clone, Serialize)]
pub struct PaperReport {
    pub text_bytes: usize,
    pub document: StructuredDocument,
    pub analysis: AnalysisResult,
}
