//! Structure reconstruction: rebuild headings and lists from flat PDF text.
//!
//! PDF text extraction loses every structural cue. This module recovers the
//! common ones from the text alone, one line at a time, with no lookahead.
//! The only state carried between lines is whether the previous emitted
//! block was a blank separator.
//!
//! ## Rule Order
//!
//! Each non-blank line is classified by the first matching rule in
//! [`RULES`]:
//!
//! 1. `section`    — canonical paper section name → `## Heading`
//! 2. `subsection` — multi-level numeric prefix (`2.1`, `3.1.2`) → `### Heading`
//! 3. `title`      — first substantial line near the top → `# Title`
//! 4. `bullet`     — leading `-` or Unicode bullet → `- item` (glyph stripped)
//! 5. `enumerated` — leading `(1)` or `a)` → `- (1) item` (prefix kept)
//! 6. `paragraph`  — everything else
//!
//! Blank lines collapse to a single separator and are trimmed at both ends.
//! Reconstruction never fails; unrecognised input degrades to paragraphs.

use crate::output::{Block, BlockKind, ExtractedText, StructuredDocument};
use once_cell::sync::Lazy;
use regex::Regex;

/// Lines at or beyond this many characters are never subsection headings.
pub const SUBSECTION_MAX_CHARS: usize = 100;

/// A title must be longer than this many characters.
pub const TITLE_MIN_CHARS: usize = 10;

/// Only lines with a source index below this can become the title.
pub const TITLE_WINDOW_LINES: usize = 5;

/// Per-line facts available to the rules.
#[derive(Debug, Clone, Copy)]
pub struct LineContext {
    /// Index of the line in the extracted text.
    pub index: usize,
    /// Whether any non-blank block has been emitted yet.
    pub emitted_any: bool,
}

/// One classification rule: a name and a function returning the block the
/// line becomes, or `None` when the rule does not apply.
pub struct Rule {
    pub name: &'static str,
    pub apply: fn(&str, &LineContext) -> Option<Block>,
}

/// Classification rules in evaluation order. The first match wins.
pub static RULES: [Rule; 6] = [
    Rule {
        name: "section",
        apply: section_rule,
    },
    Rule {
        name: "subsection",
        apply: subsection_rule,
    },
    Rule {
        name: "title",
        apply: title_rule,
    },
    Rule {
        name: "bullet",
        apply: bullet_rule,
    },
    Rule {
        name: "enumerated",
        apply: enumerated_rule,
    },
    Rule {
        name: "paragraph",
        apply: paragraph_rule,
    },
];

/// Rebuild a structured document from extracted lines.
pub fn reconstruct(text: &ExtractedText) -> StructuredDocument {
    let mut builder = DocumentBuilder::default();

    for (index, raw) in text.lines.iter().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            builder.push_blank();
            continue;
        }

        let ctx = LineContext {
            index,
            emitted_any: builder.emitted_any,
        };
        let (_, block) = classify_line(line, &ctx);

        if block.kind == BlockKind::Section {
            builder.push_blank();
            builder.push(block);
            builder.push_blank();
        } else {
            builder.push(block);
        }
    }

    builder.finish()
}

/// Classify a single trimmed, non-blank line. Returns the winning rule's name
/// and the resulting block.
pub fn classify_line(line: &str, ctx: &LineContext) -> (&'static str, Block) {
    for rule in RULES.iter() {
        if let Some(block) = (rule.apply)(line, ctx) {
            return (rule.name, block);
        }
    }
    // `paragraph_rule` always matches.
    ("paragraph", Block::new(BlockKind::Paragraph, line))
}

/// Render a structured document as Markdown.
///
/// One line per block, blank blocks as empty lines. The result is trimmed
/// and never contains three or more consecutive newlines.
pub fn render_markdown(doc: &StructuredDocument) -> String {
    let joined = doc
        .blocks
        .iter()
        .map(Block::to_markdown)
        .collect::<Vec<_>>()
        .join("\n");
    RE_BLANK_RUNS.replace_all(&joined, "\n\n").trim().to_string()
}

static RE_BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n(?:[ \t]*\n){2,}").unwrap());

// ── Document builder ─────────────────────────────────────────────────────

#[derive(Default)]
struct DocumentBuilder {
    blocks: Vec<Block>,
    emitted_any: bool,
}

impl DocumentBuilder {
    /// Append a separator unless at the start or right after another one.
    fn push_blank(&mut self) {
        match self.blocks.last() {
            None => {}
            Some(last) if last.is_blank() => {}
            Some(_) => self.blocks.push(Block::blank()),
        }
    }

    fn push(&mut self, block: Block) {
        self.emitted_any = true;
        self.blocks.push(block);
    }

    fn finish(mut self) -> StructuredDocument {
        while self.blocks.last().is_some_and(Block::is_blank) {
            self.blocks.pop();
        }
        StructuredDocument {
            blocks: self.blocks,
        }
    }
}

// ── Rule 1: Section headings ─────────────────────────────────────────────

static RE_SECTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:(?P<label>(?:\d+|[ivxlc]+)\.?)\s+)?(?P<name>abstract|introduction|background|methods?|methodology|results|discussion|conclusions?|references|acknowledge?ments?|appendix|supplementary(?:\s+materials?)?|related\s+work|literature\s+review|future\s+work|limitations)\s*:?$",
    )
    .unwrap()
});

fn section_rule(line: &str, _ctx: &LineContext) -> Option<Block> {
    let caps = RE_SECTION.captures(line)?;
    let name = title_case(&caps["name"]);
    let text = match caps.name("label") {
        Some(label) => format!("{} {}", label.as_str(), name),
        None => name,
    };
    Some(Block::new(BlockKind::Section, text))
}

/// `RELATED   WORK` → `Related Work`.
fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let lower = word.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Rule 2: Numbered subsections ─────────────────────────────────────────

static RE_SUBSECTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+(?:\.\d+)+\.?\s+\S").unwrap());

fn subsection_rule(line: &str, _ctx: &LineContext) -> Option<Block> {
    if line.chars().count() < SUBSECTION_MAX_CHARS && RE_SUBSECTION.is_match(line) {
        Some(Block::new(BlockKind::Subsection, line))
    } else {
        None
    }
}

// ── Rule 3: Title ────────────────────────────────────────────────────────

fn title_rule(line: &str, ctx: &LineContext) -> Option<Block> {
    if !ctx.emitted_any
        && ctx.index < TITLE_WINDOW_LINES
        && line.chars().count() > TITLE_MIN_CHARS
    {
        Some(Block::new(BlockKind::Title, line))
    } else {
        None
    }
}

// ── Rule 4: Bullets ──────────────────────────────────────────────────────

static RE_BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:-\s+|[•◦▪▫‣⁃∙●○■□]\s*)(?P<body>\S.*)$").unwrap());

fn bullet_rule(line: &str, _ctx: &LineContext) -> Option<Block> {
    let caps = RE_BULLET.captures(line)?;
    Some(Block::new(BlockKind::ListItem, &caps["body"]))
}

// ── Rule 5: Enumerated items ─────────────────────────────────────────────

static RE_ENUMERATED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:\(\d+\)|[a-z]\))").unwrap());

fn enumerated_rule(line: &str, _ctx: &LineContext) -> Option<Block> {
    if RE_ENUMERATED.is_match(line) {
        Some(Block::new(BlockKind::ListItem, line))
    } else {
        None
    }
}

// ── Rule 6: Paragraph fallback ───────────────────────────────────────────

fn paragraph_rule(line: &str, _ctx: &LineContext) -> Option<Block> {
    Some(Block::new(BlockKind::Paragraph, line))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(lines: &[&str]) -> StructuredDocument {
        reconstruct(&ExtractedText::from_lines(lines.iter().copied()))
    }

    fn kinds(d: &StructuredDocument) -> Vec<BlockKind> {
        d.blocks.iter().map(|b| b.kind).collect()
    }

    fn ctx(index: usize, emitted_any: bool) -> LineContext {
        LineContext { index, emitted_any }
    }

    #[test]
    fn rule_order_is_fixed() {
        let names: Vec<&str> = RULES.iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            ["section", "subsection", "title", "bullet", "enumerated", "paragraph"]
        );
    }

    #[test]
    fn abstract_scenario() {
        let d = doc(&[
            "ABSTRACT",
            "",
            "We study X.",
            "",
            "2.1 Setup",
            "",
            "- item one",
            "- item two",
        ]);
        let content: Vec<(BlockKind, &str)> = d
            .content_blocks()
            .map(|b| (b.kind, b.text.as_str()))
            .collect();
        assert_eq!(
            content,
            vec![
                (BlockKind::Section, "Abstract"),
                (BlockKind::Paragraph, "We study X."),
                (BlockKind::Subsection, "2.1 Setup"),
                (BlockKind::ListItem, "item one"),
                (BlockKind::ListItem, "item two"),
            ]
        );
        assert_eq!(d.title(), None);
        assert_eq!(
            d.to_markdown(),
            "## Abstract\n\nWe study X.\n\n### 2.1 Setup\n\n- item one\n- item two"
        );
    }

    #[test]
    fn section_names_match_with_prefixes() {
        for line in [
            "Introduction",
            "1 Introduction",
            "1. INTRODUCTION",
            "IV. Results",
            "iv results",
            "Related Work",
            "2 RELATED   WORK",
            "Conclusions:",
            "Acknowledgements",
            "Acknowledgments",
            "Supplementary Materials",
            "Methods",
            "Methodology",
            "Limitations",
        ] {
            let (rule, block) = classify_line(line, &ctx(0, false));
            assert_eq!(rule, "section", "line {line:?}");
            assert_eq!(block.kind, BlockKind::Section, "line {line:?}");
        }
    }

    #[test]
    fn section_text_is_title_cased_and_keeps_label() {
        let (_, b) = classify_line("2. RELATED WORK", &ctx(9, true));
        assert_eq!(b.text, "2. Related Work");
        let (_, b) = classify_line("IV. RESULTS", &ctx(9, true));
        assert_eq!(b.text, "IV. Results");
    }

    #[test]
    fn sentences_mentioning_sections_are_not_headings() {
        let (rule, _) = classify_line("Introduction to quantum widgets", &ctx(9, true));
        assert_eq!(rule, "paragraph");
        let (rule, _) = classify_line("The results are shown below.", &ctx(9, true));
        assert_eq!(rule, "paragraph");
    }

    #[test]
    fn subsection_requires_multi_level_prefix_and_short_line() {
        assert_eq!(classify_line("3.1.2 Ablations", &ctx(9, true)).0, "subsection");
        assert_eq!(classify_line("3 Ablations", &ctx(9, true)).0, "paragraph");
        let long = format!("2.1 {}", "x".repeat(120));
        assert_eq!(classify_line(&long, &ctx(9, true)).0, "paragraph");
    }

    #[test]
    fn section_beats_title_and_subsection_beats_title() {
        assert_eq!(classify_line("1. Introduction", &ctx(0, false)).0, "section");
        assert_eq!(
            classify_line("2.1 A Fairly Long Subsection", &ctx(0, false)).0,
            "subsection"
        );
    }

    #[test]
    fn title_detected_in_first_lines() {
        let d = doc(&["", "", "Attention Is All You Need", "Ashish Vaswani", "Abstract"]);
        assert_eq!(d.title(), Some("Attention Is All You Need"));
        assert_eq!(d.blocks[0].kind, BlockKind::Title);
        assert_eq!(d.blocks[1].kind, BlockKind::Paragraph);
    }

    #[test]
    fn short_first_line_prevents_title() {
        let d = doc(&["arXiv 2024", "A Much Longer Line That Looks Like A Title"]);
        assert_eq!(d.title(), None);
        assert!(d.blocks.iter().all(|b| b.kind == BlockKind::Paragraph));
    }

    #[test]
    fn title_outside_window_is_paragraph() {
        let d = doc(&["", "", "", "", "", "A Paper Title Placed Late"]);
        assert_eq!(d.title(), None);
        assert_eq!(d.blocks, vec![Block::new(BlockKind::Paragraph, "A Paper Title Placed Late")]);
    }

    #[test]
    fn at_most_one_title() {
        let d = doc(&["A Long Enough Title", "Another Long Enough Line"]);
        let titles = d.blocks.iter().filter(|b| b.kind == BlockKind::Title).count();
        assert_eq!(titles, 1);
    }

    #[test]
    fn bullets_strip_glyph() {
        for line in ["- first", "• first", "◦first", "▪  first", "● first"] {
            let (rule, b) = classify_line(line, &ctx(9, true));
            assert_eq!(rule, "bullet", "line {line:?}");
            assert_eq!(b.text, "first", "line {line:?}");
        }
        // A hyphen glued to a number is not a bullet.
        assert_eq!(classify_line("-5 degrees", &ctx(9, true)).0, "paragraph");
    }

    #[test]
    fn enumerated_items_keep_prefix() {
        let (rule, b) = classify_line("(2) second claim", &ctx(9, true));
        assert_eq!(rule, "enumerated");
        assert_eq!(b.to_markdown(), "- (2) second claim");
        let (rule, b) = classify_line("b) other", &ctx(9, true));
        assert_eq!(rule, "enumerated");
        assert_eq!(b.text, "b) other");
        assert_eq!(classify_line("B) upper", &ctx(9, true)).0, "paragraph");
    }

    #[test]
    fn blank_runs_collapse_and_trim() {
        let d = doc(&["", "   ", "alpha", "", "", "", "beta", "", ""]);
        assert_eq!(
            kinds(&d),
            vec![BlockKind::Paragraph, BlockKind::Blank, BlockKind::Paragraph]
        );
        assert_eq!(d.to_markdown(), "alpha\n\nbeta");
    }

    #[test]
    fn section_is_surrounded_by_single_separators() {
        let d = doc(&["some text here", "", "", "Discussion", "", "", "more"]);
        assert_eq!(
            kinds(&d),
            vec![
                BlockKind::Title,
                BlockKind::Blank,
                BlockKind::Section,
                BlockKind::Blank,
                BlockKind::Paragraph,
            ]
        );
    }

    #[test]
    fn empty_input_yields_empty_document() {
        assert!(doc(&[]).is_empty());
        assert!(doc(&["", "  ", ""]).is_empty());
        assert_eq!(doc(&[]).to_markdown(), "");
    }

    #[test]
    fn never_three_consecutive_blank_lines() {
        let inputs: Vec<Vec<&str>> = vec![
            vec!["References", "", "", "Appendix", "", "", "", "Limitations"],
            vec!["x", "", "", "", "", "Abstract", "", "", "Introduction"],
            vec!["", "", "", ""],
            vec!["Results", "Discussion", "Conclusion"],
        ];
        for input in inputs {
            let d = doc(&input);
            let md = d.to_markdown();
            assert!(!md.contains("\n\n\n"), "input {input:?} → {md:?}");
            assert_eq!(md, md.trim());
            let consecutive_blanks = d
                .blocks
                .windows(2)
                .any(|w| w[0].is_blank() && w[1].is_blank());
            assert!(!consecutive_blanks, "input {input:?}");
        }
    }
}
