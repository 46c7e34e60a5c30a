//! The four output renderers. Each implements the same per-block-type
//! rendering table; blocks arrive pre-sorted by order.

use serde_json::json;

use crate::assembly::{AssemblyConfig, AssemblyError};
use crate::domain::block::{Block, BlockContent, BlockType, QuestionStatus};
use crate::domain::document::Document;

const HTML_STYLE: &str = r#"body { font-family: Arial, sans-serif; margin: 40px; }
.document-header { border-bottom: 2px solid #333; padding-bottom: 20px; margin-bottom: 30px; }
.document-title { font-size: 2em; font-weight: bold; color: #333; }
.document-meta { color: #666; margin-top: 10px; }
.block { margin-bottom: 20px; }
.step { border-left: 4px solid #007bff; padding-left: 15px; margin: 15px 0; }
.question { background-color: #f8f9fa; padding: 15px; border-radius: 5px; margin: 10px 0; }
.warning { background-color: #fff3cd; border: 1px solid #ffeaa7; padding: 15px; border-radius: 5px; }
.caution { background-color: #f8d7da; border: 1px solid #f5c6cb; padding: 15px; border-radius: 5px; }
.ppe-required { background-color: #d1ecf1; border: 1px solid #bee5eb; padding: 15px; border-radius: 5px; }
.toc { background-color: #f8f9fa; padding: 20px; border-radius: 5px; margin: 20px 0; }"#;

fn question_status_label(status: QuestionStatus) -> &'static str {
    match status {
        QuestionStatus::Open => "open",
        QuestionStatus::Answered => "answered",
        QuestionStatus::Declined => "declined",
    }
}

fn title_case(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn toc_blocks<'a>(blocks: &'a [&'a Block]) -> Vec<&'a Block> {
    blocks
        .iter()
        .copied()
        .filter(|b| matches!(b.block_type, BlockType::SectionHeader | BlockType::Step))
        .collect()
}

pub(crate) fn html(document: &Document, blocks: &[&Block], config: &AssemblyConfig) -> String {
    let mut parts = Vec::new();

    parts.push(format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n<title>{}</title>\n<style>\n{}\n</style>\n</head>\n<body>",
        document.name, HTML_STYLE
    ));

    parts.push(format!(
        "<div class=\"document-header\">\n<div class=\"document-title\">{}</div>\n<div class=\"document-meta\"><strong>Type:</strong> {} | <strong>Version:</strong> {} | <strong>Status:</strong> {} | <strong>Created:</strong> {}</div>\n</div>",
        document.name,
        title_case(document.document_type.as_str()),
        document.version,
        title_case(document.status.as_str()),
        document.created_at.format("%Y-%m-%d"),
    ));

    if config.include_toc {
        let entries = toc_blocks(blocks);
        if !entries.is_empty() {
            parts.push("<div class=\"toc\"><h2>Table of Contents</h2><ul>".to_string());
            for block in entries {
                match (&block.block_type, &block.content) {
                    (BlockType::SectionHeader, content) => parts.push(format!(
                        "<li><a href=\"#section-{}\">{}</a></li>",
                        block.id.0,
                        content.display_text()
                    )),
                    (BlockType::Step, BlockContent::Step(step)) => parts.push(format!(
                        "<li><a href=\"#step-{}\">Step {}: {}</a></li>",
                        block.id.0, step.step_number, step.step_description
                    )),
                    (BlockType::Step, content) => parts.push(format!(
                        "<li><a href=\"#step-{}\">{}</a></li>",
                        block.id.0,
                        content.display_text()
                    )),
                    _ => {}
                }
            }
            parts.push("</ul></div>".to_string());
        }
    }

    for block in blocks {
        parts.push(render_block_html(block));
    }

    if config.include_metadata && !document.metadata.is_empty() {
        let metadata = serde_json::to_string_pretty(&document.metadata).unwrap_or_default();
        parts.push(format!(
            "<div class=\"document-footer\" style=\"margin-top: 40px; padding-top: 20px; border-top: 1px solid #ddd;\">\n<h3>Document Metadata</h3>\n<pre>{metadata}</pre>\n</div>"
        ));
    }

    parts.push("</body></html>".to_string());
    parts.join("\n")
}

fn render_block_html(block: &Block) -> String {
    match (&block.block_type, &block.content) {
        (BlockType::Title, content) => {
            format!("<h1 id=\"title\">{}</h1>", content.display_text())
        }
        (BlockType::Description, content) => {
            format!("<div class=\"block\"><p>{}</p></div>", content.display_text())
        }
        (BlockType::SectionHeader, content) => format!(
            "<h2 id=\"section-{}\" class=\"block\">{}</h2>",
            block.id.0,
            content.display_text()
        ),
        (BlockType::Step, BlockContent::Step(step)) => {
            let mut html = format!("<div id=\"step-{}\" class=\"step\">", block.id.0);
            html.push_str(&format!(
                "<h3>Step {}: {}</h3>",
                step.step_number, step.step_description
            ));
            html.push_str(&format!(
                "<p><strong>Instructions:</strong> {}</p>",
                step.step_instructions
            ));
            if !step.step_expected_result.is_empty() {
                html.push_str(&format!(
                    "<p><strong>Expected Result:</strong> {}</p>",
                    step.step_expected_result
                ));
            }
            if !step.step_who_responsible.is_empty() {
                html.push_str(&format!(
                    "<p><strong>Responsible:</strong> {}</p>",
                    step.step_who_responsible
                ));
            }
            if step.ppe_required {
                html.push_str("<div class=\"ppe-required\"><strong>PPE Required</strong></div>");
            }
            html.push_str("</div>");
            html
        }
        (BlockType::Question, BlockContent::Question(question)) => {
            let mut html = "<div class=\"question\">".to_string();
            html.push_str(&format!("<h4>Question: {}</h4>", question.question));
            if let Some(answer) = &question.answer {
                html.push_str(&format!("<p><strong>Answer:</strong> {answer}</p>"));
            }
            html.push_str(&format!(
                "<p><em>Status: {}</em></p>",
                question_status_label(question.status)
            ));
            html.push_str("</div>");
            html
        }
        (BlockType::Warning, content) => format!(
            "<div class=\"warning\"><strong>WARNING:</strong> {}</div>",
            content.display_text()
        ),
        (BlockType::Caution, content) => format!(
            "<div class=\"caution\"><strong>CAUTION:</strong> {}</div>",
            content.display_text()
        ),
        (BlockType::PpeRequired, content) => format!(
            "<div class=\"ppe-required\"><strong>PPE Required:</strong> {}</div>",
            content.display_text()
        ),
        (BlockType::Checklist, BlockContent::Checklist(checklist)) => {
            let mut html = "<div class=\"block\"><ul>".to_string();
            for item in &checklist.items {
                let mark = if item.checked { "[x]" } else { "[ ]" };
                html.push_str(&format!("<li>{mark} {}</li>", item.text));
            }
            html.push_str("</ul></div>");
            html
        }
        (BlockType::Image, BlockContent::Image(image)) => {
            let caption = image.caption.as_deref().unwrap_or("");
            format!(
                "<div class=\"block\"><img src=\"{}\" alt=\"{caption}\"></div>",
                image.image_url
            )
        }
        (BlockType::AdditionalInfo, content) => format!(
            "<div class=\"block\"><h3>Additional Information</h3><p>{}</p></div>",
            content.display_text()
        ),
        (_, content) => format!("<div class=\"block\"><p>{}</p></div>", content.display_text()),
    }
}

pub(crate) fn markdown(document: &Document, blocks: &[&Block], config: &AssemblyConfig) -> String {
    let mut parts = Vec::new();

    parts.push(format!("# {}\n", document.name));
    parts.push(format!(
        "**Type:** {} | **Version:** {} | **Status:** {}\n",
        title_case(document.document_type.as_str()),
        document.version,
        title_case(document.status.as_str()),
    ));
    parts.push(format!("**Created:** {}\n\n", document.created_at.format("%Y-%m-%d")));

    if config.include_toc {
        parts.push("## Table of Contents\n".to_string());
        for block in toc_blocks(blocks) {
            match (&block.block_type, &block.content) {
                (BlockType::Step, BlockContent::Step(step)) => parts.push(format!(
                    "- Step {}: {}\n",
                    step.step_number, step.step_description
                )),
                (_, content) => parts.push(format!("- {}\n", content.display_text())),
            }
        }
        parts.push("\n---\n\n".to_string());
    }

    for block in blocks {
        parts.push(render_block_markdown(block));
    }

    if config.include_metadata && !document.metadata.is_empty() {
        let metadata = serde_json::to_string_pretty(&document.metadata).unwrap_or_default();
        parts.push(format!("\n## Document Metadata\n```json\n{metadata}\n```\n"));
    }

    parts.concat()
}

fn render_block_markdown(block: &Block) -> String {
    match (&block.block_type, &block.content) {
        (BlockType::Title, content) => format!("# {}\n\n", content.display_text()),
        (BlockType::Description, content) => format!("{}\n\n", content.display_text()),
        (BlockType::SectionHeader, content) => format!("## {}\n\n", content.display_text()),
        (BlockType::Step, BlockContent::Step(step)) => {
            let mut md =
                format!("### Step {}: {}\n\n", step.step_number, step.step_description);
            md.push_str(&format!("**Instructions:** {}\n\n", step.step_instructions));
            if !step.step_expected_result.is_empty() {
                md.push_str(&format!("**Expected Result:** {}\n\n", step.step_expected_result));
            }
            if !step.step_who_responsible.is_empty() {
                md.push_str(&format!("**Responsible:** {}\n\n", step.step_who_responsible));
            }
            if step.ppe_required {
                md.push_str("**PPE Required**\n\n");
            }
            md
        }
        (BlockType::Question, BlockContent::Question(question)) => {
            let mut md = format!("#### Question: {}\n\n", question.question);
            if let Some(answer) = &question.answer {
                md.push_str(&format!("**Answer:** {answer}\n\n"));
            }
            md.push_str(&format!("*Status: {}*\n\n", question_status_label(question.status)));
            md
        }
        (BlockType::Warning, content) => format!("**WARNING:** {}\n\n", content.display_text()),
        (BlockType::Caution, content) => format!("**CAUTION:** {}\n\n", content.display_text()),
        (BlockType::PpeRequired, content) => {
            format!("**PPE Required:** {}\n\n", content.display_text())
        }
        (BlockType::Checklist, BlockContent::Checklist(checklist)) => {
            let mut md = String::new();
            for item in &checklist.items {
                let mark = if item.checked { "x" } else { " " };
                md.push_str(&format!("- [{mark}] {}\n", item.text));
            }
            md.push('\n');
            md
        }
        (BlockType::Image, BlockContent::Image(image)) => {
            let caption = image.caption.as_deref().unwrap_or("");
            format!("![{caption}]({})\n\n", image.image_url)
        }
        (BlockType::AdditionalInfo, content) => {
            format!("### Additional Information\n\n{}\n\n", content.display_text())
        }
        (_, content) => format!("{}\n\n", content.display_text()),
    }
}

pub(crate) fn plain_text(document: &Document, blocks: &[&Block]) -> String {
    let mut parts = Vec::new();

    parts.push(document.name.clone());
    parts.push("=".repeat(document.name.len()));
    parts.push(format!("Type: {}", title_case(document.document_type.as_str())));
    parts.push(format!("Version: {}", document.version));
    parts.push(format!("Status: {}", title_case(document.status.as_str())));
    parts.push(format!("Created: {}", document.created_at.format("%Y-%m-%d")));
    parts.push(String::new());

    for block in blocks {
        parts.push(render_block_plain(block));
    }

    parts.join("\n")
}

fn render_block_plain(block: &Block) -> String {
    match (&block.block_type, &block.content) {
        (BlockType::SectionHeader, content) => {
            let text = content.display_text();
            format!("\n{text}\n{}\n", "-".repeat(text.len()))
        }
        (BlockType::Step, BlockContent::Step(step)) => {
            let mut text = format!("Step {}: {}\n", step.step_number, step.step_description);
            text.push_str(&format!("Instructions: {}\n", step.step_instructions));
            if !step.step_expected_result.is_empty() {
                text.push_str(&format!("Expected Result: {}\n", step.step_expected_result));
            }
            if !step.step_who_responsible.is_empty() {
                text.push_str(&format!("Responsible: {}\n", step.step_who_responsible));
            }
            if step.ppe_required {
                text.push_str("PPE Required\n");
            }
            text
        }
        (BlockType::Question, BlockContent::Question(question)) => {
            let mut text = format!("Question: {}\n", question.question);
            if let Some(answer) = &question.answer {
                text.push_str(&format!("Answer: {answer}\n"));
            }
            text.push_str(&format!("Status: {}\n", question_status_label(question.status)));
            text
        }
        (BlockType::Warning, content) => format!("WARNING: {}", content.display_text()),
        (BlockType::Caution, content) => format!("CAUTION: {}", content.display_text()),
        (BlockType::PpeRequired, content) => {
            format!("PPE Required: {}", content.display_text())
        }
        (BlockType::Checklist, BlockContent::Checklist(checklist)) => {
            let mut text = String::new();
            for item in &checklist.items {
                let mark = if item.checked { "[x]" } else { "[ ]" };
                text.push_str(&format!("{mark} {}\n", item.text));
            }
            text
        }
        (_, content) => content.display_text(),
    }
}

pub(crate) fn json(document: &Document, blocks: &[&Block]) -> Result<String, AssemblyError> {
    let payload = json!({
        "document": {
            "id": document.id.0,
            "document_key": document.document_key.0,
            "version": document.version,
            "name": document.name,
            "document_type": document.document_type.as_str(),
            "tier": document.tier.as_str(),
            "status": document.status.as_str(),
            "created_at": document.created_at.to_rfc3339(),
            "updated_at": document.updated_at.to_rfc3339(),
            "metadata": document.metadata,
        },
        "blocks": blocks
            .iter()
            .map(|block| {
                json!({
                    "id": block.id.0,
                    "block_type": block.block_type.as_str(),
                    "block_order": block.block_order,
                    "content": block.content,
                    "metadata": block.metadata,
                    "created_at": block.created_at.to_rfc3339(),
                    "updated_at": block.updated_at.to_rfc3339(),
                })
            })
            .collect::<Vec<_>>(),
    });

    serde_json::to_string_pretty(&payload).map_err(|e| AssemblyError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{TimeZone, Utc};

    use crate::assembly::{AssemblyConfig, AssemblyFormat, DocumentAssembler};
    use crate::domain::block::{
        Block, BlockContent, BlockId, BlockType, QuestionContent, StepContent,
    };
    use crate::domain::document::{
        Document, DocumentId, DocumentKey, DocumentStatus, DocumentTier, DocumentType, OrgId,
        UserId,
    };

    fn base_document(blocks: Vec<Block>) -> Document {
        let created = Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap();
        Document {
            id: DocumentId("doc-9".to_string()),
            document_key: DocumentKey("key-9".to_string()),
            version: 2,
            name: "Forklift Inspection".to_string(),
            document_type: DocumentType::Procedure,
            tier: DocumentTier::Pro,
            status: DocumentStatus::ToUser,
            org_id: OrgId("org-1".to_string()),
            created_by: UserId("user-1".to_string()),
            updated_by: UserId("user-1".to_string()),
            metadata: BTreeMap::from([(
                "department".to_string(),
                serde_json::json!("logistics"),
            )]),
            created_at: created,
            updated_at: created,
            blocks,
        }
    }

    fn block(order: i64, block_type: BlockType, content: BlockContent) -> Block {
        let created = Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap();
        Block {
            id: BlockId(format!("blk-{order}")),
            document_id: DocumentId("doc-9".to_string()),
            block_type,
            block_order: order,
            content,
            metadata: BTreeMap::new(),
            is_active: true,
            created_by: UserId("user-1".to_string()),
            updated_by: UserId("user-1".to_string()),
            created_at: created,
            updated_at: created,
        }
    }

    fn step(order: i64, number: u32, description: &str) -> Block {
        block(
            order,
            BlockType::Step,
            BlockContent::Step(StepContent {
                step_number: number,
                step_description: description.to_string(),
                step_instructions: "Check thoroughly".to_string(),
                step_expected_result: String::new(),
                step_who_responsible: "Operator".to_string(),
                ppe_required: true,
                step_image_url: None,
            }),
        )
    }

    #[test]
    fn markdown_toc_lists_sections_and_steps_in_order() {
        let doc = base_document(vec![
            block(1, BlockType::Title, BlockContent::text("Forklift Inspection")),
            block(2, BlockType::SectionHeader, BlockContent::text("Pre-checks")),
            step(3, 1, "Inspect forks"),
        ]);
        let assembled = DocumentAssembler::new()
            .assemble_document(&doc, &AssemblyConfig::new(AssemblyFormat::Markdown))
            .expect("markdown");

        let toc_start = assembled.content.find("## Table of Contents").expect("toc");
        let section = assembled.content.find("- Pre-checks").expect("section entry");
        let step_entry = assembled.content.find("- Step 1: Inspect forks").expect("step entry");
        assert!(toc_start < section && section < step_entry);
    }

    #[test]
    fn step_rendering_includes_conditional_lines() {
        let doc = base_document(vec![step(1, 1, "Inspect forks")]);
        let assembled = DocumentAssembler::new()
            .assemble_document(
                &doc,
                &AssemblyConfig {
                    format: AssemblyFormat::PlainText,
                    include_toc: false,
                    include_metadata: false,
                },
            )
            .expect("plain text");

        assert!(assembled.content.contains("Step 1: Inspect forks"));
        assert!(assembled.content.contains("Responsible: Operator"));
        assert!(assembled.content.contains("PPE Required"));
        assert!(!assembled.content.contains("Expected Result"));
    }

    #[test]
    fn answered_question_renders_answer_line() {
        let mut content = QuestionContent::open("Which PPE applies?");
        content.answer = Some("Gloves and goggles".to_string());
        content.status = crate::domain::block::QuestionStatus::Answered;
        let doc = base_document(vec![block(1, BlockType::Question, BlockContent::Question(content))]);

        let assembled = DocumentAssembler::new()
            .assemble_document(&doc, &AssemblyConfig::new(AssemblyFormat::Markdown))
            .expect("markdown");
        assert!(assembled.content.contains("**Answer:** Gloves and goggles"));
        assert!(assembled.content.contains("*Status: answered*"));
    }

    #[test]
    fn json_output_carries_document_and_block_rows() {
        let doc = base_document(vec![block(
            1,
            BlockType::Title,
            BlockContent::text("Forklift Inspection"),
        )]);
        let assembled = DocumentAssembler::new()
            .assemble_document(&doc, &AssemblyConfig::new(AssemblyFormat::Json))
            .expect("json");

        let value: serde_json::Value =
            serde_json::from_str(&assembled.content).expect("valid json");
        assert_eq!(value["document"]["document_key"], "key-9");
        assert_eq!(value["blocks"][0]["block_type"], "title");
        assert_eq!(value["blocks"][0]["block_order"], 1);
    }

    #[test]
    fn metadata_appendix_is_included_when_requested() {
        let doc = base_document(vec![block(1, BlockType::Title, BlockContent::text("T"))]);
        let with = DocumentAssembler::new()
            .assemble_document(&doc, &AssemblyConfig::new(AssemblyFormat::Markdown))
            .expect("with metadata");
        assert!(with.content.contains("## Document Metadata"));
        assert!(with.content.contains("logistics"));

        let without = DocumentAssembler::new()
            .assemble_document(
                &doc,
                &AssemblyConfig {
                    format: AssemblyFormat::Markdown,
                    include_toc: true,
                    include_metadata: false,
                },
            )
            .expect("without metadata");
        assert!(!without.content.contains("## Document Metadata"));
    }
}
