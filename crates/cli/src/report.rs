use reasonscan_core::{
    ChunkReport, ChunkStatus, DetectedRow, Domain, LessonReport, ProfileStatus, ReportFormatter,
    Severity, TaxonomyRow,
};

/// Human-readable lesson report
#[derive(Debug, Clone, Copy)]
pub struct MarkdownFormatter {
    /// Include the per-chunk section
    pub chunk_details: bool,
}

impl Default for MarkdownFormatter {
    fn default() -> Self {
        Self { chunk_details: true }
    }
}

impl ReportFormatter for MarkdownFormatter {
    fn name(&self) -> &'static str {
        "markdown"
    }

    fn render(&self, report: &LessonReport) -> reasonscan_core::Result<String> {
        let mut md = String::new();
        render_header(&mut md, report);
        render_summary(&mut md, report);
        render_taxonomy(&mut md, report);
        render_rationality(&mut md, report);
        if self.chunk_details {
            render_chunks(&mut md, report);
        }
        Ok(md)
    }
}

fn render_header(md: &mut String, report: &LessonReport) {
    md.push_str(&format!("# Reasoning report: {}\n\n", report.source.title));
    md.push_str(&format!("- Source: `{}`\n", report.source.label));
    md.push_str(&format!("- Transcript id: `{}`\n", report.source.id));
    let coverage = &report.coverage;
    md.push_str(&format!(
        "- Chunks: `{}` total, `{}` analyzed, `{}` degraded\n",
        coverage.total_chunks, coverage.analyzed_chunks, coverage.degraded_chunks
    ));
    if coverage.validation_warnings > 0 {
        md.push_str(&format!(
            "- Validation warnings: `{}`\n",
            coverage.validation_warnings
        ));
    }
    md.push('\n');
    if coverage.incomplete_coverage {
        md.push_str(&format!(
            "> **Incomplete coverage:** chunks {} could not be analyzed and are excluded from all counts.\n\n",
            join_indices(&coverage.degraded_indices)
        ));
    }
}

fn render_summary(md: &mut String, report: &LessonReport) {
    md.push_str("## Summary\n\n");
    for paragraph in report.narrative.paragraphs() {
        md.push_str(paragraph);
        md.push_str("\n\n");
    }
    if !report.narrative.excerpts.is_empty() {
        md.push_str("Representative excerpts:\n\n");
        for excerpt in &report.narrative.excerpts {
            md.push_str(&format!("- {excerpt}\n"));
        }
        md.push('\n');
    }
}

fn render_taxonomy(md: &mut String, report: &LessonReport) {
    let thresholds = report.frequency_thresholds;
    md.push_str("## Master taxonomy\n\n");
    md.push_str(&format!(
        "Frequency: Low = one chunk or < {:.0}% of analyzed chunks, Medium = {:.0}–{:.0}%, High = > {:.0}%.\n\n",
        thresholds.low_below * 100.0,
        thresholds.low_below * 100.0,
        thresholds.high_above * 100.0,
        thresholds.high_above * 100.0
    ));

    for domain in Domain::ALL {
        md.push_str(&format!("### {} ({})\n\n", domain.label(), domain.code()));
        let rows: Vec<&DetectedRow> = report
            .taxonomy_in(domain)
            .filter_map(TaxonomyRow::detected)
            .collect();
        if rows.is_empty() {
            md.push_str("_None detected._\n\n");
            continue;
        }
        md.push_str("| type | chunks | frequency | low | medium | high | unrated | example |\n");
        md.push_str("|---|---:|---|---:|---:|---:|---:|---|\n");
        for row in rows {
            let count = |s: Severity| row.severity_distribution.get(&s).copied().unwrap_or(0);
            let example = row
                .representative_excerpts
                .first()
                .map(|e| format!("#{}: {}", e.chunk_index, truncate_one_line(&e.rationale, 100)))
                .unwrap_or_default();
            md.push_str(&format!(
                "| {} | `{}` | {} | `{}` | `{}` | `{}` | `{}` | {} |\n",
                escape_cell(&row.canonical_type_name),
                row.chunk_count,
                row.frequency.as_str(),
                count(Severity::Low),
                count(Severity::Medium),
                count(Severity::High),
                row.unrated_chunks,
                escape_cell(&example)
            ));
        }
        md.push('\n');
    }
}

fn render_rationality(md: &mut String, report: &LessonReport) {
    let profile = &report.rationality;
    md.push_str("## Rationality profile\n\n");
    if profile.status == ProfileStatus::InsufficientData {
        md.push_str("Insufficient data: no chunk returned a usable rating.\n\n");
    }
    md.push_str("| measure | value |\n");
    md.push_str("|---|---|\n");
    md.push_str(&format!(
        "| overall score | `{}` |\n",
        profile
            .overall_score
            .map_or_else(|| "n/a".to_string(), |s| format!("{s}/5"))
    ));
    md.push_str(&format!(
        "| unrounded | `{}` |\n",
        profile.overall_mean.map_or_else(|| "n/a".to_string(), |m| format!("{m:.2}"))
    ));
    md.push_str(&format!(
        "| rated chunks | `{}/{}` |\n",
        profile.rated_chunks, profile.total_chunks
    ));
    md.push_str(&format!(
        "| coverage | `{:.0}%` |\n",
        profile.chunk_coverage * 100.0
    ));
    md.push_str(&format!("| status | `{}` |\n", profile.status.as_str()));
    for (dimension, score) in &profile.dimension_scores {
        md.push_str(&format!(
            "| {} | `{}` |\n",
            escape_cell(dimension),
            score.map_or_else(|| "n/a".to_string(), |s| format!("{s:.2}"))
        ));
    }
    md.push('\n');
}

fn render_chunks(md: &mut String, report: &LessonReport) {
    md.push_str("## Chunks\n\n");
    let total = report.chunks.len();
    for (position, chunk) in report.chunks.iter().enumerate() {
        md.push_str(&format!(
            "### Section {} of {} (chunk {}, bytes {}..{})\n\n",
            position + 1,
            total,
            chunk.chunk_index,
            chunk.start_offset,
            chunk.end_offset
        ));
        render_chunk(md, chunk);
    }
}

fn render_chunk(md: &mut String, chunk: &ChunkReport) {
    if chunk.status == ChunkStatus::Degraded {
        let reason = chunk
            .degradation
            .as_ref()
            .map_or("unknown", |d| d.reason.as_str());
        md.push_str(&format!("_Not analyzed: {}_\n\n", truncate_one_line(reason, 200)));
        return;
    }

    if !chunk.argument_map.is_empty() {
        md.push_str("Argument map:\n\n");
        for entry in &chunk.argument_map {
            let marker = if entry.is_assumption { " _(assumption)_" } else { "" };
            md.push_str(&format!("- {}{marker}\n", entry.claim_text));
        }
        md.push('\n');
    }

    if chunk.annotations.is_empty() {
        md.push_str("No findings.\n\n");
    } else {
        md.push_str("| domain | type | severity | rationale |\n");
        md.push_str("|---|---|---|---|\n");
        for annotation in &chunk.annotations {
            md.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                annotation.domain.code(),
                escape_cell(&annotation.type_name),
                annotation.severity.map_or("n/a", Severity::as_str),
                escape_cell(&truncate_one_line(&annotation.rationale, 160))
            ));
        }
        md.push('\n');
    }

    match &chunk.rating {
        Some(rating) => md.push_str(&format!("Rating: `{}/5`\n\n", rating.overall_score)),
        None => md.push_str("Rating: `n/a`\n\n"),
    }

    for warning in &chunk.warnings {
        md.push_str(&format!("- warning: {}\n", truncate_one_line(&warning.message, 160)));
    }
    if !chunk.warnings.is_empty() {
        md.push('\n');
    }
}

fn join_indices(indices: &[usize]) -> String {
    indices
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn truncate_one_line(text: &str, max_chars: usize) -> String {
    let s = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if s.chars().count() <= max_chars {
        return s;
    }
    let truncated: String = s.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{truncated}…")
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}
