//! Plain-text rendering of workflow state.

use docseek_api::{Document, HealthStatus};
use docseek_runtime::upload::UploadJob;
use docseek_runtime::{Credential, RankedResult, RegistryView, SearchView};

/// Highlighted runs are wrapped in `[[` `]]`.
pub fn highlighted(result: &RankedResult) -> String {
    let mut out = String::with_capacity(result.hit.content.len() + 16);
    for (segment, marked) in result.segments() {
        if marked {
            out.push_str("[[");
            out.push_str(segment);
            out.push_str("]]");
        } else {
            out.push_str(segment);
        }
    }
    out
}

pub fn result(rank: usize, result: &RankedResult) -> String {
    format!(
        "{}. {} · {} · {} [{}]\n   {}",
        rank,
        result.hit.filename,
        result.hit.chunk_label(),
        result.hit.match_label(),
        result.tier.label(),
        highlighted(result)
    )
}

pub fn search_view(view: &SearchView, query: &str) -> String {
    match view {
        SearchView::Idle => "Enter a query to search your documents.".to_string(),
        SearchView::Loading => "Searching...".to_string(),
        SearchView::Error(msg) => format!("Error: {}", msg),
        SearchView::NoResults => format!(
            "No results for \"{}\". Try a lower similarity threshold or different terms.",
            query
        ),
        SearchView::Results(results) => {
            let mut lines = vec![format!(
                "{} result{} for \"{}\"",
                results.len(),
                if results.len() == 1 { "" } else { "s" },
                query
            )];
            lines.extend(results.iter().enumerate().map(|(i, r)| result(i + 1, r)));
            lines.join("\n")
        }
    }
}

pub fn document(doc: &Document) -> String {
    format!(
        "  {}  {}  [{}]  {} chunks  {}",
        doc.file_id,
        doc.filename,
        doc.status,
        doc.chunks_count,
        doc.formatted_upload_date()
    )
}

pub fn registry_view(view: &RegistryView, count_label: &str, total_chunks: u64) -> String {
    match view {
        RegistryView::Loading => "Loading documents...".to_string(),
        RegistryView::Error(msg) => format!("Error: {} (run `docs` to retry)", msg),
        RegistryView::Empty => "No documents yet. Upload one with `upload <path>`.".to_string(),
        RegistryView::Documents(docs) => {
            let mut lines = vec![format!("{} · {} chunks", count_label, total_chunks)];
            lines.extend(docs.iter().map(document));
            lines.join("\n")
        }
    }
}

pub fn upload_job(job: &UploadJob) -> String {
    let file = job
        .file
        .as_ref()
        .map(|f| format!("{} ({} bytes, {})", f.name, f.size, f.mime_type))
        .unwrap_or_else(|| "no file".to_string());
    let mut line = format!("Upload: {} · {} · {}%", job.status, file, job.progress);
    if let Some(err) = &job.error {
        line.push_str(&format!("\n  Error: {}", err));
    }
    line
}

pub fn credential(credential: &Credential) -> String {
    let key = credential
        .key
        .as_ref()
        .map(|k| k.to_string())
        .unwrap_or_else(|| "not set".to_string());
    let mut line = format!("API key: {} ({})", key, credential.validity);
    if let Some(err) = &credential.last_error {
        line.push_str(&format!("\n  {}", err));
    }
    line
}

/// In-flight operations, or `None` when nothing is running.
pub fn busy(validating: bool, searching: bool, deleting: Option<&str>) -> Option<String> {
    let mut parts = Vec::new();
    if validating {
        parts.push("validating API key".to_string());
    }
    if searching {
        parts.push("searching".to_string());
    }
    if let Some(file_id) = deleting {
        parts.push(format!("deleting {}", file_id));
    }
    if parts.is_empty() {
        None
    } else {
        Some(format!("Busy: {}", parts.join(", ")))
    }
}

pub fn health(health: &HealthStatus) -> String {
    let mut line = format!("Service: {}", health.status);
    if !health.redis.is_empty() {
        line.push_str(&format!(" · redis {}", health.redis));
    }
    if !health.message.is_empty() {
        line.push_str(&format!(" · {}", health.message));
    }
    line
}
