use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisInput {
    pub documents: Vec<DocumentEntry>,
    pub persona: PersonaSpec,
    pub job_to_be_done: JobSpec,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentEntry {
    pub filename: String,
    #[serde(default)]
    #[allow(dead_code)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersonaSpec {
    pub role: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobSpec {
    pub task: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutput {
    pub metadata: AnalysisMetadata,
    pub extracted_sections: Vec<ExtractedSection>,
    pub subsection_analysis: Vec<RefinedSubsection>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisMetadata {
    pub input_documents: Vec<String>,
    pub persona: String,
    pub job_to_be_done: String,
    pub processing_timestamp: String,
}

/// Summary row for one top-ranked section, in the output JSON schema.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedSection {
    pub document: String,
    pub section_title: String,
    pub importance_rank: usize,
    pub page_number: u32,
}

/// Refined excerpt for one top-ranked section.
#[derive(Debug, Clone, Serialize)]
pub struct RefinedSubsection {
    pub document: String,
    pub refined_text: String,
    pub page_number: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfEntry {
    pub filename: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInventoryManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub source_directory: String,
    pub pdf_count: usize,
    pub pdfs: Vec<PdfEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisPaths {
    pub input_path: String,
    pub output_path: String,
    pub pdf_dir: String,
    pub manifest_path: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisCounts {
    pub document_count: usize,
    pub processed_document_count: usize,
    pub empty_document_count: usize,
    pub page_count: usize,
    pub noise_lines_removed: usize,
    pub section_count: usize,
    pub fallback_document_count: usize,
    pub subsection_count: usize,
    pub selected_section_count: usize,
    pub refined_subsection_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoringSummary {
    pub mode: String,
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub persona: String,
    pub job_to_be_done: String,
    pub paths: AnalysisPaths,
    pub counts: AnalysisCounts,
    pub scoring: ScoringSummary,
    pub warnings: Vec<String>,
}
