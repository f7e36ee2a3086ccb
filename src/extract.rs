use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};
use regex::Regex;

/// Line-level noise filters for repeated page furniture: bare page labels,
/// standalone numbers, month/year stamps, and boilerplate notices.
pub struct PageFilters {
    noise_rules: Vec<Regex>,
}

const NOISE_PATTERNS: [&str; 6] = [
    r"^Page \d+$",
    r"^\d+$",
    r"^[A-Za-z]+ \d+$",
    r"^Copyright",
    r"^All rights reserved",
    r"^Confidential",
];

impl PageFilters {
    pub fn new() -> Result<Self> {
        let noise_rules = NOISE_PATTERNS
            .iter()
            .map(|pattern| {
                Regex::new(pattern)
                    .with_context(|| format!("failed to compile noise pattern: {pattern}"))
            })
            .collect::<Result<Vec<Regex>>>()?;

        Ok(Self { noise_rules })
    }

    fn line_is_noise(&self, line: &str) -> bool {
        self.noise_rules.iter().any(|rule| rule.is_match(line))
    }
}

pub struct NormalizedPages {
    pub pages: BTreeMap<u32, String>,
    pub noise_lines_removed: usize,
}

/// Extract per-page text from a PDF with pdftotext, keyed by 1-based page
/// number. Pages with no extractable text are omitted from the mapping.
pub fn extract_pages(pdf_path: &Path, max_pages: Option<usize>) -> Result<BTreeMap<u32, String>> {
    let mut command = Command::new("pdftotext");
    command.arg("-enc").arg("UTF-8").arg("-f").arg("1");
    if let Some(max_pages) = max_pages {
        command.arg("-l").arg(max_pages.to_string());
    }
    command.arg(pdf_path).arg("-");

    let output = command
        .output()
        .with_context(|| format!("failed to execute pdftotext for {}", pdf_path.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "pdftotext returned non-zero exit status for {}: {}",
            pdf_path.display(),
            stderr.trim()
        );
    }

    let raw = String::from_utf8_lossy(&output.stdout);
    let mut pages = BTreeMap::new();

    for (index, chunk) in raw.split('\u{000C}').enumerate() {
        let text = chunk.replace('\u{0000}', "");
        if text.trim().is_empty() {
            continue;
        }
        pages.insert((index + 1) as u32, text);
    }

    Ok(pages)
}

/// Normalize raw page text for segmentation: newlines unified, whitespace
/// runs collapsed within lines, noise lines dropped. Blank lines survive so
/// paragraph boundaries stay visible to the subsection splitter.
pub fn normalize_pages(filters: &PageFilters, pages: BTreeMap<u32, String>) -> NormalizedPages {
    let mut normalized = BTreeMap::new();
    let mut noise_lines_removed = 0usize;

    for (page_number, text) in pages {
        let unified = text.replace("\r\n", "\n").replace('\r', "\n");

        let mut lines = Vec::new();
        for line in unified.lines() {
            let collapsed = line.split_whitespace().collect::<Vec<&str>>().join(" ");
            if !collapsed.is_empty() && filters.line_is_noise(&collapsed) {
                noise_lines_removed += 1;
                continue;
            }
            lines.push(collapsed);
        }

        normalized.insert(page_number, lines.join("\n"));
    }

    NormalizedPages {
        pages: normalized,
        noise_lines_removed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize_one(text: &str) -> (String, usize) {
        let filters = PageFilters::new().expect("noise patterns compile");
        let mut pages = BTreeMap::new();
        pages.insert(1, text.to_string());

        let normalized = normalize_pages(&filters, pages);
        let page = normalized.pages.get(&1).cloned().unwrap_or_default();
        (page, normalized.noise_lines_removed)
    }

    #[test]
    fn normalize_pages_drops_noise_lines() {
        let (page, removed) = normalize_one(
            "Page 12\nActual content line\n42\nCopyright 2024 Example Corp\nMore content",
        );

        assert_eq!(page, "Actual content line\nMore content");
        assert_eq!(removed, 3);
    }

    #[test]
    fn normalize_pages_collapses_whitespace_within_lines() {
        let (page, _) = normalize_one("Spaced   out\ttext here\nSecond    line");

        assert_eq!(page, "Spaced out text here\nSecond line");
    }

    #[test]
    fn normalize_pages_preserves_blank_line_boundaries() {
        let (page, _) = normalize_one("First paragraph line\n\nSecond paragraph line");

        assert_eq!(page, "First paragraph line\n\nSecond paragraph line");
    }

    #[test]
    fn normalize_pages_unifies_carriage_returns() {
        let (page, _) = normalize_one("one\r\ntwo\rthree");

        assert_eq!(page, "one\ntwo\nthree");
    }

    #[test]
    fn month_year_stamps_are_noise_but_longer_lines_are_not() {
        let (page, removed) = normalize_one("January 2024\nJanuary 2024 was a cold month");

        assert_eq!(page, "January 2024 was a cold month");
        assert_eq!(removed, 1);
    }
}
