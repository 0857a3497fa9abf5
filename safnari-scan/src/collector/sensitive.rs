//! `sensitive` module (spec §4.5): PII/secret scanning over file content.
//!
//! Two paths, chosen per file:
//! - **deterministic-stream**: chunked reads through `StreamScanner`, no
//!   content buffered in memory. Only available when nothing in the
//!   config needs the advanced path (no search terms, longtail off,
//!   critical-only engine, stream read mode).
//! - **advanced**: load the whole buffer, run the deterministic critical
//!   scanners plus regex for everything else, each regex pattern gated
//!   by the prefilter, then apply one shared limiter across both.

use sha2::{Digest, Sha256};

use safnari_core::{Config, FileRecord, FileTask, RedactionMode};

use super::{Collaborators, FileContext, Module};
use crate::content_reader::{self, ReaderParams};
use crate::patterns::prefilter::{Gate, GateMode};
use crate::patterns::{deterministic, Catalog, Match};

const TEXT_SAMPLE_SIZE: usize = 4096;
const CONTROL_BYTE_RATIO_LIMIT: f64 = 0.10;

pub struct SensitiveModule;

impl Module for SensitiveModule {
    fn id(&self) -> &'static str {
        "sensitive"
    }

    fn enabled(&self, cfg: &Config) -> bool {
        cfg.scan_sensitive
    }

    fn collect(
        &self,
        ctx: &mut FileContext,
        cfg: &Config,
        collaborators: &Collaborators,
        catalog: &Catalog,
        task: &FileTask,
        record: &mut FileRecord,
    ) {
        if catalog.critical.is_empty() && catalog.regex.is_empty() {
            return;
        }

        let mime = ctx.mime(collaborators.mime_probe).to_string();
        let params = reader_params(cfg);

        let looks_textual = mime.starts_with("text/")
            || mime.contains("json")
            || mime.contains("xml")
            || mime.contains("html")
            || mime.contains("javascript")
            || sample_is_textual(&task.absolute_path);
        if !looks_textual {
            return;
        }

        let wants_stream_path = matches!(cfg.content_read_mode, safnari_core::ContentReadMode::Stream)
            && matches!(
                cfg.sensitive_engine,
                safnari_core::SensitiveEngine::Auto
                    | safnari_core::SensitiveEngine::Deterministic
                    | safnari_core::SensitiveEngine::Hybrid
            )
            && matches!(cfg.sensitive_longtail, safnari_core::SensitiveLongtail::Off)
            && cfg.search_terms.is_empty()
            && !catalog.critical.is_empty();

        let result = if wants_stream_path {
            stream_scan(&task.absolute_path, &params, catalog, cfg)
        } else {
            let content = ctx.content(params);
            advanced_scan(content, catalog, cfg)
        };

        let Some(result) = result else {
            return;
        };

        if result.matches.is_empty() {
            if result.truncated {
                record.sensitive_data_truncated = true;
            }
            return;
        }

        let mut values: safnari_core::FxHashMap<String, Vec<String>> = Default::default();
        let mut counts: safnari_core::FxHashMap<String, usize> = Default::default();
        for m in &result.matches {
            *counts.entry(m.pattern.clone()).or_insert(0) += 1;
            values
                .entry(m.pattern.clone())
                .or_insert_with(Vec::new)
                .push(redact(&m.value, cfg.redaction));
        }

        record.sensitive_data = values;
        record.sensitive_data_match_counts = counts;
        record.sensitive_data_truncated = result.truncated;
    }
}

fn reader_params(cfg: &Config) -> ReaderParams {
    ReaderParams {
        max_size: cfg.max_file_size,
        mode: cfg.content_read_mode,
        mmap_min_size: cfg.mmap_min_size as u64,
        chunk_size: cfg.stream_chunk_size,
        overlap: cfg.stream_overlap_bytes,
    }
}

fn sample_is_textual(path: &std::path::Path) -> bool {
    let Ok(bytes) = std::fs::read(path) else {
        return false;
    };
    let sample = &bytes[..bytes.len().min(TEXT_SAMPLE_SIZE)];
    text_heuristic(sample)
}

/// Spec §4.5 "Text heuristic": valid UTF-8, no NUL, control-byte count
/// (excluding tab/LF/VT/FF/CR) at most 10% of the sample.
fn text_heuristic(sample: &[u8]) -> bool {
    if sample.is_empty() {
        return true;
    }
    let Ok(text) = std::str::from_utf8(sample) else {
        return false;
    };
    if text.contains('\0') {
        return false;
    }
    let control = text
        .bytes()
        .filter(|&b| b < 0x20 && !matches!(b, b'\t' | b'\n' | 0x0B | 0x0C | b'\r'))
        .count();
    (control as f64) <= (sample.len() as f64) * CONTROL_BYTE_RATIO_LIMIT
}

fn stream_scan(
    path: &std::path::Path,
    params: &ReaderParams,
    catalog: &Catalog,
    cfg: &Config,
) -> Option<deterministic::ScanResult> {
    let chunk_size = params.chunk_size.max(1);
    let overlap = params.overlap.min(chunk_size.saturating_sub(1));
    let file = std::fs::File::open(path).ok()?;
    let mut reader = std::io::BufReader::new(file);

    let mut scanner =
        deterministic::StreamScanner::new(catalog.critical.clone(), cfg.max_matches_per_type, cfg.max_matches_total);

    let mut fresh_buf = vec![0u8; chunk_size];
    let mut carry: Vec<u8> = Vec::new();
    let mut abs_pos: usize = 0;
    let mut total_read: u64 = 0;

    loop {
        let n = std::io::Read::read(&mut reader, &mut fresh_buf).ok()?;
        let fresh = &fresh_buf[..n];

        let mut chunk = Vec::with_capacity(carry.len() + fresh.len());
        chunk.extend_from_slice(&carry);
        chunk.extend_from_slice(fresh);

        if chunk.is_empty() {
            break;
        }

        total_read += fresh.len() as u64;
        scanner.feed_chunk(&chunk, abs_pos, carry.len());

        if n == 0 || total_read >= params.max_size {
            break;
        }

        let keep_from = chunk.len().saturating_sub(overlap);
        abs_pos += keep_from;
        carry = chunk[keep_from..].to_vec();
    }

    Some(scanner.finish())
}

fn advanced_scan(content: &[u8], catalog: &Catalog, cfg: &Config) -> Option<deterministic::ScanResult> {
    if content.is_empty() {
        return None;
    }
    let gate = Gate::new(GateMode::from(cfg.sensitive_gate_mode), &all_pattern_names(catalog));

    let gated_critical: Vec<String> = catalog
        .critical
        .iter()
        .filter(|name| gate.allows(name, content))
        .cloned()
        .collect();
    let mut raw: Vec<Match> = deterministic::scan_raw(content, &gated_critical);

    for rp in &catalog.regex {
        if !gate.allows(&rp.name, content) {
            continue;
        }
        for m in rp.regex.find_iter(content_as_str(content)) {
            raw.push(Match {
                pattern: rp.name.clone(),
                value: m.as_str().to_string(),
                start: m.start(),
                end: m.end(),
            });
        }
    }

    raw.sort_by_key(|m| m.start);
    Some(deterministic::apply_limits(raw, cfg.max_matches_per_type, cfg.max_matches_total))
}

fn all_pattern_names(catalog: &Catalog) -> Vec<String> {
    let mut names = catalog.critical.clone();
    names.extend(catalog.regex.iter().map(|r| r.name.clone()));
    names
}

/// Regex matching needs valid UTF-8; binary files fail the text
/// heuristic earlier and never reach here, so a lossy fallback is safe
/// for the rare sample that sneaks through.
fn content_as_str(content: &[u8]) -> &str {
    std::str::from_utf8(content).unwrap_or("")
}

fn redact(value: &str, mode: RedactionMode) -> String {
    match mode {
        RedactionMode::None => value.to_string(),
        RedactionMode::Hash => {
            let mut hasher = Sha256::new();
            hasher.update(value.as_bytes());
            let digest = hasher.finalize();
            digest.iter().map(|b| format!("{:02x}", b)).collect()
        }
        RedactionMode::Mask => mask(value),
    }
}

/// Keeps the first and last visible character so values are still
/// distinguishable in evidence review, masks the rest.
fn mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 2 {
        return "*".repeat(chars.len());
    }
    let mut out = String::with_capacity(chars.len());
    out.push(chars[0]);
    out.push_str(&"*".repeat(chars.len() - 2));
    out.push(chars[chars.len() - 1]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_heuristic_accepts_plain_text() {
        assert!(text_heuristic(b"contact me at test@example.com"));
    }

    #[test]
    fn text_heuristic_rejects_binary() {
        let mut sample = vec![0u8; 100];
        sample[0] = 1;
        assert!(!text_heuristic(&sample));
    }

    #[test]
    fn mask_preserves_first_and_last_char() {
        assert_eq!(mask("test@example.com"), "t**************m");
    }

    #[test]
    fn mask_short_values_fully_hidden() {
        assert_eq!(mask("ab"), "**");
    }

    #[test]
    fn hash_redaction_is_deterministic_hex() {
        let a = redact("secret", RedactionMode::Hash);
        let b = redact("secret", RedactionMode::Hash);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn advanced_scan_finds_single_email() {
        let catalog = Catalog::build(&["email".to_string()], &[], &[]);
        let cfg = Config::default();
        let result = advanced_scan(b"contact me at test@example.com", &catalog, &cfg).unwrap();
        assert_eq!(result.matches.len(), 1);
        assert_eq!(result.matches[0].value, "test@example.com");
    }
}
