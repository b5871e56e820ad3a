//! Fuzzy matching of detected headers against the template library.

use std::collections::HashSet;

use super::template::BrokerTemplate;

/// Minimum match score (percent) for a template to auto-apply. Overridable
/// per workflow for testing; 80 is the production policy.
pub const MATCH_THRESHOLD: f64 = 80.0;

/// Lowercase and collapse internal whitespace so `" Entry  Price "` and
/// `"entry price"` compare equal.
fn normalize_header(header: &str) -> String {
    header
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Similarity of an upload's headers to a template's sample headers, as a
/// percentage: `|intersection| / max(|headers|, |sample|) * 100`.
pub fn score(headers: &[String], template: &BrokerTemplate) -> f64 {
    if headers.is_empty() || template.sample_headers.is_empty() {
        return 0.0;
    }

    let detected: HashSet<String> = headers.iter().map(|h| normalize_header(h)).collect();
    let sample: HashSet<String> = template
        .sample_headers
        .iter()
        .map(|h| normalize_header(h))
        .collect();

    let overlap = detected.intersection(&sample).count();
    let denom = detected.len().max(sample.len());
    overlap as f64 / denom as f64 * 100.0
}

/// Pick the best-scoring template at or above `threshold`, or `None` to route
/// the upload to manual mapping.
///
/// Ties break by usage count, then by most recent use.
pub fn best_match<'t>(
    headers: &[String],
    templates: &'t [BrokerTemplate],
    threshold: f64,
) -> Option<(&'t BrokerTemplate, f64)> {
    let mut best: Option<(&BrokerTemplate, f64)> = None;

    for template in templates {
        let s = score(headers, template);
        match best {
            None => best = Some((template, s)),
            Some((current, current_score)) => {
                if s > current_score + f64::EPSILON {
                    best = Some((template, s));
                } else if (s - current_score).abs() <= f64::EPSILON
                    && (template.usage_count > current.usage_count
                        || (template.usage_count == current.usage_count
                            && template.last_used_at > current.last_used_at))
                {
                    best = Some((template, s));
                }
            }
        }
    }

    best.filter(|(_, s)| *s >= threshold)
}
