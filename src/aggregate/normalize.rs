//! Categorical normalizers for firmographic dimensions.
//!
//! All pure, total functions: a category label out, or `None` for
//! unclassifiable input (which drops the lead from that dimension's
//! coverage numerator, never aborts anything).

use std::sync::OnceLock;

use regex::Regex;

// ============================================================================
// Revenue banding
// ============================================================================

pub const REVENUE_SMALL: &str = "Small (<$1M)";
pub const REVENUE_MEDIUM: &str = "Medium ($1M-$10M)";
pub const REVENUE_LARGE: &str = "Large ($10M-$100M)";
pub const REVENUE_ENTERPRISE: &str = "Enterprise ($100M+)";

/// Band a raw revenue value.
///
/// Numeric strings (with optional `$`, commas, whitespace) band by value.
/// Non-numeric text falls back to unit keywords: "million" → Medium,
/// "billion" → Enterprise. Anything else is unclassifiable.
pub fn normalize_revenue(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let cleaned: String = trimmed
        .chars()
        .filter(|c| !matches!(c, '$' | ',') && !c.is_whitespace())
        .collect();
    if let Ok(value) = cleaned.parse::<f64>() {
        if value < 0.0 {
            return None;
        }
        let band = if value < 1_000_000.0 {
            REVENUE_SMALL
        } else if value < 10_000_000.0 {
            REVENUE_MEDIUM
        } else if value < 100_000_000.0 {
            REVENUE_LARGE
        } else {
            REVENUE_ENTERPRISE
        };
        return Some(band.to_string());
    }

    let lowered = trimmed.to_lowercase();
    if lowered.contains("billion") {
        return Some(REVENUE_ENTERPRISE.to_string());
    }
    if lowered.contains("million") {
        return Some(REVENUE_MEDIUM.to_string());
    }
    None
}

// ============================================================================
// Company-size banding
// ============================================================================

/// Band an employee count. Non-numeric text is unclassifiable.
pub fn normalize_company_size(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .trim()
        .trim_end_matches('+')
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    let count = cleaned.parse::<i64>().ok()?;
    if count <= 0 {
        return None;
    }
    let band = match count {
        1..=9 => "1-9",
        10..=49 => "10-49",
        50..=199 => "50-199",
        200..=999 => "200-999",
        _ => "1000+",
    };
    Some(band.to_string())
}

// ============================================================================
// Company-maturity banding
// ============================================================================

fn year_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(1[89]\d{2}|20\d{2})\b").expect("static year regex"))
}

/// Band company age from free text mentioning a founding year.
///
/// Takes the first 4-digit year in [1800, current_year]; years in the
/// future or before 1800 are rejected.
pub fn normalize_company_age(raw: &str, current_year: i32) -> Option<String> {
    let founded = year_regex()
        .find_iter(raw)
        .filter_map(|m| m.as_str().parse::<i32>().ok())
        .find(|year| (1800..=current_year).contains(year))?;

    let age = current_year - founded;
    let band = if age < 2 {
        "0-2 years"
    } else if age < 5 {
        "2-5 years"
    } else if age < 10 {
        "5-10 years"
    } else if age < 20 {
        "10-20 years"
    } else {
        "20+ years"
    };
    Some(band.to_string())
}

// ============================================================================
// Job-title canonicalization
// ============================================================================

/// Word-level token match, so "CEO" matches "Founder & CEO" but an acronym
/// buried inside another word does not.
fn has_token(lowered: &str, token: &str) -> bool {
    lowered
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| word == token)
}

fn department(lowered: &str) -> Option<&'static str> {
    if lowered.contains("sales") || lowered.contains("revenue") || lowered.contains("business development") {
        Some("Sales")
    } else if lowered.contains("marketing") || lowered.contains("growth") {
        Some("Marketing")
    } else if lowered.contains("engineering") || lowered.contains("technology") || lowered.contains("technical") {
        Some("Engineering")
    } else if lowered.contains("operations") || has_token(lowered, "ops") {
        Some("Operations")
    } else if lowered.contains("product") {
        Some("Product")
    } else if lowered.contains("finance") {
        Some("Finance")
    } else {
        None
    }
}

/// Canonicalize a job title for the seniority dimension.
///
/// Priority-ordered cascade, first matching rule wins: C-level by specific
/// role, then VP by department, then Director, then Manager, then
/// Owner/Founder/Partner, then President. "Founder & CEO" hits the CEO rule
/// because C-level is checked before Founder; "Vice President ..." hits the
/// VP rule before the President rule can see it. Unmatched titles pass
/// through verbatim, trimmed.
pub fn normalize_job_title(raw: &str) -> String {
    let trimmed = raw.trim();
    let lowered = trimmed.to_lowercase();

    // C-level, specific role first.
    if has_token(&lowered, "ceo") || lowered.contains("chief executive") {
        return "CEO".to_string();
    }
    if has_token(&lowered, "coo") || lowered.contains("chief operating") {
        return "COO".to_string();
    }
    if has_token(&lowered, "cfo") || lowered.contains("chief financial") {
        return "CFO".to_string();
    }
    if has_token(&lowered, "cto") || lowered.contains("chief technology") || lowered.contains("chief technical") {
        return "CTO".to_string();
    }
    if has_token(&lowered, "cmo") || lowered.contains("chief marketing") {
        return "CMO".to_string();
    }
    if has_token(&lowered, "cro") || lowered.contains("chief revenue") {
        return "CRO".to_string();
    }

    if has_token(&lowered, "vp") || lowered.contains("vice president") {
        return match department(&lowered) {
            Some(dept) => format!("VP {}", dept),
            None => "VP".to_string(),
        };
    }

    if lowered.contains("director") {
        return match department(&lowered) {
            Some(dept) => format!("Director of {}", dept),
            None => "Director".to_string(),
        };
    }

    if lowered.contains("manager") {
        return match department(&lowered) {
            Some(dept) => format!("{} Manager", dept),
            None => "Manager".to_string(),
        };
    }

    if lowered.contains("owner") || lowered.contains("founder") || lowered.contains("partner") {
        return "Founder/Owner".to_string();
    }

    if lowered.contains("president") {
        return "President".to_string();
    }

    trimmed.to_string()
}
