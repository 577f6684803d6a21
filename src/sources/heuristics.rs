//! Keyword heuristics shared by the adapters. Best-effort signals only.

const BIG_TECH: &[&str] = &["google", "apple", "microsoft", "amazon", "meta"];
const UNICORNS: &[&str] = &["uber", "airbnb", "stripe", "spacex"];

const INDUSTRY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "Technology",
        &["tech", "software", "digital", "cloud", "ai", "data", "cyber"],
    ),
    (
        "Financial Services",
        &["bank", "financial", "capital", "investment", "fund", "trading"],
    ),
    (
        "Healthcare",
        &["health", "medical", "pharma", "bio", "hospital", "clinic"],
    ),
    (
        "Consulting",
        &["consulting", "advisory", "strategy", "mckinsey", "bain", "bcg"],
    ),
    (
        "Manufacturing",
        &["manufacturing", "automotive", "industrial", "aerospace"],
    ),
    (
        "Media & Entertainment",
        &["media", "entertainment", "content", "publishing", "news"],
    ),
];

/// Industry label from a company name.
pub fn classify_industry(company: &str) -> &'static str {
    let company = company.to_lowercase();
    let words: Vec<&str> = company
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    for (industry, keywords) in INDUSTRY_KEYWORDS {
        // Two-letter keywords must match a whole word ("ai" in "Daily" is not AI).
        let hit = keywords.iter().any(|k| {
            if k.len() <= 2 {
                words.contains(k)
            } else {
                company.contains(k)
            }
        });
        if hit {
            return industry;
        }
    }
    "Business Services"
}

/// Inputs to the net-worth band estimate.
#[derive(Debug, Default, Clone, Copy)]
pub struct WealthSignals<'a> {
    pub title: Option<&'a str>,
    pub company: Option<&'a str>,
    pub seniority: Option<&'a str>,
    pub city: Option<&'a str>,
}

/// Net-worth band from employment signals.
pub fn estimate_net_worth(signals: WealthSignals<'_>) -> &'static str {
    let mut score = 0.0;

    let title = signals.title.unwrap_or_default().to_lowercase();
    if ["ceo", "founder", "president", "chief"]
        .iter()
        .any(|t| title.contains(t))
    {
        score += 4.0;
    } else if ["vp", "vice president", "director"]
        .iter()
        .any(|t| title.contains(t))
    {
        score += 3.0;
    } else if ["senior", "principal", "lead"]
        .iter()
        .any(|t| title.contains(t))
    {
        score += 2.0;
    } else if title.contains("manager") {
        score += 1.0;
    }

    let company = signals.company.unwrap_or_default().to_lowercase();
    if BIG_TECH.iter().any(|c| company.contains(c)) {
        score += 2.0;
    } else if UNICORNS.iter().any(|c| company.contains(c)) {
        score += 1.5;
    }

    let seniority = signals.seniority.unwrap_or_default().to_lowercase();
    if seniority.contains("executive") {
        score += 2.0;
    } else if seniority.contains("senior") {
        score += 1.0;
    }

    let city = signals.city.unwrap_or_default().to_lowercase();
    if ["san francisco", "new york", "london", "zurich"].contains(&city.as_str()) {
        score += 1.0;
    } else if ["seattle", "boston", "los angeles", "singapore"].contains(&city.as_str()) {
        score += 0.5;
    }

    net_worth_band(score)
}

fn net_worth_band(score: f64) -> &'static str {
    if score >= 7.0 {
        "$5M - $10M+"
    } else if score >= 5.0 {
        "$2.5M - $5M"
    } else if score >= 4.0 {
        "$1M - $2.5M"
    } else if score >= 3.0 {
        "$500K - $1M"
    } else if score >= 2.0 {
        "$250K - $500K"
    } else {
        "$100K - $250K"
    }
}

/// Whole-word match for single tokens, substring match for phrases and
/// hyphenated terms.
pub fn has_term(text: &str, term: &str) -> bool {
    if term.chars().any(|c| !c.is_alphanumeric()) {
        return text.contains(term);
    }
    text.split(|c: char| !c.is_alphanumeric())
        .any(|word| word == term)
}

pub fn has_any_term(text: &str, terms: &[&str]) -> bool {
    terms.iter().any(|t| has_term(text, t))
}

/// Coarse seniority bucket from a job title.
pub fn seniority_from_title(title: &str) -> Option<&'static str> {
    let title = title.to_lowercase();
    let any = |terms: &[&str]| has_any_term(&title, terms);

    if any(&["ceo", "cto", "cfo", "coo", "chief", "founder", "president", "owner"][..]) {
        Some("executive")
    } else if any(&["vp", "vice president", "director", "head of"][..]) {
        Some("director")
    } else if any(&["senior", "sr", "principal", "lead", "staff"][..]) {
        Some("senior")
    } else if any(&["manager"][..]) {
        Some("manager")
    } else if title.trim().is_empty() {
        None
    } else {
        Some("individual_contributor")
    }
}

/// "acme-widgets.co.uk" -> "Acme Widgets".
pub fn company_from_domain(domain: &str) -> Option<String> {
    let label = domain.split('.').next()?.trim();
    if label.is_empty() {
        return None;
    }
    let name = label
        .split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ");
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_industry_keywords() {
        assert_eq!(classify_industry("Acme Software"), "Technology");
        assert_eq!(classify_industry("First Capital Partners"), "Financial Services");
        assert_eq!(classify_industry("Mayo Clinic"), "Healthcare");
        assert_eq!(classify_industry("Open AI"), "Technology");
        assert_eq!(classify_industry("Daily Bread"), "Business Services");
    }

    #[test]
    fn test_net_worth_bands() {
        let exec = WealthSignals {
            title: Some("CEO"),
            company: Some("Google"),
            seniority: Some("executive"),
            city: Some("San Francisco"),
        };
        assert_eq!(estimate_net_worth(exec), "$5M - $10M+");

        let manager = WealthSignals {
            title: Some("Account Manager"),
            ..Default::default()
        };
        assert_eq!(estimate_net_worth(manager), "$100K - $250K");

        let director = WealthSignals {
            title: Some("Director of Sales"),
            city: Some("Boston"),
            ..Default::default()
        };
        assert_eq!(estimate_net_worth(director), "$500K - $1M");
    }

    #[test]
    fn test_company_from_domain() {
        assert_eq!(company_from_domain("acme.com").as_deref(), Some("Acme"));
        assert_eq!(
            company_from_domain("acme-widgets.co.uk").as_deref(),
            Some("Acme Widgets")
        );
        assert_eq!(company_from_domain(""), None);
    }

    #[test]
    fn test_seniority_from_title() {
        assert_eq!(seniority_from_title("Chief Revenue Officer"), Some("executive"));
        assert_eq!(seniority_from_title("VP Engineering"), Some("director"));
        assert_eq!(seniority_from_title("Director of Sales"), Some("director"));
        assert_eq!(seniority_from_title("Project Coordinator"), Some("individual_contributor"));
        assert_eq!(seniority_from_title("Senior Analyst"), Some("senior"));
        assert_eq!(seniority_from_title("Analyst"), Some("individual_contributor"));
        assert_eq!(seniority_from_title(""), None);
    }
}
