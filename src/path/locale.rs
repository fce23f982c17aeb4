//! Locale tag helpers used for localized-value lookup.
//!
//! Only the parts of BCP 47 that influence fallback are modelled: language,
//! script, region and variants. Tags may use `_` instead of `-`.

/// Legacy language subtags and their current replacements.
const LEGACY_LANGUAGES: &[(&str, &str)] = &[("iw", "he"), ("in", "id"), ("ji", "yi"), ("jw", "jv")];

/// Whole-tag rewrites applied after case normalization.
const TAG_REWRITES: &[(&str, &str)] = &[
    ("zh-Hans-CN", "zh-CN"),
    ("zh-Hant-TW", "zh-TW"),
    ("zh-Hant-HK", "zh-HK"),
    ("zh-Hans-SG", "zh-SG"),
    ("zh-Hant-MO", "zh-MO"),
];

/// Regional fallbacks that cross region boundaries.
const REGION_FALLBACKS: &[(&str, &str)] = &[
    ("zh-HK", "zh-TW"),
    ("zh-MO", "zh-TW"),
    ("zh-SG", "zh-CN"),
    ("pt-AO", "pt-PT"),
    ("pt-CV", "pt-PT"),
    ("pt-GW", "pt-PT"),
    ("pt-MZ", "pt-PT"),
    ("pt-ST", "pt-PT"),
    ("pt-TL", "pt-PT"),
];

#[derive(Debug, Default, PartialEq, Eq)]
struct Subtags {
    language: String,
    script: Option<String>,
    region: Option<String>,
    variants: Vec<String>,
}

impl Subtags {
    fn parse(tag: &str) -> Self {
        let mut parts = tag.split(['-', '_']).filter(|p| !p.is_empty());
        let mut subtags = Subtags {
            language: parts.next().unwrap_or_default().to_ascii_lowercase(),
            ..Default::default()
        };
        if let Some(&(_, current)) = LEGACY_LANGUAGES.iter().find(|(old, _)| *old == subtags.language) {
            subtags.language = current.to_string();
        }
        for part in parts {
            let alpha = part.chars().all(|c| c.is_ascii_alphabetic());
            let digits = part.chars().all(|c| c.is_ascii_digit());
            if subtags.script.is_none() && subtags.region.is_none() && part.len() == 4 && alpha {
                let mut script = part.to_ascii_lowercase();
                script[..1].make_ascii_uppercase();
                subtags.script = Some(script);
            } else if subtags.region.is_none() && ((part.len() == 2 && alpha) || (part.len() == 3 && digits)) {
                subtags.region = Some(part.to_ascii_uppercase());
            } else {
                subtags.variants.push(part.to_ascii_lowercase());
            }
        }
        subtags
    }

    fn render(
        &self,
        script: bool,
        region: bool,
        variants: bool,
    ) -> String {
        let mut out = self.language.clone();
        if script {
            if let Some(s) = &self.script {
                out.push('-');
                out.push_str(s);
            }
        }
        if region {
            if let Some(r) = &self.region {
                out.push('-');
                out.push_str(r);
            }
        }
        if variants {
            for v in &self.variants {
                out.push('-');
                out.push_str(v);
            }
        }
        out
    }
}

/// Canonical spelling of a locale tag.
///
/// `_` becomes `-`, the language is lower-cased, a script is title-cased and
/// a region upper-cased. Legacy language codes and redundant script subtags
/// are rewritten. The empty tag stays empty.
pub fn canonicalize(tag: &str) -> String {
    if tag.is_empty() {
        return String::new();
    }
    let rendered = Subtags::parse(tag).render(true, true, true);
    TAG_REWRITES
        .iter()
        .find(|(from, _)| *from == rendered)
        .map(|(_, to)| to.to_string())
        .unwrap_or(rendered)
}

/// Progressively less specific tags to try after `tag` itself.
///
/// Variants are dropped first, then the script, then the region; known
/// cross-region fallbacks come right before the bare language. The result
/// never contains the canonical form of `tag` and has no duplicates.
pub fn fallback_strings(tag: &str) -> Vec<String> {
    if tag.is_empty() {
        return Vec::new();
    }
    let canonical = canonicalize(tag);
    let subtags = Subtags::parse(&canonical);

    let mut candidates = Vec::new();
    if !subtags.variants.is_empty() {
        candidates.push(subtags.render(true, true, false));
    }
    if subtags.script.is_some() && subtags.region.is_some() {
        candidates.push(subtags.render(false, true, false));
        candidates.push(subtags.render(true, false, false));
    } else if subtags.script.is_some() || subtags.region.is_some() {
        candidates.push(subtags.render(true, true, false));
    }
    let regional = subtags.render(false, true, false);
    if let Some(&(_, to)) = REGION_FALLBACKS.iter().find(|(from, _)| *from == regional) {
        candidates.push(to.to_string());
    }
    candidates.push(subtags.language.clone());

    let mut out: Vec<String> = Vec::new();
    for c in candidates {
        if c != canonical && !c.is_empty() && !out.contains(&c) {
            out.push(c);
        }
    }
    out
}

/// Primary language subtag: everything before the first `-` or `_` past
/// the leading character.
pub fn primary_subtag(tag: &str) -> &str {
    let Some(first) = tag.chars().next() else {
        return tag;
    };
    let start = first.len_utf8();
    match tag[start..].find(['-', '_']) {
        Some(end) => &tag[..start + end],
        None => tag,
    }
}
