use super::*;

#[test]
fn canonicalize_normalizes_case_and_separators() {
    assert_eq!(canonicalize("en_us"), "en-US");
    assert_eq!(canonicalize("DE-ch"), "de-CH");
    assert_eq!(canonicalize("sr_latn_rs"), "sr-Latn-RS");
    assert_eq!(canonicalize("es-419"), "es-419");
    assert_eq!(canonicalize(""), "");
}

#[test]
fn canonicalize_rewrites_legacy_tags() {
    assert_eq!(canonicalize("iw"), "he");
    assert_eq!(canonicalize("in-ID"), "id-ID");
    assert_eq!(canonicalize("zh-hant-tw"), "zh-TW");
}

#[test]
fn fallback_strings_shorten_progressively() {
    assert_eq!(fallback_strings("de-CH"), vec!["de"]);
    assert_eq!(fallback_strings("en-US"), vec!["en"]);
    assert_eq!(fallback_strings("sr-Latn-RS"), vec!["sr-RS", "sr-Latn", "sr"]);
    assert_eq!(fallback_strings("ca-ES-valencia"), vec!["ca-ES", "ca"]);
}

#[test]
fn fallback_strings_include_cross_region_fallbacks() {
    assert_eq!(fallback_strings("zh-HK"), vec!["zh-TW", "zh"]);
    assert_eq!(fallback_strings("pt-AO"), vec!["pt-PT", "pt"]);
}

#[test]
fn fallback_strings_exclude_the_tag_itself() {
    assert!(fallback_strings("de").is_empty());
    assert!(fallback_strings("").is_empty());
}

#[test]
fn primary_subtag_splits_on_either_separator() {
    assert_eq!(primary_subtag("de-CH"), "de");
    assert_eq!(primary_subtag("pt_BR"), "pt");
    assert_eq!(primary_subtag("fr"), "fr");
}

#[test]
fn primary_subtag_never_splits_at_the_first_character() {
    assert_eq!(primary_subtag("-x"), "-x");
    assert_eq!(primary_subtag("_x-y"), "_x");
    assert_eq!(primary_subtag("x"), "x");
    assert_eq!(primary_subtag(""), "");
}
