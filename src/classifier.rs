//! Maps free-text deal source labels to platform buckets.
//!
//! The keyword table below is the only place the mapping is written down.
//! [`classify`] evaluates it in memory and [`sql_bucket_expression`] renders the
//! same table as a warehouse `CASE` expression, so "which deals match
//! `google_ads`" and "which bucket is displayed" can never drift apart.

use crate::schema::{PlatformBucket, PlatformFilter};

/// Buckets in priority order with the lower-case keywords that select them.
/// A label matching several rows takes the first one.
pub const CLASSIFICATION_RULES: &[(PlatformBucket, &[&str])] = &[
    (PlatformBucket::GoogleAds, &["google"]),
    (PlatformBucket::MetaAds, &["meta", "facebook", "instagram"]),
    (PlatformBucket::LinkedinAds, &["linkedin"]),
];

pub fn classify(source_label: Option<&str>) -> PlatformBucket {
    let label = source_label.unwrap_or_default().to_lowercase();

    CLASSIFICATION_RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| label.contains(kw)))
        .map(|(bucket, _)| *bucket)
        .unwrap_or(PlatformBucket::Other)
}

/// Renders the classification rules as a standard-SQL expression evaluating to
/// the bucket name of `column`.
///
/// `column` is emitted verbatim and must be a trusted identifier.
pub fn sql_bucket_expression(column: &str) -> String {
    let label = format!("LOWER(IFNULL(CAST({} AS STRING), ''))", column);
    let mut expr = String::from("CASE");

    for (bucket, keywords) in CLASSIFICATION_RULES {
        let conditions: Vec<String> = keywords
            .iter()
            .map(|kw| format!("{} LIKE '%{}%'", label, kw))
            .collect();
        expr.push_str(&format!(
            " WHEN {} THEN '{}'",
            conditions.join(" OR "),
            bucket.as_str()
        ));
    }

    expr.push_str(&format!(" ELSE '{}' END", PlatformBucket::Other.as_str()));
    expr
}

/// Query-side platform predicate bound to the `@platform` parameter.
pub fn sql_platform_predicate(column: &str, param: &str) -> String {
    format!(
        "(@{param} = '{all}' OR ({expr}) = @{param})",
        param = param,
        all = PlatformFilter::All.as_str(),
        expr = sql_bucket_expression(column)
    )
}
