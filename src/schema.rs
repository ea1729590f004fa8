use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PlatformBucket {
    #[schemars(description = "Deal source mentions Google (Search, YouTube, Display campaigns)")]
    GoogleAds,

    #[schemars(description = "Deal source mentions Meta, Facebook or Instagram")]
    MetaAds,

    #[schemars(description = "Deal source mentions LinkedIn")]
    LinkedinAds,

    #[schemars(description = "Anything else, including deals with no source label")]
    Other,
}

impl PlatformBucket {
    /// Display order used by the dashboard cards.
    pub const ALL: [PlatformBucket; 4] = [
        PlatformBucket::GoogleAds,
        PlatformBucket::MetaAds,
        PlatformBucket::LinkedinAds,
        PlatformBucket::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformBucket::GoogleAds => "google_ads",
            PlatformBucket::MetaAds => "meta_ads",
            PlatformBucket::LinkedinAds => "linkedin_ads",
            PlatformBucket::Other => "other",
        }
    }
}

impl fmt::Display for PlatformBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformBucket {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase();
        PlatformBucket::ALL
            .into_iter()
            .find(|bucket| bucket.as_str() == normalized)
            .ok_or_else(|| ForecastError::InvalidPlatform(s.to_string()))
    }
}

/// Platform scope of a request: every deal, or only one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PlatformFilter {
    #[default]
    All,
    Bucket(PlatformBucket),
}

impl PlatformFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformFilter::All => "all",
            PlatformFilter::Bucket(bucket) => bucket.as_str(),
        }
    }

    pub fn matches(&self, bucket: PlatformBucket) -> bool {
        match self {
            PlatformFilter::All => true,
            PlatformFilter::Bucket(selected) => *selected == bucket,
        }
    }

    /// Parses an optional query-string value; blank or missing means `All`.
    pub fn parse_optional(raw: Option<&str>) -> Result<Self> {
        match raw.map(str::trim) {
            None | Some("") => Ok(PlatformFilter::All),
            Some(value) => value.parse(),
        }
    }
}

impl JsonSchema for PlatformFilter {
    fn schema_name() -> String {
        "PlatformFilter".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        String::json_schema(gen)
    }
}

impl fmt::Display for PlatformFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformFilter {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(PlatformFilter::All)
        } else {
            s.parse().map(PlatformFilter::Bucket)
        }
    }
}

impl TryFrom<String> for PlatformFilter {
    type Error = ForecastError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<PlatformFilter> for String {
    fn from(value: PlatformFilter) -> Self {
        value.as_str().to_string()
    }
}

/// Won-deal revenue for one calendar day. Days without won deals have no fact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RevenueFact {
    pub date: NaiveDate,
    pub revenue_actual: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ForecastPoint {
    #[schemars(description = "Calendar day in YYYY-MM-DD format")]
    pub date: NaiveDate,

    #[schemars(description = "Won-deal revenue closed that day (0 when nothing closed)")]
    pub revenue_actual: f64,

    #[schemars(description = "Trailing moving average of the days that had won deals")]
    pub expected: f64,

    #[schemars(description = "expected * (1 - band)")]
    pub pessimistic: f64,

    #[schemars(description = "expected * (1 + band)")]
    pub optimistic: f64,

    #[schemars(description = "Always true: the model never projects past the requested range")]
    pub is_history: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct RevenueForecastResponse {
    pub start: NaiveDate,
    pub end: NaiveDate,

    #[serde(rename = "maWindow")]
    #[schemars(description = "Trailing window size in days used for the moving average")]
    pub ma_window: usize,

    #[schemars(description = "Symmetric scenario band as a fraction of the expected value")]
    pub band: f64,

    #[schemars(description = "Number of days projected past `end`. Always 0.")]
    pub horizon: u32,

    #[schemars(description = "1 - mean relative error over the trailing tail, clamped to [0, 1]")]
    pub accuracy_rate: f64,

    pub series: Vec<ForecastPoint>,
}

impl RevenueForecastResponse {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(RevenueForecastResponse)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

/// A CRM deal after warehouse values have been normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DealRecord {
    pub id: String,
    pub win: bool,
    pub win_date: Option<NaiveDate>,
    pub amount_total: f64,
    pub deal_source_name: Option<String>,
}

/// One `(date, platform)` row of the daily marketing table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct MarketingRow {
    pub date: Option<NaiveDate>,
    pub platform: Option<String>,
    pub leads: f64,
    pub qualified_leads: f64,
    pub opportunities: f64,
    pub sales: f64,
    pub spend: f64,
    pub clicks: f64,
    pub impressions: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct CrmPlatformTotals {
    pub sales_crm: f64,
    pub revenue_crm: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct OverviewTotals {
    pub leads: f64,
    pub qualified_leads: f64,
    pub opportunities: f64,
    pub sales: f64,
    pub spend: f64,
    pub clicks: f64,
    pub impressions: f64,
    pub sales_crm: f64,
    pub revenue_crm: f64,
    pub cpl: Option<f64>,
    pub cpq: Option<f64>,
    pub cpo: Option<f64>,
    pub cpv: Option<f64>,
    pub rate_leads_to_qualified: Option<f64>,
    pub rate_qualified_to_opportunity: Option<f64>,
    pub rate_opportunity_to_sale: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DailyData {
    pub date: NaiveDate,
    pub spend: f64,
    pub leads: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PlatformCard {
    pub platform: PlatformBucket,
    pub leads: f64,
    pub qualified_leads: f64,
    pub opportunities: f64,
    pub spend: f64,
    pub clicks: f64,
    pub impressions: f64,
    pub sales_crm: f64,
    pub revenue_crm: f64,
    #[schemars(description = "spend / leads")]
    pub cpl: Option<f64>,
    #[schemars(description = "spend / sales_crm")]
    pub cpv: Option<f64>,
    #[schemars(description = "revenue_crm / spend")]
    pub roas: Option<f64>,
    #[schemars(description = "revenue_crm / sales_crm")]
    pub ticket: Option<f64>,
    #[serde(rename = "dailyHistory")]
    pub daily_history: Vec<DailyData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OverviewResponse {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub platform: PlatformFilter,
    pub total: OverviewTotals,
    pub platforms: Vec<MarketingRow>,
    pub crm_by_platform: BTreeMap<PlatformBucket, CrmPlatformTotals>,
    pub cards: Vec<PlatformCard>,
}
