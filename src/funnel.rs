//! Marketing funnel overview: totals across the daily marketing table, won
//! CRM deals per platform bucket, and the per-platform cards built from both.

use crate::classifier::{classify, sql_bucket_expression};
use crate::config::WarehouseConfig;
use crate::error::Result;
use crate::extractor::{is_won_in_range, SOURCE_COLUMN, WON_DEALS_PREDICATE};
use crate::ingestion::{crm_totals_from_row, marketing_row_from_row};
use crate::schema::{
    CrmPlatformTotals, DailyData, DealRecord, MarketingRow, OverviewTotals, PlatformBucket,
    PlatformCard, PlatformFilter,
};
use crate::warehouse::{ParamValue, Row, WarehouseQuery};
use chrono::NaiveDate;
use std::collections::BTreeMap;

pub fn overview_query(
    tables: &WarehouseConfig,
    start: NaiveDate,
    end: NaiveDate,
    platform: PlatformFilter,
) -> WarehouseQuery {
    let sql = format!(
        "SELECT date, platform, \
         SUM(leads) AS leads, \
         SUM(qualified_leads) AS qualified_leads, \
         SUM(opportunities) AS opportunities, \
         SUM(sales) AS sales, \
         SUM(spend) AS spend, \
         SUM(clicks) AS clicks, \
         SUM(impressions) AS impressions \
         FROM {table} \
         WHERE date BETWEEN @date_start AND @date_end \
         AND (@platform = 'all' OR platform = @platform) \
         GROUP BY date, platform \
         ORDER BY date ASC",
        table = tables.overview(),
    );

    WarehouseQuery::new(sql)
        .bind("date_start", ParamValue::Date(start))
        .bind("date_end", ParamValue::Date(end))
        .bind("platform", ParamValue::String(platform.as_str().to_string()))
}

pub fn crm_by_platform_query(
    tables: &WarehouseConfig,
    start: NaiveDate,
    end: NaiveDate,
) -> WarehouseQuery {
    let sql = format!(
        "SELECT {bucket} AS platform, \
         COUNT(*) AS sales_crm, \
         SUM(IFNULL(SAFE_CAST(amount_total AS FLOAT64), 0)) AS revenue_crm \
         FROM {table} \
         WHERE {won} \
         GROUP BY platform",
        bucket = sql_bucket_expression(SOURCE_COLUMN),
        table = tables.deals(),
        won = WON_DEALS_PREDICATE,
    );

    WarehouseQuery::new(sql)
        .bind("date_start", ParamValue::Date(start))
        .bind("date_end", ParamValue::Date(end))
}

pub fn parse_marketing_rows(rows: &[Row]) -> Result<Vec<MarketingRow>> {
    rows.iter().map(marketing_row_from_row).collect()
}

pub fn parse_crm_rows(rows: &[Row]) -> BTreeMap<PlatformBucket, CrmPlatformTotals> {
    let mut totals: BTreeMap<PlatformBucket, CrmPlatformTotals> = BTreeMap::new();
    for row in rows {
        let (bucket, row_totals) = crm_totals_from_row(row);
        let entry = totals.entry(bucket).or_default();
        entry.sales_crm += row_totals.sales_crm;
        entry.revenue_crm += row_totals.revenue_crm;
    }
    totals
}

/// Won-deal counts and revenue per bucket over deals already in memory.
pub fn crm_by_platform_from_deals(
    deals: &[DealRecord],
    start: NaiveDate,
    end: NaiveDate,
) -> BTreeMap<PlatformBucket, CrmPlatformTotals> {
    let mut totals: BTreeMap<PlatformBucket, CrmPlatformTotals> = BTreeMap::new();
    for deal in deals.iter().filter(|d| is_won_in_range(d, start, end)) {
        let entry = totals
            .entry(classify(deal.deal_source_name.as_deref()))
            .or_default();
        entry.sales_crm += 1.0;
        entry.revenue_crm += deal.amount_total;
    }
    totals
}

fn safe_div(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        None
    } else {
        Some(numerator / denominator)
    }
}

/// Sums every marketing row and the CRM totals visible under `platform`.
pub fn overview_totals(
    rows: &[MarketingRow],
    crm: &BTreeMap<PlatformBucket, CrmPlatformTotals>,
    platform: PlatformFilter,
) -> OverviewTotals {
    let mut total = OverviewTotals::default();

    for r in rows {
        total.leads += r.leads;
        total.qualified_leads += r.qualified_leads;
        total.opportunities += r.opportunities;
        total.sales += r.sales;
        total.spend += r.spend;
        total.clicks += r.clicks;
        total.impressions += r.impressions;
    }

    for (bucket, crm_totals) in crm {
        if platform.matches(*bucket) {
            total.sales_crm += crm_totals.sales_crm;
            total.revenue_crm += crm_totals.revenue_crm;
        }
    }

    total.cpl = safe_div(total.spend, total.leads);
    total.cpq = safe_div(total.spend, total.qualified_leads);
    total.cpo = safe_div(total.spend, total.opportunities);
    total.cpv = safe_div(total.spend, total.sales);
    total.rate_leads_to_qualified = safe_div(total.qualified_leads, total.leads);
    total.rate_qualified_to_opportunity = safe_div(total.opportunities, total.qualified_leads);
    total.rate_opportunity_to_sale = safe_div(total.sales, total.opportunities);

    total
}

#[derive(Default)]
struct CardAccumulator {
    leads: f64,
    qualified_leads: f64,
    opportunities: f64,
    spend: f64,
    clicks: f64,
    impressions: f64,
    daily_history: Vec<DailyData>,
}

fn row_bucket(platform: Option<&str>) -> Option<PlatformBucket> {
    match platform.map(str::trim) {
        None | Some("") => Some(PlatformBucket::Other),
        Some(p) if p.eq_ignore_ascii_case("all") => None,
        Some(p) => Some(p.parse().unwrap_or(PlatformBucket::Other)),
    }
}

/// Builds one card per visible bucket, in dashboard order.
///
/// Marketing rows labelled `all` are aggregates and are skipped. When there
/// are no marketing rows at all, no lead attribution exists: cards carry the
/// CRM figures only, and under a single-platform filter the card borrows the
/// overall lead and opportunity totals.
pub fn platform_cards(
    rows: &[MarketingRow],
    crm: &BTreeMap<PlatformBucket, CrmPlatformTotals>,
    totals: &OverviewTotals,
    platform: PlatformFilter,
) -> Vec<PlatformCard> {
    let seed: Vec<PlatformBucket> = match platform {
        PlatformFilter::All => PlatformBucket::ALL.to_vec(),
        PlatformFilter::Bucket(bucket) => vec![bucket],
    };

    let mut acc: BTreeMap<PlatformBucket, CardAccumulator> = seed
        .iter()
        .map(|bucket| (*bucket, CardAccumulator::default()))
        .collect();

    // Without marketing attribution only the CRM ticket is meaningful.
    let attributed = !rows.is_empty();
    if !attributed {
        if let PlatformFilter::Bucket(bucket) = platform {
            if let Some(card) = acc.get_mut(&bucket) {
                card.leads = totals.leads;
                card.opportunities = totals.opportunities;
            }
        }
    }

    for r in rows {
        let Some(bucket) = row_bucket(r.platform.as_deref()) else {
            continue;
        };
        if !platform.matches(bucket) {
            continue;
        }

        let card = acc.entry(bucket).or_default();
        card.leads += r.leads;
        card.qualified_leads += r.qualified_leads;
        card.opportunities += r.opportunities;
        card.spend += r.spend;
        card.clicks += r.clicks;
        card.impressions += r.impressions;

        if let Some(date) = r.date {
            card.daily_history.push(DailyData {
                date,
                spend: r.spend,
                leads: r.leads,
            });
        }
    }

    // BTreeMap order follows the enum declaration, which is the display order.
    acc.into_iter()
        .map(|(bucket, mut card)| {
            card.daily_history.sort_by_key(|d| d.date);
            let crm_totals = crm.get(&bucket).copied().unwrap_or_default();

            PlatformCard {
                platform: bucket,
                leads: card.leads,
                qualified_leads: card.qualified_leads,
                opportunities: card.opportunities,
                spend: card.spend,
                clicks: card.clicks,
                impressions: card.impressions,
                sales_crm: crm_totals.sales_crm,
                revenue_crm: crm_totals.revenue_crm,
                cpl: attributed.then(|| safe_div(card.spend, card.leads)).flatten(),
                cpv: attributed
                    .then(|| safe_div(card.spend, crm_totals.sales_crm))
                    .flatten(),
                roas: attributed
                    .then(|| safe_div(crm_totals.revenue_crm, card.spend))
                    .flatten(),
                ticket: safe_div(crm_totals.revenue_crm, crm_totals.sales_crm),
                daily_history: card.daily_history,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, d).unwrap()
    }

    fn marketing(d: u32, platform: Option<&str>, leads: f64, spend: f64) -> MarketingRow {
        MarketingRow {
            date: Some(date(d)),
            platform: platform.map(str::to_string),
            leads,
            qualified_leads: leads / 2.0,
            opportunities: leads / 4.0,
            sales: 1.0,
            spend,
            clicks: 10.0,
            impressions: 100.0,
        }
    }

    fn crm() -> BTreeMap<PlatformBucket, CrmPlatformTotals> {
        BTreeMap::from([
            (
                PlatformBucket::GoogleAds,
                CrmPlatformTotals {
                    sales_crm: 2.0,
                    revenue_crm: 3000.0,
                },
            ),
            (
                PlatformBucket::Other,
                CrmPlatformTotals {
                    sales_crm: 1.0,
                    revenue_crm: 500.0,
                },
            ),
        ])
    }

    #[test]
    fn test_overview_totals_and_rates() {
        let rows = vec![
            marketing(1, Some("google_ads"), 40.0, 200.0),
            marketing(2, Some("meta_ads"), 60.0, 300.0),
        ];
        let total = overview_totals(&rows, &crm(), PlatformFilter::All);

        assert_eq!(total.leads, 100.0);
        assert_eq!(total.spend, 500.0);
        assert_eq!(total.cpl, Some(5.0));
        assert_eq!(total.rate_leads_to_qualified, Some(0.5));
        assert_eq!(total.rate_qualified_to_opportunity, Some(0.5));
        assert_eq!(total.sales_crm, 3.0);
        assert_eq!(total.revenue_crm, 3500.0);

        let google_only = overview_totals(
            &[],
            &crm(),
            PlatformFilter::Bucket(PlatformBucket::GoogleAds),
        );
        assert_eq!(google_only.revenue_crm, 3000.0);
        assert_eq!(google_only.cpl, None);
        assert_eq!(google_only.rate_opportunity_to_sale, None);
    }

    #[test]
    fn test_cards_in_display_order_with_derived_metrics() {
        let rows = vec![
            marketing(3, Some("google_ads"), 10.0, 100.0),
            marketing(1, Some("google_ads"), 30.0, 300.0),
            marketing(1, Some("all"), 999.0, 999.0),
            marketing(2, None, 5.0, 50.0),
        ];
        let total = overview_totals(&rows, &crm(), PlatformFilter::All);
        let cards = platform_cards(&rows, &crm(), &total, PlatformFilter::All);

        let order: Vec<PlatformBucket> = cards.iter().map(|c| c.platform).collect();
        assert_eq!(order, PlatformBucket::ALL.to_vec());

        let google = &cards[0];
        assert_eq!(google.leads, 40.0);
        assert_eq!(google.spend, 400.0);
        assert_eq!(google.cpl, Some(10.0));
        assert_eq!(google.cpv, Some(200.0));
        assert_eq!(google.roas, Some(7.5));
        assert_eq!(google.ticket, Some(1500.0));
        assert_eq!(google.daily_history[0].date, date(1));
        assert_eq!(google.daily_history[1].date, date(3));

        let meta = &cards[1];
        assert_eq!(meta.leads, 0.0);
        assert_eq!(meta.cpl, None);
        assert_eq!(meta.ticket, None);

        let other = &cards[3];
        assert_eq!(other.leads, 5.0);
        assert_eq!(other.revenue_crm, 500.0);
    }

    #[test]
    fn test_cards_without_marketing_rows() {
        let total = OverviewTotals {
            leads: 80.0,
            opportunities: 12.0,
            ..OverviewTotals::default()
        };

        let all = platform_cards(&[], &crm(), &total, PlatformFilter::All);
        assert_eq!(all.len(), 4);
        assert!(all.iter().all(|c| c.leads == 0.0));
        assert_eq!(all[0].sales_crm, 2.0);
        assert_eq!(all[0].cpl, None);
        assert_eq!(all[0].cpv, None);
        assert_eq!(all[0].roas, None);
        assert_eq!(all[0].ticket, Some(1500.0));

        let filtered = platform_cards(
            &[],
            &crm(),
            &total,
            PlatformFilter::Bucket(PlatformBucket::LinkedinAds),
        );
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].platform, PlatformBucket::LinkedinAds);
        assert_eq!(filtered[0].leads, 80.0);
        assert_eq!(filtered[0].opportunities, 12.0);
        assert_eq!(filtered[0].sales_crm, 0.0);

        let google = platform_cards(
            &[],
            &crm(),
            &total,
            PlatformFilter::Bucket(PlatformBucket::GoogleAds),
        );
        assert_eq!(google[0].leads, 80.0);
        assert_eq!(google[0].cpl, None);
        assert_eq!(google[0].cpv, None);
        assert_eq!(google[0].roas, None);
        assert_eq!(google[0].ticket, Some(1500.0));
    }

    #[test]
    fn test_filtered_cards_ignore_other_platforms() {
        let rows = vec![
            marketing(1, Some("google_ads"), 10.0, 100.0),
            marketing(1, Some("meta_ads"), 20.0, 100.0),
        ];
        let filter = PlatformFilter::Bucket(PlatformBucket::MetaAds);
        let total = overview_totals(&rows, &crm(), filter);
        let cards = platform_cards(&rows, &crm(), &total, filter);

        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].leads, 20.0);
    }

    #[test]
    fn test_crm_from_deals_matches_classifier() {
        let deals = vec![
            DealRecord {
                id: "1".to_string(),
                win: true,
                win_date: Some(date(4)),
                amount_total: 1200.0,
                deal_source_name: Some("Instagram".to_string()),
            },
            DealRecord {
                id: "2".to_string(),
                win: true,
                win_date: Some(date(5)),
                amount_total: 300.0,
                deal_source_name: Some("Meta Ads".to_string()),
            },
            DealRecord {
                id: "3".to_string(),
                win: false,
                win_date: Some(date(5)),
                amount_total: 9999.0,
                deal_source_name: Some("Meta Ads".to_string()),
            },
        ];

        let totals = crm_by_platform_from_deals(&deals, date(1), date(30));
        assert_eq!(totals.len(), 1);
        let meta = totals[&PlatformBucket::MetaAds];
        assert_eq!(meta.sales_crm, 2.0);
        assert_eq!(meta.revenue_crm, 1500.0);
    }

    #[test]
    fn test_queries_use_named_params() {
        let tables = WarehouseConfig::new("acme", "crm");
        let overview = overview_query(&tables, date(1), date(30), PlatformFilter::All);
        assert!(overview.sql.contains("`acme.crm.dashboard_overview_daily`"));
        assert_eq!(
            overview.param("platform"),
            Some(&ParamValue::String("all".to_string()))
        );

        let crm_query = crm_by_platform_query(&tables, date(1), date(30));
        assert!(crm_query.sql.contains("CASE WHEN"));
        assert!(crm_query.sql.contains("GROUP BY platform"));
        assert_eq!(crm_query.param("date_end"), Some(&ParamValue::Date(date(30))));
    }
}
