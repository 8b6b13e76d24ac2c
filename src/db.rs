use anyhow::Context;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::{PgPool, Row};
use tracing::warn;
use uuid::Uuid;

use crate::brain::{BrainCycle, BrainInputs};
use crate::models::{
    AnalysisWindow, Channel, Cohort, Creative, CreativeDailyMetric, CreativeStatus, DailyMetric,
    Platform,
};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Materializes the four ordered collections one brain cycle consumes.
/// Rows carrying an unknown platform or status string are dropped with a
/// warning; one bad row never blocks the organization.
pub async fn fetch_inputs(
    pool: &PgPool,
    organization_id: Uuid,
    window: AnalysisWindow,
) -> anyhow::Result<BrainInputs> {
    let mut channels = Vec::new();
    let rows = sqlx::query(
        "SELECT id, name, platform, is_active \
         FROM marketing_brain.channels \
         WHERE organization_id = $1 \
         ORDER BY name",
    )
    .bind(organization_id)
    .fetch_all(pool)
    .await?;
    for row in rows {
        let platform_raw: String = row.get("platform");
        let Some(platform) = Platform::parse(&platform_raw) else {
            warn!(platform = %platform_raw, "unknown platform type; channel skipped");
            continue;
        };
        channels.push(Channel {
            id: row.get("id"),
            name: row.get("name"),
            platform,
            is_active: row.get("is_active"),
        });
    }

    let metrics = sqlx::query(
        "SELECT m.channel_id, m.metric_date, m.spend, m.revenue, \
                m.impressions, m.clicks, m.conversions, m.frequency \
         FROM marketing_brain.daily_metrics m \
         JOIN marketing_brain.channels c ON c.id = m.channel_id \
         WHERE c.organization_id = $1 AND m.metric_date BETWEEN $2 AND $3 \
         ORDER BY m.metric_date, m.channel_id",
    )
    .bind(organization_id)
    .bind(window.start())
    .bind(window.end)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|row| DailyMetric {
        channel_id: row.get("channel_id"),
        date: row.get("metric_date"),
        spend: row.get("spend"),
        revenue: row.get("revenue"),
        impressions: row.get("impressions"),
        clicks: row.get("clicks"),
        conversions: row.get("conversions"),
        frequency: row.get("frequency"),
    })
    .collect();

    let mut creatives = Vec::new();
    let rows = sqlx::query(
        "SELECT cr.id, cr.channel_id, cr.name, cr.status, cr.launched_on \
         FROM marketing_brain.creatives cr \
         JOIN marketing_brain.channels c ON c.id = cr.channel_id \
         WHERE c.organization_id = $1 \
         ORDER BY cr.launched_on, cr.name",
    )
    .bind(organization_id)
    .fetch_all(pool)
    .await?;
    for row in rows {
        let status_raw: String = row.get("status");
        let Some(status) = CreativeStatus::parse(&status_raw) else {
            warn!(status = %status_raw, "unknown creative status; creative skipped");
            continue;
        };
        creatives.push(Creative {
            id: row.get("id"),
            channel_id: row.get("channel_id"),
            name: row.get("name"),
            status,
            launched_on: row.get("launched_on"),
        });
    }

    let creative_metrics = sqlx::query(
        "SELECT m.creative_id, m.metric_date, m.spend, m.revenue, \
                m.impressions, m.clicks, m.conversions, m.frequency \
         FROM marketing_brain.creative_daily_metrics m \
         JOIN marketing_brain.creatives cr ON cr.id = m.creative_id \
         JOIN marketing_brain.channels c ON c.id = cr.channel_id \
         WHERE c.organization_id = $1 AND m.metric_date BETWEEN $2 AND $3 \
         ORDER BY m.metric_date, m.creative_id",
    )
    .bind(organization_id)
    .bind(window.start())
    .bind(window.end)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|row| CreativeDailyMetric {
        creative_id: row.get("creative_id"),
        date: row.get("metric_date"),
        spend: row.get("spend"),
        revenue: row.get("revenue"),
        impressions: row.get("impressions"),
        clicks: row.get("clicks"),
        conversions: row.get("conversions"),
        frequency: row.get("frequency"),
    })
    .collect();

    let cohorts = sqlx::query(
        "SELECT cohort_month, channel, customer_count, total_revenue, avg_order_value, \
                repeat_rate, ltv_30d, ltv_60d, ltv_90d, ltv_180d \
         FROM marketing_brain.cohorts \
         WHERE organization_id = $1 \
         ORDER BY cohort_month",
    )
    .bind(organization_id)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|row| Cohort {
        month: row.get("cohort_month"),
        channel: row.get("channel"),
        customer_count: row.get("customer_count"),
        total_revenue: row.get("total_revenue"),
        avg_order_value: row.get("avg_order_value"),
        repeat_rate: row.get("repeat_rate"),
        ltv_30d: row.get("ltv_30d"),
        ltv_60d: row.get("ltv_60d"),
        ltv_90d: row.get("ltv_90d"),
        ltv_180d: row.get("ltv_180d"),
    })
    .collect();

    Ok(BrainInputs {
        channels,
        metrics,
        creatives,
        creative_metrics,
        cohorts,
    })
}

/// Appends one computed cycle as the organization's newest state. History
/// is append-only; "latest" is resolved by computed_at at read time.
pub async fn save_state(
    pool: &PgPool,
    organization_id: Uuid,
    cycle: &BrainCycle,
) -> anyhow::Result<()> {
    let payload = serde_json::to_value(cycle).context("failed to serialize brain cycle")?;
    sqlx::query(
        "INSERT INTO marketing_brain.brain_states (id, organization_id, computed_at, payload) \
         VALUES ($1, $2, $3, $4)",
    )
    .bind(Uuid::new_v4())
    .bind(organization_id)
    .bind(cycle.computed_at)
    .bind(payload)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn latest_state(
    pool: &PgPool,
    organization_id: Uuid,
) -> anyhow::Result<Option<(DateTime<Utc>, serde_json::Value)>> {
    let row = sqlx::query(
        "SELECT computed_at, payload FROM marketing_brain.brain_states \
         WHERE organization_id = $1 \
         ORDER BY computed_at DESC LIMIT 1",
    )
    .bind(organization_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|r| (r.get("computed_at"), r.get("payload"))))
}

/// Loads a realistic demo organization: a steady winner, a middling search
/// channel, a decaying short-video channel with a fatiguing creative, and
/// four months of eroding cohort LTV.
pub async fn seed(pool: &PgPool) -> anyhow::Result<Uuid> {
    let organization_id = Uuid::parse_str("7a1d2c30-5b8e-4f21-9c4d-02e6f3a8b917")?;
    sqlx::query(
        "INSERT INTO marketing_brain.organizations (id, name) VALUES ($1, $2) \
         ON CONFLICT (name) DO NOTHING",
    )
    .bind(organization_id)
    .bind("Lumen Threads")
    .execute(pool)
    .await?;

    let channels = [
        (
            Uuid::parse_str("f3b09c58-6a44-4d2e-8a61-7cfd0e5b9a01")?,
            "Meta",
            Platform::PaidSocial,
        ),
        (
            Uuid::parse_str("1d9e7a02-3c55-49b8-b0f2-84a6d1c7e302")?,
            "Google",
            Platform::PaidSearch,
        ),
        (
            Uuid::parse_str("9c47f1b6-02dd-4e83-a5c9-f60b28d4a503")?,
            "TikTok",
            Platform::ShortVideo,
        ),
    ];
    for (id, name, platform) in &channels {
        sqlx::query(
            "INSERT INTO marketing_brain.channels (id, organization_id, name, platform) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (organization_id, name) DO NOTHING",
        )
        .bind(id)
        .bind(organization_id)
        .bind(name)
        .bind(platform.as_str())
        .execute(pool)
        .await?;
    }

    let end = Utc::now().date_naive();
    let recent_start = end - Duration::days(13);
    for offset in 0..30 {
        let date = end - Duration::days(offset);
        let daily: [(Uuid, f64, f64); 3] = [
            (channels[0].0, 150.0, 3.65),
            (channels[1].0, 120.0, 2.35),
            (
                channels[2].0,
                if date >= recent_start { 200.0 } else { 100.0 },
                if date >= recent_start { 1.9 } else { 2.8 },
            ),
        ];
        for (channel_id, spend, roas) in daily {
            sqlx::query(
                "INSERT INTO marketing_brain.daily_metrics \
                 (id, channel_id, metric_date, spend, revenue, impressions, clicks, \
                  conversions, frequency) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
                 ON CONFLICT (channel_id, metric_date) DO NOTHING",
            )
            .bind(Uuid::new_v4())
            .bind(channel_id)
            .bind(date)
            .bind(spend)
            .bind(spend * roas)
            .bind(12_000_i64)
            .bind(250_i64)
            .bind(12_i64)
            .bind(2.1_f64)
            .execute(pool)
            .await?;
        }
    }

    let creative_id = Uuid::parse_str("4e8a2f91-7b63-4c05-9d18-a3f5c0e6b204")?;
    sqlx::query(
        "INSERT INTO marketing_brain.creatives (id, channel_id, name, status, launched_on) \
         VALUES ($1, $2, $3, 'active', $4) \
         ON CONFLICT (channel_id, name) DO NOTHING",
    )
    .bind(creative_id)
    .bind(channels[2].0)
    .bind("UGC Hook v3")
    .bind(end - Duration::days(60))
    .execute(pool)
    .await?;

    for offset in 0..28 {
        let date = end - Duration::days(offset);
        let recent = date >= recent_start;
        sqlx::query(
            "INSERT INTO marketing_brain.creative_daily_metrics \
             (id, creative_id, metric_date, spend, revenue, impressions, clicks, \
              conversions, frequency) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (creative_id, metric_date) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(creative_id)
        .bind(date)
        .bind(400.0_f64)
        .bind(900.0_f64)
        .bind(20_000_i64)
        .bind(1_000_i64)
        .bind(if recent { 50_i64 } else { 80_i64 })
        .bind(if recent { 4.0_f64 } else { 2.5_f64 })
        .execute(pool)
        .await?;
    }

    let month_label = |months_back: i64| {
        let date = end - Duration::days(months_back * 30);
        date.format("%Y-%m").to_string()
    };
    let cohorts = [
        (month_label(4), 120_i64, 128.0_f64),
        (month_label(3), 110, 119.0),
        (month_label(2), 115, 115.0),
        (month_label(1), 118, 112.0),
    ];
    for (month, customers, ltv_90d) in &cohorts {
        sqlx::query(
            "INSERT INTO marketing_brain.cohorts \
             (id, organization_id, cohort_month, channel, customer_count, total_revenue, \
              avg_order_value, repeat_rate, ltv_30d, ltv_60d, ltv_90d, ltv_180d) \
             VALUES ($1, $2, $3, 'all', $4, $5, $6, $7, $8, $9, $10, NULL) \
             ON CONFLICT (organization_id, cohort_month, channel) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(organization_id)
        .bind(month)
        .bind(customers)
        .bind(ltv_90d * *customers as f64)
        .bind(62.0_f64)
        .bind(0.31_f64)
        .bind(ltv_90d * 0.6)
        .bind(ltv_90d * 0.8)
        .bind(ltv_90d)
        .execute(pool)
        .await?;
    }

    Ok(organization_id)
}

/// Imports daily channel metrics from CSV, upserting channels by name.
pub async fn import_csv(
    pool: &PgPool,
    organization_id: Uuid,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        channel: String,
        platform: String,
        metric_date: NaiveDate,
        spend: f64,
        revenue: f64,
        impressions: i64,
        clicks: i64,
        conversions: i64,
        frequency: f64,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let Some(platform) = Platform::parse(&row.platform) else {
            warn!(platform = %row.platform, channel = %row.channel, "unknown platform; row skipped");
            continue;
        };
        if row.spend < 0.0 || row.revenue < 0.0 {
            warn!(channel = %row.channel, date = %row.metric_date, "negative spend/revenue; row skipped");
            continue;
        }

        let channel_id: Uuid = sqlx::query(
            "INSERT INTO marketing_brain.channels (id, organization_id, name, platform) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (organization_id, name) DO UPDATE SET is_active = TRUE \
             RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(organization_id)
        .bind(&row.channel)
        .bind(platform.as_str())
        .fetch_one(pool)
        .await?
        .get("id");

        let result = sqlx::query(
            "INSERT INTO marketing_brain.daily_metrics \
             (id, channel_id, metric_date, spend, revenue, impressions, clicks, \
              conversions, frequency) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (channel_id, metric_date) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(channel_id)
        .bind(row.metric_date)
        .bind(row.spend)
        .bind(row.revenue)
        .bind(row.impressions)
        .bind(row.clicks)
        .bind(row.conversions)
        .bind(row.frequency)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}
