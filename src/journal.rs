use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime};
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum IdeaKind {
    Investment,
    #[default]
    Regular,
}

impl IdeaKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Investment => "investment",
            Self::Regular => "regular",
        }
    }
}

/// One journal/idea record. Read-only once loaded; `tickers` and `kind`
/// start empty and are filled in by enrichment when the graph is built.
#[derive(Clone, Debug)]
pub struct Idea {
    pub id: String,
    pub title: String,
    pub content: String,
    pub topic: String,
    pub tags: Vec<String>,
    pub trades: Vec<String>,
    pub created_at: OffsetDateTime,
    pub winrate: Option<f32>,
    pub strategy: Option<String>,
    pub tickers: Vec<String>,
    pub kind: IdeaKind,
}

pub fn age_days(created_at: OffsetDateTime, now: OffsetDateTime) -> f32 {
    let seconds = (now - created_at).whole_seconds();
    (seconds as f32 / 86_400.0).max(0.0)
}

#[derive(Clone, Debug)]
pub struct Journal {
    pub ideas: Vec<Idea>,
    pub dropped: usize,
    pub source: String,
}

impl Journal {
    pub fn idea_count(&self) -> usize {
        self.ideas.len()
    }
}

#[derive(Clone, Debug, Deserialize)]
struct RawIdea {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    topic: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    trades: Vec<String>,
    #[serde(default, rename = "createdAt")]
    created_at: String,
    #[serde(default)]
    winrate: Option<f32>,
    #[serde(default)]
    strategy: Option<String>,
}

pub fn load_journal(path: &Path) -> Result<Journal> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read journal file {}", path.display()))?;

    let records: Vec<RawIdea> = serde_json::from_str(&raw)
        .with_context(|| format!("invalid journal JSON in {}", path.display()))?;

    if records.is_empty() {
        info!(path = %path.display(), "journal file contains no records");
    }

    let mut ideas = Vec::with_capacity(records.len());
    let mut dropped = 0usize;

    for (index, record) in records.into_iter().enumerate() {
        let Some(created_at) = parse_created_at(&record.created_at) else {
            warn!(
                index,
                created_at = %record.created_at,
                "dropping idea with unparseable createdAt"
            );
            dropped += 1;
            continue;
        };

        let id = if record.id.is_empty() {
            format!("idea-{index}")
        } else {
            record.id
        };

        ideas.push(Idea {
            id,
            title: record.title,
            content: record.content,
            topic: record.topic,
            tags: record.tags,
            trades: record.trades,
            created_at,
            winrate: record.winrate.map(|w| w.clamp(0.0, 100.0)),
            strategy: record.strategy.filter(|s| !s.is_empty()),
            tickers: Vec::new(),
            kind: IdeaKind::Regular,
        });
    }

    if ideas.is_empty() && dropped > 0 {
        return Err(anyhow!(
            "all {dropped} journal records in {} had unparseable createdAt timestamps",
            path.display()
        ));
    }

    info!(count = ideas.len(), dropped, "loaded journal");

    Ok(Journal {
        ideas,
        dropped,
        source: path.display().to_string(),
    })
}

fn parse_created_at(value: &str) -> Option<OffsetDateTime> {
    if let Ok(parsed) = OffsetDateTime::parse(value, &Rfc3339) {
        return Some(parsed);
    }

    // Date-only journals are common when entries are exported by hand.
    let date_only = format_description!("[year]-[month]-[day]");
    Date::parse(value, &date_only)
        .ok()
        .map(|date| date.midnight().assume_utc())
}

pub fn demo_journal(now: OffsetDateTime) -> Journal {
    let entry = |id: &str,
                 title: &str,
                 content: &str,
                 topic: &str,
                 tags: &[&str],
                 trades: &[&str],
                 days_ago: i64,
                 winrate: Option<f32>,
                 strategy: Option<&str>| Idea {
        id: id.to_string(),
        title: title.to_string(),
        content: content.to_string(),
        topic: topic.to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        trades: trades.iter().map(|t| t.to_string()).collect(),
        created_at: now - Duration::days(days_ago),
        winrate,
        strategy: strategy.map(|s| s.to_string()),
        tickers: Vec::new(),
        kind: IdeaKind::Regular,
    };

    let ideas = vec![
        entry(
            "demo-1",
            "$NVDA breakout over 140",
            "Clean breakout of the multi-week range with volume. Looking to buy the first pullback toward the breakout level.",
            "Breakout",
            &["setup/breakout", "risk/sizing"],
            &["NVDA swing #3"],
            1,
            Some(62.0),
            Some("momentum"),
        ),
        entry(
            "demo-2",
            "BTC weekly structure",
            "BTC holding the prior range high as support. Accumulate spot while the weekly trend stays intact.",
            "Crypto",
            &["crypto/majors", "setup/retest"],
            &[],
            3,
            Some(55.0),
            Some("trend"),
        ),
        entry(
            "demo-3",
            "ETH rotation idea",
            "ETH lagging BTC all quarter. Rotation long once the pair bottoms; invalidation under the range low.",
            "Crypto",
            &["crypto/majors"],
            &["ETH spot"],
            4,
            None,
            Some("trend"),
        ),
        entry(
            "demo-4",
            "Overtrading review",
            "Took five trades on a choppy day and gave back the week. Rule going forward: max two setups per session.",
            "Psychology",
            &["process/discipline"],
            &[],
            6,
            None,
            None,
        ),
        entry(
            "demo-5",
            "$TSLA earnings straddle",
            "IV looks cheap relative to the last four reports. Structure the straddle a week out and trim into the print.",
            "Earnings",
            &["setup/event", "risk/options"],
            &["TSLA straddle"],
            9,
            Some(48.0),
            Some("event"),
        ),
        entry(
            "demo-6",
            "Fed week playbook",
            "No size ahead of the statement. Fade the first spike only if it tags the prior day's extreme.",
            "Macro",
            &["macro/fed", "process/discipline"],
            &[],
            11,
            None,
            Some("mean-reversion"),
        ),
        entry(
            "demo-7",
            "$AMD sympathy lag",
            "AMD basing while $NVDA runs. Sympathy long triggers on a range break, stop under the base.",
            "Breakout",
            &["setup/breakout"],
            &["AMD swing #1"],
            12,
            Some(58.0),
            Some("momentum"),
        ),
        entry(
            "demo-8",
            "SOL ecosystem strength",
            "SOL showing relative strength on every dip. Scale in thirds, invalidate on a daily close below support.",
            "Crypto",
            &["crypto/alts", "setup/retest"],
            &["SOL spot"],
            16,
            Some(51.0),
            Some("trend"),
        ),
        entry(
            "demo-9",
            "Journaling cadence",
            "Weekly review stays on Sunday. Grade every idea on thesis quality, not outcome.",
            "Psychology",
            &["process/review"],
            &[],
            21,
            None,
            None,
        ),
        entry(
            "demo-10",
            "Dollar breakdown watch",
            "DXY rolling over while commodities base. If the breakdown confirms, look at $GLD and miners.",
            "Macro",
            &["macro/dollar"],
            &[],
            26,
            None,
            Some("trend"),
        ),
        entry(
            "demo-11",
            "LINK accumulation zone",
            "LINK back into the old accumulation shelf. Bid the shelf, invalidate on a weekly close below it.",
            "Crypto",
            &["crypto/alts"],
            &[],
            34,
            Some(44.0),
            Some("trend"),
        ),
        entry(
            "demo-12",
            "Breakout failure study",
            "Reviewed ten failed breakouts this quarter. Common thread: entries taken before the retest confirmed.",
            "Breakout",
            &["setup/breakout", "process/review"],
            &[],
            40,
            None,
            None,
        ),
    ];

    Journal {
        ideas,
        dropped: 0,
        source: "demo".to_string(),
    }
}
