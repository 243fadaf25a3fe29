use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::journal::{Idea, IdeaKind};

/// `$SYMBOL` sigil: 1-5 uppercase letters ending on a word boundary, so a
/// longer run like `$BTCUSD` or a lowercase `$acme` never matches.
static SIGIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([A-Z]{1,5})\b").expect("sigil pattern compiles"));

const CRYPTO_SYMBOLS: [&str; 25] = [
    "BTC", "ETH", "SOL", "ADA", "DOT", "AVAX", "MATIC", "LINK", "XRP", "DOGE", "SHIB", "LTC",
    "BCH", "ATOM", "UNI", "AAVE", "ARB", "OP", "NEAR", "APT", "SUI", "INJ", "TIA", "PEPE", "BNB",
];

const BULLISH_WORDS: [&str; 10] = [
    "bullish",
    "long",
    "buy",
    "breakout",
    "accumulate",
    "support",
    "upside",
    "rally",
    "moon",
    "reversal",
];

const BEARISH_WORDS: [&str; 10] = [
    "bearish",
    "short",
    "sell",
    "breakdown",
    "dump",
    "resistance",
    "downside",
    "weak",
    "crash",
    "overbought",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
}

impl Sentiment {
    pub fn label(self) -> &'static str {
        match self {
            Self::Bullish => "bullish",
            Self::Bearish => "bearish",
            Self::Neutral => "neutral",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedTag {
    pub name: String,
    pub parent: Option<String>,
    pub level: usize,
}

pub fn is_crypto_symbol(symbol: &str) -> bool {
    CRYPTO_SYMBOLS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(symbol))
}

/// Union of `$SYMBOL` sigil matches and bare crypto-symbol mentions,
/// deduplicated in first-seen order. Crypto mentions are reported
/// upper-cased regardless of how they were written.
pub fn extract_tickers(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut tickers = Vec::new();

    for capture in SIGIL.captures_iter(text) {
        let symbol = capture[1].to_string();
        if seen.insert(symbol.clone()) {
            tickers.push(symbol);
        }
    }

    for word in text.split(|c: char| !c.is_ascii_alphanumeric()) {
        if word.is_empty() {
            continue;
        }
        if is_crypto_symbol(word) {
            let symbol = word.to_ascii_uppercase();
            if seen.insert(symbol.clone()) {
                tickers.push(symbol);
            }
        }
    }

    tickers
}

/// Runs ticker extraction over everything the idea says (title, content,
/// tags, trade labels) and returns the idea annotated with its tickers
/// and the investment/regular classification.
pub fn process_idea(idea: &Idea) -> Idea {
    let mut blob = String::with_capacity(idea.title.len() + idea.content.len() + 64);
    blob.push_str(&idea.title);
    blob.push(' ');
    blob.push_str(&idea.content);
    for tag in &idea.tags {
        blob.push(' ');
        blob.push_str(tag);
    }
    for trade in &idea.trades {
        blob.push(' ');
        blob.push_str(trade);
    }

    let tickers = extract_tickers(&blob);
    let kind = if tickers.is_empty() {
        IdeaKind::Regular
    } else {
        IdeaKind::Investment
    };

    let mut enriched = idea.clone();
    enriched.tickers = tickers;
    enriched.kind = kind;
    enriched
}

/// Keyword-count heuristic, not NLP: whichever fixed word list occurs
/// strictly more often wins, ties resolve to neutral. Text that never
/// mentions the ticker is neutral outright.
pub fn ticker_sentiment(text: &str, ticker: &str) -> Sentiment {
    let lower = text.to_lowercase();
    let ticker_lower = ticker.to_lowercase();
    if !lower.contains(&ticker_lower) {
        return Sentiment::Neutral;
    }

    let bullish: usize = BULLISH_WORDS.iter().map(|w| lower.matches(w).count()).sum();
    let bearish: usize = BEARISH_WORDS.iter().map(|w| lower.matches(w).count()).sum();

    if bullish > bearish {
        Sentiment::Bullish
    } else if bearish > bullish {
        Sentiment::Bearish
    } else {
        Sentiment::Neutral
    }
}

/// Expands every slash-delimited tag path into one entry per level
/// (`"a/b/c"` yields `a`, `a/b`, `a/b/c`), deduplicated by full path in
/// first-seen order. Total on any input; an empty tag string yields a
/// single entry with an empty name at level 0.
pub fn parse_nested_tags<S: AsRef<str>>(tags: &[S]) -> Vec<ParsedTag> {
    let mut seen = HashSet::new();
    let mut parsed = Vec::new();

    for tag in tags {
        let mut path = String::new();
        for (level, segment) in tag.as_ref().split('/').enumerate() {
            let parent = if level == 0 { None } else { Some(path.clone()) };
            if level > 0 {
                path.push('/');
            }
            path.push_str(segment);

            if seen.insert(path.clone()) {
                parsed.push(ParsedTag {
                    name: path.clone(),
                    parent,
                    level,
                });
            }
        }
    }

    parsed
}
