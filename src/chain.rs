//! Auto-chaining of price lookups
//!
//! A price question needs two broker calls: a symbol search, then a quote
//! lookup with the instrument token the search returned. After a search we
//! scrape the result text for the first equity symbol/token pair and, if the
//! user asked about a price, chain the quote call ourselves.
//!
//! This is a heuristic over loosely structured text. The looser patterns can
//! pick up an unrelated number near a symbol; a miss simply means no chaining.

use crate::models::{ChainDecision, ToolCallResult};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::json;
use tracing::{info, warn};

pub const SEARCH_TOOL: &str = "search_scrip";
pub const QUOTE_TOOL: &str = "get_ltp_data";
pub const DEFAULT_EXCHANGE: &str = crate::broker::requests::DEFAULT_EXCHANGE;
pub const PRICE_KEYWORDS: [&str; 5] = ["price", "current", "trading at", "quote", "ltp"];

lazy_static! {
    static ref QUOTED_PAIR: Regex = Regex::new(
        r#""tradingsymbol"\s*:\s*"([^"]*-EQ)"[^}]*"symboltoken"\s*:\s*"?([0-9]+)"?"#
    )
    .expect("valid regex");
    static ref TOKEN_FIRST_PAIR: Regex = Regex::new(
        r#""symboltoken"\s*:\s*"?([0-9]+)"?[^}]*"tradingsymbol"\s*:\s*"([^"]*-EQ)""#
    )
    .expect("valid regex");
    static ref LOOSE_PAIR: Regex = Regex::new(
        r#"([A-Z0-9&][A-Z0-9&-]*-EQ)\b[^}]*?symboltoken['"]?\s*[:=]\s*['"]?([0-9]+)"#
    )
    .expect("valid regex");
    static ref NEAREST_NUMBER: Regex =
        Regex::new(r"([A-Z0-9&][A-Z0-9&-]*-EQ)\b.*?([0-9]{3,})").expect("valid regex");
}

/// An equity symbol and its instrument token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquityMatch {
    pub tradingsymbol: String,
    pub symboltoken: String,
}

struct ExtractionStrategy {
    name: &'static str,
    pattern: &'static Regex,
    symbol_group: usize,
    token_group: usize,
}

impl ExtractionStrategy {
    fn extract(&self, text: &str) -> Option<EquityMatch> {
        let caps = self.pattern.captures(text)?;
        Some(EquityMatch {
            tradingsymbol: caps.get(self.symbol_group)?.as_str().to_string(),
            symboltoken: caps.get(self.token_group)?.as_str().to_string(),
        })
    }
}

/// Strictest first.
fn strategies() -> [ExtractionStrategy; 4] {
    [
        ExtractionStrategy {
            name: "quoted_pair",
            pattern: &QUOTED_PAIR,
            symbol_group: 1,
            token_group: 2,
        },
        ExtractionStrategy {
            name: "token_first_pair",
            pattern: &TOKEN_FIRST_PAIR,
            symbol_group: 2,
            token_group: 1,
        },
        ExtractionStrategy {
            name: "loose_pair",
            pattern: &LOOSE_PAIR,
            symbol_group: 1,
            token_group: 2,
        },
        ExtractionStrategy {
            name: "nearest_number",
            pattern: &NEAREST_NUMBER,
            symbol_group: 1,
            token_group: 2,
        },
    ]
}

/// First equity symbol/token pair in document order, from the first
/// strategy that finds any.
pub fn extract_equity(text: &str) -> Option<EquityMatch> {
    strategies().iter().find_map(|strategy| {
        let found = strategy.extract(text)?;
        info!(
            strategy = strategy.name,
            tradingsymbol = %found.tradingsymbol,
            symboltoken = %found.symboltoken,
            "Extracted equity symbol from search results"
        );
        Some(found)
    })
}

#[derive(Debug, Clone)]
pub struct ChainDetector {
    keywords: Vec<String>,
    default_exchange: String,
}

impl Default for ChainDetector {
    fn default() -> Self {
        Self {
            keywords: PRICE_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            default_exchange: DEFAULT_EXCHANGE.to_string(),
        }
    }
}

impl ChainDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_price_query(&self, query: &str) -> bool {
        let lowered = query.to_lowercase();
        self.keywords.iter().any(|k| lowered.contains(k.as_str()))
    }

    /// Decide whether `result` should be followed by a quote lookup.
    pub fn detect(&self, result: &ToolCallResult, user_query: &str) -> ChainDecision {
        if result.tool_name != SEARCH_TOOL || !result.succeeded {
            return ChainDecision::no_chain();
        }
        if !self.is_price_query(user_query) {
            return ChainDecision::no_chain();
        }

        let Some(found) = extract_equity(&result.raw_result) else {
            warn!("No equity symbols found in search results; skipping chained quote lookup");
            return ChainDecision::no_chain();
        };

        let exchange = result
            .arguments
            .get("exchange")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(&self.default_exchange)
            .to_string();

        info!(
            tradingsymbol = %found.tradingsymbol,
            exchange = %exchange,
            "Price query detected; chaining {}",
            QUOTE_TOOL
        );

        ChainDecision::chain(
            QUOTE_TOOL,
            json!({
                "exchange": exchange,
                "tradingsymbol": found.tradingsymbol,
                "symboltoken": found.symboltoken,
            }),
        )
    }
}
