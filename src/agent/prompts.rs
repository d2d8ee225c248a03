//! Prompt templates for the trading assistant

use crate::broker::requests::compact_json;
use crate::models::ToolCallResult;

pub const SYSTEM_PROMPT: &str = r#"You are an expert trading assistant for the Angel One broker APIs.

Key guidelines:
1. Always prioritize user safety and explain the risks of trading operations
2. For market data questions, use the appropriate tools to get live information
3. For trading operations, clearly explain what will happen before execution
4. When using tools, give context about the parameters you chose
5. Format numbers clearly (prices, quantities, percentages) and NEVER use placeholder values
6. If you need a symbol token, search for it first with search_scrip
7. For order placement, make sure every required parameter is provided
8. Explain any trading terminology you use
9. When calculating totals or profits, use the EXACT values from the API response, never rounded or approximate numbers
10. Sum individual holdings to get accurate portfolio totals

WORKFLOW FOR STOCK PRICE QUESTIONS:
When the user asks for the current price of a stock (e.g. "current price of TCS", "what is Reliance trading at"):
  1. FIRST call search_scrip to find the available symbols
  2. Identify the equity symbol, which ends with "-EQ" (e.g. "TCS-EQ", "RELIANCE-EQ")
  3. Call get_ltp_data with that "-EQ" tradingsymbol and its symboltoken
  4. Never stop after search_scrip for a price question
  5. If several "-EQ" symbols exist, use the first one
  This two-step process is mandatory for every price inquiry.

Available tools:
- Portfolio: get_holdings, get_all_holdings, get_positions, get_profile, get_rms_limit
- Trading: place_order, modify_order, cancel_order, get_order_book, get_trade_book
- Market Data: get_ltp_data, get_candle_data, search_scrip
- Analysis: get_option_greek, get_gainers_losers, get_put_call_ratio
- GTT: create_gtt_rule, get_gtt_list
- Utility: convert_position, estimate_charges

Respond directly to the user's question. If you need tools, request them and they will be run for you."#;

/// Initial prompt: persona and rules, then the user's query.
pub fn compose_prompt(query: &str) -> String {
    format!("{}\n\nUser: {}", SYSTEM_PROMPT, query)
}

/// Ask the model to interpret a single tool result.
pub fn narration_prompt(result: &ToolCallResult, query: &str) -> String {
    format!(
        r#"Based on the tool execution result below, provide a clear analysis and explanation to the user:

Tool: {}
Parameters: {}
Result: {}

Please interpret this data and provide insights relevant to the user's original question: "{}""#,
        result.tool_name,
        compact_json(&result.arguments),
        result.raw_result,
        query
    )
}

/// Ask the model to interpret a search and its chained quote lookup together.
pub fn comprehensive_narration_prompt(
    primary: &ToolCallResult,
    follow_up: &ToolCallResult,
    query: &str,
) -> String {
    format!(
        r#"Two tools were executed to answer the user's question. Provide one clear, complete answer using both results:

Step 1 - Tool: {}
Parameters: {}
Result: {}

Step 2 - Tool: {} (executed automatically using the symbol found in step 1)
Parameters: {}
Result: {}

Answer the user's original question directly, quoting exact values from the results: "{}""#,
        primary.tool_name,
        compact_json(&primary.arguments),
        primary.raw_result,
        follow_up.tool_name,
        compact_json(&follow_up.arguments),
        follow_up.raw_result,
        query
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ToolCallRequest;
    use serde_json::json;

    #[test]
    fn test_system_prompt_carries_price_protocol() {
        let prompt = compose_prompt("What is TCS trading at?");
        assert!(prompt.contains("search_scrip"));
        assert!(prompt.contains("get_ltp_data"));
        assert!(prompt.contains("-EQ"));
        assert!(prompt.ends_with("User: What is TCS trading at?"));
    }

    #[test]
    fn test_narration_prompts_include_results_and_query() {
        let search = ToolCallResult::success(
            &ToolCallRequest::new("search_scrip", json!({"searchscrip": "TCS"})),
            "Search Results: [TCS-EQ]".into(),
            1,
        );
        let quote = ToolCallResult::success(
            &ToolCallRequest::new("get_ltp_data", json!({"tradingsymbol": "TCS-EQ"})),
            "LTP Data: {\"ltp\":3500.1}".into(),
            1,
        );

        let single = narration_prompt(&search, "price of TCS");
        assert!(single.contains("Tool: search_scrip"));
        assert!(single.contains(r#"{"searchscrip":"TCS"}"#));

        let both = comprehensive_narration_prompt(&search, &quote, "price of TCS");
        assert!(both.contains("Search Results: [TCS-EQ]"));
        assert!(both.contains("3500.1"));
        assert!(both.contains("\"price of TCS\""));
    }
}
