//! The broker tool catalog
//!
//! One descriptor per broker operation, in the order tools are listed to
//! callers. Argument schemas are written in the verbose shape function-calling
//! servers publish (titles, defaults, `additionalProperties`); they are
//! sanitized before reaching the model.

use super::ToolDescriptor;
use crate::broker::BrokerRequest;
use crate::error::GatewayError;
use crate::Result;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

const JSON_SCHEMA_DIALECT: &str = "http://json-schema.org/draft-07/schema#";

#[derive(Debug, Clone, Copy)]
enum Kind {
    String,
    Integer,
    Number,
    StringList,
    ObjectList,
}

struct Param {
    name: &'static str,
    kind: Kind,
    description: &'static str,
    default: Option<Value>,
}

fn param(name: &'static str, kind: Kind, description: &'static str) -> Param {
    Param {
        name,
        kind,
        description,
        default: None,
    }
}

impl Param {
    fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    fn schema(&self) -> Value {
        let mut schema = Map::new();
        schema.insert("title".into(), json!(title_case(self.name)));
        match self.kind {
            Kind::String => {
                schema.insert("type".into(), json!("string"));
            }
            Kind::Integer => {
                schema.insert("type".into(), json!("integer"));
            }
            Kind::Number => {
                schema.insert("type".into(), json!("number"));
            }
            Kind::StringList => {
                schema.insert("type".into(), json!("array"));
                schema.insert("items".into(), json!({"type": "string"}));
            }
            Kind::ObjectList => {
                schema.insert("type".into(), json!("array"));
                schema.insert(
                    "items".into(),
                    json!({"type": "object", "additionalProperties": true}),
                );
            }
        }
        schema.insert("description".into(), json!(self.description));
        if let Some(default) = &self.default {
            schema.insert("default".into(), default.clone());
        }
        Value::Object(schema)
    }
}

fn title_case(name: &str) -> String {
    name.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Argument schema for `tool`. Parameters without a default are required.
fn arguments_schema(tool: &str, params: &[Param]) -> Value {
    let properties: Map<String, Value> = params
        .iter()
        .map(|p| (p.name.to_string(), p.schema()))
        .collect();
    let required: Vec<&str> = params
        .iter()
        .filter(|p| p.default.is_none())
        .map(|p| p.name)
        .collect();

    let mut schema = Map::new();
    schema.insert("$schema".into(), json!(JSON_SCHEMA_DIALECT));
    schema.insert("title".into(), json!(format!("{}Arguments", tool)));
    schema.insert("type".into(), json!("object"));
    schema.insert("properties".into(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".into(), json!(required));
    }
    schema.insert("additionalProperties".into(), json!(false));
    Value::Object(schema)
}

/// Decode model-issued arguments into a typed parameter struct.
fn parse<T: DeserializeOwned>(tool: &str, arguments: &Value) -> Result<T> {
    let object = match arguments {
        Value::Null => Value::Object(Map::new()),
        Value::Object(_) => arguments.clone(),
        other => {
            return Err(GatewayError::InvalidToolInput(format!(
                "{}: arguments must be an object, got {}",
                tool, other
            )))
        }
    };
    serde_json::from_value(object)
        .map_err(|e| GatewayError::InvalidToolInput(format!("{}: {}", tool, e)))
}

fn descriptor(
    name: &'static str,
    description: &'static str,
    params: &[Param],
    handler: super::RequestHandler,
    is_mutating: bool,
) -> ToolDescriptor {
    ToolDescriptor {
        name,
        description,
        argument_schema: arguments_schema(name, params),
        handler,
        is_mutating,
    }
}

fn exchange_param() -> Param {
    param("exchange", Kind::String, "Exchange (NSE, BSE, NFO, MCX)")
}

fn order_params() -> Vec<Param> {
    vec![
        param("variety", Kind::String, "Order variety (NORMAL, STOPLOSS, AMO, ROBO)"),
        param("tradingsymbol", Kind::String, "Trading symbol (e.g., SBIN-EQ)"),
        param("symboltoken", Kind::String, "Symbol token for the instrument"),
        param("transactiontype", Kind::String, "BUY or SELL"),
        exchange_param(),
        param(
            "ordertype",
            Kind::String,
            "Order type (MARKET, LIMIT, STOPLOSS_LIMIT, STOPLOSS_MARKET)",
        ),
        param(
            "producttype",
            Kind::String,
            "Product type (DELIVERY, CARRYFORWARD, MARGIN, INTRADAY, BO)",
        ),
        param("duration", Kind::String, "Order duration (DAY, IOC)"),
        param("price", Kind::String, "Order price"),
        param("quantity", Kind::String, "Order quantity"),
        param("squareoff", Kind::String, "Square off price (for bracket orders)")
            .with_default(json!("0")),
        param("stoploss", Kind::String, "Stop loss price (for bracket orders)")
            .with_default(json!("0")),
    ]
}

fn modify_params() -> Vec<Param> {
    vec![
        param("orderid", Kind::String, "Order ID to modify"),
        param("variety", Kind::String, "Order variety"),
        param("tradingsymbol", Kind::String, "Trading symbol"),
        param("symboltoken", Kind::String, "Symbol token"),
        param("transactiontype", Kind::String, "BUY or SELL"),
        param("exchange", Kind::String, "Exchange"),
        param("ordertype", Kind::String, "Order type"),
        param("producttype", Kind::String, "Product type"),
        param("duration", Kind::String, "Order duration"),
        param("price", Kind::String, "New price"),
        param("quantity", Kind::String, "New quantity"),
    ]
}

fn gtt_rule_params() -> Vec<Param> {
    vec![
        param("tradingsymbol", Kind::String, "Trading symbol"),
        param("symboltoken", Kind::String, "Symbol token"),
        param("exchange", Kind::String, "Exchange"),
        param("producttype", Kind::String, "Product type"),
        param("transactiontype", Kind::String, "BUY or SELL"),
        param("price", Kind::Number, "Order price"),
        param("qty", Kind::Integer, "Quantity"),
        param("disclosedqty", Kind::Integer, "Disclosed quantity"),
        param("triggerprice", Kind::Number, "Trigger price"),
        param("timeperiod", Kind::Integer, "Time period in days"),
    ]
}

fn convert_params() -> Vec<Param> {
    vec![
        param("exchange", Kind::String, "Exchange"),
        param("oldproducttype", Kind::String, "Current product type"),
        param("newproducttype", Kind::String, "Target product type"),
        param("tradingsymbol", Kind::String, "Trading symbol"),
        param("transactiontype", Kind::String, "BUY or SELL"),
        param("quantity", Kind::Integer, "Quantity to convert"),
        param("type", Kind::String, "Conversion type (DAY)"),
    ]
}

/// Every broker tool, grouped as account, trading, market data, GTT,
/// analysis, utility.
pub fn broker_tools() -> Vec<ToolDescriptor> {
    vec![
        // Account & portfolio
        descriptor(
            "get_profile",
            "Get user profile information",
            &[],
            |_| Ok(BrokerRequest::Profile),
            false,
        ),
        descriptor(
            "get_holdings",
            "Get user's stock holdings",
            &[],
            |_| Ok(BrokerRequest::Holdings),
            false,
        ),
        descriptor(
            "get_all_holdings",
            "Get all holdings including family accounts",
            &[],
            |_| Ok(BrokerRequest::AllHoldings),
            false,
        ),
        descriptor(
            "get_positions",
            "Get user's open positions",
            &[],
            |_| Ok(BrokerRequest::Positions),
            false,
        ),
        descriptor(
            "get_rms_limit",
            "Get Risk Management System limits",
            &[],
            |_| Ok(BrokerRequest::RmsLimit),
            false,
        ),
        // Trading
        descriptor(
            "place_order",
            "Place a trading order",
            &order_params(),
            |args| parse("place_order", args).map(BrokerRequest::PlaceOrder),
            true,
        ),
        descriptor(
            "modify_order",
            "Modify an existing order",
            &modify_params(),
            |args| parse("modify_order", args).map(BrokerRequest::ModifyOrder),
            true,
        ),
        descriptor(
            "cancel_order",
            "Cancel an existing order",
            &[
                param("order_id", Kind::String, "Order ID to cancel"),
                param("variety", Kind::String, "Order variety (NORMAL, STOPLOSS, AMO, ROBO)"),
            ],
            |args| parse("cancel_order", args).map(BrokerRequest::CancelOrder),
            true,
        ),
        descriptor(
            "get_order_book",
            "Get the order book with all orders",
            &[],
            |_| Ok(BrokerRequest::OrderBook),
            false,
        ),
        descriptor(
            "get_trade_book",
            "Get the trade book with all executed trades",
            &[],
            |_| Ok(BrokerRequest::TradeBook),
            false,
        ),
        // Market data
        descriptor(
            "get_ltp_data",
            "Get Last Traded Price (LTP) data",
            &[
                exchange_param(),
                param("tradingsymbol", Kind::String, "Trading symbol (e.g., SBIN-EQ)"),
                param("symboltoken", Kind::String, "Symbol token"),
            ],
            |args| parse("get_ltp_data", args).map(BrokerRequest::LtpData),
            false,
        ),
        descriptor(
            "get_candle_data",
            "Get historical candlestick data",
            &[
                exchange_param(),
                param("symboltoken", Kind::String, "Symbol token"),
                param(
                    "interval",
                    Kind::String,
                    "Time interval (ONE_MINUTE, FIVE_MINUTE, FIFTEEN_MINUTE, THIRTY_MINUTE, SIXTY_MINUTE, ONE_DAY)",
                ),
                param("fromdate", Kind::String, "Start date (YYYY-MM-DD HH:MM format)"),
                param("todate", Kind::String, "End date (YYYY-MM-DD HH:MM format)"),
            ],
            |args| parse("get_candle_data", args).map(BrokerRequest::CandleData),
            false,
        ),
        descriptor(
            "search_scrip",
            "Search for securities to get symbol details",
            &[
                param("exchange", Kind::String, "Exchange to search in (NSE, BSE, NFO, MCX)"),
                param("searchscrip", Kind::String, "Search term (e.g., RELIANCE, SBIN)"),
            ],
            |args| parse("search_scrip", args).map(BrokerRequest::SearchScrip),
            false,
        ),
        // GTT
        descriptor(
            "create_gtt_rule",
            "Create a GTT (Good Till Triggered) rule",
            &gtt_rule_params(),
            |args| parse("create_gtt_rule", args).map(BrokerRequest::CreateGttRule),
            true,
        ),
        descriptor(
            "get_gtt_list",
            "Get list of GTT rules",
            &[
                param("status", Kind::StringList, "List of status filters (e.g., [\"FORALL\"])"),
                param("page", Kind::Integer, "Page number").with_default(json!(1)),
                param("count", Kind::Integer, "Number of records per page").with_default(json!(10)),
            ],
            |args| parse("get_gtt_list", args).map(BrokerRequest::GttList),
            false,
        ),
        // Analysis
        descriptor(
            "get_option_greek",
            "Get option Greeks for an underlying",
            &[
                param("name", Kind::String, "Underlying name (e.g., NIFTY)"),
                param("expirydate", Kind::String, "Expiry date (e.g., 25JAN2024)"),
            ],
            |args| parse("get_option_greek", args).map(BrokerRequest::OptionGreek),
            false,
        ),
        descriptor(
            "get_gainers_losers",
            "Get top gainers/losers",
            &[
                param("datatype", Kind::String, "Data type (PercGainers, PercLosers, PercOIGainers)"),
                param("expirytype", Kind::String, "Expiry type (NEAR, NEXT, FAR)")
                    .with_default(json!("NEAR")),
            ],
            |args| parse("get_gainers_losers", args).map(BrokerRequest::GainersLosers),
            false,
        ),
        descriptor(
            "get_put_call_ratio",
            "Get Put-Call Ratio for the market",
            &[],
            |_| Ok(BrokerRequest::PutCallRatio),
            false,
        ),
        // Utility
        descriptor(
            "convert_position",
            "Convert position from one product type to another",
            &convert_params(),
            |args| parse("convert_position", args).map(BrokerRequest::ConvertPosition),
            true,
        ),
        descriptor(
            "estimate_charges",
            "Estimate brokerage and charges for trades",
            &[param(
                "orders",
                Kind::ObjectList,
                "List of order dictionaries with keys: product_type, transaction_type, quantity, price, exchange, symbol_name, token",
            )],
            |args| parse("estimate_charges", args).map(BrokerRequest::EstimateCharges),
            false,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_names_unique_and_stable() {
        let tools = broker_tools();
        assert_eq!(tools.len(), 20);
        assert_eq!(tools[0].name, "get_profile");
        assert_eq!(tools[19].name, "estimate_charges");

        let names: HashSet<_> = tools.iter().map(|t| t.name).collect();
        assert_eq!(names.len(), tools.len());
    }

    #[test]
    fn test_mutating_flags() {
        let mutating: Vec<_> = broker_tools()
            .into_iter()
            .filter(|t| t.is_mutating)
            .map(|t| t.name)
            .collect();
        assert_eq!(
            mutating,
            [
                "place_order",
                "modify_order",
                "cancel_order",
                "create_gtt_rule",
                "convert_position"
            ]
        );
    }

    #[test]
    fn test_handlers_produce_matching_operations() {
        for tool in broker_tools() {
            if let Ok(request) = (tool.handler)(&Value::Null) {
                assert_eq!(request.operation(), tool.name);
                assert!(!request.is_mutating());
            }
        }

        let tools = broker_tools();
        let search = tools.iter().find(|t| t.name == "search_scrip").unwrap();
        let request = (search.handler)(&json!({"exchange": "NSE", "searchscrip": "TCS"})).unwrap();
        assert_eq!(request.operation(), "search_scrip");
    }

    #[test]
    fn test_verbose_schema_shape() {
        let tools = broker_tools();
        let gtt = tools.iter().find(|t| t.name == "get_gtt_list").unwrap();
        let schema = &gtt.argument_schema;

        assert_eq!(schema["title"], "get_gtt_listArguments");
        assert_eq!(schema["additionalProperties"], false);
        assert_eq!(schema["required"], json!(["status"]));
        assert_eq!(schema["properties"]["page"]["default"], 1);
        assert_eq!(schema["properties"]["status"]["items"]["type"], "string");

        let holdings = tools.iter().find(|t| t.name == "get_holdings").unwrap();
        assert!(holdings.argument_schema.get("required").is_none());
    }

    #[test]
    fn test_parse_rejects_bad_arguments() {
        let tools = broker_tools();
        let ltp = tools.iter().find(|t| t.name == "get_ltp_data").unwrap();

        let err = (ltp.handler)(&json!({"exchange": "NSE"})).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidToolInput(ref m) if m.contains("get_ltp_data")));

        let err = (ltp.handler)(&json!(["NSE"])).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidToolInput(_)));
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("order_id"), "Order Id");
        assert_eq!(title_case("symboltoken"), "Symboltoken");
    }
}
