//! Typed broker requests
//!
//! Model-issued tool arguments are untyped JSON. They are converted into one
//! of these structs before anything touches the broker. Numeric fields accept
//! either JSON numbers or numeric strings because the model emits both.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

pub const DEFAULT_EXCHANGE: &str = "NSE";

//
// ================= Lenient field codecs =================
//

fn de_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                    .map(|f| f as u64)
            })
            .ok_or_else(|| de::Error::custom(format!("expected a whole number, got {}", n))),
        Value::String(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|_| de::Error::custom(format!("expected a whole number, got '{}'", s))),
        other => Err(de::Error::custom(format!(
            "expected a whole number, got {}",
            other
        ))),
    }
}

fn de_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| de::Error::custom(format!("expected a number, got {}", n))),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| de::Error::custom(format!("expected a number, got '{}'", s))),
        other => Err(de::Error::custom(format!("expected a number, got {}", other))),
    }
}

fn de_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!("expected a string, got {}", other))),
    }
}

fn as_string<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_string())
}

fn zero() -> String {
    "0".to_string()
}

fn near() -> String {
    "NEAR".to_string()
}

fn first_page() -> u32 {
    1
}

fn ten() -> u32 {
    10
}

//
// ================= Parameter structs =================
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderParams {
    pub variety: String,
    pub tradingsymbol: String,
    #[serde(deserialize_with = "de_string")]
    pub symboltoken: String,
    pub transactiontype: String,
    pub exchange: String,
    pub ordertype: String,
    pub producttype: String,
    pub duration: String,
    #[serde(deserialize_with = "de_string")]
    pub price: String,
    #[serde(deserialize_with = "de_u64", serialize_with = "as_string")]
    pub quantity: u64,
    #[serde(default = "zero", deserialize_with = "de_string")]
    pub squareoff: String,
    #[serde(default = "zero", deserialize_with = "de_string")]
    pub stoploss: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifyOrderParams {
    #[serde(deserialize_with = "de_string")]
    pub orderid: String,
    pub variety: String,
    pub tradingsymbol: String,
    #[serde(deserialize_with = "de_string")]
    pub symboltoken: String,
    pub transactiontype: String,
    pub exchange: String,
    pub ordertype: String,
    pub producttype: String,
    pub duration: String,
    #[serde(deserialize_with = "de_string")]
    pub price: String,
    #[serde(deserialize_with = "de_u64", serialize_with = "as_string")]
    pub quantity: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelOrderParams {
    #[serde(rename = "orderid", alias = "order_id", deserialize_with = "de_string")]
    pub order_id: String,
    pub variety: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LtpParams {
    pub exchange: String,
    pub tradingsymbol: String,
    #[serde(deserialize_with = "de_string")]
    pub symboltoken: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleParams {
    pub exchange: String,
    #[serde(deserialize_with = "de_string")]
    pub symboltoken: String,
    pub interval: String,
    pub fromdate: String,
    pub todate: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    pub exchange: String,
    pub searchscrip: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GttRuleParams {
    pub tradingsymbol: String,
    #[serde(deserialize_with = "de_string")]
    pub symboltoken: String,
    pub exchange: String,
    pub producttype: String,
    pub transactiontype: String,
    #[serde(deserialize_with = "de_f64")]
    pub price: f64,
    #[serde(deserialize_with = "de_u64")]
    pub qty: u64,
    #[serde(deserialize_with = "de_u64")]
    pub disclosedqty: u64,
    #[serde(deserialize_with = "de_f64")]
    pub triggerprice: f64,
    #[serde(deserialize_with = "de_u64")]
    pub timeperiod: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GttListParams {
    pub status: Vec<String>,
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default = "ten")]
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionGreekParams {
    pub name: String,
    pub expirydate: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GainersLosersParams {
    pub datatype: String,
    #[serde(default = "near")]
    pub expirytype: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertPositionParams {
    pub exchange: String,
    pub oldproducttype: String,
    pub newproducttype: String,
    pub tradingsymbol: String,
    pub transactiontype: String,
    #[serde(deserialize_with = "de_u64")]
    pub quantity: u64,
    #[serde(rename = "type")]
    pub conversion_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeOrder {
    pub product_type: String,
    pub transaction_type: String,
    #[serde(deserialize_with = "de_string")]
    pub quantity: String,
    #[serde(deserialize_with = "de_string")]
    pub price: String,
    pub exchange: String,
    pub symbol_name: String,
    #[serde(deserialize_with = "de_string")]
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateChargesParams {
    pub orders: Vec<ChargeOrder>,
}

//
// ================= Request =================
//

/// One broker operation with validated arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerRequest {
    Profile,
    Holdings,
    AllHoldings,
    Positions,
    RmsLimit,
    PlaceOrder(OrderParams),
    ModifyOrder(ModifyOrderParams),
    CancelOrder(CancelOrderParams),
    OrderBook,
    TradeBook,
    LtpData(LtpParams),
    CandleData(CandleParams),
    SearchScrip(SearchParams),
    CreateGttRule(GttRuleParams),
    GttList(GttListParams),
    OptionGreek(OptionGreekParams),
    GainersLosers(GainersLosersParams),
    PutCallRatio,
    ConvertPosition(ConvertPositionParams),
    EstimateCharges(EstimateChargesParams),
}

impl BrokerRequest {
    /// Operation name; identical to the tool name that produces it.
    pub fn operation(&self) -> &'static str {
        match self {
            BrokerRequest::Profile => "get_profile",
            BrokerRequest::Holdings => "get_holdings",
            BrokerRequest::AllHoldings => "get_all_holdings",
            BrokerRequest::Positions => "get_positions",
            BrokerRequest::RmsLimit => "get_rms_limit",
            BrokerRequest::PlaceOrder(_) => "place_order",
            BrokerRequest::ModifyOrder(_) => "modify_order",
            BrokerRequest::CancelOrder(_) => "cancel_order",
            BrokerRequest::OrderBook => "get_order_book",
            BrokerRequest::TradeBook => "get_trade_book",
            BrokerRequest::LtpData(_) => "get_ltp_data",
            BrokerRequest::CandleData(_) => "get_candle_data",
            BrokerRequest::SearchScrip(_) => "search_scrip",
            BrokerRequest::CreateGttRule(_) => "create_gtt_rule",
            BrokerRequest::GttList(_) => "get_gtt_list",
            BrokerRequest::OptionGreek(_) => "get_option_greek",
            BrokerRequest::GainersLosers(_) => "get_gainers_losers",
            BrokerRequest::PutCallRatio => "get_put_call_ratio",
            BrokerRequest::ConvertPosition(_) => "convert_position",
            BrokerRequest::EstimateCharges(_) => "estimate_charges",
        }
    }

    /// Requests that change broker-side state.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            BrokerRequest::PlaceOrder(_)
                | BrokerRequest::ModifyOrder(_)
                | BrokerRequest::CancelOrder(_)
                | BrokerRequest::CreateGttRule(_)
                | BrokerRequest::ConvertPosition(_)
        )
    }

    /// Quantity subject to the order ceiling, if this request carries one.
    pub fn order_quantity(&self) -> Option<u64> {
        match self {
            BrokerRequest::PlaceOrder(p) => Some(p.quantity),
            BrokerRequest::ModifyOrder(p) => Some(p.quantity),
            BrokerRequest::CreateGttRule(p) => Some(p.qty),
            BrokerRequest::ConvertPosition(p) => Some(p.quantity),
            _ => None,
        }
    }

    /// Request body as sent to the broker. `Value::Null` for parameterless
    /// operations.
    pub fn params(&self) -> Value {
        let encoded = match self {
            BrokerRequest::PlaceOrder(p) => serde_json::to_value(p),
            BrokerRequest::ModifyOrder(p) => serde_json::to_value(p),
            BrokerRequest::CancelOrder(p) => serde_json::to_value(p),
            BrokerRequest::LtpData(p) => serde_json::to_value(p),
            BrokerRequest::CandleData(p) => serde_json::to_value(p),
            BrokerRequest::SearchScrip(p) => serde_json::to_value(p),
            BrokerRequest::CreateGttRule(p) => serde_json::to_value(p),
            BrokerRequest::GttList(p) => serde_json::to_value(p),
            BrokerRequest::OptionGreek(p) => serde_json::to_value(p),
            BrokerRequest::GainersLosers(p) => serde_json::to_value(p),
            BrokerRequest::ConvertPosition(p) => serde_json::to_value(p),
            BrokerRequest::EstimateCharges(p) => serde_json::to_value(p),
            _ => Ok(Value::Null),
        };
        // Plain structs of strings and numbers always encode.
        encoded.unwrap_or(Value::Null)
    }

    /// What a dry run reports this request would have done, and the
    /// parameters worth echoing alongside it.
    pub fn dry_run_description(&self) -> (String, Option<Value>) {
        match self {
            BrokerRequest::PlaceOrder(_) => {
                ("Order would be placed".to_string(), Some(self.params()))
            }
            BrokerRequest::ModifyOrder(_) => {
                ("Order would be modified".to_string(), Some(self.params()))
            }
            BrokerRequest::CancelOrder(p) => {
                (format!("Order {} would be cancelled", p.order_id), None)
            }
            BrokerRequest::CreateGttRule(_) => {
                ("GTT rule would be created".to_string(), Some(self.params()))
            }
            BrokerRequest::ConvertPosition(_) => {
                ("Position would be converted".to_string(), Some(self.params()))
            }
            other => (format!("{} would be executed", other.operation()), None),
        }
    }

    /// Render a broker payload as the text handed to the model.
    pub fn render_result(&self, data: &Value) -> String {
        let compact = compact_json(data);
        match self {
            BrokerRequest::PlaceOrder(_) => {
                let order_id = data
                    .get("orderid")
                    .map(scalar_text)
                    .unwrap_or(compact);
                format!("Order placed successfully. Order ID: {}", order_id)
            }
            BrokerRequest::ModifyOrder(_) => format!("Order modified successfully: {}", compact),
            BrokerRequest::CancelOrder(_) => format!("Order cancelled successfully: {}", compact),
            BrokerRequest::CreateGttRule(_) => {
                let rule_id = data.get("id").map(scalar_text).unwrap_or(compact);
                format!("GTT rule created successfully. Rule ID: {}", rule_id)
            }
            BrokerRequest::ConvertPosition(_) => {
                format!("Position conversion response: {}", compact)
            }
            BrokerRequest::Profile => format!("User Profile: {}", compact),
            BrokerRequest::Holdings => format!("Holdings: {}", compact),
            BrokerRequest::AllHoldings => format!("All Holdings: {}", compact),
            BrokerRequest::Positions => format!("Positions: {}", compact),
            BrokerRequest::RmsLimit => format!("RMS Limits: {}", compact),
            BrokerRequest::OrderBook => format!("Order Book: {}", compact),
            BrokerRequest::TradeBook => format!("Trade Book: {}", compact),
            BrokerRequest::LtpData(_) => format!("LTP Data: {}", compact),
            BrokerRequest::CandleData(_) => format!("Candle Data: {}", compact),
            BrokerRequest::SearchScrip(_) => format!("Search Results: {}", compact),
            BrokerRequest::GttList(_) => format!("GTT Rule List: {}", compact),
            BrokerRequest::OptionGreek(_) => format!("Option Greeks: {}", compact),
            BrokerRequest::GainersLosers(_) => format!("Gainers/Losers: {}", compact),
            BrokerRequest::PutCallRatio => format!("Put-Call Ratio: {}", compact),
            BrokerRequest::EstimateCharges(_) => format!("Estimated charges: {}", compact),
        }
    }
}

pub(crate) fn compact_json(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| value.to_string())
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => compact_json(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn order_args() -> Value {
        json!({
            "variety": "NORMAL",
            "tradingsymbol": "SBIN-EQ",
            "symboltoken": 3045,
            "transactiontype": "BUY",
            "exchange": "NSE",
            "ordertype": "LIMIT",
            "producttype": "INTRADAY",
            "duration": "DAY",
            "price": 812.5,
            "quantity": "25"
        })
    }

    #[test]
    fn test_order_params_accept_mixed_scalars_and_defaults() {
        let params: OrderParams = serde_json::from_value(order_args()).unwrap();
        assert_eq!(params.quantity, 25);
        assert_eq!(params.symboltoken, "3045");
        assert_eq!(params.price, "812.5");
        assert_eq!(params.squareoff, "0");
        assert_eq!(params.stoploss, "0");
    }

    #[test]
    fn test_quantity_accepts_integral_float_rejects_fraction() {
        let mut args = order_args();
        args["quantity"] = json!(10.0);
        let params: OrderParams = serde_json::from_value(args.clone()).unwrap();
        assert_eq!(params.quantity, 10);

        args["quantity"] = json!(1.5);
        assert!(serde_json::from_value::<OrderParams>(args.clone()).is_err());

        args["quantity"] = json!("ten");
        assert!(serde_json::from_value::<OrderParams>(args).is_err());
    }

    #[test]
    fn test_order_body_sends_quantity_as_string() {
        let request =
            BrokerRequest::PlaceOrder(serde_json::from_value(order_args()).unwrap());
        assert_eq!(request.params()["quantity"], json!("25"));
        assert_eq!(request.order_quantity(), Some(25));
        assert!(request.is_mutating());
    }

    #[test]
    fn test_cancel_accepts_tool_name_and_sends_orderid() {
        let params: CancelOrderParams =
            serde_json::from_value(json!({"order_id": "2301", "variety": "NORMAL"})).unwrap();
        let request = BrokerRequest::CancelOrder(params);
        assert_eq!(
            request.params(),
            json!({"orderid": "2301", "variety": "NORMAL"})
        );
        let (description, params) = request.dry_run_description();
        assert_eq!(description, "Order 2301 would be cancelled");
        assert!(params.is_none());
    }

    #[test]
    fn test_optional_defaults() {
        let gl: GainersLosersParams =
            serde_json::from_value(json!({"datatype": "PercGainers"})).unwrap();
        assert_eq!(gl.expirytype, "NEAR");

        let list: GttListParams =
            serde_json::from_value(json!({"status": ["FORALL"]})).unwrap();
        assert_eq!((list.page, list.count), (1, 10));
    }

    #[test]
    fn test_convert_position_type_field() {
        let params: ConvertPositionParams = serde_json::from_value(json!({
            "exchange": "NSE",
            "oldproducttype": "INTRADAY",
            "newproducttype": "DELIVERY",
            "tradingsymbol": "TCS-EQ",
            "transactiontype": "BUY",
            "quantity": 5,
            "type": "DAY"
        }))
        .unwrap();
        assert_eq!(params.conversion_type, "DAY");
        assert_eq!(
            BrokerRequest::ConvertPosition(params).params()["type"],
            json!("DAY")
        );
    }

    #[test]
    fn test_render_result_labels() {
        let search = BrokerRequest::SearchScrip(SearchParams {
            exchange: "NSE".into(),
            searchscrip: "TCS".into(),
        });
        assert_eq!(
            search.render_result(&json!([{"tradingsymbol": "TCS-EQ", "symboltoken": "11536"}])),
            r#"Search Results: [{"tradingsymbol":"TCS-EQ","symboltoken":"11536"}]"#
        );

        let order = BrokerRequest::PlaceOrder(serde_json::from_value(order_args()).unwrap());
        assert_eq!(
            order.render_result(&json!({"orderid": "201020000000080", "script": "SBIN-EQ"})),
            "Order placed successfully. Order ID: 201020000000080"
        );
        assert_eq!(BrokerRequest::Holdings.params(), Value::Null);
        assert!(!BrokerRequest::Holdings.is_mutating());
    }
}
