//! Registration activity tools: recent records and a count.

use async_trait::async_trait;
use serde_json::Value;

use super::{single_string_schema, string_arg, Tool, ToolArgs, ToolError};
use crate::registrations::{FetchMode, FetchResult, Hours, RegistrationFetcher};

/// Models send `hours` as either `"24"` or `24`.
fn parse_hours(args: &ToolArgs) -> Result<Hours, ToolError> {
    let parsed = match args.get("hours") {
        Some(Value::Number(n)) => match n.as_f64() {
            Some(v) => Hours::new(v),
            None => n.to_string().parse::<Hours>(),
        },
        _ => string_arg(args, "hours")?.parse::<Hours>(),
    };
    parsed.map_err(|e| ToolError::InvalidArgument {
        name: "hours",
        reason: e.to_string(),
    })
}

const HOURS_DESCRIPTION: &str = "How far back to look, in hours (e.g. \"24\" or \"0.5\")";

async fn run(fetcher: &RegistrationFetcher, args: &ToolArgs, mode: FetchMode) -> Result<String, ToolError> {
    let hours = parse_hours(args)?;
    let result = fetcher
        .fetch(hours, mode)
        .await
        .map_err(|e| ToolError::Upstream(e.into()))?;
    let payload = match result {
        FetchResult::Records(records) => serde_json::to_string(&records),
        count @ FetchResult::Count { .. } => serde_json::to_string(&count),
    };
    payload.map_err(|e| ToolError::Upstream(e.into()))
}

// ── RecentRegistrationsTool ─────────────────────────────────────────

pub struct RecentRegistrationsTool {
    fetcher: RegistrationFetcher,
}

impl RecentRegistrationsTool {
    pub fn new(fetcher: RegistrationFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl Tool for RecentRegistrationsTool {
    fn name(&self) -> &str {
        "recent_registrations"
    }

    fn description(&self) -> &str {
        "List every name registered within the last N hours. Returns a JSON array of \
         records (id, name, owner, transactionHash, blockNumber, blockTimestamp), newest \
         block first. Prefer count_registrations when only a number is needed."
    }

    fn parameters(&self) -> Value {
        single_string_schema("hours", HOURS_DESCRIPTION)
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, ToolError> {
        run(&self.fetcher, &args, FetchMode::Collect).await
    }
}

// ── CountRegistrationsTool ──────────────────────────────────────────

pub struct CountRegistrationsTool {
    fetcher: RegistrationFetcher,
}

impl CountRegistrationsTool {
    pub fn new(fetcher: RegistrationFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl Tool for CountRegistrationsTool {
    fn name(&self) -> &str {
        "count_registrations"
    }

    fn description(&self) -> &str {
        "Count how many names were registered within the last N hours. \
         Returns JSON like {\"count\": 42}."
    }

    fn parameters(&self) -> Value {
        single_string_schema("hours", HOURS_DESCRIPTION)
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, ToolError> {
        run(&self.fetcher, &args, FetchMode::Count).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registrations::{FetchError, FetchWindow, PageSource, QueryShape};
    use serde_json::json;
    use std::sync::Arc;

    fn describe_hours(args: &ToolArgs) -> Result<Value, ToolError> {
        parse_hours(args).map(|h| json!({ "hours": h.get() }))
    }

    struct TwoRecords;

    #[async_trait]
    impl PageSource for TwoRecords {
        async fn fetch_page(
            &self,
            _shape: QueryShape,
            _window: FetchWindow,
        ) -> Result<Vec<Value>, FetchError> {
            Ok((0..2)
                .map(|i| {
                    json!({
                        "id": format!("r{i}"), "name": format!("n{i}.base.eth"),
                        "owner": "0xaa", "transactionHash": "0xbb",
                        "blockNumber": "10", "blockTimestamp": "20"
                    })
                })
                .collect())
        }
    }

    struct Down;

    #[async_trait]
    impl PageSource for Down {
        async fn fetch_page(
            &self,
            _shape: QueryShape,
            _window: FetchWindow,
        ) -> Result<Vec<Value>, FetchError> {
            Err(FetchError::Query("subgraph unavailable".into()))
        }
    }

    fn hours(v: &str) -> ToolArgs {
        let mut args = ToolArgs::new();
        args.insert("hours".into(), Value::String(v.into()));
        args
    }

    #[test]
    fn test_hours_argument_parsing() {
        assert_eq!(describe_hours(&hours("12")).unwrap(), json!({ "hours": 12.0 }));
        assert!(matches!(
            describe_hours(&hours("twelve")),
            Err(ToolError::InvalidArgument { name: "hours", .. })
        ));
        assert!(matches!(
            describe_hours(&ToolArgs::new()),
            Err(ToolError::MissingArgument("hours"))
        ));
    }

    #[test]
    fn test_hours_as_json_number() {
        let args = |v: Value| ToolArgs::from_iter([("hours".to_string(), v)]);

        assert_eq!(describe_hours(&args(json!(24))).unwrap(), json!({ "hours": 24.0 }));
        assert_eq!(describe_hours(&args(json!(0.5))).unwrap(), json!({ "hours": 0.5 }));
        assert!(matches!(
            describe_hours(&args(json!(-3))),
            Err(ToolError::InvalidArgument { name: "hours", .. })
        ));
        let err = describe_hours(&args(json!(true))).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArgument { name: "hours", .. }));
        assert!(!err.to_string().contains("required"));
    }

    #[tokio::test]
    async fn test_count_accepts_numeric_hours() {
        let tool = CountRegistrationsTool::new(RegistrationFetcher::new(Arc::new(TwoRecords)));
        let mut args = ToolArgs::new();
        args.insert("hours".into(), json!(24));
        assert_eq!(tool.execute(args).await.unwrap(), r#"{"count":2}"#);
    }

    #[tokio::test]
    async fn test_recent_returns_json_records() {
        let tool = RecentRegistrationsTool::new(RegistrationFetcher::new(Arc::new(TwoRecords)));
        let out = tool.execute(hours("24")).await.unwrap();
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 2);
        assert_eq!(parsed[1]["name"], "n1.base.eth");
    }

    #[tokio::test]
    async fn test_count_returns_json_count() {
        let tool = CountRegistrationsTool::new(RegistrationFetcher::new(Arc::new(TwoRecords)));
        let out = tool.execute(hours("1")).await.unwrap();
        assert_eq!(out, r#"{"count":2}"#);
    }

    #[tokio::test]
    async fn test_non_numeric_hours_is_an_error() {
        let tool = CountRegistrationsTool::new(RegistrationFetcher::new(Arc::new(TwoRecords)));
        let err = tool.execute(hours("-1")).await.unwrap_err();
        assert!(err.to_string().contains("hours"));
    }

    #[tokio::test]
    async fn test_upstream_failure_is_an_error_in_both_tools() {
        let fetcher = RegistrationFetcher::new(Arc::new(Down));
        let recent = RecentRegistrationsTool::new(fetcher.clone());
        let count = CountRegistrationsTool::new(fetcher);

        assert!(matches!(recent.execute(hours("2")).await, Err(ToolError::Upstream(_))));
        assert!(matches!(count.execute(hours("2")).await, Err(ToolError::Upstream(_))));
    }
}
