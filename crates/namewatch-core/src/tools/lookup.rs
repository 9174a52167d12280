//! Text-record lookup for a name or address.

use async_trait::async_trait;
use serde_json::Value;

use super::{single_string_schema, string_arg, Tool, ToolArgs, ToolError};
use crate::lookup::{LookupError, RecordLookup};

pub struct NameRecordsTool {
    lookup: RecordLookup,
}

impl NameRecordsTool {
    pub fn new(lookup: RecordLookup) -> Self {
        Self { lookup }
    }
}

#[async_trait]
impl Tool for NameRecordsTool {
    fn name(&self) -> &str {
        "lookup_name_records"
    }

    fn description(&self) -> &str {
        "Fetch the text records (avatar, description, social handles, addresses) of a \
         registered name such as 'alice.base.eth', or resolve an 0x address to its name. \
         Returns the raw JSON record data."
    }

    fn parameters(&self) -> Value {
        single_string_schema("query", "A name (e.g. alice.base.eth) or a 0x address")
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, ToolError> {
        let query = string_arg(&args, "query")?;
        match self.lookup.lookup(query).await {
            Ok(value) => Ok(value.to_string()),
            Err(LookupError::EmptyQuery) => Err(ToolError::InvalidArgument {
                name: "query",
                reason: "must not be empty".into(),
            }),
            Err(e) => Err(ToolError::Upstream(e.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use reqwest::Client;
    use serde_json::json;

    fn query(q: &str) -> ToolArgs {
        let mut args = ToolArgs::new();
        args.insert("query".into(), Value::String(q.into()));
        args
    }

    #[tokio::test]
    async fn test_returns_serialized_records() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/bob.base.eth");
                then.status(200).json_body(json!({ "description": "gm" }));
            })
            .await;

        let tool = NameRecordsTool::new(RecordLookup::new(Client::new(), &server.base_url()));
        let out = tool.execute(query("bob.base.eth")).await.unwrap();
        assert_eq!(out, r#"{"description":"gm"}"#);
    }

    #[tokio::test]
    async fn test_blank_query_is_invalid() {
        let tool = NameRecordsTool::new(RecordLookup::new(Client::new(), "http://127.0.0.1:9"));
        let err = tool.execute(query(" ")).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArgument { name: "query", .. }));
    }
}
