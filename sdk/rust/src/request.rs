//! GraphQL request parameters for GET and POST.

use crate::error::{ErrorCode, ResultExt, SdkError, SdkResult};
use gqlwire_runtime::OperationKind;
use serde::Deserialize;

/// Parameters of a GraphQL request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GraphQLRequest {
    pub query: String,
    #[serde(default)]
    pub variables: Option<serde_json::Value>,
    #[serde(default, rename = "operationName")]
    pub operation_name: Option<String>,
}

impl GraphQLRequest {
    /// Creates a request for the given document.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            variables: None,
            operation_name: None,
        }
    }

    /// Parses a POST body.
    pub fn from_json_body(body: &[u8]) -> SdkResult<Self> {
        let request: Self =
            serde_json::from_slice(body).map_sdk_err_with(ErrorCode::ParseError, "Invalid JSON")?;
        if request.query.trim().is_empty() {
            return Err(SdkError::bad_request("Must provide query string."));
        }
        Ok(request)
    }

    /// Parses GET query parameters.
    ///
    /// Returns `Ok(None)` when no `query` parameter is present.
    pub fn from_query_string(raw: &str) -> SdkResult<Option<Self>> {
        let mut query = None;
        let mut variables = None;
        let mut operation_name = None;

        for pair in raw.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let value = decode_component(value)?;
            match key {
                "query" => query = Some(value),
                "variables" if !value.is_empty() => {
                    let parsed = serde_json::from_str(&value)
                        .map_sdk_err_with(ErrorCode::DeserializeError, "Variables are invalid JSON")?;
                    variables = Some(parsed);
                }
                "operationName" if !value.is_empty() => operation_name = Some(value),
                _ => {}
            }
        }

        Ok(query
            .filter(|q| !q.trim().is_empty())
            .map(|query| Self {
                query,
                variables,
                operation_name,
            }))
    }

    /// Detects the operation kind from the leading keyword of the document.
    ///
    /// Shorthand queries (`{ ... }`) and anonymous documents are queries.
    pub fn operation_kind(&self) -> OperationKind {
        let keyword = self
            .query
            .lines()
            .map(|line| line.split('#').next().unwrap_or_default().trim())
            .find(|line| !line.is_empty())
            .and_then(|line| line.split(|c: char| !c.is_alphanumeric()).next())
            .unwrap_or_default();

        match keyword {
            "subscription" => OperationKind::Subscription,
            "mutation" => OperationKind::Mutation,
            _ => OperationKind::Query,
        }
    }
}

fn decode_component(value: &str) -> SdkResult<String> {
    let spaced = value.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .map_err(|e| SdkError::bad_request(format!("Invalid query string: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_body() {
        let body = br#"{"query":"{ books { title } }","variables":{"id":"1"},"operationName":"Books"}"#;
        let request = GraphQLRequest::from_json_body(body).unwrap();
        assert_eq!(request.query, "{ books { title } }");
        assert_eq!(request.variables, Some(serde_json::json!({"id": "1"})));
        assert_eq!(request.operation_name.as_deref(), Some("Books"));
    }

    #[test]
    fn test_json_body_errors() {
        let err = GraphQLRequest::from_json_body(b"{not json").unwrap_err();
        assert_eq!(err.code, ErrorCode::ParseError);

        let err = GraphQLRequest::from_json_body(br#"{"query":"  "}"#).unwrap_err();
        assert_eq!(err.message, "Must provide query string.");
    }

    #[test]
    fn test_query_string() {
        let raw = "query=query%20Books%20%7B%20books%20%7B%20title%20%7D%20%7D&variables=%7B%22first%22%3A2%7D&operationName=Books";
        let request = GraphQLRequest::from_query_string(raw).unwrap().unwrap();
        assert_eq!(request.query, "query Books { books { title } }");
        assert_eq!(request.variables, Some(serde_json::json!({"first": 2})));
        assert_eq!(request.operation_name.as_deref(), Some("Books"));
    }

    #[test]
    fn test_query_string_plus_is_space() {
        let request = GraphQLRequest::from_query_string("query=%7B+books+%7D")
            .unwrap()
            .unwrap();
        assert_eq!(request.query, "{ books }");
    }

    #[test]
    fn test_query_string_without_query() {
        assert!(GraphQLRequest::from_query_string("").unwrap().is_none());
        assert!(GraphQLRequest::from_query_string("operationName=X").unwrap().is_none());
    }

    #[test]
    fn test_query_string_bad_variables() {
        let err = GraphQLRequest::from_query_string("query=%7Bx%7D&variables=%7B").unwrap_err();
        assert_eq!(err.code, ErrorCode::DeserializeError);
        assert_eq!(err.code.http_status(), 400);
    }

    #[test]
    fn test_operation_kind() {
        assert_eq!(
            GraphQLRequest::new("subscription { clock }").operation_kind(),
            OperationKind::Subscription
        );
        assert_eq!(
            GraphQLRequest::new("# add one\nmutation Add { addBook }").operation_kind(),
            OperationKind::Mutation
        );
        assert_eq!(
            GraphQLRequest::new("{ books { title } }").operation_kind(),
            OperationKind::Query
        );
        assert_eq!(
            GraphQLRequest::new("query Q { books }").operation_kind(),
            OperationKind::Query
        );
    }
}
