//! In-memory execution layer used by `gqlwire serve`.
//!
//! Stands in for a real schema over a fixed library of books and authors.
//! Selection sets are not evaluated; every matched root field returns the
//! whole record.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use gqlwire_runtime::{
    ExecutionOutcome, ExecutionResult, GraphQLError, IncrementalChunk, OperationKind,
    ProducerError, ResultStream,
};
use gqlwire_sdk::{Executor, GraphQLRequest};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::debug;

struct Author {
    id: &'static str,
    name: &'static str,
}

struct Book {
    id: &'static str,
    title: &'static str,
    author_id: &'static str,
}

const AUTHORS: &[Author] = &[
    Author {
        id: "1",
        name: "Ursula K. Le Guin",
    },
    Author {
        id: "2",
        name: "Octavia E. Butler",
    },
];

const BOOKS: &[Book] = &[
    Book {
        id: "1",
        title: "The Dispossessed",
        author_id: "1",
    },
    Book {
        id: "2",
        title: "A Wizard of Earthsea",
        author_id: "1",
    },
    Book {
        id: "3",
        title: "Kindred",
        author_id: "2",
    },
];

fn author_json(author: &Author) -> Value {
    json!({ "id": author.id, "name": author.name })
}

fn author_of(book: &Book) -> Value {
    AUTHORS
        .iter()
        .find(|a| a.id == book.author_id)
        .map_or(Value::Null, author_json)
}

fn book_json(book: &Book) -> Value {
    json!({ "id": book.id, "title": book.title, "author": author_of(book) })
}

/// Demo executor over the built-in library.
///
/// - `subscription { clock }` ticks `T1`, `T2`, ... every `tick`
/// - `@stream` on `getBooks` sends one book per part
/// - `@defer` sends a book first and its author afterwards
/// - `getBooks` / `getAuthors` answer in a single response
#[derive(Debug, Clone)]
pub struct DemoExecutor {
    tick: Duration,
}

impl Default for DemoExecutor {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl DemoExecutor {
    /// Creates an executor whose clock ticks every `tick`.
    pub fn new(tick: Duration) -> Self {
        Self { tick }
    }

    fn query(query: &str) -> ExecutionOutcome {
        let mut data = serde_json::Map::new();
        if query.contains("getBooks") {
            data.insert(
                "getBooks".into(),
                BOOKS.iter().map(book_json).collect::<Vec<_>>().into(),
            );
        }
        if query.contains("getAuthors") {
            data.insert(
                "getAuthors".into(),
                AUTHORS.iter().map(author_json).collect::<Vec<_>>().into(),
            );
        }

        if data.is_empty() {
            return rejected(
                VALIDATION_FAILED,
                "Cannot query field: expected getBooks or getAuthors.",
            );
        }
        ExecutionOutcome::Response(ExecutionResult::data(Value::Object(data)))
    }

    fn clock(&self) -> ResultStream<ExecutionResult> {
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        stream::unfold((interval, 0u64), |(mut interval, n)| async move {
            interval.tick().await;
            let n = n + 1;
            let tick = ExecutionResult::data(json!({ "clock": format!("T{}", n) }));
            Some((Ok(tick), (interval, n)))
        })
        .boxed()
    }

    fn stream_books() -> ResultStream<IncrementalChunk> {
        let initial = IncrementalChunk::initial(json!({ "getBooks": [] }));
        let last = BOOKS.len() - 1;
        let items = BOOKS.iter().enumerate().map(move |(i, book)| {
            let chunk = IncrementalChunk::builder(json!([book_json(book)]))
                .at_field("getBooks")
                .at_index(i)
                .label("getBooks");
            let chunk = if i < last { chunk.has_next() } else { chunk.last() };
            Ok::<_, ProducerError>(chunk.build())
        });

        stream::iter(std::iter::once(Ok(initial)).chain(items)).boxed()
    }

    fn defer_author(&self) -> ResultStream<IncrementalChunk> {
        let book = &BOOKS[0];
        let initial = IncrementalChunk::initial(json!({
            "getBook": { "id": book.id, "title": book.title }
        }));
        let delay = self.tick;
        let deferred = async move {
            tokio::time::sleep(delay).await;
            Ok(IncrementalChunk::builder(json!({ "author": author_of(book) }))
                .at_field("getBook")
                .label("author")
                .last()
                .build())
        };

        stream::iter([Ok(initial)])
            .chain(stream::once(deferred))
            .boxed()
    }
}

#[async_trait]
impl Executor for DemoExecutor {
    async fn execute(&self, request: GraphQLRequest) -> ExecutionOutcome {
        if let Err(message) = check_syntax(&request.query) {
            debug!(%message, "rejecting document");
            return rejected(PARSE_FAILED, &message);
        }

        match request.operation_kind() {
            OperationKind::Subscription => ExecutionOutcome::Subscription(self.clock()),
            OperationKind::Mutation => rejected(VALIDATION_FAILED, "Mutations are not supported."),
            OperationKind::Query if request.query.contains("@stream") => {
                ExecutionOutcome::Incremental(Self::stream_books())
            }
            OperationKind::Query if request.query.contains("@defer") => {
                ExecutionOutcome::Incremental(self.defer_author())
            }
            OperationKind::Query => Self::query(&request.query),
        }
    }
}

const PARSE_FAILED: &str = "GRAPHQL_PARSE_FAILED";
const VALIDATION_FAILED: &str = "GRAPHQL_VALIDATION_FAILED";

fn rejected(code: &str, message: &str) -> ExecutionOutcome {
    let error = GraphQLError::new(message).with_extension("code", json!(code));
    ExecutionOutcome::Rejected {
        status: 400,
        result: ExecutionResult::error(error),
    }
}

/// Shallow syntax check: a non-empty document with balanced braces.
fn check_syntax(query: &str) -> Result<(), String> {
    if query.trim().is_empty() {
        return Err("Syntax Error: Unexpected <EOF>.".to_string());
    }

    let mut depth = 0usize;
    for c in query.chars() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| "Syntax Error: Unexpected \"}\".".to_string())?;
            }
            _ => {}
        }
    }

    if depth > 0 {
        return Err("Syntax Error: Expected \"}\", found <EOF>.".to_string());
    }
    Ok(())
}
