//! In-memory stand-ins for the database and the language model.

use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgConnectOptions;

use crate::chat::ChatMessage;
use crate::completion::{Completion, CompletionOptions};
use crate::db::PgConnectionProvider;
use crate::error::ChatbotError;
use crate::executor::{QueryExecutor, QueryResult};
use crate::handlers::{ItemRequest, Product, ProductCatalog};
use crate::schema::{Schema, SchemaIntrospector};

#[derive(Default)]
pub struct FakeCatalog {
    products: Vec<Product>,
    requests: Mutex<Vec<ItemRequest>>,
    lookups: Mutex<Vec<String>>,
    failure: Option<ChatbotError>,
}

impl FakeCatalog {
    pub fn with_products(products: Vec<Product>) -> Self {
        Self {
            products,
            ..Self::default()
        }
    }

    pub fn failing(err: ChatbotError) -> Self {
        Self {
            failure: Some(err),
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<ItemRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProductCatalog for FakeCatalog {
    async fn find_product(
        &self,
        fragment: &str,
    ) -> Result<Option<Product>, ChatbotError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        self.lookups.lock().unwrap().push(fragment.to_string());

        let needle = fragment.to_lowercase();
        Ok(self
            .products
            .iter()
            .find(|p| p.name.to_lowercase().contains(&needle))
            .cloned())
    }

    async fn record_request(
        &self,
        item_name: &str,
    ) -> Result<ItemRequest, ChatbotError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }

        let mut requests = self.requests.lock().unwrap();
        let request = ItemRequest {
            request_id: i64::try_from(requests.len()).unwrap() + 1,
            item_name: item_name.to_string(),
            request_date: Utc::now(),
        };
        requests.push(request.clone());
        Ok(request)
    }
}

/// Replays scripted replies in order and records every prompt it receives.
#[derive(Default)]
pub struct FakeCompletion {
    replies: Mutex<VecDeque<Result<String, ChatbotError>>>,
    calls: Mutex<Vec<(Vec<ChatMessage>, CompletionOptions)>>,
}

impl FakeCompletion {
    pub fn replying(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| Ok((*r).to_string())).collect()),
            ..Self::default()
        }
    }

    pub fn failing(err: ChatbotError) -> Self {
        Self {
            replies: Mutex::new(VecDeque::from([Err(err)])),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(Vec<ChatMessage>, CompletionOptions)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Completion for FakeCompletion {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: CompletionOptions,
    ) -> Result<String, ChatbotError> {
        self.calls.lock().unwrap().push((messages.to_vec(), options));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ChatbotError::completion("no scripted reply left")))
    }
}

pub struct FakeIntrospector(pub Result<Schema, ChatbotError>);

#[async_trait]
impl SchemaIntrospector for FakeIntrospector {
    async fn describe_schema(&self) -> Result<Schema, ChatbotError> {
        self.0.clone()
    }
}

/// Returns a fixed result and remembers the SQL it was asked to run.
pub struct FakeExecutor {
    result: Result<QueryResult, ChatbotError>,
    executed: Mutex<Vec<String>>,
}

impl FakeExecutor {
    pub fn returning(result: Result<QueryResult, ChatbotError>) -> Self {
        Self {
            result,
            executed: Mutex::new(Vec::new()),
        }
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryExecutor for FakeExecutor {
    async fn execute(
        &self,
        sql: &str,
    ) -> Result<QueryResult, ChatbotError> {
        self.executed.lock().unwrap().push(sql.to_string());
        self.result.clone()
    }
}

/// A live database for the `#[ignore]` integration tests, from `DATABASE_URL`.
///
/// The pool holds a single connection, so temporary tables created through
/// it stay visible to every component sharing the provider. Release any
/// connection acquired for setup before calling a component.
pub fn test_database() -> Option<Arc<PgConnectionProvider>> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let options = PgConnectOptions::from_str(&url).expect("DATABASE_URL is not a valid Postgres URL");
    Some(Arc::new(PgConnectionProvider::new(options, 1, Duration::from_secs(10))))
}
