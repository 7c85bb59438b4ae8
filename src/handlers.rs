//! Intent handlers: three backed by the product catalog, one by the model.
//!
//! Each handler returns `Result<String, ChatbotError>`; turning a failure into
//! an apology is the router's job.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::ChatMessage;
use crate::completion::{Completion, CompletionOptions};
use crate::db::{PgConnectionProvider, with_timeout};
use crate::error::ChatbotError;
use crate::intent::{Intent, extract_entity};
use crate::template::TemplateEngine;

/// Sampling for free-form answers; looser than SQL generation.
pub const GENERAL_TEMPERATURE: f64 = 0.7;
pub const GENERAL_MAX_TOKENS: u32 = 150;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub name: String,
    pub vegan: bool,
    pub gluten_free: bool,
    pub quantity: i32,
}

/// A row of the request log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ItemRequest {
    pub request_id: i64,
    pub item_name: String,
    pub request_date: DateTime<Utc>,
}

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// First product whose name contains `fragment`, ignoring case.
    async fn find_product(
        &self,
        fragment: &str,
    ) -> Result<Option<Product>, ChatbotError>;

    /// Appends to the request log and commits.
    async fn record_request(
        &self,
        item_name: &str,
    ) -> Result<ItemRequest, ChatbotError>;
}

pub struct PgProductCatalog {
    provider: Arc<PgConnectionProvider>,
    find_sql: String,
    insert_sql: String,
}

impl PgProductCatalog {
    /// Table names must already be validated identifiers.
    ///
    /// A NULL dietary flag reads as false.
    #[must_use]
    pub fn new(
        provider: Arc<PgConnectionProvider>,
        products_table: &str,
        requests_table: &str,
    ) -> Self {
        Self {
            provider,
            find_sql: format!(
                "SELECT name::text AS name, COALESCE(vegan, false) AS vegan, \
                 COALESCE(gluten_free, false) AS gluten_free, quantity::int AS quantity \
                 FROM {products_table} WHERE name ILIKE $1 LIMIT 1"
            ),
            insert_sql: format!(
                "INSERT INTO {requests_table} (item_name, request_date) VALUES ($1, NOW()) \
                 RETURNING request_id::bigint AS request_id, item_name::text AS item_name, \
                 request_date::timestamptz AS request_date"
            ),
        }
    }
}

#[async_trait]
impl ProductCatalog for PgProductCatalog {
    async fn find_product(
        &self,
        fragment: &str,
    ) -> Result<Option<Product>, ChatbotError> {
        let mut conn = self.provider.acquire().await?;
        let pattern = format!("%{fragment}%");

        with_timeout(self.provider.timeout(), async {
            sqlx::query_as::<_, Product>(&self.find_sql)
                .bind(&pattern)
                .fetch_optional(&mut *conn)
                .await
                .map_err(ChatbotError::from)
        })
        .await
    }

    async fn record_request(
        &self,
        item_name: &str,
    ) -> Result<ItemRequest, ChatbotError> {
        let mut conn = self.provider.acquire().await?;

        // A lone statement outside a transaction commits on success.
        with_timeout(self.provider.timeout(), async {
            sqlx::query_as::<_, ItemRequest>(&self.insert_sql)
                .bind(item_name)
                .fetch_one(&mut *conn)
                .await
                .map_err(ChatbotError::from)
        })
        .await
    }
}

#[must_use]
pub fn format_dietary(product: &Product) -> String {
    let mut dietary_info = Vec::new();
    if product.vegan {
        dietary_info.push("vegan");
    }
    if product.gluten_free {
        dietary_info.push("gluten-free");
    }

    if dietary_info.is_empty() {
        format!("{} is neither vegan nor gluten-free.", product.name)
    } else {
        format!("{} is {}.", product.name, dietary_info.join(", "))
    }
}

#[must_use]
pub fn format_stock(product: &Product) -> String {
    let status = if product.quantity > 0 { "in stock" } else { "out of stock" };
    format!("{} is {status} with {} units available.", product.name, product.quantity)
}

/// # Errors
///
/// Propagates catalog failures.
pub async fn check_dietary_info(
    catalog: &dyn ProductCatalog,
    message: &str,
) -> Result<String, ChatbotError> {
    let item_name = Intent::DietaryInfo.lookup_key(&extract_entity(message));
    tracing::info!("Dietary lookup for '{}'", item_name);

    Ok(match catalog.find_product(&item_name).await? {
        Some(product) => format_dietary(&product),
        None => format!("No dietary information found for '{item_name}'."),
    })
}

/// # Errors
///
/// Propagates catalog failures.
pub async fn check_stock(
    catalog: &dyn ProductCatalog,
    message: &str,
) -> Result<String, ChatbotError> {
    let item_name = Intent::StockCheck.lookup_key(&extract_entity(message));
    tracing::info!("Stock lookup for '{}'", item_name);

    Ok(match catalog.find_product(&item_name).await? {
        Some(product) => format_stock(&product),
        None => format!("No stock information found for '{item_name}'."),
    })
}

/// # Errors
///
/// Propagates catalog failures.
pub async fn add_item_request(
    catalog: &dyn ProductCatalog,
    message: &str,
) -> Result<String, ChatbotError> {
    let item_name = extract_entity(message);
    let request = catalog.record_request(&item_name).await?;
    tracing::info!("Recorded request {} for '{}'", request.request_id, request.item_name);

    Ok(format!("Your request for '{item_name}' has been recorded."))
}

/// Fallback for messages no keyword rule claimed: the model answers directly.
///
/// # Errors
///
/// Propagates completion failures.
pub async fn answer_general_query(
    completion: &dyn Completion,
    message: &str,
) -> Result<String, ChatbotError> {
    let messages = [ChatMessage::user(TemplateEngine::render_general_prompt(message))];
    let options = CompletionOptions::new(GENERAL_TEMPERATURE).with_max_tokens(GENERAL_MAX_TOKENS);

    let answer = completion.complete(&messages, options).await?;
    Ok(answer.trim().to_string())
}
