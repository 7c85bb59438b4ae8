//! Routes a chat message to exactly one intent handler.
//!
//! [`INTENT_RULES`] pairs each keyword predicate with the handler it selects.
//! Rules are tried in order and the first match wins; a message no rule
//! claims goes to the general handler. Adding an intent means adding a row.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::completion::Completion;
use crate::error::ChatbotError;
use crate::handlers::{ProductCatalog, add_item_request, answer_general_query, check_dietary_info, check_stock};
use crate::intent::Intent;

/// What a handler gets to work with for one message.
#[derive(Clone, Copy)]
pub struct HandlerContext<'a> {
    pub catalog: &'a dyn ProductCatalog,
    pub completion: &'a dyn Completion,
    /// The message lower-cased, as the keyword predicates saw it.
    pub lowered: &'a str,
    /// The message exactly as sent.
    pub message: &'a str,
}

pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<String, ChatbotError>> + Send + 'a>>;
pub type Handler = for<'a> fn(HandlerContext<'a>) -> HandlerFuture<'a>;

/// One row of the dispatch table.
pub struct IntentRule {
    pub intent: Intent,
    pub matches: fn(&str) -> bool,
    pub handler: Handler,
}

fn dietary(cx: HandlerContext<'_>) -> HandlerFuture<'_> {
    Box::pin(check_dietary_info(cx.catalog, cx.lowered))
}

fn stock(cx: HandlerContext<'_>) -> HandlerFuture<'_> {
    Box::pin(check_stock(cx.catalog, cx.lowered))
}

fn request(cx: HandlerContext<'_>) -> HandlerFuture<'_> {
    Box::pin(add_item_request(cx.catalog, cx.lowered))
}

fn general(cx: HandlerContext<'_>) -> HandlerFuture<'_> {
    Box::pin(answer_general_query(cx.completion, cx.message))
}

/// Priority-ordered dispatch table.
pub static INTENT_RULES: [IntentRule; 3] = [
    IntentRule {
        intent: Intent::DietaryInfo,
        matches: |m| Intent::DietaryInfo.matches(m),
        handler: dietary,
    },
    IntentRule {
        intent: Intent::StockCheck,
        matches: |m| Intent::StockCheck.matches(m),
        handler: stock,
    },
    IntentRule {
        intent: Intent::ItemRequest,
        matches: |m| Intent::ItemRequest.matches(m),
        handler: request,
    },
];

static GENERAL_RULE: IntentRule = IntentRule {
    intent: Intent::GeneralQuery,
    matches: |_| true,
    handler: general,
};

/// The first rule whose predicate accepts the lower-cased `message`, or the
/// general fallback.
#[must_use]
pub fn select_rule(message: &str) -> &'static IntentRule {
    INTENT_RULES
        .iter()
        .find(|rule| (rule.matches)(message))
        .unwrap_or(&GENERAL_RULE)
}

pub struct IntentRouter {
    catalog: Arc<dyn ProductCatalog>,
    completion: Arc<dyn Completion>,
}

impl IntentRouter {
    #[must_use]
    pub fn new(
        catalog: Arc<dyn ProductCatalog>,
        completion: Arc<dyn Completion>,
    ) -> Self {
        Self { catalog, completion }
    }

    /// Classifies `message` and runs the matching handler, keeping the failure
    /// cause visible.
    ///
    /// Catalog handlers see the lower-cased text; the general fallback gets
    /// the message exactly as sent.
    pub async fn dispatch(
        &self,
        message: &str,
    ) -> (Intent, Result<String, ChatbotError>) {
        let lowered = message.to_lowercase();
        let rule = select_rule(&lowered);
        tracing::info!("Routing message to {}", rule.intent);

        let cx = HandlerContext {
            catalog: self.catalog.as_ref(),
            completion: self.completion.as_ref(),
            lowered: &lowered,
            message,
        };
        let result = (rule.handler)(cx).await;

        (rule.intent, result)
    }

    /// Produces the reply text. Never fails: a handler error becomes that
    /// intent's apology.
    pub async fn route(
        &self,
        message: &str,
    ) -> String {
        match self.dispatch(message).await {
            (_, Ok(reply)) => reply,
            (intent, Err(e)) => {
                tracing::error!("{} handler failed: {}", intent, e);
                intent.apology().to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::Product;
    use crate::testing::{FakeCatalog, FakeCompletion};
    use chrono::Utc;

    fn quinoa(quantity: i32) -> Product {
        Product {
            name: "Quinoa".to_string(),
            vegan: true,
            gluten_free: true,
            quantity,
        }
    }

    fn router(
        catalog: Arc<FakeCatalog>,
        completion: Arc<FakeCompletion>,
    ) -> IntentRouter {
        IntentRouter::new(catalog, completion)
    }

    #[test]
    fn test_rule_table_priority_order() {
        let order: Vec<Intent> = INTENT_RULES.iter().map(|r| r.intent).collect();
        assert_eq!(order, vec![Intent::DietaryInfo, Intent::StockCheck, Intent::ItemRequest]);
        assert_eq!(select_rule("what time do you open").intent, Intent::GeneralQuery);
    }

    #[tokio::test]
    async fn test_rule_carries_its_handler() {
        let catalog = FakeCatalog::with_products(vec![quinoa(3)]);
        let completion = FakeCompletion::replying(&["Lentils are legumes."]);
        let cx = |lowered: &'static str| HandlerContext {
            catalog: &catalog,
            completion: &completion,
            lowered,
            message: lowered,
        };

        let stock = select_rule("is quinoa in stock");
        assert_eq!((stock.handler)(cx("is quinoa in stock")).await.unwrap(), "Quinoa is in stock with 3 units available.");

        let request = select_rule("request oat milk");
        assert_eq!((request.handler)(cx("request oat milk")).await.unwrap(), "Your request for 'oat milk' has been recorded.");
        assert_eq!(catalog.requests().len(), 1);

        let general = select_rule("what are lentils");
        assert_eq!((general.handler)(cx("what are lentils")).await.unwrap(), "Lentils are legumes.");
        assert_eq!(completion.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_dietary_scenario() {
        let catalog = Arc::new(FakeCatalog::with_products(vec![quinoa(5)]));
        let router = router(catalog, Arc::new(FakeCompletion::default()));

        assert_eq!(router.route("is quinoa vegan").await, "Quinoa is vegan, gluten-free.");
        assert_eq!(router.route("Is QUINOA Vegan?").await, "Quinoa is vegan, gluten-free.");
    }

    #[tokio::test]
    async fn test_dietary_miss_scenario() {
        let catalog = Arc::new(FakeCatalog::with_products(vec![quinoa(5)]));
        let router = router(catalog, Arc::new(FakeCompletion::default()));

        assert_eq!(router.route("is kale vegan").await, "No dietary information found for 'kale'.");
    }

    #[tokio::test]
    async fn test_stock_scenario() {
        let catalog = Arc::new(FakeCatalog::with_products(vec![quinoa(0)]));
        let router = router(catalog, Arc::new(FakeCompletion::default()));

        assert_eq!(
            router.route("is quinoa in stock").await,
            "Quinoa is out of stock with 0 units available."
        );
    }

    #[tokio::test]
    async fn test_request_scenario_inserts_one_row() {
        let catalog = Arc::new(FakeCatalog::default());
        let router = router(catalog.clone(), Arc::new(FakeCompletion::default()));
        let before = Utc::now();

        let reply = router.route("request almond milk").await;
        assert_eq!(reply, "Your request for 'almond milk' has been recorded.");

        let requests = catalog.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].item_name, "almond milk");
        assert!(requests[0].request_date >= before);
    }

    #[tokio::test]
    async fn test_unmatched_message_goes_to_model_verbatim() {
        let completion = Arc::new(FakeCompletion::replying(&["  Lentils are legumes.  "]));
        let catalog = Arc::new(FakeCatalog::default());
        let router = router(catalog.clone(), completion.clone());

        let reply = router.route("What are Lentils?").await;
        assert_eq!(reply, "Lentils are legumes.");

        let calls = completion.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0[0].content, "Answer this query: What are Lentils?");
        assert!(catalog.lookups().is_empty());
        assert!(catalog.requests().is_empty());
    }

    #[tokio::test]
    async fn test_dietary_wins_over_stock_and_request() {
        let catalog = Arc::new(FakeCatalog::with_products(vec![quinoa(0)]));
        let router = router(catalog.clone(), Arc::new(FakeCompletion::default()));

        let (intent, _) = router.dispatch("request vegan quinoa in stock").await;
        assert_eq!(intent, Intent::DietaryInfo);
        assert!(catalog.requests().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_exposes_failure_cause() {
        let catalog = Arc::new(FakeCatalog::failing(ChatbotError::connection("db down")));
        let router = router(catalog, Arc::new(FakeCompletion::default()));

        let (intent, result) = router.dispatch("is quinoa in stock").await;
        assert_eq!(intent, Intent::StockCheck);
        assert_eq!(result.unwrap_err(), ChatbotError::connection("db down"));
    }

    #[tokio::test]
    async fn test_route_converts_failures_to_apologies() {
        let catalog = Arc::new(FakeCatalog::failing(ChatbotError::execution("relation does not exist")));
        let completion = Arc::new(FakeCompletion::failing(ChatbotError::completion("quota")));
        let router = router(catalog, completion);

        assert_eq!(router.route("is tofu vegan").await, Intent::DietaryInfo.apology());
        assert_eq!(router.route("is tofu in stock").await, Intent::StockCheck.apology());
        assert_eq!(router.route("request tofu").await, Intent::ItemRequest.apology());
        assert_eq!(router.route("hello there").await, Intent::GeneralQuery.apology());
    }
}
