//! Default sales-qualification flow.
//!
//! welcome -> name/email capture -> product questions -> demo booking -> farewell,
//! with product questions reachable from most nodes so the visitor can
//! branch off at any time.

use super::context::WellKnownKey;
use super::errors::GraphError;
use super::graph::{NodeGraph, NodeGraphBuilder};
use super::handler::HandlerBinding;
use super::node::Node;

pub const WELCOME: &str = "welcome";
pub const COLLECT_NAME: &str = "collect_name";
pub const COLLECT_EMAIL: &str = "collect_email";
pub const PRODUCT_QUESTION: &str = "product_question";
pub const PRODUCT_SELECTION: &str = "product_selection";
pub const SCHEDULE_DEMO: &str = "schedule_demo";
pub const FAREWELL: &str = "farewell";

/// Node definitions of the sales flow without handlers bound.
pub fn sales_flow_builder() -> NodeGraphBuilder {
    NodeGraph::builder()
        .node(
            Node::new(
                WELCOME,
                "Greet the visitor and find out who they are",
                "Hi there! Welcome. I'm here to help you find the right product. May I have your name?",
            )
            .leads_to(COLLECT_NAME)
            .leads_to(COLLECT_EMAIL)
            .leads_to(PRODUCT_QUESTION),
        )
        .node(
            Node::new(
                COLLECT_NAME,
                "Ask for the visitor's name",
                "Before we go on, what should I call you?",
            )
            .leads_to(COLLECT_EMAIL)
            .leads_to(PRODUCT_QUESTION),
        )
        .node(
            Node::new(
                COLLECT_EMAIL,
                "Ask for the visitor's email address",
                "Nice to meet you, {{name}}! What's the best email to reach you at?",
            )
            .requires_key(WellKnownKey::Name)
            .leads_to(PRODUCT_SELECTION)
            .leads_to(PRODUCT_QUESTION),
        )
        .node(
            Node::new(
                PRODUCT_QUESTION,
                "Answer a question about the products",
                "Happy to help. What would you like to know about our products?",
            )
            .leads_to(PRODUCT_SELECTION)
            .leads_to(SCHEDULE_DEMO)
            .leads_to(PRODUCT_QUESTION)
            .leads_to(COLLECT_EMAIL),
        )
        .node(
            Node::new(
                PRODUCT_SELECTION,
                "Help the visitor pick a product",
                "Which product are you most interested in, {{name}}?",
            )
            .requires_key(WellKnownKey::Email)
            .leads_to(SCHEDULE_DEMO)
            .leads_to(PRODUCT_QUESTION),
        )
        .node(
            Node::new(
                SCHEDULE_DEMO,
                "Book a product demo",
                "Great choice! Let's get a {{productChoice}} demo on the calendar for you.",
            )
            .requires_key(WellKnownKey::Name)
            .requires_key(WellKnownKey::Email)
            .requires_key(WellKnownKey::ProductChoice)
            .leads_to(FAREWELL)
            .leads_to(PRODUCT_QUESTION),
        )
        .node(
            Node::new(
                FAREWELL,
                "Wrap up the conversation",
                "Thanks {{name}}! We'll be in touch at {{email}}. Anything else I can help with?",
            )
            .leads_to(PRODUCT_QUESTION)
            .leads_to(WELCOME),
        )
}

/// The sales flow with the demo booking handler bound to `schedule_demo`.
pub fn sales_flow(demo_handler: HandlerBinding) -> Result<NodeGraph, GraphError> {
    sales_flow_builder()
        .bind_handler(SCHEDULE_DEMO, demo_handler)
        .build()
}
