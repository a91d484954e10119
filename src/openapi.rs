use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    errors::ErrorResponse,
    handlers::{health, payment_webhooks, payments},
    models::{ItemType, OrderStatus},
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        payments::open_order,
        payments::get_order,
        payments::verify_order,
        payment_webhooks::handle_payment_webhook,
    ),
    components(schemas(
        ErrorResponse,
        ItemType,
        OrderStatus,
        health::HealthResponse,
        payments::OpenOrderRequest,
        payments::OpenOrderResponse,
        payments::OrderResponse,
        payments::SubscriptionSummary,
        payments::VerifyOrderResponse,
    )),
    tags(
        (name = "payments", description = "Payment order lifecycle"),
        (name = "webhooks", description = "Gateway webhook intake"),
        (name = "health", description = "Service health")
    ),
    modifiers(&SecurityAddon),
    info(
        title = "CoursePay API",
        description = "Payment order lifecycle service: order creation, gateway reconciliation and exactly-once fulfillment"
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
}
