use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Relocation API",
        description = r#"
Moves ordered stock between bins of one fixed warehouse on the remote
e-commerce platform.

Every relocation is a two-phase document pair on the platform: an issue
document draining the source bins (or the unallocated pool), then a receipt
document filling the destination bin with exactly what was issued.

All `/api/v1` endpoints require the shared secret, passed either as the
`key` query parameter or the `X-App-Key` header.
"#
    ),
    paths(
        handlers::relocations::run_relocation,
        handlers::orders::recent_orders,
        handlers::orders::search_order,
        handlers::inventory::list_products,
        handlers::inventory::inspect_product,
        handlers::inventory::list_locations,
        handlers::inventory::inspect_document,
        handlers::inventory::audit_order,
        handlers::inventory::audit_sku,
        handlers::health::health,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::services::relocation::RelocationSummary,
        crate::services::documents::IssuedLine,
        crate::services::documents::IssueSource,
        crate::services::documents::BatchTag,
        crate::services::documents::LineFailure,
        crate::services::catalog::ResolvedVia,
        handlers::orders::OrderDigest,
        handlers::inventory::ProductSummary,
        handlers::inventory::ProductInspection,
        handlers::inventory::DocumentInspection,
        handlers::inventory::OrderAuditRow,
        handlers::inventory::SkuAuditRow,
        handlers::health::HealthStatus,
        handlers::health::CapabilitiesStatus,
    )),
    tags(
        (name = "relocations", description = "Order-to-bin stock movement"),
        (name = "orders", description = "Order resolution diagnostics"),
        (name = "inventory", description = "Catalog, location and document inspection"),
        (name = "audit", description = "JSON/CSV audit exports"),
        (name = "health", description = "Liveness"),
    )
)]
pub struct ApiDoc;

/// Swagger UI mounted next to the API, serving the generated document.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
}
