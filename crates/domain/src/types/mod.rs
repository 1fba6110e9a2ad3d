//! Domain types and models

pub mod catalog;
pub mod cursor;
pub mod dto;
pub mod event;
pub mod failure;
pub mod request;
pub mod run;
pub mod task;

pub use catalog::{CatalogProduct, CatalogVariant};
pub use cursor::SyncCursor;
pub use dto::{
    AttributeDto, CategoryDto, OrderAddressDto, OrderCreateDto, OrderDto, OrderItemDto,
    OrderShipmentDto, OrderSubmissionResult, Page, PageMeta, ProductDto, VariantDto,
};
pub use event::{EventLevel, EventType, IntegrationEvent, SkipReason};
pub use failure::{Failure, FailureContext};
pub use request::{Driver, ExternalRequestRecord, RequestOutcome};
pub use run::{RunStatus, SyncRun};
pub use task::{MutationTask, PriceUpdate, StockUpdate};

/// Generate an opaque identifier that sorts by creation time.
pub fn new_record_id() -> String {
    uuid::Uuid::now_v7().to_string()
}
