pub mod content_item;
pub mod metacard;
pub mod operation;
pub mod subject;

pub use content_item::{ContentItem, ItemId};
pub use metacard::{AttributeValue, Metacard};
pub use operation::{
    CatalogRequest, CatalogResponse, CreateRequest, CreateResponse, DeleteRequest, DeleteResponse,
    ItemFault, OperationKind, PropertyBag, PropertyValue, QueryExpression, QueryRequest,
    QueryResponse, ResourceRequest, ResourceResponse, UpdateRequest, UpdateResponse,
};
pub use subject::Subject;
