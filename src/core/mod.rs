//! Core module containing the record model and the source abstraction

pub mod error;
pub mod field;
pub mod filter;
pub mod query;
pub mod sort;
pub mod source;
pub mod user;

pub use error::{CacheError, CacheResult, ErrorResponse};
pub use field::FieldValue;
pub use filter::{CompiledFilter, FilterCriteria};
pub use query::{Page, PageRequest, PaginatedUsers, PaginationMeta, UsersResponse};
pub use sort::{SortConfig, SortDirection};
pub use source::{RecordSource, SourceCapabilities};
pub use user::{User, UserField, UserPatch};
