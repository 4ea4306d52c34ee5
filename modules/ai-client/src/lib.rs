pub mod claude;
pub mod schema;
pub(crate) mod wire;

pub use claude::Claude;
pub use schema::StructuredOutput;
