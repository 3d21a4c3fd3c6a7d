pub mod accounts;
pub mod analysis_llm;
pub mod kv_pg;
pub mod text_extract;

pub use accounts::KvAccountAdapter;
pub use analysis_llm::OpenAiAnalysisAdapter;
pub use kv_pg::PgKeyValueStore;
pub use text_extract::{DocumentKind, DocumentTextExtractor};
