//! Provider abstractions and clients for embeddings, LLMs and vector storage
//!
//! The traits are the seams the pipeline is written against; the concrete
//! clients talk to Gemini, a local Ollama runtime and Milvus.

pub mod embedding;
pub mod gemini;
pub mod llm;
pub mod milvus;
pub mod ollama;
pub mod vector_store;

pub use embedding::Embedder;
pub use gemini::GeminiBackend;
pub use llm::{LlmBackend, ProviderError, ProviderErrorKind};
pub use milvus::MilvusClient;
pub use ollama::{OllamaBackend, OllamaEmbedder};
pub use vector_store::{CollectionSampler, PageFetcher, VectorStore};
