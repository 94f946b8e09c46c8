pub mod chunking;
pub mod config;
pub mod database;
pub mod document;
pub mod embeddings;
pub mod error;
pub mod events;
pub mod gemini;
pub mod generation;
pub mod openai;
pub mod pptx;
pub mod presentation;
pub mod provider;
pub mod rag;
pub mod retriever;
