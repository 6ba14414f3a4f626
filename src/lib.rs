//! Switchboard - Request Router
//!
//! A privacy-first request router for a fully local conversational assistant.
//! Every user message is classified on the local machine and mapped to a
//! `RoutingDecision` that tells the orchestrator how to prepare the reply.
//!
//! # Overview
//!
//! This crate provides the complete routing pipeline, including:
//! - Guardrail filtering with a privacy unlock phrase and blocked content patterns
//! - A versioned LRU decision cache with per-intent TTLs
//! - Semantic intent matching against a learned example corpus
//! - LLM classification through a local model server with schema-constrained output
//! - A lexical fallback that always produces a decision when everything else fails
//! - Shadow evaluation and append-only trace recording, both out of band
//!
//! # Quick Start
//!
//! ```rust
//! use switchboard::decision::{
//!     Classification, ComplexityTier, ConfidenceScore, IntentLabel, ResolverStage, ToolCategory,
//! };
//! use switchboard::policy::PolicySynthesizer;
//! use switchboard::request::RouteRequest;
//!
//! // One incoming message; stages key off its normalized form
//! let request = RouteRequest::new("Напиши функцию сортировки на Rust");
//! assert_eq!(request.normalized(), "напиши функцию сортировки на rust");
//!
//! // A classification as the semantic matcher would produce it
//! let classification = Classification {
//!     intent: IntentLabel::Coding,
//!     complexity: ComplexityTier::Medium,
//!     confidence: ConfidenceScore::new(0.94),
//!     resolved_by: ResolverStage::Semantic,
//! };
//!
//! // Policy synthesis is a pure mapping from classification to decision
//! let decision = PolicySynthesizer::new().synthesize(&classification);
//! assert_eq!(decision.temperature, 0.3);
//! assert!(decision.allows_tool(ToolCategory::FileSystem));
//! assert!(decision.allows_tool(ToolCategory::Shell));
//! assert!(!decision.requires_confirmation);
//!
//! // Decisions serialize to JSON for the orchestrator
//! let json = serde_json::to_string(&decision).unwrap();
//! assert!(json.contains("\"intent\":\"coding\""));
//! ```
//!
//! The full pipeline lives behind [`router::RequestRouter`], which wires the
//! stages together and owns the cache, the corpus, and the trace log.

pub mod cache;
pub mod classifier;
pub mod config;
pub mod corpus;
pub mod decision;
pub mod embedding;
pub mod error;
pub mod guardrail;
pub mod llm;
pub mod observability;
pub mod policy;
pub mod request;
pub mod router;
pub mod semantic;
pub mod shadow;
pub mod testing;
pub mod trace;
pub mod version;

// Re-export the types callers touch on every request
pub use config::*;
pub use decision::{
    Classification, ComplexityTier, ConfidenceScore, ContextWindowClass, IntentLabel,
    ResolverStage, RoutingDecision, StreamingMode, ToolCategory,
};
pub use error::{RouterError, RouterResult};
pub use policy::PolicySynthesizer;
pub use request::{RequestDigest, RouteRequest};
pub use router::RequestRouter;
pub use trace::TraceFeedback;
