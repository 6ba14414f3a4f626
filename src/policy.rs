//! Policy synthesis
//!
//! Turns a [`Classification`] into a full [`RoutingDecision`] through pure
//! lookup tables. No I/O, no clock, no randomness: the same classification
//! always produces the identical decision, which is what makes cached
//! decisions safe to replay.

use crate::decision::{
    Classification, ComplexityTier, ContextWindowClass, IntentLabel, ResolverStage, RoutingDecision,
    StreamingMode, ToolCategory,
};
use std::collections::BTreeSet;

/// Confidence at which a non-fallback system command may skip confirmation
pub const HIGH_STAKES_CONFIDENCE: f32 = 0.92;

/// Fallback-resolved decisions never outlive this many seconds in cache
pub const FALLBACK_TTL_CEILING_SECS: u64 = 60;

/// Pure mapping from classification to routing policy
#[derive(Debug, Default, Clone)]
pub struct PolicySynthesizer;

impl PolicySynthesizer {
    pub fn new() -> Self {
        Self
    }

    pub fn synthesize(&self, classification: &Classification) -> RoutingDecision {
        let intent = &classification.intent;
        let (tools, use_rag) = tool_policy(intent);

        RoutingDecision {
            intent: intent.clone(),
            complexity: classification.complexity,
            confidence: classification.confidence,
            temperature: temperature_for(intent),
            context_window: window_for(classification.complexity),
            tools,
            use_rag,
            cache_ttl_secs: ttl_for(classification),
            streaming: streaming_for(classification),
            requires_confirmation: requires_confirmation(classification),
            resolved_by: classification.resolved_by,
        }
    }
}

fn temperature_for(intent: &IntentLabel) -> f32 {
    match intent {
        IntentLabel::Greeting => 0.8,
        IntentLabel::Conversation | IntentLabel::PrivacyUnlock | IntentLabel::Custom(_) => 0.7,
        IntentLabel::Research => 0.6,
        IntentLabel::Search => 0.5,
        IntentLabel::Coding => 0.3,
        IntentLabel::SystemCommand | IntentLabel::DeleteRequest => 0.2,
        IntentLabel::Blocked => 0.0,
    }
}

fn window_for(complexity: ComplexityTier) -> ContextWindowClass {
    match complexity {
        ComplexityTier::Simple => ContextWindowClass::Compact,
        ComplexityTier::Medium => ContextWindowClass::Standard,
        ComplexityTier::Complex => ContextWindowClass::Extended,
    }
}

fn tool_policy(intent: &IntentLabel) -> (BTreeSet<ToolCategory>, bool) {
    let mut tools = BTreeSet::new();
    let mut use_rag = false;
    match intent {
        IntentLabel::Coding => {
            tools.insert(ToolCategory::FileSystem);
            tools.insert(ToolCategory::Shell);
        }
        IntentLabel::Search => {
            tools.insert(ToolCategory::WebSearch);
        }
        IntentLabel::Research => {
            tools.insert(ToolCategory::WebSearch);
            use_rag = true;
        }
        IntentLabel::SystemCommand => {
            tools.insert(ToolCategory::Shell);
        }
        IntentLabel::DeleteRequest => {
            tools.insert(ToolCategory::FileSystem);
        }
        _ => {}
    }
    (tools, use_rag)
}

// Base TTLs before the fallback ceiling. privacy_unlock is zero: unlock
// transitions must be observed every time, never replayed from cache.
fn base_ttl_secs(intent: &IntentLabel) -> u64 {
    match intent {
        IntentLabel::Greeting => 3600,
        IntentLabel::Coding | IntentLabel::Research => 1800,
        IntentLabel::Search | IntentLabel::Blocked => 600,
        IntentLabel::Conversation
        | IntentLabel::SystemCommand
        | IntentLabel::DeleteRequest
        | IntentLabel::Custom(_) => 300,
        IntentLabel::PrivacyUnlock => 0,
    }
}

fn ttl_for(classification: &Classification) -> u64 {
    let base = base_ttl_secs(&classification.intent);
    if classification.resolved_by == ResolverStage::Fallback {
        base.min(FALLBACK_TTL_CEILING_SECS)
    } else {
        base
    }
}

fn streaming_for(classification: &Classification) -> StreamingMode {
    let conversational = matches!(
        classification.intent,
        IntentLabel::Greeting | IntentLabel::Conversation
    );
    if conversational || classification.complexity == ComplexityTier::Simple {
        StreamingMode::Immediate
    } else {
        StreamingMode::Delayed
    }
}

// The safety floor. A delete request is confirmed no matter how sure any
// stage was; a system command skips confirmation only when a non-fallback
// stage resolved it with high-stakes confidence.
fn requires_confirmation(classification: &Classification) -> bool {
    if classification.intent.is_dangerous()
        && classification.resolved_by == ResolverStage::Fallback
    {
        return true;
    }
    match classification.intent {
        IntentLabel::DeleteRequest => true,
        IntentLabel::SystemCommand => {
            classification.confidence.value() < HIGH_STAKES_CONFIDENCE
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::ConfidenceScore;

    fn classification(
        intent: IntentLabel,
        complexity: ComplexityTier,
        confidence: f32,
        resolved_by: ResolverStage,
    ) -> Classification {
        Classification {
            intent,
            complexity,
            confidence: ConfidenceScore::new(confidence),
            resolved_by,
        }
    }

    #[test]
    fn test_coding_policy() {
        let decision = PolicySynthesizer::new().synthesize(&classification(
            IntentLabel::Coding,
            ComplexityTier::Medium,
            0.95,
            ResolverStage::Semantic,
        ));

        assert!((decision.temperature - 0.3).abs() < f32::EPSILON);
        assert_eq!(decision.context_window, ContextWindowClass::Standard);
        assert!(decision.allows_tool(ToolCategory::FileSystem));
        assert!(decision.allows_tool(ToolCategory::Shell));
        assert!(!decision.allows_tool(ToolCategory::WebSearch));
        assert!(!decision.use_rag);
        assert!(!decision.requires_confirmation);
        assert_eq!(decision.streaming, StreamingMode::Delayed);
        assert_eq!(decision.cache_ttl_secs, 1800);
    }

    #[test]
    fn test_greeting_is_warm_and_streams_immediately() {
        let decision = PolicySynthesizer::new().synthesize(&classification(
            IntentLabel::Greeting,
            ComplexityTier::Simple,
            0.8,
            ResolverStage::Semantic,
        ));

        assert!((decision.temperature - 0.8).abs() < f32::EPSILON);
        assert_eq!(decision.context_window, ContextWindowClass::Compact);
        assert_eq!(decision.streaming, StreamingMode::Immediate);
        assert!(decision.tools.is_empty());
    }

    #[test]
    fn test_research_enables_rag() {
        let decision = PolicySynthesizer::new().synthesize(&classification(
            IntentLabel::Research,
            ComplexityTier::Complex,
            0.9,
            ResolverStage::Classifier,
        ));

        assert!(decision.use_rag);
        assert!(decision.allows_tool(ToolCategory::WebSearch));
        assert_eq!(decision.context_window, ContextWindowClass::Extended);
    }

    #[test]
    fn test_delete_request_always_requires_confirmation() {
        for (confidence, stage) in [
            (0.99, ResolverStage::Classifier),
            (0.95, ResolverStage::Semantic),
            (0.58, ResolverStage::Fallback),
        ] {
            let decision = PolicySynthesizer::new().synthesize(&classification(
                IntentLabel::DeleteRequest,
                ComplexityTier::Simple,
                confidence,
                stage,
            ));
            assert!(
                decision.requires_confirmation,
                "delete at {confidence} via {stage} must confirm"
            );
        }
    }

    #[test]
    fn test_system_command_confirmation_depends_on_confidence() {
        let synthesizer = PolicySynthesizer::new();

        let confident = synthesizer.synthesize(&classification(
            IntentLabel::SystemCommand,
            ComplexityTier::Simple,
            0.95,
            ResolverStage::Classifier,
        ));
        assert!(!confident.requires_confirmation);

        let at_threshold = synthesizer.synthesize(&classification(
            IntentLabel::SystemCommand,
            ComplexityTier::Simple,
            HIGH_STAKES_CONFIDENCE,
            ResolverStage::Semantic,
        ));
        assert!(!at_threshold.requires_confirmation);

        let uncertain = synthesizer.synthesize(&classification(
            IntentLabel::SystemCommand,
            ComplexityTier::Simple,
            0.80,
            ResolverStage::Classifier,
        ));
        assert!(uncertain.requires_confirmation);
    }

    #[test]
    fn test_fallback_system_command_always_confirms() {
        // Even if the confidence field were somehow high, fallback origin wins
        let decision = PolicySynthesizer::new().synthesize(&Classification {
            intent: IntentLabel::SystemCommand,
            complexity: ComplexityTier::Complex,
            confidence: ConfidenceScore::new(0.99),
            resolved_by: ResolverStage::Fallback,
        });
        assert!(decision.requires_confirmation);
    }

    #[test]
    fn test_fallback_ttl_is_capped() {
        let fallback = PolicySynthesizer::new().synthesize(&classification(
            IntentLabel::Conversation,
            ComplexityTier::Simple,
            0.4,
            ResolverStage::Fallback,
        ));
        assert_eq!(fallback.cache_ttl_secs, FALLBACK_TTL_CEILING_SECS);

        let classified = PolicySynthesizer::new().synthesize(&classification(
            IntentLabel::Conversation,
            ComplexityTier::Simple,
            0.8,
            ResolverStage::Classifier,
        ));
        assert_eq!(classified.cache_ttl_secs, 300);
    }

    #[test]
    fn test_privacy_unlock_is_never_cached() {
        let decision = PolicySynthesizer::new().synthesize(&classification(
            IntentLabel::PrivacyUnlock,
            ComplexityTier::Simple,
            1.0,
            ResolverStage::Guardrail,
        ));
        assert_eq!(decision.cache_ttl_secs, 0);
    }

    #[test]
    fn test_blocked_is_cold() {
        let decision = PolicySynthesizer::new().synthesize(&classification(
            IntentLabel::Blocked,
            ComplexityTier::Simple,
            1.0,
            ResolverStage::Guardrail,
        ));
        assert_eq!(decision.temperature, 0.0);
        assert!(decision.tools.is_empty());
    }

    #[test]
    fn test_synthesis_is_deterministic() {
        let input = classification(
            IntentLabel::Search,
            ComplexityTier::Medium,
            0.83,
            ResolverStage::Semantic,
        );
        let synthesizer = PolicySynthesizer::new();
        assert_eq!(synthesizer.synthesize(&input), synthesizer.synthesize(&input));
    }

    #[test]
    fn test_custom_intent_gets_conversation_defaults() {
        let decision = PolicySynthesizer::new().synthesize(&classification(
            IntentLabel::Custom("calendar_query".to_string()),
            ComplexityTier::Simple,
            0.85,
            ResolverStage::Classifier,
        ));
        assert!((decision.temperature - 0.7).abs() < f32::EPSILON);
        assert!(decision.tools.is_empty());
        assert!(!decision.requires_confirmation);
        assert_eq!(decision.cache_ttl_secs, 300);
    }
}
