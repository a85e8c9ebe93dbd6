//! Best-match flow selection
//!
//! Picks the single most specific flow among candidates whose selectors all
//! matched already. Specificity is decided segment by segment, left to right:
//! a literal segment beats a `:param` segment, which beats a mismatch, and the
//! first differing segment settles it.

use flowgate_core::{ExecutionContext, ExecutionMode, Flow};
use std::sync::Arc;

const EXACT: f32 = 1.0;
const PARAMETER: f32 = 0.5;
const MISMATCH: f32 = 0.0;

/// Chooses one flow among already-matching candidates
pub trait BestMatchSelector: Send + Sync {
    fn select(&self, flows: &[Arc<Flow>], ctx: &ExecutionContext) -> Option<Arc<Flow>>;
}

/// Selects on the request path in HTTP mode and on the channel in message mode
#[derive(Debug, Default, Clone, Copy)]
pub struct BestMatchFlowSelector;

impl BestMatchSelector for BestMatchFlowSelector {
    fn select(&self, flows: &[Arc<Flow>], ctx: &ExecutionContext) -> Option<Arc<Flow>> {
        match ctx.mode {
            ExecutionMode::Http => for_path(flows, &ctx.path),
            ExecutionMode::Message => for_channel(flows, ctx.channel.as_deref().unwrap_or_default()),
        }
    }
}

/// Best match of `flows` for an HTTP request path
pub fn for_path(flows: &[Arc<Flow>], request_path: &str) -> Option<Arc<Flow>> {
    best_match_by(flows, request_path, |flow| flow.http_path())
}

/// Best match of `flows` for a message channel
///
/// Flows without a channel selector score against `/`.
pub fn for_channel(flows: &[Arc<Flow>], channel: &str) -> Option<Arc<Flow>> {
    best_match_by(flows, channel, |flow| flow.channel().unwrap_or("/"))
}

/// Best match of `flows` for `target`, using `pattern_of` to read each flow's pattern
pub fn best_match_by<F>(flows: &[Arc<Flow>], target: &str, pattern_of: F) -> Option<Arc<Flow>>
where
    F: Fn(&Flow) -> &str,
{
    let target_segments: Vec<&str> = target.split('/').collect();

    let mut candidates = flows.iter();
    let first = candidates.next()?;
    let mut selected = first;
    let mut selected_scores = score(pattern_of(first), &target_segments);

    for flow in candidates {
        let scores = score(pattern_of(flow), &target_segments);
        if outranks(&scores, &selected_scores) {
            selected = flow;
            selected_scores = scores;
        }
    }

    Some(Arc::clone(selected))
}

/// Per-segment score of `pattern` against the request segments
///
/// Pattern segments past the end of the request score as exact matches.
fn score(pattern: &str, target_segments: &[&str]) -> Vec<f32> {
    pattern
        .split('/')
        .enumerate()
        .map(|(i, segment)| match target_segments.get(i) {
            None => EXACT,
            Some(requested) if *requested == segment => EXACT,
            Some(_) if segment.starts_with(':') => PARAMETER,
            Some(_) => MISMATCH,
        })
        .collect()
}

/// Leftmost differing segment decides; running past the selected scores wins
fn outranks(candidate: &[f32], selected: &[f32]) -> bool {
    for (i, score) in candidate.iter().enumerate() {
        let Some(current) = selected.get(i) else {
            return true;
        };
        if score < current {
            return false;
        }
        if score > current {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowgate_core::{Operator, Selector};

    fn flow(pattern: &str) -> Arc<Flow> {
        Arc::new(
            Flow::new()
                .with_name(pattern)
                .with_selector(Selector::http(pattern, Operator::StartsWith)),
        )
    }

    fn candidates() -> Vec<Arc<Flow>> {
        vec![
            flow("/myPath/staticId"),
            flow("/:id/staticId"),
            flow("/myPath/:id"),
        ]
    }

    fn selected(flows: &[Arc<Flow>], path: &str) -> Option<String> {
        for_path(flows, path).and_then(|f| f.name.clone())
    }

    #[test]
    fn test_static_segment_wins_on_exact_path() {
        assert_eq!(
            selected(&candidates(), "/myPath/staticId").as_deref(),
            Some("/myPath/staticId")
        );
    }

    #[test]
    fn test_trailing_parameter_wins_on_dynamic_id() {
        assert_eq!(
            selected(&candidates(), "/myPath/553").as_deref(),
            Some("/myPath/:id")
        );
    }

    #[test]
    fn test_leading_parameter_wins_on_unknown_prefix() {
        assert_eq!(
            selected(&candidates(), "/random/staticId").as_deref(),
            Some("/:id/staticId")
        );
    }

    #[test]
    fn test_selection_is_deterministic() {
        let flows = candidates();
        for _ in 0..50 {
            assert_eq!(selected(&flows, "/myPath/553").as_deref(), Some("/myPath/:id"));
        }
    }

    #[test]
    fn test_no_candidates() {
        assert!(for_path(&[], "/anything").is_none());
        assert!(for_channel(&[], "orders").is_none());
    }

    #[test]
    fn test_single_candidate_is_returned() {
        let flows = vec![flow("/unrelated")];
        assert_eq!(selected(&flows, "/other").as_deref(), Some("/unrelated"));
    }

    #[test]
    fn test_longer_pattern_wins_at_overflow() {
        let flows = vec![flow("/api"), flow("/api/users")];
        assert_eq!(selected(&flows, "/api/users").as_deref(), Some("/api/users"));

        // Segments beyond the request still score as matches
        assert_eq!(selected(&flows, "/api").as_deref(), Some("/api/users"));
    }

    #[test]
    fn test_first_declared_kept_on_full_tie() {
        let flows = vec![flow("/:a/x"), flow("/:b/x")];
        assert_eq!(selected(&flows, "/1/x").as_deref(), Some("/:a/x"));
    }

    #[test]
    fn test_trailing_slash_is_a_segment() {
        let flows = vec![flow("/a"), flow("/a/")];
        // "/a/" has an extra empty segment which outlasts "/a"
        assert_eq!(selected(&flows, "/a/").as_deref(), Some("/a/"));
    }

    #[test]
    fn test_legacy_path_and_default_pattern() {
        let legacy = Arc::new(Flow::new().with_name("legacy").with_path("/orders/:id"));
        let bare = Arc::new(Flow::new().with_name("bare"));

        let flows = vec![bare, legacy];
        assert_eq!(selected(&flows, "/orders/7").as_deref(), Some("legacy"));
    }

    #[test]
    fn test_selector_dispatches_on_mode() {
        let by_channel = vec![
            Arc::new(
                Flow::new()
                    .with_name("any")
                    .with_selector(Selector::channel("/", Operator::StartsWith)),
            ),
            Arc::new(
                Flow::new()
                    .with_name("orders")
                    .with_selector(Selector::channel("/orders", Operator::StartsWith)),
            ),
        ];

        let ctx = ExecutionContext::message("/orders");
        let chosen = BestMatchFlowSelector.select(&by_channel, &ctx);
        assert_eq!(chosen.and_then(|f| f.name.clone()).as_deref(), Some("orders"));

        let ctx = ExecutionContext::http("/myPath/553");
        let chosen = BestMatchFlowSelector.select(&candidates(), &ctx);
        assert_eq!(chosen.and_then(|f| f.name.clone()).as_deref(), Some("/myPath/:id"));
    }

    #[test]
    fn test_scores() {
        let target: Vec<&str> = "/myPath/553".split('/').collect();
        assert_eq!(score("/myPath/staticId", &target), vec![1.0, 1.0, 0.0]);
        assert_eq!(score("/:id/staticId", &target), vec![1.0, 0.5, 0.0]);
        assert_eq!(score("/myPath/:id", &target), vec![1.0, 1.0, 0.5]);
        assert_eq!(score("/myPath/:id/more", &target), vec![1.0, 1.0, 0.5, 1.0]);
    }
}
