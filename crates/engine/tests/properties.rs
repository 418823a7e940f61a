//! Property tests over random scope trees and chat transcripts.
//!
//! Trees are built from text, reservations and nested scopes with absolute
//! priorities or non-positive offsets; chat trees wrap such content in
//! top-level messages, some of them inside prioritized scopes. `first` is
//! left out: choosing a lower alternative as the cutoff rises can grow the
//! prompt, so it is covered by hand-written cases instead.
//!
//! Every property runs against the word tokenizer, whose estimate equals
//! its count, and the byte heuristic, whose estimate is strictly lower.
//!
//! Case count follows `PROPTEST_CASES` (default 64).

use std::sync::Arc;

use priorender_core::node::{chat, scope, text};
use priorender_core::{
    ChatOverhead, Empty, Error, HeuristicTokenizer, Node, Priority, Prompt, Scope, Tokenizer,
    WordTokenizer,
};
use priorender_engine::{PromptRenderer, SearchStrategy, TokenBudget, TokenCounter};
use proptest::prelude::*;

const FRAGMENTS: &[&str] = &["a ", "b", "cd ", " ", "!", "x-y", "\n"];
const ROLES: &[&str] = &["system", "user", "assistant"];

#[derive(Debug, Clone, Copy)]
enum Counting {
    Words,
    Bytes,
}

impl Counting {
    fn tokenizer(self) -> Arc<dyn Tokenizer> {
        match self {
            Counting::Words => Arc::new(WordTokenizer),
            Counting::Bytes => Arc::new(HeuristicTokenizer),
        }
    }
}

fn counting() -> impl Strategy<Value = Counting> {
    prop_oneof![Just(Counting::Words), Just(Counting::Bytes)]
}

fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(64);
    ProptestConfig {
        cases,
        ..ProptestConfig::default()
    }
}

fn leaf() -> impl Strategy<Value = Node> {
    prop_oneof![
        4 => prop::sample::select(FRAGMENTS).prop_map(|s| text(s)),
        1 => (0usize..4).prop_map(|n| Node::Empty(Empty { reserved_tokens: n })),
    ]
}

fn node() -> impl Strategy<Value = Node> {
    leaf().prop_recursive(4, 48, 4, |inner| {
        (
            prop::collection::vec(inner, 0..4),
            prop::option::of(0i64..20),
            prop::option::of(-5i64..=0),
        )
            .prop_map(|(children, p, prel)| {
                let mut scope = Scope::new(children);
                scope.absolute_priority = p;
                scope.relative_priority = prel;
                Node::Scope(scope)
            })
    })
}

fn tree() -> impl Strategy<Value = Vec<Node>> {
    prop::collection::vec(node(), 0..6)
}

fn message() -> impl Strategy<Value = Node> {
    (
        prop::sample::select(ROLES),
        prop::collection::vec(node(), 0..4),
        prop::option::of(0i64..20),
    )
        .prop_map(|(role, children, p)| {
            let message = chat(role, children);
            match p {
                Some(p) => Node::Scope(scope([message]).p(p)),
                None => message,
            }
        })
}

fn chat_tree() -> impl Strategy<Value = Vec<Node>> {
    prop::collection::vec(message(), 0..5)
}

fn any_tree() -> impl Strategy<Value = Vec<Node>> {
    prop_oneof![tree(), chat_tree()]
}

fn renderer(counting: Counting, limit: usize) -> PromptRenderer {
    PromptRenderer::new(counting.tokenizer(), TokenBudget { token_limit: limit })
}

/// Exact cost of rendering `nodes` at `level`, reservations and chat
/// overhead included.
fn cost_at(counting: Counting, nodes: &[Node], level: Priority) -> usize {
    let r = renderer(counting, 0).render_at(nodes, level).unwrap();
    let tokenizer = counting.tokenizer();
    let counter = TokenCounter::new(tokenizer.as_ref(), ChatOverhead::default());
    counter.exact_opt(r.prompt.as_ref()).unwrap() + r.reserved_tokens
}

/// Lowest fitting level by scanning every level in ascending order.
fn oracle(counting: Counting, nodes: &[Node], limit: usize) -> Option<(Priority, Prompt)> {
    let renderer = renderer(counting, limit);
    for level in renderer.levels(nodes).unwrap() {
        if cost_at(counting, nodes, level) <= limit {
            let prompt = renderer.render_at(nodes, level).unwrap().prompt;
            return Some((level, prompt.unwrap_or_default()));
        }
    }
    None
}

proptest! {
    #![proptest_config(proptest_config())]

    #[test]
    fn cost_never_grows_with_the_cutoff(counting in counting(), nodes in any_tree()) {
        let levels = renderer(counting, 0).levels(&nodes).unwrap();
        let costs: Vec<usize> = levels.iter().map(|&l| cost_at(counting, &nodes, l)).collect();
        for pair in costs.windows(2) {
            prop_assert!(pair[0] >= pair[1], "costs {:?} at levels {:?}", costs, levels);
        }
    }

    #[test]
    fn binary_search_matches_exhaustive_scan(
        counting in counting(),
        nodes in any_tree(),
        limit in 0usize..40,
    ) {
        let result = renderer(counting, limit).render(&nodes);
        match (oracle(counting, &nodes, limit), result) {
            (Some((level, prompt)), Ok(out)) => {
                prop_assert_eq!(out.priority_cutoff, level);
                prop_assert_eq!(out.prompt, prompt);
                prop_assert!(out.token_count + out.tokens_reserved <= limit);
            }
            (None, Err(Error::BudgetOverflow { token_limit, .. })) => {
                prop_assert_eq!(token_limit, limit);
            }
            (expected, got) => {
                prop_assert!(false, "oracle {:?} but render gave {:?}", expected, got);
            }
        }
    }

    #[test]
    fn linear_search_fits_and_never_undercuts(
        counting in counting(),
        nodes in any_tree(),
        limit in 0usize..40,
    ) {
        let linear = renderer(counting, limit)
            .with_strategy(SearchStrategy::Linear)
            .render(&nodes);
        match (oracle(counting, &nodes, limit), linear) {
            (Some((level, _)), Ok(out)) => {
                prop_assert!(out.priority_cutoff >= level);
                prop_assert!(out.token_count + out.tokens_reserved <= limit);
            }
            (None, Err(Error::BudgetOverflow { .. })) => {}
            (expected, got) => {
                prop_assert!(false, "oracle {:?} but linear render gave {:?}", expected, got);
            }
        }
    }

    #[test]
    fn base_level_is_always_included(counting in counting(), nodes in tree()) {
        let out = renderer(counting, 10_000).render(&nodes).unwrap();
        let base = renderer(counting, 0)
            .render_at(&nodes, priorender_core::BASE_PRIORITY)
            .unwrap()
            .prompt
            .unwrap_or_default();
        // Everything at the base level survives any cutoff at or below it.
        let (Prompt::Plain(full), Prompt::Plain(base)) = (&out.prompt, &base) else {
            return Err(TestCaseError::fail("expected plain prompts"));
        };
        prop_assert!(is_subsequence(base, full), "{:?} not within {:?}", base, full);
    }
}

fn is_subsequence(needle: &str, haystack: &str) -> bool {
    let mut hay = haystack.chars();
    needle.chars().all(|c| hay.any(|h| h == c))
}
