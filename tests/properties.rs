//! Property-based tests for the update engine.
//!
//! Random user turns are thrown at the bundled NDA domain:
//! 1. Integration is pure
//! 2. QUD stays LIFO with at most a clarification above its original
//! 3. A question resolved as volunteered information is never raised
//! 4. Dependent questions wait for their prerequisites
//! 5. A predicate never carries two committed values, revisions included

use std::collections::BTreeSet;

use ibis_dme::{
    ClarificationStrategy, DialogueMove, DialogueMoveEngine, DmeConfig, Domain, InformationState,
    Question, Speaker,
};
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

/// Several predicates have two acceptable values here, so later answers
/// revise earlier commitments and cascade into their dependents.
const ANSWERS: &[&str] = &[
    "Acme Corp and Smith Inc",
    "mutual",
    "unilateral",
    "January 1, 2025",
    "February 1, 2025",
    "3 years",
    "5 years",
    "California",
    "Texas",
    "blue",
    "Acme Corp and Smith Inc, effective January 1, 2025",
    "yes",
    "42 apples",
];

const PREDICATES: &[&str] = &["parties", "nda_type", "effective_date", "duration", "governing_law"];

#[derive(Debug, Clone)]
enum Step {
    Answer(&'static str),
    Greet,
    AskBack(&'static str),
}

impl Step {
    fn to_move(&self) -> DialogueMove {
        match self {
            Self::Answer(text) => DialogueMove::user_answer(*text),
            Self::Greet => DialogueMove::greet(Speaker::User),
            Self::AskBack(p) => DialogueMove::ask(Question::wh(*p), Speaker::User),
        }
    }
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        8 => prop::sample::select(ANSWERS).prop_map(Step::Answer),
        1 => Just(Step::Greet),
        1 => prop::sample::select(PREDICATES).prop_map(Step::AskBack),
    ]
}

fn engine(reprompt: bool) -> DialogueMoveEngine {
    let strategy = if reprompt {
        ClarificationStrategy::RepromptRelevant
    } else {
        ClarificationStrategy::AlwaysClarify
    };
    DialogueMoveEngine::new(
        Domain::bundled("nda").unwrap(),
        DmeConfig::default().with_clarification(strategy),
    )
}

// ============================================================================
// Checks
// ============================================================================

struct Observer {
    volunteered: BTreeSet<String>,
}

impl Observer {
    fn check(&self, dme: &DialogueMoveEngine, state: &InformationState) -> Result<(), TestCaseError> {
        let qud = &state.shared().qud;
        prop_assert!(qud.len() <= 2, "QUD too deep: {:?}", qud);
        match qud.as_slice() {
            [only] => {
                prop_assert!(!only.is_clarification());
            }
            [below, top] => {
                prop_assert!(top.is_clarification());
                prop_assert_eq!(top.base(), below);
            }
            _ => {}
        }

        for q in qud {
            prop_assert!(
                !self.volunteered.contains(&q.predicate_key()),
                "volunteered question {} was raised",
                q
            );
            for prerequisite in dme.domain().prerequisites(q.base()) {
                prop_assert!(
                    state.shared().is_committed(prerequisite),
                    "{} raised before {}",
                    q,
                    prerequisite
                );
            }
        }

        let mut seen = BTreeSet::new();
        for p in &state.shared().commitments {
            prop_assert!(seen.insert(p.predicate.clone()), "two values for {}", p.predicate);
        }
        Ok(())
    }

    /// Record predicates an answer resolved out of `issues`, and forget
    /// those it retracted: a retracted predicate may be asked again.
    fn observe_answer(&mut self, before: &InformationState, after: &InformationState) {
        self.volunteered.retain(|key| after.shared().is_committed(key));
        let top = before.qud_top().map(Question::predicate_key);
        for q in &before.private().issues {
            let key = q.predicate_key();
            if Some(&key) != top.as_ref() && after.shared().is_committed(&key) {
                self.volunteered.insert(key);
            }
        }
    }
}

fn play(dme: &DialogueMoveEngine, steps: &[Step]) -> Result<(), TestCaseError> {
    let mut observer = Observer {
        volunteered: BTreeSet::new(),
    };
    let mut state = dme
        .integrate(&InformationState::new(), DialogueMove::request("draft NDA"))
        .unwrap();

    for step in steps {
        // System turn: select and absorb until idle.
        loop {
            let (next, mv) = dme.select(&state).unwrap();
            observer.check(dme, &next)?;
            let Some(mv) = mv else {
                state = next;
                break;
            };
            state = dme.integrate(&next, mv).unwrap();
            observer.check(dme, &state)?;
        }

        let after = dme.integrate(&state, step.to_move()).unwrap();
        observer.observe_answer(&state, &after);
        observer.check(dme, &after)?;
        state = after;
    }
    Ok(())
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn dialogue_invariants_hold(
        steps in prop::collection::vec(step_strategy(), 0..24),
        reprompt in any::<bool>(),
    ) {
        play(&engine(reprompt), &steps)?;
    }

    #[test]
    fn integrate_is_pure(
        prefix in prop::collection::vec(prop::sample::select(ANSWERS), 0..8),
        last in step_strategy(),
    ) {
        let dme = engine(false);
        let mut state = dme
            .integrate(&InformationState::new(), DialogueMove::request("draft NDA"))
            .unwrap();
        for answer in prefix {
            let (next, _) = dme.select(&state).unwrap();
            state = dme.integrate(&next, DialogueMove::user_answer(answer)).unwrap();
        }

        let before = state.clone();
        let a = dme.integrate(&state, last.to_move()).unwrap();
        let b = dme.integrate(&state, last.to_move()).unwrap();
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(&state, &before);
    }

    #[test]
    fn completion_needs_every_fact(steps in prop::collection::vec(step_strategy(), 0..24)) {
        let dme = engine(false);
        let mut state = dme
            .integrate(&InformationState::new(), DialogueMove::request("draft NDA"))
            .unwrap();
        for step in &steps {
            loop {
                let (next, mv) = dme.select(&state).unwrap();
                let Some(mv) = mv else {
                    state = next;
                    break;
                };
                if matches!(mv.content, ibis_dme::MoveContent::Completion { .. }) {
                    for p in PREDICATES {
                        prop_assert!(next.shared().is_committed(p), "completed without {}", p);
                    }
                }
                state = dme.integrate(&next, mv).unwrap();
            }
            state = dme.integrate(&state, step.to_move()).unwrap();
        }
    }
}
