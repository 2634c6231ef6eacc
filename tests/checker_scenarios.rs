//! 端到端检查场景: 网 × 自动机 -> 结果与统计.

use pn_verify::buchi::{
    AtomicProposition, BuchiAutomaton, Comparison, ConditionError, Guard, LocationId,
    PropositionTable,
};
use pn_verify::checker::{
    CheckError, CheckerBuilder, CheckerState, LimitReason, Limits, LivenessAlgorithm,
    ModelChecker, Outcome, SearchMode, SearchOptions, SearchStatistics, Strategy, Unlimited,
    Verdict,
};
use pn_verify::config::CheckerConfig;
use pn_verify::encoding::{MarkingEncoder, StateEncoder};
use pn_verify::model::Property;
use pn_verify::net::{Marking, Net, Place, PlaceId, Transition};
use pn_verify::ptrie::EncodedKey;
use pn_verify::product::ProductState;

/// p0 --t--> p1, 两个可达标识.
fn two_markings() -> (Net, PlaceId) {
    let mut net = Net::empty();
    let p0 = net.add_place(Place::new("p0", 1));
    let p1 = net.add_place(Place::new("p1", 0));
    let t = net.add_transition(Transition::new("t"));
    net.set_input_weight(p0, t, 1);
    net.set_output_weight(p1, t, 1);
    (net, p1)
}

/// 没有输入的迁移不断向 p 加令牌.
fn unbounded() -> (Net, PlaceId) {
    let mut net = Net::empty();
    let p = net.add_place(Place::new("p", 0));
    let t = net.add_transition(Transition::new("produce"));
    net.set_output_weight(p, t, 1);
    (net, p)
}

/// 令牌在 p0 -> p1 -> p0 之间循环, 或经 t3 进入 p2 后永远停在那里.
fn ring_with_sink() -> (Net, PropositionTable) {
    let mut net = Net::empty();
    let p0 = net.add_place(Place::new("p0", 1));
    let p1 = net.add_place(Place::new("p1", 0));
    let p2 = net.add_place(Place::new("p2", 0));
    for (name, from, to) in [("t1", p0, p1), ("t2", p1, p0), ("t3", p0, p2), ("t4", p2, p2)] {
        let t = net.add_transition(Transition::new(name));
        net.set_input_weight(from, t, 1);
        net.set_output_weight(to, t, 1);
    }
    let mut props = PropositionTable::new();
    for (name, place) in [("at_p0", p0), ("at_p1", p1), ("at_p2", p2)] {
        props.push(
            name,
            AtomicProposition::Tokens { place, cmp: Comparison::Eq, value: 1 },
        );
    }
    (net, props)
}

fn always(accepting: bool) -> BuchiAutomaton {
    BuchiAutomaton::from_labels(&[("q", accepting)], vec![(0, Guard::True, 0)])
}

fn assert_sane(stats: &SearchStatistics) {
    assert!(stats.discovered >= stats.explored, "{stats:?}");
    assert!(stats.peak_waiting >= stats.end_waiting, "{stats:?}");
}

#[test]
fn accepting_initial_location_is_accepted_after_one_state() {
    let (net, _) = two_markings();
    let mut checker = CheckerBuilder::new(net)
        .automaton(always(true))
        .options(SearchOptions::new(SearchMode::Reachability))
        .build()
        .unwrap();
    assert_eq!(checker.run().unwrap(), Outcome::Accepted);
    let stats = checker.statistics();
    assert_eq!(stats.explored, 1);
    assert!(stats.discovered >= 1);
    let report = checker.report().unwrap();
    assert_eq!(report.verdict, Verdict::Satisfied);
    assert_eq!(
        report.witness.unwrap().marking,
        Marking::from_tokens([1, 0])
    );
}

#[test]
fn deadlock_is_exhausted_after_one_state() {
    let mut net = Net::empty();
    net.add_place(Place::new("idle", 2));
    let mut checker = CheckerBuilder::new(net)
        .automaton(always(false))
        .options(SearchOptions::new(SearchMode::Safety))
        .build()
        .unwrap();
    assert_eq!(checker.run().unwrap(), Outcome::Exhausted);
    let stats = checker.statistics();
    assert_eq!(stats.explored, 1);
    assert_eq!(stats.end_waiting, 0);
    assert_eq!(checker.report().unwrap().verdict, Verdict::Satisfied);
}

#[test]
fn reachability_finds_goal_under_every_strategy() {
    for strategy in [Strategy::Bfs, Strategy::Dfs, Strategy::Rdfs] {
        let (net, props) = ring_with_sink();
        let goal = Guard::prop(props.by_name("at_p2").unwrap());
        let mut checker = CheckerBuilder::new(net)
            .propositions(props)
            .automaton(BuchiAutomaton::reachability(goal))
            .options(SearchOptions::new(SearchMode::Reachability).with_strategy(strategy))
            .build()
            .unwrap();
        assert_eq!(checker.run().unwrap(), Outcome::Accepted, "{strategy}");
        let witness = checker.report().unwrap().witness.unwrap();
        assert_eq!(witness.marking, Marking::from_tokens([0, 0, 1]));
    }
}

#[test]
fn unreachable_goal_exhausts_and_is_violated() {
    let (net, props) = ring_with_sink();
    let impossible = Guard::And(vec![
        Guard::prop(props.by_name("at_p0").unwrap()),
        Guard::prop(props.by_name("at_p1").unwrap()),
    ]);
    let mut checker = CheckerBuilder::new(net)
        .propositions(props)
        .automaton(BuchiAutomaton::reachability(impossible))
        .options(SearchOptions::new(SearchMode::Reachability))
        .build()
        .unwrap();
    assert_eq!(checker.run().unwrap(), Outcome::Exhausted);
    let report = checker.report().unwrap();
    assert_eq!(report.verdict, Verdict::Violated);
    assert_eq!(report.statistics.explored, 3);
    assert_eq!(report.statistics.discovered, 3);
}

#[test]
fn configured_mode_cannot_reinterpret_a_reachability_property() {
    let (net, props) = ring_with_sink();
    let property = Property::Reachable {
        goal: "at_p0 & at_p1".into(),
    };
    let config = CheckerConfig {
        mode: Some(SearchMode::Safety),
        ..CheckerConfig::default()
    };
    let result = config.search_options(&property).map_err(CheckError::from);
    assert!(matches!(
        result,
        Err(CheckError::UnsupportedCondition(ConditionError::ModeMismatch { .. }))
    ));

    // 不指定模式时按可达性解释, 目标不可达即违反
    let options = CheckerConfig::default().search_options(&property).unwrap();
    let automaton = property.automaton(&props).unwrap();
    let mut checker = CheckerBuilder::new(net)
        .propositions(props)
        .automaton(automaton)
        .options(options)
        .build()
        .unwrap();
    assert_eq!(checker.run().unwrap(), Outcome::Exhausted);
    assert_eq!(checker.report().unwrap().verdict, Verdict::Violated);
}

#[test]
fn safety_violation_is_rejected() {
    let (net, props) = ring_with_sink();
    let good = Guard::prop(props.by_name("at_p2").unwrap()).negate();
    let mut checker = CheckerBuilder::new(net)
        .propositions(props)
        .automaton(BuchiAutomaton::invariant(good))
        .options(SearchOptions::new(SearchMode::Safety))
        .build()
        .unwrap();
    assert_eq!(checker.run().unwrap(), Outcome::Rejected);
    assert_eq!(checker.report().unwrap().verdict, Verdict::Violated);
}

#[test]
fn statistics_stay_monotone_while_stepping() {
    let (net, props) = ring_with_sink();
    let mut checker = CheckerBuilder::new(net)
        .propositions(props)
        .automaton(always(false))
        .options(SearchOptions::new(SearchMode::Safety).with_strategy(Strategy::Dfs))
        .build()
        .unwrap();
    let mut last = *checker.statistics();
    let mut steps = 0;
    while !checker.step().unwrap().is_terminal() {
        let now = *checker.statistics();
        assert!(now.explored >= last.explored);
        assert!(now.discovered >= last.discovered);
        assert!(now.peak_waiting >= last.peak_waiting);
        assert_sane(&now);
        last = now;
        steps += 1;
        assert!(steps < 100, "search does not terminate");
    }
    assert_eq!(checker.state(), CheckerState::Exhausted);
    assert_sane(checker.statistics());
}

#[test]
fn liveness_algorithms_agree() {
    let cases = [
        // 令牌可以永远留在 p2, 因而 GF at_p1 不成立
        (Property::InfinitelyOften { guard: "at_p1".into() }, Outcome::Rejected),
        // 每条运行都会停在 p2 或在环上来回, 总有一处状态满足 p0 | p1 | p2
        (
            Property::InfinitelyOften { guard: "at_p0 | at_p1 | at_p2".into() },
            Outcome::Exhausted,
        ),
        // 来回的运行不会最终一直在 p2
        (Property::EventuallyAlways { guard: "at_p2".into() }, Outcome::Rejected),
        (
            Property::EventuallyAlways { guard: "!at_p1 | at_p1".into() },
            Outcome::Exhausted,
        ),
    ];
    for (property, expected) in cases {
        for algorithm in [LivenessAlgorithm::Tarjan, LivenessAlgorithm::NestedDfs] {
            let (net, props) = ring_with_sink();
            let automaton = property.automaton(&props).unwrap();
            let mut checker = CheckerBuilder::new(net)
                .propositions(props)
                .automaton(automaton)
                .options(SearchOptions::new(SearchMode::Liveness).with_liveness(algorithm))
                .build()
                .unwrap();
            let outcome = checker.run().unwrap();
            assert_eq!(outcome, expected, "{property:?} with {algorithm:?}");
            assert_sane(checker.statistics());
            if outcome == Outcome::Exhausted {
                assert_eq!(checker.statistics().end_waiting, 0);
            }
        }
    }
}

#[test]
fn token_bound_truncation_is_resource_limited() {
    let (net, _) = unbounded();
    let mut checker = CheckerBuilder::new(net)
        .automaton(always(false))
        .options(SearchOptions::new(SearchMode::Safety).with_token_bound(Some(3)))
        .build()
        .unwrap();
    let outcome = checker.run().unwrap();
    assert_eq!(outcome, Outcome::ResourceLimited(LimitReason::TokenBound));
    assert_eq!(outcome.verdict(SearchMode::Safety), Verdict::Unknown);
    assert_eq!(checker.statistics().discovered, 4);
    assert_eq!(checker.statistics().explored, 4);
}

#[test]
fn state_limit_stops_an_infinite_search() {
    let (net, _) = unbounded();
    let mut checker = CheckerBuilder::new(net)
        .automaton(always(false))
        .options(SearchOptions::new(SearchMode::Safety))
        .limits(Limits::new().with_max_states(Some(5)))
        .build()
        .unwrap();
    assert_eq!(
        checker.run().unwrap(),
        Outcome::ResourceLimited(LimitReason::StateLimit)
    );
    assert_eq!(checker.statistics().explored, 5);
}

#[test]
fn closure_budget_is_consulted_every_step() {
    let (net, _) = unbounded();
    let mut checker = CheckerBuilder::new(net)
        .automaton(always(false))
        .options(SearchOptions::new(SearchMode::Safety))
        .build_with(MarkingEncoder::new(1), |stats: &SearchStatistics| {
            (stats.discovered >= 3).then_some(LimitReason::TimeLimit)
        })
        .unwrap();
    assert_eq!(
        checker.run().unwrap(),
        Outcome::ResourceLimited(LimitReason::TimeLimit)
    );
    assert_eq!(checker.statistics().discovered, 3);
}

#[test]
fn node_limit_surfaces_as_allocation_failure() {
    let (net, _) = unbounded();
    let options = SearchOptions {
        split_threshold: 1,
        ..SearchOptions::new(SearchMode::Safety).with_node_limit(Some(1))
    };
    let mut checker = CheckerBuilder::new(net)
        .automaton(always(false))
        .options(options)
        .build_with(MarkingEncoder::new(1), Unlimited)
        .unwrap();
    assert_eq!(
        checker.run().unwrap(),
        Outcome::ResourceLimited(LimitReason::AllocationFailure)
    );
    assert_eq!(checker.report().unwrap().verdict, Verdict::Unknown);
    assert!(checker.index().node_count() <= 1);
}

#[test]
fn missing_automaton_fails_at_construction() {
    let (net, _) = two_markings();
    let result = CheckerBuilder::<Net, BuchiAutomaton>::new(net).build();
    assert!(matches!(
        result,
        Err(CheckError::UnsupportedCondition(ConditionError::Missing))
    ));
}

#[test]
fn guard_on_unknown_proposition_fails_at_construction() {
    let (net, _) = two_markings();
    let automaton = BuchiAutomaton::reachability(Guard::prop(pn_verify::buchi::PropId::new(7)));
    let result = CheckerBuilder::new(net).automaton(automaton).build();
    assert!(matches!(result, Err(CheckError::UnsupportedCondition(_))));
}

/// 只保留令牌数的奇偶, 2 与 0 撞键.
struct ParityEncoder;

impl StateEncoder for ParityEncoder {
    type State = ProductState;

    fn encode(&self, state: &ProductState) -> EncodedKey {
        let mut key = EncodedKey::new();
        key.push_byte(state.location.raw() as u8);
        key.push_byte((state.marking.max_tokens() % 2) as u8);
        key
    }

    fn decode(&self, key: &EncodedKey) -> Option<ProductState> {
        let bytes = key.as_bytes();
        Some(ProductState::new(
            Marking::from_tokens([u64::from(*bytes.get(1)?)]),
            LocationId::new(u32::from(*bytes.first()?)),
        ))
    }
}

fn parity_checker(verify: bool) -> ModelChecker<Net, BuchiAutomaton, ParityEncoder, Unlimited> {
    let (net, _) = unbounded();
    CheckerBuilder::new(net)
        .automaton(always(false))
        .options(SearchOptions::new(SearchMode::Safety).with_verify_encoding(verify))
        .build_with(ParityEncoder, Unlimited)
        .unwrap()
}

#[test]
fn colliding_encoder_aborts_the_run() {
    let mut checker = parity_checker(true);
    assert!(matches!(
        checker.run(),
        Err(CheckError::EncodingInvariantViolation(_))
    ));
    assert_eq!(checker.state(), CheckerState::Aborted);
    assert!(checker.report().is_none());
    assert_eq!(checker.step(), Err(CheckError::Aborted));
}

#[test]
fn unverified_collision_goes_unnoticed() {
    // 不校验时碰撞把无穷状态空间误判为两个状态
    let mut checker = parity_checker(false);
    assert_eq!(checker.run().unwrap(), Outcome::Exhausted);
    assert_eq!(checker.statistics().discovered, 2);
}
