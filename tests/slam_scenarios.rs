//! Pose-graph and semantic SLAM scenarios: an octagonal trajectory solved
//! in batch, incrementally, and with a semantically classified landmark.

use approx::assert_relative_eq;
use hybrid_sam::factors::{BetweenFactor, PriorFactor};
use hybrid_sam::manifold::SE2;
use hybrid_sam::{
    DiagonalNoise, DiscreteKey, DiscretePriorFactor, DiscreteValues, HybridFactorGraph,
    HybridSmoother, Key, NonlinearFactor, SemanticBearingRangeFactor, Symbol, Values,
};
use nalgebra::Vector2;

fn x(i: u64) -> Key {
    Symbol::new('x', i).key()
}

/// 45 degrees, matching an octagon corner.
const TURN: f64 = 0.78539816;

fn odometry_step() -> SE2 {
    // One octagon edge with a small fixed disturbance.
    let dx = SE2::from_xy_theta(1.0, 0.0, TURN);
    dx.compose(&SE2::from_xy_theta(0.01, 0.01, 0.01), None, None)
}

fn total_error(smoother: &HybridSmoother, values: &Values) -> f64 {
    smoother
        .nonlinear_factors()
        .iter()
        .flatten()
        .map(|f| f.error(values))
        .sum()
}

/// Octagonal pose graph solved in one batch update: all estimates finite
/// and the continuous error drops below the initial error.
#[test]
fn test_simple_slam_batch() {
    let mut graph = HybridFactorGraph::new();
    let mut initial = Values::new();

    let pose0 = SE2::identity();
    graph.push_continuous(PriorFactor::new(x(0), pose0, DiagonalNoise::isotropic(3, 0.1)));
    initial.insert(x(0), pose0);

    let meas = odometry_step();
    let meas_noise = DiagonalNoise::isotropic(3, 1.0);
    let mut odom = pose0;
    for i in 0..7 {
        graph.push_continuous(BetweenFactor::new(x(i), x(i + 1), meas, meas_noise.clone()));
        odom = odom.compose(&meas, None, None);
        initial.insert(x(i + 1), odom);
    }
    // Loop closure back to the anchor.
    graph.push_continuous(BetweenFactor::new(x(7), x(0), meas, meas_noise.clone()));

    let mut smoother = HybridSmoother::new();
    smoother.update(&graph, &initial, &DiscreteValues::new()).unwrap();

    let estimate = smoother.calculate_estimate();
    for i in 0..8 {
        assert!(estimate.continuous.at(x(i)).is_finite());
    }
    assert!(total_error(&smoother, &estimate.continuous) < total_error(&smoother, &initial));
}

/// The same octagon fed one factor per update call converges to the batch
/// solution.
#[test]
fn test_simple_slam_incremental() {
    // Batch reference.
    let batch = {
        let mut graph = HybridFactorGraph::new();
        let mut initial = Values::new();
        let pose0 = SE2::identity();
        graph.push_continuous(PriorFactor::new(x(0), pose0, DiagonalNoise::isotropic(3, 0.1)));
        initial.insert(x(0), pose0);
        let meas = odometry_step();
        let meas_noise = DiagonalNoise::isotropic(3, 1.0);
        let mut odom = pose0;
        for i in 0..7 {
            graph.push_continuous(BetweenFactor::new(x(i), x(i + 1), meas, meas_noise.clone()));
            odom = odom.compose(&meas, None, None);
            initial.insert(x(i + 1), odom);
        }
        graph.push_continuous(BetweenFactor::new(x(7), x(0), meas, meas_noise));
        let mut smoother = HybridSmoother::new();
        smoother.update(&graph, &initial, &DiscreteValues::new()).unwrap();
        smoother.calculate_estimate().continuous
    };

    // Incremental: one update per factor.
    let mut smoother = HybridSmoother::new();
    let pose0 = SE2::identity();
    let meas = odometry_step();
    let meas_noise = DiagonalNoise::isotropic(3, 1.0);

    let mut graph = HybridFactorGraph::new();
    let mut initial = Values::new();
    graph.push_continuous(PriorFactor::new(x(0), pose0, DiagonalNoise::isotropic(3, 0.1)));
    initial.insert(x(0), pose0);
    smoother.update(&graph, &initial, &DiscreteValues::new()).unwrap();

    let mut odom = pose0;
    for i in 0..7 {
        let mut graph = HybridFactorGraph::new();
        let mut initial = Values::new();
        graph.push_continuous(BetweenFactor::new(x(i), x(i + 1), meas, meas_noise.clone()));
        odom = odom.compose(&meas, None, None);
        initial.insert(x(i + 1), odom);
        smoother.update(&graph, &initial, &DiscreteValues::new()).unwrap();
    }
    let mut closure = HybridFactorGraph::new();
    closure.push_continuous(BetweenFactor::new(x(7), x(0), meas, meas_noise));
    smoother.update(&closure, &Values::new(), &DiscreteValues::new()).unwrap();

    let incremental = smoother.calculate_estimate().continuous;
    for i in 0..8 {
        let difference = batch.at(x(i)).local_coordinates(incremental.at(x(i)));
        assert!(
            difference.norm() < 1e-4,
            "pose {i} differs from batch by {}",
            difference.norm()
        );
    }
}

/// Octagon with a semantically classified landmark at the center. Early
/// class measurements favor class 0, later ones favor class 1; the MAP
/// class starts at 0 and transitions to 1 once the posterior flips.
#[test]
fn test_simple_semantic_slam() {
    let l1 = Symbol::new('l', 1).key();
    let class_key = DiscreteKey::new(Symbol::new('c', 1), 2);

    // Center of the octagon traced by the odometry, at bearing 67.5
    // degrees and circumradius range from every vertex.
    let circumradius = (4.0 + 2.0 * std::f64::consts::SQRT_2).sqrt() / 2.0;
    let bearing = 1.5 * TURN;
    let center = Vector2::new(0.5, 0.5 * (1.0 + std::f64::consts::SQRT_2));

    let pose0 = SE2::identity();
    let meas = odometry_step();
    let meas_noise = DiagonalNoise::isotropic(3, 1.0);
    let br_noise = DiagonalNoise::isotropic(2, 0.1);

    let mut smoother = HybridSmoother::new();

    let mut graph = HybridFactorGraph::new();
    let mut initial = Values::new();
    graph.push_continuous(PriorFactor::new(x(0), pose0, DiagonalNoise::isotropic(3, 0.1)));
    graph.push_continuous(PriorFactor::new(l1, center, DiagonalNoise::isotropic(2, 0.1)));
    graph.push_discrete(DiscretePriorFactor::new(class_key, &[0.9, 0.1]));
    initial.insert(x(0), pose0);
    initial.insert(l1, center);
    smoother.update(&graph, &initial, &DiscreteValues::new()).unwrap();

    let mut classes = Vec::new();
    classes.push(smoother.calculate_estimate().discrete[&class_key.key]);

    let mut odom = pose0;
    for i in 0..7 {
        let mut graph = HybridFactorGraph::new();
        let mut initial = Values::new();

        graph.push_continuous(BetweenFactor::new(x(i), x(i + 1), meas, meas_noise.clone()));

        // Semantic observation of the center landmark: early measurements
        // say class 0, later ones say class 1.
        let semantic_meas: [f64; 2] = if i < 2 { [0.9, 0.1] } else { [0.1, 0.9] };
        graph.push_hybrid(SemanticBearingRangeFactor::new(
            x(i),
            l1,
            class_key,
            &semantic_meas,
            bearing,
            circumradius,
            br_noise.clone(),
        ));

        odom = odom.compose(&meas, None, None);
        initial.insert(x(i + 1), odom);
        smoother.update(&graph, &initial, &DiscreteValues::new()).unwrap();

        classes.push(smoother.calculate_estimate().discrete[&class_key.key]);
    }

    let mut closure = HybridFactorGraph::new();
    closure.push_continuous(BetweenFactor::new(x(7), x(0), meas, meas_noise));
    smoother.update(&closure, &Values::new(), &DiscreteValues::new()).unwrap();

    let estimate = smoother.calculate_estimate();
    classes.push(estimate.discrete[&class_key.key]);

    // The class estimate starts at 0, ends at 1, and never flips back.
    assert_eq!(*classes.first().unwrap(), 0);
    assert_eq!(*classes.last().unwrap(), 1);
    let first_one = classes.iter().position(|c| *c == 1).expect("class must transition");
    assert!(classes[first_one..].iter().all(|c| *c == 1));

    // Geometry stays finite and the landmark stays near the center.
    for i in 0..8 {
        assert!(estimate.continuous.at(x(i)).is_finite());
    }
    let landmark = estimate.continuous.at_point2(l1);
    assert_relative_eq!(landmark.x, center.x, epsilon = 0.2);
    assert_relative_eq!(landmark.y, center.y, epsilon = 0.2);
}
