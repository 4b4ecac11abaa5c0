//! Behavior of individual constraint kinds inside a running simulation.

use planar_core::{
    Body, Constraint, FixedRotation, PhysicsConfig, PhysicsState, SimError, Vector2,
};

const DT: f64 = 1.0 / 120.0;
const SUBSTEPS: usize = 8;

fn run(state: &mut PhysicsState, frames: usize) {
    for _ in 0..frames {
        state.step(DT, SUBSTEPS).unwrap();
    }
}

#[test]
fn multipliers_track_constraint_count() {
    let mut state = PhysicsState::new(PhysicsConfig::default()).unwrap();
    state.add_gravity();
    let a = state.add_body(Body::new(Vector2::new(0.0, 0.0), 1.0)).unwrap();
    let b = state.add_body(Body::new(Vector2::new(1.0, 0.0), 1.0)).unwrap();
    let c = state.add_body(Body::new(Vector2::new(2.0, 0.0), 1.0)).unwrap();

    let pin = state.add_fixed_pos(a).unwrap();
    let ab = state.add_link(a, b).unwrap();
    run(&mut state, 2);
    assert_eq!(state.lambda().len(), 3);

    state.add_link(b, c).unwrap();
    assert_eq!(state.lambda().len(), 4);
    run(&mut state, 2);

    state.remove_constraint(ab).unwrap();
    state.remove_constraint(pin.y).unwrap();
    assert_eq!(state.lambda().len(), 2);
    assert!(state.remove_constraint(ab).is_none());
    run(&mut state, 2);
    assert_eq!(state.lambda().len(), state.constraint_count());
}

#[test]
fn fixed_rotation_pulls_angle_to_target() {
    let mut state = PhysicsState::new(PhysicsConfig::default().zero_gravity()).unwrap();
    let body = state
        .add_body(Body::new(Vector2::zeros(), 1.0).with_angle(0.5))
        .unwrap();
    state
        .add_constraint(Constraint::FixedRotation(FixedRotation::new(body, 0.0)))
        .unwrap();

    run(&mut state, 120);

    let angle = state.body(body).unwrap().angle;
    assert!(angle.abs() < 1e-2, "angle = {angle}");
    // Only the rotational coordinate is constrained
    assert_eq!(state.position(body).unwrap(), Vector2::zeros());
}

#[test]
fn fixed_omega_drives_angular_velocity() {
    let mut state = PhysicsState::new(
        PhysicsConfig::default()
            .zero_gravity()
            .with_motor_velocity(2.0),
    )
    .unwrap();
    let body = state.add_body(Body::new(Vector2::zeros(), 1.0)).unwrap();
    state.add_fixed_omega(body).unwrap();

    run(&mut state, 120);

    let omega = state.body(body).unwrap().angular_velocity;
    assert!((omega - 2.0).abs() < 1e-3, "angular velocity = {omega}");

    // Retuning the motor reaches live constraints
    state.set_motor_velocity(-1.0).unwrap();
    run(&mut state, 120);
    let omega = state.body(body).unwrap().angular_velocity;
    assert!((omega + 1.0).abs() < 1e-3, "angular velocity = {omega}");
}

#[test]
fn offset_link_keeps_anchor_distance() {
    let mut state = PhysicsState::new(PhysicsConfig::default().with_gravity(10.0)).unwrap();
    state.add_gravity();
    let anchor = state.add_body(Body::fixed(Vector2::zeros())).unwrap();
    let bob = state.add_body(Body::new(Vector2::new(1.7, 0.0), 1.0)).unwrap();
    let link = state
        .add_offset_link(anchor, Vector2::new(0.5, 0.0), bob, Vector2::new(-0.2, 0.0))
        .unwrap();

    let (start, end) = state.link_endpoints(link).unwrap();
    assert!(((end - start).norm() - 1.0).abs() < 1e-12);

    let mut worst: f64 = 0.0;
    for _ in 0..300 {
        state.step(DT, SUBSTEPS).unwrap();
        let (start, end) = state.link_endpoints(link).unwrap();
        worst = worst.max(((end - start).norm() - 1.0).abs());
    }

    assert!(worst < 2e-2, "anchor distance drifted by {worst}");
    // The fixed body does not move
    assert_eq!(state.position(anchor).unwrap(), Vector2::zeros());
    assert!(state.position(bob).unwrap().y < 0.0);
}

#[test]
fn removing_a_body_cascades() {
    let mut state = PhysicsState::new(PhysicsConfig::default()).unwrap();
    let gravity = state.add_gravity();
    let pivot = state.add_body(Body::new(Vector2::new(0.0, 0.0), 1.0)).unwrap();
    let bob = state.add_body(Body::new(Vector2::new(1.0, 0.0), 1.0)).unwrap();
    let other = state.add_body(Body::new(Vector2::new(2.0, 0.0), 1.0)).unwrap();

    state.add_fixed_pos(pivot).unwrap();
    state.add_link(pivot, bob).unwrap();
    let survivor = state.add_link(bob, other).unwrap();
    let spring = state.add_spring(pivot, other).unwrap();
    state.grab(pivot, Vector2::new(0.0, 1.0)).unwrap();
    run(&mut state, 2);

    assert!(state.remove_body(pivot).is_some());

    assert_eq!(state.constraint_count(), 1);
    assert!(state.constraint(survivor).is_some());
    assert_eq!(state.lambda().len(), 1);
    assert!(state.generator(spring).is_none());
    assert!(state.generator(gravity).is_some());
    assert!(state.interaction().is_none());

    // The handle is dead for good
    assert!(state.body(pivot).is_none());
    assert_eq!(state.add_fixed_x(pivot), Err(SimError::StaleBody(pivot)));
    run(&mut state, 2);
}

#[test]
fn removing_every_body_leaves_empty_system() {
    let mut state = PhysicsState::new(PhysicsConfig::default()).unwrap();
    state.add_gravity();
    let a = state.add_body(Body::new(Vector2::zeros(), 1.0)).unwrap();
    let b = state.add_body(Body::new(Vector2::new(1.0, 0.0), 1.0)).unwrap();
    state.add_fixed_pos(a).unwrap();
    state.add_link(a, b).unwrap();
    run(&mut state, 1);

    state.remove_body(a);
    state.remove_body(b);

    assert_eq!(state.constraint_count(), 0);
    assert_eq!(state.lambda().len(), 0);
    run(&mut state, 1);
    assert_eq!(state.diagnostics().constraint_error, 0.0);
}
