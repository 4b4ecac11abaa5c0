//! Simulation state and stepping.
//!
//! [`PhysicsState`] owns every body, constraint and force generator, plus the
//! assembler and solver that couple them. One call to
//! [`PhysicsState::step`] advances the system by `dt` in equal substeps:
//!
//! ```text
//! for each substep h = dt / substeps:
//!   1. generators, then the interaction spring, fill force accumulators
//!   2. if constraints exist:
//!        rebuild J, J̇, b; solve A·λ = b; add Qhat = Jᵀ·λ to accumulators
//!   3. integrate translation of every body, then rotation of every body
//!   4. refresh diagnostics
//! ```
//!
//! # Example
//!
//! ```
//! use planar_core::{Body, PhysicsConfig, PhysicsState, SimError, Vector2};
//!
//! let mut state = PhysicsState::new(PhysicsConfig::default().with_gravity(10.0))?;
//! state.add_gravity();
//!
//! let pivot = state.add_body(Body::new(Vector2::new(0.0, 0.0), 1.0))?;
//! let bob = state.add_body(Body::new(Vector2::new(1.0, 0.0), 1.0))?;
//! state.add_fixed_pos(pivot)?;
//! state.add_link(pivot, bob)?;
//!
//! for _ in 0..120 {
//!     state.step(1.0 / 120.0, 8)?;
//! }
//!
//! let position = state.position(bob).ok_or(SimError::StaleBody(bob))?;
//! assert!((position.norm() - 1.0).abs() < 1e-2);
//! # Ok::<(), SimError>(())
//! ```

use nalgebra::{DVector, Vector2};
use planar_constraint::{
    Attachment, Constraint, ConstraintForceSolver, ConstraintHandle, ConstraintManager,
    FixedCoordinate, FixedOmega, FixedRotation, Link, OffsetLink,
};
use planar_types::{
    Body, BodyHandle, InverseMassModel, PhysicsConfig, Result, SimError, SolverConfig,
    Stabilization,
};
use slotmap::SlotMap;
use tracing::debug;

use crate::diagnostics::Diagnostics;
use crate::force::{ForceGenerator, GeneratorHandle, MouseSpring, SpringJoint};

/// The two rows created by [`PhysicsState::add_fixed_pos`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPos {
    /// The x pin.
    pub x: ConstraintHandle,
    /// The y pin.
    pub y: ConstraintHandle,
}

/// Owner of the simulated system.
#[derive(Debug, Clone)]
pub struct PhysicsState {
    config: PhysicsConfig,
    bodies: SlotMap<BodyHandle, Body>,
    constraints: SlotMap<ConstraintHandle, Constraint>,
    generators: SlotMap<GeneratorHandle, ForceGenerator>,
    interaction: Option<MouseSpring>,
    manager: ConstraintManager,
    solver: ConstraintForceSolver,
    diagnostics: Diagnostics,
    time: f64,
    step_count: u64,
}

impl Default for PhysicsState {
    fn default() -> Self {
        Self::from_valid_config(PhysicsConfig::default())
    }
}

impl PhysicsState {
    /// Create an empty simulation.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] if the configuration is invalid.
    pub fn new(config: PhysicsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: PhysicsConfig) -> Self {
        Self {
            manager: ConstraintManager::new(config.stabilization, config.inverse_mass),
            solver: ConstraintForceSolver::new(config.solver),
            config,
            bodies: SlotMap::with_key(),
            constraints: SlotMap::with_key(),
            generators: SlotMap::with_key(),
            interaction: None,
            diagnostics: Diagnostics::default(),
            time: 0.0,
            step_count: 0,
        }
    }

    // ==================== Configuration ====================

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Replace the configuration and retune everything that depends on it.
    ///
    /// Body state, multipliers and accumulated diagnostics are kept.
    pub fn set_config(&mut self, config: PhysicsConfig) -> Result<()> {
        config.validate()?;

        self.manager.set_stabilization(config.stabilization);
        self.manager.set_inverse_mass_model(config.inverse_mass);
        self.solver.set_config(config.solver);

        for generator in self.generators.values_mut() {
            generator.retune(&config);
        }
        if let Some(spring) = &mut self.interaction {
            spring.stiffness = config.interaction_stiffness;
            spring.damping = config.interaction_damping;
        }
        for constraint in self.constraints.values_mut() {
            if let Constraint::FixedOmega(motor) = constraint {
                motor.velocity = config.motor_velocity;
            }
        }

        self.config = config;
        Ok(())
    }

    /// Set the gravity magnitude of every gravity generator.
    pub fn set_gravity(&mut self, gravity: f64) -> Result<()> {
        self.set_config(self.config.clone().with_gravity(gravity))
    }

    /// Set the coefficient of every damping generator.
    pub fn set_linear_damping(&mut self, coefficient: f64) -> Result<()> {
        self.set_config(self.config.clone().with_linear_damping(coefficient))
    }

    /// Set the stiffness of every spring joint.
    pub fn set_spring_stiffness(&mut self, stiffness: f64) -> Result<()> {
        self.set_config(self.config.clone().with_spring_stiffness(stiffness))
    }

    /// Set the interaction spring stiffness.
    pub fn set_interaction_stiffness(&mut self, stiffness: f64) -> Result<()> {
        let mut config = self.config.clone();
        config.interaction_stiffness = stiffness;
        self.set_config(config)
    }

    /// Set the target velocity of every angular motor.
    pub fn set_motor_velocity(&mut self, velocity: f64) -> Result<()> {
        self.set_config(self.config.clone().with_motor_velocity(velocity))
    }

    /// Set the Baumgarte gains.
    pub fn set_stabilization(&mut self, stabilization: Stabilization) -> Result<()> {
        self.set_config(self.config.clone().with_stabilization(stabilization))
    }

    /// Set the solver configuration.
    pub fn set_solver_config(&mut self, solver: SolverConfig) -> Result<()> {
        self.set_config(self.config.clone().with_solver(solver))
    }

    /// Set the inverse-mass model.
    pub fn set_inverse_mass_model(&mut self, model: InverseMassModel) -> Result<()> {
        self.set_config(self.config.clone().with_inverse_mass(model))
    }

    // ==================== Bodies ====================

    /// Add a body.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidMassProperties`] for non-positive mass.
    pub fn add_body(&mut self, body: Body) -> Result<BodyHandle> {
        body.validate()?;
        Ok(self.bodies.insert(body))
    }

    /// Remove a body together with every constraint and generator that
    /// references it.
    pub fn remove_body(&mut self, handle: BodyHandle) -> Option<Body> {
        let body = self.bodies.remove(handle)?;

        let before = self.constraints.len();
        self.constraints.retain(|_, c| !c.involves(handle));
        let removed_constraints = before - self.constraints.len();
        self.manager.resize_lambda(self.constraints.len());

        let before = self.generators.len();
        self.generators.retain(|_, g| !g.involves(handle));
        let removed_generators = before - self.generators.len();

        let released = self
            .interaction
            .take_if(|spring| spring.body == handle)
            .is_some();

        if removed_constraints > 0 || removed_generators > 0 || released {
            debug!(
                ?handle,
                removed_constraints, removed_generators, released, "cascaded body removal"
            );
        }

        Some(body)
    }

    /// Get a body.
    #[must_use]
    pub fn body(&self, handle: BodyHandle) -> Option<&Body> {
        self.bodies.get(handle)
    }

    /// Get a body mutably.
    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut Body> {
        self.bodies.get_mut(handle)
    }

    /// Iterate over bodies in column-block order.
    pub fn bodies(&self) -> impl Iterator<Item = (BodyHandle, &Body)> {
        self.bodies.iter()
    }

    /// Number of bodies.
    #[must_use]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Handle of the body at dense index `index` in column-block order.
    #[must_use]
    pub fn handle_at(&self, index: usize) -> Option<BodyHandle> {
        self.bodies.keys().nth(index)
    }

    /// Position of a body.
    #[must_use]
    pub fn position(&self, handle: BodyHandle) -> Option<Vector2<f64>> {
        self.bodies.get(handle).map(|b| b.position)
    }

    /// Velocity of a body.
    #[must_use]
    pub fn velocity(&self, handle: BodyHandle) -> Option<Vector2<f64>> {
        self.bodies.get(handle).map(|b| b.velocity)
    }

    fn live_body(&self, handle: BodyHandle) -> Result<&Body> {
        self.bodies.get(handle).ok_or(SimError::StaleBody(handle))
    }

    fn live_pair(&self, a: BodyHandle, b: BodyHandle) -> Result<(&Body, &Body)> {
        if a == b {
            return Err(SimError::SelfLink(a));
        }
        Ok((self.live_body(a)?, self.live_body(b)?))
    }

    // ==================== Constraints ====================

    /// Insert a pre-built constraint.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::StaleBody`] if it references a removed body and
    /// [`SimError::SelfLink`] if both ends name the same body.
    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<ConstraintHandle> {
        let (first, second) = constraint.bodies();
        self.live_body(first)?;
        if let Some(second) = second {
            self.live_pair(first, second)?;
        }
        let handle = self.constraints.insert(constraint);
        self.manager.resize_lambda(self.constraints.len());
        Ok(handle)
    }

    /// Pin a body's x coordinate at its current value.
    pub fn add_fixed_x(&mut self, body: BodyHandle) -> Result<ConstraintHandle> {
        let target = self.live_body(body)?.position.x;
        self.add_constraint(Constraint::FixedX(FixedCoordinate::new(body, target)))
    }

    /// Pin a body's y coordinate at its current value.
    pub fn add_fixed_y(&mut self, body: BodyHandle) -> Result<ConstraintHandle> {
        let target = self.live_body(body)?.position.y;
        self.add_constraint(Constraint::FixedY(FixedCoordinate::new(body, target)))
    }

    /// Pin a body's position, as one x row and one y row.
    pub fn add_fixed_pos(&mut self, body: BodyHandle) -> Result<FixedPos> {
        let x = self.add_fixed_x(body)?;
        let y = self.add_fixed_y(body)?;
        Ok(FixedPos { x, y })
    }

    /// Link two body centers at their current distance.
    pub fn add_link(&mut self, a: BodyHandle, b: BodyHandle) -> Result<ConstraintHandle> {
        let (body_a, body_b) = self.live_pair(a, b)?;
        let length = (body_b.position - body_a.position).norm();
        self.add_link_with_length(a, b, length)
    }

    /// Link two body centers at an explicit rest length.
    pub fn add_link_with_length(
        &mut self,
        a: BodyHandle,
        b: BodyHandle,
        rest_length: f64,
    ) -> Result<ConstraintHandle> {
        self.add_constraint(Constraint::Link(Link::new(a, b, rest_length)))
    }

    /// Link two anchors given as world-frame offsets from each body center.
    ///
    /// The anchors rotate with their bodies from here on. The rest length is
    /// the current anchor distance.
    pub fn add_offset_link(
        &mut self,
        a: BodyHandle,
        offset_a: Vector2<f64>,
        b: BodyHandle,
        offset_b: Vector2<f64>,
    ) -> Result<ConstraintHandle> {
        let (body_a, body_b) = self.live_pair(a, b)?;
        let rest_length = ((body_b.position + offset_b) - (body_a.position + offset_a)).norm();
        let link = OffsetLink::new(
            Attachment::new(a, offset_a, body_a.angle),
            Attachment::new(b, offset_b, body_b.angle),
            rest_length,
        );
        self.add_constraint(Constraint::OffsetLink(link))
    }

    /// Pin a body's angle at its current value.
    pub fn add_fixed_rotation(&mut self, body: BodyHandle) -> Result<ConstraintHandle> {
        let target = self.live_body(body)?.angle;
        self.add_constraint(Constraint::FixedRotation(FixedRotation::new(body, target)))
    }

    /// Drive a body's angular velocity toward the configured motor velocity.
    pub fn add_fixed_omega(&mut self, body: BodyHandle) -> Result<ConstraintHandle> {
        let angle = self.live_body(body)?.angle;
        let motor = FixedOmega::new(body, self.config.motor_velocity, angle);
        self.add_constraint(Constraint::FixedOmega(motor))
    }

    /// Remove a constraint.
    pub fn remove_constraint(&mut self, handle: ConstraintHandle) -> Option<Constraint> {
        let removed = self.constraints.remove(handle)?;
        self.manager.resize_lambda(self.constraints.len());
        Some(removed)
    }

    /// Get a constraint.
    #[must_use]
    pub fn constraint(&self, handle: ConstraintHandle) -> Option<&Constraint> {
        self.constraints.get(handle)
    }

    /// Iterate over constraints in row order.
    pub fn constraints(&self) -> impl Iterator<Item = (ConstraintHandle, &Constraint)> {
        self.constraints.iter()
    }

    /// Number of constraint rows.
    #[must_use]
    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    // ==================== Force Generators ====================

    /// Add a generator.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::StaleBody`] if it references a removed body and
    /// [`SimError::SelfLink`] for a spring from a body to itself.
    pub fn add_generator(&mut self, generator: ForceGenerator) -> Result<GeneratorHandle> {
        match generator {
            ForceGenerator::SpringJoint(s) => {
                self.live_pair(s.a, s.b)?;
            }
            ForceGenerator::MouseSpring(m) => {
                self.live_body(m.body)?;
            }
            ForceGenerator::Gravity(_) | ForceGenerator::Wind(_) | ForceGenerator::LinearDamping(_) => {}
        }
        Ok(self.generators.insert(generator))
    }

    /// Add gravity at the configured magnitude.
    pub fn add_gravity(&mut self) -> GeneratorHandle {
        self.generators
            .insert(ForceGenerator::gravity(self.config.gravity))
    }

    /// Add linear damping at the configured coefficient.
    pub fn add_linear_damping(&mut self) -> GeneratorHandle {
        self.generators
            .insert(ForceGenerator::linear_damping(self.config.linear_damping))
    }

    /// Add a constant force field.
    pub fn add_wind(&mut self, force: Vector2<f64>) -> GeneratorHandle {
        self.generators.insert(ForceGenerator::wind(force))
    }

    /// Connect two bodies with a spring at their current distance.
    pub fn add_spring(&mut self, a: BodyHandle, b: BodyHandle) -> Result<GeneratorHandle> {
        let (body_a, body_b) = self.live_pair(a, b)?;
        let length = (body_b.position - body_a.position).norm();
        let spring = SpringJoint::new(a, b, self.config.spring_stiffness, length);
        self.add_generator(ForceGenerator::SpringJoint(spring))
    }

    /// Remove a generator.
    pub fn remove_generator(&mut self, handle: GeneratorHandle) -> Option<ForceGenerator> {
        self.generators.remove(handle)
    }

    /// Get a generator.
    #[must_use]
    pub fn generator(&self, handle: GeneratorHandle) -> Option<&ForceGenerator> {
        self.generators.get(handle)
    }

    /// Iterate over generators.
    pub fn generators(&self) -> impl Iterator<Item = (GeneratorHandle, &ForceGenerator)> {
        self.generators.iter()
    }

    /// Number of generators.
    #[must_use]
    pub fn generator_count(&self) -> usize {
        self.generators.len()
    }

    // ==================== Interaction ====================

    /// Attach the interaction spring to `body`, pulling toward `anchor`.
    ///
    /// Replaces any existing grab.
    pub fn grab(&mut self, body: BodyHandle, anchor: Vector2<f64>) -> Result<()> {
        self.live_body(body)?;
        self.interaction = Some(MouseSpring::new(
            body,
            anchor,
            self.config.interaction_stiffness,
            self.config.interaction_damping,
        ));
        Ok(())
    }

    /// Move the interaction anchor. No effect without a grab.
    pub fn drag_to(&mut self, anchor: Vector2<f64>) {
        if let Some(spring) = &mut self.interaction {
            spring.anchor = anchor;
        }
    }

    /// Detach the interaction spring.
    pub fn release(&mut self) -> Option<MouseSpring> {
        self.interaction.take()
    }

    /// The active interaction spring.
    #[must_use]
    pub const fn interaction(&self) -> Option<&MouseSpring> {
        self.interaction.as_ref()
    }

    // ==================== Stepping ====================

    /// Advance the simulation by `dt` in `substeps` equal slices.
    ///
    /// # Errors
    ///
    /// - [`SimError::InvalidTimestep`] / [`SimError::InvalidSubsteps`] for bad input
    /// - assembly errors from the constraint manager
    /// - [`SimError::Diverged`] if a body state becomes non-finite
    pub fn step(&mut self, dt: f64, substeps: usize) -> Result<()> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(SimError::InvalidTimestep(dt));
        }
        if substeps == 0 {
            return Err(SimError::InvalidSubsteps(substeps));
        }

        #[allow(clippy::cast_precision_loss)]
        let h = dt / substeps as f64;
        for _ in 0..substeps {
            self.substep(h)?;
        }

        self.time += dt;
        self.step_count += 1;
        Ok(())
    }

    fn substep(&mut self, h: f64) -> Result<()> {
        // 1. Applied forces
        for generator in self.generators.values() {
            generator.apply(&mut self.bodies);
        }
        if let Some(spring) = &self.interaction {
            spring.apply(&mut self.bodies);
        }

        // 2. Constraint forces
        if self.constraints.is_empty() {
            self.diagnostics.constraint_error = 0.0;
            self.diagnostics.constraint_velocity_error = 0.0;
        } else {
            self.manager.rebuild(&self.bodies, &mut self.constraints, h)?;
            let report = self.solver.solve(&mut self.manager)?;
            let qhat = self.manager.constraint_forces()?;
            self.apply_constraint_forces(&qhat);

            self.diagnostics.constraint_error = self.manager.constraint_error();
            self.diagnostics.constraint_velocity_error = self.manager.constraint_velocity_error();
            self.diagnostics.last_solve = Some(report);
        }

        // 3. Integration, all translations before all rotations
        for body in self.bodies.values_mut() {
            body.integrate_translation(h);
        }
        for body in self.bodies.values_mut() {
            body.integrate_rotation(h);
        }

        if let Some((handle, _)) = self.bodies.iter().find(|(_, b)| !b.is_finite()) {
            return Err(SimError::diverged(format!(
                "non-finite state for body {handle:?}"
            )));
        }

        // 4. Diagnostics
        self.refresh_diagnostics();
        Ok(())
    }

    fn apply_constraint_forces(&mut self, qhat: &DVector<f64>) {
        for (index, &handle) in self.manager.body_handles().iter().enumerate() {
            if let Some(body) = self.bodies.get_mut(handle) {
                let c = 3 * index;
                body.apply_force(Vector2::new(qhat[c], qhat[c + 1]));
                body.apply_torque(qhat[c + 2]);
            }
        }
    }

    fn refresh_diagnostics(&mut self) {
        let kinetic = self.kinetic_energy();
        let potential = self.potential_energy();
        let d = &mut self.diagnostics;
        d.kinetic_energy = kinetic;
        d.potential_energy = potential;
        d.system_energy = kinetic + potential;
        d.accumulated_solver_error = self.solver.accumulated_error();
        d.unconverged_solves = self.solver.unconverged_solves();
    }

    // ==================== Observability ====================

    /// Total kinetic energy of all bodies.
    #[must_use]
    pub fn kinetic_energy(&self) -> f64 {
        self.bodies.values().map(Body::kinetic_energy).sum()
    }

    /// Sum of generator energies, interaction spring included.
    #[must_use]
    pub fn potential_energy(&self) -> f64 {
        let generators: f64 = self
            .generators
            .values()
            .map(|g| g.energy(&self.bodies))
            .sum();
        let interaction = self
            .interaction
            .as_ref()
            .map_or(0.0, |spring| spring.energy(&self.bodies));
        generators + interaction
    }

    /// Kinetic plus potential energy.
    #[must_use]
    pub fn system_energy(&self) -> f64 {
        self.kinetic_energy() + self.potential_energy()
    }

    /// Metrics from the most recent substep.
    #[must_use]
    pub const fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Warm-start multipliers, one per constraint row.
    #[must_use]
    pub fn lambda(&self) -> &DVector<f64> {
        self.manager.lambda()
    }

    /// Simulated time.
    #[must_use]
    pub const fn time(&self) -> f64 {
        self.time
    }

    /// Number of completed `step` calls.
    #[must_use]
    pub const fn step_count(&self) -> u64 {
        self.step_count
    }
}
