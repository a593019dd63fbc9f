// src/animator.rs - per-tick blending of every particle toward the active formation
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::formation::{FormationGenerator, FormationTarget, ParticleCategory};
use crate::gesture::FormationState;
use crate::smoothing::{approach_vec, lerp_factor};
use crate::Vec3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Formation blend rate, 1/s
    pub formation_speed: f32,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            formation_speed: 2.5,
        }
    }
}

/// Decorative motion that rides on top of the blended position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionProfile {
    /// Angular rate around x and y, rad/s
    pub spin_rate: [f32; 2],
    /// Offset each particle's spin by its phase so neighbours don't move in lockstep
    pub phase_spin: bool,
    pub tree_scale: f32,
    pub explode_scale: f32,
    pub pulse_amplitude: f32,
    pub pulse_frequency: f32,
}

impl MotionProfile {
    pub fn rotation(&self, elapsed: f32, phase: f32) -> Vec3 {
        let offset = if self.phase_spin { phase } else { 0.0 };
        Vec3::new(
            elapsed * self.spin_rate[0] + offset,
            elapsed * self.spin_rate[1] + offset,
            0.0,
        )
    }

    pub fn scale(&self, state: FormationState, elapsed: f32, phase: f32) -> f32 {
        let base = if state.is_exploded() {
            self.explode_scale
        } else {
            self.tree_scale
        };
        if self.pulse_amplitude == 0.0 {
            base
        } else {
            base + (elapsed * self.pulse_frequency + phase).sin() * self.pulse_amplitude
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub id: usize,
    pub tree_target: Vec3,
    pub explode_target: Vec3,
    pub current: Vec3,
    pub aux_phase: f32,
}

impl Particle {
    fn new(id: usize, target: FormationTarget) -> Self {
        Self {
            id,
            tree_target: target.tree,
            explode_target: target.explode,
            current: target.tree,
            aux_phase: id as f32,
        }
    }

    pub fn target(&self, state: FormationState) -> &Vec3 {
        match state {
            FormationState::Tree => &self.tree_target,
            FormationState::Explode => &self.explode_target,
        }
    }
}

/// What the renderer needs per instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticlePose {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: f32,
}

#[derive(Debug, Clone)]
pub struct ParticleLayer {
    category: ParticleCategory,
    motion: MotionProfile,
    particles: Vec<Particle>,
}

impl ParticleLayer {
    fn new(category: ParticleCategory, motion: MotionProfile, targets: Vec<FormationTarget>) -> Self {
        let particles = targets
            .into_iter()
            .enumerate()
            .map(|(i, target)| Particle::new(i, target))
            .collect();
        Self {
            category,
            motion,
            particles,
        }
    }

    pub fn category(&self) -> ParticleCategory {
        self.category
    }

    pub fn motion(&self) -> &MotionProfile {
        &self.motion
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    fn blend(&mut self, state: FormationState, factor: f32) {
        for particle in &mut self.particles {
            let target = *particle.target(state);
            approach_vec(&mut particle.current, &target, factor);
        }
    }

    /// Instance transforms for this tick. Reads `current` but never writes it.
    pub fn poses(&self, state: FormationState, elapsed: f32) -> impl Iterator<Item = ParticlePose> + '_ {
        self.particles.iter().map(move |particle| ParticlePose {
            position: particle.current,
            rotation: self.motion.rotation(elapsed, particle.aux_phase),
            scale: self.motion.scale(state, elapsed, particle.aux_phase),
        })
    }

    /// Largest per-axis gap between a particle and its active target.
    pub fn convergence_error(&self, state: FormationState) -> f32 {
        self.particles
            .iter()
            .map(|p| (p.target(state) - p.current).abs().max())
            .fold(0.0, f32::max)
    }
}

pub struct FormationAnimator {
    generator: FormationGenerator,
    layers: Vec<ParticleLayer>,
    speed: f32,
}

impl FormationAnimator {
    pub fn new(generator: FormationGenerator, config: &AnimationConfig) -> Result<Self> {
        if !(config.formation_speed.is_finite() && config.formation_speed > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "formation_speed must be positive, got {}",
                config.formation_speed
            )));
        }

        let mut layers = Vec::with_capacity(generator.layers().len());
        for layer in generator.layers() {
            let targets = generator.generate(layer.count, layer.category)?;
            layers.push(ParticleLayer::new(layer.category, layer.motion, targets));
        }

        Ok(Self {
            generator,
            layers,
            speed: config.formation_speed,
        })
    }

    /// Blend every particle toward the target set of `state`. The target is
    /// picked once per layer before any particle moves.
    pub fn tick(&mut self, state: FormationState, dt: f32) {
        let factor = lerp_factor(dt, self.speed);
        if factor == 0.0 {
            return;
        }
        for layer in &mut self.layers {
            layer.blend(state, factor);
        }
    }

    pub fn layers(&self) -> &[ParticleLayer] {
        &self.layers
    }

    pub fn layer(&self, category: ParticleCategory) -> Option<&ParticleLayer> {
        self.layers.iter().find(|layer| layer.category == category)
    }

    pub fn generator(&self) -> &FormationGenerator {
        &self.generator
    }

    pub fn particle_count(&self) -> usize {
        self.layers.iter().map(ParticleLayer::len).sum()
    }

    /// Regenerate a whole category with a new particle count. Live
    /// positions restart from the new tree targets.
    pub fn set_count(&mut self, category: ParticleCategory, count: usize) -> Result<()> {
        self.generator.set_count(category, count)?;
        let layer_config = self.generator.layer(category)?;
        let targets = self.generator.generate(count, category)?;
        let rebuilt = ParticleLayer::new(category, layer_config.motion, targets);
        if let Some(layer) = self.layers.iter_mut().find(|layer| layer.category == category) {
            *layer = rebuilt;
        }
        Ok(())
    }

    pub fn convergence_error(&self, state: FormationState) -> f32 {
        self.layers
            .iter()
            .map(|layer| layer.convergence_error(state))
            .fold(0.0, f32::max)
    }
}
