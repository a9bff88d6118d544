//! Adversarial update scheduling.
//!
//! In adversarial training the generator and discriminator sub-networks
//! alternate which one receives weight updates on a given step. The schedule
//! lives in an explicit [`GanCycle`] owned by the training loop and passed
//! `&mut` into each backward call, so a layer's backward pass is a function
//! of its gradients and the current phase — not of hidden layer state.

use serde::{Deserialize, Serialize};

/// Which adversarial sub-network a layer belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GanRole {
    /// Not part of an adversarial setup; always updated.
    #[default]
    None,
    /// Generator weights: updated only on generator steps.
    Generator,
    /// Discriminator weights: updated only on discriminator steps.
    Discriminator,
}

/// Tri-state counter scheduling generator vs discriminator updates.
///
/// Starts at 0 and advances `0 → 1 → 2 → 1 → 2 → …` after every backward
/// call; it never resets. Counter value 2 marks a generator step, any other
/// value a discriminator step.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GanCycle {
    mode: u8,
}

impl GanCycle {
    pub fn new() -> Self {
        Self { mode: 0 }
    }

    /// Current counter value (0, 1 or 2).
    pub fn mode(&self) -> u8 {
        self.mode
    }

    /// Advance to the next step: `next = (current == 2) ? 1 : current + 1`.
    pub fn advance(&mut self) {
        self.mode = if self.mode == 2 { 1 } else { self.mode + 1 };
    }

    /// Whether a layer with the given role receives weight updates right now.
    pub fn updates(&self, role: GanRole) -> bool {
        match role {
            GanRole::None => true,
            GanRole::Generator => self.mode == 2,
            GanRole::Discriminator => self.mode != 2,
        }
    }
}
