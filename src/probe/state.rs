//! Bake state machine

use std::fmt;

/// Where a probe is in its bake.
///
/// A bake runs to completion inside one `update` call, so outside of it the
/// state is `Idle` unless the last bake failed, in which case it names the
/// stage that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BakeState {
    #[default]
    Idle,
    /// Rendering the scene into the dynamic cubemap
    Capturing,
    /// Projecting the cubemap into the octahedral map
    Converting,
    /// Building the mip and roughness rows of the atlas
    Leveling,
    /// Convolving and writing the irradiance corner
    Irradiance,
}

impl BakeState {
    pub fn is_idle(&self) -> bool {
        matches!(self, BakeState::Idle)
    }
}

impl fmt::Display for BakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BakeState::Idle => "idle",
            BakeState::Capturing => "capturing",
            BakeState::Converting => "converting",
            BakeState::Leveling => "leveling",
            BakeState::Irradiance => "irradiance",
        };
        f.write_str(name)
    }
}
