//! Device models for Breadboard.
//!
//! Every model here implements the `Element` contract from
//! `breadboard-core` and, where it makes sense to save one, the token
//! `Persist` protocol. The [`composite`] module wraps a nested network of
//! devices behind a single element.

pub mod composite;
pub mod diode;
pub mod gate;
pub mod noise;
pub mod passive;
pub mod sources;
pub mod trigger;
pub mod waveforms;

pub use composite::{Composite, CompositeModel, CompositePart};
pub use diode::Diode;
pub use gate::Inverter;
pub use noise::{HashNoise, NoiseSource};
pub use passive::{Capacitor, Inductor, Resistor};
pub use sources::{CurrentSource, Ground, SweepSource, VoltageSource};
pub use trigger::StopTrigger;
pub use waveforms::Waveform;

use breadboard_core::{Element, Error, Persist, Result, TokenReader};

/// Terminal count of a persisted device kind, used by loaders to split a
/// record into posts and parameters.
pub fn terminal_count(kind: &str) -> Option<usize> {
    Some(match kind {
        "ground" | "sweep" | "trigger" => 1,
        "resistor" | "capacitor" | "inductor" | "voltage" | "current" | "diode" | "inverter" => 2,
        _ => return None,
    })
}

/// Construct a device from its persisted kind tag and parameter tokens.
pub fn device_from_tokens(kind: &str, r: &mut TokenReader<'_>) -> Result<Box<dyn Element>> {
    Ok(match kind {
        "ground" => Box::new(Ground::read_params(r)?),
        "resistor" => Box::new(Resistor::read_params(r)?),
        "capacitor" => Box::new(Capacitor::read_params(r)?),
        "inductor" => Box::new(Inductor::read_params(r)?),
        "voltage" => Box::new(VoltageSource::read_params(r)?),
        "current" => Box::new(CurrentSource::read_params(r)?),
        "diode" => Box::new(Diode::read_params(r)?),
        "inverter" => Box::new(Inverter::read_params(r)?),
        "sweep" => Box::new(SweepSource::read_params(r)?),
        "trigger" => Box::new(StopTrigger::read_params(r)?),
        _ => return Err(Error::MalformedRecord(format!("unknown device kind '{kind}'"))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_covers_all_kinds() {
        for kind in [
            "ground",
            "resistor",
            "capacitor",
            "inductor",
            "voltage",
            "current",
            "diode",
            "inverter",
            "sweep",
            "trigger",
        ] {
            assert!(terminal_count(kind).is_some(), "{kind}");
        }
        assert_eq!(terminal_count("transputer"), None);
    }
}
