//! Circuit-file loading over the token protocol.
//!
//! One record per line; `#` starts a comment. A record is either
//! `wire <post> <post>`, `scope <element> <terminal> <speed> [color]`,
//! or a device: its kind tag, one post per terminal, then the device's
//! parameter tokens. Post ids are arbitrary integers chosen by whoever
//! wrote the file; terminals listing the same post share a net.

use anyhow::{Context, Result, anyhow, bail};

use breadboard_core::{Post, ScopeWave, TokenReader};
use breadboard_devices::{device_from_tokens, terminal_count};
use breadboard_solver::{SimConfig, Simulation};

/// Buckets a CLI-created scope holds.
const SCOPE_CAPACITY: usize = 512;

/// Build a [`Simulation`] from circuit-file text.
pub fn load(content: &str, config: SimConfig) -> Result<Simulation> {
    let mut sim = Simulation::new(config);
    for (i, raw) in content.lines().enumerate() {
        let line = match raw.find('#') {
            Some(pos) => &raw[..pos],
            None => raw,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        parse_record(&mut sim, line).with_context(|| format!("line {}: '{line}'", i + 1))?;
    }
    Ok(sim)
}

fn parse_record(sim: &mut Simulation, line: &str) -> Result<()> {
    let mut r = TokenReader::new(line);
    let kind = r.next_token()?;
    match kind {
        "wire" => {
            let a = post(&mut r)?;
            let b = post(&mut r)?;
            r.expect_end()?;
            sim.add_wire(a, b);
        }
        "scope" => {
            let element = index(&mut r)?;
            let terminal = index(&mut r)?;
            let speed = index(&mut r)?;
            let mut scope = ScopeWave::new(element, terminal, SCOPE_CAPACITY, speed);
            if !r.finished() {
                scope = scope.with_color(r.int()? as u32);
            }
            r.expect_end()?;
            if element >= sim.element_count() {
                bail!(
                    "scope watches element {element} but only {} are placed",
                    sim.element_count()
                );
            }
            if terminal >= sim.element(element).term_count() {
                bail!("element {element} has no terminal {terminal}");
            }
            sim.add_scope(scope);
        }
        _ => {
            let terms =
                terminal_count(kind).ok_or_else(|| anyhow!("unknown device kind '{kind}'"))?;
            let posts: Vec<Post> = (0..terms).map(|_| post(&mut r)).collect::<Result<_>>()?;
            let device = device_from_tokens(kind, &mut r)?;
            r.expect_end()?;
            sim.add_element(device, &posts);
        }
    }
    Ok(())
}

fn post(r: &mut TokenReader<'_>) -> Result<Post> {
    let v = r.int()?;
    u32::try_from(v).map_err(|_| anyhow!("post id {v} out of range"))
}

fn index(r: &mut TokenReader<'_>) -> Result<usize> {
    let v = r.int()?;
    usize::try_from(v).map_err(|_| anyhow!("index {v} out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIVIDER: &str = "\
# a 10 V divider with a probe wire
ground 1
voltage 1 2 dc 10
resistor 2 3 1k
resistor 3 1 1k     # lower leg
wire 2 4
scope 2 1 10
";

    #[test]
    fn test_load_divider() {
        let mut sim = load(DIVIDER, SimConfig::default()).unwrap();
        assert_eq!(sim.element_count(), 4);
        assert_eq!(sim.wire_count(), 1);
        assert_eq!(sim.scopes().len(), 1);

        sim.step().unwrap();
        assert!((sim.element(2).voltage(1) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_kind_is_reported_with_line() {
        let err = load("ground 1\nflux_capacitor 2 3 1.21G\n", SimConfig::default())
            .unwrap_err();
        assert!(format!("{err:#}").contains("line 2"), "{err:#}");
    }

    #[test]
    fn test_scope_bounds_are_checked() {
        assert!(load("scope 0 0 10\n", SimConfig::default()).is_err());
        assert!(
            load("ground 1\nscope 0 5 10\n", SimConfig::default()).is_err()
        );
    }

    #[test]
    fn test_trailing_tokens_are_rejected_or_color_parsed() {
        // A fourth scope token is the color tag.
        let sim = load("ground 1\nscope 0 0 10 255\n", SimConfig::default()).unwrap();
        assert_eq!(sim.scopes()[0].color(), 255);
        // Anything further is an error.
        assert!(load("ground 1\nscope 0 0 10 255 9\n", SimConfig::default()).is_err());
    }
}
