use anyhow::{Result, bail};
use std::collections::HashSet;

/// Largest number of seeds a single `a..b` range may expand to.
const MAX_RANGE_SEEDS: u64 = 10_000;

/// Resolve CLI seed tokens into a de-duplicated, ordered seed list.
///
/// Accepts decimal integers (negative values use their magnitude), `0x` hex
/// literals and half-open ranges written `start..end`.
pub fn resolve_seed_inputs(tokens: &[String]) -> Result<Vec<u32>> {
    let mut pending: Vec<u32> = Vec::new();

    for token in tokens {
        if token.is_empty() {
            continue;
        }

        if let Some((start, end)) = token.split_once("..") {
            let (start, end) = (parse_seed(start)?, parse_seed(end)?);
            if end <= start {
                bail!("Empty seed range: {token}");
            }
            if u64::from(end - start) > MAX_RANGE_SEEDS {
                bail!("Seed range {token} expands past {MAX_RANGE_SEEDS} seeds");
            }
            pending.extend(start..end);
            continue;
        }

        pending.push(parse_seed(token)?);
    }

    let mut seen = HashSet::new();
    pending.retain(|seed| seen.insert(*seed));

    if pending.is_empty() {
        pending.push(1337);
    }

    Ok(pending)
}

fn parse_seed(raw: &str) -> Result<u32> {
    let raw = raw.trim();
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        if let Ok(value) = u32::from_str_radix(hex, 16) {
            return Ok(value);
        }
    } else if let Ok(value) = raw.parse::<i64>()
        && let Ok(value) = u32::try_from(value.unsigned_abs())
    {
        return Ok(value);
    }
    bail!("Unrecognized seed token: {raw}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(raw: &[&str]) -> Vec<String> {
        raw.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn resolves_numeric_hex_and_ranges() {
        let seeds = resolve_seed_inputs(&tokens(&["42", "-7", "0xff", "3..6", "4"])).unwrap();
        assert_eq!(seeds, vec![42, 7, 255, 3, 4, 5]);
    }

    #[test]
    fn empty_input_defaults_to_1337() {
        assert_eq!(resolve_seed_inputs(&[]).unwrap(), vec![1337]);
    }

    #[test]
    fn rejects_garbage_and_bad_ranges() {
        assert!(resolve_seed_inputs(&tokens(&["banana"])).is_err());
        assert!(resolve_seed_inputs(&tokens(&["9..2"])).is_err());
        assert!(resolve_seed_inputs(&tokens(&["0..100000"])).is_err());
        assert!(resolve_seed_inputs(&tokens(&["99999999999"])).is_err());
    }
}
