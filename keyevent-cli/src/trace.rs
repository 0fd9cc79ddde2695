use anyhow::{bail, Context, Result};
use keyevent::{BackendMode, Locator};

/// A key declared by a trace.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceKey {
    pub name: String,
    pub id: u16,
    pub locator: Locator,
}

/// A raw level change at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub at_ms: u32,
    /// Index into `Trace::keys`.
    pub key: usize,
    pub pressed: bool,
}

/// A recorded session of raw key levels.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    pub mode: BackendMode,
    pub keys: Vec<TraceKey>,
    pub steps: Vec<Step>,
    /// Times at which the snapshot scan fails (custom mode only).
    pub failures: Vec<u32>,
    pub end_ms: u32,
}

/// Parse a trace file.
///
/// Directives, one per line (`#` starts a comment):
/// - `mode gpio|matrix|custom`
/// - `key <name> <id> pin <n>` / `matrix <row> <col>` / `code <n>`
/// - `at <ms> <name> down|up`
/// - `fail <ms>`
/// - `end <ms>`
///
/// Without a `mode` line the mode follows the first key's locator. Without
/// an `end` line the trace ends one second after the last step.
pub fn parse_trace(input: &str) -> Result<Trace> {
    let mut mode: Option<BackendMode> = None;
    let mut keys: Vec<TraceKey> = Vec::new();
    let mut steps: Vec<Step> = Vec::new();
    let mut failures: Vec<u32> = Vec::new();
    let mut end_ms: Option<u32> = None;

    for (line_num, line) in input.lines().enumerate() {
        let line = match line.find('#') {
            Some(pos) => &line[..pos],
            None => line,
        };
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            continue;
        }
        let lineno = line_num + 1;

        match words[0] {
            "mode" => {
                if words.len() != 2 {
                    bail!("line {}: expected `mode gpio|matrix|custom`", lineno);
                }
                if mode.is_some() || !keys.is_empty() {
                    bail!("line {}: mode must come first and only once", lineno);
                }
                mode = Some(parse_mode(words[1]).with_context(|| format!("line {}", lineno))?);
            }
            "key" => {
                let key = parse_key(&words[1..]).with_context(|| format!("line {}", lineno))?;
                let key_mode = key.locator.mode();
                match mode {
                    Some(m) if m != key_mode => {
                        bail!("line {}: {:?} key in a {:?} trace", lineno, key_mode, m)
                    }
                    Some(_) => {}
                    None => mode = Some(key_mode),
                }
                if keys.iter().any(|k| k.name == key.name) {
                    bail!("line {}: key {} declared twice", lineno, key.name);
                }
                keys.push(key);
            }
            "at" => {
                if words.len() != 4 {
                    bail!("line {}: expected `at <ms> <name> down|up`", lineno);
                }
                let at_ms = parse_ms(words[1]).with_context(|| format!("line {}", lineno))?;
                let key = keys
                    .iter()
                    .position(|k| k.name == words[2])
                    .with_context(|| format!("line {}: unknown key {}", lineno, words[2]))?;
                let pressed = match words[3] {
                    "down" => true,
                    "up" => false,
                    other => bail!("line {}: expected down or up, got {}", lineno, other),
                };
                if let Some(last) = steps.last() {
                    if at_ms < last.at_ms {
                        bail!("line {}: steps must be in time order", lineno);
                    }
                }
                steps.push(Step { at_ms, key, pressed });
            }
            "fail" => {
                if words.len() != 2 {
                    bail!("line {}: expected `fail <ms>`", lineno);
                }
                failures.push(parse_ms(words[1]).with_context(|| format!("line {}", lineno))?);
            }
            "end" => {
                if words.len() != 2 {
                    bail!("line {}: expected `end <ms>`", lineno);
                }
                end_ms = Some(parse_ms(words[1]).with_context(|| format!("line {}", lineno))?);
            }
            other => bail!("line {}: unknown directive {}", lineno, other),
        }
    }

    let Some(mode) = mode else {
        bail!("trace declares no keys");
    };
    if !failures.is_empty() && mode != BackendMode::Custom {
        bail!("snapshot failures only apply to custom traces");
    }
    let last_step = steps.last().map_or(0, |s| s.at_ms);
    let end_ms = end_ms.unwrap_or(last_step.saturating_add(1000));
    if end_ms < last_step {
        bail!("trace ends at {} ms before its last step at {} ms", end_ms, last_step);
    }
    failures.sort_unstable();

    Ok(Trace {
        mode,
        keys,
        steps,
        failures,
        end_ms,
    })
}

fn parse_mode(word: &str) -> Result<BackendMode> {
    match word {
        "gpio" => Ok(BackendMode::Gpio),
        "matrix" => Ok(BackendMode::Matrix),
        "custom" => Ok(BackendMode::Custom),
        other => bail!("unknown mode {}", other),
    }
}

fn parse_key(words: &[&str]) -> Result<TraceKey> {
    if words.len() < 4 {
        bail!("expected `key <name> <id> pin|matrix|code ...`");
    }
    let name = words[0].to_string();
    let id = words[1]
        .parse::<u16>()
        .with_context(|| format!("invalid key id {}", words[1]))?;
    let locator = match (words[2], &words[3..]) {
        ("pin", [pin]) => Locator::Pin(parse_num(pin)?),
        ("matrix", [row, col]) => Locator::Matrix {
            row: parse_num(row)?,
            col: parse_num(col)?,
        },
        ("code", [code]) => Locator::Code(parse_num(code)?),
        (kind, args) => bail!("bad locator `{} {}`", kind, args.join(" ")),
    };
    Ok(TraceKey { name, id, locator })
}

fn parse_ms(word: &str) -> Result<u32> {
    word.parse::<u32>()
        .with_context(|| format!("invalid time {}", word))
}

/// Parse a decimal or `0x` hexadecimal number.
fn parse_num<T>(word: &str) -> Result<T>
where
    T: TryFrom<u32>,
{
    let value = match word.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => word.parse::<u32>(),
    }
    .with_context(|| format!("invalid number {}", word))?;
    T::try_from(value)
        .ok()
        .with_context(|| format!("{} is out of range", word))
}
