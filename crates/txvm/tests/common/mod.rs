//! Fixture helpers shared by the integration tests and the benchmarks.
#![allow(dead_code)]

use std::str::FromStr;

use txvm::{Controller, EngineLimits, Identifier, MemoryModule, Opcode, Outcome};

/// Assembles a whitespace-separated program.
///
/// * an integer token (decimal, `0x` hex, `0o` octal, `0b` binary, optionally negative) becomes 8
///   little-endian bytes,
/// * `<N>d<value>` becomes the first `N` little-endian bytes of the decimal `value`,
/// * anything else must be an opcode mnemonic.
pub fn assemble(program: &str) -> Vec<u8> {
    let mut code = Vec::new();
    for token in program.split_whitespace() {
        if let Some(value) = parse_int(token) {
            code.extend_from_slice(&value.to_le_bytes());
        } else if let Some((width, value)) = parse_sized(token) {
            code.extend_from_slice(&value.to_le_bytes()[..width]);
        } else {
            let opcode = Opcode::from_str(token).unwrap_or_else(|_| panic!("unknown instruction: {token}"));
            code.push(opcode as u8);
        }
    }
    code
}

fn parse_int(token: &str) -> Option<i64> {
    let (negative, digits) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    let (radix, digits) = match digits.get(..2) {
        Some("0x" | "0X") => (16, &digits[2..]),
        Some("0o" | "0O") => (8, &digits[2..]),
        Some("0b" | "0B") => (2, &digits[2..]),
        _ => (10, digits),
    };
    let magnitude = u64::from_str_radix(digits, radix).ok()?;
    let value = magnitude.cast_signed();
    Some(if negative { value.wrapping_neg() } else { value })
}

fn parse_sized(token: &str) -> Option<(usize, i64)> {
    let (width, value) = token.split_once('d')?;
    let width: usize = width.parse().ok()?;
    if !(1..=8).contains(&width) {
        return None;
    }
    Some((width, value.parse().ok()?))
}

/// 8 little-endian bytes of `value`.
pub fn word(value: i64) -> Vec<u8> {
    value.to_le_bytes().to_vec()
}

/// Builds a method area from `(app, [(method, program)])` entries.
pub fn method_area(apps: &[(u64, &[(u64, &str)])]) -> MemoryModule {
    apps.iter().fold(MemoryModule::new(), |area, (app, methods)| {
        methods
            .iter()
            .fold(area, |area, (method, program)| area.with_chunk(*app, *method, assemble(program)))
    })
}

/// Runs `called` to completion with default limits.
pub fn run(method_area: &mut MemoryModule, heap: &mut MemoryModule, called: u64, arguments: &[u8]) -> Outcome {
    run_with_limits(EngineLimits::new(), method_area, heap, called, arguments)
}

/// Runs `called` to completion.
pub fn run_with_limits(
    limits: EngineLimits,
    method_area: &mut MemoryModule,
    heap: &mut MemoryModule,
    called: u64,
    arguments: &[u8],
) -> Outcome {
    Controller::setup_session(limits, Identifier::from_u64(called), arguments.to_vec(), method_area, heap)
        .expect("session setup should succeed")
        .emulate()
}

