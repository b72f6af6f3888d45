// SPDX-License-Identifier: Apache-2.0

//! Loads an ASCII AIGER ("aag") file into a `Network`.
//!
//! AIGER variable indices become node ids directly, so the network's id
//! space is the file's id space (unused variables leave holes). Latches are
//! cut open: the latch output becomes a latch CI and the next-state literal
//! becomes a latch CO appended after the largest variable index, followed by
//! the primary outputs.
//!
//! The parser is strict: structural inconsistencies are reported as errors
//! rather than patched up.

use std::collections::HashMap;

use crate::aig::network::{Network, NetworkBuilder, NodeRef, Operand};

fn literal_to_operand(lit: u32) -> Operand {
    Operand {
        node: NodeRef {
            id: (lit >> 1) as usize,
        },
        negated: lit & 1 == 1,
    }
}

fn next_non_empty_line<'a>(iter: &mut std::str::Lines<'a>) -> Option<&'a str> {
    iter.by_ref().find(|line| !line.trim().is_empty())
}

fn parse_literals(line: &str, expected: &[usize], what: &str) -> Result<Vec<u32>, String> {
    let toks: Vec<&str> = line.split_whitespace().collect();
    if !expected.contains(&toks.len()) {
        return Err(format!(
            "{} line should have {:?} fields, got '{}'",
            what, expected, line
        ));
    }
    toks.iter()
        .map(|tok| {
            tok.parse::<u32>()
                .map_err(|e| format!("invalid {} literal '{}': {}", what, tok, e))
        })
        .collect()
}

/// Parses ASCII-AIGER text into a `Network` named `name`.
pub fn load_aiger(src: &str, name: &str) -> Result<Network, String> {
    let mut lines = src.lines();

    let header_line =
        next_non_empty_line(&mut lines).ok_or_else(|| "empty AIGER input".to_string())?;
    let header_tokens: Vec<&str> = header_line.split_whitespace().collect();
    if header_tokens.len() != 6 {
        return Err(format!(
            "expected 6 tokens in AIGER header, got {} (\"{}\")",
            header_tokens.len(),
            header_line
        ));
    }
    if header_tokens[0] != "aag" {
        return Err(format!(
            "only ASCII-AIGER (aag) is supported; got '{}'",
            header_tokens[0]
        ));
    }
    let parse_u32 = |s: &str, field: &str| -> Result<u32, String> {
        s.parse::<u32>()
            .map_err(|e| format!("invalid {} value '{}': {}", field, s, e))
    };
    let m = parse_u32(header_tokens[1], "M")?;
    let i = parse_u32(header_tokens[2], "I")?;
    let l = parse_u32(header_tokens[3], "L")?;
    let o = parse_u32(header_tokens[4], "O")?;
    let a = parse_u32(header_tokens[5], "A")?;

    let check_var = |lit: u32, what: &str| -> Result<(), String> {
        if lit >> 1 > m {
            return Err(format!(
                "{} literal {} exceeds maximum variable index {}",
                what, lit, m
            ));
        }
        Ok(())
    };

    let mut input_vars: Vec<u32> = Vec::with_capacity(i as usize);
    for _ in 0..i {
        let line = next_non_empty_line(&mut lines)
            .ok_or_else(|| format!("expected {} input lines but found fewer", i))?;
        let lit = parse_literals(line, &[1], "input")?[0];
        if lit & 1 != 0 || lit < 2 {
            return Err(format!("input literal must be a positive variable, got {}", lit));
        }
        check_var(lit, "input")?;
        input_vars.push(lit >> 1);
    }

    // (latch output var, next-state literal)
    let mut latches: Vec<(u32, u32)> = Vec::with_capacity(l as usize);
    for _ in 0..l {
        let line = next_non_empty_line(&mut lines)
            .ok_or_else(|| format!("expected {} latch lines but found fewer", l))?;
        let lits = parse_literals(line, &[2, 3], "latch")?;
        if lits[0] & 1 != 0 || lits[0] < 2 {
            return Err(format!(
                "latch literal must be a positive variable, got {}",
                lits[0]
            ));
        }
        check_var(lits[0], "latch")?;
        check_var(lits[1], "latch next-state")?;
        latches.push((lits[0] >> 1, lits[1]));
    }

    let mut output_literals: Vec<u32> = Vec::with_capacity(o as usize);
    for _ in 0..o {
        let line = next_non_empty_line(&mut lines)
            .ok_or_else(|| format!("expected {} output lines but found fewer", o))?;
        let lit = parse_literals(line, &[1], "output")?[0];
        check_var(lit, "output")?;
        output_literals.push(lit);
    }

    let mut and_lines: Vec<[u32; 3]> = Vec::with_capacity(a as usize);
    for _ in 0..a {
        let line = next_non_empty_line(&mut lines)
            .ok_or_else(|| format!("expected {} AND lines but found fewer", a))?;
        let lits = parse_literals(line, &[3], "AND")?;
        if lits[0] & 1 != 0 || lits[0] < 2 {
            return Err(format!("AND lhs literal {} must be a positive variable", lits[0]));
        }
        for lit in &lits {
            check_var(*lit, "AND")?;
        }
        and_lines.push([lits[0], lits[1], lits[2]]);
    }

    let mut input_names: HashMap<usize, String> = HashMap::new();
    let mut latch_names: HashMap<usize, String> = HashMap::new();
    let mut output_names: HashMap<usize, String> = HashMap::new();
    for line in lines {
        if line.starts_with('c') {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }
        let (kind, rest) = line.split_at(1);
        let table = match kind {
            "i" => &mut input_names,
            "l" => &mut latch_names,
            "o" => &mut output_names,
            _ => continue,
        };
        let mut parts = rest.trim().splitn(2, ' ');
        let index: usize = parts
            .next()
            .ok_or_else(|| format!("malformed symbol '{}': missing index", line))?
            .parse()
            .map_err(|e| format!("invalid symbol index in '{}': {}", line, e))?;
        let symbol = parts
            .next()
            .ok_or_else(|| format!("malformed symbol '{}': missing name", line))?;
        table.insert(index, symbol.trim().to_string());
    }

    let mut builder = NetworkBuilder::new(name);
    for (index, var) in input_vars.iter().enumerate() {
        let input_name = input_names
            .remove(&index)
            .unwrap_or_else(|| format!("i{}", index));
        builder.add_ci_at(*var as usize, &input_name, false)?;
    }
    for (index, (var, _)) in latches.iter().enumerate() {
        let latch_name = latch_names
            .get(&index)
            .cloned()
            .unwrap_or_else(|| format!("l{}", index));
        builder.add_ci_at(*var as usize, &latch_name, true)?;
    }
    for [lhs, rhs0, rhs1] in &and_lines {
        builder.add_and_at(
            (lhs >> 1) as usize,
            literal_to_operand(*rhs0),
            literal_to_operand(*rhs1),
        )?;
    }
    for (index, (_, next)) in latches.iter().enumerate() {
        let latch_name = latch_names
            .remove(&index)
            .unwrap_or_else(|| format!("l{}", index));
        builder.add_latch_input(&format!("{}_next", latch_name), literal_to_operand(*next));
    }
    for (index, lit) in output_literals.iter().enumerate() {
        let output_name = output_names
            .remove(&index)
            .unwrap_or_else(|| format!("o{}", index));
        builder.add_output(&output_name, literal_to_operand(*lit));
    }

    let network = builder.build()?;
    log::debug!(
        "load_aiger: {} inputs, {} latches, {} outputs, {} ands, id bound {}",
        i,
        l,
        o,
        a,
        network.id_bound()
    );
    Ok(network)
}
