//! Line based training vector and event files.
//!
//! Both formats hold one event per line with whitespace separated fields. Blank lines and lines
//! starting with `#` are skipped. Predicates are written as `+` separated symbol tuples.
use std::io::BufRead;

use color_eyre::eyre::{bail, Result, WrapErr};
use serif_maxent::{predicate::SYMBOL_SEPARATOR, Predicate, Symbol, SymbolTable};

/// A training event with its multiplicity.
#[derive(Clone, Debug)]
pub struct TrainingVector {
    pub count: u64,
    pub outcome: Symbol,
    pub predicates: Vec<Predicate>,
}

/// An event to score, labeled with its first field.
#[derive(Clone, Debug)]
pub struct LabeledEvent {
    pub line: usize,
    pub label: Symbol,
    pub predicates: Vec<Predicate>,
}

fn content(line: &str) -> Option<&str> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        None
    } else {
        Some(line)
    }
}

fn parse_predicate(text: &str, symbols: &mut SymbolTable) -> Result<Predicate> {
    if text.split(SYMBOL_SEPARATOR).any(str::is_empty) {
        bail!("predicate {text:?} has an empty part");
    }
    Ok(Predicate::parse(text, symbols))
}

fn parse_predicates<'a>(
    fields: impl Iterator<Item = &'a str>,
    symbols: &mut SymbolTable,
) -> Result<Vec<Predicate>> {
    fields.map(|field| parse_predicate(field, symbols)).collect()
}

/// Reads `<count> <outcome> <predicate>*` lines.
pub fn read_training_vectors(
    reader: impl BufRead,
    symbols: &mut SymbolTable,
) -> Result<Vec<TrainingVector>> {
    let mut vectors = vec![];
    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line?;
        let Some(line) = content(&line) else {
            continue;
        };
        let mut fields = line.split_ascii_whitespace();
        let (Some(count), Some(outcome)) = (fields.next(), fields.next()) else {
            bail!("line {line_no}: expected a count and an outcome");
        };
        let count = count
            .parse()
            .wrap_err_with(|| format!("line {line_no}: invalid count {count:?}"))?;
        let outcome = symbols.intern(outcome);
        let predicates =
            parse_predicates(fields, symbols).wrap_err_with(|| format!("line {line_no}"))?;
        vectors.push(TrainingVector {
            count,
            outcome,
            predicates,
        });
    }
    Ok(vectors)
}

/// Reads `<label> <predicate>*` lines.
pub fn read_events(reader: impl BufRead, symbols: &mut SymbolTable) -> Result<Vec<LabeledEvent>> {
    let mut events = vec![];
    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line?;
        let Some(line) = content(&line) else {
            continue;
        };
        let mut fields = line.split_ascii_whitespace();
        let Some(label) = fields.next() else {
            continue;
        };
        let label = symbols.intern(label);
        let predicates =
            parse_predicates(fields, symbols).wrap_err_with(|| format!("line {line_no}"))?;
        events.push(LabeledEvent {
            line: line_no,
            label,
            predicates,
        });
    }
    Ok(events)
}

/// Outcomes in order of first appearance.
pub fn collect_outcomes(vectors: &[TrainingVector]) -> Vec<Symbol> {
    let mut outcomes = vec![];
    for vector in vectors {
        if !outcomes.contains(&vector.outcome) {
            outcomes.push(vector.outcome);
        }
    }
    outcomes
}
