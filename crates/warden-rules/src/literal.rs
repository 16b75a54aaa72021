//! Required-literal extraction from regular expressions.
//!
//! For a pattern `p`, [`required_literals`] returns a set `S` of byte
//! strings such that every match of `p` contains at least one member of `S`
//! as a substring. The regex tiers register each member with the
//! [`PhraseIndex`](crate::matcher::PhraseIndex) and only evaluate `p` when a
//! member occurs in the text.
//!
//! The analysis walks the HIR bottom-up tracking, per node, the complete set
//! of strings it can match (when that set is small) and the best required
//! set found so far.

use regex_syntax::Parser;
use regex_syntax::hir::{Class, Hir, HirKind};

/// Largest character class expanded into its members.
const MAX_CLASS_EXPANSION: usize = 4;
/// Largest alternative set kept while cross-multiplying.
const MAX_SET_SIZE: usize = 16;

type Set = Vec<Vec<u8>>;

#[derive(Debug, Clone, Default)]
struct Info {
    /// Every string the node can match, when finite and small.
    exact: Option<Set>,
    /// Strings of which every match contains at least one.
    required: Option<Set>,
}

impl Info {
    fn exact(set: Set) -> Self {
        let required = usable(&set).then(|| set.clone());
        Self {
            exact: Some(set),
            required,
        }
    }

    fn unconstrained() -> Self {
        Self::default()
    }
}

/// Extract the literals some one of which every match of `pattern` must
/// contain.
///
/// Returns `None` when the pattern does not parse or when no non-empty
/// requirement can be derived; such rules must be evaluated unconditionally.
pub fn required_literals(pattern: &str) -> Option<Vec<Vec<u8>>> {
    let hir = Parser::new().parse(pattern).ok()?;
    let info = analyze(&hir);
    info.required.filter(|set| usable(set))
}

/// Length of the shortest member.
pub fn min_len(set: &[Vec<u8>]) -> usize {
    set.iter().map(Vec::len).min().unwrap_or(0)
}

fn usable(set: &Set) -> bool {
    !set.is_empty() && min_len(set) > 0
}

fn analyze(hir: &Hir) -> Info {
    match hir.kind() {
        HirKind::Empty | HirKind::Look(_) => Info {
            exact: Some(vec![Vec::new()]),
            required: None,
        },
        HirKind::Literal(lit) => Info::exact(vec![lit.0.to_vec()]),
        HirKind::Class(class) => match expand_class(class) {
            Some(set) => Info::exact(set),
            None => Info::unconstrained(),
        },
        HirKind::Capture(cap) => analyze(&cap.sub),
        HirKind::Repetition(rep) => {
            if rep.min == 0 {
                return Info::unconstrained();
            }
            let inner = analyze(&rep.sub);
            if rep.max == Some(1) {
                // exactly once
                return inner;
            }
            Info {
                exact: None,
                required: inner.required,
            }
        }
        HirKind::Concat(subs) => analyze_concat(subs),
        HirKind::Alternation(subs) => analyze_alternation(subs),
    }
}

fn analyze_concat(subs: &[Hir]) -> Info {
    let mut run: Set = vec![Vec::new()];
    let mut all_exact = true;
    let mut best: Option<Set> = None;

    for sub in subs {
        let info = analyze(sub);
        match info.exact {
            Some(exact) => match cross(&run, &exact) {
                Some(joined) => run = joined,
                None => {
                    all_exact = false;
                    consider(&mut best, std::mem::replace(&mut run, exact));
                }
            },
            None => {
                all_exact = false;
                consider(&mut best, std::mem::replace(&mut run, vec![Vec::new()]));
                if let Some(required) = info.required {
                    consider(&mut best, required);
                }
            }
        }
    }

    if all_exact {
        return Info::exact(run);
    }
    consider(&mut best, run);
    Info {
        exact: None,
        required: best,
    }
}

fn analyze_alternation(subs: &[Hir]) -> Info {
    let infos: Vec<Info> = subs.iter().map(analyze).collect();

    let exact = infos
        .iter()
        .map(|info| info.exact.as_ref())
        .collect::<Option<Vec<_>>>()
        .and_then(|sets| union(sets.into_iter()));
    if let Some(exact) = exact {
        return Info::exact(exact);
    }

    let required = infos
        .iter()
        .map(|info| info.required.as_ref())
        .collect::<Option<Vec<_>>>()
        .and_then(|sets| union(sets.into_iter()));
    Info {
        exact: None,
        required,
    }
}

/// Keep `candidate` if its shortest member is longer than the current best's.
fn consider(best: &mut Option<Set>, candidate: Set) {
    if !usable(&candidate) {
        return;
    }
    let better = match best {
        Some(current) => min_len(&candidate) > min_len(current),
        None => true,
    };
    if better {
        *best = Some(candidate);
    }
}

fn cross(left: &Set, right: &Set) -> Option<Set> {
    if left.len() * right.len() > MAX_SET_SIZE {
        return None;
    }
    let mut out = Vec::with_capacity(left.len() * right.len());
    for l in left {
        for r in right {
            let mut joined = l.clone();
            joined.extend_from_slice(r);
            if !out.contains(&joined) {
                out.push(joined);
            }
        }
    }
    Some(out)
}

fn union<'a>(sets: impl Iterator<Item = &'a Set>) -> Option<Set> {
    let mut out: Set = Vec::new();
    for set in sets {
        for item in set {
            if !out.contains(item) {
                out.push(item.clone());
            }
        }
        if out.len() > MAX_SET_SIZE {
            return None;
        }
    }
    Some(out)
}

fn expand_class(class: &Class) -> Option<Set> {
    match class {
        Class::Unicode(class) => {
            let count: usize = class
                .ranges()
                .iter()
                .map(|r| (r.end() as usize) - (r.start() as usize) + 1)
                .sum();
            if count == 0 || count > MAX_CLASS_EXPANSION {
                return None;
            }
            let mut out = Vec::with_capacity(count);
            for range in class.ranges() {
                for c in range.start()..=range.end() {
                    let mut buf = [0u8; 4];
                    out.push(c.encode_utf8(&mut buf).as_bytes().to_vec());
                }
            }
            Some(out)
        }
        Class::Bytes(class) => {
            let count: usize = class
                .ranges()
                .iter()
                .map(|r| (r.end() as usize) - (r.start() as usize) + 1)
                .sum();
            if count == 0 || count > MAX_CLASS_EXPANSION {
                return None;
            }
            Some(
                class
                    .ranges()
                    .iter()
                    .flat_map(|r| r.start()..=r.end())
                    .map(|b| vec![b])
                    .collect(),
            )
        }
    }
}
