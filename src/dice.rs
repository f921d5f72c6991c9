//! Dice-notation grammar, pool generation, and evaluation.
//!
//! Notation: `[count]{d|к}<faces>[<op><value>][{kh|kl}[<keep>]]`, where `к`
//! is the Cyrillic dice letter, `op` is one of `+ - * x х /` (`x` and `х`
//! both multiply), and `kh`/`kl` keep the highest/lowest rolls.
//!
//! Parsing and evaluation are pure; randomness comes in through the
//! [`RollSource`] port so tests can script exact pools.

use std::{fmt, sync::LazyLock};

use async_trait::async_trait;
use rand::{Rng, seq::SliceRandom};
use regex::Regex;
use thiserror::Error;

/// Celebratory phrase for a natural 20 on a single d20.
pub const NATURAL_TWENTY: &str = "Natural 20! Critical success!";

/// Largest accepted pool size. The roll source allocates two candidates per
/// die, so an unbounded count would let one message exhaust memory before
/// the handler timeout fires.
pub const MAX_POOL_SIZE: u32 = 1000;

static NOTATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d*)[dDкК](\d+)(?:\s*([+\-*xхXХ/])\s*(\d+))?(?:k([hl])(\d*))?").expect("dice notation regex")
});

/// Dice notation that was present but unusable. A fallback-class condition:
/// the user gets the fallback sticker, never a process-level error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceParseError {
    #[error("no dice notation found")]
    NotDice,
    #[error("dice count must be at least 1")]
    ZeroCount,
    #[error("die must have at least one face")]
    ZeroFaces,
    #[error("number in dice notation is out of range")]
    NumberOutOfRange,
    #[error("too many dice in the pool")]
    TooManyDice,
    #[error("cannot divide a roll by zero")]
    DivisionByZero,
}

/// Arithmetic modifier operation applied to the kept-pool sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ModOp {
    fn symbol(self) -> char {
        match self {
            Self::Add => '+',
            Self::Sub => '-',
            Self::Mul => '*',
            Self::Div => '/',
        }
    }
}

/// Pool selection rule: retain only the highest or lowest rolls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepMode {
    High,
    Low,
}

/// A parsed dice expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiceExpression {
    /// Number of dice in the pool, at least 1.
    pub count: u32,
    /// Faces per die, at least 1.
    pub faces: u32,
    /// Optional arithmetic modifier on the kept-pool sum.
    pub modifier: Option<(ModOp, u32)>,
    /// Optional keep-high/keep-low selection with its keep count.
    pub keep: Option<(KeepMode, u32)>,
}

impl DiceExpression {
    /// True when `text` contains something shaped like dice notation.
    ///
    /// Weaker than [`parse`](Self::parse) succeeding: `0d6` matches the shape
    /// but fails validation, which is how a bad roll request still reaches
    /// the fallback path instead of being ignored.
    pub fn matches(text: &str) -> bool {
        NOTATION.is_match(text)
    }

    /// Finds and parses the first dice notation in `text`.
    pub fn parse(text: &str) -> Result<Self, DiceParseError> {
        let caps = NOTATION.captures(text).ok_or(DiceParseError::NotDice)?;

        let count_digits = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let count = if count_digits.is_empty() {
            1
        } else {
            count_digits.parse::<u32>().map_err(|_| DiceParseError::NumberOutOfRange)?
        };
        if count < 1 {
            return Err(DiceParseError::ZeroCount);
        }
        if count > MAX_POOL_SIZE {
            return Err(DiceParseError::TooManyDice);
        }

        let faces = caps[2].parse::<u32>().map_err(|_| DiceParseError::NumberOutOfRange)?;
        if faces < 1 {
            return Err(DiceParseError::ZeroFaces);
        }

        let modifier = match (caps.get(3), caps.get(4)) {
            (Some(op), Some(value)) => {
                let op = match op.as_str() {
                    "+" => ModOp::Add,
                    "-" => ModOp::Sub,
                    "*" | "x" | "х" | "X" | "Х" => ModOp::Mul,
                    "/" => ModOp::Div,
                    _ => unreachable!("operator class in the notation regex"),
                };
                let value = value.as_str().parse::<u32>().map_err(|_| DiceParseError::NumberOutOfRange)?;
                if op == ModOp::Div && value == 0 {
                    return Err(DiceParseError::DivisionByZero);
                }
                Some((op, value))
            }
            _ => None,
        };

        let keep = match caps.get(5) {
            Some(mode) => {
                let mode = if mode.as_str() == "h" { KeepMode::High } else { KeepMode::Low };
                let digits = caps.get(6).map(|m| m.as_str()).unwrap_or("");
                let keep_count = if digits.is_empty() {
                    1
                } else {
                    digits.parse::<u32>().map_err(|_| DiceParseError::NumberOutOfRange)?
                };
                Some((mode, keep_count.max(1)))
            }
            None => None,
        };

        Ok(Self { count, faces, modifier, keep })
    }

    /// Evaluates the expression against an already-rolled pool.
    ///
    /// The pool length must equal `count`; the roll source guarantees that.
    pub fn evaluate(&self, pool: Vec<u32>) -> DicePoolResult {
        let (kept, dropped) = match self.keep {
            Some((mode, keep_count)) => select_kept(&pool, mode, keep_count),
            None => (pool.clone(), Vec::new()),
        };

        let pool_total: i64 = kept.iter().map(|&v| i64::from(v)).sum();

        let final_value = match self.modifier {
            None => FinalValue::Int(pool_total),
            Some((ModOp::Add, v)) => FinalValue::Int(pool_total + i64::from(v)),
            Some((ModOp::Sub, v)) => FinalValue::Int(pool_total - i64::from(v)),
            Some((ModOp::Mul, v)) => FinalValue::Int(pool_total * i64::from(v)),
            Some((ModOp::Div, v)) => FinalValue::Decimal(pool_total as f64 / f64::from(v)),
        };

        DicePoolResult { pool, kept, dropped, pool_total, final_value }
    }

    /// Renders the outcome, including the single-d20 natural-20 special case.
    pub fn render(&self, result: &DicePoolResult) -> String {
        let natural_twenty = self.count == 1 && self.faces == 20 && result.pool_total == 20;

        if natural_twenty && self.modifier.is_none() {
            return NATURAL_TWENTY.to_string();
        }

        let mut breakdown = result.kept.iter().map(u32::to_string).collect::<Vec<_>>().join(" + ");
        if !result.dropped.is_empty() {
            let dropped = result.dropped.iter().map(u32::to_string).collect::<Vec<_>>().join(" + ");
            breakdown = format!("{breakdown} | {dropped}");
        }

        let modifier = match self.modifier {
            Some((op, value)) => format!("{}{}", op.symbol(), value),
            None => String::new(),
        };

        let rendered = format!("({breakdown}) {modifier} = {}", result.final_value);

        if natural_twenty {
            format!("{NATURAL_TWENTY} {rendered}")
        } else {
            rendered
        }
    }
}

impl fmt::Display for DiceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d{}", self.count, self.faces)?;
        if let Some((op, value)) = self.modifier {
            write!(f, "{}{}", op.symbol(), value)?;
        }
        if let Some((mode, keep_count)) = self.keep {
            let mode = if mode == KeepMode::High { 'h' } else { 'l' };
            write!(f, "k{mode}{keep_count}")?;
        }
        Ok(())
    }
}

/// Stable keep-high/keep-low selection.
///
/// Ties are broken by original roll position; `kept` and `dropped` are
/// subsequences of the pool in roll order.
fn select_kept(pool: &[u32], mode: KeepMode, keep_count: u32) -> (Vec<u32>, Vec<u32>) {
    let keep_count = (keep_count as usize).min(pool.len());

    let mut indices: Vec<usize> = (0..pool.len()).collect();
    match mode {
        KeepMode::High => indices.sort_by_key(|&i| std::cmp::Reverse(pool[i])),
        KeepMode::Low => indices.sort_by_key(|&i| pool[i]),
    }

    let mut selected = vec![false; pool.len()];
    for &i in indices.iter().take(keep_count) {
        selected[i] = true;
    }

    let kept = pool.iter().enumerate().filter(|&(i, _)| selected[i]).map(|(_, &v)| v).collect();
    let dropped = pool.iter().enumerate().filter(|&(i, _)| !selected[i]).map(|(_, &v)| v).collect();
    (kept, dropped)
}

/// The outcome of rolling a dice expression.
#[derive(Debug, Clone, PartialEq)]
pub struct DicePoolResult {
    /// Every rolled value, in roll order.
    pub pool: Vec<u32>,
    /// The values retained by the keep rule (the whole pool when there is none).
    pub kept: Vec<u32>,
    /// The values discarded by the keep rule.
    pub dropped: Vec<u32>,
    /// Sum over the kept values.
    pub pool_total: i64,
    /// The total after the modifier is applied.
    pub final_value: FinalValue,
}

/// The modified total: decimal only for division, integer otherwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FinalValue {
    Int(i64),
    Decimal(f64),
}

impl fmt::Display for FinalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Decimal(v) => write!(f, "{v:.2}"),
        }
    }
}

/// Source of rolled pools. The production implementation draws from a
/// non-predictable generator; tests inject scripted values.
#[async_trait]
pub trait RollSource: Send + Sync + 'static {
    /// Produces `count` values, each uniform in `[1, faces]`.
    async fn pool(&self, count: u32, faces: u32) -> Vec<u32>;
}

/// Roll source backed by `rand::rng()` (a ChaCha-based CSPRNG).
///
/// Draws twice as many candidates as requested, then shuffles and truncates.
/// The oversampling is inherited behavior guarding against weak generators;
/// users expect the distribution it produces, so it stays.
pub struct CryptoRollSource;

#[async_trait]
impl RollSource for CryptoRollSource {
    async fn pool(&self, count: u32, faces: u32) -> Vec<u32> {
        let candidates = u64::from(count) * 2;
        let mut pool = Vec::with_capacity(candidates as usize);

        for _ in 0..candidates {
            pool.push(rand::rng().random_range(1..=faces));
            // One yield per simulated roll keeps the event loop responsive
            // under large pools.
            tokio::task::yield_now().await;
        }

        pool.shuffle(&mut rand::rng());
        pool.truncate(count as usize);
        pool
    }
}
