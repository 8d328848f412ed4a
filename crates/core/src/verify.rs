//! Before/after memory invariants around an action the caller performs.
//! This module exists so invariant violations come back as itemized data, never as panics.
//! It does not own the action under test or any policy for reacting to a failed check.

use std::collections::BTreeMap;
use std::slice;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::session::{MemoryBus, Session, SessionError, read_value};
use crate::types::ByteWidth;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expectation {
    Exact { value: u16 },
    /// Inclusive on both ends.
    Range { min: u16, max: u16 },
    MustChange,
    MustNotChange,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryCheck {
    pub label: String,
    pub address: u32,
    pub width: ByteWidth,
    pub expectation: Expectation,
    /// Applied to both the before and after value ahead of comparison.
    #[serde(default)]
    pub mask: Option<u16>,
}

impl MemoryCheck {
    pub fn new(
        label: impl Into<String>,
        address: u32,
        width: ByteWidth,
        expectation: Expectation,
    ) -> Self {
        Self { label: label.into(), address, width, expectation, mask: None }
    }

    pub fn exact(label: impl Into<String>, address: u32, width: ByteWidth, value: u16) -> Self {
        Self::new(label, address, width, Expectation::Exact { value })
    }

    pub fn range(
        label: impl Into<String>,
        address: u32,
        width: ByteWidth,
        min: u16,
        max: u16,
    ) -> Self {
        Self::new(label, address, width, Expectation::Range { min, max })
    }

    pub fn must_change(label: impl Into<String>, address: u32, width: ByteWidth) -> Self {
        Self::new(label, address, width, Expectation::MustChange)
    }

    pub fn must_not_change(label: impl Into<String>, address: u32, width: ByteWidth) -> Self {
        Self::new(label, address, width, Expectation::MustNotChange)
    }

    pub fn with_mask(mut self, mask: u16) -> Self {
        self.mask = Some(mask);
        self
    }

    fn key(&self) -> (u32, ByteWidth) {
        (self.address, self.width)
    }

    fn masked(&self, value: u16) -> u16 {
        self.mask.map_or(value, |mask| value & mask)
    }

    /// Reason the check can never be evaluated meaningfully, if any.
    fn problem(&self) -> Option<String> {
        let limit = self.width.max_value();
        if let Some(mask) = self.mask {
            if mask == 0 {
                return Some("mask selects no bits".to_string());
            }
            if mask > limit {
                return Some(format!("mask {mask:#06x} is wider than {:?}", self.width));
            }
        }
        let reachable = self.mask.unwrap_or(limit);
        match self.expectation {
            Expectation::Exact { value } if value & !reachable != 0 => {
                Some(format!("expected value {value:#06x} has bits outside {reachable:#06x}"))
            }
            Expectation::Range { min, max } if min > max => {
                Some(format!("range {min:#06x}..={max:#06x} is inverted"))
            }
            Expectation::Range { min, .. } if min > reachable => {
                Some(format!("range starts above the largest readable value {reachable:#06x}"))
            }
            _ => None,
        }
    }

    fn evaluate(&self, before: u16, after: u16) -> CheckResult {
        let (old, new) = (self.masked(before), self.masked(after));
        let (passed, detail) = match self.expectation {
            Expectation::Exact { value } => (
                new == value,
                format!("expected {value:#06x}, found {new:#06x}"),
            ),
            Expectation::Range { min, max } => (
                (min..=max).contains(&new),
                format!("expected {min:#06x}..={max:#06x}, found {new:#06x}"),
            ),
            Expectation::MustChange => (
                new != old,
                format!("expected a change, before {old:#06x} after {new:#06x}"),
            ),
            Expectation::MustNotChange => (
                new == old,
                format!("expected no change, before {old:#06x} after {new:#06x}"),
            ),
        };
        CheckResult {
            label: self.label.clone(),
            address: self.address,
            expectation: self.expectation,
            mask: self.mask,
            before,
            after,
            passed,
            detail,
        }
    }
}

/// Outcome of one check. `before` and `after` are the raw, unmasked reads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub label: String,
    pub address: u32,
    pub expectation: Expectation,
    pub mask: Option<u16>,
    pub before: u16,
    pub after: u16,
    pub passed: bool,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    /// One entry per check, in the order the checks were given.
    pub results: Vec<CheckResult>,
    pub passed: bool,
}

impl VerificationReport {
    pub fn failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.results.iter().filter(|result| !result.passed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    #[error("verification needs at least one check")]
    EmptyCheckList,
    #[error("check {index} (`{label}`) is malformed: {reason}")]
    MalformedCheck { index: usize, label: String, reason: String },
    #[error("end_verification called without begin_verification")]
    NotArmed,
    #[error("check `{label}` reads {address:#08x}, which was not captured at begin")]
    NotCaptured { label: String, address: u32 },
    #[error("check `{label}` still failing after {frames} frames (last value {last:#06x})")]
    WaitTimeout { label: String, frames: u32, last: u16 },
    #[error(transparent)]
    Session(#[from] SessionError),
}

type Capture = BTreeMap<(u32, ByteWidth), u16>;

/// Two-phase verifier: arm with `begin_verification`, judge with `end_verification`.
///
/// Captured values live for one cycle only; `end_verification` disarms the verifier
/// whether or not it succeeds.
#[derive(Debug, Default)]
pub struct IntegrityVerifier {
    before: Option<Capture>,
}

impl IntegrityVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_armed(&self) -> bool {
        self.before.is_some()
    }

    /// Validate `checks` and capture every address they read.
    pub fn begin_verification<B: MemoryBus + ?Sized>(
        &mut self,
        bus: &mut B,
        checks: &[MemoryCheck],
    ) -> Result<(), VerificationError> {
        validate_checks(checks)?;
        self.before = None;
        let captured = capture(bus, checks)?;
        debug!(checks = checks.len(), addresses = captured.len(), "verification armed");
        self.before = Some(captured);
        Ok(())
    }

    /// Re-read every address and evaluate all checks against the captured values.
    pub fn end_verification<B: MemoryBus + ?Sized>(
        &mut self,
        bus: &mut B,
        checks: &[MemoryCheck],
    ) -> Result<VerificationReport, VerificationError> {
        let before = self.before.take().ok_or(VerificationError::NotArmed)?;
        validate_checks(checks)?;
        if let Some(check) = checks.iter().find(|check| !before.contains_key(&check.key())) {
            return Err(VerificationError::NotCaptured {
                label: check.label.clone(),
                address: check.address,
            });
        }

        let after = capture(bus, checks)?;
        let results: Vec<CheckResult> = checks
            .iter()
            .map(|check| {
                let key = check.key();
                check.evaluate(before[&key], after[&key])
            })
            .collect();

        for failure in results.iter().filter(|result| !result.passed) {
            warn!(
                label = %failure.label,
                address = format_args!("{:#08x}", failure.address),
                detail = %failure.detail,
                "invariant check failed"
            );
        }
        let passed = results.iter().all(|result| result.passed);
        debug!(checks = results.len(), passed, "verification finished");
        Ok(VerificationReport { results, passed })
    }

    /// Poll until `check` passes against the value read when the wait started.
    ///
    /// Frames advance in steps of `poll_frames` until `frame_budget` is spent.
    pub fn wait_for<S: Session + ?Sized>(
        session: &mut S,
        check: &MemoryCheck,
        frame_budget: u32,
        poll_frames: u32,
    ) -> Result<CheckResult, VerificationError> {
        validate_checks(slice::from_ref(check))?;
        let poll_frames = poll_frames.max(1);
        let before = read_value(session, check.address, check.width)?;

        let mut spent = 0_u32;
        loop {
            let after = read_value(session, check.address, check.width)?;
            let result = check.evaluate(before, after);
            if result.passed {
                debug!(label = %check.label, frames = spent, "invariant reached");
                return Ok(result);
            }
            if spent >= frame_budget {
                warn!(label = %check.label, frames = spent, "invariant wait timed out");
                return Err(VerificationError::WaitTimeout {
                    label: check.label.clone(),
                    frames: spent,
                    last: after,
                });
            }
            session.advance_frames(poll_frames)?;
            spent = spent.saturating_add(poll_frames);
        }
    }
}

fn validate_checks(checks: &[MemoryCheck]) -> Result<(), VerificationError> {
    if checks.is_empty() {
        return Err(VerificationError::EmptyCheckList);
    }
    for (index, check) in checks.iter().enumerate() {
        if let Some(reason) = check.problem() {
            return Err(VerificationError::MalformedCheck {
                index,
                label: check.label.clone(),
                reason,
            });
        }
    }
    Ok(())
}

/// One read per distinct (address, width) pair.
fn capture<B: MemoryBus + ?Sized>(
    bus: &mut B,
    checks: &[MemoryCheck],
) -> Result<Capture, SessionError> {
    let mut values = Capture::new();
    for check in checks {
        if values.contains_key(&check.key()) {
            continue;
        }
        values.insert(check.key(), read_value(bus, check.address, check.width)?);
    }
    Ok(values)
}
