use serde::Serialize;

/// Tolerance applied before flooring/ceiling so float noise cannot move an exact boundary.
const EPSILON: f64 = 1e-9;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AttendanceError {
    #[error("present classes ({present}) exceed total classes ({total})")]
    PresentExceedsTotal { total: u32, present: u32 },
    #[error("target percentage must be a finite number, got {0}")]
    InvalidTarget(f64),
}

/// Per-subject counts summed from the attendance log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttendanceAggregate {
    total_classes: u32,
    present_classes: u32,
    target_percentage: f64,
}

impl AttendanceAggregate {
    pub fn new(
        total_classes: u32,
        present_classes: u32,
        target_percentage: f64,
    ) -> Result<Self, AttendanceError> {
        if present_classes > total_classes {
            return Err(AttendanceError::PresentExceedsTotal {
                total: total_classes,
                present: present_classes,
            });
        }
        if !target_percentage.is_finite() {
            return Err(AttendanceError::InvalidTarget(target_percentage));
        }

        Ok(Self {
            total_classes,
            present_classes,
            target_percentage,
        })
    }

    pub fn total_classes(&self) -> u32 {
        self.total_classes
    }

    pub fn present_classes(&self) -> u32 {
        self.present_classes
    }

    pub fn target_percentage(&self) -> f64 {
        self.target_percentage
    }

    pub fn project(&self) -> AttendanceProjection {
        project(
            self.total_classes,
            self.present_classes,
            self.target_percentage,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AttendanceProjection {
    /// Attended share of held classes, rounded to one decimal.
    pub percentage: f64,
    /// Further absences that keep the ratio at or above target.
    pub safe_absences: u32,
    /// Consecutive presences needed to climb back to target.
    pub need_attend: u32,
}

/// Derives percentage, safe-absence budget and required streak for one subject.
///
/// Callers must guarantee `present <= total`. A target outside the open
/// interval (0, 100) means there is nothing to project against, so both
/// counters stay at zero.
pub fn project(total: u32, present: u32, target_percentage: f64) -> AttendanceProjection {
    debug_assert!(present <= total, "present classes exceed total");

    let percentage = percentage(present, total);
    let target = target_percentage / 100.0;

    let mut safe_absences = 0;
    let mut need_attend = 0;

    if total > 0 && target > 0.0 && target < 1.0 {
        let present = f64::from(present);
        let total = f64::from(total);

        let reachable = (present / target + EPSILON).floor() - total;
        safe_absences = reachable.max(0.0) as u32;

        if percentage < target_percentage {
            let streak = ((target * total - present) / (1.0 - target) - EPSILON).ceil();
            need_attend = streak.max(0.0) as u32;
        }
    }

    AttendanceProjection {
        percentage,
        safe_absences,
        need_attend,
    }
}

pub fn percentage(present: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = f64::from(present) / f64::from(total) * 100.0;
    (raw * 10.0).round_ties_even() / 10.0
}
