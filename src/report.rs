use std::collections::HashMap;
use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::{CodingLog, CountSummary, SubjectAttendance, Task};

/// Counts logs per key, busiest first. Blank keys are grouped as "unspecified".
pub fn summarize_coding<F>(logs: &[CodingLog], key: F) -> Vec<CountSummary>
where
    F: Fn(&CodingLog) -> &str,
{
    let mut counts: HashMap<String, usize> = HashMap::new();

    for log in logs {
        let value = key(log).trim();
        let value = if value.is_empty() { "unspecified" } else { value };
        *counts.entry(value.to_string()).or_insert(0) += 1;
    }

    let mut summaries: Vec<CountSummary> = counts
        .into_iter()
        .map(|(key, count)| CountSummary { key, count })
        .collect();

    summaries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    summaries
}

fn attendance_line(row: &SubjectAttendance) -> String {
    let label = if row.subject_code.is_empty() {
        row.subject_name.clone()
    } else {
        format!("{} ({})", row.subject_name, row.subject_code)
    };

    if row.total_classes == 0 {
        return format!("- {label}: no classes recorded yet");
    }

    let outlook = if row.projection.need_attend > 0 {
        format!("attend the next {} classes to reach target", row.projection.need_attend)
    } else {
        format!("can miss {} more", row.projection.safe_absences)
    };

    format!(
        "- {label}: {:.1}% ({}/{}) against {}% target, {outlook}",
        row.projection.percentage, row.present_classes, row.total_classes, row.target_attendance
    )
}

pub fn build_report(
    name: &str,
    email: &str,
    generated_on: NaiveDate,
    attendance: &[SubjectAttendance],
    tasks: &[Task],
    logs: &[CodingLog],
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Study Report");
    let _ = writeln!(output, "Generated for {} ({}) on {}", name, email, generated_on);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Attendance");

    if attendance.is_empty() {
        let _ = writeln!(output, "No subjects set up yet.");
    } else {
        for row in attendance {
            let _ = writeln!(output, "{}", attendance_line(row));
        }

        let at_risk: Vec<&str> = attendance
            .iter()
            .filter(|row| row.below_target())
            .map(|row| row.subject_name.as_str())
            .collect();
        if !at_risk.is_empty() {
            let _ = writeln!(output);
            let _ = writeln!(output, "Below target: {}", at_risk.join(", "));
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Open Tasks");

    if tasks.is_empty() {
        let _ = writeln!(output, "Nothing pending.");
    } else {
        for task in tasks {
            let due = task.due_at.as_deref().unwrap_or("no due date");
            let subject = task
                .subject_name
                .as_deref()
                .map(|name| format!(" [{name}]"))
                .unwrap_or_default();
            let _ = writeln!(
                output,
                "- ({}) {}{} due {}",
                task.priority, task.title, subject, due
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Coding Practice");

    if logs.is_empty() {
        let _ = writeln!(output, "No problems logged.");
    } else {
        let _ = writeln!(output, "{} problems logged.", logs.len());
        let _ = writeln!(output);
        let _ = writeln!(output, "By platform:");
        for summary in summarize_coding(logs, |log| log.platform.as_str()) {
            let _ = writeln!(output, "- {}: {}", summary.key, summary.count);
        }
        let _ = writeln!(output);
        let _ = writeln!(output, "By difficulty:");
        for summary in summarize_coding(logs, |log| log.difficulty.as_str()) {
            let _ = writeln!(output, "- {}: {}", summary.key, summary.count);
        }

        let mut recent = logs.to_vec();
        recent.sort_by(|a, b| b.log_date.cmp(&a.log_date));
        let _ = writeln!(output);
        let _ = writeln!(output, "Recent problems:");
        for log in recent.iter().take(5) {
            let _ = writeln!(output, "- {} on {}: {}", log.log_date, log.platform, log.problem);
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::project;
    use crate::models::{TaskPriority, TaskStatus};

    fn log(platform: &str, difficulty: &str, day: u32) -> CodingLog {
        CodingLog {
            id: i64::from(day),
            log_date: NaiveDate::from_ymd_opt(2026, 9, day).unwrap(),
            platform: platform.to_string(),
            problem: format!("problem {day}"),
            difficulty: difficulty.to_string(),
            topic: String::new(),
            link: String::new(),
        }
    }

    fn subject_row(name: &str, total: u32, present: u32) -> SubjectAttendance {
        SubjectAttendance {
            subject_id: 1,
            subject_code: "CS301".to_string(),
            subject_name: name.to_string(),
            total_classes: total,
            present_classes: present,
            target_attendance: 75.0,
            projection: project(total, present, 75.0),
        }
    }

    #[test]
    fn coding_summary_sorts_by_count_then_key() {
        let logs = vec![
            log("LeetCode", "easy", 1),
            log("Codeforces", "", 2),
            log("LeetCode", "medium", 3),
            log("AtCoder", "easy", 4),
        ];

        let platforms = summarize_coding(&logs, |log| log.platform.as_str());
        let keys: Vec<&str> = platforms.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["LeetCode", "AtCoder", "Codeforces"]);
        assert_eq!(platforms[0].count, 2);

        let difficulties = summarize_coding(&logs, |log| log.difficulty.as_str());
        assert!(difficulties
            .iter()
            .any(|s| s.key == "unspecified" && s.count == 1));
    }

    #[test]
    fn report_lists_projection_outlook() {
        let attendance = vec![subject_row("Operating Systems", 10, 6), subject_row("Networks", 20, 19)];
        let tasks = vec![Task {
            id: 1,
            subject_id: None,
            subject_name: None,
            subject_code: None,
            title: "Lab report".to_string(),
            due_at: Some("2026-09-12".to_string()),
            priority: TaskPriority::High,
            status: TaskStatus::Todo,
            created_at: NaiveDate::from_ymd_opt(2026, 9, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        }];
        let logs = vec![log("LeetCode", "easy", 1)];

        let report = build_report(
            "Ada",
            "ada@example.com",
            NaiveDate::from_ymd_opt(2026, 9, 10).unwrap(),
            &attendance,
            &tasks,
            &logs,
        );

        assert!(report.contains("Operating Systems (CS301): 60.0% (6/10)"));
        assert!(report.contains("attend the next 6 classes"));
        assert!(report.contains("Networks (CS301): 95.0% (19/20) against 75% target, can miss 5 more"));
        assert!(report.contains("Below target: Operating Systems"));
        assert!(report.contains("- (high) Lab report due 2026-09-12"));
        assert!(report.contains("- LeetCode: 1"));
    }

    #[test]
    fn fractional_targets_print_as_stored() {
        let mut row = subject_row("Compilers", 20, 19);
        row.target_attendance = 72.5;
        row.projection = project(20, 19, 72.5);

        let report = build_report(
            "Ada",
            "ada@example.com",
            NaiveDate::from_ymd_opt(2026, 9, 10).unwrap(),
            &[row],
            &[],
            &[],
        );
        assert!(report.contains("against 72.5% target"));
    }

    #[test]
    fn empty_report_has_placeholders() {
        let report = build_report(
            "Ada",
            "ada@example.com",
            NaiveDate::from_ymd_opt(2026, 9, 10).unwrap(),
            &[],
            &[],
            &[],
        );
        assert!(report.contains("No subjects set up yet."));
        assert!(report.contains("Nothing pending."));
        assert!(report.contains("No problems logged."));
    }
}
