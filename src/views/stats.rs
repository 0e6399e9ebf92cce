//! Instructor and per-course statistics
//!
//! Folded from course and enrollment snapshots on every call. Nothing here is
//! stored; a changed snapshot simply produces new numbers.

use crate::models::{Course, Enrollment, UserRole};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Dashboard totals for one instructor (or the whole platform for admins)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructorStats {
    pub total_courses: usize,
    pub published_courses: usize,
    pub draft_courses: usize,
    pub total_enrollments: usize,
    /// Minor currency units
    pub total_revenue: i64,
}

/// Enrollment totals for a single course
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseStats {
    pub course_id: i64,
    pub enrollment_count: usize,
    pub revenue: i64,
}

/// Courses the viewer's dashboard covers: everything for admins, otherwise the
/// courses they teach.
pub fn scope_courses<'a>(courses: &'a [Course], viewer_id: i64, role: UserRole) -> Vec<&'a Course> {
    courses
        .iter()
        .filter(|c| role == UserRole::Admin || c.instructor_id == viewer_id)
        .collect()
}

/// Totals over `courses`. Enrollments whose course is not in the set are
/// ignored.
pub fn instructor_stats<C>(courses: &[C], enrollments: &[Enrollment]) -> InstructorStats
where
    C: std::borrow::Borrow<Course>,
{
    let prices: HashMap<i64, i64> = courses
        .iter()
        .map(|c| (c.borrow().id, c.borrow().price))
        .collect();
    let published = courses.iter().filter(|c| c.borrow().is_published).count();

    let (total_enrollments, total_revenue) = enrollments
        .iter()
        .filter_map(|e| prices.get(&e.course_id))
        .fold((0usize, 0i64), |(count, revenue), price| {
            (count + 1, revenue.saturating_add(*price))
        });

    InstructorStats {
        total_courses: courses.len(),
        published_courses: published,
        draft_courses: courses.len() - published,
        total_enrollments,
        total_revenue,
    }
}

/// Totals for one course
pub fn course_stats(course: &Course, enrollments: &[Enrollment]) -> CourseStats {
    let enrollment_count = enrollments.iter().filter(|e| e.course_id == course.id).count();
    CourseStats {
        course_id: course.id,
        enrollment_count,
        revenue: course.price.saturating_mul(enrollment_count as i64),
    }
}
