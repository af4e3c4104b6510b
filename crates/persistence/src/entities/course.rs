//! Course entity (database row mapping).

use domain::models::Course;
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the courses table, with the roster aggregated
/// from course_students.
#[derive(Debug, Clone, FromRow)]
pub struct CourseEntity {
    pub id: Uuid,
    pub school_id: Uuid,
    pub name: String,
    pub grade: String,
    pub section: String,
    pub student_ids: Vec<Uuid>,
}

impl From<CourseEntity> for Course {
    fn from(entity: CourseEntity) -> Self {
        Self {
            id: entity.id,
            school_id: entity.school_id,
            name: entity.name,
            grade: entity.grade,
            section: entity.section,
            student_ids: entity.student_ids,
        }
    }
}
