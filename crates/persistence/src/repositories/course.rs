//! Course roster on PostgreSQL.

use async_trait::async_trait;
use domain::models::Course;
use domain::store::CourseRoster;
use domain::StoreError;
use uuid::Uuid;

use crate::entities::CourseEntity;
use crate::metrics::QueryTimer;
use crate::postgres::{map_sqlx_error, PgOnboardingTx};

#[async_trait]
impl CourseRoster for PgOnboardingTx {
    async fn find_course(&mut self, id: Uuid) -> Result<Option<Course>, StoreError> {
        let timer = QueryTimer::new("find_course");
        let result = sqlx::query_as::<_, CourseEntity>(
            r#"
            SELECT c.id, c.school_id, c.name, c.grade, c.section,
                   ARRAY(
                       SELECT cs.student_id FROM course_students cs
                       WHERE cs.course_id = c.id
                       ORDER BY cs.added_at, cs.student_id
                   ) AS student_ids
            FROM courses c
            WHERE c.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await;
        timer.record();
        result
            .map(|entity| entity.map(Course::from))
            .map_err(map_sqlx_error)
    }

    async fn add_student_to_course(
        &mut self,
        course_id: Uuid,
        student_id: Uuid,
    ) -> Result<bool, StoreError> {
        let timer = QueryTimer::new("lock_course");
        let exists = sqlx::query_scalar::<_, Uuid>("SELECT id FROM courses WHERE id = $1 FOR UPDATE")
            .bind(course_id)
            .fetch_optional(&mut *self.tx)
            .await;
        timer.record();
        if exists.map_err(map_sqlx_error)?.is_none() {
            return Err(StoreError::NotFound(format!("course {}", course_id)));
        }

        let timer = QueryTimer::new("add_student_to_course");
        let result = sqlx::query(
            r#"
            INSERT INTO course_students (course_id, student_id)
            VALUES ($1, $2)
            ON CONFLICT (course_id, student_id) DO NOTHING
            "#,
        )
        .bind(course_id)
        .bind(student_id)
        .execute(&mut *self.tx)
        .await;
        timer.record();
        result
            .map(|done| done.rows_affected() == 1)
            .map_err(map_sqlx_error)
    }
}
