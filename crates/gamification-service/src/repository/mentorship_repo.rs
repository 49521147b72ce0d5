//! 师徒仓储

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use super::WriteOutcome;
use super::traits::MentorshipRepositoryTrait;
use crate::error::{Result, is_unique_violation};
use crate::models::{Mentor, MentorshipRelation, MentorshipStatus, MentorshipView};

const MENTOR_COLUMNS: &str = r#"
    id, user_id, specialties, availability, max_mentees, is_active, stats,
    created_at, updated_at
"#;

const RELATION_COLUMNS: &str = r#"
    id, mentor_id, student_id, status, goals, progress, started_at, completed_at,
    created_at, updated_at
"#;

pub struct MentorshipRepository {
    pool: PgPool,
}

impl MentorshipRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// 导师统计字段原子 +1
async fn increment_mentor_stat<'e, E>(executor: E, mentor_id: Uuid, key: &str) -> Result<()>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        UPDATE mentors
        SET stats = jsonb_set(
                COALESCE(stats, '{}'::jsonb),
                ARRAY[$2::text],
                to_jsonb(COALESCE((stats ->> $2::text)::bigint, 0) + 1)
            ),
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(mentor_id)
    .bind(key)
    .execute(executor)
    .await?;

    Ok(())
}

#[async_trait]
impl MentorshipRepositoryTrait for MentorshipRepository {
    async fn create_mentor(&self, mentor: &Mentor) -> Result<WriteOutcome> {
        let result = sqlx::query(
            r#"
            INSERT INTO mentors (id, user_id, specialties, availability, max_mentees,
                                 is_active, stats, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(mentor.id)
        .bind(mentor.user_id)
        .bind(&mentor.specialties)
        .bind(&mentor.availability)
        .bind(mentor.max_mentees)
        .bind(mentor.is_active)
        .bind(&mentor.stats)
        .bind(mentor.created_at)
        .bind(mentor.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(WriteOutcome::Applied),
            Err(e) if is_unique_violation(&e) => Ok(WriteOutcome::Duplicate),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_mentor(&self, mentor: &Mentor) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE mentors
            SET specialties = $2, availability = $3, max_mentees = $4, is_active = $5,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(mentor.id)
        .bind(&mentor.specialties)
        .bind(&mentor.availability)
        .bind(mentor.max_mentees)
        .bind(mentor.is_active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_mentor(&self, id: Uuid) -> Result<Option<Mentor>> {
        let sql = format!("SELECT {} FROM mentors WHERE id = $1", MENTOR_COLUMNS);
        let mentor = sqlx::query_as::<_, Mentor>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(mentor)
    }

    async fn find_mentor_by_user(&self, user_id: Uuid) -> Result<Option<Mentor>> {
        let sql = format!("SELECT {} FROM mentors WHERE user_id = $1", MENTOR_COLUMNS);
        let mentor = sqlx::query_as::<_, Mentor>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(mentor)
    }

    async fn list_mentors(&self, active_only: bool) -> Result<Vec<Mentor>> {
        let sql = format!(
            "SELECT {} FROM mentors WHERE is_active OR NOT $1 ORDER BY created_at ASC",
            MENTOR_COLUMNS
        );
        let mentors = sqlx::query_as::<_, Mentor>(&sql)
            .bind(active_only)
            .fetch_all(&self.pool)
            .await?;

        Ok(mentors)
    }

    async fn create_relation(&self, relation: &MentorshipRelation) -> Result<WriteOutcome> {
        // 部分唯一索引保证同一对导师/学员只有一条未结束的关系
        let result = sqlx::query(
            r#"
            INSERT INTO mentorship_relations (id, mentor_id, student_id, status, goals, progress,
                                              started_at, completed_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(relation.id)
        .bind(relation.mentor_id)
        .bind(relation.student_id)
        .bind(relation.status)
        .bind(&relation.goals)
        .bind(&relation.progress)
        .bind(relation.started_at)
        .bind(relation.completed_at)
        .bind(relation.created_at)
        .bind(relation.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(WriteOutcome::Applied),
            Err(e) if is_unique_violation(&e) => Ok(WriteOutcome::Duplicate),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_relation(&self, id: Uuid) -> Result<Option<MentorshipRelation>> {
        let sql = format!(
            "SELECT {} FROM mentorship_relations WHERE id = $1",
            RELATION_COLUMNS
        );
        let relation = sqlx::query_as::<_, MentorshipRelation>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(relation)
    }

    async fn find_open_relation(
        &self,
        mentor_id: Uuid,
        student_id: Uuid,
    ) -> Result<Option<MentorshipRelation>> {
        let sql = format!(
            r#"
            SELECT {} FROM mentorship_relations
            WHERE mentor_id = $1 AND student_id = $2 AND status IN ('pending', 'active')
            LIMIT 1
            "#,
            RELATION_COLUMNS
        );
        let relation = sqlx::query_as::<_, MentorshipRelation>(&sql)
            .bind(mentor_id)
            .bind(student_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(relation)
    }

    async fn list_relations_for_user(&self, user_id: Uuid) -> Result<Vec<MentorshipView>> {
        let relations = sqlx::query_as::<_, MentorshipView>(
            r#"
            SELECT r.id, r.mentor_id, r.student_id, r.status, r.goals, r.progress,
                   r.started_at, r.completed_at, r.created_at, r.updated_at,
                   m.user_id AS mentor_user_id
            FROM mentorship_relations r
            JOIN mentors m ON m.id = r.mentor_id
            WHERE r.student_id = $1 OR m.user_id = $1
            ORDER BY r.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(relations)
    }

    async fn activate_relation(
        &self,
        relation_id: Uuid,
        mentor_id: Uuid,
        max_mentees: i32,
    ) -> Result<WriteOutcome> {
        let mut tx = self.pool.begin().await?;

        // 锁住导师行，串行化同一导师的接受操作
        sqlx::query("SELECT id FROM mentors WHERE id = $1 FOR UPDATE")
            .bind(mentor_id)
            .execute(&mut *tx)
            .await?;

        let active: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM mentorship_relations WHERE mentor_id = $1 AND status = 'active'",
        )
        .bind(mentor_id)
        .fetch_one(&mut *tx)
        .await?;

        if active >= i64::from(max_mentees) {
            tx.rollback().await?;
            return Ok(WriteOutcome::LimitReached);
        }

        let updated = sqlx::query(
            r#"
            UPDATE mentorship_relations
            SET status = 'active', started_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(relation_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(WriteOutcome::Stale);
        }

        increment_mentor_stat(&mut *tx, mentor_id, "totalMentees").await?;

        tx.commit().await?;
        Ok(WriteOutcome::Applied)
    }

    async fn record_session(
        &self,
        relation: &MentorshipRelation,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        // progress 在内存中累加，updated_at 作为版本号防止并发覆盖
        let updated = sqlx::query(
            r#"
            UPDATE mentorship_relations
            SET progress = $2, updated_at = $3
            WHERE id = $1 AND status = 'active' AND updated_at = $4
            "#,
        )
        .bind(relation.id)
        .bind(&relation.progress)
        .bind(relation.updated_at)
        .bind(expected_updated_at)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        increment_mentor_stat(&mut *tx, relation.mentor_id, "sessionsCompleted").await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn complete_relation(&self, relation: &MentorshipRelation) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE mentorship_relations
            SET status = 'completed', completed_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'active'
            "#,
        )
        .bind(relation.id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        increment_mentor_stat(&mut *tx, relation.mentor_id, "completedMentorships").await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn cancel_relation(
        &self,
        relation_id: Uuid,
        expected: MentorshipStatus,
    ) -> Result<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE mentorship_relations
            SET status = 'cancelled', updated_at = NOW()
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(relation_id)
        .bind(expected)
        .execute(&self.pool)
        .await?;

        Ok(updated.rows_affected() == 1)
    }
}
