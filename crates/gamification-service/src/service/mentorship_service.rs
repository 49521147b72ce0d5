//! 师徒服务
//!
//! 关系状态机：pending -> active -> completed，pending/active 可取消。
//! 状态变更都带 `WHERE status = 期望状态` 条件，未命中即视为并发冲突。

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{Actor, MAX_RETRIES, PointsLedger, ProgressObserver};
use crate::dto::{RegisterMentorRequest, RequestMentorshipRequest, UpdateMentorRequest};
use crate::error::{GamificationError, Result};
use crate::models::{
    Mentor, MentorshipRelation, MentorshipStatus, MentorshipView, PointsEvent, PointsSource,
};
use crate::repository::{MentorshipRepositoryTrait, WriteOutcome};

/// 每次辅导双方各得积分
pub const SESSION_POINTS: i64 = 10;
/// 完成师徒关系时导师所得积分
pub const MENTOR_COMPLETION_POINTS: i64 = 100;
/// 完成师徒关系时学员所得积分
pub const STUDENT_COMPLETION_POINTS: i64 = 50;

pub struct MentorshipService {
    repo: Arc<dyn MentorshipRepositoryTrait>,
    ledger: Arc<PointsLedger>,
    progress: Arc<dyn ProgressObserver>,
}

impl MentorshipService {
    pub fn new(
        repo: Arc<dyn MentorshipRepositoryTrait>,
        ledger: Arc<PointsLedger>,
        progress: Arc<dyn ProgressObserver>,
    ) -> Self {
        Self {
            repo,
            ledger,
            progress,
        }
    }

    // ==================== 导师 ====================

    #[instrument(skip(self, req))]
    pub async fn register_mentor(&self, user_id: Uuid, req: RegisterMentorRequest) -> Result<Mentor> {
        let mentor = Mentor::new(
            user_id,
            req.specialties,
            req.availability.unwrap_or_else(|| json!({})),
            req.max_mentees,
        );

        match self.repo.create_mentor(&mentor).await? {
            WriteOutcome::Applied => {
                info!(%user_id, mentor_id = %mentor.id, "导师已注册");
                Ok(mentor)
            }
            _ => Err(GamificationError::AlreadyExists(
                "该用户已注册为导师".to_string(),
            )),
        }
    }

    /// 活跃导师列表，可按擅长领域过滤
    pub async fn list_mentors(&self, specialty: Option<&str>) -> Result<Vec<Mentor>> {
        let mentors = self.repo.list_mentors(true).await?;
        Ok(match specialty.map(str::trim).filter(|s| !s.is_empty()) {
            Some(specialty) => mentors
                .into_iter()
                .filter(|m| m.has_specialty(specialty))
                .collect(),
            None => mentors,
        })
    }

    pub async fn get_mentor(&self, id: Uuid) -> Result<Mentor> {
        self.repo
            .find_mentor(id)
            .await?
            .ok_or_else(|| GamificationError::not_found("导师", id))
    }

    /// 导师本人或管理员可修改
    #[instrument(skip(self, req))]
    pub async fn update_mentor(
        &self,
        id: Uuid,
        actor: Actor,
        req: UpdateMentorRequest,
    ) -> Result<Mentor> {
        let mut mentor = self.get_mentor(id).await?;
        actor.require_self_or_admin(mentor.user_id)?;

        if let Some(specialties) = req.specialties {
            mentor.specialties = json!(specialties);
        }
        if let Some(availability) = req.availability {
            mentor.availability = availability;
        }
        if let Some(max_mentees) = req.max_mentees {
            mentor.max_mentees = max_mentees;
        }
        if let Some(is_active) = req.is_active {
            mentor.is_active = is_active;
        }
        mentor.updated_at = Utc::now();

        self.repo.update_mentor(&mentor).await?;
        Ok(mentor)
    }

    // ==================== 师徒关系 ====================

    #[instrument(skip(self, req), fields(mentor_id = %req.mentor_id))]
    pub async fn request_mentorship(
        &self,
        student_id: Uuid,
        req: RequestMentorshipRequest,
    ) -> Result<MentorshipRelation> {
        let mentor = self
            .repo
            .find_mentor(req.mentor_id)
            .await?
            .filter(|m| m.is_active)
            .ok_or_else(|| GamificationError::not_found("导师", req.mentor_id))?;

        if mentor.user_id == student_id {
            return Err(GamificationError::Validation(
                "不能申请成为自己的学员".to_string(),
            ));
        }

        if self
            .repo
            .find_open_relation(mentor.id, student_id)
            .await?
            .is_some()
        {
            return Err(GamificationError::AlreadyExists(
                "已存在进行中的师徒关系".to_string(),
            ));
        }

        let relation = MentorshipRelation::new(mentor.id, student_id, req.goals);
        match self.repo.create_relation(&relation).await? {
            WriteOutcome::Applied => {
                info!(relation_id = %relation.id, %student_id, "师徒申请已创建");
                Ok(relation)
            }
            _ => Err(GamificationError::AlreadyExists(
                "已存在进行中的师徒关系".to_string(),
            )),
        }
    }

    /// 导师接受申请
    #[instrument(skip(self))]
    pub async fn accept(&self, relation_id: Uuid, actor: Actor) -> Result<MentorshipRelation> {
        let (mut relation, mentor) = self.load(relation_id).await?;
        if mentor.user_id != actor.user_id {
            return Err(GamificationError::Forbidden(
                "只有导师本人可以接受申请".to_string(),
            ));
        }
        ensure_transition(relation.status, MentorshipStatus::Active)?;

        match self
            .repo
            .activate_relation(relation.id, mentor.id, mentor.max_mentees)
            .await?
        {
            WriteOutcome::Applied => {}
            WriteOutcome::LimitReached => {
                return Err(GamificationError::MentorAtCapacity(format!(
                    "最多同时指导 {} 名学员",
                    mentor.max_mentees
                )));
            }
            WriteOutcome::Stale | WriteOutcome::Duplicate => {
                return Err(GamificationError::ConcurrencyConflict);
            }
        }

        let now = Utc::now();
        relation.status = MentorshipStatus::Active;
        relation.started_at = Some(now);
        relation.updated_at = now;

        info!(%relation_id, mentor_id = %mentor.id, "师徒关系已开始");
        Ok(relation)
    }

    /// 记录一次辅导，双方各得积分
    #[instrument(skip(self, notes))]
    pub async fn record_session(
        &self,
        relation_id: Uuid,
        actor: Actor,
        notes: Option<String>,
    ) -> Result<MentorshipRelation> {
        for attempt in 1..=MAX_RETRIES {
            let (mut relation, mentor) = self.load(relation_id).await?;
            if actor.user_id != mentor.user_id && actor.user_id != relation.student_id {
                return Err(GamificationError::Forbidden(
                    "只有师徒双方可以记录辅导".to_string(),
                ));
            }
            if relation.status != MentorshipStatus::Active {
                return Err(GamificationError::InvalidTransition {
                    from: relation.status.as_str().to_string(),
                    to: "session".to_string(),
                });
            }

            let expected = relation.updated_at;
            let progress = relation.record_session(actor.user_id, notes.clone())?;
            if !self.repo.record_session(&relation, expected).await? {
                warn!(%relation_id, attempt, "辅导记录版本冲突，重试");
                continue;
            }

            info!(
                %relation_id,
                sessions = progress.sessions_completed,
                "辅导已记录"
            );

            self.reward(mentor.user_id, SESSION_POINTS, "mentorship session", relation.id)
                .await;
            self.reward(relation.student_id, SESSION_POINTS, "mentorship session", relation.id)
                .await;

            return Ok(relation);
        }

        Err(GamificationError::ConcurrencyConflict)
    }

    /// 完成师徒关系（导师或管理员）
    #[instrument(skip(self))]
    pub async fn complete(&self, relation_id: Uuid, actor: Actor) -> Result<MentorshipRelation> {
        let (mut relation, mentor) = self.load(relation_id).await?;
        actor.require_self_or_admin(mentor.user_id)?;
        ensure_transition(relation.status, MentorshipStatus::Completed)?;

        if !self.repo.complete_relation(&relation).await? {
            return Err(GamificationError::ConcurrencyConflict);
        }

        let now = Utc::now();
        relation.status = MentorshipStatus::Completed;
        relation.completed_at = Some(now);
        relation.updated_at = now;

        info!(%relation_id, mentor_id = %mentor.id, "师徒关系已完成");

        self.reward(
            mentor.user_id,
            MENTOR_COMPLETION_POINTS,
            "mentorship completed",
            relation.id,
        )
        .await;
        self.reward(
            relation.student_id,
            STUDENT_COMPLETION_POINTS,
            "mentorship completed",
            relation.id,
        )
        .await;

        Ok(relation)
    }

    /// 取消（任一方或管理员）
    #[instrument(skip(self))]
    pub async fn cancel(&self, relation_id: Uuid, actor: Actor) -> Result<MentorshipRelation> {
        let (mut relation, mentor) = self.load(relation_id).await?;
        if !actor.is_admin && actor.user_id != mentor.user_id && actor.user_id != relation.student_id
        {
            return Err(GamificationError::Forbidden(
                "只有师徒双方或管理员可以取消".to_string(),
            ));
        }
        ensure_transition(relation.status, MentorshipStatus::Cancelled)?;

        if !self.repo.cancel_relation(relation.id, relation.status).await? {
            return Err(GamificationError::ConcurrencyConflict);
        }

        relation.status = MentorshipStatus::Cancelled;
        relation.updated_at = Utc::now();

        info!(%relation_id, cancelled_by = %actor.user_id, "师徒关系已取消");
        Ok(relation)
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<MentorshipView>> {
        self.repo.list_relations_for_user(user_id).await
    }

    async fn load(&self, relation_id: Uuid) -> Result<(MentorshipRelation, Mentor)> {
        let relation = self
            .repo
            .find_relation(relation_id)
            .await?
            .ok_or_else(|| GamificationError::not_found("师徒关系", relation_id))?;
        let mentor = self
            .repo
            .find_mentor(relation.mentor_id)
            .await?
            .ok_or_else(|| GamificationError::not_found("导师", relation.mentor_id))?;
        Ok((relation, mentor))
    }

    /// 发放师徒积分；关系状态已提交，积分失败只记录日志
    async fn reward(&self, user_id: Uuid, points: i64, reason: &str, relation_id: Uuid) {
        let event = PointsEvent::new(PointsSource::Mentorship, points)
            .with_reason(reason)
            .with_reference(relation_id);

        match self.ledger.award(user_id, event).await {
            Ok(_) => {
                self.progress.on_progress(user_id).await;
            }
            Err(e) => {
                warn!(%user_id, %relation_id, points, error = %e, "师徒积分发放失败");
            }
        }
    }
}

fn ensure_transition(from: MentorshipStatus, to: MentorshipStatus) -> Result<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(GamificationError::InvalidTransition {
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GamificationProfile;
    use crate::repository::{MockGamificationRepositoryTrait, MockMentorshipRepositoryTrait};
    use crate::service::{MockProgressObserver, ProgressUpdate};

    struct Fixture {
        mentor: Mentor,
        relation: MentorshipRelation,
    }

    fn fixture(status: MentorshipStatus) -> Fixture {
        let mentor = Mentor::new(Uuid::new_v4(), vec!["grammar".into()], json!({}), 2);
        let mut relation = MentorshipRelation::new(mentor.id, Uuid::new_v4(), vec![]);
        relation.status = status;
        Fixture { mentor, relation }
    }

    fn repo_for(fx: &Fixture) -> MockMentorshipRepositoryTrait {
        let mut repo = MockMentorshipRepositoryTrait::new();
        let relation = fx.relation.clone();
        let mentor = fx.mentor.clone();
        repo.expect_find_relation()
            .returning(move |_| Ok(Some(relation.clone())));
        repo.expect_find_mentor()
            .returning(move |_| Ok(Some(mentor.clone())));
        repo
    }

    /// 账本 Mock：记录每次更新的 (用户, 积分)
    fn ledger(awards: Arc<std::sync::Mutex<Vec<(Uuid, i64)>>>) -> Arc<PointsLedger> {
        let mut profiles = MockGamificationRepositoryTrait::new();
        profiles
            .expect_find_by_user()
            .returning(|user_id| Ok(Some(GamificationProfile::new(user_id))));
        profiles.expect_update().returning(move |p| {
            awards.lock().unwrap().push((p.user_id, p.points));
            Ok(true)
        });
        Arc::new(PointsLedger::new(Arc::new(profiles)))
    }

    fn observer() -> Arc<MockProgressObserver> {
        let mut observer = MockProgressObserver::new();
        observer
            .expect_on_progress()
            .returning(|_| ProgressUpdate::default());
        Arc::new(observer)
    }

    fn service(repo: MockMentorshipRepositoryTrait) -> MentorshipService {
        MentorshipService::new(
            Arc::new(repo),
            ledger(Arc::new(std::sync::Mutex::new(Vec::new()))),
            observer(),
        )
    }

    #[tokio::test]
    async fn test_register_mentor_twice_conflicts() {
        let mut repo = MockMentorshipRepositoryTrait::new();
        repo.expect_create_mentor()
            .returning(|_| Ok(WriteOutcome::Duplicate));

        let req = RegisterMentorRequest {
            specialties: vec!["culture".into()],
            availability: None,
            max_mentees: 3,
        };
        let err = service(repo)
            .register_mentor(Uuid::new_v4(), req)
            .await
            .unwrap_err();
        assert!(matches!(err, GamificationError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_list_mentors_filters_by_specialty() {
        let mut repo = MockMentorshipRepositoryTrait::new();
        repo.expect_list_mentors().returning(|_| {
            Ok(vec![
                Mentor::new(Uuid::new_v4(), vec!["Grammar".into()], json!({}), 3),
                Mentor::new(Uuid::new_v4(), vec!["music".into()], json!({}), 3),
            ])
        });

        let mentors = service(repo).list_mentors(Some("grammar")).await.unwrap();
        assert_eq!(mentors.len(), 1);
    }

    #[tokio::test]
    async fn test_request_own_mentorship_rejected() {
        let fx = fixture(MentorshipStatus::Pending);
        let repo = repo_for(&fx);

        let req = RequestMentorshipRequest {
            mentor_id: fx.mentor.id,
            goals: vec![],
        };
        let err = service(repo)
            .request_mentorship(fx.mentor.user_id, req)
            .await
            .unwrap_err();
        assert!(matches!(err, GamificationError::Validation(_)));
    }

    #[tokio::test]
    async fn test_request_with_open_relation_conflicts() {
        let fx = fixture(MentorshipStatus::Pending);
        let mut repo = repo_for(&fx);
        let open = fx.relation.clone();
        repo.expect_find_open_relation()
            .returning(move |_, _| Ok(Some(open.clone())));
        repo.expect_create_relation().never();

        let req = RequestMentorshipRequest {
            mentor_id: fx.mentor.id,
            goals: vec!["pronunciation".into()],
        };
        let err = service(repo)
            .request_mentorship(fx.relation.student_id, req)
            .await
            .unwrap_err();
        assert!(matches!(err, GamificationError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_accept_by_mentor_activates() {
        let fx = fixture(MentorshipStatus::Pending);
        let mut repo = repo_for(&fx);
        let max = fx.mentor.max_mentees;
        repo.expect_activate_relation()
            .withf(move |_, _, m| *m == max)
            .times(1)
            .returning(|_, _, _| Ok(WriteOutcome::Applied));

        let relation = service(repo)
            .accept(fx.relation.id, Actor::new(fx.mentor.user_id, false))
            .await
            .unwrap();
        assert_eq!(relation.status, MentorshipStatus::Active);
        assert!(relation.started_at.is_some());
    }

    #[tokio::test]
    async fn test_accept_by_student_forbidden() {
        let fx = fixture(MentorshipStatus::Pending);
        let repo = repo_for(&fx);

        let err = service(repo)
            .accept(fx.relation.id, Actor::new(fx.relation.student_id, false))
            .await
            .unwrap_err();
        assert!(matches!(err, GamificationError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_accept_when_mentor_full() {
        let fx = fixture(MentorshipStatus::Pending);
        let mut repo = repo_for(&fx);
        repo.expect_activate_relation()
            .returning(|_, _, _| Ok(WriteOutcome::LimitReached));

        let err = service(repo)
            .accept(fx.relation.id, Actor::new(fx.mentor.user_id, false))
            .await
            .unwrap_err();
        assert!(matches!(err, GamificationError::MentorAtCapacity(_)));
    }

    #[tokio::test]
    async fn test_session_on_pending_relation_is_invalid() {
        let fx = fixture(MentorshipStatus::Pending);
        let repo = repo_for(&fx);

        let err = service(repo)
            .record_session(fx.relation.id, Actor::new(fx.relation.student_id, false), None)
            .await
            .unwrap_err();
        assert!(matches!(err, GamificationError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_session_awards_both_participants() {
        let fx = fixture(MentorshipStatus::Active);
        let mut repo = repo_for(&fx);
        let read_at = fx.relation.updated_at;
        repo.expect_record_session()
            .withf(move |_, expected| *expected == read_at)
            .times(1)
            .returning(|_, _| Ok(true));

        let awards = Arc::new(std::sync::Mutex::new(Vec::new()));
        let svc = MentorshipService::new(Arc::new(repo), ledger(awards.clone()), observer());

        let relation = svc
            .record_session(
                fx.relation.id,
                Actor::new(fx.mentor.user_id, false),
                Some("verbs".into()),
            )
            .await
            .unwrap();

        assert_eq!(relation.parse_progress().unwrap().sessions_completed, 1);
        let awards = awards.lock().unwrap();
        assert_eq!(
            *awards,
            vec![
                (fx.mentor.user_id, SESSION_POINTS),
                (fx.relation.student_id, SESSION_POINTS)
            ]
        );
    }

    #[tokio::test]
    async fn test_concurrent_session_is_retried_once_per_write() {
        let fx = fixture(MentorshipStatus::Active);
        let mut repo = repo_for(&fx);
        let mut seq = mockall::Sequence::new();
        repo.expect_record_session()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(false));
        repo.expect_record_session()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(true));

        let awards = Arc::new(std::sync::Mutex::new(Vec::new()));
        let svc = MentorshipService::new(Arc::new(repo), ledger(awards.clone()), observer());

        let relation = svc
            .record_session(fx.relation.id, Actor::new(fx.relation.student_id, false), None)
            .await
            .unwrap();

        // 冲突的那次写入不发积分
        assert_eq!(relation.parse_progress().unwrap().sessions_completed, 1);
        assert_eq!(awards.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_session_conflict_exhausts_retries() {
        let fx = fixture(MentorshipStatus::Active);
        let mut repo = repo_for(&fx);
        repo.expect_record_session()
            .times(MAX_RETRIES as usize)
            .returning(|_, _| Ok(false));

        let awards = Arc::new(std::sync::Mutex::new(Vec::new()));
        let svc = MentorshipService::new(Arc::new(repo), ledger(awards.clone()), observer());

        let err = svc
            .record_session(fx.relation.id, Actor::new(fx.mentor.user_id, false), None)
            .await
            .unwrap_err();
        assert!(matches!(err, GamificationError::ConcurrencyConflict));
        assert!(awards.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_complete_awards_mentor_and_student() {
        let fx = fixture(MentorshipStatus::Active);
        let mut repo = repo_for(&fx);
        repo.expect_complete_relation().times(1).returning(|_| Ok(true));

        let awards = Arc::new(std::sync::Mutex::new(Vec::new()));
        let svc = MentorshipService::new(Arc::new(repo), ledger(awards.clone()), observer());

        let relation = svc
            .complete(fx.relation.id, Actor::new(fx.mentor.user_id, false))
            .await
            .unwrap();

        assert_eq!(relation.status, MentorshipStatus::Completed);
        let awards = awards.lock().unwrap();
        assert!(awards.contains(&(fx.mentor.user_id, MENTOR_COMPLETION_POINTS)));
        assert!(awards.contains(&(fx.relation.student_id, STUDENT_COMPLETION_POINTS)));
    }

    #[tokio::test]
    async fn test_complete_pending_is_invalid_transition() {
        let fx = fixture(MentorshipStatus::Pending);
        let repo = repo_for(&fx);

        let err = service(repo)
            .complete(fx.relation.id, Actor::new(Uuid::new_v4(), true))
            .await
            .unwrap_err();
        assert!(matches!(err, GamificationError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_cancel_completed_is_invalid() {
        let fx = fixture(MentorshipStatus::Completed);
        let repo = repo_for(&fx);

        let err = service(repo)
            .cancel(fx.relation.id, Actor::new(fx.relation.student_id, false))
            .await
            .unwrap_err();
        assert!(matches!(err, GamificationError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_cancel_lost_race_conflicts() {
        let fx = fixture(MentorshipStatus::Active);
        let mut repo = repo_for(&fx);
        repo.expect_cancel_relation()
            .withf(|_, expected| *expected == MentorshipStatus::Active)
            .returning(|_, _| Ok(false));

        let err = service(repo)
            .cancel(fx.relation.id, Actor::new(fx.relation.student_id, false))
            .await
            .unwrap_err();
        assert!(matches!(err, GamificationError::ConcurrencyConflict));
    }
}
