//! 积分账本
//!
//! 所有对积分档案的读改写都经过这里：读取（不存在则创建）、
//! 在内存中修改、按版本号写回，冲突时重新读取重试。

use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use super::MAX_RETRIES;
use crate::error::{GamificationError, Result};
use crate::models::{GamificationProfile, PointsEvent};
use crate::repository::GamificationRepositoryTrait;

pub struct PointsLedger {
    profiles: Arc<dyn GamificationRepositoryTrait>,
}

impl PointsLedger {
    pub fn new(profiles: Arc<dyn GamificationRepositoryTrait>) -> Self {
        Self { profiles }
    }

    /// 读取档案，不存在时创建 1 级空档案
    pub async fn load_or_create(&self, user_id: Uuid) -> Result<GamificationProfile> {
        if let Some(profile) = self.profiles.find_by_user(user_id).await? {
            return Ok(profile);
        }

        debug!(%user_id, "创建积分档案");
        self.profiles
            .insert_if_absent(&GamificationProfile::new(user_id))
            .await
    }

    /// 修改档案并按版本号写回
    ///
    /// `mutate` 在每次重试时都会基于最新档案重新执行
    pub async fn apply<F>(&self, user_id: Uuid, mutate: F) -> Result<GamificationProfile>
    where
        F: Fn(&mut GamificationProfile) -> Result<()> + Send + Sync,
    {
        for attempt in 1..=MAX_RETRIES {
            let mut profile = self.load_or_create(user_id).await?;
            mutate(&mut profile)?;

            if self.profiles.update(&profile).await? {
                profile.version += 1;
                return Ok(profile);
            }

            warn!(%user_id, attempt, "积分档案版本冲突，重试");
        }

        Err(GamificationError::ConcurrencyConflict)
    }

    /// 记入一笔积分
    pub async fn award(&self, user_id: Uuid, event: PointsEvent) -> Result<GamificationProfile> {
        let kind = event.kind;
        let points = event.points;
        let profile = self
            .apply(user_id, |profile| {
                profile.apply_points(event.clone())?;
                Ok(())
            })
            .await?;

        kamentsa_shared::observability::metrics::record_points_granted(kind.as_str(), points);
        Ok(profile)
    }
}
