//! 排行榜服务
//!
//! 完整排名计算后写入 Redis，短 TTL；不同 limit 的请求共用同一份排名。
//! 缓存不可用时直接查库。

use std::sync::Arc;
use std::time::{Duration, Instant};

use kamentsa_shared::cache::{Cache, CacheKey};
use kamentsa_shared::observability::metrics;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::error::{GamificationError, Result};
use crate::models::LeaderboardEntry;
use crate::repository::GamificationRepositoryTrait;
use crate::scoring;

/// 默认返回条数
pub const DEFAULT_LEADERBOARD_LIMIT: i64 = 10;
/// 最大返回条数
pub const MAX_LEADERBOARD_LIMIT: i64 = 100;

pub struct LeaderboardService {
    profiles: Arc<dyn GamificationRepositoryTrait>,
    cache: Option<Arc<Cache>>,
    ttl: Duration,
}

impl LeaderboardService {
    pub fn new(
        profiles: Arc<dyn GamificationRepositoryTrait>,
        cache: Option<Arc<Cache>>,
        ttl: Duration,
    ) -> Self {
        Self {
            profiles,
            cache,
            ttl,
        }
    }

    /// 排行榜前 N 名（N 限制在 1..=100）
    #[instrument(skip(self))]
    pub async fn get_leaderboard(&self, limit: Option<i64>) -> Result<Vec<LeaderboardEntry>> {
        let limit = limit
            .unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
            .clamp(1, MAX_LEADERBOARD_LIMIT) as usize;

        let mut ranking = self.ranking().await?;
        ranking.truncate(limit);
        Ok(ranking)
    }

    /// 单个用户的名次
    #[instrument(skip(self))]
    pub async fn get_user_rank(&self, user_id: Uuid) -> Result<LeaderboardEntry> {
        self.ranking()
            .await?
            .into_iter()
            .find(|entry| entry.user_id == user_id)
            .ok_or_else(|| GamificationError::not_found("排行榜用户", user_id))
    }

    /// 使缓存失效
    pub async fn invalidate(&self) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.delete(CacheKey::leaderboard_ranking()).await {
                warn!(error = %e, "排行榜缓存清理失败");
            }
        }
    }

    async fn ranking(&self) -> Result<Vec<LeaderboardEntry>> {
        if let Some(cache) = &self.cache {
            match cache
                .get::<Vec<LeaderboardEntry>>(CacheKey::leaderboard_ranking())
                .await
            {
                Ok(Some(cached)) => {
                    debug!(entries = cached.len(), "排行榜命中缓存");
                    return Ok(cached);
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "读取排行榜缓存失败"),
            }
        }

        let start = Instant::now();
        let rows = self.profiles.list_leaderboard_rows().await?;
        let ranking = scoring::rank(rows);
        metrics::record_leaderboard_build(ranking.len(), start.elapsed().as_secs_f64());

        if let Some(cache) = &self.cache {
            if let Err(e) = cache
                .set(CacheKey::leaderboard_ranking(), &ranking, self.ttl)
                .await
            {
                warn!(error = %e, "写入排行榜缓存失败");
            }
        }

        Ok(ranking)
    }
}
