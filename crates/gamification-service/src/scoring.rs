//! 计分规则
//!
//! 纯函数，不依赖数据库，所有积分、等级、连续打卡的计算都集中在这里：
//!
//! - 排行榜得分 = 等级×100 + 当前经验 + 成就×50 + 任务×25 + 奖励×10
//! - 经验达到 `等级×100` 时升级，溢出部分带入下一级
//! - 连续打卡倍率从 1.0 开始，每天 +0.1，上限 2.5
//! - 协作奖励积分 = 基础分 × 质量倍率 × (1 + 连续加成)，向下取整

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::models::{LeaderboardEntry, LeaderboardRow, StreakOutcome};

/// 每级所需经验的系数
pub const EXPERIENCE_PER_LEVEL: i64 = 100;
/// 连续打卡倍率上限
pub const MAX_STREAK_MULTIPLIER: f64 = 2.5;
/// 连续打卡每日倍率增量
pub const STREAK_MULTIPLIER_STEP: f64 = 0.1;
/// 基础倍率
pub const BASE_MULTIPLIER: f64 = 1.0;

/// 计算排行榜得分
pub fn leaderboard_score(
    level: i32,
    experience: i64,
    achievements: i32,
    missions: i32,
    rewards: i32,
) -> i64 {
    i64::from(level) * 100
        + experience
        + i64::from(achievements) * 50
        + i64::from(missions) * 25
        + i64::from(rewards) * 10
}

/// 对档案行计算得分并排名
///
/// 得分降序；同分时注册更早的档案在前，再按用户 ID 保证顺序稳定
pub fn rank(rows: Vec<LeaderboardRow>) -> Vec<LeaderboardEntry> {
    let mut scored: Vec<(i64, LeaderboardRow)> = rows
        .into_iter()
        .map(|row| {
            let score = leaderboard_score(
                row.level,
                row.experience,
                row.achievements_count,
                row.missions_completed,
                row.rewards_count,
            );
            (score, row)
        })
        .collect();

    scored.sort_by(|(a_score, a), (b_score, b)| {
        b_score
            .cmp(a_score)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.user_id.cmp(&b.user_id))
    });

    scored
        .into_iter()
        .enumerate()
        .map(|(idx, (score, row))| LeaderboardEntry::from_row(idx as i64 + 1, score, row))
        .collect()
}

/// 升级计算结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelProgress {
    pub level: i32,
    /// 当前等级内的经验
    pub experience: i64,
    pub levels_gained: i32,
}

/// 增加经验并处理升级，可一次跨越多级
pub fn apply_experience(level: i32, experience: i64, gained: i64) -> LevelProgress {
    let mut level = level.max(1);
    let mut experience = experience.max(0) + gained.max(0);
    let mut levels_gained = 0;

    while experience >= i64::from(level) * EXPERIENCE_PER_LEVEL {
        experience -= i64::from(level) * EXPERIENCE_PER_LEVEL;
        level += 1;
        levels_gained += 1;
    }

    LevelProgress {
        level,
        experience,
        levels_gained,
    }
}

/// 倍率保留一位小数
pub fn round_multiplier(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// 下一天的倍率
pub fn next_multiplier(current: f64) -> f64 {
    round_multiplier((current + STREAK_MULTIPLIER_STEP).min(MAX_STREAK_MULTIPLIER))
}

/// 连续打卡状态
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreakState {
    pub current_streak: i32,
    pub longest_streak: i32,
    pub last_activity_date: Option<NaiveDate>,
    pub current_multiplier: f64,
    pub grace_period_used: bool,
}

impl Default for StreakState {
    fn default() -> Self {
        Self {
            current_streak: 0,
            longest_streak: 0,
            last_activity_date: None,
            current_multiplier: BASE_MULTIPLIER,
            grace_period_used: false,
        }
    }
}

/// 按 UTC 日期推进连续打卡
///
/// - 同一天：不变
/// - 隔天：延续，倍率 +0.1
/// - 漏掉一天：每轮连续仅可使用一次宽限期
/// - 其它情况：重置为第 1 天，倍率回到 1.0，宽限期恢复
pub fn advance_streak(state: StreakState, today: NaiveDate) -> (StreakState, StreakOutcome) {
    let Some(last) = state.last_activity_date else {
        return (restart(state, today), StreakOutcome::Started);
    };

    let gap = (today - last).num_days();
    let outcome = match gap {
        // 时钟回拨也按当天处理
        i64::MIN..=0 => return (state, StreakOutcome::AlreadyRecorded),
        1 => StreakOutcome::Continued,
        2 if !state.grace_period_used => StreakOutcome::GraceUsed,
        _ => return (restart(state, today), StreakOutcome::Reset),
    };

    let current_streak = state.current_streak + 1;
    let next = StreakState {
        current_streak,
        longest_streak: state.longest_streak.max(current_streak),
        last_activity_date: Some(today),
        current_multiplier: next_multiplier(state.current_multiplier),
        grace_period_used: state.grace_period_used || outcome == StreakOutcome::GraceUsed,
    };
    (next, outcome)
}

fn restart(state: StreakState, today: NaiveDate) -> StreakState {
    StreakState {
        current_streak: 1,
        longest_streak: state.longest_streak.max(1),
        last_activity_date: Some(today),
        current_multiplier: BASE_MULTIPLIER,
        grace_period_used: false,
    }
}

/// 连续加成（倍率 - 1.0），无连续记录时为 0
pub fn streak_bonus(multiplier: Option<f64>) -> f64 {
    multiplier
        .map(|m| round_multiplier(m - BASE_MULTIPLIER).max(0.0))
        .unwrap_or(0.0)
}

/// 协作奖励积分
pub fn collaboration_points(base_points: i64, quality_multiplier: f64, streak_bonus: f64) -> i64 {
    let raw = base_points as f64 * quality_multiplier * (1.0 + streak_bonus);
    // 吸收浮点误差，避免 110.0 被算成 109.999...
    (raw + 1e-9).floor().max(0.0) as i64
}

/// 默认质量倍率
pub fn default_quality_multipliers() -> HashMap<String, f64> {
    HashMap::from([
        ("excellent".to_string(), 2.0),
        ("good".to_string(), 1.5),
        ("average".to_string(), 1.0),
        ("poor".to_string(), 0.5),
    ])
}

/// 条件进度百分比
pub fn requirement_progress(current: i64, target: i64) -> i32 {
    if target <= 0 {
        return 100;
    }
    let percent = current.max(0).saturating_mul(100) / target;
    percent.min(100) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn row(level: i32, experience: i64, created_offset_days: i64) -> LeaderboardRow {
        LeaderboardRow {
            user_id: Uuid::new_v4(),
            username: format!("learner-{}", level),
            display_name: None,
            points: 0,
            level,
            experience,
            achievements_count: 0,
            missions_completed: 0,
            rewards_count: 0,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                + Duration::days(created_offset_days),
        }
    }

    #[test]
    fn test_leaderboard_score_formula() {
        assert_eq!(leaderboard_score(1, 0, 0, 0, 0), 100);
        assert_eq!(leaderboard_score(3, 40, 2, 4, 5), 300 + 40 + 100 + 100 + 50);
    }

    #[test]
    fn test_rank_orders_by_score_then_age() {
        let newer = row(2, 0, 10);
        let older = row(2, 0, 1);
        let top = row(5, 0, 20);
        let older_id = older.user_id;

        let ranked = rank(vec![newer, top, older]);

        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[0].level, 5);
        assert_eq!(ranked[1].user_id, older_id);
        assert_eq!(ranked[1].rank, 2);
        assert_eq!(ranked[2].rank, 3);
        assert_eq!(ranked[1].score, ranked[2].score);
    }

    #[test]
    fn test_rank_empty() {
        assert!(rank(vec![]).is_empty());
    }

    #[test]
    fn test_apply_experience_without_level_up() {
        let progress = apply_experience(1, 20, 50);
        assert_eq!(
            progress,
            LevelProgress {
                level: 1,
                experience: 70,
                levels_gained: 0
            }
        );
    }

    #[test]
    fn test_apply_experience_carries_surplus() {
        // 1 级需要 100，2 级需要 200
        let progress = apply_experience(1, 90, 230);
        assert_eq!(progress.level, 3);
        assert_eq!(progress.experience, 20);
        assert_eq!(progress.levels_gained, 2);
    }

    #[test]
    fn test_apply_experience_exact_threshold() {
        let progress = apply_experience(2, 150, 50);
        assert_eq!(progress.level, 3);
        assert_eq!(progress.experience, 0);
    }

    #[test]
    fn test_multiplier_is_capped_and_rounded() {
        assert_eq!(next_multiplier(1.0), 1.1);
        assert_eq!(next_multiplier(1.2000000001), 1.3);
        assert_eq!(next_multiplier(2.45), 2.5);
        assert_eq!(next_multiplier(2.5), 2.5);

        let mut m = BASE_MULTIPLIER;
        for _ in 0..30 {
            m = next_multiplier(m);
        }
        assert_eq!(m, MAX_STREAK_MULTIPLIER);
    }

    #[test]
    fn test_streak_first_activity() {
        let (state, outcome) = advance_streak(StreakState::default(), day(1));
        assert_eq!(outcome, StreakOutcome::Started);
        assert_eq!(state.current_streak, 1);
        assert_eq!(state.longest_streak, 1);
        assert_eq!(state.current_multiplier, 1.0);
        assert_eq!(state.last_activity_date, Some(day(1)));
    }

    #[test]
    fn test_streak_same_day_is_unchanged() {
        let (state, _) = advance_streak(StreakState::default(), day(1));
        let (again, outcome) = advance_streak(state, day(1));
        assert_eq!(outcome, StreakOutcome::AlreadyRecorded);
        assert_eq!(again, state);
    }

    #[test]
    fn test_streak_consecutive_days() {
        let mut state = StreakState::default();
        for d in 1..=4 {
            state = advance_streak(state, day(d)).0;
        }
        assert_eq!(state.current_streak, 4);
        assert_eq!(state.longest_streak, 4);
        assert_eq!(state.current_multiplier, 1.3);
        assert!(!state.grace_period_used);
    }

    #[test]
    fn test_streak_grace_period_once() {
        let mut state = advance_streak(StreakState::default(), day(1)).0;
        state = advance_streak(state, day(2)).0;

        let (state, outcome) = advance_streak(state, day(4));
        assert_eq!(outcome, StreakOutcome::GraceUsed);
        assert_eq!(state.current_streak, 3);
        assert!(state.grace_period_used);

        // 同一轮连续中第二次漏一天则重置
        let (state, outcome) = advance_streak(state, day(6));
        assert_eq!(outcome, StreakOutcome::Reset);
        assert_eq!(state.current_streak, 1);
        assert_eq!(state.longest_streak, 3);
        assert_eq!(state.current_multiplier, 1.0);
        assert!(!state.grace_period_used);
    }

    #[test]
    fn test_streak_long_gap_resets() {
        let mut state = StreakState::default();
        for d in 1..=5 {
            state = advance_streak(state, day(d)).0;
        }
        let (state, outcome) = advance_streak(state, day(10));
        assert_eq!(outcome, StreakOutcome::Reset);
        assert_eq!(state.current_streak, 1);
        assert_eq!(state.longest_streak, 5);
    }

    #[test]
    fn test_streak_clock_skew_counts_as_same_day() {
        let state = advance_streak(StreakState::default(), day(5)).0;
        let (next, outcome) = advance_streak(state, day(4));
        assert_eq!(outcome, StreakOutcome::AlreadyRecorded);
        assert_eq!(next, state);
    }

    #[test]
    fn test_streak_bonus() {
        assert_eq!(streak_bonus(None), 0.0);
        assert_eq!(streak_bonus(Some(1.0)), 0.0);
        assert_eq!(streak_bonus(Some(1.3)), 0.3);
        assert_eq!(streak_bonus(Some(2.5)), 1.5);
    }

    #[test]
    fn test_collaboration_points() {
        assert_eq!(collaboration_points(10, 1.5, 0.0), 15);
        assert_eq!(collaboration_points(100, 1.0, 0.1), 110);
        assert_eq!(collaboration_points(10, 1.5, 0.1), 16);
        assert_eq!(collaboration_points(7, 0.5, 0.0), 3);
        assert_eq!(collaboration_points(20, 2.0, 1.5), 100);
    }

    #[test]
    fn test_default_quality_multipliers() {
        let multipliers = default_quality_multipliers();
        assert_eq!(multipliers.len(), 4);
        assert_eq!(multipliers["excellent"], 2.0);
        assert_eq!(multipliers["poor"], 0.5);
    }

    #[test]
    fn test_requirement_progress() {
        assert_eq!(requirement_progress(0, 100), 0);
        assert_eq!(requirement_progress(33, 100), 33);
        assert_eq!(requirement_progress(250, 100), 100);
        assert_eq!(requirement_progress(-5, 100), 0);
        assert_eq!(requirement_progress(0, 0), 100);
    }
}
