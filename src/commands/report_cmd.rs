//! Commands for rankings and the insights dashboard

use chrono::Local;

use super::{parse_date, parse_month, report};
use crate::services::insights::{insights, Insights};
use crate::services::ranking::{rank, RankReport, RankingMode};
use crate::AppState;

/// Time ranking for a subtree (or everything)
///
/// `mode` is `week` (default), `month` or `all`; `date` (`YYYY-MM-DD`)
/// picks the week or month, today when absent.
pub async fn get_ranking(
    state: &AppState,
    scope: Option<u32>,
    mode: Option<String>,
    date: Option<String>,
) -> Result<RankReport, String> {
    let mode = match mode {
        Some(m) => m.parse::<RankingMode>().map_err(report("get_ranking"))?,
        None => RankingMode::default(),
    };
    let now = state.clock.now();
    let reference = match date {
        Some(d) => parse_date(&d).map_err(report("get_ranking"))?,
        None => now.with_timezone(&Local).date_naive(),
    };

    let tree = state.engine().load_tree().await.map_err(report("get_ranking"))?;
    rank(&tree, scope, mode, reference, &Local, now).map_err(report("get_ranking"))
}

/// Dashboard statistics for a subtree and a month (`YYYY-MM`, default current)
pub async fn get_insights(state: &AppState, scope: Option<u32>, month: Option<String>) -> Result<Insights, String> {
    let now = state.clock.now();
    let month = match month {
        Some(m) => parse_month(&m).map_err(report("get_insights"))?,
        None => now.with_timezone(&Local).date_naive(),
    };

    let tree = state.engine().load_tree().await.map_err(report("get_insights"))?;
    insights(&tree, scope, month, &Local, now).map_err(report("get_insights"))
}
